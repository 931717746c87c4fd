// src/models/signing.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::contract::{ContractStatus, FieldType};

// Estado de um campo na tela de assinatura
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SigningFieldState {
    // Campo do signatário verificado, clicável
    Own,
    // Campo de outra parte que já assinou
    Signed,
    // Campo de outra parte que ainda não assinou
    Awaiting,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SigningField {
    pub field_index: usize,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub x: f64,
    pub y: f64,
    pub state: SigningFieldState,
}

/// O que o visitante enxerga depois da verificação. Não inclui nomes nem
/// documentos das outras partes.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SigningView {
    pub contract_id: Uuid,
    pub title: String,
    pub contract_content: String,
    pub is_pdf: bool,
    pub status: ContractStatus,
    pub signatory_index: usize,
    pub signatory_name: String,
    pub fields: Vec<SigningField>,
}

// Resposta da verificação: token da sessão de assinatura + tela
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResponse {
    pub signing_token: String,
    pub expires_at: DateTime<Utc>,
    pub view: SigningView,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SigningResult {
    pub contract_id: Uuid,
    pub signatory_index: usize,
    pub signed_at: Option<DateTime<Utc>>,
    pub status: ContractStatus,
    pub all_signed: bool,
}

// Claims do token da sessão de assinatura (vinculado a contrato + signatário)
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SigningClaims {
    pub sub: Uuid,
    pub signatory_index: usize,
    pub scope: String,
    pub exp: usize,
    pub iat: usize,
}
