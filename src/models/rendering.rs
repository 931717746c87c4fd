// src/models/rendering.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::contract::{ContractStatus, FieldType};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum OverlayState {
    // Imagem capturada na assinatura
    Signed { image: String },
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldOverlay {
    pub field_index: usize,
    pub signatory_index: usize,
    pub signatory_name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub x: f64,
    pub y: f64,
    pub overlay: OverlayState,
}

// Linha da trilha de auditoria (informativa, não é prova criptográfica)
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub signatory_index: usize,
    pub name: String,
    pub cpf: String,
    pub signed_at: DateTime<Utc>,
    #[schema(example = "3F2A9C1B7D40-01")]
    pub signature_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderedContract {
    pub contract_id: Uuid,
    pub title: String,
    pub client_name: String,
    pub status: ContractStatus,
    pub is_pdf: bool,
    pub contract_content: String,
    pub overlays: Vec<FieldOverlay>,
    // Presente apenas quando o contrato está Assinado
    pub audit_trail: Option<Vec<AuditEntry>>,
}
