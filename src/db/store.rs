// src/db/store.rs

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::contract::{Contract, ContractStatus, NewContract, PlacedField, Signatory},
};

/// Escrita de autoria. Campos `None` ficam como estão.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractPatch {
    pub title: Option<String>,
    pub contract_content: Option<String>,
    pub is_pdf: Option<bool>,
    pub status: Option<ContractStatus>,
    // Signatários e campos andam juntos: os índices dos campos apontam para a lista
    pub parties: Option<(Vec<Signatory>, Vec<PlacedField>)>,
}

impl ContractPatch {
    // Patch completo a partir de um contrato editado em memória
    pub fn authoring(contract: &Contract) -> Self {
        Self {
            title: Some(contract.title.clone()),
            contract_content: Some(contract.contract_content.clone()),
            is_pdf: Some(contract.is_pdf),
            status: Some(contract.status),
            parties: Some((contract.signatories.clone(), contract.placed_fields.clone())),
        }
    }
}

/// Escrita única de um signatário: flag, imagem, data e as capturas por campo.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureWrite {
    pub signatory_index: usize,
    pub signature_data_url: String,
    pub field_captures: Vec<(usize, String)>,
}

/// Armazenamento de contratos.
///
/// `update` é leitura-modificação-escrita otimista: falha com
/// `AppError::VersionConflict` se a versão mudou desde a leitura.
/// `sign` é atômica e só toca o signatário informado, recalculando o status
/// na mesma operação; assinaturas simultâneas de partes diferentes não se
/// sobrescrevem.
#[async_trait]
pub trait ContractStore: Send + Sync {
    async fn add(&self, new: NewContract) -> Result<Contract, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<Contract>, AppError>;

    async fn list(&self) -> Result<Vec<Contract>, AppError>;

    async fn update(&self, id: Uuid, expected_version: i64, patch: ContractPatch) -> Result<Contract, AppError>;

    async fn sign(&self, id: Uuid, write: SignatureWrite) -> Result<Contract, AppError>;
}
