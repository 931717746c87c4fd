// src/db/memory_store.rs
//
// Armazenamento em memória. Usado quando DATABASE_URL não está definida
// (desenvolvimento local) e nos testes.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{ContractPatch, ContractStore, SignatureWrite},
    models::contract::{Contract, ContractStatus, NewContract},
    services::signing,
};

#[derive(Default)]
pub struct InMemoryContractStore {
    contracts: RwLock<HashMap<Uuid, Contract>>,
}

impl InMemoryContractStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContractStore for InMemoryContractStore {
    async fn add(&self, new: NewContract) -> Result<Contract, AppError> {
        let now = Utc::now();
        let contract = Contract {
            id: Uuid::new_v4(),
            title: new.title,
            client_name: new.client_name,
            client_id: new.client_id,
            contract_content: String::new(),
            signatories: Vec::new(),
            placed_fields: Vec::new(),
            status: ContractStatus::Pendente,
            is_pdf: false,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.contracts
            .write()
            .await
            .insert(contract.id, contract.clone());
        Ok(contract)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Contract>, AppError> {
        Ok(self.contracts.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Contract>, AppError> {
        let mut all: Vec<Contract> = self.contracts.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn update(&self, id: Uuid, expected_version: i64, patch: ContractPatch) -> Result<Contract, AppError> {
        let mut contracts = self.contracts.write().await;
        let current = contracts.get(&id).ok_or(AppError::ContractNotFound)?;
        if current.version != expected_version {
            return Err(AppError::VersionConflict);
        }

        let mut next = current.clone();
        if let Some(title) = patch.title {
            next.title = title;
        }
        if let Some(content) = patch.contract_content {
            next.contract_content = content;
        }
        if let Some(is_pdf) = patch.is_pdf {
            next.is_pdf = is_pdf;
        }
        if let Some(status) = patch.status {
            next.status = status;
        }
        if let Some((signatories, fields)) = patch.parties {
            next.signatories = signatories;
            next.placed_fields = fields;
        }
        next.check_invariants()?;
        next.version += 1;
        next.updated_at = Utc::now();

        contracts.insert(id, next.clone());
        Ok(next)
    }

    async fn sign(&self, id: Uuid, write: SignatureWrite) -> Result<Contract, AppError> {
        // Tudo sob o mesmo lock de escrita: leitura, validação, escrita e recálculo do status
        let mut contracts = self.contracts.write().await;
        let contract = contracts.get_mut(&id).ok_or(AppError::ContractNotFound)?;

        let mut next = contract.clone();
        signing::apply_signature(&mut next, &write, Utc::now())?;
        *contract = next.clone();
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::contract::{FieldType, PlacedField, Signatory};
    use crate::services::signature_image::fixtures::stroke;

    async fn awaiting(store: &InMemoryContractStore) -> Contract {
        let c = store
            .add(NewContract {
                title: "Contrato".into(),
                client_name: "Cliente".into(),
                client_id: None,
            })
            .await
            .unwrap();
        let patch = ContractPatch {
            contract_content: Some("<p>texto</p>".into()),
            status: Some(ContractStatus::AguardandoAssinatura),
            parties: Some((
                vec![
                    Signatory::new("Ana", "111.111.111-11"),
                    Signatory::new("Bruno", "222.222.222-22"),
                ],
                vec![
                    PlacedField::new(0, FieldType::Signature, 10.0, 90.0).unwrap(),
                    PlacedField::new(1, FieldType::Signature, 60.0, 90.0).unwrap(),
                ],
            )),
            ..Default::default()
        };
        store.update(c.id, c.version, patch).await.unwrap()
    }

    fn write_for(index: usize) -> SignatureWrite {
        SignatureWrite {
            signatory_index: index,
            signature_data_url: stroke(),
            field_captures: vec![(index, stroke())],
        }
    }

    #[tokio::test]
    async fn stale_update_is_a_conflict() {
        let store = InMemoryContractStore::new();
        let c = awaiting(&store).await;

        let stale = ContractPatch {
            title: Some("Outro título".into()),
            ..Default::default()
        };
        let err = store.update(c.id, c.version - 1, stale).await.unwrap_err();
        assert!(matches!(err, AppError::VersionConflict));
        assert_eq!(store.get(c.id).await.unwrap().unwrap().title, "Contrato");
    }

    #[tokio::test]
    async fn update_rejects_orphan_fields() {
        let store = InMemoryContractStore::new();
        let c = awaiting(&store).await;
        let patch = ContractPatch {
            parties: Some((
                vec![Signatory::new("Ana", "111.111.111-11")],
                c.placed_fields.clone(),
            )),
            ..Default::default()
        };
        assert!(store.update(c.id, c.version, patch).await.is_err());
    }

    #[tokio::test]
    async fn concurrent_signatures_do_not_clobber_each_other() {
        let store = Arc::new(InMemoryContractStore::new());
        let c = awaiting(&store).await;

        let (a, b) = tokio::join!(
            {
                let store = store.clone();
                async move { store.sign(c.id, write_for(0)).await }
            },
            {
                let store = store.clone();
                async move { store.sign(c.id, write_for(1)).await }
            }
        );
        a.unwrap();
        b.unwrap();

        let after = store.get(c.id).await.unwrap().unwrap();
        assert!(after.signatories.iter().all(|s| s.signed));
        assert!(after.placed_fields.iter().all(|f| f.captured_image.is_some()));
        assert_eq!(after.status, ContractStatus::Assinado);
    }

    #[tokio::test]
    async fn signed_contract_is_terminal() {
        let store = InMemoryContractStore::new();
        let c = awaiting(&store).await;
        store.sign(c.id, write_for(0)).await.unwrap();
        let done = store.sign(c.id, write_for(1)).await.unwrap();
        assert_eq!(done.status, ContractStatus::Assinado);

        assert!(matches!(
            store.sign(c.id, write_for(0)).await,
            Err(AppError::NotAwaitingSignature(ContractStatus::Assinado))
        ));
        let still = store.get(c.id).await.unwrap().unwrap();
        assert_eq!(still, done);
    }

    #[tokio::test]
    async fn second_signature_by_same_party_is_rejected() {
        let store = InMemoryContractStore::new();
        let c = awaiting(&store).await;
        store.sign(c.id, write_for(0)).await.unwrap();
        assert!(matches!(
            store.sign(c.id, write_for(0)).await,
            Err(AppError::AlreadySigned)
        ));
    }
}
