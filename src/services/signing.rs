// src/services/signing.rs
//
// Verificação do signatário e sessão de assinatura:
// Unverified -> Verified -> Signed

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::SignatureWrite,
    models::{
        contract::{Contract, FieldType, Signatory},
        signing::{SigningField, SigningFieldState, SigningView},
    },
    services::{lifecycle, signature_image},
};

// --- NORMALIZAÇÃO ---

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

// Mantém apenas os dígitos ("111.111.111-11" -> "11111111111")
pub fn normalize_cpf(cpf: &str) -> String {
    cpf.chars().filter(char::is_ascii_digit).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Verified(usize),
    AlreadySigned,
    NoMatch,
}

/// Procura o par (nome, documento) exato entre os signatários, já normalizados.
pub fn find_signatory(signatories: &[Signatory], name: &str, cpf: &str) -> Verification {
    let name = normalize_name(name);
    let cpf = normalize_cpf(cpf);
    if name.is_empty() || cpf.is_empty() {
        return Verification::NoMatch;
    }

    signatories
        .iter()
        .position(|s| normalize_name(&s.name) == name && normalize_cpf(&s.cpf) == cpf)
        .map_or(Verification::NoMatch, |index| {
            if signatories[index].signed {
                Verification::AlreadySigned
            } else {
                Verification::Verified(index)
            }
        })
}

// --- SESSÃO ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unverified,
    Verified { signatory_index: usize },
    Signed { signatory_index: usize },
}

#[derive(Debug, Clone)]
pub struct SigningSession {
    contract_id: Uuid,
    state: SessionState,
    // Capturas ainda não persistidas, por índice do campo
    captures: BTreeMap<usize, String>,
}

impl SigningSession {
    pub fn new(contract_id: Uuid) -> Self {
        Self {
            contract_id,
            state: SessionState::Unverified,
            captures: BTreeMap::new(),
        }
    }

    /// Reabre uma sessão já verificada (token de assinatura).
    pub fn resume(contract: &Contract, signatory_index: usize) -> Result<Self, AppError> {
        lifecycle::ensure_signable(contract.status)?;
        let signatory = contract
            .signatories
            .get(signatory_index)
            .ok_or(AppError::InvalidToken)?;
        if signatory.signed {
            return Err(AppError::AlreadySigned);
        }
        Ok(Self {
            contract_id: contract.id,
            state: SessionState::Verified { signatory_index },
            captures: BTreeMap::new(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn signatory_index(&self) -> Option<usize> {
        match self.state {
            SessionState::Unverified => None,
            SessionState::Verified { signatory_index } | SessionState::Signed { signatory_index } => {
                Some(signatory_index)
            }
        }
    }

    pub fn verify(&mut self, contract: &Contract, name: &str, cpf: &str) -> Result<usize, AppError> {
        self.check_contract(contract)?;

        // Identidade antes do status: quem não confere não descobre nada do contrato
        match find_signatory(&contract.signatories, name, cpf) {
            Verification::Verified(index) => {
                lifecycle::ensure_signable(contract.status)?;
                self.state = SessionState::Verified {
                    signatory_index: index,
                };
                self.captures.clear();
                Ok(index)
            }
            Verification::AlreadySigned => Err(AppError::AlreadySigned),
            Verification::NoMatch => Err(AppError::VerificationFailed),
        }
    }

    /// Guarda a captura de um campo do signatário verificado (ainda não persiste).
    pub fn capture(&mut self, contract: &Contract, field_index: usize, data_url: String) -> Result<(), AppError> {
        self.check_contract(contract)?;
        let signatory_index = self.verified_index()?;
        let field = contract
            .placed_fields
            .get(field_index)
            .ok_or(AppError::InvalidFieldIndex(field_index))?;
        if field.signatory_index != signatory_index {
            return Err(AppError::FieldNotOwned(field_index));
        }

        signature_image::validate_capture(&data_url)?;
        self.captures.insert(field_index, data_url);
        Ok(())
    }

    pub fn missing_fields(&self, contract: &Contract) -> Vec<usize> {
        let Some(signatory_index) = self.signatory_index() else {
            return Vec::new();
        };
        contract
            .fields_of(signatory_index)
            .map(|(i, _)| i)
            .filter(|i| !self.captures.contains_key(i))
            .collect()
    }

    // Habilita o botão "Confirmar e assinar"
    pub fn can_finalize(&self, contract: &Contract) -> bool {
        matches!(self.state, SessionState::Verified { .. })
            && contract.status == crate::models::contract::ContractStatus::AguardandoAssinatura
            && self.missing_fields(contract).is_empty()
    }

    /// Monta a escrita única do signatário. A sessão só passa a `Signed`
    /// depois que o armazenamento confirmar (`mark_signed`).
    pub fn finalize(&self, contract: &Contract) -> Result<SignatureWrite, AppError> {
        self.check_contract(contract)?;
        lifecycle::ensure_signable(contract.status)?;
        let signatory_index = self.verified_index()?;

        let missing = self.missing_fields(contract);
        if !missing.is_empty() {
            return Err(AppError::IncompleteSigning { missing });
        }

        // A imagem principal é a do primeiro campo de assinatura; sem ele, a do primeiro campo
        let primary = contract
            .fields_of(signatory_index)
            .find(|(_, f)| f.field_type == FieldType::Signature)
            .or_else(|| contract.fields_of(signatory_index).next())
            .and_then(|(i, _)| self.captures.get(&i))
            .cloned()
            .ok_or(AppError::SignatoryWithoutFields(signatory_index))?;

        Ok(SignatureWrite {
            signatory_index,
            signature_data_url: primary,
            field_captures: self
                .captures
                .iter()
                .map(|(i, url)| (*i, url.clone()))
                .collect(),
        })
    }

    pub fn mark_signed(&mut self) {
        if let SessionState::Verified { signatory_index } = self.state {
            self.state = SessionState::Signed { signatory_index };
        }
    }

    fn verified_index(&self) -> Result<usize, AppError> {
        match self.state {
            SessionState::Verified { signatory_index } => Ok(signatory_index),
            SessionState::Signed { .. } => Err(AppError::AlreadySigned),
            SessionState::Unverified => Err(AppError::VerificationFailed),
        }
    }

    fn check_contract(&self, contract: &Contract) -> Result<(), AppError> {
        if contract.id != self.contract_id {
            return Err(AppError::ContractNotFound);
        }
        Ok(())
    }
}

/// Aplica a escrita de assinatura no documento e recalcula o status na mesma operação.
/// Usada pelo armazenamento em memória; o repositório Postgres faz o mesmo em SQL.
pub fn apply_signature(contract: &mut Contract, write: &SignatureWrite, now: DateTime<Utc>) -> Result<(), AppError> {
    lifecycle::ensure_signable(contract.status)?;
    let len = contract.signatories.len();
    let signatory = contract
        .signatories
        .get(write.signatory_index)
        .ok_or(AppError::InvalidSignatoryIndex {
            index: write.signatory_index,
            len,
        })?;
    if signatory.signed {
        return Err(AppError::AlreadySigned);
    }
    for (field_index, _) in &write.field_captures {
        let field = contract
            .placed_fields
            .get(*field_index)
            .ok_or(AppError::InvalidFieldIndex(*field_index))?;
        if field.signatory_index != write.signatory_index {
            return Err(AppError::FieldNotOwned(*field_index));
        }
    }

    // Só altera depois de validar tudo: nada de escrita parcial
    for (field_index, url) in &write.field_captures {
        contract.placed_fields[*field_index].captured_image = Some(url.clone());
    }
    let signatory = &mut contract.signatories[write.signatory_index];
    signatory.signed = true;
    signatory.signature_data_url = Some(write.signature_data_url.clone());
    signatory.signed_at = Some(now);

    contract.status = lifecycle::compute_status(&contract.signatories);
    contract.updated_at = now;
    contract.version += 1;
    Ok(())
}

/// Tela de assinatura para o signatário verificado.
pub fn signing_view(contract: &Contract, signatory_index: usize) -> SigningView {
    let fields = contract
        .placed_fields
        .iter()
        .enumerate()
        .map(|(field_index, field)| {
            let state = if field.signatory_index == signatory_index {
                SigningFieldState::Own
            } else if contract
                .signatories
                .get(field.signatory_index)
                .is_some_and(|s| s.signed)
            {
                SigningFieldState::Signed
            } else {
                SigningFieldState::Awaiting
            };
            SigningField {
                field_index,
                field_type: field.field_type,
                x: field.x,
                y: field.y,
                state,
            }
        })
        .collect();

    SigningView {
        contract_id: contract.id,
        title: contract.title.clone(),
        contract_content: contract.contract_content.clone(),
        is_pdf: contract.is_pdf,
        status: contract.status,
        signatory_index,
        signatory_name: contract
            .signatories
            .get(signatory_index)
            .map(|s| s.name.clone())
            .unwrap_or_default(),
        fields,
    }
}
