// src/services/lifecycle.rs
//
// Máquina de estados do contrato:
// Pendente -> Em Elaboração -> Aguardando Assinatura -> Assinado (terminal)

use crate::{
    common::error::AppError,
    models::contract::{self, Contract, ContractStatus, Signatory},
};

/// Transições permitidas. A passagem para `Assinado` só acontece via
/// `compute_status` depois de uma escrita de assinatura.
pub fn can_transition(from: ContractStatus, to: ContractStatus) -> bool {
    use ContractStatus::*;
    matches!(
        (from, to),
        (Pendente, EmElaboracao)
            | (EmElaboracao, EmElaboracao)
            | (EmElaboracao, AguardandoAssinatura)
            | (AguardandoAssinatura, Assinado)
    )
}

/// Status em que o autor ainda pode editar signatários, conteúdo e campos.
pub fn ensure_authoring(status: ContractStatus) -> Result<(), AppError> {
    match status {
        ContractStatus::Pendente | ContractStatus::EmElaboracao => Ok(()),
        other => Err(AppError::ContractNotEditable(other)),
    }
}

pub fn ensure_signable(status: ContractStatus) -> Result<(), AppError> {
    match status {
        ContractStatus::AguardandoAssinatura => Ok(()),
        other => Err(AppError::NotAwaitingSignature(other)),
    }
}

// Única derivação do status após uma assinatura.
pub fn compute_status(signatories: &[Signatory]) -> ContractStatus {
    if contract::everyone_signed(signatories) {
        ContractStatus::Assinado
    } else {
        ContractStatus::AguardandoAssinatura
    }
}

fn transition(contract: &mut Contract, to: ContractStatus) -> Result<(), AppError> {
    if !can_transition(contract.status, to) {
        return Err(AppError::InvalidTransition {
            from: contract.status,
            to,
        });
    }
    tracing::info!(
        contract_id = %contract.id,
        from = %contract.status,
        to = %to,
        "Transição de status do contrato"
    );
    contract.status = to;
    Ok(())
}

/// Pendente -> Em Elaboração: o autor escolheu um modelo HTML ou enviou um PDF.
/// Trocar o conteúdo durante a elaboração também é permitido.
pub fn begin_drafting(contract: &mut Contract, content: String, is_pdf: bool) -> Result<(), AppError> {
    if content.trim().is_empty() {
        return Err(AppError::MissingContent);
    }
    transition(contract, ContractStatus::EmElaboracao)?;
    contract.contract_content = content;
    contract.is_pdf = is_pdf;
    Ok(())
}

/// Em Elaboração -> Aguardando Assinatura.
pub fn send_for_signature(contract: &mut Contract) -> Result<(), AppError> {
    ensure_authoring(contract.status)?;
    if !contract.has_content() {
        return Err(AppError::MissingContent);
    }
    if contract.signatories.is_empty() {
        return Err(AppError::MissingSignatories);
    }
    if let Some(index) =
        (0..contract.signatories.len()).find(|&i| contract.fields_of(i).next().is_none())
    {
        return Err(AppError::SignatoryWithoutFields(index));
    }
    contract.check_invariants()?;
    transition(contract, ContractStatus::AguardandoAssinatura)
}
