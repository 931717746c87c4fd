// src/models/contract.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

// --- ENUMS ---

// Mapeia o CREATE TYPE contract_status do banco. Os rótulos são os mesmos
// exibidos na interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "contract_status")]
pub enum ContractStatus {
    #[serde(rename = "Pendente")]
    #[sqlx(rename = "Pendente")]
    Pendente,
    #[serde(rename = "Em Elaboração")]
    #[sqlx(rename = "Em Elaboração")]
    EmElaboracao,
    #[serde(rename = "Aguardando Assinatura")]
    #[sqlx(rename = "Aguardando Assinatura")]
    AguardandoAssinatura,
    #[serde(rename = "Assinado")]
    #[sqlx(rename = "Assinado")]
    Assinado,
}

impl ContractStatus {
    pub fn label(self) -> &'static str {
        match self {
            ContractStatus::Pendente => "Pendente",
            ContractStatus::EmElaboracao => "Em Elaboração",
            ContractStatus::AguardandoAssinatura => "Aguardando Assinatura",
            ContractStatus::Assinado => "Assinado",
        }
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// Mapeia o CREATE TYPE placed_field_type do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "placed_field_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Signature,
    Cpf,
    Rubric,
}

impl FieldType {
    pub fn label(self) -> &'static str {
        match self {
            FieldType::Signature => "Assinatura",
            FieldType::Cpf => "CPF",
            FieldType::Rubric => "Rubrica",
        }
    }
}

// --- SIGNATÁRIO ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Signatory {
    #[schema(example = "Ana Souza")]
    pub name: String,
    #[schema(example = "111.111.111-11")]
    pub cpf: String,
    #[serde(default)]
    pub signed: bool,
    // Só é preenchido no momento da assinatura, junto com `signed` e `signed_at`
    #[serde(default)]
    pub signature_data_url: Option<String>,
    #[serde(default)]
    pub signed_at: Option<DateTime<Utc>>,
}

impl Signatory {
    pub fn new(name: impl Into<String>, cpf: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cpf: cpf.into(),
            signed: false,
            signature_data_url: None,
            signed_at: None,
        }
    }
}

// --- CAMPO POSICIONADO ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlacedField {
    // Índice em `Contract::signatories`. Referência, nunca posse.
    pub signatory_index: usize,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    // Percentuais (0..=100) da largura e da altura total do documento
    #[schema(example = 42.5)]
    pub x: f64,
    #[schema(example = 87.0)]
    pub y: f64,
    // Imagem capturada para este campo específico, gravada na assinatura
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_image: Option<String>,
}

impl PlacedField {
    pub fn new(signatory_index: usize, field_type: FieldType, x: f64, y: f64) -> Result<Self, AppError> {
        check_coordinate("x", x)?;
        check_coordinate("y", y)?;
        Ok(Self {
            signatory_index,
            field_type,
            x,
            y,
            captured_image: None,
        })
    }
}

fn check_coordinate(axis: &'static str, value: f64) -> Result<(), AppError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(AppError::CoordinateOutOfRange { axis, value })
    }
}

// --- CONTRATO ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: Uuid,
    #[schema(example = "Contrato de Prestação de Serviços")]
    pub title: String,
    #[schema(example = "Maria da Silva")]
    pub client_name: String,
    pub client_id: Option<Uuid>,

    // HTML do corpo do contrato, ou a URL do PDF quando `is_pdf`
    pub contract_content: String,
    pub signatories: Vec<Signatory>,
    pub placed_fields: Vec<PlacedField>,
    pub status: ContractStatus,
    pub is_pdf: bool,

    // Incrementada a cada escrita (controle de concorrência otimista)
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Estratégia de renderização do conteúdo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractContent<'a> {
    Html(&'a str),
    Pdf(&'a str),
}

// Dados para abrir uma solicitação de contrato (status Pendente)
#[derive(Debug, Clone)]
pub struct NewContract {
    pub title: String,
    pub client_name: String,
    pub client_id: Option<Uuid>,
}

/// Regra única de conclusão: há signatários e todos assinaram.
/// `lifecycle::compute_status` deriva o status a partir daqui.
pub fn everyone_signed(signatories: &[Signatory]) -> bool {
    !signatories.is_empty() && signatories.iter().all(|s| s.signed)
}

impl Contract {
    pub fn content(&self) -> ContractContent<'_> {
        if self.is_pdf {
            ContractContent::Pdf(&self.contract_content)
        } else {
            ContractContent::Html(&self.contract_content)
        }
    }

    pub fn has_content(&self) -> bool {
        !self.contract_content.trim().is_empty()
    }

    /// Adiciona um campo ao final da lista. Rejeita índice de signatário fora da faixa.
    pub fn push_field(&mut self, field: PlacedField) -> Result<usize, AppError> {
        self.check_field(&field)?;
        self.placed_fields.push(field);
        Ok(self.placed_fields.len() - 1)
    }

    pub fn remove_field(&mut self, index: usize) -> Result<PlacedField, AppError> {
        if index >= self.placed_fields.len() {
            return Err(AppError::InvalidFieldIndex(index));
        }
        Ok(self.placed_fields.remove(index))
    }

    /// Substitui a lista de signatários. A nova lista precisa manter válidos
    /// os índices dos campos já posicionados.
    pub fn replace_signatories(&mut self, signatories: Vec<Signatory>) -> Result<(), AppError> {
        if let Some(field) = self
            .placed_fields
            .iter()
            .find(|f| f.signatory_index >= signatories.len())
        {
            return Err(AppError::InvalidSignatoryIndex {
                index: field.signatory_index,
                len: signatories.len(),
            });
        }
        self.signatories = signatories;
        Ok(())
    }

    /// Campos de um signatário, com o índice de cada campo na lista geral.
    pub fn fields_of(&self, signatory_index: usize) -> impl Iterator<Item = (usize, &PlacedField)> {
        self.placed_fields
            .iter()
            .enumerate()
            .filter(move |(_, f)| f.signatory_index == signatory_index)
    }

    pub fn all_signed(&self) -> bool {
        everyone_signed(&self.signatories)
    }

    pub fn check_invariants(&self) -> Result<(), AppError> {
        for field in &self.placed_fields {
            self.check_field(field)?;
        }
        if self.status == ContractStatus::Assinado && !self.all_signed() {
            return Err(AppError::InvalidTransition {
                from: ContractStatus::AguardandoAssinatura,
                to: ContractStatus::Assinado,
            });
        }
        Ok(())
    }

    fn check_field(&self, field: &PlacedField) -> Result<(), AppError> {
        if field.signatory_index >= self.signatories.len() {
            return Err(AppError::InvalidSignatoryIndex {
                index: field.signatory_index,
                len: self.signatories.len(),
            });
        }
        check_coordinate("x", field.x)?;
        check_coordinate("y", field.y)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn contract(signatories: Vec<Signatory>) -> Contract {
        let now = Utc::now();
        Contract {
            id: Uuid::new_v4(),
            title: "Contrato de Locação".into(),
            client_name: "Maria da Silva".into(),
            client_id: None,
            contract_content: "<p>Cláusula primeira</p>".into(),
            signatories,
            placed_fields: Vec::new(),
            status: ContractStatus::EmElaboracao,
            is_pdf: false,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    // Ana e Bruno, cada um com um campo de assinatura
    pub fn ana_and_bruno() -> Contract {
        let mut c = contract(vec![
            Signatory::new("Ana", "111.111.111-11"),
            Signatory::new("Bruno", "222.222.222-22"),
        ]);
        c.push_field(PlacedField::new(0, FieldType::Signature, 20.0, 80.0).unwrap())
            .unwrap();
        c.push_field(PlacedField::new(1, FieldType::Signature, 70.0, 80.0).unwrap())
            .unwrap();
        c.status = ContractStatus::AguardandoAssinatura;
        c
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn rejects_field_for_missing_signatory() {
        let mut c = contract(vec![Signatory::new("Ana", "1"), Signatory::new("Bruno", "2")]);
        let field = PlacedField::new(5, FieldType::Signature, 10.0, 10.0).unwrap();

        let err = c.push_field(field).unwrap_err();
        assert!(matches!(err, AppError::InvalidSignatoryIndex { index: 5, len: 2 }));
        assert!(c.placed_fields.is_empty());
    }

    #[test]
    fn rejects_coordinates_outside_the_document() {
        for (x, y) in [(-0.1, 50.0), (50.0, 100.5), (f64::NAN, 1.0), (1.0, f64::INFINITY)] {
            assert!(PlacedField::new(0, FieldType::Rubric, x, y).is_err(), "{x} {y}");
        }
        assert!(PlacedField::new(0, FieldType::Rubric, 0.0, 100.0).is_ok());
    }

    #[test]
    fn shrinking_signatories_cannot_orphan_fields() {
        let mut c = ana_and_bruno();
        let err = c
            .replace_signatories(vec![Signatory::new("Ana", "111.111.111-11")])
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidSignatoryIndex { index: 1, len: 1 }));
        assert_eq!(c.signatories.len(), 2);
    }

    #[test]
    fn invariants_catch_tampered_fields() {
        let mut c = ana_and_bruno();
        assert!(c.check_invariants().is_ok());

        c.placed_fields[0].signatory_index = 9;
        assert!(c.check_invariants().is_err());
    }

    #[test]
    fn signed_status_requires_every_signatory() {
        let mut c = ana_and_bruno();
        c.signatories[0].signed = true;
        c.status = ContractStatus::Assinado;
        assert!(c.check_invariants().is_err());

        c.signatories[1].signed = true;
        assert!(c.check_invariants().is_ok());
    }

    #[test]
    fn fields_of_keeps_global_indices() {
        let mut c = ana_and_bruno();
        c.push_field(PlacedField::new(0, FieldType::Cpf, 20.0, 90.0).unwrap())
            .unwrap();
        let ana: Vec<usize> = c.fields_of(0).map(|(i, _)| i).collect();
        assert_eq!(ana, vec![0, 2]);
    }

    #[test]
    fn status_serializes_with_display_labels() {
        let json = serde_json::to_string(&ContractStatus::AguardandoAssinatura).unwrap();
        assert_eq!(json, "\"Aguardando Assinatura\"");
        let back: ContractStatus = serde_json::from_str("\"Em Elaboração\"").unwrap();
        assert_eq!(back, ContractStatus::EmElaboracao);

        let field = PlacedField::new(0, FieldType::Rubric, 1.0, 2.0).unwrap();
        let value = serde_json::to_value(&field).unwrap();
        assert_eq!(value["type"], "rubric");
        assert_eq!(value["signatoryIndex"], 0);
    }
}
