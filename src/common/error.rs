// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use validator::ValidationErrorsKind;

use crate::{
    common::i18n::I18nStore,
    middleware::i18n::Locale,
    models::contract::ContractStatus,
};

// Nosso tipo de erro único. Cada variante tem uma chave de mensagem estável
// (traduzida pelo I18nStore) e um status HTTP.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Token inválido")]
    InvalidToken,

    #[error("Contrato não encontrado")]
    ContractNotFound,

    // --- Modelo do documento ---
    #[error("Índice de signatário inválido: {index} (total: {len})")]
    InvalidSignatoryIndex { index: usize, len: usize },

    #[error("Coordenada {axis} fora do intervalo [0, 100]: {value}")]
    CoordinateOutOfRange { axis: &'static str, value: f64 },

    #[error("Área de visualização do documento indisponível")]
    ViewportNotMounted,

    #[error("Campo posicionado inexistente: {0}")]
    InvalidFieldIndex(usize),

    #[error("Signatário duplicado")]
    DuplicateSignatory,

    // --- Ciclo de vida ---
    #[error("Contrato não pode ser editado no status '{0}'")]
    ContractNotEditable(ContractStatus),

    #[error("Transição inválida de '{from}' para '{to}'")]
    InvalidTransition { from: ContractStatus, to: ContractStatus },

    #[error("Conteúdo do contrato ausente")]
    MissingContent,

    #[error("Nenhum signatário definido")]
    MissingSignatories,

    #[error("Signatário {0} não possui campos posicionados")]
    SignatoryWithoutFields(usize),

    // --- Fluxo de assinatura ---
    #[error("Contrato não está aguardando assinatura (status '{0}')")]
    NotAwaitingSignature(ContractStatus),

    #[error("Falha na verificação do signatário")]
    VerificationFailed,

    #[error("Signatário já assinou este contrato")]
    AlreadySigned,

    #[error("Assinatura incompleta: campos pendentes {missing:?}")]
    IncompleteSigning { missing: Vec<usize> },

    #[error("Assinatura em branco")]
    EmptyCapture,

    #[error("Imagem de assinatura inválida: {0}")]
    InvalidCapture(String),

    #[error("Campo {0} não pertence ao signatário verificado")]
    FieldNotOwned(usize),

    // --- Arquivos ---
    #[error("Arquivo PDF inválido")]
    InvalidPdf,

    #[error("Caminho de arquivo inválido")]
    InvalidStoragePath,

    #[error("Arquivo não encontrado")]
    FileNotFound,

    #[error("Fonte não encontrada: {0}")]
    FontNotFound(String),

    // Escrita concorrente com versão desatualizada
    #[error("Conflito de versão")]
    VersionConflict,

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro de E/S: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    // `anyhow::Error` é ótimo para capturar o contexto do erro.
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::ContractNotFound | AppError::FileNotFound => StatusCode::NOT_FOUND,

            AppError::InvalidSignatoryIndex { .. }
            | AppError::CoordinateOutOfRange { .. }
            | AppError::ViewportNotMounted
            | AppError::InvalidFieldIndex(_)
            | AppError::DuplicateSignatory
            | AppError::MissingContent
            | AppError::MissingSignatories
            | AppError::SignatoryWithoutFields(_)
            | AppError::IncompleteSigning { .. }
            | AppError::EmptyCapture
            | AppError::InvalidCapture(_)
            | AppError::InvalidPdf => StatusCode::UNPROCESSABLE_ENTITY,

            AppError::InvalidStoragePath => StatusCode::BAD_REQUEST,

            AppError::ContractNotEditable(_)
            | AppError::InvalidTransition { .. }
            | AppError::NotAwaitingSignature(_)
            | AppError::AlreadySigned
            | AppError::VersionConflict => StatusCode::CONFLICT,

            AppError::VerificationFailed | AppError::FieldNotOwned(_) => StatusCode::FORBIDDEN,

            AppError::FontNotFound(_)
            | AppError::DatabaseError(_)
            | AppError::IoError(_)
            | AppError::JwtError(_)
            | AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Chave usada nos arquivos locales/*.json
    pub fn message_key(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation_failed",
            AppError::InvalidToken => "invalid_token",
            AppError::ContractNotFound => "contract_not_found",
            AppError::InvalidSignatoryIndex { .. } => "invalid_signatory_index",
            AppError::CoordinateOutOfRange { .. } => "coordinate_out_of_range",
            AppError::ViewportNotMounted => "viewport_not_mounted",
            AppError::InvalidFieldIndex(_) => "invalid_field_index",
            AppError::DuplicateSignatory => "duplicate_signatory",
            AppError::ContractNotEditable(_) => "contract_not_editable",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::MissingContent => "missing_content",
            AppError::MissingSignatories => "missing_signatories",
            AppError::SignatoryWithoutFields(_) => "signatory_without_fields",
            AppError::NotAwaitingSignature(ContractStatus::Assinado) => "contract_already_signed",
            AppError::NotAwaitingSignature(_) => "contract_not_signable",
            AppError::VerificationFailed => "verification_failed",
            AppError::AlreadySigned => "already_signed",
            AppError::IncompleteSigning { .. } => "incomplete_signing",
            AppError::EmptyCapture => "empty_capture",
            AppError::InvalidCapture(_) => "invalid_capture",
            AppError::FieldNotOwned(_) => "field_not_owned",
            AppError::InvalidPdf => "invalid_pdf",
            AppError::InvalidStoragePath => "invalid_storage_path",
            AppError::FileNotFound => "file_not_found",
            AppError::VersionConflict => "version_conflict",
            _ => "internal_error",
        }
    }

    /// Converte o erro na resposta localizada. Erros internos são logados aqui
    /// e nunca expõem o detalhe ao cliente.
    pub fn to_api_error(self, locale: &Locale, i18n: &I18nStore) -> ApiError {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Erro Interno do Servidor");
        }

        let error = i18n.translate(&locale.0, self.message_key());

        let details = match self {
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                collect_validation_messages("", &errors, &mut details);
                Some(Value::Object(details))
            }
            AppError::InvalidSignatoryIndex { index, len } => {
                Some(json!({ "signatoryIndex": index, "signatories": len }))
            }
            AppError::CoordinateOutOfRange { axis, value } => {
                Some(json!({ "axis": axis, "value": value }))
            }
            AppError::InvalidFieldIndex(index) | AppError::FieldNotOwned(index) => {
                Some(json!({ "fieldIndex": index }))
            }
            AppError::SignatoryWithoutFields(index) => Some(json!({ "signatoryIndex": index })),
            AppError::IncompleteSigning { missing } => Some(json!({ "missingFields": missing })),
            AppError::ContractNotEditable(status) | AppError::NotAwaitingSignature(status) => {
                Some(json!({ "status": status }))
            }
            AppError::InvalidTransition { from, to } => Some(json!({ "from": from, "to": to })),
            _ => None,
        };

        ApiError { status, error, details }
    }
}

// Achata os erros do validator: "signatories[0].cpf" -> ["mensagem"]
fn collect_validation_messages(
    prefix: &str,
    errors: &validator::ValidationErrors,
    out: &mut serde_json::Map<String, Value>,
) {
    for (field, kind) in errors.errors() {
        let key = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                out.insert(key, json!(messages));
            }
            ValidationErrorsKind::Struct(inner) => collect_validation_messages(&key, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_validation_messages(&format!("{key}[{index}]"), inner, out);
                }
            }
        }
    }
}

// O erro que efetivamente sai na resposta HTTP, já traduzido.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> I18nStore {
        I18nStore::bundled().expect("catálogos embutidos")
    }

    #[test]
    fn verification_failure_is_generic_and_localized() {
        let api = AppError::VerificationFailed
            .to_api_error(&Locale("pt".into()), &store());
        assert_eq!(api.status, StatusCode::FORBIDDEN);
        assert!(api.details.is_none());
        assert!(!api.error.to_lowercase().contains("cpf"));

        let api_en = AppError::VerificationFailed
            .to_api_error(&Locale("en".into()), &store());
        assert_ne!(api.error, api_en.error);
    }

    #[test]
    fn incomplete_signing_reports_missing_fields() {
        let api = AppError::IncompleteSigning { missing: vec![1, 3] }
            .to_api_error(&Locale("pt".into()), &store());
        assert_eq!(api.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(api.details, Some(json!({ "missingFields": [1, 3] })));
    }

    #[test]
    fn signed_contract_has_its_own_message() {
        let signed = AppError::NotAwaitingSignature(ContractStatus::Assinado);
        let draft = AppError::NotAwaitingSignature(ContractStatus::EmElaboracao);
        assert_ne!(signed.message_key(), draft.message_key());
        assert_eq!(signed.status(), StatusCode::CONFLICT);
    }
}
