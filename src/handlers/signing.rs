// src/handlers/signing.rs
//
// Rotas públicas do signatário (link enviado pelo autor). Não exigem login:
// a verificação por nome + documento emite um token curto de sessão.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::SignerSession, i18n::Locale},
    models::signing::{SigningResult, SigningView, VerificationResponse},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPayload {
    #[validate(length(min = 1, message = "Informe seu nome"))]
    #[schema(example = "Ana Souza")]
    pub name: String,

    #[validate(length(min = 1, message = "Informe seu documento"))]
    #[schema(example = "111.111.111-11")]
    pub cpf: String,
}

// Serialize: o `length` do validator anexa o valor rejeitado ao erro
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CapturePayload {
    pub field_index: usize,
    // PNG ou JPEG em data URL, exportado do canvas de assinatura
    #[schema(example = "data:image/png;base64,iVBORw0KGgo...")]
    pub data_url: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignPayload {
    #[validate(length(min = 1, message = "Nenhum campo foi assinado"))]
    pub captures: Vec<CapturePayload>,
}

// POST /{prefixo}/{id}/verify
#[utoipa::path(
    post,
    path = "/assinar/{id}/verify",
    tag = "Assinatura",
    description = "Prefixo padrão `assinar`, configurável por `SIGN_PREFIX`.",
    params(("id" = Uuid, Path, description = "ID do contrato")),
    request_body = VerifyPayload,
    responses(
        (status = 200, description = "Signatário verificado", body = VerificationResponse),
        (status = 403, description = "Nome e documento não conferem"),
        (status = 409, description = "Contrato indisponível ou signatário já assinou")
    )
)]
pub async fn verify_signatory(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerifyPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let (signatory_index, view) = app_state
        .contract_service
        .verify_signatory(id, &payload.name, &payload.cpf)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    let (signing_token, expires_at) = app_state
        .auth_service
        .issue_signing_token(id, signatory_index)
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(VerificationResponse {
        signing_token,
        expires_at,
        view,
    }))
}

// GET /{prefixo}/{id}/session
#[utoipa::path(
    get,
    path = "/assinar/{id}/session",
    tag = "Assinatura",
    description = "Prefixo padrão `assinar`, configurável por `SIGN_PREFIX`.",
    params(("id" = Uuid, Path, description = "ID do contrato")),
    responses(
        (status = 200, description = "Tela de assinatura do signatário verificado", body = SigningView),
        (status = 401, description = "Token de sessão ausente ou inválido")
    ),
    security(("signing_jwt" = []))
)]
pub async fn signing_session(
    State(app_state): State<AppState>,
    locale: Locale,
    session: SignerSession,
) -> Result<impl IntoResponse, ApiError> {
    let view = app_state
        .contract_service
        .signing_view(session.contract_id, session.signatory_index)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(view))
}

// POST /{prefixo}/{id}/sign
#[utoipa::path(
    post,
    path = "/assinar/{id}/sign",
    tag = "Assinatura",
    description = "Prefixo padrão `assinar`, configurável por `SIGN_PREFIX`.",
    params(("id" = Uuid, Path, description = "ID do contrato")),
    request_body = SignPayload,
    responses(
        (status = 200, description = "Assinatura registrada", body = SigningResult),
        (status = 401, description = "Token de sessão ausente ou inválido"),
        (status = 409, description = "Signatário já assinou ou contrato indisponível"),
        (status = 422, description = "Campos pendentes ou assinatura em branco")
    ),
    security(("signing_jwt" = []))
)]
pub async fn sign_contract(
    State(app_state): State<AppState>,
    locale: Locale,
    session: SignerSession,
    Json(payload): Json<SignPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let captures = payload
        .captures
        .into_iter()
        .map(|c| (c.field_index, c.data_url))
        .collect();

    let result = app_state
        .contract_service
        .sign(session.contract_id, session.signatory_index, captures)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(result))
}
