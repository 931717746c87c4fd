// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, Path, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use uuid::Uuid;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    services::auth::AuthorClaims,
};

async fn locale_of(parts: &mut Parts, state: &AppState) -> Locale {
    Locale::from_request_parts(parts, state)
        .await
        .unwrap_or_else(|never| match never {})
}

// O middleware das rotas do autor: valida o Bearer e guarda as claims na requisição
pub async fn author_guard(
    State(app_state): State<AppState>,
    locale: Locale,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        return Err(AppError::InvalidToken.to_api_error(&locale, &app_state.i18n_store));
    };

    let claims = app_state
        .auth_service
        .validate_author_token(bearer.token())
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    // Insere as claims nos "extensions" da requisição
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

// Extrator para obter o autor autenticado diretamente nos handlers
pub struct AuthenticatedAuthor(pub AuthorClaims);

impl FromRequestParts<AppState> for AuthenticatedAuthor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<AuthorClaims>().cloned() {
            Some(claims) => Ok(AuthenticatedAuthor(claims)),
            None => {
                let locale = locale_of(parts, state).await;
                Err(AppError::InvalidToken.to_api_error(&locale, &state.i18n_store))
            }
        }
    }
}

/// Sessão de assinatura já verificada, vinda do token emitido em `/verify`.
/// O token só vale para o contrato do caminho.
#[derive(Debug, Clone, Copy)]
pub struct SignerSession {
    pub contract_id: Uuid,
    pub signatory_index: usize,
}

impl FromRequestParts<AppState> for SignerSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let locale = locale_of(parts, state).await;
        let reject = |err: AppError| err.to_api_error(&locale, &state.i18n_store);

        let Path(contract_id) = Path::<Uuid>::from_request_parts(parts, state)
            .await
            .map_err(|_| reject(AppError::ContractNotFound))?;

        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| reject(AppError::InvalidToken))?;

        let claims = state
            .auth_service
            .validate_signing_token(bearer.token(), contract_id)
            .map_err(reject)?;

        Ok(SignerSession {
            contract_id,
            signatory_index: claims.signatory_index,
        })
    }
}
