// src/services/auth.rs
//
// Tokens de autor são emitidos pelo provedor de autenticação externo com o
// mesmo JWT_SECRET; aqui só validamos. Tokens de sessão de assinatura são
// emitidos por nós depois da verificação do signatário.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{common::error::AppError, models::signing::SigningClaims};

const AUTHOR_SCOPE: &str = "author";
const SIGNING_SCOPE: &str = "sign";

// Duração da sessão de assinatura após a verificação
const SIGNING_SESSION_MINUTES: i64 = 30;

// Estrutura de dados ("claims") dentro do JWT do autor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorClaims {
    pub sub: Uuid, // Subject (ID do usuário)
    pub scope: String,
    pub exp: usize, // Expiration time (quando o token expira)
    pub iat: usize, // Issued At (quando o token foi criado)
}

#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    pub fn validate_author_token(&self, token: &str) -> Result<AuthorClaims, AppError> {
        let data = decode::<AuthorClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        if data.claims.scope != AUTHOR_SCOPE {
            return Err(AppError::InvalidToken);
        }
        Ok(data.claims)
    }

    // Emissão de token de autor (o provedor externo faz o mesmo; útil em testes e scripts)
    pub fn issue_author_token(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = AuthorClaims {
            sub: user_id,
            scope: AUTHOR_SCOPE.to_string(),
            exp: (now + Duration::days(7)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }

    /// Token da sessão de assinatura, preso ao contrato e ao signatário verificado.
    pub fn issue_signing_token(
        &self,
        contract_id: Uuid,
        signatory_index: usize,
    ) -> Result<(String, DateTime<Utc>), AppError> {
        let now = Utc::now();
        let expires_at = now + Duration::minutes(SIGNING_SESSION_MINUTES);
        let claims = SigningClaims {
            sub: contract_id,
            signatory_index,
            scope: SIGNING_SCOPE.to_string(),
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?;
        Ok((token, expires_at))
    }

    pub fn validate_signing_token(&self, token: &str, contract_id: Uuid) -> Result<SigningClaims, AppError> {
        let data = decode::<SigningClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        let claims = data.claims;
        if claims.scope != SIGNING_SCOPE || claims.sub != contract_id {
            return Err(AppError::InvalidToken);
        }
        Ok(claims)
    }
}
