//! Bearer-token authentication. Tokens are issued elsewhere; only their
//! SHA-256 digests are stored.

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use chrono::Utc;
use tracing::debug;

use leadflow_core::domain::operator::{token_digest, Operator};
use leadflow_core::errors::ApplicationError;

use super::{ApiError, AppState};
use crate::services::persistence;

/// The operator behind the request's bearer token.
#[derive(Clone, Debug)]
pub struct Authenticated(pub Operator);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| unauthorized("missing bearer token"))?;

        let operator = state
            .operator_tokens
            .find_operator(&token_digest(token), Utc::now())
            .await
            .map_err(persistence)?
            .ok_or_else(|| {
                debug!(event_name = "api.auth.rejected", "unknown or expired bearer token");
                unauthorized("invalid or expired bearer token")
            })?;

        Ok(Self(operator))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn unauthorized(message: &str) -> ApiError {
    ApiError::from(ApplicationError::Unauthorized(message.to_string()))
}
