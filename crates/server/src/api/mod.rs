//! JSON HTTP surface for the lifecycle services.
//!
//! Every route except `/health` requires a bearer token (see [`auth`]). Errors
//! leave as `{"error": "...", "correlationId": "..."}`; 500-class responses
//! carry a generic message and the detail stays in the logs.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use leadflow_core::errors::{ApplicationError, DomainError, InterfaceError};
use leadflow_db::repositories::OperatorTokenRepository;

use crate::services::Services;

pub mod auth;
pub mod change_customer;
pub mod history;
pub mod public_pool;
pub mod system_config;

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub operator_tokens: Arc<dyn OperatorTokenRepository>,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        let operator_tokens = services.repos.operator_tokens.clone();
        Self { services, operator_tokens }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(change_customer::routes())
        .merge(public_pool::routes())
        .merge(history::routes())
        .merge(system_config::routes())
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(InterfaceError::BadRequest {
            message: message.into(),
            correlation_id: new_correlation_id(),
        })
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        let correlation_id = new_correlation_id();
        if error.status_code() >= 500 {
            error!(
                event_name = "api.request.failed",
                correlation_id = %correlation_id,
                error = %error,
                "request failed with an internal error"
            );
        }
        Self(error.into_interface(correlation_id))
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        ApplicationError::from(error).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: self.0.user_message().to_string(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// `Json` whose rejections use the standard error envelope with a 400.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        Ok(Self(value))
    }
}

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Blank strings from query strings and optional body fields count as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}
