use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use leadflow_core::errors::{ApplicationError, DomainError};

use super::auth::Authenticated;
use super::{non_blank, ApiJson, ApiResult, AppState};
use crate::services::{AssignmentOutcome, ProgressChangeOutcome};

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub sales_id: Option<String>,
    pub agent_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProgressRequest {
    pub progress: Option<String>,
    pub remark: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignResponse {
    #[serde(flatten)]
    pub outcome: AssignmentOutcome,
    pub from_progress_label: String,
    pub to_progress_label: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    #[serde(flatten)]
    pub outcome: ProgressChangeOutcome,
    pub from_progress_label: String,
    pub to_progress_label: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/change_customers/{id}/assign", post(assign_customer))
        .route("/api/change_customers/{id}/progress", post(change_progress))
}

async fn assign_customer(
    Path(customer_id): Path<String>,
    State(state): State<AppState>,
    Authenticated(operator): Authenticated,
    ApiJson(body): ApiJson<AssignRequest>,
) -> ApiResult<Json<AssignResponse>> {
    let sales_id = non_blank(body.sales_id).ok_or_else(|| missing("salesId"))?;
    let agent_id = non_blank(body.agent_id).unwrap_or_default();

    let outcome = state
        .services
        .assignments
        .assign(&customer_id, &sales_id, &agent_id, &operator, Utc::now())
        .await?;

    let vocabulary = state.services.progress.vocabulary();
    Ok(Json(AssignResponse {
        from_progress_label: vocabulary.label(outcome.from_progress).to_string(),
        to_progress_label: vocabulary.label(outcome.to_progress).to_string(),
        outcome,
    }))
}

async fn change_progress(
    Path(customer_id): Path<String>,
    State(state): State<AppState>,
    Authenticated(operator): Authenticated,
    ApiJson(body): ApiJson<ProgressRequest>,
) -> ApiResult<Json<ProgressResponse>> {
    let progress = non_blank(body.progress).ok_or_else(|| missing("progress"))?;
    let remark = body.remark.unwrap_or_default();

    let outcome = state
        .services
        .progress
        .change_progress(&customer_id, &progress, &remark, &operator, Utc::now())
        .await?;

    let vocabulary = state.services.progress.vocabulary();
    Ok(Json(ProgressResponse {
        from_progress_label: vocabulary.label(outcome.from_progress).to_string(),
        to_progress_label: vocabulary.label(outcome.to_progress).to_string(),
        outcome,
    }))
}

fn missing(field: &'static str) -> ApplicationError {
    DomainError::MissingField(field).into()
}
