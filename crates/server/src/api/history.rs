//! Read and manual-append endpoints for the assignment and progress ledgers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use leadflow_core::domain::customer::{
    parse_object_id, CustomerProgress, PartyRef, ProgressVocabulary,
};
use leadflow_core::domain::history::{
    AssignmentHistory, AssignmentHistoryFilter, AssignmentOperation, NewAssignmentHistory,
    NewProgressHistory, ProgressHistory, ProgressHistoryFilter,
};
use leadflow_core::domain::operator::Operator;
use leadflow_core::errors::{ApplicationError, DomainError};

use super::auth::Authenticated;
use super::{non_blank, ApiJson, ApiResult, AppState};

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentHistoryQuery {
    pub customer_id: Option<String>,
    pub operation_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressHistoryQuery {
    pub customer_id: Option<String>,
    pub progress: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendAssignmentRequest {
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub from_sales_id: Option<String>,
    pub from_sales_name: Option<String>,
    pub from_agent_id: Option<String>,
    pub from_agent_name: Option<String>,
    pub to_sales_id: Option<String>,
    pub to_sales_name: Option<String>,
    pub to_agent_id: Option<String>,
    pub to_agent_name: Option<String>,
    pub operator_id: Option<String>,
    pub operator_name: Option<String>,
    pub operation_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendProgressRequest {
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub from_progress: Option<String>,
    pub to_progress: Option<String>,
    pub operator_id: Option<String>,
    pub operator_name: Option<String>,
    pub remark: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentHistoryView {
    pub id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub from_sales: Option<PartyRef>,
    pub from_agent: Option<PartyRef>,
    pub to_sales: Option<PartyRef>,
    pub to_agent: Option<PartyRef>,
    pub operator: PartyRef,
    pub operation_type: AssignmentOperation,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AssignmentHistory> for AssignmentHistoryView {
    fn from(entry: AssignmentHistory) -> Self {
        Self {
            id: entry.id.0,
            customer_id: entry.customer_id,
            customer_name: entry.customer_name,
            from_sales: entry.from_sales,
            from_agent: entry.from_agent,
            to_sales: entry.to_sales,
            to_agent: entry.to_agent,
            operator: entry.operator,
            operation_type: entry.operation,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressHistoryView {
    pub id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub from_progress: CustomerProgress,
    pub from_progress_label: String,
    pub to_progress: CustomerProgress,
    pub to_progress_label: String,
    pub operator: PartyRef,
    pub remark: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressHistoryView {
    fn new(entry: ProgressHistory, vocabulary: &ProgressVocabulary) -> Self {
        Self {
            id: entry.id.0,
            customer_id: entry.customer_id,
            customer_name: entry.customer_name,
            from_progress: entry.from_progress,
            from_progress_label: vocabulary.label(entry.from_progress).to_string(),
            to_progress: entry.to_progress,
            to_progress_label: vocabulary.label(entry.to_progress).to_string(),
            operator: entry.operator,
            remark: entry.remark,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse<T> {
    pub history: Vec<T>,
    pub total: usize,
}

impl<T> HistoryResponse<T> {
    fn new(history: Vec<T>) -> Self {
        Self { total: history.len(), history }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/customer-assignments", get(list_assignments).post(append_assignment))
        .route("/api/customer-assignments/{customer_id}", get(customer_assignments))
        .route("/api/customer-progress", get(list_progress).post(append_progress))
        .route("/api/customer-progress/{customer_id}", get(customer_progress))
}

async fn customer_assignments(
    Path(customer_id): Path<String>,
    State(state): State<AppState>,
    Authenticated(_operator): Authenticated,
) -> ApiResult<Json<HistoryResponse<AssignmentHistoryView>>> {
    let filter = AssignmentHistoryFilter {
        customer_id: Some(parse_object_id("customer id", &customer_id)?),
        ..AssignmentHistoryFilter::default()
    };
    assignment_history(&state, &filter).await
}

async fn list_assignments(
    State(state): State<AppState>,
    Authenticated(_operator): Authenticated,
    Query(query): Query<AssignmentHistoryQuery>,
) -> ApiResult<Json<HistoryResponse<AssignmentHistoryView>>> {
    let operation = non_blank(query.operation_type)
        .map(|raw| AssignmentOperation::parse(&raw).ok_or(DomainError::UnknownOperation(raw)))
        .transpose()?;
    let filter = AssignmentHistoryFilter {
        customer_id: optional_object_id("customerId", query.customer_id)?,
        operation,
        start: date_bound("startDate", query.start_date, Bound::Start)?,
        end: date_bound("endDate", query.end_date, Bound::End)?,
    };
    assignment_history(&state, &filter).await
}

async fn append_assignment(
    State(state): State<AppState>,
    Authenticated(operator): Authenticated,
    ApiJson(body): ApiJson<AppendAssignmentRequest>,
) -> ApiResult<(StatusCode, Json<AssignmentHistoryView>)> {
    let raw_operation = non_blank(body.operation_type)
        .ok_or_else(|| ApplicationError::from(DomainError::MissingField("operationType")))?;
    let operation = AssignmentOperation::parse(&raw_operation)
        .ok_or(DomainError::UnknownOperation(raw_operation))?;

    let entry = NewAssignmentHistory {
        customer_id: optional_object_id("customerId", body.customer_id)?.unwrap_or_default(),
        customer_name: non_blank(body.customer_name).unwrap_or_default(),
        from_sales: party(body.from_sales_id, body.from_sales_name),
        from_agent: party(body.from_agent_id, body.from_agent_name),
        to_sales: party(body.to_sales_id, body.to_sales_name),
        to_agent: party(body.to_agent_id, body.to_agent_name),
        operator: acting_party(&operator, body.operator_id, body.operator_name),
        operation,
        created_at: body.created_at,
        updated_at: None,
    };
    let stored = state.services.audit.append_assignment(entry, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(stored.into())))
}

async fn customer_progress(
    Path(customer_id): Path<String>,
    State(state): State<AppState>,
    Authenticated(_operator): Authenticated,
) -> ApiResult<Json<HistoryResponse<ProgressHistoryView>>> {
    let filter = ProgressHistoryFilter {
        customer_id: Some(parse_object_id("customer id", &customer_id)?),
        ..ProgressHistoryFilter::default()
    };
    progress_history(&state, &filter).await
}

async fn list_progress(
    State(state): State<AppState>,
    Authenticated(_operator): Authenticated,
    Query(query): Query<ProgressHistoryQuery>,
) -> ApiResult<Json<HistoryResponse<ProgressHistoryView>>> {
    let vocabulary = state.services.progress.vocabulary();
    let progress =
        non_blank(query.progress).map(|raw| vocabulary.resolve(&raw)).transpose()?;
    let filter = ProgressHistoryFilter {
        customer_id: optional_object_id("customerId", query.customer_id)?,
        progress,
        start: date_bound("startDate", query.start_date, Bound::Start)?,
        end: date_bound("endDate", query.end_date, Bound::End)?,
    };
    progress_history(&state, &filter).await
}

async fn append_progress(
    State(state): State<AppState>,
    Authenticated(operator): Authenticated,
    ApiJson(body): ApiJson<AppendProgressRequest>,
) -> ApiResult<(StatusCode, Json<ProgressHistoryView>)> {
    let vocabulary = state.services.progress.vocabulary();
    let from_progress = required_progress(vocabulary, "fromProgress", body.from_progress)?;
    let to_progress = required_progress(vocabulary, "toProgress", body.to_progress)?;

    let entry = NewProgressHistory {
        customer_id: optional_object_id("customerId", body.customer_id)?.unwrap_or_default(),
        customer_name: non_blank(body.customer_name).unwrap_or_default(),
        from_progress,
        to_progress,
        operator: acting_party(&operator, body.operator_id, body.operator_name),
        remark: body.remark.map(|remark| remark.trim().to_string()).unwrap_or_default(),
        created_at: body.created_at,
        updated_at: None,
    };
    let stored = state.services.audit.append_progress(entry, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(ProgressHistoryView::new(stored, vocabulary))))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn assignment_history(
    state: &AppState,
    filter: &AssignmentHistoryFilter,
) -> ApiResult<Json<HistoryResponse<AssignmentHistoryView>>> {
    let entries = state.services.audit.list_assignments(filter).await?;
    Ok(Json(HistoryResponse::new(entries.into_iter().map(Into::into).collect())))
}

async fn progress_history(
    state: &AppState,
    filter: &ProgressHistoryFilter,
) -> ApiResult<Json<HistoryResponse<ProgressHistoryView>>> {
    let entries = state.services.audit.list_progress(filter).await?;
    let vocabulary = state.services.progress.vocabulary();
    Ok(Json(HistoryResponse::new(
        entries.into_iter().map(|entry| ProgressHistoryView::new(entry, vocabulary)).collect(),
    )))
}

fn optional_object_id(
    field: &'static str,
    raw: Option<String>,
) -> Result<Option<String>, DomainError> {
    non_blank(raw).map(|raw| parse_object_id(field, &raw)).transpose()
}

fn required_progress(
    vocabulary: &ProgressVocabulary,
    field: &'static str,
    raw: Option<String>,
) -> Result<CustomerProgress, DomainError> {
    let raw = non_blank(raw).ok_or(DomainError::MissingField(field))?;
    vocabulary.resolve(&raw)
}

fn party(id: Option<String>, name: Option<String>) -> Option<PartyRef> {
    non_blank(id).map(|id| PartyRef::new(id, non_blank(name).unwrap_or_default()))
}

/// Manual entries default to the authenticated operator.
fn acting_party(operator: &Operator, id: Option<String>, name: Option<String>) -> PartyRef {
    match non_blank(id) {
        Some(id) => PartyRef::new(id, non_blank(name).unwrap_or_default()),
        None => PartyRef::new(operator.id.clone(), operator.name.clone()),
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

/// Accepts RFC 3339 or a bare `YYYY-MM-DD`, which covers the whole UTC day.
fn date_bound(
    field: &'static str,
    raw: Option<String>,
    bound: Bound,
) -> Result<Option<DateTime<Utc>>, DomainError> {
    let Some(raw) = non_blank(raw) else {
        return Ok(None);
    };
    if let Ok(value) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(value.with_timezone(&Utc)));
    }

    let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|_| DomainError::InvalidDate { field, value: raw.clone() })?;
    let start = date.and_time(NaiveTime::MIN).and_utc();
    Ok(Some(match bound {
        Bound::Start => start,
        Bound::End => start + Duration::days(1) - Duration::microseconds(1),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use chrono::Utc;
    use serde_json::json;

    use leadflow_core::domain::operator::Role;

    use super::{date_bound, Bound};
    use crate::api::test_support::TestApp;
    use crate::services::test_support::{customer, new_id, seed_sales};

    #[test]
    fn bare_dates_cover_the_whole_day() {
        let start = date_bound("startDate", Some("2026-03-01".to_string()), Bound::Start)
            .expect("start")
            .expect("some");
        let end = date_bound("endDate", Some("2026-03-01".to_string()), Bound::End)
            .expect("end")
            .expect("some");

        assert_eq!(start.to_rfc3339(), "2026-03-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2026-03-01T23:59:59.999999+00:00");
        assert!(date_bound("endDate", Some(" ".to_string()), Bound::End)
            .expect("blank")
            .is_none());
        assert!(date_bound("endDate", Some("03/01/2026".to_string()), Bound::End).is_err());
    }

    #[tokio::test]
    async fn assignments_are_listed_newest_first_per_customer() {
        let app = TestApp::new();
        let admin = app.login("admin-1", "Ada", Role::SuperAdmin).await;
        let sam = seed_sales(&app.repos, "sam").await;
        let sue = seed_sales(&app.repos, "sue").await;
        let lead = customer("Acme Foods", Utc::now());
        app.repos.customers.insert(lead.clone()).await.expect("insert");
        let assign = format!("/api/change_customers/{}/assign", lead.id);

        for sales in [&sam, &sue] {
            let (status, _) = app
                .call(Method::POST, &assign, Some(&admin), Some(json!({ "salesId": sales.id })))
                .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = app
            .call(
                Method::GET,
                &format!("/api/customer-assignments/{}", lead.id),
                Some(&admin),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["history"][0]["toSales"]["name"], "sue");
        assert_eq!(body["history"][0]["fromSales"]["name"], "sam");
        assert_eq!(body["history"][1]["operationType"], "分配");

        let (status, body) = app
            .call(
                Method::GET,
                "/api/customer-assignments?operationType=claim&startDate=2000-01-01",
                Some(&admin),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);

        let (status, _) = app
            .call(Method::GET, "/api/customer-assignments/not-a-uuid", Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn manual_assignment_entries_default_the_operator_and_validate_fields() {
        let app = TestApp::new();
        let token = app.login("s-1", "Sam", Role::FactorySales).await;
        let customer_id = new_id();

        let (status, body) = app
            .call(
                Method::POST,
                "/api/customer-assignments",
                Some(&token),
                Some(json!({
                    "customerId": customer_id,
                    "customerName": "Acme Foods",
                    "toSalesId": "s-1",
                    "toSalesName": "Sam",
                    "operationType": "认领"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["operator"]["id"], "s-1");
        assert_eq!(body["operationType"], "认领");

        let (status, body) = app
            .call(
                Method::POST,
                "/api/customer-assignments",
                Some(&token),
                Some(json!({ "customerId": customer_id, "operationType": "认领" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "missing required field `customerName`");

        let (status, _) = app
            .call(
                Method::POST,
                "/api/customer-assignments",
                Some(&token),
                Some(json!({
                    "customerId": customer_id,
                    "customerName": "Acme",
                    "operationType": "sell"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn progress_history_filters_on_either_side_of_the_transition() {
        let app = TestApp::new();
        let token = app.login("s-1", "Sam", Role::FactorySales).await;
        let customer_id = new_id();

        for (from, to) in [("INITIAL_CONTACT", "NORMAL"), ("NORMAL", "禁用")] {
            let (status, _) = app
                .call(
                    Method::POST,
                    "/api/customer-progress",
                    Some(&token),
                    Some(json!({
                        "customerId": customer_id,
                        "customerName": "Acme Foods",
                        "fromProgress": from,
                        "toProgress": to
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, body) = app
            .call(Method::GET, "/api/customer-progress?progress=NORMAL", Some(&token), None)
            .await;
        assert_eq!(body["total"], 2);

        let (_, body) = app
            .call(
                Method::GET,
                &format!("/api/customer-progress/{customer_id}"),
                Some(&token),
                None,
            )
            .await;
        assert_eq!(body["history"][0]["toProgress"], "DISABLED");
        assert_eq!(body["history"][0]["toProgressLabel"], "禁用");

        let (status, _) = app
            .call(
                Method::POST,
                "/api/customer-progress",
                Some(&token),
                Some(json!({ "customerId": customer_id, "customerName": "Acme" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
