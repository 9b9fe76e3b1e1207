use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use leadflow_core::domain::customer::{
    Customer, CustomerProgress, OwnerRef, ProgressVocabulary, PublicPoolFilter,
};
use leadflow_core::domain::directory::{AgentAccount, SalesUser};
use leadflow_core::errors::{ApplicationError, DomainError};

use super::auth::Authenticated;
use super::{non_blank, ApiJson, ApiResult, AppState};
use crate::services::{PoolEntryOutcome, PoolExitOutcome};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPoolQuery {
    pub keyword: Option<String>,
    pub nature: Option<String>,
    pub importance: Option<String>,
    pub application_field: Option<String>,
}

impl From<PublicPoolQuery> for PublicPoolFilter {
    fn from(query: PublicPoolQuery) -> Self {
        Self {
            keyword: non_blank(query.keyword),
            nature: non_blank(query.nature),
            importance: non_blank(query.importance),
            application_field: non_blank(query.application_field),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolAssignRequest {
    pub target_type: Option<String>,
    pub target_id: Option<String>,
}

/// Pooled customer as shown to sales staff. Contact details are withheld.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCustomerView {
    pub id: String,
    pub name: String,
    pub nature: String,
    pub importance: String,
    pub application_field: String,
    pub address: String,
    pub progress: CustomerProgress,
    pub progress_label: String,
    pub previous_owner: Option<OwnerRef>,
    pub enter_pool_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PublicCustomerView {
    fn new(customer: Customer, vocabulary: &ProgressVocabulary) -> Self {
        Self {
            enter_pool_time: customer.entered_pool_at(),
            progress_label: vocabulary.label(customer.progress).to_string(),
            id: customer.id.0,
            name: customer.name,
            nature: customer.nature,
            importance: customer.importance,
            application_field: customer.application_field,
            address: customer.address,
            progress: customer.progress,
            previous_owner: customer.previous_owner,
            created_at: customer.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPoolResponse {
    pub public_customers: Vec<PublicCustomerView>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesUserView {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentView {
    pub id: String,
    pub company_name: String,
    pub contact_person: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignableTargetsResponse {
    pub sales_users: Vec<SalesUserView>,
    pub agents: Vec<AgentView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolEntryResponse {
    #[serde(flatten)]
    pub outcome: PoolEntryOutcome,
    pub message: &'static str,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/customers/{id}/move-to-public", post(move_to_public))
        .route("/api/public-pool", get(list_public_pool))
        .route("/api/public-pool/assignable-users", get(assignable_users))
        .route("/api/public-pool/{id}/assign", post(assign_from_pool))
}

async fn move_to_public(
    Path(customer_id): Path<String>,
    State(state): State<AppState>,
    Authenticated(operator): Authenticated,
) -> ApiResult<Json<PoolEntryResponse>> {
    let outcome = state
        .services
        .reclamation
        .move_to_public_pool(&customer_id, &operator, Utc::now())
        .await?;
    Ok(Json(PoolEntryResponse { outcome, message: "customer moved to the public pool" }))
}

async fn list_public_pool(
    State(state): State<AppState>,
    Authenticated(_operator): Authenticated,
    Query(query): Query<PublicPoolQuery>,
) -> ApiResult<Json<PublicPoolResponse>> {
    let customers =
        state.services.reclamation.list_public_pool(&PublicPoolFilter::from(query)).await?;

    let vocabulary = state.services.progress.vocabulary();
    let public_customers: Vec<_> = customers
        .into_iter()
        .map(|customer| PublicCustomerView::new(customer, vocabulary))
        .collect();
    Ok(Json(PublicPoolResponse { total: public_customers.len(), public_customers }))
}

async fn assignable_users(
    State(state): State<AppState>,
    Authenticated(operator): Authenticated,
) -> ApiResult<Json<AssignableTargetsResponse>> {
    let targets = state.services.reclamation.assignable_targets(&operator).await?;

    Ok(Json(AssignableTargetsResponse {
        sales_users: targets
            .sales_users
            .into_iter()
            .map(|SalesUser { id, username, .. }| SalesUserView { id, username })
            .collect(),
        agents: targets
            .agents
            .into_iter()
            .map(|AgentAccount { id, company_name, contact_person, .. }| AgentView {
                id,
                company_name,
                contact_person,
            })
            .collect(),
    }))
}

async fn assign_from_pool(
    Path(customer_id): Path<String>,
    State(state): State<AppState>,
    Authenticated(operator): Authenticated,
    ApiJson(body): ApiJson<PoolAssignRequest>,
) -> ApiResult<Json<PoolExitOutcome>> {
    let target_type = non_blank(body.target_type)
        .ok_or_else(|| ApplicationError::from(DomainError::MissingField("targetType")))?;
    let target_id = non_blank(body.target_id)
        .ok_or_else(|| ApplicationError::from(DomainError::MissingField("targetId")))?;

    let outcome = state
        .services
        .reclamation
        .assign_from_public_pool(&customer_id, &target_type, &target_id, &operator, Utc::now())
        .await?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use chrono::Utc;
    use serde_json::json;

    use leadflow_core::domain::operator::Role;

    use crate::api::test_support::TestApp;
    use crate::services::test_support::{customer, seed_agent, seed_sales};

    #[tokio::test]
    async fn pool_round_trip_hides_contacts_and_rejects_repeats() {
        let app = TestApp::new();
        let admin = app.login("admin-1", "Ada", Role::SuperAdmin).await;
        let sam = seed_sales(&app.repos, "sam").await;
        let lead = customer("Harbor Plastics", Utc::now());
        app.repos.customers.insert(lead.clone()).await.expect("insert");
        let enter = format!("/api/customers/{}/move-to-public", lead.id);

        let (status, body) = app.call(Method::POST, &enter, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["previousOwner"]["name"], "Creator");

        let (status, _) = app.call(Method::POST, &enter, Some(&admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .call(Method::GET, "/api/public-pool?keyword=harbor&nature=", Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        let listed = &body["publicCustomers"][0];
        assert_eq!(listed["id"], lead.id.0.as_str());
        assert_eq!(listed["progress"], "PUBLIC_POOL");
        assert_eq!(listed["progressLabel"], "进入公海");
        assert!(listed["enterPoolTime"].is_string());
        assert!(listed.get("contactPerson").is_none());
        assert!(listed.get("contactPhone").is_none());

        let exit = format!("/api/public-pool/{}/assign", lead.id);
        let request = json!({ "targetType": "FACTORY_SALES", "targetId": sam.id });
        let (status, body) =
            app.call(Method::POST, &exit, Some(&admin), Some(request.clone())).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["targetType"], "FACTORY_SALES");
        assert_eq!(body["target"]["name"], "sam");

        let (status, _) = app.call(Method::POST, &exit, Some(&admin), Some(request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = app.call(Method::GET, "/api/public-pool", Some(&admin), None).await;
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn unrelated_sales_rep_cannot_reclaim() {
        let app = TestApp::new();
        let token = app.login("s-other", "Olga", Role::FactorySales).await;
        let lead = customer("Harbor Plastics", Utc::now());
        app.repos.customers.insert(lead.clone()).await.expect("insert");

        let (status, _) = app
            .call(
                Method::POST,
                &format!("/api/customers/{}/move-to-public", lead.id),
                Some(&token),
                None,
            )
            .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn assignable_users_lists_directory_for_sales_only() {
        let app = TestApp::new();
        let sales = app.login("s-1", "Sam", Role::FactorySales).await;
        let stock = app.login("inv-1", "Ivy", Role::InventoryManager).await;
        seed_sales(&app.repos, "sam").await;
        seed_agent(&app.repos, "Delta Agency").await;

        let (status, body) =
            app.call(Method::GET, "/api/public-pool/assignable-users", Some(&sales), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["salesUsers"][0]["username"], "sam");
        assert_eq!(body["agents"][0]["companyName"], "Delta Agency");

        let (status, _) =
            app.call(Method::GET, "/api/public-pool/assignable-users", Some(&stock), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn pool_assign_requires_target_fields() {
        let app = TestApp::new();
        let admin = app.login("admin-1", "Ada", Role::SuperAdmin).await;
        let lead = customer("Harbor Plastics", Utc::now());
        app.repos.customers.insert(lead.clone()).await.expect("insert");

        let (status, body) = app
            .call(
                Method::POST,
                &format!("/api/public-pool/{}/assign", lead.id),
                Some(&admin),
                Some(json!({ "targetType": "AGENT" })),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "missing required field `targetId`");
    }
}
