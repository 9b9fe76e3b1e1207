use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use leadflow_core::domain::auto_transfer::SystemConfig;

use super::auth::Authenticated;
use super::{ApiJson, ApiResult, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfigView {
    pub config_type: String,
    pub config_key: String,
    pub config_value: Value,
    pub is_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<SystemConfig> for SystemConfigView {
    fn from(config: SystemConfig) -> Self {
        Self {
            config_type: config.config_type,
            config_key: config.config_key,
            config_value: config.config_value,
            is_enabled: config.is_enabled,
            updated_at: config.updated_at,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/api/system-configs/customer-auto-transfer",
        get(current_policy).put(replace_policy),
    )
}

async fn current_policy(
    State(state): State<AppState>,
    Authenticated(operator): Authenticated,
) -> ApiResult<Json<SystemConfigView>> {
    let config = state.services.policies.current(&operator).await?;
    Ok(Json(config.into()))
}

/// Accepts either the bare policy or a `{ "configValue": { .. } }` wrapper.
async fn replace_policy(
    State(state): State<AppState>,
    Authenticated(operator): Authenticated,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<Json<SystemConfigView>> {
    let value = body.get("configValue").unwrap_or(&body);
    let config = state.services.policies.replace(value, &operator, Utc::now()).await?;
    Ok(Json(config.into()))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use leadflow_core::domain::operator::Role;

    use crate::api::test_support::TestApp;

    const URI: &str = "/api/system-configs/customer-auto-transfer";

    #[tokio::test]
    async fn admins_replace_and_read_the_policy() {
        let app = TestApp::new();
        let admin = app.login("admin-1", "Ada", Role::SuperAdmin).await;

        let (status, _) = app.call(Method::GET, URI, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app
            .call(
                Method::PUT,
                URI,
                Some(&admin),
                Some(json!({
                    "configValue": {
                        "targetSalesId": "s-9",
                        "targetSalesName": "Nina",
                        "daysWithoutProgress": 30
                    }
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let (status, body) = app.call(Method::GET, URI, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["configType"], "customer_auto_transfer");
        assert_eq!(body["isEnabled"], true);
        assert_eq!(body["configValue"]["daysWithoutProgress"], 30);
    }

    #[tokio::test]
    async fn non_admins_and_bad_policies_are_refused() {
        let app = TestApp::new();
        let sales = app.login("s-1", "Sam", Role::FactorySales).await;
        let admin = app.login("admin-1", "Ada", Role::SuperAdmin).await;

        let (status, _) = app.call(Method::GET, URI, Some(&sales), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .call(
                Method::PUT,
                URI,
                Some(&admin),
                Some(json!({
                    "targetSalesId": "s-9",
                    "targetSalesName": "Nina",
                    "daysWithoutProgress": 0
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "invalid auto-transfer policy: daysWithoutProgress must be greater than zero"
        );
    }
}
