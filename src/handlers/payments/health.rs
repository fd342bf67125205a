use axum::extract::State;
use serde::Serialize;

use crate::db::AppState;
use crate::extractors::Json;
use crate::payments::YooKassaClient;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvInfo {
    pub has_credentials: bool,
    pub email_configured: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderTest {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub success: bool,
    pub env: EnvInfo,
    pub provider_test: ProviderTest,
}

/// GET /payment/health - diagnostics for credentials and provider
/// reachability. Advisory only; never consulted by the purchase flow.
pub async fn payment_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider_test = match &state.platform_credentials {
        None => ProviderTest {
            success: false,
            error: Some("Credentials not available".to_string()),
        },
        Some(credentials) => {
            let client =
                YooKassaClient::new(state.http.clone(), &state.provider_api_url, credentials);
            match client.probe().await {
                Ok(()) => ProviderTest {
                    success: true,
                    error: None,
                },
                Err(e) => ProviderTest {
                    success: false,
                    error: Some(e.to_string()),
                },
            }
        }
    };

    Json(HealthResponse {
        success: true,
        env: EnvInfo {
            has_credentials: state.platform_credentials.is_some(),
            email_configured: state.email.is_enabled(),
        },
        provider_test,
    })
}
