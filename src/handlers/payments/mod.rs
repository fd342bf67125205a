mod create;
mod health;
mod status;

pub use create::*;
pub use health::*;
pub use status::*;

use axum::routing::{get, post};
use axum::Router;

use crate::config::ProviderCredentials;
use crate::db::{queries, retry, AppState};
use crate::error::{AppError, Result};
use crate::payments::PROVIDER_NAME;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payment/create", post(create_payment))
        .route("/payment/status", get(payment_status))
        .route("/payment/health", get(payment_health))
}

/// Resolve provider credentials for an order: the seller's own account when
/// one is configured and active, the platform account otherwise.
pub async fn resolve_credentials(
    state: &AppState,
    seller_id: Option<&str>,
) -> Result<ProviderCredentials> {
    if let Some(seller) = seller_id {
        let config = retry::with_retry(&state.db, retry::DEFAULT_MAX_RETRIES, |conn| {
            queries::get_active_seller_config(conn, seller, PROVIDER_NAME)
        })
        .await?;

        if let Some(cfg) = config {
            tracing::debug!("Using seller {} payment settings", seller);
            return Ok(ProviderCredentials {
                shop_id: cfg.shop_id,
                secret_key: cfg.secret_key,
            });
        }
        tracing::debug!("Seller {} has no payment settings, using platform account", seller);
    }

    state
        .platform_credentials
        .clone()
        .ok_or_else(|| AppError::Unavailable("Payment service not configured".to_string()))
}
