//! YooKassa payment provider client.
//!
//! Charges are created against the provider's REST API with HTTP Basic auth
//! (shop id + secret key) and an `Idempotence-Key` header, so a retried
//! create call is recognized as the same logical charge instead of
//! double-charging the buyer.
//!
//! Failure modes are kept apart deliberately: an HTTP error response from
//! the provider is a [`PaymentApiError::Provider`] carrying the provider's
//! machine-readable code/description and is never retried; connect-level
//! failures are retried a bounded number of times and then surface as
//! [`PaymentApiError::Network`].

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ProviderCredentials;
use crate::error::AppError;
use crate::models::Order;

pub const PROVIDER_NAME: &str = "yookassa";

/// Explicit per-request timeout. Outbound calls are abandoned past this
/// bound rather than left to the transport default.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra attempts after a connect-level failure (not HTTP errors).
const CONNECT_RETRIES: u32 = 2;

/// Delay before retry n is `CONNECT_RETRY_BASE * n`.
const CONNECT_RETRY_BASE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum PaymentApiError {
    /// The provider rejected the request (4xx/5xx with an error body).
    /// User-facing; the buyer may be able to correct input.
    #[error("provider error {code}: {description}")]
    Provider { code: String, description: String },

    /// Transport-level failure, already retried to exhaustion.
    #[error("network error: {0}")]
    Network(String),
}

impl From<PaymentApiError> for AppError {
    fn from(err: PaymentApiError) -> Self {
        match err {
            PaymentApiError::Provider { code, description } => {
                AppError::Provider { code, description }
            }
            PaymentApiError::Network(msg) => AppError::Unavailable(msg),
        }
    }
}

// ============ Wire types ============

/// Decimal money amount as the provider speaks it: a string with two
/// fractional digits plus an ISO currency code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YooAmount {
    pub value: String,
    pub currency: String,
}

impl YooAmount {
    pub fn from_value(amount: f64, currency: &str) -> Self {
        Self {
            value: format!("{:.2}", amount),
            currency: currency.to_string(),
        }
    }

    pub fn parsed(&self) -> Option<f64> {
        self.value.parse().ok()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentMetadata {
    #[serde(rename = "orderId", skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(rename = "albumId", skip_serializing_if = "Option::is_none")]
    pub album_id: Option<String>,
    #[serde(rename = "customerEmail", skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
}

#[derive(Debug, Serialize)]
struct Confirmation<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    return_url: &'a str,
}

#[derive(Debug, Serialize)]
struct ReceiptCustomer<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ReceiptItem<'a> {
    description: &'a str,
    quantity: &'static str,
    amount: YooAmount,
    /// VAT code 1: not taxed (digital goods).
    vat_code: u8,
}

#[derive(Debug, Serialize)]
struct Receipt<'a> {
    customer: ReceiptCustomer<'a>,
    items: Vec<ReceiptItem<'a>>,
}

#[derive(Debug, Serialize)]
struct CreatePaymentBody<'a> {
    amount: YooAmount,
    confirmation: Confirmation<'a>,
    description: &'a str,
    metadata: PaymentMetadata,
    receipt: Receipt<'a>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub confirmation_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationDetails {
    pub party: String,
    pub reason: String,
}

/// A payment object as reported by the provider - the same shape comes back
/// from charge creation, status fetch and webhook notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentObject {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub paid: bool,
    pub amount: YooAmount,
    #[serde(default)]
    pub confirmation: Option<ConfirmationResponse>,
    #[serde(default)]
    pub metadata: Option<PaymentMetadata>,
    #[serde(default)]
    pub cancellation_details: Option<CancellationDetails>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub captured_at: Option<String>,
}

impl PaymentObject {
    pub fn confirmation_url(&self) -> Option<&str> {
        self.confirmation
            .as_ref()
            .and_then(|c| c.confirmation_url.as_deref())
    }
}

/// Provider error body: `{type: "error", code, description, parameter}`.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Arguments for creating a charge against an order.
pub struct CreateChargeArgs<'a> {
    pub order: &'a Order,
    /// Human-readable charge description ("Artist - Album").
    pub description: &'a str,
    /// Where the provider redirects the buyer after confirmation.
    pub return_url: &'a str,
}

// ============ Client ============

#[derive(Debug, Clone)]
pub struct YooKassaClient {
    client: Client,
    api_url: String,
    shop_id: String,
    secret_key: String,
}

impl YooKassaClient {
    pub fn new(client: Client, api_url: &str, credentials: &ProviderCredentials) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            shop_id: credentials.shop_id.clone(),
            secret_key: credentials.secret_key.clone(),
        }
    }

    /// Create a charge for the order.
    ///
    /// The caller supplies the idempotence key (order id plus a millisecond
    /// suffix) and must keep it fixed if it retries this call, so the
    /// provider deduplicates instead of charging twice.
    pub async fn create_payment(
        &self,
        args: &CreateChargeArgs<'_>,
        idempotence_key: &str,
    ) -> Result<PaymentObject, PaymentApiError> {
        let order = args.order;
        let amount = YooAmount::from_value(order.amount, &order.currency);

        let body = CreatePaymentBody {
            amount: amount.clone(),
            confirmation: Confirmation {
                kind: "redirect",
                return_url: args.return_url,
            },
            description: args.description,
            metadata: PaymentMetadata {
                order_id: Some(order.id.clone()),
                album_id: Some(order.album_id.clone()),
                customer_email: Some(order.customer_email.clone()),
            },
            receipt: Receipt {
                customer: ReceiptCustomer {
                    email: &order.customer_email,
                    full_name: order.billing_name.as_deref(),
                    phone: order.billing_phone.as_deref(),
                },
                items: vec![ReceiptItem {
                    description: args.description,
                    quantity: "1",
                    amount,
                    vat_code: 1,
                }],
            },
        };

        let payload =
            serde_json::to_vec(&body).map_err(|e| PaymentApiError::Network(e.to_string()))?;

        let response = self
            .send_with_retry(|| {
                self.client
                    .post(&self.api_url)
                    .basic_auth(&self.shop_id, Some(&self.secret_key))
                    .header("Idempotence-Key", idempotence_key)
                    .header("Content-Type", "application/json")
                    .body(payload.clone())
            })
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the current status of a payment.
    pub async fn fetch_payment(
        &self,
        provider_payment_id: &str,
    ) -> Result<PaymentObject, PaymentApiError> {
        let url = format!("{}/{}", self.api_url, provider_payment_id);

        let response = self
            .send_with_retry(|| {
                self.client
                    .get(&url)
                    .basic_auth(&self.shop_id, Some(&self.secret_key))
            })
            .await?;

        Self::parse_response(response).await
    }

    /// Light authenticated call used by the health endpoint; surfaces
    /// whether the credentials are accepted by the provider.
    pub async fn probe(&self) -> Result<(), PaymentApiError> {
        let url = format!("{}?limit=1", self.api_url);
        let response = self
            .send_with_retry(|| {
                self.client
                    .get(&url)
                    .basic_auth(&self.shop_id, Some(&self.secret_key))
            })
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from_response(response).await)
        }
    }

    /// Send a request, retrying connect-level failures only. HTTP error
    /// responses come back as `Ok` here and are classified by the caller.
    async fn send_with_retry(
        &self,
        make: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, PaymentApiError> {
        self.dns_precheck().await;

        let mut attempt: u32 = 0;
        loop {
            match make().timeout(REQUEST_TIMEOUT).send().await {
                Ok(response) => return Ok(response),
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < CONNECT_RETRIES => {
                    attempt += 1;
                    let delay = CONNECT_RETRY_BASE * attempt;
                    tracing::warn!(
                        "Provider connect failure, retrying in {:?} (attempt {}/{}): {}",
                        delay,
                        attempt,
                        CONNECT_RETRIES,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(PaymentApiError::Network(e.to_string())),
            }
        }
    }

    /// Advisory IPv4 resolution check before talking to the provider. Some
    /// deployment networks mis-route IPv6; a resolution failure here is
    /// logged but never fails the call - the HTTPS request is still made.
    async fn dns_precheck(&self) {
        let Some(host) = reqwest::Url::parse(&self.api_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
        else {
            return;
        };

        match tokio::net::lookup_host((host.clone(), 443u16)).await {
            Ok(mut addrs) => {
                if !addrs.any(|a| a.is_ipv4()) {
                    tracing::warn!("No IPv4 address resolved for provider host {}", host);
                }
            }
            Err(e) => {
                tracing::warn!("DNS resolution failed for {} (continuing anyway): {}", host, e);
            }
        }
    }

    async fn parse_response(response: reqwest::Response) -> Result<PaymentObject, PaymentApiError> {
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        response
            .json::<PaymentObject>()
            .await
            .map_err(|e| PaymentApiError::Network(format!("invalid provider response: {}", e)))
    }

    async fn error_from_response(response: reqwest::Response) -> PaymentApiError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed: Option<ApiErrorBody> = serde_json::from_str(&body).ok();

        let (code, description) = match parsed {
            Some(e) => (
                e.code.unwrap_or_else(|| status.as_u16().to_string()),
                e.description.unwrap_or_else(|| status.to_string()),
            ),
            None => (status.as_u16().to_string(), status.to_string()),
        };

        tracing::error!("Provider API error {}: {}", code, description);
        PaymentApiError::Provider { code, description }
    }
}
