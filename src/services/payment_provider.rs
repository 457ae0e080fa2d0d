use crate::config::PaymentProviderConfig;
use crate::entities::pending_payment::PaymentStatus;
use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{instrument, warn};

/// A display line sent to the hosted checkout page. Shipping and tax are
/// passed as synthetic lines so the externally displayed total matches the
/// grand total we computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderLineItem {
    pub name: String,
    pub unit_amount_minor: i64,
    pub quantity: i32,
}

/// Request to open a hosted checkout session
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest {
    pub line_items: Vec<ProviderLineItem>,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Provider response for a newly created session
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedSession {
    pub session_id: String,
    pub checkout_url: String,
}

/// Authoritative payment state of a session as reported by the provider
#[derive(Debug, Clone, Deserialize)]
pub struct SessionStatus {
    pub status: PaymentStatus,
    #[serde(default)]
    pub receipt_url: Option<String>,
    #[serde(default)]
    pub payer_email: Option<String>,
}

/// External hosted checkout provider.
///
/// The provider is the sole source of truth for payment completion; we never
/// infer "paid" from anything but `get_session_status`.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<CreatedSession, ServiceError>;

    async fn get_session_status(&self, session_id: &str) -> Result<SessionStatus, ServiceError>;
}

/// HTTP client for the hosted checkout provider API
#[derive(Clone)]
pub struct HostedCheckoutClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl HostedCheckoutClient {
    pub fn new(config: &PaymentProviderConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ServiceError::InternalError(format!("Failed to build provider HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }

    fn provider_err(context: &str, err: impl std::fmt::Display) -> ServiceError {
        warn!("payment provider call failed during {}: {}", context, err);
        ServiceError::PaymentProviderError(format!("{}: {}", context, err))
    }
}

#[async_trait]
impl PaymentProvider for HostedCheckoutClient {
    #[instrument(skip(self, request), fields(lines = request.line_items.len()))]
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<CreatedSession, ServiceError> {
        let url = format!("{}/checkout/sessions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::provider_err("create_session", e))?;

        if !response.status().is_success() {
            return Err(Self::provider_err(
                "create_session",
                format!("provider returned {}", response.status()),
            ));
        }

        response
            .json::<CreatedSession>()
            .await
            .map_err(|e| Self::provider_err("create_session response decode", e))
    }

    #[instrument(skip(self))]
    async fn get_session_status(&self, session_id: &str) -> Result<SessionStatus, ServiceError> {
        let url = format!("{}/checkout/sessions/{}", self.base_url, session_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| Self::provider_err("get_session_status", e))?;

        if !response.status().is_success() {
            return Err(Self::provider_err(
                "get_session_status",
                format!("provider returned {}", response.status()),
            ));
        }

        response
            .json::<SessionStatus>()
            .await
            .map_err(|e| Self::provider_err("get_session_status response decode", e))
    }
}
