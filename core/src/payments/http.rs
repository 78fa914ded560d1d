use super::{OrderOutcome, PaymentService, PlanBalance, ServiceAccessConfig};
use crate::{GateError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Deployment tier of the payment service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentEnvironment {
    #[default]
    Testing,
    Staging,
    Production,
}

impl PaymentEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            PaymentEnvironment::Testing => "https://one-backend.testing.nevermined.app",
            PaymentEnvironment::Staging => "https://one-backend.staging.nevermined.app",
            PaymentEnvironment::Production => "https://one-backend.live.nevermined.app",
        }
    }
}

impl FromStr for PaymentEnvironment {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "testing" | "test" => Ok(PaymentEnvironment::Testing),
            "staging" => Ok(PaymentEnvironment::Staging),
            "production" | "live" => Ok(PaymentEnvironment::Production),
            other => Err(GateError::Config(format!(
                "Unknown payment environment: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for PaymentEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentEnvironment::Testing => "testing",
            PaymentEnvironment::Staging => "staging",
            PaymentEnvironment::Production => "production",
        };
        f.write_str(name)
    }
}

/// Configuration for the payment service client
#[derive(Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    /// Deployment tier, picks the default base URL
    pub environment: PaymentEnvironment,
    /// Explicit base URL, wins over the tier default
    pub base_url: Option<String>,
    /// API key of the account that owns the plans
    pub api_key: String,
    /// Timeout for API requests in milliseconds
    pub timeout_ms: u64,
    /// User agent string
    pub user_agent: String,
}

// api_key stays out of logs
impl fmt::Debug for PaymentsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentsConfig")
            .field("environment", &self.environment)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            environment: std::env::var("PAYMENTS_ENVIRONMENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            base_url: std::env::var("PAYMENTS_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty()),
            api_key: std::env::var("PAYMENTS_API_KEY").unwrap_or_default(),
            timeout_ms: std::env::var("PAYMENTS_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
            user_agent: format!("creditgate/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl PaymentsConfig {
    pub fn resolved_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
    }
}

/// REST client for the payment service
pub struct HttpPaymentService {
    config: PaymentsConfig,
    base_url: Url,
    http_client: Client,
}

impl HttpPaymentService {
    /// Fails when the API key is missing or the base URL is malformed
    pub fn new(config: PaymentsConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(GateError::Config(
                "payment service API key is missing (set PAYMENTS_API_KEY)".to_string(),
            ));
        }

        let base_url = Url::parse(config.resolved_base_url()).map_err(|e| {
            GateError::Config(format!(
                "invalid payment service URL {}: {}",
                config.resolved_base_url(),
                e
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(GateError::Config(format!(
                "payment service URL cannot be a base: {}",
                base_url
            )));
        }

        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| GateError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            base_url,
            http_client,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GateError::Config(format!("cannot extend URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send_json(&self, request: RequestBuilder, what: &str) -> Result<Value> {
        let response = request
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "payments", operation = what, error = %e, "Payment service request failed");
                GateError::Payment(format!("{} request failed: {}", what, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(target: "payments", operation = what, %status, "Payment service returned error status");
            return Err(GateError::Payment(format!(
                "{} returned HTTP {}: {}",
                what,
                status.as_u16(),
                body
            )));
        }

        let bytes = response.bytes().await.map_err(|e| {
            GateError::Payment(format!("failed to read {} response: {}", what, e))
        })?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| GateError::Payment(format!("failed to parse {} response: {}", what, e)))
    }
}

#[async_trait]
impl PaymentService for HttpPaymentService {
    async fn get_plan_balance(&self, plan_did: &str) -> Result<PlanBalance> {
        let url = self.endpoint(&["api", "v1", "payments", "plans", plan_did, "balance"])?;
        debug!(target: "payments", plan = %plan_did, "Fetching plan balance");

        let body = self
            .send_json(self.http_client.get(url), "plan balance")
            .await?;
        serde_json::from_value(body)
            .map_err(|e| GateError::Payment(format!("malformed plan balance: {}", e)))
    }

    async fn get_asset_ddo(&self, agent_did: &str) -> Result<Value> {
        let url = self.endpoint(&["api", "v1", "assets", agent_did, "ddo"])?;
        debug!(target: "payments", agent = %agent_did, "Fetching agent descriptor");

        self.send_json(self.http_client.get(url), "agent descriptor")
            .await
    }

    async fn order_plan(&self, plan_did: &str) -> Result<Option<OrderOutcome>> {
        let url = self.endpoint(&["api", "v1", "payments", "plans", plan_did, "order"])?;
        debug!(target: "payments", plan = %plan_did, "Ordering plan");

        let body = self
            .send_json(self.http_client.post(url), "plan order")
            .await?;
        if body.is_null() {
            return Ok(None);
        }
        serde_json::from_value(body)
            .map(Some)
            .map_err(|e| GateError::Payment(format!("malformed order result: {}", e)))
    }

    async fn get_service_access_config(&self, agent_did: &str) -> Result<ServiceAccessConfig> {
        let url = self.endpoint(&["api", "v1", "agents", agent_did, "access-config"])?;
        debug!(target: "payments", agent = %agent_did, "Requesting service access config");

        let body = self
            .send_json(self.http_client.get(url), "access config")
            .await?;
        serde_json::from_value(body)
            .map_err(|e| GateError::Payment(format!("malformed access config: {}", e)))
    }
}
