//! Payment service integration
//!
//! The payment service owns credit balances, plan ownership and issues the
//! access tokens used against the generation backend. Creditgate only talks
//! to it through [`PaymentService`], so tests and alternative deployments can
//! swap the HTTP implementation for their own.
//!
//! - `http`: reqwest-backed implementation of the REST API

pub mod http;

pub use http::{HttpPaymentService, PaymentEnvironment, PaymentsConfig};

use crate::{GateError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Remote ledger and entitlement service
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Current credit balance of a plan for the configured account
    async fn get_plan_balance(&self, plan_did: &str) -> Result<PlanBalance>;

    /// Descriptor document of an agent (carries its credit requirements)
    async fn get_asset_ddo(&self, agent_did: &str) -> Result<Value>;

    /// Purchase a plan; `None` when the service answered with an empty body
    async fn order_plan(&self, plan_did: &str) -> Result<Option<OrderOutcome>>;

    /// Exchange an agent identifier for a base URI and bearer token
    async fn get_service_access_config(&self, agent_did: &str) -> Result<ServiceAccessConfig>;
}

/// Balance of a plan as reported by the payment service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanBalance {
    pub balance: Credits,
}

/// Result of a plan purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(rename = "agreementId", default, skip_serializing_if = "Option::is_none")]
    pub agreement_id: Option<String>,
}

/// Access configuration for one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccessConfig {
    #[serde(rename = "baseUri", alias = "proxyUri")]
    pub base_uri: String,
    #[serde(rename = "accessToken", default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(rename = "expiresAt", default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Non-negative decimal credit amount, compared exactly.
///
/// The fraction holds decimal digits with trailing zeros trimmed, so the
/// derived ordering on `(whole, fraction)` is numeric ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Credits {
    whole: u128,
    fraction: String,
}

impl Credits {
    pub const ZERO: Credits = Credits {
        whole: 0,
        fraction: String::new(),
    };

    /// Parse a plain decimal such as `"42"`, `"2.50"` or `".5"`
    pub fn from_decimal(s: &str) -> Option<Self> {
        let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }
        let whole = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        Some(Self {
            whole,
            fraction: fraction.trim_end_matches('0').to_string(),
        })
    }

    /// Interpret a credit amount given either as a JSON number or a numeric string
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_u64() {
                Some(whole) => Some(Self::from(whole)),
                None => n.as_f64().and_then(Self::from_f64),
            },
            Value::String(s) => {
                let s = s.trim();
                Self::from_decimal(s).or_else(|| s.parse::<f64>().ok().and_then(Self::from_f64))
            }
            _ => None,
        }
    }

    fn from_f64(f: f64) -> Option<Self> {
        if !f.is_finite() || f < 0.0 {
            return None;
        }
        // f64 Display never uses exponent notation
        Self::from_decimal(&f.abs().to_string())
    }
}

impl From<u64> for Credits {
    fn from(whole: u64) -> Self {
        Self::from(u128::from(whole))
    }
}

impl From<u128> for Credits {
    fn from(whole: u128) -> Self {
        Self {
            whole,
            fraction: String::new(),
        }
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fraction.is_empty() {
            write!(f, "{}", self.whole)
        } else {
            write!(f, "{}.{}", self.whole, self.fraction)
        }
    }
}

impl Serialize for Credits {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Credits {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Credits::from_json(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid credit amount: {raw}")))
    }
}

const MIN_CREDITS_FIELD: &str = "minCreditsRequired";

/// Minimum credits an agent requires per call, read from its descriptor.
///
/// Looks under `metadata` first, then under every
/// `service[].attributes.main.nftAttributes`. Absent means 0.
pub fn min_credits_required(ddo: &Value) -> Result<Credits> {
    let from_metadata = ddo.get("metadata").and_then(|m| m.get(MIN_CREDITS_FIELD));

    let from_services = || {
        ddo.get("service")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find_map(|svc| {
                svc.pointer("/attributes/main/nftAttributes")
                    .and_then(|attrs| attrs.get(MIN_CREDITS_FIELD))
            })
    };

    match from_metadata.or_else(from_services) {
        None | Some(Value::Null) => Ok(Credits::ZERO),
        Some(raw) => Credits::from_json(raw).ok_or_else(|| {
            GateError::Payment(format!("invalid {MIN_CREDITS_FIELD} in descriptor: {raw}"))
        }),
    }
}
