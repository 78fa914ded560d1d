use crate::generation::{GenerationClient, GenerationConfig};
use crate::payments::{min_credits_required, Credits, PaymentService};
use crate::{GateError, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Time-bounded credentials for the generation backend
#[derive(Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub base_uri: String,
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for AccessGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessGrant")
            .field("base_uri", &self.base_uri)
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Plan balance against the agent's per-call requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub available: Credits,
    pub min_required: Credits,
}

impl BalanceSnapshot {
    pub fn is_sufficient(&self) -> bool {
        self.available >= self.min_required
    }
}

/// Outcome of a plan purchase, never an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOutcome {
    pub success: bool,
    pub message: String,
    pub agreement_id: Option<String>,
}

impl PurchaseOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            agreement_id: None,
        }
    }
}

/// Broker behaviour switches
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessOptions {
    /// Rewrite `https://` grant URIs to `http://`
    pub force_insecure_scheme: bool,
    /// Reuse grants per agent for this long; `None` re-derives on every call
    pub grant_ttl: Option<Duration>,
}

struct CachedGrant {
    grant: AccessGrant,
    valid_until: DateTime<Utc>,
}

/// Single point of contact with the payment service.
///
/// Balance checks and purchases are fail-soft and come back as values.
/// Access grants are fail-hard: without a token the generation call is
/// meaningless, so `get_access` returns an error instead of a default.
pub struct AccessBroker {
    payments: Arc<dyn PaymentService>,
    options: AccessOptions,
    generation: GenerationConfig,
    grants: DashMap<String, CachedGrant>,
}

impl AccessBroker {
    pub fn new(payments: Arc<dyn PaymentService>) -> Self {
        Self::with_options(
            payments,
            AccessOptions::default(),
            GenerationConfig::default(),
        )
    }

    pub fn with_options(
        payments: Arc<dyn PaymentService>,
        options: AccessOptions,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            payments,
            options,
            generation,
            grants: DashMap::new(),
        }
    }

    /// Fetch the plan balance and the agent's requirement concurrently
    pub async fn balance_snapshot(&self, plan_did: &str, agent_did: &str) -> Result<BalanceSnapshot> {
        let (balance, ddo) = tokio::try_join!(
            self.payments.get_plan_balance(plan_did),
            self.payments.get_asset_ddo(agent_did),
        )?;
        let min_required = min_credits_required(&ddo)?;

        Ok(BalanceSnapshot {
            available: balance.balance,
            min_required,
        })
    }

    /// `true` only when the balance is confirmed to cover the agent's requirement.
    /// Any failure to verify resolves to `false`.
    #[tracing::instrument(skip(self))]
    pub async fn check_balance(&self, plan_did: &str, agent_did: &str) -> bool {
        match self.balance_snapshot(plan_did, agent_did).await {
            Ok(snapshot) => {
                debug!(
                    target: "access_broker",
                    available = %snapshot.available,
                    min_required = %snapshot.min_required,
                    "Balance checked"
                );
                snapshot.is_sufficient()
            }
            Err(e) => {
                warn!(target: "access_broker", error = %e, "Balance verification failed; treating as insufficient");
                false
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn order_plan(&self, plan_did: &str) -> PurchaseOutcome {
        match self.payments.order_plan(plan_did).await {
            Ok(Some(outcome)) if outcome.success => {
                info!(target: "access_broker", agreement = ?outcome.agreement_id, "Plan ordered");
                let message = match &outcome.agreement_id {
                    Some(id) => format!("Plan {} purchased. Agreement ID: {}", plan_did, id),
                    None => format!("Plan {} purchased.", plan_did),
                };
                PurchaseOutcome {
                    success: true,
                    message,
                    agreement_id: outcome.agreement_id,
                }
            }
            Ok(_) => {
                warn!(target: "access_broker", "Plan order returned no successful result");
                PurchaseOutcome::failed("Failed to order plan")
            }
            Err(e) => {
                warn!(target: "access_broker", error = %e, "Plan order failed");
                PurchaseOutcome::failed(e.to_string())
            }
        }
    }

    /// Obtain an access grant for the agent
    #[tracing::instrument(skip(self))]
    pub async fn get_access(&self, agent_did: &str) -> Result<AccessGrant> {
        if let Some(grant) = self.cached_grant(agent_did) {
            debug!(target: "access_broker", "Reusing cached access grant");
            return Ok(grant);
        }

        let config = self
            .payments
            .get_service_access_config(agent_did)
            .await
            .map_err(|e| GateError::Access(format!("could not obtain access config: {}", e)))?;

        let token = config
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                GateError::Access(format!("no access token issued for agent {}", agent_did))
            })?;

        let grant = AccessGrant {
            base_uri: self.normalize_base_uri(config.base_uri),
            token,
            expires_at: config.expires_at,
        };
        self.remember_grant(agent_did, &grant);

        debug!(target: "access_broker", base_uri = %grant.base_uri, "Access grant issued");
        Ok(grant)
    }

    /// Access grant bound into a fresh generation client
    pub async fn get_generation_client(&self, agent_did: &str) -> Result<GenerationClient> {
        let grant = self.get_access(agent_did).await?;
        GenerationClient::new(grant, self.generation.clone())
    }

    /// Drop any cached grant for the agent
    pub fn invalidate_grant(&self, agent_did: &str) {
        if self.grants.remove(agent_did).is_some() {
            debug!(target: "access_broker", agent = %agent_did, "Cached access grant invalidated");
        }
    }

    fn normalize_base_uri(&self, base_uri: String) -> String {
        if !self.options.force_insecure_scheme {
            return base_uri;
        }
        match base_uri.strip_prefix("https://") {
            Some(rest) => format!("http://{}", rest),
            None => base_uri,
        }
    }

    fn cached_grant(&self, agent_did: &str) -> Option<AccessGrant> {
        if self.options.grant_ttl.is_none() {
            return None;
        }
        let now = Utc::now();
        let entry = self.grants.get(agent_did)?;
        if now < entry.valid_until {
            return Some(entry.grant.clone());
        }
        drop(entry);
        self.grants.remove(agent_did);
        None
    }

    fn remember_grant(&self, agent_did: &str, grant: &AccessGrant) {
        let Some(ttl) = self.options.grant_ttl else {
            return;
        };
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return;
        };
        let now = Utc::now();
        let mut valid_until = now + ttl;
        if let Some(expires_at) = grant.expires_at {
            valid_until = valid_until.min(expires_at);
        }
        if valid_until <= now {
            return;
        }
        self.grants.insert(
            agent_did.to_string(),
            CachedGrant {
                grant: grant.clone(),
                valid_until,
            },
        );
    }
}
