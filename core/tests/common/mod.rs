//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use creditgate_core::payments::{
    Credits, OrderOutcome, PaymentService, PlanBalance, ServiceAccessConfig,
};
use creditgate_core::{GateError, Result};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const PLAN_DID: &str = "did:nv:plan-test";
pub const AGENT_DID: &str = "did:nv:agent-test";
pub const TOKEN: &str = "grant-token";

/// In-memory payment service with call counters
pub struct StubPayments {
    pub balance: Mutex<Option<u128>>,
    pub min_credits: u128,
    pub base_uri: String,
    pub token: Option<String>,
    pub order: Option<OrderOutcome>,
    pub balance_calls: AtomicUsize,
    pub access_calls: AtomicUsize,
    pub order_calls: AtomicUsize,
}

impl StubPayments {
    /// Funded account whose grants point at `base_uri`
    pub fn funded(base_uri: impl Into<String>) -> Self {
        Self {
            balance: Mutex::new(Some(100)),
            min_credits: 1,
            base_uri: base_uri.into(),
            token: Some(TOKEN.to_string()),
            order: Some(OrderOutcome {
                success: true,
                agreement_id: Some("agreement-1".to_string()),
            }),
            balance_calls: AtomicUsize::new(0),
            access_calls: AtomicUsize::new(0),
            order_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_balance(self, balance: Option<u128>) -> Self {
        *self.balance.lock().unwrap() = balance;
        self
    }

    pub fn with_min_credits(mut self, min_credits: u128) -> Self {
        self.min_credits = min_credits;
        self
    }

    pub fn without_token(mut self) -> Self {
        self.token = None;
        self
    }

    pub fn with_order(mut self, order: Option<OrderOutcome>) -> Self {
        self.order = order;
        self
    }

    pub fn access_calls(&self) -> usize {
        self.access_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentService for StubPayments {
    async fn get_plan_balance(&self, _plan_did: &str) -> Result<PlanBalance> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        match *self.balance.lock().unwrap() {
            Some(balance) => Ok(PlanBalance {
                balance: Credits::from(balance),
            }),
            None => Err(GateError::Payment("balance endpoint unreachable".into())),
        }
    }

    async fn get_asset_ddo(&self, _agent_did: &str) -> Result<Value> {
        Ok(json!({
            "metadata": {"minCreditsRequired": self.min_credits.to_string()}
        }))
    }

    async fn order_plan(&self, _plan_did: &str) -> Result<Option<OrderOutcome>> {
        self.order_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.order.clone())
    }

    async fn get_service_access_config(&self, _agent_did: &str) -> Result<ServiceAccessConfig> {
        self.access_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ServiceAccessConfig {
            base_uri: self.base_uri.clone(),
            access_token: self.token.clone(),
            expires_at: None,
        })
    }
}

/// Deterministic artifact of `len` bytes
pub fn artifact(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
