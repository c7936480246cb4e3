use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::order::OrderStatus;
use super::ports::{EventLog, Notifier, OrderStore, SettlementGateway, SignalSink};

/// Shared handles every Action call receives explicitly.
///
/// Replaces any notion of ambient "current agent" state: two workers hold
/// clones of the same `PipelineState` and nothing else is shared.
#[derive(Clone)]
pub struct PipelineState {
    pub store: Arc<dyn OrderStore>,
    pub gateway: Arc<dyn SettlementGateway>,
    pub events: Arc<dyn EventLog>,
    pub notifier: Arc<dyn Notifier>,
    pub signals: Arc<dyn SignalSink>,
}

impl PipelineState {
    pub fn new(
        store: Arc<dyn OrderStore>,
        gateway: Arc<dyn SettlementGateway>,
        events: Arc<dyn EventLog>,
        notifier: Arc<dyn Notifier>,
        signals: Arc<dyn SignalSink>,
    ) -> Self {
        Self {
            store,
            gateway,
            events,
            notifier,
            signals,
        }
    }
}

/// Per-invocation context: who is acting, on which order, with what options.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub agent: String,
    pub order_id: Option<String>,
    pub options: HashMap<String, serde_json::Value>,
}

impl ActionContext {
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            order_id: None,
            options: HashMap::new(),
        }
    }

    pub fn for_order(agent: impl Into<String>, order_id: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            order_id: Some(order_id.into()),
            options: HashMap::new(),
        }
    }

    pub fn with_option(mut self, key: &str, value: serde_json::Value) -> Self {
        self.options.insert(key.to_string(), value);
        self
    }
}

/// Outcome of one Action invocation. Never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub success: bool,
    pub status: OrderStatus,
    pub message: String,
    /// Set only when `status` is the paid terminal state.
    pub tx_hash: Option<String>,
    pub raw: HashMap<String, serde_json::Value>,
    pub simulation_mode: bool,
}

/// A named, auditable, retryable unit of work.
///
/// `validate` is a cheap precondition check and must never fail: any internal
/// error collapses to `false` ("not applicable right now"). `handler`
/// performs the work; callers go through [`crate::application::actions::run`]
/// so every failure is recorded before it propagates.
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &'static str;

    async fn validate(&self, state: &PipelineState, ctx: &ActionContext) -> bool;

    async fn handler(&self, state: &PipelineState, ctx: &ActionContext) -> Result<ActionResult>;
}
