use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::action::ActionContext;
use super::order::OrderStatus;

/// One append-only structured event, consumed downstream by the
/// security-monitoring process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub action: Option<String>,
    pub agent: String,
    pub order_id: Option<String>,
    pub error_kind: Option<String>,
    pub status_code: Option<u16>,
    pub endpoint: Option<String>,
    pub detail: String,
    pub extra: HashMap<String, serde_json::Value>,
}

impl AuditRecord {
    pub const KIND_ACTION_ERROR: &'static str = "action_error";
    pub const KIND_FAILED_TRANSACTION: &'static str = "failed_transaction";

    pub fn new(kind: &str, agent: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind: kind.to_string(),
            action: None,
            agent: agent.into(),
            order_id: None,
            error_kind: None,
            status_code: None,
            endpoint: None,
            detail: detail.into(),
            extra: HashMap::new(),
        }
    }

    /// Record written for every Action handler failure, before the error
    /// propagates.
    pub fn action_failure(action: &str, ctx: &ActionContext, err: &PipelineError) -> Self {
        let mut record = Self::new(Self::KIND_ACTION_ERROR, ctx.agent.clone(), err.to_string());
        record.action = Some(action.to_string());
        record.order_id = ctx.order_id.clone();
        record.error_kind = Some(err.kind().to_string());
        if let PipelineError::Provider(provider) = err {
            record.status_code = Some(provider.status_code);
            record.endpoint = Some(provider.endpoint.clone());
        }
        record
    }

    /// Security event for a settlement transaction that ended `Failed` or
    /// `Expired`.
    pub fn failed_transaction(
        agent: impl Into<String>,
        order_id: impl Into<String>,
        status: OrderStatus,
        detail: impl Into<String>,
    ) -> Self {
        let mut record = Self::new(Self::KIND_FAILED_TRANSACTION, agent, detail);
        record.order_id = Some(order_id.into());
        record
            .extra
            .insert("status".to_string(), serde_json::json!(status.to_string()));
        record
    }
}

/// Reputation signal emitted toward the external EWMA score keeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReputationSignal {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    OrderPaid,
    OrderFailed,
    OrderExpired,
}

/// Best-effort operator message. Delivery failures are logged and swallowed,
/// never allowed to fail an order transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub order_id: String,
    pub kind: NotificationKind,
    pub text: String,
}

impl Notification {
    pub fn order_paid(order_id: impl Into<String>, tx_hash: Option<&str>) -> Self {
        let order_id = order_id.into();
        Self {
            text: format!(
                "Order {} paid ({})",
                order_id,
                tx_hash.unwrap_or("hash pending")
            ),
            order_id,
            kind: NotificationKind::OrderPaid,
        }
    }

    pub fn order_failed(order_id: impl Into<String>, detail: &str) -> Self {
        let order_id = order_id.into();
        Self {
            text: format!("Order {} failed: {}", order_id, detail),
            order_id,
            kind: NotificationKind::OrderFailed,
        }
    }

    pub fn order_expired(order_id: impl Into<String>) -> Self {
        let order_id = order_id.into();
        Self {
            text: format!("Order {} expired before payment", order_id),
            order_id,
            kind: NotificationKind::OrderExpired,
        }
    }
}
