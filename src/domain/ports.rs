use crate::error::{ProviderError, Result};
use async_trait::async_trait;
use chrono::Duration;

use super::audit::{AuditRecord, Notification, ReputationSignal};
use super::order::{Amount, OrderItem, OrderRecord, OrderUpdate};
use super::settlement::{PaymentReceipt, StatusCheck};

/// Persistence contract for order records.
///
/// `upsert` must apply COALESCE semantics (fields absent from the update
/// keep their previous values) and keep the contact and pending indexes
/// consistent with status transitions. Implementations serialize concurrent
/// upserts to the same key so no update is silently lost.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn upsert(&self, order_id: &str, update: OrderUpdate) -> Result<OrderRecord>;
    async fn get(&self, order_id: &str) -> Result<Option<OrderRecord>>;
    /// All orders for a customer contact, newest first.
    async fn by_contact(&self, contact: &str) -> Result<Vec<OrderRecord>>;
    /// Orders currently in `Pending` status, oldest first.
    async fn pending(&self) -> Result<Vec<OrderRecord>>;
    async fn all(&self) -> Result<Vec<OrderRecord>>;
}

/// Append-only structured event log with time-windowed queries.
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn record(&self, event: AuditRecord) -> Result<()>;
    async fn count_since(&self, kind: &str, window: Duration) -> Result<usize>;
    async fn list_since(&self, kind: &str, window: Duration) -> Result<Vec<AuditRecord>>;
}

/// Best-effort operator notification. Must never fail the caller: delivery
/// problems are logged and swallowed by the implementation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, note: Notification);
}

/// Best-effort side signals consumed by external subsystems: the EWMA
/// reputation score and the auth-error-pattern monitor.
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn reputation(&self, agent: &str, signal: ReputationSignal);
    async fn auth_alert(&self, agent: &str, error: &ProviderError);
}

/// External settlement network surface.
///
/// No operation retries internally and none swallows a provider error;
/// retry policy belongs to the caller.
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    async fn request_payment(
        &self,
        order_id: &str,
        amount: Amount,
        contact: Option<&str>,
    ) -> Result<PaymentReceipt>;

    async fn check_status(&self, tx_id: &str) -> Result<StatusCheck>;

    /// Forced re-read for a request suspected stale; the result carries
    /// `refreshed = true`.
    async fn force_refresh(&self, tx_id: &str, order_id: Option<&str>) -> Result<StatusCheck>;
}

/// External source the sync driver pulls newly-created orders from.
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn fetch_created(&self) -> Result<Vec<OrderItem>>;
}
