use crate::domain::audit::{AuditRecord, Notification, ReputationSignal};
use crate::domain::order::{OrderRecord, OrderStatus, OrderUpdate};
use crate::domain::ports::{EventLog, Notifier, OrderStore, SignalSink};
use crate::error::{ProviderError, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct StoreInner {
    orders: HashMap<String, OrderRecord>,
    /// Order ids per customer contact.
    by_contact: HashMap<String, Vec<String>>,
    /// Ids of orders currently in Pending status.
    pending: Vec<String>,
}

/// A thread-safe in-memory order store.
///
/// A single write lock spans each read-modify-write upsert, so concurrent
/// upserts to the same order id are serialized and the contact/pending
/// indexes stay consistent with the record they describe.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn upsert(&self, order_id: &str, update: OrderUpdate) -> Result<OrderRecord> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        let record = inner
            .orders
            .entry(order_id.to_string())
            .or_insert_with(|| OrderRecord::new(order_id, now));
        let old_contact = record.contact_key();
        record.apply(update, now);
        let record = record.clone();

        // Pending-set membership follows the status transition.
        let in_pending = inner.pending.iter().any(|id| id == order_id);
        match (record.status, in_pending) {
            (OrderStatus::Pending, false) => inner.pending.push(order_id.to_string()),
            (OrderStatus::Pending, true) => {}
            (_, true) => inner.pending.retain(|id| id != order_id),
            (_, false) => {}
        }

        let new_contact = record.contact_key();
        if old_contact != new_contact {
            if let Some(old) = old_contact
                && let Some(ids) = inner.by_contact.get_mut(&old)
            {
                ids.retain(|id| id != order_id);
            }
            if let Some(new) = new_contact {
                inner.by_contact.entry(new).or_default().push(order_id.to_string());
            }
        } else if let Some(contact) = new_contact {
            let ids = inner.by_contact.entry(contact).or_default();
            if !ids.iter().any(|id| id == order_id) {
                ids.push(order_id.to_string());
            }
        }

        Ok(record)
    }

    async fn get(&self, order_id: &str) -> Result<Option<OrderRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.orders.get(order_id).cloned())
    }

    async fn by_contact(&self, contact: &str) -> Result<Vec<OrderRecord>> {
        let inner = self.inner.read().await;
        let mut records: Vec<OrderRecord> = inner
            .by_contact
            .get(contact)
            .into_iter()
            .flatten()
            .filter_map(|id| inner.orders.get(id).cloned())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn pending(&self) -> Result<Vec<OrderRecord>> {
        let inner = self.inner.read().await;
        let mut records: Vec<OrderRecord> = inner
            .pending
            .iter()
            .filter_map(|id| inner.orders.get(id).cloned())
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn all(&self) -> Result<Vec<OrderRecord>> {
        let inner = self.inner.read().await;
        let mut records: Vec<OrderRecord> = inner.orders.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }
}

/// Append-only in-memory event log.
#[derive(Default, Clone)]
pub struct InMemoryEventLog {
    records: Arc<RwLock<Vec<AuditRecord>>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn record(&self, event: AuditRecord) -> Result<()> {
        self.records.write().await.push(event);
        Ok(())
    }

    async fn count_since(&self, kind: &str, window: Duration) -> Result<usize> {
        Ok(self.list_since(kind, window).await?.len())
    }

    async fn list_since(&self, kind: &str, window: Duration) -> Result<Vec<AuditRecord>> {
        let cutoff = Utc::now() - window;
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.kind == kind && r.timestamp >= cutoff)
            .cloned()
            .collect())
    }
}

/// Test double that captures notifications instead of delivering them.
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    notes: Arc<RwLock<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn notes(&self) -> Vec<Notification> {
        self.notes.read().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, note: Notification) {
        self.notes.write().await.push(note);
    }
}

/// Test double that captures reputation signals and auth alerts.
#[derive(Default, Clone)]
pub struct RecordingSignals {
    reputation: Arc<RwLock<Vec<(String, ReputationSignal)>>>,
    auth: Arc<RwLock<Vec<(String, ProviderError)>>>,
}

impl RecordingSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn reputation_signals(&self) -> Vec<(String, ReputationSignal)> {
        self.reputation.read().await.clone()
    }

    pub async fn auth_alerts(&self) -> Vec<(String, ProviderError)> {
        self.auth.read().await.clone()
    }
}

#[async_trait]
impl SignalSink for RecordingSignals {
    async fn reputation(&self, agent: &str, signal: ReputationSignal) {
        self.reputation
            .write()
            .await
            .push((agent.to_string(), signal));
    }

    async fn auth_alert(&self, agent: &str, error: &ProviderError) {
        self.auth
            .write()
            .await
            .push((agent.to_string(), error.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_upsert_coalesce_preserves_unset_fields() {
        let store = InMemoryOrderStore::new();
        store
            .upsert(
                "ord_1",
                OrderUpdate {
                    customer_email: Some("alice@example.com".into()),
                    amount: Some(dec!(10.0).try_into().unwrap()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let record = store
            .upsert("ord_1", OrderUpdate::status(OrderStatus::Paid))
            .await
            .unwrap();
        assert_eq!(record.customer_email.as_deref(), Some("alice@example.com"));
        assert_eq!(record.amount, Some(dec!(10.0).try_into().unwrap()));
        assert_eq!(record.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_pending_index_follows_status_transitions() {
        let store = InMemoryOrderStore::new();
        store
            .upsert("ord_1", OrderUpdate::status(OrderStatus::Pending))
            .await
            .unwrap();
        store
            .upsert("ord_2", OrderUpdate::status(OrderStatus::Pending))
            .await
            .unwrap();
        assert_eq!(store.pending().await.unwrap().len(), 2);

        store
            .upsert("ord_1", OrderUpdate::status(OrderStatus::Paid))
            .await
            .unwrap();
        let pending = store.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].order_id, "ord_2");

        // Oldest first.
        store
            .upsert("ord_3", OrderUpdate::status(OrderStatus::Pending))
            .await
            .unwrap();
        let pending = store.pending().await.unwrap();
        assert_eq!(pending[0].order_id, "ord_2");
        assert_eq!(pending[1].order_id, "ord_3");
    }

    #[tokio::test]
    async fn test_by_contact_newest_first() {
        let store = InMemoryOrderStore::new();
        for id in ["ord_1", "ord_2"] {
            store
                .upsert(
                    id,
                    OrderUpdate {
                        customer_email: Some("alice@example.com".into()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        store
            .upsert(
                "ord_other",
                OrderUpdate {
                    customer_email: Some("bob@example.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let records = store.by_contact("alice@example.com").await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].created_at >= records[1].created_at);
    }

    #[tokio::test]
    async fn test_event_log_windowed_queries() {
        let log = InMemoryEventLog::new();
        log.record(AuditRecord::new("action_error", "tester", "first"))
            .await
            .unwrap();
        log.record(AuditRecord::new("failed_transaction", "tester", "second"))
            .await
            .unwrap();

        assert_eq!(
            log.count_since("action_error", Duration::hours(1)).await.unwrap(),
            1
        );
        let listed = log
            .list_since("failed_transaction", Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].detail, "second");
        // A zero-width window excludes everything already recorded.
        assert_eq!(
            log.count_since("action_error", Duration::zero()).await.unwrap(),
            0
        );
    }
}
