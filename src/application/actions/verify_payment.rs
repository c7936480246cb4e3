use crate::domain::action::{Action, ActionContext, ActionResult, PipelineState};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;

use super::{apply_status_check, recheckable_tx};

/// Polls the settlement network for an order awaiting payment and applies
/// the resulting status transition.
///
/// Valid while the order exists, carries a settlement handle, and is still
/// `Pending` or `Processing`. Once the order is terminal a second invocation
/// is a no-op at the validate gate, which is what makes the orchestrator's
/// poll loop idempotent.
pub struct VerifyPayment;

#[async_trait]
impl Action for VerifyPayment {
    fn name(&self) -> &'static str {
        "verify_payment"
    }

    async fn validate(&self, state: &PipelineState, ctx: &ActionContext) -> bool {
        matches!(recheckable_tx(state, ctx).await, Ok(Some(_)))
    }

    async fn handler(&self, state: &PipelineState, ctx: &ActionContext) -> Result<ActionResult> {
        let order_id = ctx
            .order_id
            .clone()
            .ok_or_else(|| PipelineError::Validation("verify_payment requires an order id".into()))?;
        let tx_id = recheckable_tx(state, ctx).await?.ok_or_else(|| {
            PipelineError::Validation(format!("order {order_id} is not awaiting verification"))
        })?;
        let check = state.gateway.check_status(&tx_id).await?;
        apply_status_check(state, ctx, &order_id, check).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::actions;
    use crate::domain::audit::{AuditRecord, NotificationKind, ReputationSignal};
    use crate::domain::order::{OrderStatus, OrderUpdate};
    use crate::domain::ports::OrderStore;
    use crate::infrastructure::in_memory::{
        InMemoryEventLog, InMemoryOrderStore, RecordingNotifier, RecordingSignals,
    };
    use crate::infrastructure::settlement::SimulatedGateway;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::Arc;

    struct Fixture {
        state: PipelineState,
        store: Arc<InMemoryOrderStore>,
        events: Arc<InMemoryEventLog>,
        notifier: Arc<RecordingNotifier>,
        signals: Arc<RecordingSignals>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryOrderStore::new());
        let events = Arc::new(InMemoryEventLog::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let signals = Arc::new(RecordingSignals::new());
        let state = PipelineState::new(
            store.clone(),
            Arc::new(SimulatedGateway::new()),
            events.clone(),
            notifier.clone(),
            signals.clone(),
        );
        Fixture {
            state,
            store,
            events,
            notifier,
            signals,
        }
    }

    async fn seed_pending(store: &InMemoryOrderStore, order_id: &str, tx_id: &str) {
        store
            .upsert(
                order_id,
                OrderUpdate {
                    status: Some(OrderStatus::Pending),
                    customer_email: Some("alice@example.com".into()),
                    amount: Some(dec!(49.99).try_into().unwrap()),
                    settlement_tx: Some(tx_id.into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_validate_requires_recheckable_order() {
        let f = fixture();
        let ctx = ActionContext::for_order("tester", "ord_1");
        assert!(!VerifyPayment.validate(&f.state, &ctx).await);

        seed_pending(&f.store, "ord_1", "sim_00").await;
        assert!(VerifyPayment.validate(&f.state, &ctx).await);

        f.store
            .upsert("ord_1", OrderUpdate::status(OrderStatus::Paid))
            .await
            .unwrap();
        assert!(!VerifyPayment.validate(&f.state, &ctx).await);
    }

    #[tokio::test]
    async fn test_confirmed_transition_persists_paid_and_notifies() {
        let f = fixture();
        // Even final hex digit: the simulation reports Confirmed.
        seed_pending(&f.store, "ord_1", "sim_0a2c").await;
        let ctx = ActionContext::for_order("tester", "ord_1");

        let result = actions::run(&VerifyPayment, &f.state, &ctx).await.unwrap();
        assert!(result.success);
        assert_eq!(result.status, OrderStatus::Paid);
        assert!(result.tx_hash.is_some());

        let record = f.store.get("ord_1").await.unwrap().unwrap();
        assert_eq!(record.status, OrderStatus::Paid);
        assert_eq!(record.raw.get("confirmations"), Some(&json!(6)));
        assert!(record.tx_hash().is_some());
        // Coalesce: fields from the seed survive the status transition.
        assert_eq!(record.customer_email.as_deref(), Some("alice@example.com"));

        let notes = f.notifier.notes().await;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::OrderPaid);
        assert_eq!(
            f.signals.reputation_signals().await,
            vec![("tester".to_string(), ReputationSignal::Positive)]
        );
    }

    #[tokio::test]
    async fn test_pending_transition_reports_not_confirmed() {
        let f = fixture();
        // Odd final hex digit: the simulation keeps reporting Pending.
        seed_pending(&f.store, "ord_1", "sim_0a1b").await;
        let ctx = ActionContext::for_order("tester", "ord_1");

        let result = actions::run(&VerifyPayment, &f.state, &ctx).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.status, OrderStatus::Pending);
        assert_eq!(result.raw.get("confirmations"), Some(&json!(0)));
        assert!(f.notifier.notes().await.is_empty());

        let record = f.store.get("ord_1").await.unwrap().unwrap();
        assert_eq!(record.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_second_confirmed_verification_is_gated_by_validate() {
        let f = fixture();
        seed_pending(&f.store, "ord_1", "sim_0a2c").await;
        let ctx = ActionContext::for_order("tester", "ord_1");

        let result = actions::run(&VerifyPayment, &f.state, &ctx).await.unwrap();
        assert_eq!(result.status, OrderStatus::Paid);

        // The order is paid now: validate turns false, so a second pass
        // never re-fires the paid notification.
        assert!(!VerifyPayment.validate(&f.state, &ctx).await);
        assert_eq!(f.notifier.notes().await.len(), 1);
        let record = f.store.get("ord_1").await.unwrap().unwrap();
        assert_eq!(record.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_failed_transaction_writes_security_event() {
        let f = fixture();
        seed_pending(&f.store, "ord_1", "sim_0a2c").await;
        let ctx = ActionContext::for_order("tester", "ord_1");

        // Drive the terminal-failure branch directly.
        let check = crate::domain::settlement::StatusCheck {
            tx_id: "sim_0a2c".into(),
            status: crate::domain::settlement::SettlementStatus::Expired,
            confirmations: 0,
            tx_hash: None,
            simulation_mode: true,
            refreshed: false,
        };
        let result = super::super::apply_status_check(&f.state, &ctx, "ord_1", check)
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.status, OrderStatus::Expired);

        let record = f.store.get("ord_1").await.unwrap().unwrap();
        assert_eq!(record.status, OrderStatus::Expired);

        let events = f.events.records().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AuditRecord::KIND_FAILED_TRANSACTION);
        assert_eq!(events[0].order_id.as_deref(), Some("ord_1"));
    }
}
