pub mod import_settled;
pub mod refresh_payment;
pub mod verify_payment;

pub use import_settled::ImportSettledOrder;
pub use refresh_payment::RefreshPayment;
pub use verify_payment::VerifyPayment;

use crate::domain::action::{Action, ActionContext, ActionResult, PipelineState};
use crate::domain::audit::{AuditRecord, Notification, ReputationSignal};
use crate::domain::order::{DeliveryView, OrderStatus, OrderUpdate};
use crate::domain::settlement::{SettlementStatus, StatusCheck};
use crate::error::{PipelineError, Result};
use serde_json::json;
use tracing::{error, info};

/// Invokes an Action handler with the mandatory failure bookkeeping: every
/// error is appended to the event log, auth errors fire the auth-pattern
/// hook, a negative reputation signal is emitted, and only then does the
/// error propagate. The Action layer never hides a failure, it records it.
pub async fn run(
    action: &dyn Action,
    state: &PipelineState,
    ctx: &ActionContext,
) -> Result<ActionResult> {
    match action.handler(state, ctx).await {
        Ok(result) => Ok(result),
        Err(err) => {
            let record = AuditRecord::action_failure(action.name(), ctx, &err);
            if let Err(log_err) = state.events.record(record).await {
                error!(error = %log_err, action = action.name(), "failed to append audit record");
            }
            if let PipelineError::Provider(provider) = &err
                && provider.is_auth_error()
            {
                state.signals.auth_alert(&ctx.agent, provider).await;
            }
            state
                .signals
                .reputation(&ctx.agent, ReputationSignal::Negative)
                .await;
            Err(err)
        }
    }
}

/// Shared transition logic for the verify and refresh actions: maps one
/// settlement status report onto the order state machine and performs the
/// attendant persistence, signaling, and notification.
pub(crate) async fn apply_status_check(
    state: &PipelineState,
    ctx: &ActionContext,
    order_id: &str,
    check: StatusCheck,
) -> Result<ActionResult> {
    match check.status {
        SettlementStatus::Confirmed => {
            let mut update = OrderUpdate::status(OrderStatus::Paid)
                .with_raw_entry("confirmations", json!(check.confirmations));
            if let Some(hash) = &check.tx_hash {
                update = update.with_raw_entry("tx_hash", json!(hash));
            }
            let record = state.store.upsert(order_id, update).await?;
            // The delivery view only exists for paid records; this is the
            // handle downstream unlock logic consumes.
            if let Some(view) = DeliveryView::from_record(&record) {
                info!(order_id = %view.order_id, "delivery unlocked");
            }
            state
                .signals
                .reputation(&ctx.agent, ReputationSignal::Positive)
                .await;
            state
                .notifier
                .notify(Notification::order_paid(order_id, check.tx_hash.as_deref()))
                .await;
            info!(order_id, tx_id = %check.tx_id, "payment confirmed");
            Ok(ActionResult {
                success: true,
                status: OrderStatus::Paid,
                message: format!("payment confirmed with {} confirmations", check.confirmations),
                tx_hash: check.tx_hash,
                raw: [("confirmations".to_string(), json!(check.confirmations))].into(),
                simulation_mode: check.simulation_mode,
            })
        }
        SettlementStatus::Failed | SettlementStatus::Expired => {
            let status = OrderStatus::from(check.status);
            state
                .store
                .upsert(order_id, OrderUpdate::status(status))
                .await?;
            let detail = format!("settlement transaction {} reported {}", check.tx_id, status);
            state
                .events
                .record(AuditRecord::failed_transaction(
                    ctx.agent.clone(),
                    order_id,
                    status,
                    &detail,
                ))
                .await?;
            Ok(ActionResult {
                success: false,
                status,
                message: detail,
                tx_hash: None,
                raw: [("confirmations".to_string(), json!(check.confirmations))].into(),
                simulation_mode: check.simulation_mode,
            })
        }
        SettlementStatus::Pending => Ok(ActionResult {
            success: false,
            status: OrderStatus::Pending,
            message: "payment not yet confirmed".to_string(),
            tx_hash: None,
            raw: [("confirmations".to_string(), json!(check.confirmations))].into(),
            simulation_mode: check.simulation_mode,
        }),
    }
}

/// Precondition shared by the payment re-check actions: the order exists,
/// carries a settlement handle, and is still in a re-checkable state.
pub(crate) async fn recheckable_tx(
    state: &PipelineState,
    ctx: &ActionContext,
) -> Result<Option<String>> {
    let Some(order_id) = &ctx.order_id else {
        return Ok(None);
    };
    let Some(record) = state.store.get(order_id).await? else {
        return Ok(None);
    };
    if !record.status.is_recheckable() {
        return Ok(None);
    }
    Ok(record.settlement_tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::Action;
    use crate::error::ProviderError;
    use crate::infrastructure::in_memory::{
        InMemoryEventLog, InMemoryOrderStore, RecordingNotifier, RecordingSignals,
    };
    use crate::infrastructure::settlement::SimulatedGateway;
    use async_trait::async_trait;
    use std::sync::Arc;

    fn state() -> (
        PipelineState,
        Arc<InMemoryEventLog>,
        Arc<RecordingSignals>,
    ) {
        let events = Arc::new(InMemoryEventLog::new());
        let signals = Arc::new(RecordingSignals::new());
        let state = PipelineState::new(
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(SimulatedGateway::new()),
            events.clone(),
            Arc::new(RecordingNotifier::new()),
            signals.clone(),
        );
        (state, events, signals)
    }

    struct AuthFailingAction;

    #[async_trait]
    impl Action for AuthFailingAction {
        fn name(&self) -> &'static str {
            "auth_failing"
        }

        async fn validate(&self, _state: &PipelineState, _ctx: &ActionContext) -> bool {
            true
        }

        async fn handler(
            &self,
            _state: &PipelineState,
            _ctx: &ActionContext,
        ) -> Result<ActionResult> {
            Err(ProviderError::new(401, "key revoked", "/payments/tx_1").into())
        }
    }

    #[tokio::test]
    async fn test_run_records_failure_before_propagating() {
        let (state, events, signals) = state();
        let ctx = ActionContext::for_order("operator", "ord_1");

        let err = run(&AuthFailingAction, &state, &ctx).await.unwrap_err();
        assert!(matches!(err, PipelineError::Provider(_)));

        let records = events.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, AuditRecord::KIND_ACTION_ERROR);
        assert_eq!(records[0].action.as_deref(), Some("auth_failing"));
        assert_eq!(records[0].status_code, Some(401));

        assert_eq!(signals.auth_alerts().await.len(), 1);
        assert_eq!(
            signals.reputation_signals().await,
            vec![("operator".to_string(), ReputationSignal::Negative)]
        );
    }
}
