use crate::application::actions::{self, VerifyPayment};
use crate::application::queue::OrderProcessor;
use crate::config::PipelineConfig;
use crate::domain::action::{Action, ActionContext, PipelineState};
use crate::domain::audit::Notification;
use crate::domain::order::{OrderItem, OrderStatus, OrderUpdate};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const AGENT: &str = "orchestrator";

/// Per-order processor injected into the queue: requests a payment channel,
/// persists the initial record, then polls the verify-payment action until
/// the order is terminal or the confirmation window closes.
pub struct Orchestrator {
    state: PipelineState,
    verify: VerifyPayment,
    poll_interval: Duration,
    confirm_timeout: Duration,
}

impl Orchestrator {
    pub fn new(state: PipelineState, config: &PipelineConfig) -> Self {
        Self {
            state,
            verify: VerifyPayment,
            poll_interval: config.poll_interval,
            confirm_timeout: config.confirm_timeout,
        }
    }

    /// Step 1: generate the payment request and persist the order.
    ///
    /// A provider rejection here is terminal for this attempt: the order is
    /// recorded `Failed` and operators are notified before the error goes
    /// back to the queue. There is no in-place retry: a queue retry re-runs
    /// the whole processor and generates a brand-new payment request,
    /// because a failed request generation is not resumable mid-flight.
    async fn open_payment(&self, item: &OrderItem) -> Result<String> {
        let receipt = match self
            .state
            .gateway
            .request_payment(&item.order_id, item.amount, item.contact.as_deref())
            .await
        {
            Ok(receipt) => receipt,
            Err(PipelineError::Provider(err)) => {
                error!(
                    order_id = %item.order_id,
                    status_code = err.status_code,
                    endpoint = %err.endpoint,
                    "payment request rejected"
                );
                self.state
                    .store
                    .upsert(
                        &item.order_id,
                        OrderUpdate {
                            status: Some(OrderStatus::Failed),
                            customer_email: item.contact.clone(),
                            amount: Some(item.amount),
                            ..Default::default()
                        }
                        .with_raw_entry("provider_error", json!(err.to_string())),
                    )
                    .await?;
                self.state
                    .notifier
                    .notify(Notification::order_failed(&item.order_id, &err.to_string()))
                    .await;
                return Err(err.into());
            }
            Err(other) => return Err(other),
        };

        let mut update = OrderUpdate {
            status: Some(OrderStatus::Pending),
            customer_email: item.contact.clone(),
            amount: Some(item.amount),
            payment_request: Some(receipt.request_uri.clone()),
            settlement_tx: Some(receipt.tx_id.clone()),
            ..Default::default()
        }
        .with_raw_entry("network", json!(receipt.network))
        .with_raw_entry("simulation_mode", json!(receipt.simulation_mode));
        for (key, value) in &item.metadata {
            update = update.with_raw_entry(key, json!(value));
        }
        self.state.store.upsert(&item.order_id, update).await?;
        info!(
            order_id = %item.order_id,
            tx_id = %receipt.tx_id,
            simulation = receipt.simulation_mode,
            "payment requested"
        );
        Ok(receipt.tx_id)
    }

    /// Polls until terminal, validate-false, or the soft deadline.
    /// Returns the last observed status; timing out leaves the order
    /// `Pending` for a later sync cycle, which is not an error.
    async fn poll_until_terminal(&self, order_id: &str) -> Result<OrderStatus> {
        let deadline = Instant::now() + self.confirm_timeout;
        while Instant::now() < deadline {
            tokio::time::sleep(self.poll_interval).await;

            // Another path (refresh action, import) may have finished the
            // order while we slept.
            let Some(record) = self.state.store.get(order_id).await? else {
                warn!(order_id, "order disappeared mid-poll");
                return Ok(OrderStatus::Pending);
            };
            if record.status.is_terminal() {
                return Ok(record.status);
            }

            let ctx = ActionContext::for_order(AGENT, order_id);
            if !self.verify.validate(&self.state, &ctx).await {
                let status = self
                    .state
                    .store
                    .get(order_id)
                    .await?
                    .map(|r| r.status)
                    .unwrap_or(OrderStatus::Pending);
                debug!(order_id, %status, "verification no longer applicable, adopting persisted status");
                return Ok(status);
            }

            match actions::run(&self.verify, &self.state, &ctx).await {
                Ok(result) if result.status.is_terminal() => return Ok(result.status),
                Ok(result) => {
                    debug!(order_id, status = %result.status, "payment still outstanding");
                }
                // The action layer already audited the provider error; keep
                // polling until the deadline.
                Err(PipelineError::Provider(err)) => {
                    warn!(order_id, status_code = err.status_code, "provider error while polling");
                }
                Err(other) => return Err(other),
            }
        }
        info!(order_id, "confirmation window elapsed, leaving order pending");
        Ok(OrderStatus::Pending)
    }
}

#[async_trait]
impl OrderProcessor for Orchestrator {
    async fn process(&self, item: &OrderItem) -> Result<()> {
        self.open_payment(item).await?;

        let outcome = self.poll_until_terminal(&item.order_id).await?;

        // VerifyPayment already notifies on PAID; the orchestrator only
        // announces terminal failures.
        match outcome {
            OrderStatus::Failed => {
                self.state
                    .notifier
                    .notify(Notification::order_failed(
                        &item.order_id,
                        "settlement reported failure",
                    ))
                    .await;
            }
            OrderStatus::Expired => {
                self.state
                    .notifier
                    .notify(Notification::order_expired(&item.order_id))
                    .await;
            }
            _ => {}
        }
        Ok(())
    }
}
