use crate::domain::action::{Action, ActionContext, ActionResult, PipelineState};
use crate::domain::order::{OrderStatus, OrderUpdate};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

/// Externally-confirmed payment record supplied to the import action, e.g.
/// when settlement was verified over a different channel.
#[derive(Debug, Clone, Deserialize)]
pub struct SettledPayment {
    pub tx_hash: String,
    #[serde(default)]
    pub tx_id: Option<String>,
    #[serde(default)]
    pub confirmations: Option<u32>,
}

/// Persists an already-settled order as `PAID` without ever contacting the
/// settlement network.
pub struct ImportSettledOrder;

impl ImportSettledOrder {
    /// Context option key carrying the [`SettledPayment`] record.
    pub const OPTION_SETTLEMENT: &'static str = "settlement";

    fn settlement(ctx: &ActionContext) -> Result<SettledPayment> {
        let value = ctx.options.get(Self::OPTION_SETTLEMENT).ok_or_else(|| {
            PipelineError::Validation("import requires a confirmed settlement record".into())
        })?;
        Ok(serde_json::from_value(value.clone())?)
    }
}

#[async_trait]
impl Action for ImportSettledOrder {
    fn name(&self) -> &'static str {
        "import_settled_order"
    }

    async fn validate(&self, _state: &PipelineState, ctx: &ActionContext) -> bool {
        ctx.order_id.is_some() && Self::settlement(ctx).is_ok()
    }

    async fn handler(&self, state: &PipelineState, ctx: &ActionContext) -> Result<ActionResult> {
        let order_id = ctx.order_id.clone().ok_or_else(|| {
            PipelineError::Validation("import_settled_order requires an order id".into())
        })?;
        let settlement = Self::settlement(ctx)?;

        let mut update = OrderUpdate::status(OrderStatus::Paid)
            .with_raw_entry("tx_hash", json!(settlement.tx_hash))
            .with_raw_entry("imported", json!(true));
        if let Some(confirmations) = settlement.confirmations {
            update = update.with_raw_entry("confirmations", json!(confirmations));
        }
        update.settlement_tx = settlement.tx_id.clone();
        state.store.upsert(&order_id, update).await?;
        info!(order_id, tx_hash = %settlement.tx_hash, "settled order imported");

        Ok(ActionResult {
            success: true,
            status: OrderStatus::Paid,
            message: "order imported as settled".to_string(),
            tx_hash: Some(settlement.tx_hash),
            raw: [("imported".to_string(), json!(true))].into(),
            simulation_mode: false,
        })
    }
}
