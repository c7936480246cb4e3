use crate::domain::action::{Action, ActionContext, ActionResult, PipelineState};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;

use super::{apply_status_check, recheckable_tx};

/// On-demand re-check of a stuck order via a forced provider refresh.
///
/// Same transition logic as [`super::VerifyPayment`], but goes through
/// `force_refresh` so a stale cached status on the provider side is
/// re-derived instead of replayed.
pub struct RefreshPayment;

#[async_trait]
impl Action for RefreshPayment {
    fn name(&self) -> &'static str {
        "refresh_payment"
    }

    async fn validate(&self, state: &PipelineState, ctx: &ActionContext) -> bool {
        matches!(recheckable_tx(state, ctx).await, Ok(Some(_)))
    }

    async fn handler(&self, state: &PipelineState, ctx: &ActionContext) -> Result<ActionResult> {
        let order_id = ctx
            .order_id
            .clone()
            .ok_or_else(|| PipelineError::Validation("refresh_payment requires an order id".into()))?;
        let tx_id = recheckable_tx(state, ctx).await?.ok_or_else(|| {
            PipelineError::Validation(format!("order {order_id} is not awaiting verification"))
        })?;
        let check = state
            .gateway
            .force_refresh(&tx_id, Some(&order_id))
            .await?;
        apply_status_check(state, ctx, &order_id, check).await
    }
}
