use super::order::OrderStatus;
use serde::{Deserialize, Serialize};

/// Confirmation state reported by the settlement network for one
/// transaction. `Confirmed` maps to `PAID` on the order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementStatus {
    #[serde(alias = "Success")]
    Confirmed,
    Pending,
    Failed,
    Expired,
}

impl From<SettlementStatus> for OrderStatus {
    fn from(status: SettlementStatus) -> Self {
        match status {
            SettlementStatus::Confirmed => OrderStatus::Paid,
            SettlementStatus::Pending => OrderStatus::Pending,
            SettlementStatus::Failed => OrderStatus::Failed,
            SettlementStatus::Expired => OrderStatus::Expired,
        }
    }
}

/// Result of requesting a payment channel for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub request_uri: String,
    pub tx_id: String,
    pub network: String,
    pub simulation_mode: bool,
}

/// Result of polling (or force-refreshing) a settlement transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCheck {
    pub tx_id: String,
    pub status: SettlementStatus,
    pub confirmations: u32,
    pub tx_hash: Option<String>,
    pub simulation_mode: bool,
    pub refreshed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settlement_status_maps_to_order_status() {
        assert_eq!(
            OrderStatus::from(SettlementStatus::Confirmed),
            OrderStatus::Paid
        );
        assert_eq!(
            OrderStatus::from(SettlementStatus::Pending),
            OrderStatus::Pending
        );
        assert_eq!(
            OrderStatus::from(SettlementStatus::Failed),
            OrderStatus::Failed
        );
        assert_eq!(
            OrderStatus::from(SettlementStatus::Expired),
            OrderStatus::Expired
        );
    }

    #[test]
    fn test_provider_success_alias() {
        let status: SettlementStatus = serde_json::from_str("\"Success\"").unwrap();
        assert_eq!(status, SettlementStatus::Confirmed);
    }
}
