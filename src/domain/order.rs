use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Represents a positive monetary amount for orders.
///
/// Ensures that order amounts are always positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PipelineError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PipelineError::Validation(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PipelineError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Queue priority. Lower variants are dequeued first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Normal,
    Low,
}

/// One unit of work submitted to the order queue.
///
/// The retry counter belongs to the queue: it is zero on creation and only
/// the queue's failure handling mutates it.
#[derive(Debug, Clone)]
pub struct OrderItem {
    pub priority: Priority,
    pub order_id: String,
    pub contact: Option<String>,
    pub amount: Amount,
    pub metadata: HashMap<String, String>,
    pub retries: u32,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn new(order_id: impl Into<String>, amount: Amount) -> Self {
        Self {
            priority: Priority::Normal,
            order_id: order_id.into(),
            contact: None,
            amount,
            metadata: HashMap::new(),
            retries: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Order lifecycle states.
///
/// `Pending` and `Processing` are re-checkable; `Paid`, `Failed`, and
/// `Expired` are terminal. Some providers report the paid state as
/// `Success`, accepted here as a deserialization alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Processing,
    #[serde(rename = "PAID", alias = "Success")]
    Paid,
    Failed,
    Expired,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Failed | Self::Expired)
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, Self::Paid)
    }

    /// Whether a payment re-check is still meaningful.
    pub fn is_recheckable(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Paid => "PAID",
            Self::Failed => "Failed",
            Self::Expired => "Expired",
        };
        f.write_str(label)
    }
}

/// The persisted record of one customer order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub status: OrderStatus,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub amount: Option<Amount>,
    /// Payment-request handle (URI) returned by the settlement network.
    pub payment_request: Option<String>,
    /// Settlement-transaction identifier returned by the settlement network.
    pub settlement_tx: Option<String>,
    /// Provider-specific fields: transaction hash, confirmation count,
    /// simulation flag, error detail.
    pub raw: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRecord {
    pub fn new(order_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            order_id: order_id.into(),
            status: OrderStatus::Pending,
            customer_id: None,
            customer_email: None,
            amount: None,
            payment_request: None,
            settlement_tx: None,
            raw: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies an update with COALESCE semantics: a field not supplied
    /// retains its previous value, and raw entries are merged over the
    /// existing map.
    pub fn apply(&mut self, update: OrderUpdate, now: DateTime<Utc>) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(customer_id) = update.customer_id {
            self.customer_id = Some(customer_id);
        }
        if let Some(customer_email) = update.customer_email {
            self.customer_email = Some(customer_email);
        }
        if let Some(amount) = update.amount {
            self.amount = Some(amount);
        }
        if let Some(payment_request) = update.payment_request {
            self.payment_request = Some(payment_request);
        }
        if let Some(settlement_tx) = update.settlement_tx {
            self.settlement_tx = Some(settlement_tx);
        }
        if let Some(raw) = update.raw {
            self.raw.extend(raw);
        }
        self.updated_at = now;
    }

    /// Key under which this order is indexed for customer lookup.
    pub fn contact_key(&self) -> Option<String> {
        self.customer_email
            .clone()
            .or_else(|| self.customer_id.clone())
    }

    pub fn tx_hash(&self) -> Option<&str> {
        self.raw.get("tx_hash").and_then(|v| v.as_str())
    }
}

/// Partial update applied to an order record. `None` means "keep".
#[derive(Debug, Clone, Default)]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub amount: Option<Amount>,
    pub payment_request: Option<String>,
    pub settlement_tx: Option<String>,
    pub raw: Option<HashMap<String, serde_json::Value>>,
}

impl OrderUpdate {
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_raw_entry(mut self, key: &str, value: serde_json::Value) -> Self {
        self.raw
            .get_or_insert_with(HashMap::new)
            .insert(key.to_string(), value);
        self
    }
}

/// The view handed to delivery-unlock logic.
///
/// Only constructible from a paid record, so downstream shipping code cannot
/// be reached for an unpaid order.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryView {
    pub order_id: String,
    pub customer_email: Option<String>,
    pub tx_hash: Option<String>,
}

impl DeliveryView {
    pub fn from_record(record: &OrderRecord) -> Option<Self> {
        if !record.status.is_paid() {
            return None;
        }
        Some(Self {
            order_id: record.order_id.clone(),
            customer_email: record.customer_email.clone(),
            tx_hash: record.tx_hash().map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(PipelineError::Validation(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::High < Priority::Normal);
        assert!(Priority::Normal < Priority::Low);
    }

    #[test]
    fn test_status_terminality() {
        assert!(OrderStatus::Paid.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
        assert!(OrderStatus::Expired.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Pending.is_recheckable());
        assert!(OrderStatus::Processing.is_recheckable());
        assert!(!OrderStatus::Paid.is_recheckable());
    }

    #[test]
    fn test_status_success_alias() {
        let status: OrderStatus = serde_json::from_str("\"Success\"").unwrap();
        assert_eq!(status, OrderStatus::Paid);
        let status: OrderStatus = serde_json::from_str("\"PAID\"").unwrap();
        assert_eq!(status, OrderStatus::Paid);
        assert_eq!(serde_json::to_string(&OrderStatus::Paid).unwrap(), "\"PAID\"");
    }

    #[test]
    fn test_apply_coalesces_unset_fields() {
        let now = Utc::now();
        let mut record = OrderRecord::new("ord_1", now);
        record.apply(
            OrderUpdate {
                customer_email: Some("alice@example.com".into()),
                amount: Some(dec!(49.99).try_into().unwrap()),
                ..Default::default()
            },
            now,
        );

        // Status-only update must leave email and amount untouched.
        record.apply(OrderUpdate::status(OrderStatus::Paid), now);

        assert_eq!(record.status, OrderStatus::Paid);
        assert_eq!(record.customer_email.as_deref(), Some("alice@example.com"));
        assert_eq!(record.amount, Some(dec!(49.99).try_into().unwrap()));
    }

    #[test]
    fn test_apply_merges_raw_map() {
        let now = Utc::now();
        let mut record = OrderRecord::new("ord_1", now);
        record.apply(
            OrderUpdate::default().with_raw_entry("network", json!("simnet")),
            now,
        );
        record.apply(
            OrderUpdate::default().with_raw_entry("tx_hash", json!("0xabc")),
            now,
        );

        assert_eq!(record.raw.get("network"), Some(&json!("simnet")));
        assert_eq!(record.tx_hash(), Some("0xabc"));
    }

    #[test]
    fn test_delivery_view_requires_paid_status() {
        let now = Utc::now();
        let mut record = OrderRecord::new("ord_1", now);
        assert!(DeliveryView::from_record(&record).is_none());

        record.apply(
            OrderUpdate::status(OrderStatus::Paid).with_raw_entry("tx_hash", json!("0xabc")),
            now,
        );
        let view = DeliveryView::from_record(&record).unwrap();
        assert_eq!(view.order_id, "ord_1");
        assert_eq!(view.tx_hash.as_deref(), Some("0xabc"));

        record.apply(OrderUpdate::status(OrderStatus::Pending), now);
        assert!(DeliveryView::from_record(&record).is_none());
    }
}
