use crate::domain::order::{Amount, OrderItem, Priority};
use crate::domain::ports::OrderSource;
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct OrderRow {
    order_id: String,
    #[serde(default)]
    contact: Option<String>,
    amount: Decimal,
    #[serde(default)]
    priority: Option<Priority>,
}

impl OrderRow {
    fn into_item(self) -> Result<OrderItem> {
        let amount = Amount::new(self.amount)?;
        let mut item = OrderItem::new(self.order_id, amount);
        if let Some(contact) = self.contact.filter(|c| !c.is_empty()) {
            item = item.with_contact(contact);
        }
        if let Some(priority) = self.priority {
            item = item.with_priority(priority);
        }
        Ok(item)
    }
}

/// Reads order items from a CSV source.
///
/// Wraps `csv::Reader` and provides an iterator over `Result<OrderItem>`,
/// with whitespace trimming and flexible record lengths so a hand-edited
/// orders file parses cleanly.
pub struct OrderReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OrderReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes order rows.
    pub fn orders(self) -> impl Iterator<Item = Result<OrderItem>> {
        self.reader
            .into_deserialize::<OrderRow>()
            .map(|row| row.map_err(crate::error::PipelineError::from)?.into_item())
    }
}

/// Order source backed by a CSV file that is re-read every sync cycle, so
/// rows appended between cycles are picked up; the sync driver's dedupe
/// keeps previously-enqueued rows from re-entering the queue.
pub struct CsvOrderSource {
    path: PathBuf,
}

impl CsvOrderSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl OrderSource for CsvOrderSource {
    async fn fetch_created(&self) -> Result<Vec<OrderItem>> {
        let file = std::fs::File::open(&self.path)?;
        let mut items = Vec::new();
        for item in OrderReader::new(file).orders() {
            match item {
                Ok(item) => items.push(item),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed order row");
                }
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "order_id, contact, amount, priority\n\
                    ord_1, alice@example.com, 49.99, high\n\
                    ord_2, , 12.50,";
        let reader = OrderReader::new(data.as_bytes());
        let results: Vec<Result<OrderItem>> = reader.orders().collect();

        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.order_id, "ord_1");
        assert_eq!(first.contact.as_deref(), Some("alice@example.com"));
        assert_eq!(first.priority, Priority::High);
        assert_eq!(first.amount, dec!(49.99).try_into().unwrap());

        let second = results[1].as_ref().unwrap();
        assert_eq!(second.contact, None);
        assert_eq!(second.priority, Priority::Normal);
    }

    #[test]
    fn test_reader_rejects_non_positive_amount() {
        let data = "order_id, contact, amount, priority\nord_1, , -5.0,";
        let reader = OrderReader::new(data.as_bytes());
        let results: Vec<Result<OrderItem>> = reader.orders().collect();
        assert!(results[0].is_err());
    }

    #[tokio::test]
    async fn test_csv_source_skips_malformed_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.csv");
        std::fs::write(
            &path,
            "order_id, contact, amount, priority\n\
             ord_1, , 10.00,\n\
             ord_bad, , not_a_number,\n\
             ord_2, , 20.00, low\n",
        )
        .unwrap();

        let source = CsvOrderSource::new(&path);
        let items = source.fetch_created().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].order_id, "ord_1");
        assert_eq!(items[1].priority, Priority::Low);
    }
}
