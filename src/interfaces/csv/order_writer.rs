use crate::domain::order::OrderRecord;
use crate::error::Result;
use std::io::Write;

/// Writes final order state as CSV, one row per order.
pub struct OrderWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OrderWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_orders(&mut self, records: Vec<OrderRecord>) -> Result<()> {
        self.writer
            .write_record(["order_id", "status", "amount", "settlement_tx", "tx_hash"])?;
        for record in records {
            self.writer.write_record([
                record.order_id.as_str(),
                &record.status.to_string(),
                &record
                    .amount
                    .map(|a| a.to_string())
                    .unwrap_or_default(),
                record.settlement_tx.as_deref().unwrap_or_default(),
                record.tx_hash().unwrap_or_default(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
