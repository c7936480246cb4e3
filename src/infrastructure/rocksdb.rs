use crate::domain::audit::AuditRecord;
use crate::domain::order::{OrderRecord, OrderStatus, OrderUpdate};
use crate::domain::ports::{EventLog, OrderStore};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing order records.
pub const CF_ORDERS: &str = "orders";
/// Column Family for the append-only event log.
pub const CF_EVENTS: &str = "events";

/// A persistent store implementation using RocksDB.
///
/// Orders and audit events live in separate Column Families with
/// JSON-encoded values. Upserts are serialized through a mutex so the
/// read-modify-write COALESCE cycle never loses a concurrent update.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    upsert_lock: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_orders = ColumnFamilyDescriptor::new(CF_ORDERS, Options::default());
        let cf_events = ColumnFamilyDescriptor::new(CF_EVENTS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_orders, cf_events])
            .map_err(|e| PipelineError::Storage(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            upsert_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PipelineError::Storage(format!("{name} column family not found")))
    }

    fn read_order(&self, order_id: &str) -> Result<Option<OrderRecord>> {
        let cf = self.cf(CF_ORDERS)?;
        let bytes = self
            .db
            .get_cf(cf, order_id.as_bytes())
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
        match bytes {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_orders(&self) -> Result<Vec<OrderRecord>> {
        let cf = self.cf(CF_ORDERS)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item.map_err(|e| PipelineError::Storage(e.to_string()))?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl OrderStore for RocksDbStore {
    async fn upsert(&self, order_id: &str, update: OrderUpdate) -> Result<OrderRecord> {
        let _guard = self.upsert_lock.lock().await;
        let now = Utc::now();
        let mut record = self
            .read_order(order_id)?
            .unwrap_or_else(|| OrderRecord::new(order_id, now));
        record.apply(update, now);

        let cf = self.cf(CF_ORDERS)?;
        let value = serde_json::to_vec(&record)?;
        self.db
            .put_cf(cf, order_id.as_bytes(), value)
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
        Ok(record)
    }

    async fn get(&self, order_id: &str) -> Result<Option<OrderRecord>> {
        self.read_order(order_id)
    }

    async fn by_contact(&self, contact: &str) -> Result<Vec<OrderRecord>> {
        let mut records: Vec<OrderRecord> = self
            .scan_orders()?
            .into_iter()
            .filter(|r| r.contact_key().as_deref() == Some(contact))
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn pending(&self) -> Result<Vec<OrderRecord>> {
        let mut records: Vec<OrderRecord> = self
            .scan_orders()?
            .into_iter()
            .filter(|r| r.status == OrderStatus::Pending)
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn all(&self) -> Result<Vec<OrderRecord>> {
        let mut records = self.scan_orders()?;
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }
}

#[async_trait]
impl EventLog for RocksDbStore {
    async fn record(&self, event: AuditRecord) -> Result<()> {
        let cf = self.cf(CF_EVENTS)?;
        // Nanosecond timestamp prefix keeps the log iterable in time order;
        // the uuid suffix disambiguates same-instant records.
        let key = format!(
            "{:020}_{}",
            event.timestamp.timestamp_nanos_opt().unwrap_or_default(),
            event.id
        );
        let value = serde_json::to_vec(&event)?;
        self.db
            .put_cf(cf, key.as_bytes(), value)
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn count_since(&self, kind: &str, window: Duration) -> Result<usize> {
        Ok(self.list_since(kind, window).await?.len())
    }

    async fn list_since(&self, kind: &str, window: Duration) -> Result<Vec<AuditRecord>> {
        let cutoff = Utc::now() - window;
        let cf = self.cf(CF_EVENTS)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item.map_err(|e| PipelineError::Storage(e.to_string()))?;
            let record: AuditRecord = serde_json::from_slice(&value)?;
            if record.kind == kind && record.timestamp >= cutoff {
                records.push(record);
            }
        }
        Ok(records)
    }
}
