use orderflow::domain::action::PipelineState;
use orderflow::domain::order::Amount;
use orderflow::infrastructure::in_memory::{
    InMemoryEventLog, InMemoryOrderStore, RecordingNotifier, RecordingSignals,
};
use orderflow::infrastructure::settlement::SimulatedGateway;
use rust_decimal::Decimal;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;

/// In-memory pipeline wired to the deterministic simulation gateway, with
/// recording fakes for every outward-facing contract.
pub struct TestPipeline {
    pub state: PipelineState,
    pub store: Arc<InMemoryOrderStore>,
    pub events: Arc<InMemoryEventLog>,
    pub notifier: Arc<RecordingNotifier>,
    pub signals: Arc<RecordingSignals>,
}

impl TestPipeline {
    pub fn new() -> Self {
        Self::with_gateway(Arc::new(SimulatedGateway::new()))
    }

    pub fn with_gateway(
        gateway: Arc<dyn orderflow::domain::ports::SettlementGateway>,
    ) -> Self {
        let store = Arc::new(InMemoryOrderStore::new());
        let events = Arc::new(InMemoryEventLog::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let signals = Arc::new(RecordingSignals::new());
        let state = PipelineState::new(
            store.clone(),
            gateway,
            events.clone(),
            notifier.clone(),
            signals.clone(),
        );
        Self {
            state,
            store,
            events,
            notifier,
            signals,
        }
    }
}

pub fn amount(value: Decimal) -> Amount {
    Amount::new(value).unwrap()
}

pub fn generate_orders_csv(path: &Path, rows: &[(&str, &str)]) -> Result<(), Error> {
    let file = std::fs::File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["order_id", "contact", "amount", "priority"])?;
    for (order_id, amount) in rows {
        wtr.write_record([order_id, "", amount, ""])?;
    }

    wtr.flush()?;
    Ok(())
}
