use clap::Parser;
use miette::{IntoDiagnostic, Result};
use orderflow::application::orchestrator::Orchestrator;
use orderflow::application::queue::OrderQueue;
use orderflow::application::sync::SyncDriver;
use orderflow::config::{PaymentConfig, PipelineConfig};
use orderflow::domain::action::PipelineState;
use orderflow::domain::ports::{EventLog, OrderStore};
use orderflow::infrastructure::in_memory::{InMemoryEventLog, InMemoryOrderStore};
use orderflow::infrastructure::settlement::gateway_from_config;
use orderflow::infrastructure::telemetry::{TracingNotifier, TracingSignals};
use orderflow::interfaces::csv::order_reader::CsvOrderSource;
use orderflow::interfaces::csv::order_writer::OrderWriter;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Orders CSV file to ingest (order_id, contact, amount, priority)
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Number of queue workers
    #[arg(long)]
    workers: Option<usize>,

    /// Seconds between payment-confirmation polls
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Seconds before an unconfirmed order is left pending for the next cycle
    #[arg(long)]
    confirm_timeout: Option<u64>,
}

fn build_stores(cli: &Cli) -> Result<(Arc<dyn OrderStore>, Arc<dyn EventLog>)> {
    #[cfg(feature = "storage-rocksdb")]
    if let Some(db_path) = &cli.db_path {
        let store = orderflow::infrastructure::rocksdb::RocksDbStore::open(db_path)
            .into_diagnostic()?;
        return Ok((Arc::new(store.clone()), Arc::new(store)));
    }
    #[cfg(not(feature = "storage-rocksdb"))]
    let _ = cli;
    Ok((
        Arc::new(InMemoryOrderStore::new()),
        Arc::new(InMemoryEventLog::new()),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = PipelineConfig::from_env();
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(secs) = cli.poll_interval {
        config.poll_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = cli.confirm_timeout {
        config.confirm_timeout = Duration::from_secs(secs);
    }

    let payment_config = PaymentConfig::from_env();
    info!(simulation = payment_config.simulation(), "starting pipeline");

    let (store, events) = build_stores(&cli)?;
    let state = PipelineState::new(
        store.clone(),
        gateway_from_config(&payment_config),
        events,
        Arc::new(TracingNotifier::new()),
        Arc::new(TracingSignals::new()),
    );

    let mut queue = OrderQueue::new(config.workers);
    queue.start(Arc::new(Orchestrator::new(state, &config)));

    let source = Arc::new(CsvOrderSource::new(&cli.input));
    let mut driver = SyncDriver::new(source, config.sync_interval);
    let enqueued = driver.run_cycle(&queue).await.into_diagnostic()?;
    info!(enqueued, "orders enqueued, draining queue");

    let report = queue.stop().await;
    info!(
        processed = report.processed,
        retried = report.retried,
        failed = report.failed,
        queued = report.queued,
        "queue stopped"
    );

    // Final order state on stdout, pending set last for operator visibility.
    let orders = store.all().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = OrderWriter::new(stdout.lock());
    writer.write_orders(orders).into_diagnostic()?;

    for record in store.pending().await.into_diagnostic()? {
        info!(order_id = %record.order_id, "order still pending");
    }

    Ok(())
}
