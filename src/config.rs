use std::time::Duration;

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_var(key).and_then(|v| v.parse().ok())
}

/// Settlement network configuration.
///
/// Live mode is selected purely by configuration: when `SETTLEMENT_ENDPOINT`
/// is set the pipeline talks HTTP to the provider, otherwise it runs against
/// the deterministic simulation gateway. No code change is ever needed to
/// switch.
#[derive(Debug, Clone, Default)]
pub struct PaymentConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub network: String,
}

impl PaymentConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: env_var("SETTLEMENT_ENDPOINT"),
            api_key: env_var("SETTLEMENT_API_KEY"),
            network: env_var("SETTLEMENT_NETWORK").unwrap_or_else(|| "mainnet".to_string()),
        }
    }

    pub fn simulation(&self) -> bool {
        self.endpoint.is_none()
    }
}

/// Tunables for the queue, orchestrator, and sync driver.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of concurrent queue workers.
    pub workers: usize,
    /// Delay between payment-confirmation polls.
    pub poll_interval: Duration,
    /// Soft deadline for payment confirmation; expiry leaves the order
    /// Pending for a later sync cycle, it is not an error.
    pub confirm_timeout: Duration,
    /// Interval between sync driver cycles.
    pub sync_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            poll_interval: Duration::from_secs(10),
            confirm_timeout: Duration::from_secs(3600),
            sync_interval: Duration::from_secs(60),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            workers: env_parse("PIPELINE_WORKERS").unwrap_or(defaults.workers),
            poll_interval: env_parse("PIPELINE_POLL_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            confirm_timeout: env_parse("PIPELINE_CONFIRM_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.confirm_timeout),
            sync_interval: env_parse("PIPELINE_SYNC_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sync_interval),
        }
    }
}
