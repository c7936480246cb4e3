use crate::domain::audit::{Notification, NotificationKind, ReputationSignal};
use crate::domain::ports::{Notifier, SignalSink};
use crate::error::ProviderError;
use async_trait::async_trait;
use tracing::{info, warn};

/// Operator notifications emitted as structured log events, e.g. for a log
/// forwarder feeding an operator channel. Never fails the caller.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, note: Notification) {
        match note.kind {
            NotificationKind::OrderPaid => {
                info!(order_id = %note.order_id, "notify: {}", note.text);
            }
            NotificationKind::OrderFailed | NotificationKind::OrderExpired => {
                warn!(order_id = %note.order_id, "notify: {}", note.text);
            }
        }
    }
}

/// Reputation signals and auth-error patterns surfaced as log events for
/// the external score keeper and security monitor to consume.
#[derive(Debug, Default, Clone)]
pub struct TracingSignals;

impl TracingSignals {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SignalSink for TracingSignals {
    async fn reputation(&self, agent: &str, signal: ReputationSignal) {
        info!(agent, signal = ?signal, "reputation signal");
    }

    async fn auth_alert(&self, agent: &str, error: &ProviderError) {
        warn!(
            agent,
            status_code = error.status_code,
            endpoint = %error.endpoint,
            "auth error pattern"
        );
    }
}
