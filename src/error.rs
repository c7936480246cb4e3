use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error raised by the settlement provider surface.
///
/// Carries enough context for callers to classify the failure: auth errors
/// (401/403) are flagged for credential-rotation escalation, everything else
/// is left to the caller's retry policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("settlement provider returned {status_code} from {endpoint}: {message}")]
pub struct ProviderError {
    pub status_code: u16,
    pub message: String,
    pub endpoint: String,
}

impl ProviderError {
    pub fn new(status_code: u16, message: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            endpoint: endpoint.into(),
        }
    }

    /// Transport-level failure (connect, timeout, malformed body). Status
    /// code 0 is never an auth code, so transport noise cannot trigger
    /// credential rotation.
    pub fn transport(message: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::new(0, message, endpoint)
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self.status_code, 401 | 403)
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl PipelineError {
    /// Stable machine-readable label used in audit records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Provider(_) => "provider_error",
            Self::Csv(_) => "csv_error",
            Self::Io(_) => "io_error",
            Self::Serde(_) => "serde_error",
            Self::Validation(_) => "validation_error",
            Self::Storage(_) => "storage_error",
        }
    }
}
