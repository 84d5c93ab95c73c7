use std::time::Duration;
use thiserror::Error;

/// Per-adapter failure. Recovered locally by the aggregator: the failing
/// source is excluded from the batch, the cycle goes on.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{provider}: request failed: {reason}")]
    Fetch {
        provider: &'static str,
        reason: String,
    },

    #[error("{provider}: no response within {}s", .timeout.as_secs())]
    Timeout {
        provider: &'static str,
        timeout: Duration,
    },

    #[error("{provider}: unparseable page content: {reason}")]
    Parse {
        provider: &'static str,
        reason: String,
    },
}

impl SourceError {
    pub fn provider(&self) -> &'static str {
        match self {
            SourceError::Fetch { provider, .. }
            | SourceError::Timeout { provider, .. }
            | SourceError::Parse { provider, .. } => provider,
        }
    }
}

/// Engine-level failure. Never fatal to the process: the scheduler stays
/// live and retries on the next fire.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("all {} configured sources failed", .errors.len())]
    AllSourcesFailed { errors: Vec<SourceError> },

    #[error("invalid criteria: {0}")]
    InvalidCriteria(String),
}
