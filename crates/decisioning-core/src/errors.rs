use std::time::Duration;

use crate::messages;

/// Typed errors for artifact retrieval.
/// Classifies failures as retryable or terminal for the first-fetch loop.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("client error {status}: {body}")]
    ClientError { status: u16, body: String },
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid artifact: {0}")]
    Decode(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("{}", messages::error_max_retry(*retries, last))]
    Exhausted { retries: u32, last: String },
}

impl FetchError {
    /// Every failure short of exhaustion is retried during the first fetch:
    /// an artifact may be published moments after the engine starts.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Exhausted { .. })
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::ClientError { .. } => "client_error",
            Self::Status { .. } => "unexpected_status",
            Self::ServerError { .. } => "server_error",
            Self::Network(_) => "network_error",
            Self::Decode(_) => "decode_error",
            Self::Timeout(_) => "timeout",
            Self::Exhausted { .. } => "retries_exhausted",
        }
    }

    /// Classify a non-success HTTP status code.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            400..=499 => Self::ClientError { status, body },
            500..=599 => Self::ServerError { status, body },
            _ => Self::Status { status, body },
        }
    }
}

/// First structural problem found in an inbound request.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{}", messages::REQUEST_REQUIRED)]
    RequestRequired,
    #[error("{}", messages::EXECUTE_OR_PREFETCH_REQUIRED)]
    ExecuteOrPrefetchRequired,
    #[error("{}", messages::EXECUTE_FIELDS_REQUIRED)]
    ExecuteFieldsRequired,
    #[error("{}", messages::PREFETCH_FIELDS_REQUIRED)]
    PrefetchFieldsRequired,
    #[error("Mbox validation failed for: {0}")]
    MboxInvalid(String),
}
