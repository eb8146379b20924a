//! Fetch errors and their retry classification.

use thiserror::Error;

/// Errors from fetching workflow insights.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection refused, DNS failure, timeout, or a broken body stream.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote answered with a non-2xx status.
    #[error("remote returned HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    /// A 2xx body that does not match the expected shape.
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Continuation tokens that never terminate.
    #[error("pagination did not terminate: {0}")]
    Pagination(String),
}

/// How the scheduler should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Transport,
    /// 408, 429 and 5xx: the remote is overloaded or briefly unavailable.
    RetryableRemote,
    /// Any other status, e.g. a revoked token or an unknown project.
    Remote,
    /// The response no longer matches the API contract.
    Decode,
}

impl FetchError {
    pub(crate) fn transport(err: reqwest::Error) -> Self {
        FetchError::Transport(error_chain(&err))
    }

    pub fn class(&self) -> FailureClass {
        match self {
            FetchError::Transport(_) => FailureClass::Transport,
            FetchError::Remote { status, .. } if is_retryable_status(*status) => {
                FailureClass::RetryableRemote
            }
            FetchError::Remote { .. } => FailureClass::Remote,
            FetchError::Decode(_) | FetchError::Pagination(_) => FailureClass::Decode,
        }
    }

    /// HTTP status, when the remote answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

/// reqwest's `Display` hides the underlying cause; walk the chain.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
