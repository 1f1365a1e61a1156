use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The tagged variant a fetch can fail with, classified by the fetcher and
/// interpreted by the coordinator's retry policy. Never a bare string: the
/// coordinator pattern-matches on this to decide retryable vs terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchErrorKind {
    DisallowedByRobots,
    HttpStatus { code: u16 },
    Timeout,
    Network,
    Parse,
}

impl FetchErrorKind {
    /// Whether the coordinator should retry a URL that failed this way.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchErrorKind::DisallowedByRobots => false,
            FetchErrorKind::HttpStatus { code } => {
                matches!(code, 408 | 429) || (500..600).contains(code)
            }
            FetchErrorKind::Timeout | FetchErrorKind::Network => true,
            FetchErrorKind::Parse => false,
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{kind:?}: {detail}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub detail: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_retry_classification() {
        assert!(FetchErrorKind::HttpStatus { code: 503 }.is_retryable());
        assert!(FetchErrorKind::HttpStatus { code: 429 }.is_retryable());
        assert!(FetchErrorKind::HttpStatus { code: 408 }.is_retryable());
        assert!(!FetchErrorKind::HttpStatus { code: 404 }.is_retryable());
        assert!(!FetchErrorKind::DisallowedByRobots.is_retryable());
        assert!(FetchErrorKind::Timeout.is_retryable());
        assert!(!FetchErrorKind::Parse.is_retryable());
    }
}
