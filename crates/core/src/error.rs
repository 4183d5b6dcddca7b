use thiserror::Error;

/// Failures surfaced by the controller. None of them is fatal: callers log
/// them and keep their previous state.
#[derive(Error, Debug)]
pub enum TvError {
    #[error("{service} unavailable: {reason}")]
    ExternalServiceUnavailable { service: &'static str, reason: String },
    #[error("invalid {kind} index {index} (have {len})")]
    InvalidIndex {
        kind: &'static str,
        index: usize,
        len: usize,
    },
    #[error("{0} is not initialized")]
    UninitializedSource(&'static str),
    #[error("config error: {0}")]
    Config(String),
}

impl TvError {
    pub fn unavailable(service: &'static str, reason: impl ToString) -> Self {
        TvError::ExternalServiceUnavailable {
            service,
            reason: reason.to_string(),
        }
    }

    pub fn invalid_index(kind: &'static str, index: usize, len: usize) -> Self {
        TvError::InvalidIndex { kind, index, len }
    }
}
