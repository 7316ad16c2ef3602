//! Error taxonomy for thread and conversation operations.

use crate::thread::ThreadId;

/// Errors surfaced by the message store and the conversation runner.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// The operation referenced a thread that was never created.
    #[error("Thread not found: {0}")]
    NotFound(ThreadId),

    /// The model call failed or its stream terminated abnormally.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),
}

impl ChatError {
    /// Stable code for programmatic handling on the client side.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "THREAD_NOT_FOUND",
            Self::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
        }
    }
}

impl From<anyhow::Error> for ChatError {
    fn from(err: anyhow::Error) -> Self {
        Self::ModelUnavailable(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let not_found = ChatError::NotFound(ThreadId::from("abc"));
        assert_eq!(not_found.code(), "THREAD_NOT_FOUND");
        assert_eq!(not_found.to_string(), "Thread not found: abc");

        let unavailable = ChatError::from(anyhow::anyhow!("connection refused"));
        assert_eq!(unavailable.code(), "MODEL_UNAVAILABLE");
        assert!(unavailable.to_string().contains("connection refused"));
    }
}
