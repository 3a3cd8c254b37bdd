//! Error type for session operations.

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session error type.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Session busy: another question is still in flight")]
    SessionBusy,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Gateway tore the session down {attempts} time(s); retry budget exhausted")]
    Teardown { attempts: u32 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Reconnect after teardown failed: {0}")]
    Reconnect(#[source] Box<SessionError>),

    #[error("Operation cancelled")]
    Cancelled,
}

impl SessionError {
    /// Whether the error came from the connection rather than from protocol content.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Reconnect(_))
    }

    /// Whether asking the same question again later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SessionBusy | Self::Teardown { .. } | Self::Transport(_) | Self::Reconnect(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SessionError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(SessionError::Transport("reset".into()).is_transport());
        assert!(SessionError::Reconnect(Box::new(SessionError::Transport("dns".into()))).is_transport());
        assert!(!SessionError::MalformedResponse("{".into()).is_retryable());
        assert!(!SessionError::Cancelled.is_retryable());
        assert!(SessionError::Teardown { attempts: 2 }.is_retryable());
    }

    #[test]
    fn test_reconnect_keeps_source() {
        use std::error::Error as _;
        let err = SessionError::Reconnect(Box::new(SessionError::Transport("refused".into())));
        assert_eq!(err.source().unwrap().to_string(), "Transport error: refused");
    }
}
