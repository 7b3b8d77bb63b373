use thiserror::Error;

/// Errors surfaced by the chat protocol layer.
///
/// Nothing here is retried; callers decide whether to display or resend.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Backend answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Transport { status: u16, body: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid role: {0}. Must be one of: user, assistant")]
    InvalidRole(String),

    /// Connection failed, or the body stream broke mid-read.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ChatError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// HTTP status of a transport failure, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_carries_status_and_body() {
        let err = ChatError::Transport {
            status: 429,
            body: "slow down".to_string(),
        };
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.to_string(), "HTTP 429: slow down");
    }

    #[test]
    fn configuration_error_has_no_status() {
        let err = ChatError::config("Unknown provider: gemini");
        assert_eq!(err.status(), None);
        assert_eq!(err.to_string(), "configuration error: Unknown provider: gemini");
    }
}
