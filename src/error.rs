// src/error.rs
// Standardized error types for nut-chat

use thiserror::Error;

/// Main error type for the nut-chat library
#[derive(Error, Debug)]
pub enum NutError {
    /// Backend RPC returned a non-2xx status
    #[error("RPC '{method}' failed with status {status}: {body}")]
    Rpc {
        method: String,
        status: u16,
        body: String,
    },

    #[error("no active chat")]
    NoActiveChat,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("unknown error: {0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Convenience type alias for Result using NutError
pub type Result<T> = std::result::Result<T, NutError>;

impl From<String> for NutError {
    fn from(s: String) -> Self {
        NutError::Other(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_carries_method_and_status() {
        let err = NutError::Rpc {
            method: "send-chat-message".to_string(),
            status: 503,
            body: "backend unavailable".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("send-chat-message"));
        assert!(msg.contains("503"));
        assert!(msg.contains("backend unavailable"));
    }

    #[test]
    fn test_no_active_chat_error() {
        let err = NutError::NoActiveChat;
        assert!(err.to_string().contains("no active chat"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<i32>("not json").unwrap_err();
        let err: NutError = json_err.into();
        assert!(matches!(err, NutError::Json(_)));
    }

    #[test]
    fn test_from_string() {
        let err: NutError = "something odd".to_string().into();
        assert!(matches!(err, NutError::Other(_)));
        assert!(err.to_string().contains("something odd"));
    }
}
