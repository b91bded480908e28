use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::session::SessionState;

/// Handshake close code Discord sends for an unknown application id
pub const INVALID_CLIENT_ID_CODE: i64 = 4000;

/// Extra information attached to a protocol violation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolContext {
    pub expected_opcode: Option<u32>,
    pub received_opcode: Option<u32>,
    pub payload_size: Option<u32>,
}

impl ProtocolContext {
    pub fn with_opcodes(expected: u32, received: u32) -> Self {
        Self {
            expected_opcode: Some(expected),
            received_opcode: Some(received),
            payload_size: None,
        }
    }

    pub fn with_payload_size(payload_size: u32) -> Self {
        Self {
            payload_size: Some(payload_size),
            ..Self::default()
        }
    }
}

/// Broad grouping of errors, used to decide how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Discord is unreachable or the stream went away
    Connection,
    /// Discord sent something we could not make sense of
    Protocol,
    /// Discord understood us and said no
    Application,
    /// The caller passed something invalid or used the client out of order
    Usage,
}

/// Errors that can occur during Discord IPC operations
#[derive(Error, Debug)]
pub enum DiscordIpcError {
    #[error("No live Discord IPC endpoint found - is Discord running?")]
    EndpointNotFound,

    #[error("Failed to connect to Discord IPC endpoint: {0}")]
    ConnectionFailed(io::Error),

    #[error("Connecting to Discord timed out after {timeout_ms} ms")]
    ConnectTimeout { timeout_ms: u64 },

    #[error("Discord rejected the handshake ({code}): {message}")]
    HandshakeRejected { code: i64, message: String },

    #[error("The Discord IPC pipe was closed")]
    PipeClosed,

    #[error("No response from Discord within {timeout_ms} ms")]
    ResponseTimeout { timeout_ms: u64 },

    #[error("{0}")]
    ServerError(String),

    #[error("Protocol violation: {message}")]
    ProtocolViolation {
        message: String,
        context: ProtocolContext,
    },

    #[error("Failed to serialize JSON payload")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Session is not ready (state: {state})")]
    NotReady { state: SessionState },

    #[error("Invalid activity: {0}")]
    InvalidActivity(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No handler registered for event {0}")]
    EventNotRegistered(String),

    #[error("System time error: {0}")]
    SystemTimeError(String),
}

impl From<io::Error> for DiscordIpcError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::NotConnected => DiscordIpcError::PipeClosed,
            _ => DiscordIpcError::ConnectionFailed(err),
        }
    }
}

impl DiscordIpcError {
    pub fn protocol_violation(message: impl Into<String>, context: ProtocolContext) -> Self {
        DiscordIpcError::ProtocolViolation {
            message: message.into(),
            context,
        }
    }

    pub fn handshake_rejected(code: i64, message: impl Into<String>) -> Self {
        DiscordIpcError::HandshakeRejected {
            code,
            message: message.into(),
        }
    }

    pub fn response_timeout(timeout: Duration) -> Self {
        DiscordIpcError::ResponseTimeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn connect_timeout(timeout: Duration) -> Self {
        DiscordIpcError::ConnectTimeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Build a `ServerError` from the raw message of an `ERROR` event
    ///
    /// Square brackets are dropped and the text is capitalised, so
    /// `"[invalid payload]"` becomes `"Invalid payload"`.
    pub fn server_error(raw: &str) -> Self {
        let stripped: String = raw.chars().filter(|c| *c != '[' && *c != ']').collect();
        let mut chars = stripped.chars();
        let message = match chars.next() {
            Some(first) => first
                .to_uppercase()
                .chain(chars.flat_map(char::to_lowercase))
                .collect(),
            None => String::new(),
        };
        DiscordIpcError::ServerError(message)
    }

    /// True when Discord refused the handshake because the application id is unknown
    pub fn is_invalid_client_id(&self) -> bool {
        matches!(
            self,
            DiscordIpcError::HandshakeRejected { code, .. } if *code == INVALID_CLIENT_ID_CODE
        )
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DiscordIpcError::EndpointNotFound
            | DiscordIpcError::ConnectionFailed(_)
            | DiscordIpcError::ConnectTimeout { .. }
            | DiscordIpcError::PipeClosed
            | DiscordIpcError::ResponseTimeout { .. } => ErrorCategory::Connection,
            DiscordIpcError::ProtocolViolation { .. }
            | DiscordIpcError::SerializationFailed(_) => ErrorCategory::Protocol,
            DiscordIpcError::HandshakeRejected { .. } | DiscordIpcError::ServerError(_) => {
                ErrorCategory::Application
            }
            DiscordIpcError::NotReady { .. }
            | DiscordIpcError::InvalidActivity(_)
            | DiscordIpcError::InvalidArgument(_)
            | DiscordIpcError::EventNotRegistered(_)
            | DiscordIpcError::SystemTimeError(_) => ErrorCategory::Usage,
        }
    }

    pub fn is_connection_error(&self) -> bool {
        self.category() == ErrorCategory::Connection
    }

    /// Whether retrying (usually after a reconnect) can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DiscordIpcError::EndpointNotFound
                | DiscordIpcError::ConnectTimeout { .. }
                | DiscordIpcError::PipeClosed
                | DiscordIpcError::ResponseTimeout { .. }
        )
    }
}

/// Result type for Discord IPC operations
pub type Result<T = ()> = std::result::Result<T, DiscordIpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_strips_brackets_and_capitalises() {
        match DiscordIpcError::server_error("[invalid Payload]") {
            DiscordIpcError::ServerError(message) => assert_eq!(message, "Invalid payload"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn broken_pipe_io_errors_become_pipe_closed() {
        let err: DiscordIpcError = io::Error::from(io::ErrorKind::BrokenPipe).into();
        assert!(matches!(err, DiscordIpcError::PipeClosed));

        let err: DiscordIpcError = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert!(matches!(err, DiscordIpcError::ConnectionFailed(_)));
    }

    #[test]
    fn invalid_client_id_is_detected() {
        let err = DiscordIpcError::handshake_rejected(4000, "Invalid Client ID");
        assert!(err.is_invalid_client_id());
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), ErrorCategory::Application);
    }
}
