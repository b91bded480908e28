use presence_ipc::{DiscordIpcError, ErrorCategory, Opcode, ProtocolContext, SessionState};
use std::time::Duration;

#[test]
fn error_category_matches_constructor() {
    let error = DiscordIpcError::PipeClosed;
    assert!(error.is_connection_error());
    assert_eq!(error.category(), ErrorCategory::Connection);
    assert!(error.is_recoverable());

    let timeout = DiscordIpcError::response_timeout(Duration::from_millis(250));
    assert!(matches!(
        timeout,
        DiscordIpcError::ResponseTimeout { timeout_ms: 250 }
    ));
    assert!(timeout.is_recoverable());

    let app_error = DiscordIpcError::server_error("[unknown guild]");
    assert_eq!(app_error.category(), ErrorCategory::Application);
    assert!(!app_error.is_recoverable());
    assert_eq!(app_error.to_string(), "Unknown guild");

    let usage = DiscordIpcError::NotReady {
        state: SessionState::Closed,
    };
    assert_eq!(usage.category(), ErrorCategory::Usage);
    assert!(usage.to_string().contains("closed"));
}

#[test]
fn rejected_handshake_exposes_code() {
    let error = DiscordIpcError::handshake_rejected(4000, "Invalid Client ID");
    assert!(error.is_invalid_client_id());
    assert!(!error.is_recoverable());

    let other = DiscordIpcError::handshake_rejected(4004, "Invalid version");
    assert!(!other.is_invalid_client_id());
}

#[test]
fn protocol_violation_context_is_preserved() {
    let context = ProtocolContext::with_opcodes(Opcode::Handshake.into(), Opcode::Frame.into());
    let error = DiscordIpcError::protocol_violation("unexpected opcode", context.clone());

    assert_eq!(error.category(), ErrorCategory::Protocol);
    match error {
        DiscordIpcError::ProtocolViolation {
            context: received, ..
        } => {
            assert_eq!(received.expected_opcode, context.expected_opcode);
            assert_eq!(received.received_opcode, context.received_opcode);
        }
        other => panic!("unexpected error variant: {other:?}"),
    }
}
