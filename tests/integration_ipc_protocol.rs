use presence_ipc::ipc::FrameBuffer;
use presence_ipc::{payload, Command, DiscordIpcError, Event, IpcConfig, Opcode};
use serde_json::json;
use std::collections::HashSet;
use std::convert::TryFrom;

#[test]
fn ipc_config_variants_adjust_parameters() {
    let default = IpcConfig::default();
    let fast = IpcConfig::fast_connect();
    let extended = IpcConfig::extended();

    assert!(fast.max_sockets <= default.max_sockets);
    assert!(fast.retry_interval_ms <= default.retry_interval_ms);
    assert!(fast.connect_timeout_ms < default.connect_timeout_ms);
    assert!(extended.retry_interval_ms >= default.retry_interval_ms);
    assert!(extended.response_timeout_ms > default.response_timeout_ms);
}

#[test]
fn ipc_config_validation_rejects_invalid_values() {
    let invalid = IpcConfig::default().with_max_sockets(0);
    assert!(invalid.validate().is_err());

    let payload_too_large = IpcConfig::default().with_max_payload_size(200 * 1024 * 1024);
    assert!(payload_too_large.validate().is_err());

    let no_timeout = IpcConfig::default().with_response_timeout(0);
    assert!(no_timeout.validate().is_err());
}

#[test]
fn opcode_try_from_handles_valid_and_invalid_cases() {
    assert!(matches!(Opcode::try_from(0).unwrap(), Opcode::Handshake));
    assert!(matches!(Opcode::try_from(4).unwrap(), Opcode::Pong));

    let err = Opcode::try_from(99).unwrap_err();
    match err {
        DiscordIpcError::ProtocolViolation { context, .. } => {
            assert_eq!(context.received_opcode, Some(99));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn command_serializes_to_expected_strings() {
    let json = serde_json::to_string(&Command::SetActivity).expect("serialize command");
    assert_eq!(json, "\"SET_ACTIVITY\"");

    let message = payload::subscribe(&Event::ActivityJoin, None);
    let serialized = serde_json::to_value(&message).expect("serialize message");
    assert_eq!(serialized["cmd"], "SUBSCRIBE");
    assert_eq!(serialized["evt"], "ACTIVITY_JOIN");
    assert_eq!(serialized["args"], json!({}));
}

#[test]
fn oversized_length_is_a_protocol_violation() {
    let mut header = Vec::new();
    header.extend_from_slice(&1u32.to_le_bytes());
    header.extend_from_slice(&u32::MAX.to_le_bytes());

    let mut buffer = FrameBuffer::new(1024);
    buffer.extend(&header);
    assert!(matches!(
        buffer.next_frame(),
        Err(DiscordIpcError::ProtocolViolation { .. })
    ));
}

#[test]
fn every_message_gets_a_fresh_nonce() {
    let nonces: HashSet<String> = (0..100).map(|_| payload::get_guilds().nonce).collect();
    assert_eq!(nonces.len(), 100);
}
