//! Connection lifecycle and inbound frame routing shared by the blocking
//! and async clients
//!
//! The clients own the I/O; everything here is synchronous bookkeeping:
//! which state the session is in, which request is waiting for a reply,
//! and where each inbound frame should go.

use log::{debug, trace, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{DiscordIpcError, ProtocolContext, Result};
use crate::ipc::codec::{error_message, Frame};
use crate::ipc::{Event, HandshakePayload, Opcode};

/// Lifecycle state of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Handshaking,
    Ready,
    Closed,
    Failed(String),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => f.write_str("disconnected"),
            SessionState::Handshaking => f.write_str("handshaking"),
            SessionState::Ready => f.write_str("ready"),
            SessionState::Closed => f.write_str("closed"),
            SessionState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Callback invoked with the `data` object of an event
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Event handlers keyed by event
///
/// Updates replace the whole map, so a dispatch in progress keeps working
/// on the snapshot it started with.
#[derive(Clone, Default)]
pub struct EventRegistry {
    handlers: Arc<HashMap<Event, EventHandler>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, event: Event, handler: EventHandler) {
        let mut next = HashMap::clone(&self.handlers);
        next.insert(event, handler);
        self.handlers = Arc::new(next);
    }

    /// Remove the handler for `event`, returning whether one was registered
    pub fn remove(&mut self, event: &Event) -> bool {
        if !self.handlers.contains_key(event) {
            return false;
        }
        let mut next = HashMap::clone(&self.handlers);
        next.remove(event);
        self.handlers = Arc::new(next);
        true
    }

    pub fn contains(&self, event: &Event) -> bool {
        self.handlers.contains_key(event)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn clear(&mut self) {
        self.handlers = Arc::default();
    }

    /// Call the handler for `event`, returning false when there is none
    pub fn dispatch(&self, event: &Event, data: &Value) -> bool {
        let snapshot = Arc::clone(&self.handlers);
        match snapshot.get(event) {
            Some(handler) => {
                handler(data);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

/// What an inbound frame means relative to the request in flight
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The reply to the pending request (whole body)
    Response(Value),
    /// A reply carrying some other nonce, e.g. to a request that timed out
    Stale { nonce: String },
    /// An event pushed by Discord
    Event { event: Event, data: Value },
    /// An `ERROR` reply
    Error { code: Option<i64>, message: String },
    /// Discord is closing the connection
    Close { code: Option<i64>, message: String },
    Ping(Value),
    Pong,
}

impl Inbound {
    /// Classify `frame` given the nonce of the request awaiting a reply
    ///
    /// - a matching nonce is the reply (or its error);
    /// - a non-null `evt` on a `DISPATCH` (or cmd-less) frame is an event;
    /// - a frame with neither nonce nor event belongs to the latest request;
    /// - anything else carrying a different nonce is stale.
    pub fn classify(frame: Frame, pending: Option<&str>) -> Result<Inbound> {
        let Frame {
            opcode,
            mut payload,
        } = frame;

        match opcode {
            Opcode::Close => {
                return Ok(Inbound::Close {
                    code: payload.get("code").and_then(Value::as_i64),
                    message: payload
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
            }
            Opcode::Ping => return Ok(Inbound::Ping(payload)),
            Opcode::Pong => return Ok(Inbound::Pong),
            Opcode::Handshake => {
                return Err(DiscordIpcError::protocol_violation(
                    "Discord sent a handshake frame",
                    ProtocolContext::with_opcodes(Opcode::Frame.into(), Opcode::Handshake.into()),
                ))
            }
            Opcode::Frame => {}
        }

        let nonce = payload.get("nonce").and_then(Value::as_str).map(str::to_owned);
        let evt = payload.get("evt").and_then(Value::as_str).map(str::to_owned);
        let matches_pending = nonce.is_some() && nonce.as_deref() == pending;

        if evt.as_deref() == Some("ERROR") {
            if nonce.is_none() || matches_pending {
                return Ok(Inbound::Error {
                    code: payload
                        .get("data")
                        .and_then(|data| data.get("code"))
                        .and_then(Value::as_i64),
                    message: error_message(&payload).to_string(),
                });
            }
        } else if matches_pending {
            return Ok(Inbound::Response(payload));
        } else if let Some(evt) = evt {
            let cmd = payload.get("cmd").and_then(Value::as_str);
            if matches!(cmd, None | Some("DISPATCH")) {
                let data = payload.get_mut("data").map(Value::take).unwrap_or_default();
                return Ok(Inbound::Event {
                    event: evt.parse().unwrap_or_else(|never| match never {}),
                    data,
                });
            }
        }

        match nonce {
            Some(nonce) => Ok(Inbound::Stale { nonce }),
            None => Ok(Inbound::Response(payload)),
        }
    }
}

/// What the I/O loop should do after a frame has been routed
#[derive(Debug)]
pub(crate) enum Step {
    /// The pending request is answered
    Reply(Value),
    /// An event went to its handler
    Dispatched,
    /// Keep reading
    Continue,
    /// Answer a PING with this body, then keep reading
    Pong(Value),
}

/// Session bookkeeping independent of the transport
#[derive(Debug)]
pub(crate) struct SessionCore {
    pub client_id: String,
    pub state: SessionState,
    pub pending_nonce: Option<String>,
    pub events: EventRegistry,
}

impl SessionCore {
    pub fn new(client_id: String) -> Self {
        Self {
            client_id,
            state: SessionState::Disconnected,
            pending_nonce: None,
            events: EventRegistry::new(),
        }
    }

    pub fn ensure_ready(&self) -> Result<()> {
        if self.state == SessionState::Ready {
            Ok(())
        } else {
            Err(DiscordIpcError::NotReady {
                state: self.state.clone(),
            })
        }
    }

    /// Check that a connect may start from the current state
    pub fn ensure_can_connect(&self) -> Result<()> {
        if self.state == SessionState::Disconnected {
            Ok(())
        } else {
            Err(DiscordIpcError::InvalidArgument(format!(
                "session is {}; call reconnect() to start a new one",
                self.state
            )))
        }
    }

    pub fn begin_handshake(&mut self, version: u32) -> HandshakePayload {
        self.state = SessionState::Handshaking;
        self.pending_nonce = None;
        HandshakePayload {
            v: version,
            client_id: self.client_id.clone(),
        }
    }

    /// Interpret the handshake reply, moving to `Ready` or `Failed`
    ///
    /// Returns the `data` of the READY event.
    pub fn finish_handshake(&mut self, frame: Frame) -> Result<Value> {
        let Frame { opcode, payload } = frame;
        trace!("Handshake response: {}", payload);

        // A rejection arrives either as a CLOSE frame with a top-level code
        // or as an ERROR event carrying the code in `data`.
        let rejection = if payload.get("evt").and_then(Value::as_str) == Some("ERROR") {
            Some(payload.get("data").cloned().unwrap_or_default())
        } else if opcode == Opcode::Close || payload.get("code").is_some() {
            Some(payload.clone())
        } else {
            None
        };
        if let Some(body) = rejection {
            let code = body.get("code").and_then(Value::as_i64).unwrap_or_default();
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Handshake rejected")
                .to_string();
            let err = DiscordIpcError::handshake_rejected(code, message);
            self.state = SessionState::Failed(err.to_string());
            return Err(err);
        }

        if opcode != Opcode::Frame {
            let err = DiscordIpcError::protocol_violation(
                format!("Expected handshake response frame, got {:?}", opcode),
                ProtocolContext::with_opcodes(Opcode::Frame.into(), opcode.into()),
            );
            self.state = SessionState::Failed(err.to_string());
            return Err(err);
        }

        debug!("Handshake accepted for client {}", self.client_id);
        self.state = SessionState::Ready;
        let mut payload = payload;
        Ok(payload.get_mut("data").map(Value::take).unwrap_or_default())
    }

    /// Record a failure, returning whether the transport must be torn down
    pub fn record_failure(&mut self, err: &DiscordIpcError) -> bool {
        self.pending_nonce = None;
        match err {
            DiscordIpcError::PipeClosed | DiscordIpcError::ConnectionFailed(_) => {
                if !matches!(self.state, SessionState::Failed(_)) {
                    self.state = SessionState::Closed;
                }
                true
            }
            DiscordIpcError::ProtocolViolation { .. } | DiscordIpcError::HandshakeRejected { .. } => {
                self.state = SessionState::Failed(err.to_string());
                true
            }
            _ => false,
        }
    }

    /// Route one inbound frame while `pending_nonce` (if any) waits for a reply
    pub fn route(&mut self, frame: Frame) -> Result<Step> {
        match Inbound::classify(frame, self.pending_nonce.as_deref())? {
            Inbound::Response(body) => {
                self.pending_nonce = None;
                Ok(Step::Reply(body))
            }
            Inbound::Error { code, message } => {
                debug!("Discord returned error {:?}: {}", code, message);
                self.pending_nonce = None;
                Err(DiscordIpcError::server_error(&message))
            }
            Inbound::Event { event, data } => {
                if self.events.dispatch(&event, &data) {
                    trace!("Dispatched event {}", event);
                    Ok(Step::Dispatched)
                } else {
                    debug!("No handler for event {}, dropping it", event);
                    Ok(Step::Continue)
                }
            }
            Inbound::Stale { nonce } => {
                debug!("Discarding reply to an abandoned request ({})", nonce);
                Ok(Step::Continue)
            }
            Inbound::Ping(body) => Ok(Step::Pong(body)),
            Inbound::Pong => Ok(Step::Continue),
            Inbound::Close { code, message } => {
                warn!("Discord closed the connection ({:?}): {}", code, message);
                self.state = SessionState::Closed;
                Err(DiscordIpcError::PipeClosed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn frame(payload: Value) -> Frame {
        Frame::new(Opcode::Frame, payload)
    }

    #[test]
    fn matching_nonce_is_response() {
        let inbound = Inbound::classify(
            frame(json!({"cmd": "SUBSCRIBE", "evt": "ACTIVITY_JOIN", "nonce": "n1", "data": {}})),
            Some("n1"),
        )
        .unwrap();
        assert!(matches!(inbound, Inbound::Response(_)));
    }

    #[test]
    fn dispatch_is_event_even_while_waiting() {
        let inbound = Inbound::classify(
            frame(json!({"cmd": "DISPATCH", "evt": "ACTIVITY_JOIN", "nonce": null, "data": {"secret": "s"}})),
            Some("n1"),
        )
        .unwrap();
        assert_eq!(
            inbound,
            Inbound::Event {
                event: Event::ActivityJoin,
                data: json!({"secret": "s"}),
            }
        );
    }

    #[test]
    fn other_nonce_is_stale() {
        let inbound =
            Inbound::classify(frame(json!({"cmd": "SET_ACTIVITY", "nonce": "old"})), Some("new"))
                .unwrap();
        assert_eq!(inbound, Inbound::Stale { nonce: "old".into() });
    }

    #[test]
    fn nonce_less_reply_belongs_to_latest_request() {
        let inbound = Inbound::classify(frame(json!({"cmd": "SET_ACTIVITY"})), Some("n")).unwrap();
        assert!(matches!(inbound, Inbound::Response(_)));
    }

    #[test]
    fn error_reply_is_classified() {
        let inbound = Inbound::classify(
            frame(json!({"evt": "ERROR", "nonce": "n", "data": {"code": 4000, "message": "nope"}})),
            Some("n"),
        )
        .unwrap();
        assert_eq!(
            inbound,
            Inbound::Error {
                code: Some(4000),
                message: "nope".into()
            }
        );
    }

    #[test]
    fn handshake_rejection_fails_session() {
        let mut core = SessionCore::new("123".into());
        core.begin_handshake(1);
        let err = core
            .finish_handshake(Frame::new(
                Opcode::Close,
                json!({"code": 4000, "message": "Invalid Client ID"}),
            ))
            .unwrap_err();
        assert!(err.is_invalid_client_id());
        assert!(matches!(core.state, SessionState::Failed(_)));
    }

    #[test]
    fn error_event_during_handshake_fails_session() {
        let mut core = SessionCore::new("123".into());
        core.begin_handshake(1);
        let err = core
            .finish_handshake(frame(json!({
                "cmd": "DISPATCH",
                "evt": "ERROR",
                "data": {"code": 4000, "message": "Invalid Client ID"}
            })))
            .unwrap_err();
        assert!(matches!(
            err,
            DiscordIpcError::HandshakeRejected { code: 4000, .. }
        ));
        assert!(matches!(core.state, SessionState::Failed(_)));
    }

    #[test]
    fn commands_require_ready() {
        let core = SessionCore::new("123".into());
        assert!(matches!(
            core.ensure_ready(),
            Err(DiscordIpcError::NotReady {
                state: SessionState::Disconnected
            })
        ));
    }

    #[test]
    fn registry_snapshot_survives_updates() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = EventRegistry::new();
        let counter = Arc::clone(&calls);
        registry.insert(
            Event::ActivityJoin,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let before = registry.clone();
        assert!(registry.remove(&Event::ActivityJoin));
        assert!(!registry.remove(&Event::ActivityJoin));

        assert!(before.dispatch(&Event::ActivityJoin, &json!({})));
        assert!(!registry.dispatch(&Event::ActivityJoin, &json!({})));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
