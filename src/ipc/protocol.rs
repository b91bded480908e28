use crate::error::{DiscordIpcError, ProtocolContext};
use crate::ipc::endpoint::PipeConfig;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Discord IPC Opcodes
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Handshake = 0,
    Frame = 1,
    Close = 2,
    Ping = 3,
    Pong = 4,
}

impl TryFrom<u32> for Opcode {
    type Error = DiscordIpcError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Opcode::Handshake),
            1 => Ok(Opcode::Frame),
            2 => Ok(Opcode::Close),
            3 => Ok(Opcode::Ping),
            4 => Ok(Opcode::Pong),
            _ => {
                let context = ProtocolContext {
                    expected_opcode: None,
                    received_opcode: Some(value),
                    payload_size: None,
                };
                Err(DiscordIpcError::protocol_violation(
                    format!("Invalid opcode value: {}", value),
                    context,
                ))
            }
        }
    }
}

impl From<Opcode> for u32 {
    fn from(opcode: Opcode) -> Self {
        opcode as u32
    }
}

/// Discord RPC commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Dispatch,
    Authorize,
    Authenticate,
    GetGuild,
    GetGuilds,
    GetChannel,
    GetChannels,
    SetUserVoiceSettings,
    SelectVoiceChannel,
    GetSelectedVoiceChannel,
    SelectTextChannel,
    GetVoiceSettings,
    SetVoiceSettings,
    Subscribe,
    Unsubscribe,
    CaptureShortcut,
    SetActivity,
    SendActivityJoinInvite,
    CloseActivityRequest,
}

/// RPC events a client can subscribe to
///
/// Names that are not part of the known vocabulary are kept as
/// [`Event::Unknown`] so newer Discord events still reach their handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Event {
    Ready,
    Error,
    GuildStatus,
    GuildCreate,
    ChannelCreate,
    VoiceChannelSelect,
    VoiceStateCreate,
    VoiceStateUpdate,
    VoiceStateDelete,
    VoiceSettingsUpdate,
    VoiceConnectionStatus,
    SpeakingStart,
    SpeakingStop,
    MessageCreate,
    MessageUpdate,
    MessageDelete,
    NotificationCreate,
    CaptureShortcutChange,
    ActivityJoin,
    ActivitySpectate,
    ActivityJoinRequest,
    Unknown(String),
}

const KNOWN_EVENTS: &[(&str, Event)] = &[
    ("READY", Event::Ready),
    ("ERROR", Event::Error),
    ("GUILD_STATUS", Event::GuildStatus),
    ("GUILD_CREATE", Event::GuildCreate),
    ("CHANNEL_CREATE", Event::ChannelCreate),
    ("VOICE_CHANNEL_SELECT", Event::VoiceChannelSelect),
    ("VOICE_STATE_CREATE", Event::VoiceStateCreate),
    ("VOICE_STATE_UPDATE", Event::VoiceStateUpdate),
    ("VOICE_STATE_DELETE", Event::VoiceStateDelete),
    ("VOICE_SETTINGS_UPDATE", Event::VoiceSettingsUpdate),
    ("VOICE_CONNECTION_STATUS", Event::VoiceConnectionStatus),
    ("SPEAKING_START", Event::SpeakingStart),
    ("SPEAKING_STOP", Event::SpeakingStop),
    ("MESSAGE_CREATE", Event::MessageCreate),
    ("MESSAGE_UPDATE", Event::MessageUpdate),
    ("MESSAGE_DELETE", Event::MessageDelete),
    ("NOTIFICATION_CREATE", Event::NotificationCreate),
    ("CAPTURE_SHORTCUT_CHANGE", Event::CaptureShortcutChange),
    ("ACTIVITY_JOIN", Event::ActivityJoin),
    ("ACTIVITY_SPECTATE", Event::ActivitySpectate),
    ("ACTIVITY_JOIN_REQUEST", Event::ActivityJoinRequest),
];

impl Event {
    /// Upper-case wire name of the event
    pub fn as_str(&self) -> &str {
        match self {
            Event::Unknown(name) => name,
            known => KNOWN_EVENTS
                .iter()
                .find(|(_, event)| event == known)
                .map(|(name, _)| *name)
                .unwrap_or_default(),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Event::Unknown(_))
    }

    /// Parse an event name supplied by a caller
    ///
    /// Unlike [`FromStr`], this rejects names that could never be valid
    /// on the wire (empty, or containing anything but letters and `_`).
    pub fn parse_registration(name: &str) -> Result<Self, DiscordIpcError> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic() || c == '_') {
            return Err(DiscordIpcError::InvalidArgument(format!(
                "'{}' is not a valid event name",
                name
            )));
        }
        Ok(name.parse().unwrap_or_else(|never| match never {}))
    }
}

impl FromStr for Event {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        Ok(KNOWN_EVENTS
            .iter()
            .find(|(name, _)| *name == upper)
            .map(|(_, event)| event.clone())
            .unwrap_or(Event::Unknown(upper)))
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(name.parse().unwrap_or_else(|never| match never {}))
    }
}

/// Discord IPC command envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcMessage {
    pub cmd: Command,
    pub args: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evt: Option<Event>,
    pub nonce: String,
}

/// Handshake payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakePayload {
    pub v: u32,
    pub client_id: String,
}

/// Constants and configuration for Discord IPC protocol
pub mod constants {
    /// Discord IPC protocol version sent in the handshake
    pub const IPC_VERSION: u32 = 1;

    /// Discord exposes at most ten numbered endpoints, `discord-ipc-0` to `discord-ipc-9`
    pub const MAX_IPC_SOCKETS: u8 = 10;

    /// IPC socket name prefix used for socket discovery
    pub const IPC_SOCKET_PREFIX: &str = "discord-ipc-";

    /// Delay between attempts when an endpoint is busy during connect
    pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 100;

    /// Default time allowed for opening the endpoint
    pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;

    /// Default time allowed for Discord to answer a handshake or command
    pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 10_000;

    /// Maximum size for IPC payload data (16 MB)
    ///
    /// Typical Rich Presence payloads are below 1 KB; the limit only guards
    /// against allocating for a corrupted length prefix.
    pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

    /// Size of the IPC message header in bytes
    ///
    /// - 4 bytes: Opcode (u32, little-endian)
    /// - 4 bytes: Payload length (u32, little-endian)
    pub const IPC_HEADER_SIZE: usize = 8;
}

/// Configuration for Discord IPC protocol behavior
#[derive(Debug, Clone)]
pub struct IpcConfig {
    /// Which endpoint to connect to
    pub pipe: PipeConfig,

    /// Maximum number of socket instances to scan during auto-discovery
    pub max_sockets: u8,

    /// Retry interval in milliseconds while the endpoint is busy
    pub retry_interval_ms: u64,

    /// Time allowed for opening the endpoint
    pub connect_timeout_ms: u64,

    /// Time allowed for Discord to answer the handshake or a command
    pub response_timeout_ms: u64,

    /// Maximum allowed payload size in bytes
    pub max_payload_size: u32,

    /// IPC protocol version to use in handshake
    pub ipc_version: u32,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            pipe: PipeConfig::Auto,
            max_sockets: constants::MAX_IPC_SOCKETS,
            retry_interval_ms: constants::DEFAULT_RETRY_INTERVAL_MS,
            connect_timeout_ms: constants::DEFAULT_CONNECT_TIMEOUT_MS,
            response_timeout_ms: constants::DEFAULT_RESPONSE_TIMEOUT_MS,
            max_payload_size: constants::MAX_PAYLOAD_SIZE,
            ipc_version: constants::IPC_VERSION,
        }
    }
}

impl IpcConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorter timeouts and a narrower scan, for when Discord is known to be running
    pub fn fast_connect() -> Self {
        Self {
            max_sockets: 3,
            retry_interval_ms: 50,
            connect_timeout_ms: 2_000,
            response_timeout_ms: 5_000,
            ..Default::default()
        }
    }

    /// Longer timeouts for slow machines or unusual installations
    pub fn extended() -> Self {
        Self {
            max_sockets: 10,
            retry_interval_ms: 200,
            connect_timeout_ms: 60_000,
            response_timeout_ms: 30_000,
            ..Default::default()
        }
    }

    pub fn with_pipe(mut self, pipe: PipeConfig) -> Self {
        self.pipe = pipe;
        self
    }

    pub fn with_max_sockets(mut self, max_sockets: u8) -> Self {
        self.max_sockets = max_sockets;
        self
    }

    pub fn with_retry_interval(mut self, retry_interval_ms: u64) -> Self {
        self.retry_interval_ms = retry_interval_ms;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout_ms: u64) -> Self {
        self.connect_timeout_ms = connect_timeout_ms;
        self
    }

    pub fn with_response_timeout(mut self, response_timeout_ms: u64) -> Self {
        self.response_timeout_ms = response_timeout_ms;
        self
    }

    pub fn with_max_payload_size(mut self, max_payload_size: u32) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_sockets == 0 {
            return Err("max_sockets must be greater than 0");
        }
        if self.max_sockets > constants::MAX_IPC_SOCKETS {
            return Err("max_sockets cannot exceed 10");
        }
        if let PipeConfig::Index(index) = self.pipe {
            if index >= constants::MAX_IPC_SOCKETS {
                return Err("pipe index must be between 0 and 9");
            }
        }
        if self.retry_interval_ms == 0 {
            return Err("retry_interval_ms must be greater than 0");
        }
        if self.retry_interval_ms > 10_000 {
            return Err("retry_interval_ms exceeds reasonable limit (10 seconds)");
        }
        if self.connect_timeout_ms == 0 {
            return Err("connect_timeout_ms must be greater than 0");
        }
        if self.response_timeout_ms == 0 {
            return Err("response_timeout_ms must be greater than 0");
        }
        if self.max_payload_size < 1024 {
            return Err("max_payload_size too small (minimum 1 KB)");
        }
        if self.max_payload_size > 100 * 1024 * 1024 {
            return Err("max_payload_size too large (maximum 100 MB)");
        }
        Ok(())
    }

    pub(crate) fn checked(self) -> Result<Self, DiscordIpcError> {
        self.validate()
            .map_err(|reason| DiscordIpcError::InvalidArgument(reason.to_string()))?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_are_case_insensitive() {
        let event: Event = "activity_join".parse().unwrap();
        assert_eq!(event, Event::ActivityJoin);
        assert_eq!(event.as_str(), "ACTIVITY_JOIN");
    }

    #[test]
    fn unknown_events_keep_upper_case_name() {
        let event: Event = "some_future_event".parse().unwrap();
        assert_eq!(event, Event::Unknown("SOME_FUTURE_EVENT".into()));
        assert!(!event.is_known());
        assert_eq!(serde_json::to_string(&event).unwrap(), "\"SOME_FUTURE_EVENT\"");
    }

    #[test]
    fn registration_rejects_malformed_names() {
        assert!(Event::parse_registration("").is_err());
        assert!(Event::parse_registration("ACTIVITY JOIN").is_err());
        assert_eq!(
            Event::parse_registration("Activity_Join").unwrap(),
            Event::ActivityJoin
        );
    }

    #[test]
    fn pipe_index_must_be_in_range() {
        let config = IpcConfig::default().with_pipe(PipeConfig::Index(10));
        assert!(config.validate().is_err());
        let config = IpcConfig::default().with_pipe(PipeConfig::Index(9));
        assert!(config.validate().is_ok());
    }
}
