//! # presence-ipc
//!
//! A client for Discord's local RPC interface: Rich Presence, OAuth
//! authorization and event subscriptions over the desktop client's IPC
//! socket.
//!
//! Unix-like systems (Linux, macOS) talk to Discord over a Unix domain
//! socket, Windows over a named pipe. Both a blocking client and an async
//! client (Tokio, async-std or smol) are provided.
//!
//! ## Example
//!
//! ```rust,no_run
//! use presence_ipc::{ActivityBuilder, DiscordIpcClient};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = DiscordIpcClient::new("your_client_id")?;
//! client.connect()?;
//!
//! let activity = ActivityBuilder::new()
//!     .state("Playing a game")
//!     .details("In the menu")
//!     .start_timestamp_now()?
//!     .large_image("game_logo")
//!     .large_text("My Awesome Game")
//!     .build();
//!
//! client.set_activity(&activity)?;
//!
//! // Keep the activity for some time...
//! std::thread::sleep(std::time::Duration::from_secs(10));
//!
//! client.clear_activity()?;
//! # Ok(())
//! # }
//! ```

pub mod activity;
pub mod error;
pub mod ipc;
pub mod payload;
pub mod presence;
pub mod retry;
pub mod session;
pub mod sync;
pub mod voice;

#[cfg(any(
    feature = "tokio-runtime",
    feature = "async-std-runtime",
    feature = "smol-runtime"
))]
pub mod async_io;

// Re-export the main public API
pub use activity::{
    Activity, ActivityAssets, ActivityBuilder, ActivityButton, ActivityParty, ActivitySecrets,
    ActivityTimestamps, ActivityType, StatusDisplayType,
};
pub use error::{DiscordIpcError, ErrorCategory, ProtocolContext, Result};
pub use ipc::{Command, Endpoint, Event, Frame, IpcConfig, IpcMessage, Opcode, PipeConfig};
pub use presence::Presence;
pub use retry::{connect_with_retry, with_retry, RetryConfig};
pub use session::{EventRegistry, Inbound, SessionState};
pub use sync::DiscordIpcClient;
pub use voice::{Pan, UserVoiceSettings, VoiceIo, VoiceMode, VoiceModeType, VoiceSettings};

#[cfg(any(
    feature = "tokio-runtime",
    feature = "async-std-runtime",
    feature = "smol-runtime"
))]
pub use async_io::AsyncDiscordIpcClient;
#[cfg(any(
    feature = "tokio-runtime",
    feature = "async-std-runtime",
    feature = "smol-runtime"
))]
pub use presence::AsyncPresence;
