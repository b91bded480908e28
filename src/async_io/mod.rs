//! Async implementation of the Discord IPC client
//!
//! [`AsyncDiscordIpcClient`] is generic over a [`Runtime`], which supplies
//! connections, timers and timeouts. The runtime value is passed to the
//! client when it is created.
//!
//! ## Supported Runtimes
//!
//! - **Tokio**: Enable with the `tokio-runtime` feature
//! - **async-std**: Enable with the `async-std-runtime` feature
//! - **smol**: Enable with the `smol-runtime` feature
//!
//! ## Usage Examples
//!
//! ### With Tokio
//!
//! ```rust,ignore
//! # async fn run() -> presence_ipc::Result {
//! use presence_ipc::ActivityBuilder;
//! use presence_ipc::async_io::tokio::client::new_discord_ipc_client;
//!
//! let mut client = new_discord_ipc_client("your_client_id")?;
//! client.connect().await?;
//!
//! let activity = ActivityBuilder::new()
//!     .state("Playing a game")
//!     .details("In the menu")
//!     .build();
//!
//! client.set_activity(&activity).await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod traits;

#[cfg(all(windows, any(feature = "smol-runtime", feature = "async-std-runtime")))]
mod pipe;

pub use client::AsyncDiscordIpcClient;
pub use traits::{write_all, AsyncRead, AsyncWrite, Runtime};

// Runtime-specific re-exports
#[cfg(feature = "tokio-runtime")]
pub mod tokio;

#[cfg(feature = "async-std-runtime")]
pub mod async_std;

#[cfg(feature = "smol-runtime")]
pub mod smol;
