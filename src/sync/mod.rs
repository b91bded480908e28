//! Blocking Discord IPC client
//!
//! Every call runs on the calling thread and returns once Discord has
//! answered or the configured timeout has passed.

pub mod client;

pub use client::DiscordIpcClient;
