//! Rich Presence only facades
//!
//! For programs that just want to show an activity: connect, update,
//! clear, close. [`Presence::try_update`] turns "Discord is not running"
//! into `Ok(false)` so a status loop can keep going.

use serde_json::Value;

use crate::activity::Activity;
use crate::error::{DiscordIpcError, Result};
use crate::ipc::IpcConfig;
use crate::session::SessionState;
use crate::sync::DiscordIpcClient;

fn is_absent(err: &DiscordIpcError) -> bool {
    matches!(
        err,
        DiscordIpcError::EndpointNotFound | DiscordIpcError::PipeClosed
    )
}

/// Blocking Rich Presence facade
pub struct Presence {
    client: DiscordIpcClient,
}

impl Presence {
    pub fn new<S: ToString>(client_id: S) -> Result<Self> {
        Ok(Self {
            client: DiscordIpcClient::new(client_id)?,
        })
    }

    pub fn with_config<S: ToString>(client_id: S, config: IpcConfig) -> Result<Self> {
        Ok(Self {
            client: DiscordIpcClient::with_config(client_id, config)?,
        })
    }

    /// Connect, starting a fresh session if an earlier one ended
    pub fn connect(&mut self) -> Result<Value> {
        match self.client.state() {
            SessionState::Disconnected => self.client.connect(),
            _ => self.client.reconnect(),
        }
    }

    pub fn update(&mut self, activity: &Activity) -> Result<Value> {
        self.client.set_activity(activity)
    }

    /// Like [`update`](Self::update), connecting first if needed
    ///
    /// Returns `Ok(false)` when Discord is not running or went away.
    pub fn try_update(&mut self, activity: &Activity) -> Result<bool> {
        if !self.client.is_ready() {
            match self.connect() {
                Ok(_) => {}
                Err(err) if is_absent(&err) => return Ok(false),
                Err(err) => return Err(err),
            }
        }

        match self.client.set_activity(activity) {
            Ok(_) => Ok(true),
            Err(err) if is_absent(&err) => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub fn clear(&mut self) -> Result<Value> {
        self.client.clear_activity()
    }

    pub fn close(&mut self) {
        self.client.close();
    }

    pub fn state(&self) -> &SessionState {
        self.client.state()
    }

    /// The underlying client, for the rest of the RPC API
    pub fn client_mut(&mut self) -> &mut DiscordIpcClient {
        &mut self.client
    }
}

#[cfg(any(
    feature = "tokio-runtime",
    feature = "async-std-runtime",
    feature = "smol-runtime"
))]
pub use self::nonblocking::AsyncPresence;

#[cfg(any(
    feature = "tokio-runtime",
    feature = "async-std-runtime",
    feature = "smol-runtime"
))]
mod nonblocking {
    use super::is_absent;
    use serde_json::Value;

    use crate::activity::Activity;
    use crate::async_io::{AsyncDiscordIpcClient, Runtime};
    use crate::error::Result;
    use crate::ipc::IpcConfig;
    use crate::session::SessionState;

    /// Async Rich Presence facade
    pub struct AsyncPresence<R: Runtime> {
        client: AsyncDiscordIpcClient<R>,
    }

    impl<R: Runtime> AsyncPresence<R> {
        pub fn new(client_id: impl ToString, runtime: R) -> Result<Self> {
            Ok(Self {
                client: AsyncDiscordIpcClient::new(client_id, runtime)?,
            })
        }

        pub fn with_config(client_id: impl ToString, runtime: R, config: IpcConfig) -> Result<Self> {
            Ok(Self {
                client: AsyncDiscordIpcClient::with_config(client_id, runtime, config)?,
            })
        }

        pub async fn connect(&mut self) -> Result<Value> {
            match self.client.state() {
                SessionState::Disconnected => self.client.connect().await,
                _ => self.client.reconnect().await,
            }
        }

        pub async fn update(&mut self, activity: &Activity) -> Result<Value> {
            self.client.set_activity(activity).await
        }

        pub async fn try_update(&mut self, activity: &Activity) -> Result<bool> {
            if !self.client.is_ready() {
                match self.connect().await {
                    Ok(_) => {}
                    Err(err) if is_absent(&err) => return Ok(false),
                    Err(err) => return Err(err),
                }
            }

            match self.client.set_activity(activity).await {
                Ok(_) => Ok(true),
                Err(err) if is_absent(&err) => Ok(false),
                Err(err) => Err(err),
            }
        }

        pub async fn clear(&mut self) -> Result<Value> {
            self.client.clear_activity().await
        }

        pub async fn close(&mut self) {
            self.client.close().await;
        }

        pub fn state(&self) -> &SessionState {
            self.client.state()
        }

        pub fn client_mut(&mut self) -> &mut AsyncDiscordIpcClient<R> {
            &mut self.client
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::PipeConfig;

    #[test]
    fn try_update_without_discord_is_false() {
        let dir = tempfile::tempdir().unwrap();
        let config = IpcConfig::fast_connect().with_pipe(PipeConfig::CustomPath(
            dir.path().join("discord-ipc-0").to_string_lossy().into_owned(),
        ));
        let mut presence = Presence::with_config("1234", config).unwrap();
        let activity = crate::ActivityBuilder::new().state("idle").build();

        assert!(!presence.try_update(&activity).unwrap());
        assert!(!presence.try_update(&activity).unwrap());
    }
}
