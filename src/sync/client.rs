use log::{debug, trace};
use serde_json::Value;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::activity::Activity;
use crate::error::{DiscordIpcError, Result};
use crate::ipc::{endpoint, Endpoint, Event, Frame, IpcConfig, IpcConnection, IpcMessage, Opcode};
use crate::payload;
use crate::session::{SessionCore, SessionState, Step};
use crate::voice::{UserVoiceSettings, VoiceSettings};

/// Blocking Discord IPC client
///
/// Holds one session at a time. Every call takes `&mut self`, so a request
/// is always answered (or timed out) before the next one is written.
pub struct DiscordIpcClient {
    config: IpcConfig,
    core: SessionCore,
    connection: Option<IpcConnection>,
}

impl DiscordIpcClient {
    /// Create a new Discord IPC client (uses auto-discovery)
    pub fn new<S: ToString>(client_id: S) -> Result<Self> {
        Self::with_config(client_id, IpcConfig::default())
    }

    /// Create a new Discord IPC client with explicit configuration
    ///
    /// ```no_run
    /// use presence_ipc::{DiscordIpcClient, IpcConfig, PipeConfig};
    ///
    /// let config = IpcConfig::fast_connect()
    ///     .with_pipe(PipeConfig::CustomPath("/tmp/discord-ipc-0".to_string()));
    /// let mut client = DiscordIpcClient::with_config("client_id", config)?;
    /// client.connect()?;
    /// # Ok::<(), presence_ipc::DiscordIpcError>(())
    /// ```
    pub fn with_config<S: ToString>(client_id: S, config: IpcConfig) -> Result<Self> {
        let client_id = client_id.to_string();
        if client_id.trim().is_empty() {
            return Err(DiscordIpcError::InvalidArgument(
                "client_id must not be empty".to_string(),
            ));
        }

        Ok(Self {
            config: config.checked()?,
            core: SessionCore::new(client_id),
            connection: None,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.core.client_id
    }

    pub fn config(&self) -> &IpcConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.core.state
    }

    pub fn is_ready(&self) -> bool {
        self.core.state == SessionState::Ready
    }

    /// Endpoint of the current connection, if any
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.connection.as_ref().map(IpcConnection::endpoint)
    }

    /// Resolve the endpoint, connect and perform the handshake
    ///
    /// Only valid from [`SessionState::Disconnected`]. Returns the `data`
    /// of Discord's READY event.
    ///
    /// # Errors
    ///
    /// `EndpointNotFound` or `ConnectTimeout` leave the session disconnected
    /// so `connect` can simply be called again. A rejected or broken
    /// handshake tears the connection down; use [`reconnect`](Self::reconnect)
    /// afterwards.
    pub fn connect(&mut self) -> Result<Value> {
        self.core.ensure_can_connect()?;

        let endpoint = endpoint::resolve(&self.config)?;
        let mut connection = IpcConnection::connect_with(
            &endpoint,
            self.config.connect_timeout(),
            self.config.retry_interval(),
        )?;
        connection.set_max_payload_size(self.config.max_payload_size);

        let handshake = self.core.begin_handshake(self.config.ipc_version);
        debug!("Sending handshake to {}", endpoint.path.display());

        let timeout = self.config.response_timeout();
        let result = connection
            .send(Opcode::Handshake, &handshake)
            .and_then(|()| connection.recv(timeout))
            .and_then(|frame| self.core.finish_handshake(frame));

        match result {
            Ok(data) => {
                self.connection = Some(connection);
                Ok(data)
            }
            Err(err) => {
                connection.close();
                if !self.core.record_failure(&err) {
                    self.core.state = SessionState::Closed;
                }
                Err(err)
            }
        }
    }

    /// Drop the current connection and start a fresh session
    ///
    /// The endpoint is resolved again, so a restarted Discord client is found.
    pub fn reconnect(&mut self) -> Result<Value> {
        debug!("Reconnecting (state was {})", self.core.state);
        self.teardown();
        self.core.state = SessionState::Disconnected;
        self.connect()
    }

    /// Close the connection without notifying Discord
    pub fn close(&mut self) {
        self.teardown();
        self.core.state = SessionState::Closed;
    }

    fn teardown(&mut self) {
        self.core.pending_nonce = None;
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
    }

    fn fail<T>(&mut self, err: DiscordIpcError) -> Result<T> {
        if self.core.record_failure(&err) {
            debug!("Tearing down connection after error: {}", err);
            self.teardown();
        }
        Err(err)
    }

    /// Send a command and wait for its response
    ///
    /// Event frames that arrive while waiting go to their handlers. A
    /// timeout leaves the connection open; a late reply is discarded.
    pub fn request(&mut self, message: IpcMessage) -> Result<Value> {
        self.core.ensure_ready()?;
        let timeout = self.config.response_timeout();
        let Some(connection) = self.connection.as_mut() else {
            return self.fail(DiscordIpcError::PipeClosed);
        };

        trace!("Sending {:?} ({})", message.cmd, message.nonce);
        self.core.pending_nonce = Some(message.nonce.clone());

        match Self::exchange(connection, &mut self.core, &message, timeout) {
            Ok(response) => Ok(response),
            Err(err) => self.fail(err),
        }
    }

    fn exchange(
        connection: &mut IpcConnection,
        core: &mut SessionCore,
        message: &IpcMessage,
        timeout: Duration,
    ) -> Result<Value> {
        connection.send(Opcode::Frame, message)?;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DiscordIpcError::response_timeout(timeout));
            }

            let frame = connection.recv(remaining).map_err(|err| match err {
                DiscordIpcError::ResponseTimeout { .. } => {
                    DiscordIpcError::response_timeout(timeout)
                }
                other => other,
            })?;

            match core.route(frame)? {
                Step::Reply(response) => return Ok(response),
                Step::Pong(body) => connection.send(Opcode::Pong, &body)?,
                Step::Dispatched | Step::Continue => {}
            }
        }
    }

    /// Read and dispatch events until nothing arrives for `timeout`
    ///
    /// Returns the number of events handed to a handler.
    pub fn poll_events(&mut self, timeout: Duration) -> Result<usize> {
        self.core.ensure_ready()?;
        let mut dispatched = 0;

        loop {
            let Some(connection) = self.connection.as_mut() else {
                return self.fail(DiscordIpcError::PipeClosed);
            };

            let step = match connection.recv(timeout) {
                Ok(frame) => self.core.route(frame),
                Err(DiscordIpcError::ResponseTimeout { .. }) => return Ok(dispatched),
                Err(err) => Err(err),
            };

            match step {
                Ok(Step::Dispatched) => dispatched += 1,
                Ok(Step::Pong(body)) => {
                    if let Err(err) = connection.send(Opcode::Pong, &body) {
                        return self.fail(err);
                    }
                }
                Ok(Step::Reply(body)) => debug!("Ignoring unsolicited reply: {}", body),
                Ok(Step::Continue) => {}
                Err(err) => return self.fail(err),
            }
        }
    }

    /// Set Discord Rich Presence activity
    ///
    /// # Errors
    ///
    /// `InvalidActivity` when the activity breaks one of Discord's limits;
    /// nothing is sent in that case.
    pub fn set_activity(&mut self, activity: &Activity) -> Result<Value> {
        activity.validate()?;
        self.request(payload::set_activity(process::id(), activity)?)
    }

    /// Clear Discord Rich Presence activity
    pub fn clear_activity(&mut self) -> Result<Value> {
        self.request(payload::clear_activity(process::id()))
    }

    /// Ask the user to authorize this application for `scopes`
    pub fn authorize<S: AsRef<str>>(&mut self, client_id: &str, scopes: &[S]) -> Result<Value> {
        self.request(payload::authorize(client_id, scopes))
    }

    pub fn authenticate(&mut self, access_token: &str) -> Result<Value> {
        self.request(payload::authenticate(access_token))
    }

    pub fn get_guilds(&mut self) -> Result<Value> {
        self.request(payload::get_guilds())
    }

    pub fn get_guild(&mut self, guild_id: &str) -> Result<Value> {
        self.request(payload::get_guild(guild_id))
    }

    pub fn get_channels(&mut self, guild_id: &str) -> Result<Value> {
        self.request(payload::get_channels(guild_id))
    }

    pub fn get_channel(&mut self, channel_id: &str) -> Result<Value> {
        self.request(payload::get_channel(channel_id))
    }

    /// Join a voice channel, or leave with `None`
    pub fn select_voice_channel(&mut self, channel_id: Option<&str>) -> Result<Value> {
        self.request(payload::select_voice_channel(channel_id))
    }

    pub fn get_selected_voice_channel(&mut self) -> Result<Value> {
        self.request(payload::get_selected_voice_channel())
    }

    pub fn select_text_channel(&mut self, channel_id: Option<&str>) -> Result<Value> {
        self.request(payload::select_text_channel(channel_id))
    }

    pub fn set_user_voice_settings(&mut self, settings: &UserVoiceSettings) -> Result<Value> {
        self.request(payload::set_user_voice_settings(settings)?)
    }

    pub fn get_voice_settings(&mut self) -> Result<Value> {
        self.request(payload::get_voice_settings())
    }

    pub fn set_voice_settings(&mut self, settings: &VoiceSettings) -> Result<Value> {
        self.request(payload::set_voice_settings(settings)?)
    }

    pub fn capture_shortcut(&mut self, action: &str) -> Result<Value> {
        self.request(payload::capture_shortcut(action))
    }

    pub fn send_activity_join_invite(&mut self, user_id: &str) -> Result<Value> {
        self.request(payload::send_activity_join_invite(user_id))
    }

    pub fn close_activity_request(&mut self, user_id: &str) -> Result<Value> {
        self.request(payload::close_activity_request(user_id))
    }

    /// Subscribe to `event` without registering a handler
    pub fn subscribe(&mut self, event: Event, args: Option<Value>) -> Result<Value> {
        self.request(payload::subscribe(&event, args))
    }

    pub fn unsubscribe(&mut self, event: Event, args: Option<Value>) -> Result<Value> {
        self.request(payload::unsubscribe(&event, args))
    }

    /// Subscribe to `event` and call `handler` with the data of each occurrence
    ///
    /// The handler is stored only once Discord has accepted the subscription.
    pub fn register_event<F>(&mut self, event: &str, handler: F, args: Option<Value>) -> Result<Value>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let event = Event::parse_registration(event)?;
        let response = self.request(payload::subscribe(&event, args))?;
        debug!("Registered handler for {}", event);
        self.core.events.insert(event, Arc::new(handler));
        Ok(response)
    }

    /// Unsubscribe from `event` and drop its handler
    pub fn unregister_event(&mut self, event: &str, args: Option<Value>) -> Result<Value> {
        let event = Event::parse_registration(event)?;
        if !self.core.events.contains(&event) {
            return Err(DiscordIpcError::EventNotRegistered(event.to_string()));
        }
        let response = self.request(payload::unsubscribe(&event, args))?;
        self.core.events.remove(&event);
        Ok(response)
    }

    /// Send a raw IPC frame
    pub fn send_message(&mut self, opcode: Opcode, payload: &Value) -> Result {
        let Some(connection) = self.connection.as_mut() else {
            return Err(DiscordIpcError::NotReady {
                state: self.core.state.clone(),
            });
        };
        match connection.send(opcode, payload) {
            Ok(()) => Ok(()),
            Err(err) => self.fail(err),
        }
    }

    /// Receive one raw IPC frame, bypassing routing
    pub fn recv_message(&mut self, timeout: Duration) -> Result<Frame> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(DiscordIpcError::NotReady {
                state: self.core.state.clone(),
            });
        };
        match connection.recv(timeout) {
            Ok(frame) => Ok(frame),
            Err(err) => self.fail(err),
        }
    }
}

impl Drop for DiscordIpcClient {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_client_id_is_rejected() {
        assert!(matches!(
            DiscordIpcClient::new("  "),
            Err(DiscordIpcError::InvalidArgument(_))
        ));
    }

    #[test]
    fn numeric_client_id_is_kept_as_string() {
        let client = DiscordIpcClient::new(1234u64).unwrap();
        assert_eq!(client.client_id(), "1234");
    }

    #[test]
    fn commands_before_connect_are_not_ready() {
        let mut client = DiscordIpcClient::new("1234").unwrap();
        let err = client.get_guilds().unwrap_err();
        assert!(matches!(
            err,
            DiscordIpcError::NotReady {
                state: SessionState::Disconnected
            }
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = IpcConfig::default().with_max_sockets(0);
        assert!(DiscordIpcClient::with_config("1234", config).is_err());
    }

    #[test]
    fn close_is_idempotent() {
        let mut client = DiscordIpcClient::new("1234").unwrap();
        client.close();
        client.close();
        assert_eq!(client.state(), &SessionState::Closed);
    }
}
