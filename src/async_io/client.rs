//! Async Discord IPC Client implementation

use log::{debug, trace};
use serde::Serialize;
use serde_json::Value;
use std::io;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::traits::{write_all, AsyncRead, AsyncWrite, Runtime};
use crate::activity::Activity;
use crate::error::{DiscordIpcError, Result};
use crate::ipc::codec::{self, Frame, FrameBuffer};
use crate::ipc::connection::{connect_error, is_transient};
use crate::ipc::{endpoint, Endpoint, Event, IpcConfig, IpcMessage, Opcode};
use crate::payload;
use crate::session::{SessionCore, SessionState, Step};
use crate::voice::{UserVoiceSettings, VoiceSettings};

const READ_CHUNK: usize = 4096;

/// Framed connection over a runtime's stream
struct AsyncConnection<C> {
    stream: C,
    frames: FrameBuffer,
    endpoint: Endpoint,
}

impl<C> AsyncConnection<C>
where
    C: AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn open<R>(runtime: &R, endpoint: Endpoint, config: &IpcConfig) -> Result<Self>
    where
        R: Runtime<Connection = C>,
    {
        let connect_timeout = config.connect_timeout();
        let start = Instant::now();

        loop {
            let remaining = connect_timeout.saturating_sub(start.elapsed());
            let attempt = runtime
                .timeout(remaining, runtime.connect(&endpoint))
                .await;

            match attempt {
                Some(Ok(stream)) => {
                    debug!("Connected to {}", endpoint.path.display());
                    return Ok(Self {
                        stream,
                        frames: FrameBuffer::new(config.max_payload_size),
                        endpoint,
                    });
                }
                Some(Err(err)) if is_transient(&err) && start.elapsed() < connect_timeout => {
                    trace!("Endpoint busy ({}), retrying", err);
                    runtime.sleep(config.retry_interval()).await;
                }
                Some(Err(err)) if is_transient(&err) => {
                    return Err(DiscordIpcError::connect_timeout(connect_timeout))
                }
                Some(Err(err)) => return Err(connect_error(err)),
                None => return Err(DiscordIpcError::connect_timeout(connect_timeout)),
            }
        }
    }

    async fn send<T: Serialize + ?Sized>(&mut self, opcode: Opcode, payload: &T) -> Result {
        let bytes = codec::encode(opcode, payload)?;
        write_all(&mut self.stream, &bytes).await?;
        Ok(())
    }

    /// Receive the next whole frame, keeping partial bytes on timeout
    async fn recv<R: Runtime>(&mut self, runtime: &R, timeout: Duration) -> Result<Frame> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some(frame) = self.frames.next_frame()? {
                trace!("Received {:?} frame", frame.opcode);
                return Ok(frame);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DiscordIpcError::response_timeout(timeout));
            }

            match runtime.timeout(remaining, self.stream.read(&mut chunk)).await {
                None => return Err(DiscordIpcError::response_timeout(timeout)),
                Some(Ok(0)) => return Err(DiscordIpcError::PipeClosed),
                Some(Ok(n)) => self.frames.extend(&chunk[..n]),
                Some(Err(err)) if err.kind() == io::ErrorKind::Interrupted => {}
                Some(Err(err)) => return Err(err.into()),
            }
        }
    }

    async fn close(&mut self) {
        debug!("Closing connection to {}", self.endpoint.path.display());
        if let Err(err) = self.stream.shutdown().await {
            trace!("Shutdown reported {}", err);
        }
        self.frames.clear();
    }
}

/// Async Discord IPC client, generic over the runtime it runs on
///
/// Mirrors [`DiscordIpcClient`](crate::DiscordIpcClient) call for call.
pub struct AsyncDiscordIpcClient<R: Runtime> {
    runtime: R,
    config: IpcConfig,
    core: SessionCore,
    connection: Option<AsyncConnection<R::Connection>>,
}

impl<R: Runtime> AsyncDiscordIpcClient<R> {
    /// Creates a new async Discord IPC client
    ///
    /// This constructor doesn't establish a connection yet.
    /// Call `connect()` to establish a connection.
    pub fn new(client_id: impl ToString, runtime: R) -> Result<Self> {
        Self::with_config(client_id, runtime, IpcConfig::default())
    }

    pub fn with_config(client_id: impl ToString, runtime: R, config: IpcConfig) -> Result<Self> {
        let client_id = client_id.to_string();
        if client_id.trim().is_empty() {
            return Err(DiscordIpcError::InvalidArgument(
                "client_id must not be empty".to_string(),
            ));
        }

        Ok(Self {
            runtime,
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

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn state(&self) -> &SessionState {
        &self.core.state
    }

    pub fn is_ready(&self) -> bool {
        self.core.state == SessionState::Ready
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.connection.as_ref().map(|connection| &connection.endpoint)
    }

    /// Resolve the endpoint, connect and perform the handshake
    ///
    /// Same state rules as the blocking client: only valid from
    /// `Disconnected`, returns the READY `data`.
    pub async fn connect(&mut self) -> Result<Value> {
        self.core.ensure_can_connect()?;

        let endpoint = endpoint::resolve(&self.config)?;
        let mut connection = AsyncConnection::open(&self.runtime, endpoint, &self.config).await?;

        let handshake = self.core.begin_handshake(self.config.ipc_version);
        debug!("Sending handshake to {}", connection.endpoint.path.display());

        let timeout = self.config.response_timeout();
        let result = match connection.send(Opcode::Handshake, &handshake).await {
            Ok(()) => match connection.recv(&self.runtime, timeout).await {
                Ok(frame) => self.core.finish_handshake(frame),
                Err(err) => Err(err),
            },
            Err(err) => Err(err),
        };

        match result {
            Ok(data) => {
                self.connection = Some(connection);
                Ok(data)
            }
            Err(err) => {
                connection.close().await;
                if !self.core.record_failure(&err) {
                    self.core.state = SessionState::Closed;
                }
                Err(err)
            }
        }
    }

    /// Drop the current connection and start a fresh session
    pub async fn reconnect(&mut self) -> Result<Value> {
        debug!("Reconnecting (state was {})", self.core.state);
        self.teardown().await;
        self.core.state = SessionState::Disconnected;
        self.connect().await
    }

    /// Close the connection without notifying Discord
    pub async fn close(&mut self) {
        self.teardown().await;
        self.core.state = SessionState::Closed;
    }

    async fn teardown(&mut self) {
        self.core.pending_nonce = None;
        if let Some(mut connection) = self.connection.take() {
            connection.close().await;
        }
    }

    async fn fail<T>(&mut self, err: DiscordIpcError) -> Result<T> {
        if self.core.record_failure(&err) {
            debug!("Tearing down connection after error: {}", err);
            self.teardown().await;
        }
        Err(err)
    }

    /// Send a command and wait for its response
    pub async fn request(&mut self, message: IpcMessage) -> Result<Value> {
        self.core.ensure_ready()?;
        let timeout = self.config.response_timeout();
        let Some(connection) = self.connection.as_mut() else {
            return self.fail(DiscordIpcError::PipeClosed).await;
        };

        trace!("Sending {:?} ({})", message.cmd, message.nonce);
        self.core.pending_nonce = Some(message.nonce.clone());

        let result = Self::exchange(&self.runtime, connection, &mut self.core, &message, timeout).await;
        match result {
            Ok(response) => Ok(response),
            Err(err) => self.fail(err).await,
        }
    }

    async fn exchange(
        runtime: &R,
        connection: &mut AsyncConnection<R::Connection>,
        core: &mut SessionCore,
        message: &IpcMessage,
        timeout: Duration,
    ) -> Result<Value> {
        connection.send(Opcode::Frame, message).await?;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DiscordIpcError::response_timeout(timeout));
            }

            let frame = match connection.recv(runtime, remaining).await {
                Ok(frame) => frame,
                Err(DiscordIpcError::ResponseTimeout { .. }) => {
                    return Err(DiscordIpcError::response_timeout(timeout))
                }
                Err(err) => return Err(err),
            };

            match core.route(frame)? {
                Step::Reply(response) => return Ok(response),
                Step::Pong(body) => connection.send(Opcode::Pong, &body).await?,
                Step::Dispatched | Step::Continue => {}
            }
        }
    }

    /// Read and dispatch events until nothing arrives for `timeout`
    pub async fn poll_events(&mut self, timeout: Duration) -> Result<usize> {
        self.core.ensure_ready()?;
        let mut dispatched = 0;

        loop {
            let Some(connection) = self.connection.as_mut() else {
                return self.fail(DiscordIpcError::PipeClosed).await;
            };

            let step = match connection.recv(&self.runtime, timeout).await {
                Ok(frame) => self.core.route(frame),
                Err(DiscordIpcError::ResponseTimeout { .. }) => return Ok(dispatched),
                Err(err) => Err(err),
            };

            let outcome = match step {
                Ok(Step::Dispatched) => {
                    dispatched += 1;
                    Ok(())
                }
                Ok(Step::Pong(body)) => connection.send(Opcode::Pong, &body).await,
                Ok(Step::Reply(body)) => {
                    debug!("Ignoring unsolicited reply: {}", body);
                    Ok(())
                }
                Ok(Step::Continue) => Ok(()),
                Err(err) => Err(err),
            };

            if let Err(err) = outcome {
                return self.fail(err).await;
            }
        }
    }

    /// Sets Discord Rich Presence activity
    pub async fn set_activity(&mut self, activity: &Activity) -> Result<Value> {
        activity.validate()?;
        self.request(payload::set_activity(process::id(), activity)?).await
    }

    /// Clears Discord Rich Presence activity
    pub async fn clear_activity(&mut self) -> Result<Value> {
        self.request(payload::clear_activity(process::id())).await
    }

    pub async fn authorize<S: AsRef<str>>(&mut self, client_id: &str, scopes: &[S]) -> Result<Value> {
        self.request(payload::authorize(client_id, scopes)).await
    }

    pub async fn authenticate(&mut self, access_token: &str) -> Result<Value> {
        self.request(payload::authenticate(access_token)).await
    }

    pub async fn get_guilds(&mut self) -> Result<Value> {
        self.request(payload::get_guilds()).await
    }

    pub async fn get_guild(&mut self, guild_id: &str) -> Result<Value> {
        self.request(payload::get_guild(guild_id)).await
    }

    pub async fn get_channels(&mut self, guild_id: &str) -> Result<Value> {
        self.request(payload::get_channels(guild_id)).await
    }

    pub async fn get_channel(&mut self, channel_id: &str) -> Result<Value> {
        self.request(payload::get_channel(channel_id)).await
    }

    pub async fn select_voice_channel(&mut self, channel_id: Option<&str>) -> Result<Value> {
        self.request(payload::select_voice_channel(channel_id)).await
    }

    pub async fn get_selected_voice_channel(&mut self) -> Result<Value> {
        self.request(payload::get_selected_voice_channel()).await
    }

    pub async fn select_text_channel(&mut self, channel_id: Option<&str>) -> Result<Value> {
        self.request(payload::select_text_channel(channel_id)).await
    }

    pub async fn set_user_voice_settings(&mut self, settings: &UserVoiceSettings) -> Result<Value> {
        self.request(payload::set_user_voice_settings(settings)?).await
    }

    pub async fn get_voice_settings(&mut self) -> Result<Value> {
        self.request(payload::get_voice_settings()).await
    }

    pub async fn set_voice_settings(&mut self, settings: &VoiceSettings) -> Result<Value> {
        self.request(payload::set_voice_settings(settings)?).await
    }

    pub async fn capture_shortcut(&mut self, action: &str) -> Result<Value> {
        self.request(payload::capture_shortcut(action)).await
    }

    pub async fn send_activity_join_invite(&mut self, user_id: &str) -> Result<Value> {
        self.request(payload::send_activity_join_invite(user_id)).await
    }

    pub async fn close_activity_request(&mut self, user_id: &str) -> Result<Value> {
        self.request(payload::close_activity_request(user_id)).await
    }

    pub async fn subscribe(&mut self, event: Event, args: Option<Value>) -> Result<Value> {
        self.request(payload::subscribe(&event, args)).await
    }

    pub async fn unsubscribe(&mut self, event: Event, args: Option<Value>) -> Result<Value> {
        self.request(payload::unsubscribe(&event, args)).await
    }

    /// Subscribe to `event` and call `handler` with the data of each occurrence
    pub async fn register_event<F>(
        &mut self,
        event: &str,
        handler: F,
        args: Option<Value>,
    ) -> Result<Value>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let event = Event::parse_registration(event)?;
        let response = self.request(payload::subscribe(&event, args)).await?;
        debug!("Registered handler for {}", event);
        self.core.events.insert(event, Arc::new(handler));
        Ok(response)
    }

    pub async fn unregister_event(&mut self, event: &str, args: Option<Value>) -> Result<Value> {
        let event = Event::parse_registration(event)?;
        if !self.core.events.contains(&event) {
            return Err(DiscordIpcError::EventNotRegistered(event.to_string()));
        }
        let response = self.request(payload::unsubscribe(&event, args)).await?;
        self.core.events.remove(&event);
        Ok(response)
    }

    /// Sends a raw IPC frame
    pub async fn send_message(&mut self, opcode: Opcode, payload: &Value) -> Result {
        let Some(connection) = self.connection.as_mut() else {
            return Err(DiscordIpcError::NotReady {
                state: self.core.state.clone(),
            });
        };
        match connection.send(opcode, payload).await {
            Ok(()) => Ok(()),
            Err(err) => self.fail(err).await,
        }
    }

    /// Receives one raw IPC frame, bypassing routing
    pub async fn recv_message(&mut self, timeout: Duration) -> Result<Frame> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(DiscordIpcError::NotReady {
                state: self.core.state.clone(),
            });
        };
        match connection.recv(&self.runtime, timeout).await {
            Ok(frame) => Ok(frame),
            Err(err) => self.fail(err).await,
        }
    }
}
