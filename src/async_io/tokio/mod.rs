//! Tokio-specific implementations for async Discord IPC

use futures::future::BoxFuture;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[cfg(unix)]
use tokio::net::UnixStream;
#[cfg(windows)]
use tokio::net::windows::named_pipe::{ClientOptions, NamedPipeClient};

use crate::async_io::traits::{AsyncRead, AsyncWrite, Runtime};
use crate::ipc::Endpoint;

/// Runs the async client on the ambient Tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRuntime;

/// A Discord IPC connection using Tokio
pub enum TokioConnection {
    #[cfg(unix)]
    Unix(UnixStream),

    #[cfg(windows)]
    Windows(NamedPipeClient),
}

impl Runtime for TokioRuntime {
    type Connection = TokioConnection;

    fn connect<'a>(&'a self, endpoint: &'a Endpoint) -> BoxFuture<'a, io::Result<TokioConnection>> {
        Box::pin(async move {
            #[cfg(unix)]
            {
                Ok(TokioConnection::Unix(UnixStream::connect(&endpoint.path).await?))
            }

            // a busy pipe surfaces as ERROR_PIPE_BUSY, which the client retries
            #[cfg(windows)]
            {
                Ok(TokioConnection::Windows(
                    ClientOptions::new().open(&endpoint.path)?,
                ))
            }
        })
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }

    fn timeout<'a, T: Send + 'a>(
        &self,
        duration: Duration,
        future: BoxFuture<'a, T>,
    ) -> BoxFuture<'a, Option<T>> {
        Box::pin(async move { tokio::time::timeout(duration, future).await.ok() })
    }
}

impl AsyncRead for TokioConnection {
    fn read<'a>(&'a mut self, buf: &'a mut [u8]) -> BoxFuture<'a, io::Result<usize>> {
        Box::pin(async move {
            match self {
                #[cfg(unix)]
                Self::Unix(stream) => stream.read(buf).await,

                #[cfg(windows)]
                Self::Windows(pipe) => pipe.read(buf).await,
            }
        })
    }
}

impl AsyncWrite for TokioConnection {
    fn write<'a>(&'a mut self, buf: &'a [u8]) -> BoxFuture<'a, io::Result<usize>> {
        Box::pin(async move {
            match self {
                #[cfg(unix)]
                Self::Unix(stream) => stream.write(buf).await,

                #[cfg(windows)]
                Self::Windows(pipe) => pipe.write(buf).await,
            }
        })
    }

    fn flush(&mut self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move {
            match self {
                #[cfg(unix)]
                Self::Unix(stream) => stream.flush().await,

                #[cfg(windows)]
                Self::Windows(pipe) => pipe.flush().await,
            }
        })
    }

    fn shutdown(&mut self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move {
            match self {
                #[cfg(unix)]
                Self::Unix(stream) => stream.shutdown().await,

                #[cfg(windows)]
                Self::Windows(pipe) => pipe.shutdown().await,
            }
        })
    }
}

/// Tokio-specific constructors for AsyncDiscordIpcClient
pub mod client {
    use super::TokioRuntime;
    use crate::async_io::client::AsyncDiscordIpcClient;
    use crate::error::Result;
    use crate::ipc::IpcConfig;

    /// Create a new Tokio-based Discord IPC client
    pub fn new_discord_ipc_client(
        client_id: impl ToString,
    ) -> Result<AsyncDiscordIpcClient<TokioRuntime>> {
        AsyncDiscordIpcClient::new(client_id, TokioRuntime)
    }

    pub fn new_discord_ipc_client_with_config(
        client_id: impl ToString,
        config: IpcConfig,
    ) -> Result<AsyncDiscordIpcClient<TokioRuntime>> {
        AsyncDiscordIpcClient::with_config(client_id, TokioRuntime, config)
    }
}
