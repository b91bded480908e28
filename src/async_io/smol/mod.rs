//! smol specific implementations for async Discord IPC

use futures::future::BoxFuture;
use std::io;
use std::time::Duration;

#[cfg(unix)]
use smol::io::{AsyncReadExt as _, AsyncWriteExt as _};
#[cfg(unix)]
use smol::net::unix::UnixStream;

#[cfg(windows)]
use crate::async_io::pipe::PolledPipe;
use crate::async_io::traits::{AsyncRead, AsyncWrite, Runtime};
use crate::ipc::Endpoint;

/// Runs the async client on smol
#[derive(Debug, Clone, Copy, Default)]
pub struct SmolRuntime;

fn smol_sleep(duration: Duration) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        smol::Timer::after(duration).await;
    })
}

/// A Discord IPC connection using smol
pub enum SmolConnection {
    #[cfg(unix)]
    Unix(UnixStream),

    #[cfg(windows)]
    Windows(PolledPipe),
}

impl Runtime for SmolRuntime {
    type Connection = SmolConnection;

    fn connect<'a>(&'a self, endpoint: &'a Endpoint) -> BoxFuture<'a, io::Result<SmolConnection>> {
        Box::pin(async move {
            #[cfg(unix)]
            {
                Ok(SmolConnection::Unix(UnixStream::connect(&endpoint.path).await?))
            }

            #[cfg(windows)]
            {
                let path = endpoint.path.clone();
                let pipe =
                    smol::unblock(move || crate::ipc::connection::windows::open_pipe(&path))
                        .await?;
                Ok(SmolConnection::Windows(PolledPipe::new(pipe, smol_sleep)))
            }
        })
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        smol_sleep(duration)
    }

    fn timeout<'a, T: Send + 'a>(
        &self,
        duration: Duration,
        future: BoxFuture<'a, T>,
    ) -> BoxFuture<'a, Option<T>> {
        Box::pin(smol::future::or(async move { Some(future.await) }, async move {
            smol::Timer::after(duration).await;
            None
        }))
    }
}

impl AsyncRead for SmolConnection {
    fn read<'a>(&'a mut self, buf: &'a mut [u8]) -> BoxFuture<'a, io::Result<usize>> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => Box::pin(async move { stream.read(buf).await }),

            #[cfg(windows)]
            Self::Windows(pipe) => pipe.read(buf),
        }
    }
}

impl AsyncWrite for SmolConnection {
    fn write<'a>(&'a mut self, buf: &'a [u8]) -> BoxFuture<'a, io::Result<usize>> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => Box::pin(async move { stream.write(buf).await }),

            #[cfg(windows)]
            Self::Windows(pipe) => pipe.write(buf),
        }
    }

    fn flush(&mut self) -> BoxFuture<'_, io::Result<()>> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => Box::pin(async move { stream.flush().await }),

            #[cfg(windows)]
            Self::Windows(pipe) => pipe.flush(),
        }
    }

    fn shutdown(&mut self) -> BoxFuture<'_, io::Result<()>> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => {
                let result = stream.shutdown(std::net::Shutdown::Both);
                Box::pin(async move { result })
            }

            #[cfg(windows)]
            Self::Windows(pipe) => pipe.shutdown(),
        }
    }
}

/// smol-specific constructors for AsyncDiscordIpcClient
pub mod client {
    use super::SmolRuntime;
    use crate::async_io::client::AsyncDiscordIpcClient;
    use crate::error::Result;
    use crate::ipc::IpcConfig;

    pub fn new_discord_ipc_client(
        client_id: impl ToString,
    ) -> Result<AsyncDiscordIpcClient<SmolRuntime>> {
        AsyncDiscordIpcClient::new(client_id, SmolRuntime)
    }

    pub fn new_discord_ipc_client_with_config(
        client_id: impl ToString,
        config: IpcConfig,
    ) -> Result<AsyncDiscordIpcClient<SmolRuntime>> {
        AsyncDiscordIpcClient::with_config(client_id, SmolRuntime, config)
    }
}
