//! async-std specific implementations for async Discord IPC

use futures::future::BoxFuture;
use std::io;
use std::time::Duration;

#[cfg(unix)]
use async_std::io::{ReadExt as _, WriteExt as _};
#[cfg(unix)]
use async_std::os::unix::net::UnixStream;

#[cfg(windows)]
use crate::async_io::pipe::PolledPipe;
use crate::async_io::traits::{AsyncRead, AsyncWrite, Runtime};
use crate::ipc::Endpoint;

/// Runs the async client on async-std
#[derive(Debug, Clone, Copy, Default)]
pub struct AsyncStdRuntime;

fn async_std_sleep(duration: Duration) -> BoxFuture<'static, ()> {
    Box::pin(async_std::task::sleep(duration))
}

/// A Discord IPC connection using async-std
pub enum AsyncStdConnection {
    #[cfg(unix)]
    Unix(UnixStream),

    #[cfg(windows)]
    Windows(PolledPipe),
}

impl Runtime for AsyncStdRuntime {
    type Connection = AsyncStdConnection;

    fn connect<'a>(
        &'a self,
        endpoint: &'a Endpoint,
    ) -> BoxFuture<'a, io::Result<AsyncStdConnection>> {
        Box::pin(async move {
            #[cfg(unix)]
            {
                Ok(AsyncStdConnection::Unix(
                    UnixStream::connect(&endpoint.path).await?,
                ))
            }

            #[cfg(windows)]
            {
                let path = endpoint.path.clone();
                let pipe =
                    blocking::unblock(move || crate::ipc::connection::windows::open_pipe(&path))
                        .await?;
                Ok(AsyncStdConnection::Windows(PolledPipe::new(
                    pipe,
                    async_std_sleep,
                )))
            }
        })
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        async_std_sleep(duration)
    }

    fn timeout<'a, T: Send + 'a>(
        &self,
        duration: Duration,
        future: BoxFuture<'a, T>,
    ) -> BoxFuture<'a, Option<T>> {
        Box::pin(async move { async_std::future::timeout(duration, future).await.ok() })
    }
}

impl AsyncRead for AsyncStdConnection {
    fn read<'a>(&'a mut self, buf: &'a mut [u8]) -> BoxFuture<'a, io::Result<usize>> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => Box::pin(async move { stream.read(buf).await }),

            #[cfg(windows)]
            Self::Windows(pipe) => pipe.read(buf),
        }
    }
}

impl AsyncWrite for AsyncStdConnection {
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

/// async-std-specific constructors for AsyncDiscordIpcClient
pub mod client {
    use super::AsyncStdRuntime;
    use crate::async_io::client::AsyncDiscordIpcClient;
    use crate::error::Result;
    use crate::ipc::IpcConfig;

    pub fn new_discord_ipc_client(
        client_id: impl ToString,
    ) -> Result<AsyncDiscordIpcClient<AsyncStdRuntime>> {
        AsyncDiscordIpcClient::new(client_id, AsyncStdRuntime)
    }

    pub fn new_discord_ipc_client_with_config(
        client_id: impl ToString,
        config: IpcConfig,
    ) -> Result<AsyncDiscordIpcClient<AsyncStdRuntime>> {
        AsyncDiscordIpcClient::with_config(client_id, AsyncStdRuntime, config)
    }
}
