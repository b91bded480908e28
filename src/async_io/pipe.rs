//! Named pipe connection for runtimes without native pipe support
//!
//! The pipe handle is synchronous, so a pending read would stall writes.
//! Reads therefore only touch the handle once data is buffered and sleep on
//! the runtime's timer otherwise.

use futures::future::BoxFuture;
use std::fs::File;
use std::io::{self, Write};
use std::time::Duration;

use crate::async_io::traits::{AsyncRead, AsyncWrite};
use crate::ipc::connection::windows::{try_read, POLL_INTERVAL};

pub struct PolledPipe {
    pipe: File,
    sleep: fn(Duration) -> BoxFuture<'static, ()>,
}

impl PolledPipe {
    pub(crate) fn new(pipe: File, sleep: fn(Duration) -> BoxFuture<'static, ()>) -> Self {
        Self { pipe, sleep }
    }
}

impl AsyncRead for PolledPipe {
    fn read<'a>(&'a mut self, buf: &'a mut [u8]) -> BoxFuture<'a, io::Result<usize>> {
        Box::pin(async move {
            loop {
                if let Some(n) = try_read(&mut self.pipe, buf)? {
                    return Ok(n);
                }
                (self.sleep)(POLL_INTERVAL).await;
            }
        })
    }
}

impl AsyncWrite for PolledPipe {
    fn write<'a>(&'a mut self, buf: &'a [u8]) -> BoxFuture<'a, io::Result<usize>> {
        Box::pin(async move { self.pipe.write(buf) })
    }

    fn flush(&mut self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move { self.pipe.flush() })
    }

    // closed when dropped
    fn shutdown(&mut self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async { Ok(()) })
    }
}
