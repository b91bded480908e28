//! Runtime-agnostic async I/O traits
//!
//! Each supported runtime wraps its socket or pipe type in a connection
//! implementing these traits; the client never sees the concrete type.

use futures::future::BoxFuture;
use std::io;
use std::time::Duration;

use crate::ipc::Endpoint;

/// Asynchronous version of std::io::Read
///
/// Implementations must not lose data when the returned future is dropped
/// before completion, since reads are raced against a timeout.
pub trait AsyncRead {
    /// Read bytes into `buf`, resolving to the number read (0 at end of stream)
    fn read<'a>(&'a mut self, buf: &'a mut [u8]) -> BoxFuture<'a, io::Result<usize>>;
}

/// Asynchronous version of std::io::Write
pub trait AsyncWrite {
    fn write<'a>(&'a mut self, buf: &'a [u8]) -> BoxFuture<'a, io::Result<usize>>;

    fn flush(&mut self) -> BoxFuture<'_, io::Result<()>>;

    /// Shut down the write half; the connection is unusable afterwards
    fn shutdown(&mut self) -> BoxFuture<'_, io::Result<()>>;
}

/// Write the whole buffer, then flush
pub async fn write_all<T: AsyncWrite + Unpin + ?Sized>(
    writer: &mut T,
    mut buf: &[u8],
) -> io::Result<()> {
    while !buf.is_empty() {
        match writer.write(buf).await {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write whole buffer",
                ));
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    writer.flush().await
}

/// The executor services the async client needs
///
/// A runtime value is handed to the client at construction; nothing is
/// looked up globally.
pub trait Runtime: Clone + Send + Sync + 'static {
    type Connection: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Open a connection to `endpoint`
    ///
    /// Errors are raw I/O errors so the client can tell a busy endpoint
    /// from a missing one.
    fn connect<'a>(&'a self, endpoint: &'a Endpoint) -> BoxFuture<'a, io::Result<Self::Connection>>;

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;

    /// Run `future` for at most `duration`, resolving to `None` on expiry
    fn timeout<'a, T: Send + 'a>(
        &self,
        duration: Duration,
        future: BoxFuture<'a, T>,
    ) -> BoxFuture<'a, Option<T>>;
}
