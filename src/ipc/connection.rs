use log::{debug, trace};
use serde::Serialize;
use std::io;
use std::time::{Duration, Instant};

use crate::error::{DiscordIpcError, Result};
use crate::ipc::codec::{self, Frame, FrameBuffer};
use crate::ipc::endpoint::Endpoint;
use crate::ipc::protocol::{constants, Opcode};

/// Blocking duplex byte stream to Discord
///
/// One implementation per platform; [`IpcConnection`] never looks past this
/// trait.
pub trait Transport: Send {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Read whatever is available, waiting at most `timeout`
    ///
    /// Returns `Ok(0)` on end of stream and an error of kind `TimedOut`
    /// or `WouldBlock` when nothing arrived in time.
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    fn shutdown(&mut self);
}

#[cfg(unix)]
mod unix {
    use super::Transport;
    use std::io::{self, Read, Write};
    use std::os::unix::net::UnixStream;
    use std::time::Duration;

    pub(super) struct UnixTransport {
        stream: UnixStream,
    }

    impl UnixTransport {
        pub(super) fn open(path: &std::path::Path) -> io::Result<Self> {
            let stream = UnixStream::connect(path)?;
            stream.set_nonblocking(false)?;
            Ok(Self { stream })
        }
    }

    impl Transport for UnixTransport {
        fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
            self.stream.write_all(buf)?;
            self.stream.flush()
        }

        fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
            // a zero timeout means "block forever" to the OS
            let timeout = timeout.max(Duration::from_millis(1));
            self.stream.set_read_timeout(Some(timeout))?;
            self.stream.read(buf)
        }

        fn shutdown(&mut self) {
            let _ = self.stream.shutdown(std::net::Shutdown::Both);
        }
    }
}

#[cfg(windows)]
pub(crate) mod windows {
    use super::Transport;
    use std::ffi::c_void;
    use std::fs::{File, OpenOptions};
    use std::io::{self, Read, Write};
    use std::os::windows::io::AsRawHandle;
    use std::path::Path;
    use std::time::{Duration, Instant};

    /// How often an idle pipe is checked for data
    pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(5);

    #[link(name = "kernel32")]
    extern "system" {
        fn PeekNamedPipe(
            pipe: *mut c_void,
            buffer: *mut c_void,
            buffer_size: u32,
            bytes_read: *mut u32,
            total_bytes_avail: *mut u32,
            bytes_left_this_message: *mut u32,
        ) -> i32;
    }

    pub(crate) fn open_pipe(path: &Path) -> io::Result<File> {
        OpenOptions::new().read(true).write(true).open(path)
    }

    /// Number of bytes that can be read from `pipe` without blocking
    pub(crate) fn available(pipe: &File) -> io::Result<usize> {
        let mut total = 0u32;
        // SAFETY: the handle is owned by `pipe` and outlives the call; only
        // the byte count is requested, so no buffer is written.
        let ok = unsafe {
            PeekNamedPipe(
                pipe.as_raw_handle() as *mut c_void,
                std::ptr::null_mut(),
                0,
                std::ptr::null_mut(),
                &mut total,
                std::ptr::null_mut(),
            )
        };
        if ok == 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(total as usize)
        }
    }

    /// Read only what is already buffered, or `None` when the pipe is idle
    pub(crate) fn try_read(pipe: &mut File, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match available(pipe)? {
            0 => Ok(None),
            ready => pipe.read(&mut buf[..ready.min(buf.len())]).map(Some),
        }
    }

    /// Named pipe client
    ///
    /// A blocking read on a synchronous pipe handle would also block writes,
    /// so reads only happen once the pipe reports buffered data.
    pub(super) struct PipeTransport {
        pipe: File,
    }

    impl PipeTransport {
        pub(super) fn open(path: &Path) -> io::Result<Self> {
            Ok(Self {
                pipe: open_pipe(path)?,
            })
        }
    }

    impl Transport for PipeTransport {
        fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
            self.pipe.write_all(buf)?;
            self.pipe.flush()
        }

        fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
            let deadline = Instant::now() + timeout;
            loop {
                if let Some(n) = try_read(&mut self.pipe, buf)? {
                    return Ok(n);
                }
                if Instant::now() >= deadline {
                    return Err(io::Error::from(io::ErrorKind::TimedOut));
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }

        // the handle is closed when the transport is dropped
        fn shutdown(&mut self) {}
    }
}

const ERROR_PIPE_BUSY: i32 = 231;

/// Errors worth retrying until the connect deadline
pub(crate) fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    ) || (cfg!(windows) && err.raw_os_error() == Some(ERROR_PIPE_BUSY))
}

/// Map a failed connect to the error taxonomy
pub(crate) fn connect_error(err: io::Error) -> DiscordIpcError {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => {
            DiscordIpcError::EndpointNotFound
        }
        io::ErrorKind::PermissionDenied => DiscordIpcError::ConnectionFailed(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "Permission denied when connecting to Discord IPC endpoint. Check file permissions.",
        )),
        _ => DiscordIpcError::ConnectionFailed(err),
    }
}

pub(crate) fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

/// Framed, blocking connection to a Discord IPC endpoint
pub struct IpcConnection {
    transport: Option<Box<dyn Transport>>,
    frames: FrameBuffer,
    endpoint: Endpoint,
}

impl IpcConnection {
    /// Open `endpoint`, retrying while it reports busy, for at most `connect_timeout`
    pub fn connect(endpoint: &Endpoint, connect_timeout: Duration) -> Result<Self> {
        Self::connect_with(
            endpoint,
            connect_timeout,
            Duration::from_millis(constants::DEFAULT_RETRY_INTERVAL_MS),
        )
    }

    pub(crate) fn connect_with(
        endpoint: &Endpoint,
        connect_timeout: Duration,
        retry_interval: Duration,
    ) -> Result<Self> {
        let start = Instant::now();

        loop {
            match Self::open_transport(endpoint) {
                Ok(transport) => {
                    debug!("Connected to {}", endpoint.path.display());
                    return Ok(Self {
                        transport: Some(transport),
                        frames: FrameBuffer::default(),
                        endpoint: endpoint.clone(),
                    });
                }
                Err(err) if is_transient(&err) => {
                    if start.elapsed() >= connect_timeout {
                        return Err(DiscordIpcError::connect_timeout(connect_timeout));
                    }
                    trace!("Endpoint busy ({}), retrying", err);
                    std::thread::sleep(retry_interval);
                }
                Err(err) => return Err(connect_error(err)),
            }
        }
    }

    fn open_transport(endpoint: &Endpoint) -> io::Result<Box<dyn Transport>> {
        #[cfg(unix)]
        {
            Ok(Box::new(unix::UnixTransport::open(&endpoint.path)?))
        }

        #[cfg(windows)]
        {
            Ok(Box::new(windows::PipeTransport::open(&endpoint.path)?))
        }
    }

    /// Wrap an already-open transport
    pub fn from_transport(transport: Box<dyn Transport>, endpoint: Endpoint) -> Self {
        Self {
            transport: Some(transport),
            frames: FrameBuffer::default(),
            endpoint,
        }
    }

    pub fn set_max_payload_size(&mut self, max_payload_size: u32) {
        self.frames = FrameBuffer::new(max_payload_size);
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Encode and send one frame
    pub fn send<T: Serialize + ?Sized>(&mut self, opcode: Opcode, payload: &T) -> Result<()> {
        let bytes = codec::encode(opcode, payload)?;
        self.send_raw(&bytes)
    }

    /// Send bytes that are already framed
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(DiscordIpcError::PipeClosed)?;
        transport.write_all(bytes).map_err(DiscordIpcError::from)
    }

    /// Receive the next whole frame, waiting at most `timeout`
    ///
    /// On timeout the bytes of a partly received frame stay buffered and
    /// the connection stays usable.
    pub fn recv(&mut self, timeout: Duration) -> Result<Frame> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 4096];

        loop {
            if let Some(frame) = self.frames.next_frame()? {
                trace!("Received {:?} frame", frame.opcode);
                return Ok(frame);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DiscordIpcError::response_timeout(timeout));
            }

            let transport = self.transport.as_mut().ok_or(DiscordIpcError::PipeClosed)?;
            match transport.read_timeout(&mut chunk, remaining) {
                Ok(0) => return Err(DiscordIpcError::PipeClosed),
                Ok(n) => self.frames.extend(&chunk[..n]),
                Err(err) if is_timeout(&err) => {
                    return Err(DiscordIpcError::response_timeout(timeout))
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Close the connection; calling it again does nothing
    pub fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            debug!("Closing connection to {}", self.endpoint.path.display());
            transport.shutdown();
        }
        self.frames.clear();
    }
}

impl Drop for IpcConnection {
    fn drop(&mut self) {
        self.close();
    }
}
