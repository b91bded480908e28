//! A scripted stand-in for the Discord client, listening on a Unix socket
#![allow(dead_code)]

use presence_ipc::{IpcConfig, PipeConfig};
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::thread::{self, JoinHandle};

pub const HANDSHAKE: u32 = 0;
pub const FRAME: u32 = 1;
pub const CLOSE: u32 = 2;
pub const PING: u32 = 3;
pub const PONG: u32 = 4;

pub struct FakeDiscord {
    // keeps the socket directory alive for the duration of the test
    _dir: tempfile::TempDir,
    pub config: IpcConfig,
    handle: JoinHandle<()>,
}

impl FakeDiscord {
    /// Bind a socket in a fresh directory and run `script` against it
    pub fn spawn<F>(script: F) -> Self
    where
        F: FnOnce(UnixListener) + Send + 'static,
    {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("discord-ipc-0");
        let listener = UnixListener::bind(&path).expect("bind fake discord socket");
        let config = IpcConfig::fast_connect()
            .with_pipe(PipeConfig::CustomPath(path.to_string_lossy().into_owned()))
            .with_response_timeout(2_000);

        Self {
            _dir: dir,
            config,
            handle: thread::spawn(move || script(listener)),
        }
    }

    /// Wait for the script to finish, surfacing its assertion failures
    pub fn finish(self) {
        if let Err(panic) = self.handle.join() {
            std::panic::resume_unwind(panic);
        }
    }
}

pub fn frame_bytes(opcode: u32, body: &Value) -> Vec<u8> {
    let body = serde_json::to_vec(body).expect("serialize body");
    let mut bytes = Vec::with_capacity(8 + body.len());
    bytes.extend_from_slice(&opcode.to_le_bytes());
    bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&body);
    bytes
}

pub fn read_frame(stream: &mut UnixStream) -> (u32, Value) {
    let mut header = [0u8; 8];
    stream.read_exact(&mut header).expect("read header");
    let opcode = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let length = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    let mut body = vec![0u8; length];
    stream.read_exact(&mut body).expect("read body");
    (opcode, serde_json::from_slice(&body).expect("body is json"))
}

pub fn write_frame(stream: &mut UnixStream, opcode: u32, body: &Value) {
    stream
        .write_all(&frame_bytes(opcode, body))
        .expect("write frame");
}

/// Accept one client, check its handshake and answer with READY
pub fn accept_ready(listener: &UnixListener) -> UnixStream {
    let (mut stream, _) = listener.accept().expect("accept");
    let (opcode, handshake) = read_frame(&mut stream);
    assert_eq!(opcode, HANDSHAKE);
    assert_eq!(handshake["v"], 1);
    assert_eq!(handshake["client_id"], "1234");

    write_frame(
        &mut stream,
        FRAME,
        &json!({
            "cmd": "DISPATCH",
            "evt": "READY",
            "nonce": null,
            "data": {"v": 1, "user": {"id": "42", "username": "tester"}}
        }),
    );
    stream
}

/// Read the next command, asserting its name
pub fn expect_command(stream: &mut UnixStream, cmd: &str) -> Value {
    let (opcode, request) = read_frame(stream);
    assert_eq!(opcode, FRAME);
    assert_eq!(request["cmd"], cmd);
    request
}

/// Answer `request` with `data`, echoing its nonce
pub fn reply(stream: &mut UnixStream, request: &Value, data: Value) {
    write_frame(
        stream,
        FRAME,
        &json!({
            "cmd": request["cmd"],
            "evt": null,
            "nonce": request["nonce"],
            "data": data
        }),
    );
}

pub fn dispatch(stream: &mut UnixStream, evt: &str, data: Value) {
    write_frame(
        stream,
        FRAME,
        &json!({"cmd": "DISPATCH", "evt": evt, "nonce": null, "data": data}),
    );
}

/// Block until the client hangs up
pub fn wait_for_hangup(stream: &mut UnixStream) {
    let mut buf = [0u8; 256];
    while matches!(stream.read(&mut buf), Ok(n) if n > 0) {}
}
