pub mod codec;
pub mod connection;
pub mod endpoint;
pub mod protocol;

pub use codec::{Frame, FrameBuffer};
pub use connection::{IpcConnection, Transport};
pub use endpoint::{Endpoint, EndpointKind, PipeConfig};
pub use protocol::{
    constants, Command, Event, HandshakePayload, IpcConfig, IpcMessage, Opcode,
};
