// htp1-api: WebSocket transport and wire protocol for the Monoprice HTP-1

pub mod error;
pub mod mso;
pub mod protocol;
pub mod transport;

pub use error::Error;
pub use protocol::{Inbound, PatchOp, Request};
pub use transport::{
    ConnectionStatus, Outbox, ReconnectConfig, SessionHandler, SessionOptions, Transport,
};
