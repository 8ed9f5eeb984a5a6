//! A reusable, single-owner client-side WebSocket connection: RFC 6455
//! framing with client-side masking plus the handshake, send/receive, and
//! reconnection operations a session drives from its background task.
//!
//! Non-goals carried from the design: no TLS, no server-side support,
//! no HTTP redirect following, no `permessage-deflate` extension
//! negotiation.

#![deny(unsafe_code)]

pub mod client;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod transport;

#[cfg(feature = "test-util")]
pub mod mock {
    pub use crate::transport::mock::MockTransport;
}

pub use client::{ConnState, ConnectableFresh, WsClient};
pub use frame::{Frame, Opcode};
