//! Peer transport for the light client
//!
//! A hub keeps a fixed number of peer slots connected over TCP or WebSocket.
//! Each slot reads length-framed packets into the client, queues outgoing
//! bytes on its own writer task and moves on to an address from the exchanged
//! peer pool when the connection drops, is ignored or is rotated.

pub mod address;
pub mod config;
pub mod framing;
pub mod hub;

mod connection;

pub use address::PeerAddress;
pub use config::{TransportConfig, CORE_PORT};
pub use framing::FrameBuffer;
pub use hub::Hub;
