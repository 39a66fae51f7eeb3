//! Seams to the transport layer

use crate::events::NetworkEvent;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    WebSocket,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::WebSocket => write!(f, "ws"),
        }
    }
}

/// Builds one packet per connected peer from (peer index, number of peers)
pub type PacketBuilder<'a> = &'a mut dyn FnMut(usize, usize) -> Vec<u8>;

/// Fan-out over every connected peer
pub trait Transmitter: Send + Sync {
    /// Send the same bytes to every connected peer
    fn transmit(&self, packet: &[u8]);

    /// Send a per-peer packet to every connected peer
    fn transmit_to_all(&self, build: PacketBuilder<'_>);

    fn number_of_peers(&self) -> usize;
}

/// The connection a packet arrived on
pub trait Peer: Send + Sync {
    fn address(&self) -> &str;

    fn protocol(&self) -> Protocol;

    /// Send to this peer only
    fn transmit(&self, packet: &[u8]);

    /// Send a per-peer packet to every connected peer
    fn transmit_to_all(&self, build: PacketBuilder<'_>);

    /// Answer a request from this peer
    fn reply(&self, packet: &[u8]) {
        self.transmit(packet);
    }

    /// Drop this peer and refuse it from now on
    fn ignore(&self);

    /// Relay to every connected peer except this one
    fn broadcast(&self, packet: &[u8]);
}

/// Receiver of everything the transport reads
pub trait PacketHandler: Send + Sync {
    /// One complete packet read from `peer`
    fn handle_packet(&self, packet: &[u8], peer: &dyn Peer);

    fn on_network(&self, event: NetworkEvent);
}

/// Transmitter with no connections, for clients driven by hand
#[derive(Debug, Default, Clone, Copy)]
pub struct Disconnected;

impl Transmitter for Disconnected {
    fn transmit(&self, _packet: &[u8]) {}

    fn transmit_to_all(&self, _build: PacketBuilder<'_>) {}

    fn number_of_peers(&self) -> usize {
        0
    }
}
