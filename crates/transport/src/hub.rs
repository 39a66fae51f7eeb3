//! Peer hub
//!
//! Every configured address gets a slot task that keeps one connection alive.
//! Addresses shared through ExchangePublicPeers fill a bounded pool; a slot
//! whose peer closes, gets ignored or reaches its rotation period continues
//! with a random pooled address on the same port.

use crate::address::PeerAddress;
use crate::config::TransportConfig;
use crate::connection::{open, Connection};
use crate::framing::FrameBuffer;
use dashmap::DashMap;
use lrv_client::{NetworkEvent, PacketBuilder, PacketHandler, Peer, Protocol, Transmitter};
use lrv_wire::{Message, MessageType, Packet, ProtocolParams};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Failed,
    Closed,
    Ignored,
    Rotated,
    Shutdown,
}

pub(crate) struct HubInner {
    config: TransportConfig,
    handler: Arc<dyn PacketHandler>,
    connections: DashMap<usize, Arc<Connection>>,
    ignored: Mutex<HashSet<String>>,
    public_peers: Mutex<Vec<String>>,
    shutdown: watch::Sender<bool>,
    next_slot: AtomicUsize,
}

impl HubInner {
    /// Live connections in slot order
    fn connected(&self) -> Vec<Arc<Connection>> {
        let mut connections: Vec<_> = self
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        connections.sort_by_key(|connection| connection.slot());
        connections
    }

    pub(crate) fn transmit_to_all(&self, build: PacketBuilder<'_>) {
        let connections = self.connected();
        let number_of_peers = connections.len();
        for (index, connection) in connections.iter().enumerate() {
            connection.send(build(index, number_of_peers));
        }
    }

    pub(crate) fn broadcast_except(&self, slot: usize, packet: &[u8]) {
        for connection in self.connected() {
            if connection.slot() != slot {
                connection.send(packet.to_vec());
            }
        }
    }

    pub(crate) fn ignore(&self, host: &str) {
        let inserted = self.ignored.lock().insert(host.to_string());
        if inserted {
            self.public_peers.lock().retain(|address| address != host);
            tracing::info!(peer = host, "Peer ignored");
        }
    }

    fn is_ignored(&self, host: &str) -> bool {
        self.ignored.lock().contains(host)
    }

    /// Pool addresses shared by a peer, replacing random entries once full
    fn harvest(&self, addresses: Vec<String>) {
        let mut pool = self.public_peers.lock();
        for address in addresses {
            if self.is_ignored(&address)
                || pool.contains(&address)
                || self.connections.iter().any(|entry| entry.value().host() == address)
            {
                continue;
            }
            if pool.len() >= self.config.max_public_peers {
                if pool.is_empty() {
                    break;
                }
                let index = rand::thread_rng().gen_range(0..pool.len());
                pool[index] = address;
            } else {
                pool.push(address);
            }
        }
    }

    /// Next address for a slot leaving `current`
    fn replacement(&self, current: &PeerAddress) -> PeerAddress {
        let ignored = self.is_ignored(&current.host);
        let mut pool = self.public_peers.lock();
        // Only TCP addresses are exchanged
        if current.protocol == Protocol::Tcp && !ignored && !pool.contains(&current.host) {
            pool.push(current.host.clone());
        }
        if pool.is_empty() || (current.protocol == Protocol::WebSocket && !ignored) {
            return current.clone();
        }
        let index = rand::thread_rng().gen_range(0..pool.len());
        PeerAddress::tcp(pool.swap_remove(index), current.port)
    }

    fn handle(&self, packet: &[u8], connection: &Connection) {
        if packet.get(3) == Some(&(MessageType::ExchangePublicPeers as u8)) {
            // Layout does not depend on the protocol parameters
            if let Ok(Packet {
                message: Message::ExchangePublicPeers(peers),
                ..
            }) = Packet::decode(packet, &ProtocolParams::default())
            {
                self.harvest(peers.to_strings());
            }
        }
        self.handler.handle_packet(packet, connection);
    }
}

async fn run_slot(inner: Arc<HubInner>, slot: usize, mut address: PeerAddress) {
    let mut shutdown = inner.shutdown.subscribe();
    loop {
        if *shutdown.borrow() {
            break;
        }
        let end = if inner.is_ignored(&address.host) {
            SessionEnd::Ignored
        } else {
            session(&inner, slot, &address, &mut shutdown).await
        };

        match end {
            SessionEnd::Shutdown => break,
            SessionEnd::Rotated => {}
            SessionEnd::Failed | SessionEnd::Closed | SessionEnd::Ignored => {
                tokio::select! {
                    _ = tokio::time::sleep(inner.config.reconnect_delay()) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }
        address = inner.replacement(&address);
    }
    inner.connections.remove(&slot);
    tracing::debug!(slot, "Peer slot stopped");
}

async fn session(
    inner: &Arc<HubInner>,
    slot: usize,
    address: &PeerAddress,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut reader, outgoing, send_task) = tokio::select! {
        opened = open(address, inner.config.connect_timeout()) => match opened {
            Ok(opened) => opened,
            Err(error) => {
                tracing::debug!(peer = %address, "Connection failed: {}", error);
                return SessionEnd::Failed;
            }
        },
        _ = shutdown.changed() => return SessionEnd::Shutdown,
    };

    let connection = Arc::new(Connection::new(slot, address, outgoing, Arc::downgrade(inner)));
    inner.connections.insert(slot, connection.clone());
    tracing::info!(peer = %address, slot, "Peer connected");
    inner.handler.on_network(NetworkEvent::Connected {
        address: address.to_string(),
        protocol: address.protocol,
    });

    let rotation = tokio::time::sleep(inner.config.rotation_period());
    tokio::pin!(rotation);
    let mut frames = FrameBuffer::new();

    let end = loop {
        tokio::select! {
            chunk = reader.next_chunk() => match chunk {
                Ok(Some(chunk)) => match frames.push(&chunk) {
                    Ok(packets) => {
                        for packet in packets {
                            if connection.is_ignored() {
                                break;
                            }
                            inner.handle(&packet, &connection);
                        }
                    }
                    Err(error) => {
                        tracing::warn!(peer = %address, "Bad framing: {}", error);
                        connection.ignore();
                    }
                },
                Ok(None) => break SessionEnd::Closed,
                Err(error) => {
                    tracing::debug!(peer = %address, "Read error: {}", error);
                    break SessionEnd::Closed;
                }
            },
            _ = connection.closed.notified() => break SessionEnd::Ignored,
            _ = &mut rotation => break SessionEnd::Rotated,
            _ = shutdown.changed() => break SessionEnd::Shutdown,
        }
    };

    // Cleanup
    send_task.abort();
    inner.connections.remove(&slot);
    tracing::info!(peer = %address, slot, reason = ?end, "Peer disconnected");
    inner.handler.on_network(NetworkEvent::Disconnected {
        address: address.to_string(),
        protocol: address.protocol,
    });
    if end == SessionEnd::Ignored {
        inner.handler.on_network(NetworkEvent::Ignored {
            address: address.to_string(),
        });
    }
    end
}

/// Connection manager handed to the client as its [`Transmitter`]
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Hub {
    pub fn new(config: TransportConfig, handler: Arc<dyn PacketHandler>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(HubInner {
                config,
                handler,
                connections: DashMap::new(),
                ignored: Mutex::new(HashSet::new()),
                public_peers: Mutex::new(Vec::new()),
                shutdown,
                next_slot: AtomicUsize::new(0),
            }),
        }
    }

    /// Start one slot per address
    pub fn connect(&self, addresses: impl IntoIterator<Item = PeerAddress>) -> anyhow::Result<()> {
        let runtime = Handle::try_current()?;
        for address in addresses {
            let slot = self.inner.next_slot.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(peer = %address, slot, "Starting peer slot");
            runtime.spawn(run_slot(self.inner.clone(), slot, address));
        }
        Ok(())
    }

    /// Close every connection and stop the slots
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
    }

    /// Addresses learned from peers and not yet connected
    pub fn public_peers(&self) -> Vec<String> {
        self.inner.public_peers.lock().clone()
    }

    pub fn is_ignored(&self, host: &str) -> bool {
        self.inner.is_ignored(host)
    }
}

impl Transmitter for Hub {
    fn transmit(&self, packet: &[u8]) {
        for connection in self.inner.connected() {
            connection.send(packet.to_vec());
        }
    }

    fn transmit_to_all(&self, build: PacketBuilder<'_>) {
        self.inner.transmit_to_all(build);
    }

    fn number_of_peers(&self) -> usize {
        self.inner.connections.len()
    }
}
