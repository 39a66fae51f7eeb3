//! One live peer connection

use crate::address::PeerAddress;
use crate::hub::HubInner;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use lrv_client::{PacketBuilder, Peer, Protocol};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Outgoing packets queued per connection before new ones are dropped
const OUTGOING_CAPACITY: usize = 1024;
const READ_BUFFER_LENGTH: usize = 64 * 1024;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Read side of a connection
pub(crate) enum Reader {
    Tcp { half: OwnedReadHalf, buffer: Box<[u8]> },
    WebSocket(SplitStream<WsStream>),
}

impl Reader {
    /// Next chunk of bytes, `None` once the peer closed
    pub(crate) async fn next_chunk(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
        match self {
            Reader::Tcp { half, buffer } => {
                let read = half.read(buffer).await?;
                Ok((read > 0).then(|| buffer[..read].to_vec()))
            }
            Reader::WebSocket(stream) => loop {
                match stream.next().await {
                    Some(Ok(Message::Binary(data))) => return Ok(Some(data)),
                    Some(Ok(Message::Close(_))) | None => return Ok(None),
                    Some(Ok(_)) => continue,
                    Some(Err(error)) => return Err(error.into()),
                }
            },
        }
    }
}

/// Open a connection; the returned task drains the sender into the socket
pub(crate) async fn open(
    address: &PeerAddress,
    timeout: Duration,
) -> anyhow::Result<(Reader, mpsc::Sender<Vec<u8>>, JoinHandle<()>)> {
    let (sender, mut outgoing) = mpsc::channel::<Vec<u8>>(OUTGOING_CAPACITY);

    match address.protocol {
        Protocol::Tcp => {
            let stream = tokio::time::timeout(timeout, TcpStream::connect(address.socket_address())).await??;
            stream.set_nodelay(true)?;
            let (half, mut write) = stream.into_split();

            let send_task = tokio::spawn(async move {
                while let Some(packet) = outgoing.recv().await {
                    if write.write_all(&packet).await.is_err() {
                        break;
                    }
                }
            });
            let reader = Reader::Tcp {
                half,
                buffer: vec![0u8; READ_BUFFER_LENGTH].into_boxed_slice(),
            };
            Ok((reader, sender, send_task))
        }
        Protocol::WebSocket => {
            let (ws_stream, _) = tokio::time::timeout(timeout, connect_async(address.url())).await??;
            let (mut ws_sender, ws_receiver) = ws_stream.split();

            let send_task = tokio::spawn(async move {
                while let Some(packet) = outgoing.recv().await {
                    if ws_sender.send(Message::Binary(packet)).await.is_err() {
                        break;
                    }
                }
            });
            Ok((Reader::WebSocket(ws_receiver), sender, send_task))
        }
    }
}

pub(crate) struct Connection {
    slot: usize,
    address: String,
    host: String,
    protocol: Protocol,
    outgoing: mpsc::Sender<Vec<u8>>,
    ignored: AtomicBool,
    /// Wakes the session once the peer is ignored
    pub(crate) closed: Notify,
    hub: Weak<HubInner>,
}

impl Connection {
    pub(crate) fn new(
        slot: usize,
        address: &PeerAddress,
        outgoing: mpsc::Sender<Vec<u8>>,
        hub: Weak<HubInner>,
    ) -> Self {
        Self {
            slot,
            address: address.to_string(),
            host: address.host.clone(),
            protocol: address.protocol,
            outgoing,
            ignored: AtomicBool::new(false),
            closed: Notify::new(),
            hub,
        }
    }

    pub(crate) fn slot(&self) -> usize {
        self.slot
    }

    pub(crate) fn host(&self) -> &str {
        &self.host
    }

    pub(crate) fn is_ignored(&self) -> bool {
        self.ignored.load(Ordering::Acquire)
    }

    /// Queue without waiting; the ledger calls this under its lock
    pub(crate) fn send(&self, packet: Vec<u8>) {
        match self.outgoing.try_send(packet) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(peer = %self.address, "Outgoing queue full, dropping packet");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::trace!(peer = %self.address, "Connection closed, dropping packet");
            }
        }
    }
}

impl Peer for Connection {
    fn address(&self) -> &str {
        &self.address
    }

    fn protocol(&self) -> Protocol {
        self.protocol
    }

    fn transmit(&self, packet: &[u8]) {
        self.send(packet.to_vec());
    }

    fn transmit_to_all(&self, build: PacketBuilder<'_>) {
        if let Some(hub) = self.hub.upgrade() {
            hub.transmit_to_all(build);
        }
    }

    fn ignore(&self) {
        if self.ignored.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(hub) = self.hub.upgrade() {
            hub.ignore(&self.host);
        }
        self.closed.notify_one();
    }

    fn broadcast(&self, packet: &[u8]) {
        if let Some(hub) = self.hub.upgrade() {
            hub.broadcast_except(self.slot, packet);
        }
    }
}
