//! Light client facade
//!
//! Wraps the ledger in the coordinator lock, turns handler directives into
//! poller changes and hands out wallets. Cloning is cheap; every clone drives
//! the same state.

use crate::config::ClientConfig;
use crate::entity::EntityState;
use crate::error::ClientError;
use crate::events::{ClientEvent, NetworkEvent};
use crate::ledger::{proof_requests, split_vote_flags, Directive, Ledger};
use crate::peer::{Disconnected, PacketHandler, Peer, Transmitter};
use crate::poller::Poller;
use crate::store::TransactionStore;
use crate::wallet::Wallet;
use lrv_consensus::{Clock, ConfirmedTick, SystemClock};
use lrv_wire::{identity_to_public_key, Crypto, Message, Packet, PublicKey, Transaction, WireError};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::{self, error::RecvError};

/// Events buffered per subscriber before the slowest starts lagging
const EVENT_CAPACITY: usize = 4096;

struct Inner {
    config: ClientConfig,
    crypto: Arc<dyn Crypto>,
    ledger: Mutex<Ledger>,
    transmitter: RwLock<Arc<dyn Transmitter>>,
    events: broadcast::Sender<ClientEvent>,
    tick_info_poller: Poller,
    quorum_poller: Poller,
}

impl Inner {
    fn transmitter(&self) -> Arc<dyn Transmitter> {
        self.transmitter.read().clone()
    }

    fn request_tick_info(&self) {
        self.transmitter()
            .transmit_to_all(&mut |_, _| Packet::request(Message::RequestCurrentTickInfo).encode());
    }

    fn request_quorum_ticks(&self, hint: u32) {
        let requests = self.ledger.lock().quorum_requests(hint);
        let transmitter = self.transmitter();
        let params = self.config.protocol;
        for request in &requests {
            transmitter.transmit_to_all(&mut |index, number_of_peers| {
                let request = split_vote_flags(request, index, number_of_peers, &params);
                Packet::request(Message::RequestQuorumTick(request)).encode()
            });
        }
    }

    fn request_proofs(&self, public_key: &PublicKey) {
        let transmitter = self.transmitter();
        for message in proof_requests(public_key) {
            transmitter.transmit_to_all(&mut |_, _| Packet::request(message.clone()).encode());
        }
    }
}

#[derive(Clone)]
pub struct LightClient {
    inner: Arc<Inner>,
}

impl LightClient {
    pub fn new(
        config: ClientConfig,
        crypto: Arc<dyn Crypto>,
        store: Arc<dyn TransactionStore>,
    ) -> Result<Self, ClientError> {
        Self::with_clock(config, crypto, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: ClientConfig,
        crypto: Arc<dyn Crypto>,
        store: Arc<dyn TransactionStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ClientError> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let ledger = Ledger::new(config.clone(), crypto.clone(), clock, store, events.clone())?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                crypto,
                ledger: Mutex::new(ledger),
                transmitter: RwLock::new(Arc::new(Disconnected)),
                events,
                tick_info_poller: Poller::new("tick-info"),
                quorum_poller: Poller::new("quorum-tick"),
            }),
        })
    }

    /// Route outgoing requests through `transmitter`
    pub fn attach(&self, transmitter: Arc<dyn Transmitter>) {
        *self.inner.transmitter.write() = transmitter;
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.inner.ledger.lock()
    }

    pub(crate) fn transmit(&self, packet: &[u8]) {
        self.inner.transmitter().transmit(packet);
    }

    fn apply(&self, directives: Vec<Directive>) {
        let period = self.inner.config.target_tick_duration();
        for directive in directives {
            match directive {
                Directive::StartTickInfoPolling => {
                    let inner = Arc::downgrade(&self.inner);
                    self.inner.tick_info_poller.start(period, move || {
                        if let Some(inner) = Weak::upgrade(&inner) {
                            inner.request_tick_info();
                        }
                    });
                }
                Directive::StopTickInfoPolling => self.inner.tick_info_poller.stop(),
                Directive::PollQuorumTicks(hint) => {
                    let inner = Arc::downgrade(&self.inner);
                    self.inner.quorum_poller.start(period, move || {
                        if let Some(inner) = Weak::upgrade(&inner) {
                            inner.request_quorum_ticks(hint);
                        }
                    });
                }
                Directive::StopQuorumPolling => self.inner.quorum_poller.stop(),
            }
        }
    }

    /// Track an entity by identity; returns false if it already was
    pub fn subscribe(&self, identity: &str) -> Result<bool, ClientError> {
        let public_key = identity_to_public_key(self.inner.crypto.as_ref(), identity)?;
        let subscribed = self.ledger().subscribe(public_key);
        if subscribed {
            self.inner.request_proofs(&public_key);
        }
        Ok(subscribed)
    }

    /// Stop tracking an entity; wallet-owned entities stay
    pub fn unsubscribe(&self, identity: &str) -> Result<bool, ClientError> {
        let public_key = identity_to_public_key(self.inner.crypto.as_ref(), identity)?;
        Ok(self.ledger().unsubscribe(&public_key))
    }

    pub fn entity(&self, identity: &str) -> Result<Option<EntityState>, ClientError> {
        let public_key = identity_to_public_key(self.inner.crypto.as_ref(), identity)?;
        Ok(self
            .ledger()
            .entities()
            .get(&public_key)
            .and_then(|entity| entity.state.clone()))
    }

    /// Own the entity of `private_key`. The key is only used to derive the
    /// public key.
    pub fn create_wallet(&self, private_key: &[u8; 32]) -> Result<Wallet, ClientError> {
        let public_key = self.inner.crypto.public_key(private_key);
        let (id, execution_ticks) = self.ledger().create_wallet(public_key)?;
        self.inner.request_proofs(&public_key);
        Ok(Wallet::new(id, public_key, self.clone(), execution_ticks))
    }

    /// Latest confirmed tick, zero until synchronized
    pub fn tick(&self) -> u32 {
        self.ledger().system_tick()
    }

    pub fn epoch(&self) -> Option<u16> {
        self.ledger().epochs().current_epoch()
    }

    pub fn latest_tick(&self) -> Option<ConfirmedTick> {
        self.ledger().tracker().latest().cloned()
    }

    pub fn is_poisoned(&self) -> bool {
        self.ledger().epochs().is_poisoned()
    }

    /// Earliest tick a transaction published now can make; waits for the
    /// first confirmed tick
    pub async fn execution_tick(&self) -> Result<u32, ClientError> {
        let mut events = self.subscribe_events();
        loop {
            if let Some(tick) = self.ledger().execution_tick() {
                return Ok(tick);
            }
            match events.recv().await {
                Err(RecvError::Closed) => return Err(ClientError::Closed),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
            }
        }
    }

    /// Publish a signed transaction of an entity not owned by a wallet
    pub fn broadcast_transaction(&self, transaction: &Transaction) -> Result<(), ClientError> {
        if !transaction.verify(self.inner.crypto.as_ref()) {
            return Err(ClientError::InvalidSignature);
        }
        let system_tick = self.tick();
        if system_tick == 0 {
            return Err(ClientError::NotSynchronized);
        }
        let earliest = system_tick
            .saturating_add(self.inner.config.publication_offset)
            .saturating_add(1);
        if transaction.tick() < earliest {
            return Err(ClientError::TickTooEarly {
                tick: transaction.tick(),
                execution_tick: earliest,
            });
        }
        self.transmit(&Packet::broadcast(Message::BroadcastTransaction(transaction.clone())).encode());
        Ok(())
    }

    /// Stop polling and detach from the transport
    pub fn shutdown(&self) {
        self.inner.tick_info_poller.stop();
        self.inner.quorum_poller.stop();
        self.attach(Arc::new(Disconnected));
        tracing::info!("Light client stopped");
    }
}

impl PacketHandler for LightClient {
    fn handle_packet(&self, packet: &[u8], peer: &dyn Peer) {
        let packet = match Packet::decode(packet, &self.inner.config.protocol) {
            Ok(packet) => packet,
            // Types this client does not follow
            Err(WireError::UnknownType(message_type)) => {
                tracing::trace!(peer = peer.address(), message_type, "Skipping packet");
                return;
            }
            Err(error) => {
                tracing::debug!(peer = peer.address(), "Malformed packet: {}", error);
                peer.ignore();
                return;
            }
        };
        let directives = self.ledger().handle(packet, peer);
        self.apply(directives);
    }

    fn on_network(&self, event: NetworkEvent) {
        let _ = self.inner.events.send(ClientEvent::Network(event));
    }
}
