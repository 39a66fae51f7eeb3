//! Owned entities
//!
//! A wallet is a handle on one tracked entity whose outgoing transactions the
//! client persists and follows. Signing happens outside the client; wallets
//! only accept transactions that already carry the owner's signature.

use crate::client::LightClient;
use crate::entity::EntityState;
use crate::error::ClientError;
use lrv_wire::{Message, Packet, PublicKey, Transaction};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};

pub struct Wallet {
    id: String,
    public_key: PublicKey,
    client: LightClient,
    /// Serializes submission and removal
    transaction_lock: tokio::sync::Mutex<()>,
    /// One waiter per notification
    execution_lock: tokio::sync::Mutex<()>,
    execution_ticks: Mutex<broadcast::Receiver<u32>>,
}

impl Wallet {
    pub(crate) fn new(
        id: String,
        public_key: PublicKey,
        client: LightClient,
        execution_ticks: broadcast::Receiver<u32>,
    ) -> Self {
        Self {
            id,
            public_key,
            client,
            transaction_lock: tokio::sync::Mutex::new(()),
            execution_lock: tokio::sync::Mutex::new(()),
            execution_ticks: Mutex::new(execution_ticks),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Latest verified state, `None` until the first proof
    pub fn state(&self) -> Option<EntityState> {
        self.client
            .ledger()
            .entities()
            .get(&self.public_key)
            .and_then(|entity| entity.state.clone())
    }

    pub fn pending_transaction(&self) -> Option<Transaction> {
        self.client.ledger().pending_transaction(&self.public_key)
    }

    /// Validate, persist and publish a signed transaction
    pub async fn submit_transaction(&self, transaction: Transaction) -> Result<(), ClientError> {
        let _guard = self.transaction_lock.lock().await;
        self.client
            .ledger()
            .submit_transaction(&self.public_key, transaction.clone())?;
        self.client
            .transmit(&Packet::broadcast(Message::BroadcastTransaction(transaction)).encode());
        Ok(())
    }

    /// Delete an archived transaction from the store
    pub async fn remove_transaction(&self, tick: u32) -> Result<(), ClientError> {
        let _guard = self.transaction_lock.lock().await;
        self.client.ledger().remove_transaction(&self.public_key, tick)
    }

    /// Publish the pending transaction again, once per tick across the
    /// publication offset. Returns false when there is nothing worth sending.
    pub fn broadcast_transaction(&self) -> bool {
        let (pending, system_tick) = {
            let ledger = self.client.ledger();
            (ledger.pending_transaction(&self.public_key), ledger.system_tick())
        };
        let config = self.client.config();
        let offset = config.publication_offset;
        let Some(transaction) = pending.filter(|tx| tx.tick() > system_tick.saturating_add(offset)) else {
            return false;
        };

        let packet = Packet::broadcast(Message::BroadcastTransaction(transaction)).encode();
        let period = config.target_tick_duration();
        match Handle::try_current() {
            Ok(runtime) => {
                let client = self.client.clone();
                runtime.spawn(async move {
                    for attempt in 0..=offset {
                        if attempt > 0 {
                            tokio::time::sleep(period).await;
                        }
                        client.transmit(&packet);
                    }
                });
            }
            Err(_) => self.client.transmit(&packet),
        }
        true
    }

    /// Wait for the next execution tick announced for this wallet
    pub async fn execution_tick(&self) -> Result<u32, ClientError> {
        let _guard = self.execution_lock.lock().await;
        let mut receiver = self.execution_ticks.lock().resubscribe();
        loop {
            match receiver.recv().await {
                Ok(tick) => return Ok(tick),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(wallet = %self.id, skipped, "Execution tick notifications lagged");
                }
                Err(RecvError::Closed) => return Err(ClientError::Closed),
            }
        }
    }

    /// Stop owning the entity; pending waiters see [`ClientError::Closed`]
    pub fn release(self) {
        self.client.ledger().release_wallet(&self.public_key);
        tracing::info!(wallet = %self.id, "Wallet released");
    }
}
