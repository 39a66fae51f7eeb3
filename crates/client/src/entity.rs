//! Tracked entities

use crate::events::{BidSummary, EntityEvent, TransferEvent};
use lrv_wire::{
    contract_index, digest_to_string, public_key_to_identity, signature_to_string, Crypto, Digest,
    EntityResponse, PublicKey, Transaction,
};
use std::collections::BTreeMap;
use tokio::sync::broadcast;

/// Account fields proven against a confirmed spectrum digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityState {
    pub incoming_amount: u64,
    pub outgoing_amount: u64,
    pub number_of_incoming_transfers: u32,
    pub number_of_outgoing_transfers: u32,
    pub latest_incoming_transfer_tick: u32,
    pub latest_outgoing_transfer_tick: u32,
    pub tick: u32,
    pub epoch: u16,
    pub timestamp: String,
    pub siblings: Vec<Digest>,
    pub spectrum_index: u32,
    pub spectrum_digest: Digest,
    /// Digest of the spectrum leaf
    pub digest: Digest,
}

impl EntityState {
    pub fn energy(&self) -> i128 {
        i128::from(self.incoming_amount) - i128::from(self.outgoing_amount)
    }
}

/// A subscribed entity
#[derive(Debug)]
pub struct Entity {
    pub id: String,
    pub public_key: PublicKey,
    /// `None` until a proof has been verified
    pub state: Option<EntityState>,
    /// The single outstanding outgoing transaction
    pub pending: Option<Transaction>,
    /// Execution tick notifications of the owning wallet
    pub(crate) wallet: Option<broadcast::Sender<u32>>,
}

impl Entity {
    pub fn new(id: String, public_key: PublicKey) -> Self {
        Self {
            id,
            public_key,
            state: None,
            pending: None,
            wallet: None,
        }
    }

    pub fn is_owned(&self) -> bool {
        self.wallet.is_some()
    }

    /// Last tick this entity was reconciled at, zero before the first proof
    pub fn tick(&self) -> u32 {
        self.state.as_ref().map_or(0, |state| state.tick)
    }

    pub fn energy(&self) -> Option<i128> {
        self.state.as_ref().map(EntityState::energy)
    }

    pub(crate) fn apply(
        &mut self,
        crypto: &dyn Crypto,
        response: &EntityResponse,
        tick: u32,
        epoch: u16,
        timestamp: &str,
        spectrum_digest: Digest,
    ) {
        self.state = Some(EntityState {
            incoming_amount: response.incoming_amount,
            outgoing_amount: response.outgoing_amount,
            number_of_incoming_transfers: response.number_of_incoming_transfers,
            number_of_outgoing_transfers: response.number_of_outgoing_transfers,
            latest_incoming_transfer_tick: response.latest_incoming_transfer_tick,
            latest_outgoing_transfer_tick: response.latest_outgoing_transfer_tick,
            tick,
            epoch,
            timestamp: timestamp.to_string(),
            siblings: response.siblings.clone(),
            spectrum_index: response.spectrum_index.unsigned_abs(),
            spectrum_digest,
            digest: crypto.digest(&response.leaf()),
        });
    }

    pub(crate) fn to_event(&self, outgoing_transaction: Option<TransferEvent>) -> Option<EntityEvent> {
        let state = self.state.as_ref()?;
        Some(EntityEvent {
            id: self.id.clone(),
            energy: state.energy(),
            incoming_amount: state.incoming_amount,
            outgoing_amount: state.outgoing_amount,
            number_of_incoming_transfers: state.number_of_incoming_transfers,
            number_of_outgoing_transfers: state.number_of_outgoing_transfers,
            latest_incoming_transfer_tick: state.latest_incoming_transfer_tick,
            latest_outgoing_transfer_tick: state.latest_outgoing_transfer_tick,
            tick: state.tick,
            epoch: state.epoch,
            timestamp: state.timestamp.clone(),
            digest: digest_to_string(&state.digest),
            siblings: state.siblings.iter().map(digest_to_string).collect(),
            spectrum_index: state.spectrum_index,
            spectrum_digest: digest_to_string(&state.spectrum_digest),
            outgoing_transaction,
        })
    }
}

/// Describe a transaction for `transfer` and `entity` events
pub(crate) fn transfer_event(crypto: &dyn Crypto, transaction: &Transaction, executed: bool) -> TransferEvent {
    let header = transaction.header();
    TransferEvent {
        source: public_key_to_identity(crypto, &header.source),
        destination: public_key_to_identity(crypto, &header.destination),
        amount: header.amount,
        tick: header.tick,
        input_type: header.input_type,
        digest: digest_to_string(&transaction.digest(crypto)),
        signature: signature_to_string(transaction.signature()),
        contract_ipo_bid: transaction.bid().map(|bid| BidSummary {
            price: bid.price,
            quantity: bid.quantity,
            amount: bid.total(),
        }),
        executed_contract_index: contract_index(&header.destination),
        executed,
    }
}

/// Subscribed entities keyed by public key
#[derive(Debug, Default)]
pub struct EntityTable {
    entities: BTreeMap<PublicKey, Entity>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an entity; returns false if it already was
    pub fn subscribe(&mut self, id: String, public_key: PublicKey) -> bool {
        if self.entities.contains_key(&public_key) {
            return false;
        }
        self.entities.insert(public_key, Entity::new(id, public_key));
        true
    }

    /// Stop tracking unless a wallet owns the entity
    pub fn unsubscribe(&mut self, public_key: &PublicKey) -> bool {
        match self.entities.get(public_key) {
            Some(entity) if !entity.is_owned() => {
                self.entities.remove(public_key);
                true
            }
            _ => false,
        }
    }

    /// Remove regardless of ownership
    pub(crate) fn remove(&mut self, public_key: &PublicKey) -> Option<Entity> {
        self.entities.remove(public_key)
    }

    pub fn get(&self, public_key: &PublicKey) -> Option<&Entity> {
        self.entities.get(public_key)
    }

    pub(crate) fn get_mut(&mut self, public_key: &PublicKey) -> Option<&mut Entity> {
        self.entities.get_mut(public_key)
    }

    pub(crate) fn entry(&mut self, id: String, public_key: PublicKey) -> &mut Entity {
        self.entities
            .entry(public_key)
            .or_insert_with(|| Entity::new(id, public_key))
    }

    pub fn contains(&self, public_key: &PublicKey) -> bool {
        self.entities.contains_key(public_key)
    }

    pub fn public_keys(&self) -> Vec<PublicKey> {
        self.entities.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
