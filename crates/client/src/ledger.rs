//! Ledger state and packet dispatch
//!
//! The ledger owns every piece of mutable client state: committees, votes,
//! confirmed ticks, tracked entities and assets, and the buffered proofs. The
//! client keeps it behind one mutex. Each handler runs to completion under
//! that lock and returns the timer changes to apply once it is released.

use crate::asset::{AssetProof, AssetTable};
use crate::config::ClientConfig;
use crate::entity::{Entity, EntityTable};
use crate::error::ClientError;
use crate::events::{ClientEvent, EpochEvent, TickEvent, TickStats};
use crate::peer::Peer;
use crate::reconciler::{ReconcileContext, Reconciler};
use crate::store::TransactionStore;
use chrono::{DateTime, Utc};
use lrv_consensus::{
    infer_epoch, is_valid_tick_time, Clock, CommitteeOutcome, ConfirmedTick, EpochManager,
    QuorumTracker, VoteAdmission,
};
use lrv_wire::{
    digest_to_string, public_key_to_identity, resource_digest_to_string, signature_to_string,
    Committee, Crypto, CurrentTickInfo, Message, Packet, ProtocolParams, PublicKey,
    QuorumTickRequest, TickVote, Transaction, MAX_AMOUNT,
};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of each wallet's execution tick channel
const EXECUTION_TICK_CAPACITY: usize = 16;

/// Timer changes requested by a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    StartTickInfoPolling,
    StopTickInfoPolling,
    /// (Re)start quorum tick polling around a tick hint
    PollQuorumTicks(u32),
    StopQuorumPolling,
}

#[derive(Debug, Default)]
struct SystemState {
    /// Latest confirmed tick, zero before the first confirmation
    tick: u32,
    /// First tick confirmed since startup
    initial_tick: u32,
}

#[derive(Debug, Default)]
struct Stats {
    startup: Option<DateTime<Utc>>,
    latest_confirmation: Option<DateTime<Utc>>,
    average_tick_duration_ms: u64,
    updated_entities: usize,
    cleared_transactions: usize,
}

#[derive(Debug, Default)]
struct Polling {
    tick_info: bool,
    quorum_hint: Option<u32>,
}

pub struct Ledger {
    config: ClientConfig,
    crypto: Arc<dyn Crypto>,
    clock: Arc<dyn Clock>,
    store: Arc<dyn TransactionStore>,
    events: broadcast::Sender<ClientEvent>,
    epochs: EpochManager,
    tracker: QuorumTracker,
    entities: EntityTable,
    assets: AssetTable,
    reconciler: Reconciler,
    system: SystemState,
    stats: Stats,
    current_tick_info: Option<CurrentTickInfo>,
    polling: Polling,
}

impl Ledger {
    pub fn new(
        config: ClientConfig,
        crypto: Arc<dyn Crypto>,
        clock: Arc<dyn Clock>,
        store: Arc<dyn TransactionStore>,
        events: broadcast::Sender<ClientEvent>,
    ) -> Result<Self, ClientError> {
        let anchor = config.trust_anchor.resolve(crypto.as_ref())?;
        let epochs = EpochManager::new(config.protocol, anchor, config.min_vouchers());
        let tracker = QuorumTracker::new(config.protocol, config.number_of_stored_ticks);

        Ok(Self {
            config,
            crypto,
            clock,
            store,
            events,
            epochs,
            tracker,
            entities: EntityTable::new(),
            assets: AssetTable::new(),
            reconciler: Reconciler::new(),
            system: SystemState::default(),
            stats: Stats::default(),
            current_tick_info: None,
            polling: Polling::default(),
        })
    }

    fn params(&self) -> &ProtocolParams {
        &self.config.protocol
    }

    fn emit(&self, event: ClientEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    /// Latest confirmed tick, zero until the first confirmation
    pub fn system_tick(&self) -> u32 {
        self.system.tick
    }

    pub fn epochs(&self) -> &EpochManager {
        &self.epochs
    }

    pub fn tracker(&self) -> &QuorumTracker {
        &self.tracker
    }

    pub fn entities(&self) -> &EntityTable {
        &self.entities
    }

    pub fn assets(&self) -> &AssetTable {
        &self.assets
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn average_tick_duration_ms(&self) -> u64 {
        self.stats.average_tick_duration_ms
    }

    /// Earliest tick a transaction published now can still make
    pub fn execution_tick(&self) -> Option<u32> {
        (self.system.tick > 0).then(|| self.execution_tick_after(self.system.tick))
    }

    fn execution_tick_after(&self, tick: u32) -> u32 {
        let target = self.config.target_tick_duration_ms.max(1);
        let lag = u32::try_from(self.stats.average_tick_duration_ms.div_ceil(target)).unwrap_or(u32::MAX);
        tick.saturating_add(self.config.publication_offset)
            .saturating_add(lag)
            .saturating_add(1)
    }

    /// Dispatch one decoded packet
    pub fn handle(&mut self, packet: Packet, peer: &dyn Peer) -> Vec<Directive> {
        let nonce = packet.nonce;
        match packet.message {
            Message::ExchangePublicPeers(_) => {
                peer.transmit(&Packet::request(Message::RequestComputors).encode());
                Vec::new()
            }
            Message::BroadcastComputors(committee) => self.handle_committee(committee, peer),
            Message::BroadcastTick(vote) => self.handle_vote(vote, peer),
            Message::RequestComputors => {
                self.serve_committee(nonce, peer);
                Vec::new()
            }
            Message::RequestQuorumTick(request) => {
                self.serve_quorum_tick(nonce, &request, peer);
                Vec::new()
            }
            Message::BroadcastTransaction(transaction) => {
                self.relay_transaction(nonce, transaction, peer);
                Vec::new()
            }
            Message::RequestCurrentTickInfo => {
                self.serve_tick_info(nonce, peer);
                Vec::new()
            }
            Message::RespondCurrentTickInfo(info) => self.handle_tick_info(info, peer),
            Message::RespondEntity(response) => {
                let tick = response.tick;
                if response.spectrum_index < 0 || !self.accepts_proof(Some(&response.public_key), tick) {
                    return Vec::new();
                }
                self.reconciler.buffer_entity(response);
                self.reconcile_late(tick);
                Vec::new()
            }
            Message::RespondIssuedAssets(response) => self.handle_asset_proof(AssetProof::Issued(response)),
            Message::RespondOwnedAssets(response) => self.handle_asset_proof(AssetProof::Owned(response)),
            // Not proxied
            Message::RequestEntity(_) | Message::RequestIssuedAssets(_) | Message::RequestOwnedAssets(_) => {
                Vec::new()
            }
        }
    }

    fn handle_committee(&mut self, committee: Committee, peer: &dyn Peer) -> Vec<Directive> {
        let mut directives = Vec::new();
        let inferred_epoch = infer_epoch(self.clock.now());
        let bootstrapping = self.epochs.current_epoch().is_none() && !self.epochs.is_poisoned();

        match self
            .epochs
            .handle_committee(&committee, peer.address(), inferred_epoch, self.crypto.as_ref())
        {
            Ok(CommitteeOutcome::Rejected(rejection)) => {
                tracing::warn!(peer = peer.address(), ?rejection, "Rejected committee");
                peer.ignore();
                return directives;
            }
            Ok(CommitteeOutcome::Advanced { .. }) => self.emit_epoch(),
            Ok(_) => {
                if bootstrapping && self.epochs.current_epoch().is_some() {
                    self.emit_epoch();
                }
            }
            Err(error) => {
                self.emit(ClientEvent::Error(error.to_string()));
                self.polling = Polling::default();
                directives.push(Directive::StopTickInfoPolling);
                directives.push(Directive::StopQuorumPolling);
                return directives;
            }
        }

        if let Some(current) = self.epochs.current_epoch() {
            if committee.epoch >= current && !self.polling.tick_info {
                self.polling.tick_info = true;
                directives.push(Directive::StartTickInfoPolling);
            }
        }
        directives
    }

    fn emit_epoch(&self) {
        let crypto = self.crypto.as_ref();
        if let Some(record) = self.epochs.active() {
            self.emit(ClientEvent::Epoch(EpochEvent {
                epoch: record.epoch,
                computors: record
                    .public_keys
                    .iter()
                    .map(|key| public_key_to_identity(crypto, key))
                    .collect(),
                digest: digest_to_string(&record.digest),
                signature: signature_to_string(&record.signature),
            }));
        }
    }

    fn handle_vote(&mut self, vote: TickVote, peer: &dyn Peer) -> Vec<Directive> {
        let mut directives = Vec::new();
        let Some(epoch) = self.epochs.current_epoch() else {
            return directives;
        };
        if vote.epoch != epoch || vote.epoch != infer_epoch(self.clock.now()) || vote.tick <= self.system.tick {
            return directives;
        }

        let index = usize::from(vote.computor_index);
        if self.epochs.is_faulty(epoch, index) {
            return directives;
        }

        let crypto = self.crypto.as_ref();
        let public_key = match self.epochs.active().and_then(|record| record.public_key(index)) {
            Some(key) if *key != [0u8; 32] => *key,
            _ => {
                tracing::debug!(peer = peer.address(), index, "Vote from unknown computor");
                peer.ignore();
                return directives;
            }
        };
        if !is_valid_tick_time(&vote.time)
            || !crypto.verify(&public_key, &vote.signing_digest(crypto), &vote.signature)
        {
            tracing::debug!(peer = peer.address(), tick = vote.tick, index, "Invalid vote");
            peer.ignore();
            return directives;
        }

        let tick = vote.tick;
        match self.tracker.insert_vote(vote, public_key) {
            VoteAdmission::Stored => {
                for confirmed in self.tracker.confirm_around(crypto, tick) {
                    directives.extend(self.on_confirmed(confirmed));
                }
            }
            VoteAdmission::Duplicate => {}
            VoteAdmission::Conflicting => {
                if self.epochs.mark_faulty(epoch, index) {
                    tracing::warn!(epoch, tick, index, peer = peer.address(), "Computor cast conflicting votes");
                }
                peer.ignore();
            }
        }
        directives
    }

    fn on_confirmed(&mut self, confirmed: ConfirmedTick) -> Vec<Directive> {
        let mut directives = Vec::new();
        let now = self.clock.now();
        let tick = confirmed.tick();
        let previous = self.system.tick;

        self.system.tick = tick;
        if self.system.initial_tick == 0 {
            self.system.initial_tick = tick;
        }
        let startup = *self.stats.startup.get_or_insert(now);
        let elapsed_ticks = u64::from(tick - self.system.initial_tick);
        self.stats.average_tick_duration_ms = if elapsed_ticks == 0 {
            self.config.target_tick_duration_ms
        } else {
            let elapsed_ms = u64::try_from((now - startup).num_milliseconds()).unwrap_or(0);
            elapsed_ms.div_ceil(elapsed_ticks)
        };

        let digests = &confirmed.digests;
        self.emit(ClientEvent::Tick(TickEvent {
            tick,
            epoch: confirmed.epoch(),
            timestamp: confirmed.quorum.timestamp.clone(),
            resource_testing_digest: resource_digest_to_string(&digests.resource_testing),
            spectrum_digest: digest_to_string(&digests.spectrum),
            universe_digest: digest_to_string(&digests.universe),
            computer_digest: digest_to_string(&digests.computer),
            transaction_digest: digest_to_string(&confirmed.quorum.transaction_digest),
            computor_indices: confirmed.quorum.computor_indices.clone(),
        }));

        let execution_tick = self.execution_tick_after(tick);
        let context = ReconcileContext {
            crypto: self.crypto.as_ref(),
            store: self.store.as_ref(),
            confirmed: &confirmed,
            system_tick: tick,
            execution_tick,
        };
        let reconciliation = self.reconciler.reconcile(&context, &mut self.entities, &mut self.assets);
        self.reconciler.discard_before(tick);
        self.stats.updated_entities += reconciliation.updated_entities;
        self.stats.cleared_transactions += reconciliation.cleared_transactions;
        for event in reconciliation.events {
            self.emit(event);
        }

        if previous > 0 {
            let duration_ms = self
                .stats
                .latest_confirmation
                .map_or(0, |latest| (now - latest).num_milliseconds());
            let updated = std::mem::take(&mut self.stats.updated_entities);
            let cleared = std::mem::take(&mut self.stats.cleared_transactions);
            self.emit(ClientEvent::TickStats(TickStats {
                tick,
                duration_ms,
                number_of_skipped_ticks: tick - previous - 1,
                number_of_updated_entities: updated,
                number_of_skipped_entities: self.entities.len().saturating_sub(updated),
                number_of_cleared_transactions: cleared,
            }));
        } else {
            self.stats.updated_entities = 0;
            self.stats.cleared_transactions = 0;
        }
        self.stats.latest_confirmation = Some(now);

        tracing::info!(tick, epoch = confirmed.epoch(), "Tick confirmed");

        if self.polling.quorum_hint.map_or(false, |hint| tick.saturating_add(1) >= hint) {
            self.polling.quorum_hint = None;
            directives.push(Directive::StopQuorumPolling);
        }
        if !self.polling.tick_info {
            self.polling.tick_info = true;
            directives.push(Directive::StartTickInfoPolling);
        }
        directives
    }

    fn handle_asset_proof(&mut self, proof: AssetProof) -> Vec<Directive> {
        let tick = proof.tick();
        if self.accepts_proof(proof.holder(), tick) {
            self.reconciler.buffer_asset(proof);
            self.reconcile_late(tick);
        }
        Vec::new()
    }

    /// Proofs are kept only for followed entities and for ticks at most
    /// `max_ticks_ahead` past the newest tick the client knows of
    fn accepts_proof(&self, holder: Option<&PublicKey>, tick: u32) -> bool {
        if !holder.map_or(false, |public_key| self.entities.contains(public_key)) {
            return false;
        }
        let known = self
            .current_tick_info
            .as_ref()
            .map_or(self.system.tick, |info| info.tick.max(self.system.tick));
        known == 0 || tick <= known.saturating_add(self.config.max_ticks_ahead())
    }

    /// Proofs for a tick that is already confirmed are checked right away
    fn reconcile_late(&mut self, tick: u32) {
        let Some(confirmed) = self.tracker.confirmed().get(tick).cloned() else {
            if self.tracker.latest().map_or(false, |latest| tick <= latest.tick()) {
                // Older than the latest confirmation and evicted from the ring
                self.reconciler.discard_before(self.system.tick);
            }
            return;
        };

        let context = ReconcileContext {
            crypto: self.crypto.as_ref(),
            store: self.store.as_ref(),
            confirmed: &confirmed,
            system_tick: self.system.tick,
            execution_tick: self.execution_tick_after(self.system.tick),
        };
        let reconciliation = self.reconciler.reconcile(&context, &mut self.entities, &mut self.assets);
        self.stats.updated_entities += reconciliation.updated_entities;
        self.stats.cleared_transactions += reconciliation.cleared_transactions;
        for event in reconciliation.events {
            self.emit(event);
        }
    }

    fn handle_tick_info(&mut self, info: CurrentTickInfo, peer: &dyn Peer) -> Vec<Directive> {
        let mut directives = Vec::new();
        let ahead = self.epochs.current_epoch() == Some(info.epoch) && info.tick > self.system.tick;
        if !ahead {
            if !self.polling.tick_info && !self.epochs.is_poisoned() {
                self.polling.tick_info = true;
                directives.push(Directive::StartTickInfoPolling);
            }
            return directives;
        }

        self.current_tick_info = Some(info);
        for public_key in self.entities.public_keys() {
            for message in proof_requests(&public_key) {
                peer.transmit_to_all(&mut |_, _| Packet::request(message.clone()).encode());
            }
        }

        if self.polling.tick_info {
            self.polling.tick_info = false;
            directives.push(Directive::StopTickInfoPolling);
        }
        if self.polling.quorum_hint.map_or(true, |hint| info.tick > hint) {
            self.polling.quorum_hint = Some(info.tick);
            directives.push(Directive::PollQuorumTicks(info.tick));
        }
        directives
    }

    /// Base requests for the ticks around `hint` still short of a quorum
    pub fn quorum_requests(&self, hint: u32) -> Vec<QuorumTickRequest> {
        let quorum = self.params().quorum();
        let votes = self.tracker.votes();
        let first = hint.saturating_sub(1).max(self.system.tick.saturating_add(1));

        let mut ticks = vec![first, first.saturating_add(1)];
        if votes.count(first) >= quorum {
            ticks.extend([first.saturating_add(2), first.saturating_add(3)]);
        }
        ticks.dedup();

        ticks
            .into_iter()
            .filter(|tick| votes.count(*tick) < quorum)
            .map(|tick| self.vote_flags(tick))
            .collect()
    }

    /// Request for `tick` with every held vote flagged
    pub fn vote_flags(&self, tick: u32) -> QuorumTickRequest {
        let mut request = QuorumTickRequest::new(tick, self.params());
        for (index, slot) in self.tracker.votes().slots(tick).iter().enumerate() {
            if slot.is_some() {
                request.set_vote(index);
            }
        }
        request
    }

    fn serve_committee(&self, nonce: u32, peer: &dyn Peer) {
        if nonce == 0 {
            peer.ignore();
            return;
        }
        if let Some(record) = self.epochs.active() {
            peer.reply(&Packet::new(nonce, Message::BroadcastComputors(record.to_committee())).encode());
        }
    }

    fn serve_quorum_tick(&self, nonce: u32, request: &QuorumTickRequest, peer: &dyn Peer) {
        if nonce == 0 {
            peer.ignore();
            return;
        }
        let Some(confirmed) = self.tracker.confirmed().get(request.tick) else {
            return;
        };
        for vote in &confirmed.quorum.votes {
            if !request.has_vote(usize::from(vote.computor_index)) {
                peer.reply(&Packet::new(nonce, Message::BroadcastTick(vote.clone())).encode());
            }
        }
    }

    fn serve_tick_info(&self, nonce: u32, peer: &dyn Peer) {
        if nonce == 0 {
            peer.ignore();
            return;
        }
        if let Some(info) = self.current_tick_info {
            peer.reply(&Packet::new(nonce, Message::RespondCurrentTickInfo(info)).encode());
        }
    }

    fn relay_transaction(&self, nonce: u32, transaction: Transaction, peer: &dyn Peer) {
        if nonce != 0 || !transaction.verify(self.crypto.as_ref()) {
            tracing::debug!(peer = peer.address(), nonce, "Dropping transaction broadcast");
            peer.ignore();
            return;
        }
        peer.broadcast(&Packet::broadcast(Message::BroadcastTransaction(transaction)).encode());
    }

    /// Track an entity; returns false if it already was
    pub fn subscribe(&mut self, public_key: PublicKey) -> bool {
        let id = public_key_to_identity(self.crypto.as_ref(), &public_key);
        if !self.entities.subscribe(id.clone(), public_key) {
            return false;
        }
        tracing::info!(entity = %id, "Subscribed");
        true
    }

    /// Stop tracking an entity not owned by a wallet
    pub fn unsubscribe(&mut self, public_key: &PublicKey) -> bool {
        let unsubscribed = self.entities.unsubscribe(public_key);
        if unsubscribed {
            self.assets.forget(public_key);
        }
        unsubscribed
    }

    /// Register an owned entity, loading its persisted pending transaction
    pub fn create_wallet(&mut self, public_key: PublicKey) -> Result<(String, broadcast::Receiver<u32>), ClientError> {
        let id = public_key_to_identity(self.crypto.as_ref(), &public_key);
        if self.entities.get(&public_key).map_or(false, Entity::is_owned) {
            return Err(ClientError::DuplicateWallet(id));
        }
        let pending = self.load_pending(&id, &public_key)?;

        let (sender, receiver) = broadcast::channel(EXECUTION_TICK_CAPACITY);
        let entity = self.entities.entry(id.clone(), public_key);
        entity.wallet = Some(sender);
        entity.pending = pending;
        tracing::info!(entity = %id, "Wallet created");
        Ok((id, receiver))
    }

    fn load_pending(&self, id: &str, public_key: &PublicKey) -> Result<Option<Transaction>, ClientError> {
        let Some(bytes) = self.store.get(id, None)? else {
            return Ok(None);
        };
        let transaction =
            Transaction::from_bytes(&bytes).map_err(|_| ClientError::InvalidStoredTransaction(id.to_string()))?;
        if transaction.source() != public_key || !transaction.verify(self.crypto.as_ref()) {
            return Err(ClientError::InvalidStoredTransaction(id.to_string()));
        }
        Ok(Some(transaction))
    }

    /// Drop an owned entity and everything tracked for it
    pub fn release_wallet(&mut self, public_key: &PublicKey) {
        if self.entities.remove(public_key).is_some() {
            self.assets.forget(public_key);
        }
    }

    pub fn pending_transaction(&self, public_key: &PublicKey) -> Option<Transaction> {
        self.entities.get(public_key).and_then(|entity| entity.pending.clone())
    }

    /// Validate and persist an owned entity's next outgoing transaction
    pub fn submit_transaction(&mut self, public_key: &PublicKey, transaction: Transaction) -> Result<(), ClientError> {
        let crypto = self.crypto.as_ref();
        let execution_tick = self.execution_tick().ok_or(ClientError::NotSynchronized)?;
        if transaction.source() != public_key {
            return Err(ClientError::ForeignTransaction(public_key_to_identity(
                crypto,
                transaction.source(),
            )));
        }
        if !transaction.verify(crypto) {
            return Err(ClientError::InvalidSignature);
        }

        let number_of_computors = self.params().number_of_computors;
        let max_ticks_ahead = self.config.max_ticks_ahead();
        let system_tick = self.system.tick;
        let entity = self
            .entities
            .get_mut(public_key)
            .ok_or_else(|| ClientError::EntityNotSynchronized(public_key_to_identity(crypto, public_key)))?;
        let energy = entity
            .energy()
            .ok_or_else(|| ClientError::EntityNotSynchronized(entity.id.clone()))?;
        if let Some(pending) = &entity.pending {
            return Err(ClientError::PendingTransaction(pending.tick()));
        }

        let amount = transaction.amount();
        if amount > MAX_AMOUNT {
            return Err(ClientError::InvalidAmount(amount));
        }
        if i128::from(amount) > energy {
            return Err(ClientError::InsufficientEnergy { amount, energy });
        }
        if let Some(bid) = transaction.bid() {
            let max_price = MAX_AMOUNT / number_of_computors.max(1) as u64;
            if bid.price > max_price || usize::from(bid.quantity) > number_of_computors {
                return Err(ClientError::InvalidBid {
                    price: bid.price,
                    quantity: bid.quantity,
                });
            }
            let remaining = energy - i128::from(amount);
            if i128::try_from(bid.total()).unwrap_or(i128::MAX) > remaining {
                return Err(ClientError::BidExceedsEnergy {
                    total: bid.total(),
                    remaining,
                });
            }
        }

        let tick = transaction.tick();
        if tick < execution_tick {
            return Err(ClientError::TickTooEarly { tick, execution_tick });
        }
        if tick - system_tick > max_ticks_ahead {
            return Err(ClientError::TickTooFar {
                tick,
                current: system_tick,
                max_ahead: max_ticks_ahead,
            });
        }

        self.store.append(&entity.id, &transaction.encode())?;
        tracing::info!(entity = %entity.id, tick, amount, "Transaction submitted");
        entity.pending = Some(transaction);
        Ok(())
    }

    /// Delete an archived transaction; the pending one cannot be removed
    pub fn remove_transaction(&mut self, public_key: &PublicKey, tick: u32) -> Result<(), ClientError> {
        let id = public_key_to_identity(self.crypto.as_ref(), public_key);
        if let Some(pending) = self.entities.get(public_key).and_then(|entity| entity.pending.as_ref()) {
            if pending.tick() == tick {
                return Err(ClientError::TransactionIsPending(tick));
            }
        }
        self.store.remove(&id, tick)?;
        Ok(())
    }
}

/// Entity and asset proof requests for one public key
pub(crate) fn proof_requests(public_key: &PublicKey) -> [Message; 3] {
    [
        Message::RequestEntity(*public_key),
        Message::RequestIssuedAssets(*public_key),
        Message::RequestOwnedAssets(*public_key),
    ]
}

/// Narrow a quorum tick request to the computor range assigned to one peer.
///
/// Peer `i` of `k` asks for indices `[i * ⌊N/k⌋, (i + 1) * ⌊N/k⌋)`; the last
/// peer also covers the remainder. Everything outside the range is flagged as
/// held.
pub fn split_vote_flags(
    base: &QuorumTickRequest,
    peer_index: usize,
    number_of_peers: usize,
    params: &ProtocolParams,
) -> QuorumTickRequest {
    let n = params.number_of_computors;
    let number_of_peers = number_of_peers.max(1);
    let share = n / number_of_peers;
    let start = (peer_index * share).min(n);
    let end = if peer_index + 1 >= number_of_peers {
        n
    } else {
        ((peer_index + 1) * share).min(n)
    };

    let mut request = base.clone();
    for index in (0..start).chain(end..n) {
        request.set_vote(index);
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TransferEvent;
    use crate::peer::testing::RecordingPeer;
    use crate::store::MemoryStore;
    use crate::testing::{drain, Network, ENTITY_KEY};
    use lrv_wire::{MessageType, TransactionHeader};

    struct Fixture {
        network: Network,
        ledger: Ledger,
        events: broadcast::Receiver<ClientEvent>,
        store: Arc<MemoryStore>,
        peer: RecordingPeer,
    }

    fn fixture(network: Network) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let (sender, events) = broadcast::channel(1024);
        let ledger = Ledger::new(
            network.config(),
            Arc::new(network.crypto),
            network.clock.clone(),
            store.clone(),
            sender,
        )
        .unwrap();
        Fixture {
            network,
            ledger,
            events,
            store,
            peer: RecordingPeer::new("10.0.0.1"),
        }
    }

    impl Fixture {
        fn deliver(&mut self, bytes: Vec<u8>) -> Vec<Directive> {
            let packet = Packet::decode(&bytes, &self.network.params()).unwrap();
            self.ledger.handle(packet, &self.peer)
        }

        fn bootstrap(&mut self) -> Vec<Directive> {
            let packet = self.network.committee_packet();
            self.deliver(packet)
        }

        fn votes(&mut self, tick: u32, indices: std::ops::Range<u16>) -> Vec<Directive> {
            let mut directives = Vec::new();
            for index in indices {
                let packet = self.network.vote_packet(tick, index);
                directives.extend(self.deliver(packet));
            }
            directives
        }

        /// Confirm `tick` by delivering a quorum for it and its successor
        fn confirm(&mut self, tick: u32) {
            self.votes(tick, 0..5);
            self.votes(tick + 1, 0..5);
            assert!(self.ledger.system_tick() >= tick);
        }
    }

    #[test]
    fn test_bootstrap_emits_epoch_and_starts_polling() {
        let mut f = fixture(Network::new());
        let directives = f.bootstrap();

        assert_eq!(directives, vec![Directive::StartTickInfoPolling]);
        assert_eq!(f.ledger.epochs().current_epoch(), Some(f.network.epoch));
        let events = drain(&mut f.events);
        assert!(matches!(&events[..], [ClientEvent::Epoch(event)] if event.computors.len() == 7));

        // Known committee again: no new event, polling already active
        assert!(f.bootstrap().is_empty());
        assert!(drain(&mut f.events).is_empty());
    }

    #[test]
    fn test_confirms_tick_once_successor_has_quorum() {
        let mut f = fixture(Network::new());
        f.bootstrap();
        drain(&mut f.events);

        f.votes(10, 0..5);
        f.votes(11, 0..4);
        assert_eq!(f.ledger.system_tick(), 0);
        assert!(f.ledger.tracker().latest().is_none());

        f.votes(11, 4..5);
        assert_eq!(f.ledger.system_tick(), 10);

        let events = drain(&mut f.events);
        let ticks: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                ClientEvent::Tick(tick) => Some(tick),
                _ => None,
            })
            .collect();
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].tick, 10);
        assert_eq!(ticks[0].computor_indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(ticks[0].spectrum_digest, digest_to_string(&f.network.state(10).spectrum));

        // Late votes for a confirmed tick are dropped
        f.votes(10, 5..7);
        assert_eq!(f.ledger.tracker().votes().count(10), 0);
        assert!(!f.peer.is_ignored());
    }

    #[test]
    fn test_votes_before_bootstrap_are_dropped() {
        let mut f = fixture(Network::new());
        f.votes(10, 0..5);
        assert_eq!(f.ledger.tracker().votes().number_of_ticks(), 0);
        assert!(!f.peer.is_ignored());
    }

    #[test]
    fn test_conflicting_vote_marks_computor_faulty() {
        let mut f = fixture(Network::new());
        f.bootstrap();

        f.votes(10, 0..1);
        let mut conflicting = f.network.vote(10, 0);
        conflicting.transaction_digest = [0xEE; 32];
        let conflicting = f.network.sign_vote(conflicting);
        f.deliver(Packet::broadcast(Message::BroadcastTick(conflicting)).encode());

        assert!(f.peer.is_ignored());
        assert!(f.ledger.epochs().is_faulty(f.network.epoch, 0));

        // Later votes of the faulty computor are skipped without blaming the relay
        let relay = RecordingPeer::new("10.0.0.2");
        let packet = Packet::decode(&f.network.vote_packet(12, 0), &f.network.params()).unwrap();
        f.ledger.handle(packet, &relay);
        assert_eq!(f.ledger.tracker().votes().count(12), 0);
        assert!(!relay.is_ignored());
    }

    #[test]
    fn test_invalid_signature_ignores_peer() {
        let mut f = fixture(Network::new());
        f.bootstrap();

        let mut vote = f.network.vote(10, 2);
        vote.signature[0] ^= 1;
        f.deliver(Packet::broadcast(Message::BroadcastTick(vote)).encode());

        assert!(f.peer.is_ignored());
        assert_eq!(f.ledger.tracker().votes().count(10), 0);
    }

    #[test]
    fn test_future_committee_rejected() {
        let mut f = fixture(Network::new());
        let keys = f.network.keys.clone();
        let committee = f.network.committee(f.network.epoch + 1, &keys);
        f.deliver(Packet::broadcast(Message::BroadcastComputors(committee)).encode());

        assert!(f.peer.is_ignored());
        assert_eq!(f.ledger.epochs().current_epoch(), None);
    }

    #[test]
    fn test_illegal_churn_poisons_ledger() {
        let network = Network::with_checkpoint_epoch(Network::inferred_epoch() - 1);
        let mut f = fixture(network);

        // N - QUORUM + 1 members replaced
        let mut keys = f.network.keys.clone();
        for key in keys.iter_mut().take(3) {
            key[0] ^= 0xFF;
        }
        let committee = f.network.committee(Network::inferred_epoch(), &keys);
        let directives = f.deliver(Packet::broadcast(Message::BroadcastComputors(committee)).encode());

        assert!(directives.contains(&Directive::StopTickInfoPolling));
        assert!(f.ledger.epochs().is_poisoned());
        let events = drain(&mut f.events);
        assert!(events.iter().any(|event| matches!(event, ClientEvent::Error(_))));

        // No later confirmations
        f.votes(10, 0..5);
        f.votes(11, 0..5);
        assert_eq!(f.ledger.system_tick(), 0);
        assert!(!drain(&mut f.events)
            .iter()
            .any(|event| matches!(event, ClientEvent::Tick(_))));
    }

    #[test]
    fn test_entity_proof_updates_state() {
        let mut f = fixture(Network::new());
        f.bootstrap();
        let public_key = f.network.crypto.public_key(&ENTITY_KEY);
        assert!(f.ledger.subscribe(public_key));

        let response = f.network.entity_response(10, public_key, 1_000, 250, 0);
        f.deliver(Packet::broadcast(Message::RespondEntity(response)).encode());
        assert_eq!(f.ledger.reconciler().number_of_buffered_proofs(), 1);

        drain(&mut f.events);
        f.confirm(10);

        let entity = f.ledger.entities().get(&public_key).unwrap();
        assert_eq!(entity.energy(), Some(750));
        assert_eq!(entity.tick(), 10);
        assert_eq!(f.ledger.reconciler().number_of_buffered_proofs(), 0);

        let events = drain(&mut f.events);
        assert!(events
            .iter()
            .any(|event| matches!(event, ClientEvent::Entity(entity) if entity.energy == 750 && entity.tick == 10)));
    }

    #[test]
    fn test_tampered_sibling_leaves_entity_unchanged() {
        let mut f = fixture(Network::new());
        f.bootstrap();
        let public_key = f.network.crypto.public_key(&ENTITY_KEY);
        f.ledger.subscribe(public_key);

        let mut response = f.network.entity_response(10, public_key, 1_000, 0, 0);
        response.siblings[1][7] ^= 1;
        f.deliver(Packet::broadcast(Message::RespondEntity(response)).encode());

        drain(&mut f.events);
        f.confirm(10);

        assert!(f.ledger.entities().get(&public_key).unwrap().state.is_none());
        assert!(!drain(&mut f.events)
            .iter()
            .any(|event| matches!(event, ClientEvent::Entity(_))));
        assert!(!f.peer.is_ignored());
    }

    #[test]
    fn test_untracked_absent_and_distant_proofs_are_not_buffered() {
        let mut f = fixture(Network::new());
        f.bootstrap();
        let public_key = f.network.crypto.public_key(&ENTITY_KEY);
        f.ledger.subscribe(public_key);
        let template = f.network.entity_response(10, public_key, 1_000, 0, 0);

        for tick in 1_000_000..1_002_000 {
            let mut untracked = template.clone();
            untracked.public_key = [7; 32];
            untracked.tick = tick;
            f.deliver(Packet::broadcast(Message::RespondEntity(untracked)).encode());
        }
        let mut absent = template.clone();
        absent.spectrum_index = -1;
        f.deliver(Packet::broadcast(Message::RespondEntity(absent)).encode());
        assert_eq!(f.ledger.reconciler.number_of_buffered_proofs(), 0);
        assert!(!f.peer.is_ignored());

        f.confirm(10);
        let mut distant = template.clone();
        distant.tick = 10 + f.ledger.config.max_ticks_ahead() + 1;
        f.deliver(Packet::broadcast(Message::RespondEntity(distant)).encode());
        assert_eq!(f.ledger.reconciler.number_of_buffered_proofs(), 0);

        let mut near = template;
        near.tick = 11;
        f.deliver(Packet::broadcast(Message::RespondEntity(near)).encode());
        assert_eq!(f.ledger.reconciler.number_of_buffered_proofs(), 1);
    }

    #[test]
    fn test_late_proof_for_confirmed_tick() {
        let mut f = fixture(Network::new());
        f.bootstrap();
        let public_key = f.network.crypto.public_key(&ENTITY_KEY);
        f.ledger.subscribe(public_key);

        let response = f.network.entity_response(10, public_key, 40, 0, 0);
        f.confirm(10);
        f.deliver(Packet::broadcast(Message::RespondEntity(response)).encode());

        assert_eq!(f.ledger.entities().get(&public_key).unwrap().energy(), Some(40));
    }

    #[test]
    fn test_pending_transaction_not_executed() {
        let mut f = fixture(Network::new());
        f.bootstrap();
        let public_key = f.network.crypto.public_key(&ENTITY_KEY);
        let id = public_key_to_identity(&f.network.crypto, &public_key);

        let transaction = f.network.transaction(&ENTITY_KEY, [9; 32], 100, 10);
        f.store.append(&id, &transaction.encode()).unwrap();
        let (wallet_id, mut execution_ticks) = f.ledger.create_wallet(public_key).unwrap();
        assert_eq!(wallet_id, id);
        assert_eq!(f.ledger.pending_transaction(&public_key), Some(transaction.clone()));

        // The spectrum says the latest outgoing transfer happened at tick 7
        let response = f.network.entity_response(10, public_key, 1_000, 0, 7);
        f.deliver(Packet::broadcast(Message::RespondEntity(response)).encode());
        drain(&mut f.events);
        f.confirm(10);

        let transfers: Vec<TransferEvent> = drain(&mut f.events)
            .into_iter()
            .filter_map(|event| match event {
                ClientEvent::Transfer(transfer) => Some(transfer),
                _ => None,
            })
            .collect();
        assert_eq!(transfers.len(), 1);
        assert!(!transfers[0].executed);
        assert_eq!(transfers[0].tick, 10);
        assert_eq!(transfers[0].amount, 100);

        assert!(f.ledger.pending_transaction(&public_key).is_none());
        assert!(f.store.get(&id, None).unwrap().is_none());
        assert!(f.store.get(&id, Some(10)).unwrap().is_some());
        assert_eq!(execution_ticks.try_recv().unwrap(), f.ledger.execution_tick().unwrap());
    }

    #[test]
    fn test_executed_transfer() {
        let mut f = fixture(Network::new());
        f.bootstrap();
        let public_key = f.network.crypto.public_key(&ENTITY_KEY);
        let id = public_key_to_identity(&f.network.crypto, &public_key);
        f.store
            .append(&id, &f.network.transaction(&ENTITY_KEY, [9; 32], 100, 10).encode())
            .unwrap();
        f.ledger.create_wallet(public_key).unwrap();

        let response = f.network.entity_response(10, public_key, 1_000, 100, 10);
        f.deliver(Packet::broadcast(Message::RespondEntity(response)).encode());
        drain(&mut f.events);
        f.confirm(10);

        let events = drain(&mut f.events);
        assert!(events
            .iter()
            .any(|event| matches!(event, ClientEvent::Transfer(transfer) if transfer.executed)));
        assert!(events.iter().any(|event| matches!(
            event,
            ClientEvent::Entity(entity) if entity.outgoing_transaction.as_ref().map_or(false, |tx| tx.executed)
        )));
    }

    #[test]
    fn test_tick_stats_count_cleared_transactions() {
        let mut f = fixture(Network::new());
        f.bootstrap();
        let public_key = f.network.crypto.public_key(&ENTITY_KEY);
        let id = public_key_to_identity(&f.network.crypto, &public_key);
        f.store
            .append(&id, &f.network.transaction(&ENTITY_KEY, [9; 32], 100, 11).encode())
            .unwrap();
        f.ledger.create_wallet(public_key).unwrap();

        let response = f.network.entity_response(11, public_key, 1_000, 100, 11);
        f.deliver(Packet::broadcast(Message::RespondEntity(response)).encode());
        f.confirm(10);
        drain(&mut f.events);

        f.votes(12, 0..5);
        assert_eq!(f.ledger.system_tick(), 11);
        let stats: Vec<TickStats> = drain(&mut f.events)
            .into_iter()
            .filter_map(|event| match event {
                ClientEvent::TickStats(stats) => Some(stats),
                _ => None,
            })
            .collect();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].number_of_skipped_ticks, 0);
        assert_eq!(stats[0].number_of_updated_entities, 1);
        assert_eq!(stats[0].number_of_skipped_entities, 0);
        assert_eq!(stats[0].number_of_cleared_transactions, 1);
    }

    #[test]
    fn test_create_wallet_rejects_duplicates_and_bad_records() {
        let mut f = fixture(Network::new());
        let public_key = f.network.crypto.public_key(&ENTITY_KEY);
        f.ledger.create_wallet(public_key).unwrap();
        assert!(matches!(
            f.ledger.create_wallet(public_key),
            Err(ClientError::DuplicateWallet(_))
        ));

        // A stored transaction signed by someone else
        let other = f.network.crypto.public_key(&[77; 32]);
        let other_id = public_key_to_identity(&f.network.crypto, &other);
        let foreign = f.network.transaction(&ENTITY_KEY, [9; 32], 1, 10);
        f.store.append(&other_id, &foreign.encode()).unwrap();
        assert!(matches!(
            f.ledger.create_wallet(other),
            Err(ClientError::InvalidStoredTransaction(_))
        ));
        assert!(!f.ledger.entities().contains(&other));

        f.store.append(&other_id, &[1, 2, 3]).unwrap();
        assert!(matches!(
            f.ledger.create_wallet(other),
            Err(ClientError::InvalidStoredTransaction(_))
        ));
    }

    #[test]
    fn test_submit_transaction_validation() {
        let mut f = fixture(Network::new());
        f.bootstrap();
        let public_key = f.network.crypto.public_key(&ENTITY_KEY);

        let early = f.network.transaction(&ENTITY_KEY, [9; 32], 10, 20);
        assert!(matches!(
            f.ledger.submit_transaction(&public_key, early),
            Err(ClientError::NotSynchronized)
        ));

        f.ledger.create_wallet(public_key).unwrap();
        let response = f.network.entity_response(10, public_key, 1_000, 0, 0);
        f.deliver(Packet::broadcast(Message::RespondEntity(response)).encode());
        f.confirm(10);

        let execution_tick = f.ledger.execution_tick().unwrap();
        assert!(execution_tick > 10);
        let submit = |f: &mut Fixture, transaction: Transaction| f.ledger.submit_transaction(&public_key, transaction);

        let foreign = f.network.transaction(&[77; 32], [9; 32], 10, execution_tick);
        assert!(matches!(submit(&mut f, foreign), Err(ClientError::ForeignTransaction(_))));

        let unsigned = f
            .network
            .transaction(&ENTITY_KEY, [9; 32], 10, execution_tick)
            .with_signature([0; 64]);
        assert!(matches!(submit(&mut f, unsigned), Err(ClientError::InvalidSignature)));

        let too_much = f.network.transaction(&ENTITY_KEY, [9; 32], 1_001, execution_tick);
        assert!(matches!(
            submit(&mut f, too_much),
            Err(ClientError::InsufficientEnergy { amount: 1_001, energy: 1_000 })
        ));

        let early = f.network.transaction(&ENTITY_KEY, [9; 32], 10, execution_tick - 1);
        assert!(matches!(submit(&mut f, early), Err(ClientError::TickTooEarly { .. })));

        let far = f.network.transaction(&ENTITY_KEY, [9; 32], 10, 10 + 61);
        assert!(matches!(submit(&mut f, far), Err(ClientError::TickTooFar { .. })));

        let bid = |network: &Network, price: u64, quantity: u16| {
            let mut contract = [0u8; 32];
            contract[0] = 1;
            let mut input = price.to_le_bytes().to_vec();
            input.extend_from_slice(&quantity.to_le_bytes());
            let header = TransactionHeader {
                source: public_key,
                destination: contract,
                amount: 0,
                tick: execution_tick,
                input_type: 0,
            };
            network.sign_transaction(&ENTITY_KEY, Transaction::unsigned(header, input).unwrap())
        };
        let invalid = bid(&f.network, 10, 8);
        assert!(matches!(submit(&mut f, invalid), Err(ClientError::InvalidBid { .. })));
        let oversized = bid(&f.network, 300, 4);
        assert!(matches!(submit(&mut f, oversized), Err(ClientError::BidExceedsEnergy { .. })));

        let valid = f.network.transaction(&ENTITY_KEY, [9; 32], 10, execution_tick);
        submit(&mut f, valid.clone()).unwrap();
        assert_eq!(f.ledger.pending_transaction(&public_key), Some(valid.clone()));
        let id = public_key_to_identity(&f.network.crypto, &public_key);
        assert_eq!(f.store.get(&id, None).unwrap(), Some(valid.encode()));

        let second = f.network.transaction(&ENTITY_KEY, [9; 32], 5, execution_tick + 1);
        assert!(matches!(submit(&mut f, second), Err(ClientError::PendingTransaction(_))));
        assert!(matches!(
            f.ledger.remove_transaction(&public_key, execution_tick),
            Err(ClientError::TransactionIsPending(_))
        ));
    }

    #[test]
    fn test_serves_stored_quorum_votes() {
        let mut f = fixture(Network::new());
        f.bootstrap();
        f.confirm(10);
        f.peer.take_sent();

        let mut request = QuorumTickRequest::new(10, &f.network.params());
        request.set_vote(0);
        f.deliver(Packet::new(5, Message::RequestQuorumTick(request.clone())).encode());

        let sent = f.peer.take_sent();
        assert_eq!(sent.len(), 4);
        for bytes in sent {
            let packet = Packet::decode(&bytes, &f.network.params()).unwrap();
            assert_eq!(packet.nonce, 5);
            assert!(matches!(packet.message, Message::BroadcastTick(vote) if vote.computor_index != 0));
        }

        // Requests must carry a nonce
        f.deliver(Packet::broadcast(Message::RequestQuorumTick(request)).encode());
        assert!(f.peer.is_ignored());
    }

    #[test]
    fn test_serves_committee() {
        let mut f = fixture(Network::new());
        f.deliver(Packet::new(3, Message::RequestComputors).encode());
        assert!(f.peer.take_sent().is_empty());

        f.bootstrap();
        f.deliver(Packet::new(3, Message::RequestComputors).encode());
        let sent = f.peer.take_sent();
        assert_eq!(sent.len(), 1);
        let packet = Packet::decode(&sent[0], &f.network.params()).unwrap();
        assert_eq!(packet.message_type(), MessageType::BroadcastComputors);
        assert_eq!(packet.nonce, 3);
    }

    #[test]
    fn test_exchange_public_peers_requests_committee() {
        let mut f = fixture(Network::new());
        f.deliver(Packet::broadcast(Message::ExchangePublicPeers(Default::default())).encode());
        let sent = f.peer.take_sent();
        assert_eq!(sent.len(), 1);
        let packet = Packet::decode(&sent[0], &f.network.params()).unwrap();
        assert_eq!(packet.message, Message::RequestComputors);
        assert_ne!(packet.nonce, 0);
    }

    #[test]
    fn test_relays_signed_transactions_only() {
        let mut f = fixture(Network::new());
        let transaction = f.network.transaction(&ENTITY_KEY, [9; 32], 5, 10);
        let packet = Packet::broadcast(Message::BroadcastTransaction(transaction.clone())).encode();
        f.deliver(packet.clone());
        assert_eq!(f.peer.broadcasts.lock().as_slice(), &[packet]);
        assert!(!f.peer.is_ignored());

        f.deliver(Packet::new(8, Message::BroadcastTransaction(transaction)).encode());
        assert!(f.peer.is_ignored());
        assert_eq!(f.peer.broadcasts.lock().len(), 1);
    }

    #[test]
    fn test_tick_info_requests_proofs_and_polls_quorum() {
        let mut f = fixture(Network::new());
        f.bootstrap();
        let public_key = f.network.crypto.public_key(&ENTITY_KEY);
        f.ledger.subscribe(public_key);
        f.peer.take_sent();

        let info = CurrentTickInfo {
            tick_duration: 1000,
            epoch: f.network.epoch,
            tick: 20,
            ..Default::default()
        };
        let directives = f.deliver(Packet::new(4, Message::RespondCurrentTickInfo(info)).encode());
        assert_eq!(
            directives,
            vec![Directive::StopTickInfoPolling, Directive::PollQuorumTicks(20)]
        );

        let types: Vec<_> = f
            .peer
            .take_sent()
            .iter()
            .map(|bytes| Packet::decode(bytes, &f.network.params()).unwrap().message_type())
            .collect();
        assert_eq!(
            types,
            vec![
                MessageType::RequestEntity,
                MessageType::RequestIssuedAssets,
                MessageType::RequestOwnedAssets
            ]
        );

        // Same hint again does not restart polling
        let directives = f.deliver(Packet::new(5, Message::RespondCurrentTickInfo(info)).encode());
        assert!(directives.is_empty());

        // Served back to peers that ask
        f.peer.take_sent();
        f.deliver(Packet::new(6, Message::RequestCurrentTickInfo).encode());
        let sent = f.peer.take_sent();
        assert_eq!(
            Packet::decode(&sent[0], &f.network.params()).unwrap().message,
            Message::RespondCurrentTickInfo(info)
        );
    }

    #[test]
    fn test_stale_tick_info_keeps_polling() {
        let mut f = fixture(Network::new());
        f.bootstrap();
        let info = CurrentTickInfo {
            epoch: f.network.epoch,
            tick: 20,
            ..Default::default()
        };
        f.deliver(Packet::new(4, Message::RespondCurrentTickInfo(info)).encode());

        let stale = CurrentTickInfo {
            epoch: f.network.epoch - 1,
            tick: 30,
            ..Default::default()
        };
        let directives = f.deliver(Packet::new(5, Message::RespondCurrentTickInfo(stale)).encode());
        assert_eq!(directives, vec![Directive::StartTickInfoPolling]);
    }

    #[test]
    fn test_quorum_requests_flag_held_votes() {
        let mut f = fixture(Network::new());
        f.bootstrap();
        f.votes(19, 0..2);

        let requests = f.ledger.quorum_requests(20);
        assert_eq!(requests.iter().map(|r| r.tick).collect::<Vec<_>>(), vec![19, 20]);
        assert!(requests[0].has_vote(0) && requests[0].has_vote(1) && !requests[0].has_vote(2));

        // Once 19 has a quorum, look further ahead
        f.votes(19, 2..5);
        let requests = f.ledger.quorum_requests(20);
        assert_eq!(requests.iter().map(|r| r.tick).collect::<Vec<_>>(), vec![20, 21, 22]);
    }

    #[test]
    fn test_split_vote_flags() {
        let params = ProtocolParams::new(7, 4, 4);
        let base = QuorumTickRequest::new(5, &params);

        let first = split_vote_flags(&base, 0, 3, &params);
        let last = split_vote_flags(&base, 2, 3, &params);
        let wanted = |request: &QuorumTickRequest| (0..7).filter(|i| !request.has_vote(*i)).collect::<Vec<_>>();

        assert_eq!(wanted(&first), vec![0, 1]);
        assert_eq!(wanted(&split_vote_flags(&base, 1, 3, &params)), vec![2, 3]);
        assert_eq!(wanted(&last), vec![4, 5, 6]);

        let mut held = base.clone();
        held.set_vote(5);
        assert_eq!(wanted(&split_vote_flags(&held, 2, 3, &params)), vec![4, 6]);
        assert_eq!(wanted(&split_vote_flags(&base, 0, 1, &params)), (0..7).collect::<Vec<_>>());
    }

    proptest::proptest! {
        #[test]
        fn prop_split_vote_flags_partition(number_of_computors in 1usize..700, number_of_peers in 1usize..32) {
            let params = ProtocolParams::new(number_of_computors, 4, 4);
            let base = QuorumTickRequest::new(5, &params);

            // Every computor is asked of exactly one peer
            let mut asked = vec![0usize; number_of_computors];
            for peer_index in 0..number_of_peers {
                let request = split_vote_flags(&base, peer_index, number_of_peers, &params);
                for (index, count) in asked.iter_mut().enumerate() {
                    if !request.has_vote(index) {
                        *count += 1;
                    }
                }
            }
            proptest::prop_assert!(asked.iter().all(|count| *count == 1));
        }
    }

    #[test]
    fn test_tick_stats_follow_confirmations() {
        let mut f = fixture(Network::new());
        f.bootstrap();
        f.confirm(10);
        assert!(!drain(&mut f.events)
            .iter()
            .any(|event| matches!(event, ClientEvent::TickStats(_))));

        // 13 confirms through 14 while 11 still waits for 12
        f.votes(13, 0..5);
        f.votes(14, 0..5);
        assert_eq!(f.ledger.system_tick(), 13);

        let stats: Vec<TickStats> = drain(&mut f.events)
            .into_iter()
            .filter_map(|event| match event {
                ClientEvent::TickStats(stats) => Some(stats),
                _ => None,
            })
            .collect();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].tick, 13);
        assert_eq!(stats[0].number_of_skipped_ticks, 2);
        assert_eq!(stats[0].duration_ms, 0);

        // Skipped ticks can no longer be confirmed
        f.votes(12, 0..5);
        assert_eq!(f.ledger.system_tick(), 13);
    }

    #[test]
    fn test_unsubscribe_forgets_entity() {
        let mut f = fixture(Network::new());
        let public_key = f.network.crypto.public_key(&ENTITY_KEY);
        assert!(f.ledger.subscribe(public_key));
        assert!(f.ledger.unsubscribe(&public_key));
        assert!(!f.ledger.unsubscribe(&public_key));

        f.ledger.create_wallet(public_key).unwrap();
        assert!(!f.ledger.unsubscribe(&public_key));
        f.ledger.release_wallet(&public_key);
        assert!(f.ledger.entities().is_empty());
    }
}
