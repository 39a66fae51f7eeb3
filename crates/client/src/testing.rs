//! Simulated committee for tests
//!
//! Seven computors sign votes whose digests chain tick to tick. State digests
//! are derived from the tick number unless a test pins a spectrum root, which
//! is how entity proofs are made to verify.

use crate::config::{Checkpoint, ClientConfig, TrustAnchorConfig};
use crate::events::ClientEvent;
use chrono::{DateTime, TimeZone, Utc};
use lrv_consensus::{infer_epoch, merkle_root, FixedClock, StateDigests};
use lrv_wire::{
    public_key_to_identity, signature_to_string, Committee, Crypto, DefaultCrypto, Digest,
    EntityResponse, Message, Packet, ProtocolParams, PublicKey, TickTime, TickVote, Transaction,
    TransactionHeader,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

pub const NUMBER_OF_COMPUTORS: usize = 7;
pub const ARBITRATOR_KEY: [u8; 32] = [200; 32];
/// Private key of the entity most tests track
pub const ENTITY_KEY: [u8; 32] = [42; 32];

pub fn computor_key(index: usize) -> [u8; 32] {
    [index as u8 + 1; 32]
}

/// Wednesday afternoon, after the weekly epoch switch
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 13, 13, 0, 0).unwrap()
}

pub fn drain(events: &mut broadcast::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

pub struct Network {
    pub crypto: DefaultCrypto,
    pub clock: Arc<FixedClock>,
    /// Epoch of the checkpoint and of every vote
    pub epoch: u16,
    pub keys: Vec<PublicKey>,
    spectrum: HashMap<u32, Digest>,
}

impl Network {
    pub fn new() -> Self {
        Self::with_checkpoint_epoch(Self::inferred_epoch())
    }

    pub fn with_checkpoint_epoch(epoch: u16) -> Self {
        let crypto = DefaultCrypto::new();
        let keys = (0..NUMBER_OF_COMPUTORS)
            .map(|index| crypto.public_key(&computor_key(index)))
            .collect();
        Self {
            crypto,
            clock: Arc::new(FixedClock::new(now())),
            epoch,
            keys,
            spectrum: HashMap::new(),
        }
    }

    pub fn inferred_epoch() -> u16 {
        infer_epoch(now())
    }

    pub fn params(&self) -> ProtocolParams {
        ProtocolParams::new(NUMBER_OF_COMPUTORS, 4, 4)
    }

    pub fn config(&self) -> ClientConfig {
        let checkpoint = self.committee(self.epoch, &self.keys);
        ClientConfig {
            protocol: self.params(),
            min_public_peers: 1,
            trust_anchor: TrustAnchorConfig {
                arbitrator: public_key_to_identity(&self.crypto, &self.crypto.public_key(&ARBITRATOR_KEY)),
                checkpoint: Checkpoint {
                    epoch: self.epoch,
                    computors: self
                        .keys
                        .iter()
                        .map(|key| public_key_to_identity(&self.crypto, key))
                        .collect(),
                    signature: signature_to_string(&checkpoint.signature),
                },
            },
            ..ClientConfig::default()
        }
    }

    /// Arbitrator-signed committee
    pub fn committee(&self, epoch: u16, keys: &[PublicKey]) -> Committee {
        let mut committee = Committee {
            epoch,
            public_keys: keys.to_vec(),
            signature: [0; 64],
        };
        committee.signature = self.crypto.sign(&ARBITRATOR_KEY, &committee.digest(&self.crypto));
        committee
    }

    pub fn committee_packet(&self) -> Vec<u8> {
        Packet::broadcast(Message::BroadcastComputors(self.committee(self.epoch, &self.keys))).encode()
    }

    fn derived(&self, label: &[u8], tick: u32) -> Digest {
        let mut input = label.to_vec();
        input.extend_from_slice(&tick.to_le_bytes());
        self.crypto.digest(&input)
    }

    /// State produced by `tick`
    pub fn state(&self, tick: u32) -> StateDigests {
        let mut resource_testing = [0u8; 8];
        self.crypto.hash_into(&self.derived(b"resource", tick), &mut resource_testing);
        StateDigests {
            resource_testing,
            spectrum: self
                .spectrum
                .get(&tick)
                .copied()
                .unwrap_or_else(|| self.derived(b"spectrum", tick)),
            universe: self.derived(b"universe", tick),
            computer: self.derived(b"computer", tick),
        }
    }

    fn salt(&self, public_key: &PublicKey, digest: &[u8]) -> Vec<u8> {
        let mut salted = public_key.to_vec();
        salted.extend_from_slice(digest);
        salted
    }

    pub fn vote(&self, tick: u32, index: u16) -> TickVote {
        let public_key = self.keys[usize::from(index)];
        let previous = self.state(tick - 1);
        let current = self.state(tick);

        let mut salted_resource_testing_digest = [0u8; 8];
        self.crypto.hash_into(
            &self.salt(&public_key, &current.resource_testing),
            &mut salted_resource_testing_digest,
        );

        let vote = TickVote {
            computor_index: index,
            epoch: self.epoch,
            tick,
            time: TickTime {
                millisecond: 0,
                second: (tick % 60) as u8,
                minute: (tick / 60 % 60) as u8,
                hour: 12,
                day: 13,
                month: 3,
                year: 24,
            },
            prev_resource_testing_digest: previous.resource_testing,
            salted_resource_testing_digest,
            prev_spectrum_digest: previous.spectrum,
            prev_universe_digest: previous.universe,
            prev_computer_digest: previous.computer,
            salted_spectrum_digest: self.crypto.digest(&self.salt(&public_key, &current.spectrum)),
            salted_universe_digest: self.crypto.digest(&self.salt(&public_key, &current.universe)),
            salted_computer_digest: self.crypto.digest(&self.salt(&public_key, &current.computer)),
            transaction_digest: self.derived(b"transactions", tick),
            expected_next_tick_transaction_digest: self.derived(b"transactions", tick + 1),
            signature: [0; 64],
        };
        self.sign_vote(vote)
    }

    pub fn sign_vote(&self, mut vote: TickVote) -> TickVote {
        let private_key = computor_key(usize::from(vote.computor_index));
        vote.signature = self.crypto.sign(&private_key, &vote.signing_digest(&self.crypto));
        vote
    }

    pub fn vote_packet(&self, tick: u32, index: u16) -> Vec<u8> {
        Packet::broadcast(Message::BroadcastTick(self.vote(tick, index))).encode()
    }

    /// Proof for `public_key` at `tick`; pins the spectrum root of that tick
    /// so the proof verifies once the tick is confirmed.
    pub fn entity_response(
        &mut self,
        tick: u32,
        public_key: PublicKey,
        incoming_amount: u64,
        outgoing_amount: u64,
        latest_outgoing_transfer_tick: u32,
    ) -> EntityResponse {
        let response = EntityResponse {
            public_key,
            incoming_amount,
            outgoing_amount,
            number_of_incoming_transfers: 1,
            number_of_outgoing_transfers: u32::from(outgoing_amount > 0),
            latest_incoming_transfer_tick: 3,
            latest_outgoing_transfer_tick,
            tick,
            spectrum_index: 5,
            siblings: (0..self.params().spectrum_depth)
                .map(|level| [level as u8 + 50; 32])
                .collect(),
        };
        let root = merkle_root(&self.crypto, &response.leaf(), 5, &response.siblings);
        self.spectrum.insert(tick, root);
        response
    }

    pub fn sign_transaction(&self, private_key: &[u8; 32], transaction: Transaction) -> Transaction {
        let signature = self.crypto.sign(private_key, &transaction.digest(&self.crypto));
        transaction.with_signature(signature)
    }

    /// Signed transfer without input
    pub fn transaction(&self, private_key: &[u8; 32], destination: PublicKey, amount: u64, tick: u32) -> Transaction {
        let header = TransactionHeader {
            source: self.crypto.public_key(private_key),
            destination,
            amount,
            tick,
            input_type: 0,
        };
        self.sign_transaction(private_key, Transaction::unsigned(header, Vec::new()).unwrap())
    }
}
