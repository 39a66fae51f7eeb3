//! Fixed-layout payloads other than tick votes, transactions and assets

use crate::codec::Reader;
use crate::crypto::{Crypto, Digest, PublicKey, Signature};
use crate::params::ProtocolParams;

/// Four IPv4 addresses shared by a peer (ExchangePublicPeers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublicPeers {
    pub addresses: [[u8; 4]; 4],
}

impl PublicPeers {
    pub const LENGTH: usize = 16;

    pub(crate) fn decode(payload: &[u8]) -> Self {
        let mut reader = Reader::new(payload);
        Self {
            addresses: [reader.array(), reader.array(), reader.array(), reader.array()],
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        for address in &self.addresses {
            out.extend_from_slice(address);
        }
    }

    /// Dotted-quad strings, skipping unset (0.0.0.0) slots
    pub fn to_strings(&self) -> Vec<String> {
        self.addresses
            .iter()
            .filter(|a| **a != [0u8; 4])
            .map(|a| format!("{}.{}.{}.{}", a[0], a[1], a[2], a[3]))
            .collect()
    }
}

/// Committee announcement signed by the arbitrator (BroadcastComputors)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committee {
    pub epoch: u16,
    pub public_keys: Vec<PublicKey>,
    pub signature: Signature,
}

impl Committee {
    pub fn length(params: &ProtocolParams) -> usize {
        2 + 32 * params.number_of_computors + 64
    }

    pub(crate) fn decode(payload: &[u8], params: &ProtocolParams) -> Self {
        let mut reader = Reader::new(payload);
        Self {
            epoch: reader.u16(),
            public_keys: reader.digests(params.number_of_computors),
            signature: reader.array(),
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.epoch.to_le_bytes());
        for key in &self.public_keys {
            out.extend_from_slice(key);
        }
        out.extend_from_slice(&self.signature);
    }

    /// Digest the arbitrator signs: H(epoch ‖ public keys)
    pub fn digest(&self, crypto: &dyn Crypto) -> Digest {
        committee_digest(crypto, self.epoch, &self.public_keys)
    }

    /// An all-zero committee is a placeholder some nodes send before they
    /// learn the real one.
    pub fn is_empty(&self) -> bool {
        self.public_keys.iter().all(|key| *key == [0u8; 32])
    }
}

pub fn committee_digest(crypto: &dyn Crypto, epoch: u16, public_keys: &[PublicKey]) -> Digest {
    let mut bytes = Vec::with_capacity(2 + 32 * public_keys.len());
    bytes.extend_from_slice(&epoch.to_le_bytes());
    for key in public_keys {
        bytes.extend_from_slice(key);
    }
    crypto.digest(&bytes)
}

/// Request for the votes of one tick; a set bit means "already have it"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuorumTickRequest {
    pub tick: u32,
    pub vote_flags: Vec<u8>,
}

impl QuorumTickRequest {
    pub fn length(params: &ProtocolParams) -> usize {
        4 + params.vote_flags_length()
    }

    pub fn new(tick: u32, params: &ProtocolParams) -> Self {
        Self {
            tick,
            vote_flags: vec![0u8; params.vote_flags_length()],
        }
    }

    pub(crate) fn decode(payload: &[u8], params: &ProtocolParams) -> Self {
        let mut reader = Reader::new(payload);
        Self {
            tick: reader.u32(),
            vote_flags: reader.slice(params.vote_flags_length()).to_vec(),
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.tick.to_le_bytes());
        out.extend_from_slice(&self.vote_flags);
    }

    pub fn has_vote(&self, computor_index: usize) -> bool {
        self.vote_flags
            .get(computor_index >> 3)
            .map_or(false, |byte| byte & (1 << (computor_index & 7)) != 0)
    }

    pub fn set_vote(&mut self, computor_index: usize) {
        if let Some(byte) = self.vote_flags.get_mut(computor_index >> 3) {
            *byte |= 1 << (computor_index & 7);
        }
    }
}

/// A node's view of the current tick (RespondCurrentTickInfo)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CurrentTickInfo {
    pub tick_duration: u16,
    pub epoch: u16,
    pub tick: u32,
    pub number_of_aligned_votes: u16,
    pub number_of_misaligned_votes: u16,
    pub initial_tick: u32,
}

impl CurrentTickInfo {
    pub const LENGTH: usize = 16;

    pub(crate) fn decode(payload: &[u8]) -> Self {
        let mut reader = Reader::new(payload);
        Self {
            tick_duration: reader.u16(),
            epoch: reader.u16(),
            tick: reader.u32(),
            number_of_aligned_votes: reader.u16(),
            number_of_misaligned_votes: reader.u16(),
            initial_tick: reader.u32(),
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.tick_duration.to_le_bytes());
        out.extend_from_slice(&self.epoch.to_le_bytes());
        out.extend_from_slice(&self.tick.to_le_bytes());
        out.extend_from_slice(&self.number_of_aligned_votes.to_le_bytes());
        out.extend_from_slice(&self.number_of_misaligned_votes.to_le_bytes());
        out.extend_from_slice(&self.initial_tick.to_le_bytes());
    }
}

/// Length of the spectrum leaf (public key up to the latest outgoing tick)
pub const ENTITY_LEAF_LENGTH: usize = 64;

/// Account proof returned by a node (RespondEntity)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityResponse {
    pub public_key: PublicKey,
    pub incoming_amount: u64,
    pub outgoing_amount: u64,
    pub number_of_incoming_transfers: u32,
    pub number_of_outgoing_transfers: u32,
    pub latest_incoming_transfer_tick: u32,
    pub latest_outgoing_transfer_tick: u32,
    pub tick: u32,
    /// Leaf index in the spectrum; negative when the entity is absent
    pub spectrum_index: i32,
    pub siblings: Vec<Digest>,
}

impl EntityResponse {
    pub fn length(params: &ProtocolParams) -> usize {
        ENTITY_LEAF_LENGTH + 8 + 32 * params.spectrum_depth
    }

    pub(crate) fn decode(payload: &[u8], params: &ProtocolParams) -> Self {
        let mut reader = Reader::new(payload);
        Self {
            public_key: reader.array(),
            incoming_amount: reader.u64(),
            outgoing_amount: reader.u64(),
            number_of_incoming_transfers: reader.u32(),
            number_of_outgoing_transfers: reader.u32(),
            latest_incoming_transfer_tick: reader.u32(),
            latest_outgoing_transfer_tick: reader.u32(),
            tick: reader.u32(),
            spectrum_index: reader.i32(),
            siblings: reader.digests(params.spectrum_depth),
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.leaf());
        out.extend_from_slice(&self.tick.to_le_bytes());
        out.extend_from_slice(&self.spectrum_index.to_le_bytes());
        for sibling in &self.siblings {
            out.extend_from_slice(sibling);
        }
    }

    /// Bytes hashed into the spectrum leaf
    pub fn leaf(&self) -> [u8; ENTITY_LEAF_LENGTH] {
        let mut leaf = [0u8; ENTITY_LEAF_LENGTH];
        leaf[..32].copy_from_slice(&self.public_key);
        leaf[32..40].copy_from_slice(&self.incoming_amount.to_le_bytes());
        leaf[40..48].copy_from_slice(&self.outgoing_amount.to_le_bytes());
        leaf[48..52].copy_from_slice(&self.number_of_incoming_transfers.to_le_bytes());
        leaf[52..56].copy_from_slice(&self.number_of_outgoing_transfers.to_le_bytes());
        leaf[56..60].copy_from_slice(&self.latest_incoming_transfer_tick.to_le_bytes());
        leaf[60..64].copy_from_slice(&self.latest_outgoing_transfer_tick.to_le_bytes());
        leaf
    }
}
