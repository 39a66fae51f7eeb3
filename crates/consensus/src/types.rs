//! Core types for quorum tick verification

use lrv_wire::{Digest, TickTime, TickVote};
use serde::Serialize;

/// A tick on which a quorum of computors agreed bit for bit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuorumTick {
    /// Tick number
    pub tick: u32,
    /// Epoch the votes were cast in
    pub epoch: u16,
    /// Agreed wall-clock fields
    pub time: TickTime,
    /// `MM-DD-YYThh:mm:ss.mmm`
    pub timestamp: String,
    /// Digests of the state before this tick
    pub prev_resource_testing_digest: [u8; 8],
    pub prev_spectrum_digest: Digest,
    pub prev_universe_digest: Digest,
    pub prev_computer_digest: Digest,
    /// Digest of the transactions included in this tick
    pub transaction_digest: Digest,
    /// Indices of the agreeing computors (exactly QUORUM of them)
    pub computor_indices: Vec<u16>,
    /// Votes seen during the search that disagreed with the winning anchor
    pub number_of_misaligned_votes: u16,
    /// The agreeing votes, kept so they can be served to other peers
    #[serde(skip)]
    pub votes: Vec<TickVote>,
}

/// Digests of the state produced by a confirmed tick.
///
/// They are read from the following quorum tick's `prev_*` fields, which is
/// why a tick can only be confirmed once its successor has a quorum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateDigests {
    pub resource_testing: [u8; 8],
    pub spectrum: Digest,
    pub universe: Digest,
    pub computer: Digest,
}

impl StateDigests {
    pub fn from_successor(next: &QuorumTick) -> Self {
        Self {
            resource_testing: next.prev_resource_testing_digest,
            spectrum: next.prev_spectrum_digest,
            universe: next.prev_universe_digest,
            computer: next.prev_computer_digest,
        }
    }
}

/// A quorum tick whose successor also reached quorum and chains onto it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmedTick {
    pub quorum: QuorumTick,
    pub digests: StateDigests,
}

impl ConfirmedTick {
    pub fn tick(&self) -> u32 {
        self.quorum.tick
    }

    pub fn epoch(&self) -> u16 {
        self.quorum.epoch
    }
}
