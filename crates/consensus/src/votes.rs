//! Vote table: at most one verified vote per computor per tick

use lrv_wire::{PublicKey, TickVote};
use std::collections::BTreeMap;

/// A verified vote together with the committee key that signed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredVote {
    pub vote: TickVote,
    pub public_key: PublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteAdmission {
    /// First vote of this computor for this tick
    Stored,
    /// Byte-identical to the stored vote
    Duplicate,
    /// Differs from the stored vote; the stored one is kept
    Conflicting,
}

pub struct VoteTable {
    number_of_computors: usize,
    ticks: BTreeMap<u32, Vec<Option<StoredVote>>>,
}

impl VoteTable {
    pub fn new(number_of_computors: usize) -> Self {
        Self {
            number_of_computors,
            ticks: BTreeMap::new(),
        }
    }

    /// Store a verified vote. The computor index must be below N.
    pub fn insert(&mut self, vote: TickVote, public_key: PublicKey) -> VoteAdmission {
        let index = usize::from(vote.computor_index);
        let slots = self
            .ticks
            .entry(vote.tick)
            .or_insert_with(|| vec![None; self.number_of_computors]);

        match slots.get_mut(index) {
            Some(Some(stored)) if stored.vote.same_content(&vote) => VoteAdmission::Duplicate,
            Some(Some(_)) => VoteAdmission::Conflicting,
            Some(slot) => {
                *slot = Some(StoredVote { vote, public_key });
                VoteAdmission::Stored
            }
            None => VoteAdmission::Conflicting,
        }
    }

    /// Slots of a tick indexed by computor; empty when nothing is stored
    pub fn slots(&self, tick: u32) -> &[Option<StoredVote>] {
        self.ticks.get(&tick).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, tick: u32) -> usize {
        self.slots(tick).iter().flatten().count()
    }

    pub fn get(&self, tick: u32, computor_index: usize) -> Option<&StoredVote> {
        self.slots(tick).get(computor_index).and_then(Option::as_ref)
    }

    /// Drop every tick up to and including `tick`
    pub fn evict_through(&mut self, tick: u32) {
        self.ticks = match tick.checked_add(1) {
            Some(first_kept) => self.ticks.split_off(&first_kept),
            None => BTreeMap::new(),
        };
    }

    pub fn number_of_ticks(&self) -> usize {
        self.ticks.len()
    }
}
