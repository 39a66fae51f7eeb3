//! Quorum tick detection
//!
//! A tick is decided when QUORUM stored votes agree on time, prior state
//! digests and transaction digest. It is confirmed only when its successor is
//! decided too and every agreeing vote's salted digests chain onto the state
//! the successor reports as previous.

use crate::ring::TickRing;
use crate::time::format_tick_time;
use crate::types::{ConfirmedTick, QuorumTick, StateDigests};
use crate::votes::{StoredVote, VoteAdmission, VoteTable};
use lrv_wire::{Crypto, ProtocolParams, PublicKey, TickVote};

/// Whether `vote` is the legitimate predecessor of `next`.
///
/// Each salted digest is H(public key ‖ next.prev_X); a stage is evaluated only
/// when the previous stage matched.
pub fn is_predecessor(crypto: &dyn Crypto, public_key: &PublicKey, vote: &TickVote, next: &QuorumTick) -> bool {
    let mut salted = [0u8; 64];
    salted[..32].copy_from_slice(public_key);

    salted[32..40].copy_from_slice(&next.prev_resource_testing_digest);
    let mut resource_testing = [0u8; 8];
    crypto.hash_into(&salted[..40], &mut resource_testing);
    if resource_testing != vote.salted_resource_testing_digest {
        return false;
    }

    let mut stage = |prev: &[u8; 32], expected: &[u8; 32]| {
        salted[32..].copy_from_slice(prev);
        crypto.digest(&salted) == *expected
    };
    stage(&next.prev_spectrum_digest, &vote.salted_spectrum_digest)
        && stage(&next.prev_universe_digest, &vote.salted_universe_digest)
        && stage(&next.prev_computer_digest, &vote.salted_computer_digest)
}

fn aligned(a: &TickVote, b: &TickVote) -> bool {
    a.time == b.time
        && a.prev_spectrum_digest == b.prev_spectrum_digest
        && a.prev_universe_digest == b.prev_universe_digest
        && a.prev_computer_digest == b.prev_computer_digest
        && a.transaction_digest == b.transaction_digest
}

fn quorum_tick(matches: &[&StoredVote], number_of_misaligned_votes: u16) -> QuorumTick {
    let anchor = &matches[0].vote;
    QuorumTick {
        tick: anchor.tick,
        epoch: anchor.epoch,
        time: anchor.time,
        timestamp: format_tick_time(&anchor.time),
        prev_resource_testing_digest: anchor.prev_resource_testing_digest,
        prev_spectrum_digest: anchor.prev_spectrum_digest,
        prev_universe_digest: anchor.prev_universe_digest,
        prev_computer_digest: anchor.prev_computer_digest,
        transaction_digest: anchor.transaction_digest,
        computor_indices: matches.iter().map(|stored| stored.vote.computor_index).collect(),
        number_of_misaligned_votes,
        votes: matches.iter().map(|stored| stored.vote.clone()).collect(),
    }
}

/// Search the slots of one tick for QUORUM agreeing votes.
///
/// Anchors are tried in index order and the first anchor that gathers a
/// quorum wins. With `next` given, only votes chaining onto it count.
pub fn detect_quorum_tick(
    crypto: &dyn Crypto,
    slots: &[Option<StoredVote>],
    quorum: usize,
    next: Option<&QuorumTick>,
) -> Option<QuorumTick> {
    let n = slots.len();
    if quorum == 0 || quorum > n || slots.iter().flatten().count() < quorum {
        return None;
    }
    let chained = |stored: &StoredVote| {
        next.map_or(true, |next| is_predecessor(crypto, &stored.public_key, &stored.vote, next))
    };

    for (i, anchor) in slots.iter().enumerate() {
        if let Some(anchor) = anchor.as_ref().filter(|anchor| chained(*anchor)) {
            let mut matches = vec![anchor];
            let mut misaligned: u16 = 0;
            if matches.len() == quorum {
                return Some(quorum_tick(&matches, misaligned));
            }

            for (j, candidate) in slots.iter().enumerate() {
                if let Some(candidate) = candidate.as_ref().filter(|_| j != i) {
                    if aligned(&anchor.vote, &candidate.vote) && chained(candidate) {
                        matches.push(candidate);
                        if matches.len() == quorum {
                            return Some(quorum_tick(&matches, misaligned));
                        }
                    } else {
                        misaligned = misaligned.saturating_add(1);
                    }
                }
                if matches.len() + (n - j) < quorum {
                    break;
                }
            }
        }

        // Later anchors can't collect a quorum any more
        if i > n - quorum {
            return None;
        }
    }

    None
}

/// Vote table plus the ring of confirmed ticks
pub struct QuorumTracker {
    params: ProtocolParams,
    votes: VoteTable,
    confirmed: TickRing,
}

impl QuorumTracker {
    pub fn new(params: ProtocolParams, number_of_stored_ticks: usize) -> Self {
        Self {
            params,
            votes: VoteTable::new(params.number_of_computors),
            confirmed: TickRing::new(number_of_stored_ticks),
        }
    }

    pub fn votes(&self) -> &VoteTable {
        &self.votes
    }

    pub fn confirmed(&self) -> &TickRing {
        &self.confirmed
    }

    pub fn latest(&self) -> Option<&ConfirmedTick> {
        self.confirmed.latest()
    }

    /// Store a verified vote; the caller has checked index, epoch and signature.
    pub fn insert_vote(&mut self, vote: TickVote, public_key: PublicKey) -> VoteAdmission {
        self.votes.insert(vote, public_key)
    }

    /// Undecided unless a quorum of stored votes agrees
    pub fn detect(&self, crypto: &dyn Crypto, tick: u32, next: Option<&QuorumTick>) -> Option<QuorumTick> {
        detect_quorum_tick(crypto, self.votes.slots(tick), self.params.quorum(), next)
    }

    /// Confirm `tick` if it and `tick + 1` are decided and chained.
    ///
    /// Ticks at or below the latest confirmed tick are never confirmed again.
    pub fn try_confirm(&mut self, crypto: &dyn Crypto, tick: u32) -> Option<ConfirmedTick> {
        if self.latest().map_or(false, |latest| tick <= latest.tick()) {
            return None;
        }
        let next = self.detect(crypto, tick.checked_add(1)?, None)?;
        let quorum = self.detect(crypto, tick, Some(&next))?;

        let confirmed = ConfirmedTick {
            quorum,
            digests: StateDigests::from_successor(&next),
        };
        self.confirmed.push(confirmed.clone());
        self.votes.evict_through(tick);
        tracing::debug!(tick, epoch = confirmed.epoch(), "Quorum tick confirmed");
        Some(confirmed)
    }

    /// A vote for `tick` can complete either `tick - 1` (as successor) or
    /// `tick` itself (if `tick + 1` already has a quorum).
    pub fn confirm_around(&mut self, crypto: &dyn Crypto, tick: u32) -> Vec<ConfirmedTick> {
        let mut confirmed = Vec::new();
        if let Some(previous) = tick.checked_sub(1) {
            confirmed.extend(self.try_confirm(crypto, previous));
        }
        confirmed.extend(self.try_confirm(crypto, tick));
        confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lrv_wire::{DefaultCrypto, Digest, TickTime};
    use proptest::prelude::*;

    const QUORUM: usize = 5;

    fn params() -> ProtocolParams {
        ProtocolParams::new(7, 4, 4)
    }

    fn key(index: u16) -> PublicKey {
        [index as u8 + 1; 32]
    }

    /// State produced by `tick` in the honest history
    fn state(tick: u32) -> ([u8; 8], Digest, Digest, Digest) {
        let b = tick as u8;
        ([b; 8], [b.wrapping_add(1); 32], [b.wrapping_add(2); 32], [b.wrapping_add(3); 32])
    }

    fn honest_vote(crypto: &DefaultCrypto, tick: u32, index: u16) -> TickVote {
        let (prev_rt, prev_spectrum, prev_universe, prev_computer) = state(tick - 1);
        let (rt, spectrum, universe, computer) = state(tick);
        let public_key = key(index);

        let mut salted_rt = [0u8; 8];
        let mut input = public_key.to_vec();
        input.extend_from_slice(&rt);
        crypto.hash_into(&input, &mut salted_rt);
        let salt = |digest: &Digest| {
            let mut input = public_key.to_vec();
            input.extend_from_slice(digest);
            crypto.digest(&input)
        };

        TickVote {
            computor_index: index,
            epoch: 100,
            tick,
            time: TickTime {
                millisecond: 0,
                second: (tick % 60) as u8,
                minute: 0,
                hour: 0,
                day: 1,
                month: 1,
                year: 24,
            },
            prev_resource_testing_digest: prev_rt,
            salted_resource_testing_digest: salted_rt,
            prev_spectrum_digest: prev_spectrum,
            prev_universe_digest: prev_universe,
            prev_computer_digest: prev_computer,
            salted_spectrum_digest: salt(&spectrum),
            salted_universe_digest: salt(&universe),
            salted_computer_digest: salt(&computer),
            transaction_digest: [tick as u8; 32],
            expected_next_tick_transaction_digest: [0; 32],
            signature: [0; 64],
        }
    }

    fn slots(votes: Vec<TickVote>) -> Vec<Option<StoredVote>> {
        let mut slots = vec![None; 7];
        for vote in votes {
            let index = usize::from(vote.computor_index);
            slots[index] = Some(StoredVote {
                public_key: key(vote.computor_index),
                vote,
            });
        }
        slots
    }

    #[test]
    fn test_four_votes_undecided_fifth_decides() {
        let crypto = DefaultCrypto::new();
        let mut votes: Vec<TickVote> = (0..4).map(|i| honest_vote(&crypto, 10, i)).collect();
        assert!(detect_quorum_tick(&crypto, &slots(votes.clone()), QUORUM, None).is_none());

        votes.push(honest_vote(&crypto, 10, 6));
        let quorum = detect_quorum_tick(&crypto, &slots(votes), QUORUM, None).unwrap();

        let mut indices = quorum.computor_indices.clone();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2, 3, 6]);
        assert_eq!(quorum.tick, 10);
        assert_eq!(quorum.votes.len(), QUORUM);
        assert_eq!(quorum.timestamp, "01-01-24T00:00:10.000");
    }

    #[test]
    fn test_misaligned_votes_counted() {
        let crypto = DefaultCrypto::new();
        let mut votes: Vec<TickVote> = (0..7).map(|i| honest_vote(&crypto, 10, i)).collect();
        votes[0].transaction_digest = [0xEE; 32];
        votes[1].time.millisecond = 1;

        let quorum = detect_quorum_tick(&crypto, &slots(votes), QUORUM, None).unwrap();
        assert_eq!(quorum.computor_indices, vec![2, 3, 4, 5, 6]);
        assert_eq!(quorum.number_of_misaligned_votes, 2);
    }

    #[test]
    fn test_split_vote_undecided() {
        let crypto = DefaultCrypto::new();
        let mut votes: Vec<TickVote> = (0..7).map(|i| honest_vote(&crypto, 10, i)).collect();
        for vote in votes.iter_mut().take(3) {
            vote.prev_universe_digest = [0xAA; 32];
        }
        assert!(detect_quorum_tick(&crypto, &slots(votes), QUORUM, None).is_none());
    }

    #[test]
    fn test_chain_check_filters_votes() {
        let crypto = DefaultCrypto::new();
        let next_votes: Vec<TickVote> = (0..5).map(|i| honest_vote(&crypto, 11, i)).collect();
        let next = detect_quorum_tick(&crypto, &slots(next_votes), QUORUM, None).unwrap();

        let mut votes: Vec<TickVote> = (0..7).map(|i| honest_vote(&crypto, 10, i)).collect();
        assert!(is_predecessor(&crypto, &key(0), &votes[0], &next));

        // three computors salt a different computer digest
        for vote in votes.iter_mut().take(3) {
            vote.salted_computer_digest = [0; 32];
        }
        assert!(!is_predecessor(&crypto, &key(0), &votes[0], &next));
        assert!(detect_quorum_tick(&crypto, &slots(votes), QUORUM, Some(&next)).is_none());
    }

    #[test]
    fn test_confirmation_needs_successor() {
        let crypto = DefaultCrypto::new();
        let mut tracker = QuorumTracker::new(params(), 16);

        for i in 0..5 {
            tracker.insert_vote(honest_vote(&crypto, 10, i), key(i));
        }
        assert!(tracker.confirm_around(&crypto, 10).is_empty());

        for i in 0..4 {
            tracker.insert_vote(honest_vote(&crypto, 11, i), key(i));
            assert!(tracker.confirm_around(&crypto, 11).is_empty());
        }
        tracker.insert_vote(honest_vote(&crypto, 11, 4), key(4));
        let confirmed = tracker.confirm_around(&crypto, 11);

        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].tick(), 10);
        let (rt, spectrum, universe, computer) = state(10);
        assert_eq!(
            confirmed[0].digests,
            StateDigests {
                resource_testing: rt,
                spectrum,
                universe,
                computer,
            }
        );
        // votes for 10 evicted, 11 kept
        assert_eq!(tracker.votes().count(10), 0);
        assert_eq!(tracker.votes().count(11), 5);
        assert!(tracker.try_confirm(&crypto, 10).is_none());
    }

    #[test]
    fn test_forked_successor_blocks_confirmation() {
        let crypto = DefaultCrypto::new();
        let mut tracker = QuorumTracker::new(params(), 16);
        for i in 0..7 {
            tracker.insert_vote(honest_vote(&crypto, 10, i), key(i));
            let mut forked = honest_vote(&crypto, 11, i);
            forked.prev_spectrum_digest = [0x77; 32];
            tracker.insert_vote(forked, key(i));
        }

        assert!(tracker.detect(&crypto, 11, None).is_some());
        assert!(tracker.try_confirm(&crypto, 10).is_none());
        assert!(tracker.latest().is_none());
    }

    #[test]
    fn test_confirmed_ticks_strictly_increase() {
        let crypto = DefaultCrypto::new();
        let mut tracker = QuorumTracker::new(params(), 2);
        let mut confirmed = Vec::new();
        for tick in 20..25 {
            for i in 0..5 {
                tracker.insert_vote(honest_vote(&crypto, tick, i), key(i));
            }
            confirmed.extend(tracker.confirm_around(&crypto, tick));
        }

        let ticks: Vec<u32> = confirmed.iter().map(ConfirmedTick::tick).collect();
        assert_eq!(ticks, vec![20, 21, 22, 23]);
        assert_eq!(tracker.confirmed().len(), 2);
        assert_eq!(tracker.confirmed().oldest().unwrap().tick(), 22);
        assert!(tracker.confirmed().get(23).is_some());
        assert!(tracker.confirmed().get(21).is_none());
    }

    proptest! {
        #[test]
        fn prop_no_premature_confirmation(order in Just((0..14usize).collect::<Vec<_>>()).prop_shuffle()) {
            let crypto = DefaultCrypto::new();
            let mut tracker = QuorumTracker::new(params(), 16);
            // 7 votes for tick 30 and 7 for tick 31
            let votes: Vec<TickVote> = (0..14)
                .map(|n| honest_vote(&crypto, 30 + (n / 7) as u32, (n % 7) as u16))
                .collect();

            let mut confirmations = Vec::new();
            let mut seen = [0usize; 2];
            for n in order {
                let vote = votes[n].clone();
                let tick = vote.tick;
                seen[(tick - 30) as usize] += 1;
                tracker.insert_vote(vote, key((n % 7) as u16));

                let confirmed = tracker.confirm_around(&crypto, tick);
                if !confirmed.is_empty() {
                    prop_assert!(seen[0] >= QUORUM && seen[1] >= QUORUM);
                }
                confirmations.extend(confirmed);
            }

            prop_assert_eq!(confirmations.len(), 1);
            prop_assert_eq!(confirmations[0].tick(), 30);
        }
    }
}
