//! Epoch/committee tracking
//!
//! Committees are accepted only with a valid arbitrator signature and never
//! ahead of the wall-clock epoch. A new epoch becomes active once enough
//! distinct peers have vouched for the same committee and the churn from the
//! previous committee is within tolerance.

use crate::error::EpochError;
use lrv_wire::{Committee, Crypto, Digest, ProtocolParams, PublicKey, Signature};
use std::collections::{BTreeMap, HashSet};

/// Externally configured root of trust
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchor {
    /// Key that signs every committee
    pub arbitrator: PublicKey,
    /// Arbitrator-signed committee the client starts from
    pub checkpoint: Committee,
}

/// One epoch's committee
#[derive(Debug, Clone)]
pub struct EpochRecord {
    pub epoch: u16,
    pub public_keys: Vec<PublicKey>,
    pub digest: Digest,
    pub signature: Signature,
    /// Sticky per-computor flag, set on conflicting votes
    faulty: Vec<bool>,
    /// Distinct peer addresses that sent this exact committee
    vouchers: HashSet<String>,
}

impl EpochRecord {
    fn new(committee: &Committee, digest: Digest) -> Self {
        Self {
            epoch: committee.epoch,
            public_keys: committee.public_keys.clone(),
            digest,
            signature: committee.signature,
            faulty: vec![false; committee.public_keys.len()],
            vouchers: HashSet::new(),
        }
    }

    pub fn public_key(&self, index: usize) -> Option<&PublicKey> {
        self.public_keys.get(index)
    }

    pub fn is_faulty(&self, index: usize) -> bool {
        self.faulty.get(index).copied().unwrap_or(false)
    }

    pub fn number_of_vouchers(&self) -> usize {
        self.vouchers.len()
    }

    /// Rebuild the broadcast so it can be served to other peers
    pub fn to_committee(&self) -> Committee {
        Committee {
            epoch: self.epoch,
            public_keys: self.public_keys.clone(),
            signature: self.signature,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpochPhase {
    /// No committee seen yet
    Uninitialized,
    /// Running on the checkpoint committee
    Bootstrapped(u16),
    /// Running on a committee adopted from the network
    Active(u16),
    /// Trust anchor violated; terminal
    Poisoned(EpochError),
}

/// Why a committee broadcast was refused; the sending peer gets dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    FutureEpoch { epoch: u16, inferred: u16 },
    BadSignature { epoch: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitteeOutcome {
    Rejected(Rejection),
    /// Placeholder committee with no keys
    Ignored,
    /// Older than anything tracked
    Stale,
    /// Already tracked and unchanged
    Known,
    /// New epoch stored, waiting for vouchers
    Provisional,
    /// Vouch recorded for a waiting epoch
    Vouched,
    /// The active epoch moved
    Advanced { from: u16, to: u16 },
    /// Manager is poisoned; nothing is processed
    Halted,
}

pub struct EpochManager {
    params: ProtocolParams,
    anchor: TrustAnchor,
    min_vouchers: usize,
    phase: EpochPhase,
    epochs: BTreeMap<u16, EpochRecord>,
}

impl EpochManager {
    pub fn new(params: ProtocolParams, anchor: TrustAnchor, min_vouchers: usize) -> Self {
        Self {
            params,
            anchor,
            min_vouchers: min_vouchers.max(1),
            phase: EpochPhase::Uninitialized,
            epochs: BTreeMap::new(),
        }
    }

    /// ⌊⅔·min_public_peers⌋ + 1
    pub fn vouchers_required(min_public_peers: usize) -> usize {
        min_public_peers * 2 / 3 + 1
    }

    pub fn phase(&self) -> &EpochPhase {
        &self.phase
    }

    /// Epoch whose committee currently signs ticks
    pub fn current_epoch(&self) -> Option<u16> {
        match self.phase {
            EpochPhase::Bootstrapped(epoch) | EpochPhase::Active(epoch) => Some(epoch),
            EpochPhase::Uninitialized | EpochPhase::Poisoned(_) => None,
        }
    }

    pub fn is_poisoned(&self) -> bool {
        matches!(self.phase, EpochPhase::Poisoned(_))
    }

    pub fn committee(&self, epoch: u16) -> Option<&EpochRecord> {
        self.epochs.get(&epoch)
    }

    pub fn active(&self) -> Option<&EpochRecord> {
        self.current_epoch().and_then(|epoch| self.epochs.get(&epoch))
    }

    pub fn is_faulty(&self, epoch: u16, index: usize) -> bool {
        self.epochs.get(&epoch).map_or(false, |record| record.is_faulty(index))
    }

    /// Flag a computor; returns true the first time
    pub fn mark_faulty(&mut self, epoch: u16, index: usize) -> bool {
        match self.epochs.get_mut(&epoch).and_then(|record| record.faulty.get_mut(index)) {
            Some(flag) if !*flag => {
                *flag = true;
                true
            }
            _ => false,
        }
    }

    /// Process a committee broadcast from `peer`.
    ///
    /// `Err` means the manager just became poisoned.
    pub fn handle_committee(
        &mut self,
        committee: &Committee,
        peer: &str,
        inferred_epoch: u16,
        crypto: &dyn Crypto,
    ) -> Result<CommitteeOutcome, EpochError> {
        if self.is_poisoned() {
            return Ok(CommitteeOutcome::Halted);
        }
        if committee.epoch > inferred_epoch {
            return Ok(CommitteeOutcome::Rejected(Rejection::FutureEpoch {
                epoch: committee.epoch,
                inferred: inferred_epoch,
            }));
        }

        let digest = committee.digest(crypto);
        if !crypto.verify(&self.anchor.arbitrator, &digest, &committee.signature) {
            return Ok(CommitteeOutcome::Rejected(Rejection::BadSignature {
                epoch: committee.epoch,
            }));
        }
        if committee.is_empty() {
            return Ok(CommitteeOutcome::Ignored);
        }

        if self.phase == EpochPhase::Uninitialized {
            self.bootstrap(crypto)?;
        }
        let current = self.current_epoch().unwrap_or_default();

        let known_digest = self.epochs.get(&committee.epoch).map(|record| record.digest);
        let outcome = match known_digest {
            Some(known) if known != digest => {
                return Err(self.poison(EpochError::ConflictingDigest(committee.epoch)));
            }
            Some(_) => {
                let vouched = committee.epoch > current
                    && self
                        .epochs
                        .get_mut(&committee.epoch)
                        .map_or(false, |record| record.vouchers.insert(peer.to_string()));
                if vouched {
                    CommitteeOutcome::Vouched
                } else {
                    CommitteeOutcome::Known
                }
            }
            None if committee.epoch > current => {
                let mut record = EpochRecord::new(committee, digest);
                record.vouchers.insert(peer.to_string());
                self.epochs.insert(committee.epoch, record);
                tracing::debug!(epoch = committee.epoch, peer, "Stored provisional committee");
                CommitteeOutcome::Provisional
            }
            None => return Ok(CommitteeOutcome::Stale),
        };

        match self.try_advance(inferred_epoch)? {
            Some((from, to)) => Ok(CommitteeOutcome::Advanced { from, to }),
            None => Ok(outcome),
        }
    }

    fn bootstrap(&mut self, crypto: &dyn Crypto) -> Result<(), EpochError> {
        let checkpoint = &self.anchor.checkpoint;
        let epoch = checkpoint.epoch;
        let digest = checkpoint.digest(crypto);
        let valid = checkpoint.public_keys.len() == self.params.number_of_computors
            && crypto.verify(&self.anchor.arbitrator, &digest, &checkpoint.signature);
        if !valid {
            return Err(self.poison(EpochError::InvalidCheckpoint(epoch)));
        }

        let record = EpochRecord::new(&self.anchor.checkpoint, digest);
        self.epochs.insert(epoch, record);
        self.phase = EpochPhase::Bootstrapped(epoch);
        tracing::info!(epoch, "Bootstrapped from checkpoint");
        Ok(())
    }

    /// Adopt the inferred epoch once every epoch up to it is corroborated
    fn try_advance(&mut self, inferred_epoch: u16) -> Result<Option<(u16, u16)>, EpochError> {
        let Some(current) = self.current_epoch() else {
            return Ok(None);
        };
        if inferred_epoch <= current {
            return Ok(None);
        }

        for epoch in current + 1..=inferred_epoch {
            match self.epochs.get(&epoch) {
                Some(record) if record.vouchers.len() >= self.min_vouchers => {}
                _ => return Ok(None),
            }
        }

        for epoch in current..inferred_epoch {
            let replaced = match (self.epochs.get(&epoch), self.epochs.get(&(epoch + 1))) {
                (Some(previous), Some(next)) => {
                    let next_keys: HashSet<&PublicKey> = next.public_keys.iter().collect();
                    previous
                        .public_keys
                        .iter()
                        .filter(|key| !next_keys.contains(key))
                        .count()
                }
                // Gaps were ruled out above
                _ => continue,
            };
            if replaced > self.params.tolerated_replacements() {
                return Err(self.poison(EpochError::IllegalReplacement {
                    from: epoch,
                    to: epoch + 1,
                    replaced,
                }));
            }
        }

        self.phase = EpochPhase::Active(inferred_epoch);
        self.epochs.retain(|epoch, _| *epoch >= inferred_epoch);
        tracing::info!(from = current, to = inferred_epoch, "Epoch advanced");
        Ok(Some((current, inferred_epoch)))
    }

    fn poison(&mut self, error: EpochError) -> EpochError {
        tracing::error!("{}", error);
        self.phase = EpochPhase::Poisoned(error.clone());
        error
    }
}
