//! Trust anchor failures
//!
//! Each of these leaves the epoch manager poisoned; nothing is confirmed
//! afterwards until the client is restarted with a new anchor.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EpochError {
    #[error("checkpoint for epoch {0} is not signed by the arbitrator")]
    InvalidCheckpoint(u16),

    #[error("illegal computor replacement: {replaced} of the epoch {from} computors are missing from epoch {to}, replace arbitrator")]
    IllegalReplacement { from: u16, to: u16, replaced: usize },

    #[error("conflicting committee digests for epoch {0}, replace arbitrator")]
    ConflictingDigest(u16),
}
