//! Light client consensus - committee tracking and quorum tick confirmation
//!
//! Architecture:
//! - Epoch manager bootstraps from an arbitrator-signed checkpoint and
//!   advances only on committees vouched for by enough distinct peers
//! - Vote table keeps one verified vote per computor per tick
//! - Quorum tracker confirms a tick once it and its successor reach
//!   2N/3+1 agreeing votes and the salted digests chain
//! - Confirmed ticks land in a bounded ring served to peers and wallets

pub mod epoch;
pub mod error;
pub mod merkle;
pub mod quorum;
pub mod ring;
pub mod time;
pub mod types;
pub mod votes;

pub use epoch::{CommitteeOutcome, EpochManager, EpochPhase, EpochRecord, Rejection, TrustAnchor};
pub use error::EpochError;
pub use merkle::{merkle_root, verify_inclusion};
pub use quorum::{detect_quorum_tick, is_predecessor, QuorumTracker};
pub use ring::TickRing;
pub use time::{format_tick_time, infer_epoch, is_valid_tick_time, Clock, FixedClock, SystemClock};
pub use types::*;
pub use votes::{StoredVote, VoteAdmission, VoteTable};
