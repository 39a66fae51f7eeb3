//! Protocol parameters shared by every layer
//!
//! The committee size and the Merkle depths are network constants. They are
//! carried at runtime so that tests can run a small committee (N = 7).

use serde::{Deserialize, Serialize};

/// Committee size and proof depths of the network being followed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolParams {
    /// Number of computors in a committee (N)
    pub number_of_computors: usize,
    /// Depth of the spectrum (entity) Merkle tree
    pub spectrum_depth: usize,
    /// Depth of the universe (asset) Merkle tree
    pub assets_depth: usize,
}

impl ProtocolParams {
    pub const fn new(number_of_computors: usize, spectrum_depth: usize, assets_depth: usize) -> Self {
        Self {
            number_of_computors,
            spectrum_depth,
            assets_depth,
        }
    }

    /// Minimum number of agreeing votes: ⌊2N/3⌋ + 1
    pub const fn quorum(&self) -> usize {
        self.number_of_computors * 2 / 3 + 1
    }

    /// Largest committee churn tolerated between two consecutive epochs
    pub const fn tolerated_replacements(&self) -> usize {
        self.number_of_computors - self.quorum()
    }

    /// Length of the vote flag bitmap carried by quorum tick requests
    pub const fn vote_flags_length(&self) -> usize {
        (self.number_of_computors + 7) / 8
    }
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self::new(676, 24, 24)
    }
}
