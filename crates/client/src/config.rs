//! Client configuration

use crate::error::ClientError;
use lrv_consensus::{EpochManager, TrustAnchor};
use lrv_wire::{
    identity_to_public_key, string_to_signature, Committee, Crypto, ProtocolParams,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Arbitrator-signed committee the client trusts at startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub epoch: u16,
    /// Computor identities in index order
    pub computors: Vec<String>,
    /// Arbitrator signature over the committee digest
    pub signature: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustAnchorConfig {
    /// Identity of the arbitrator key
    pub arbitrator: String,
    pub checkpoint: Checkpoint,
}

impl TrustAnchorConfig {
    /// Decode the identities and signature into a [`TrustAnchor`]
    pub fn resolve(&self, crypto: &dyn Crypto) -> Result<TrustAnchor, ClientError> {
        let arbitrator = identity_to_public_key(crypto, &self.arbitrator)?;
        let public_keys = self
            .checkpoint
            .computors
            .iter()
            .map(|identity| identity_to_public_key(crypto, identity))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TrustAnchor {
            arbitrator,
            checkpoint: Committee {
                epoch: self.checkpoint.epoch,
                public_keys,
                signature: string_to_signature(&self.checkpoint.signature)?,
            },
        })
    }
}

/// Light client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Committee size and tree depths
    pub protocol: ProtocolParams,
    /// Expected tick duration; also the polling period
    pub target_tick_duration_ms: u64,
    /// Ticks between publishing a transaction and its earliest execution
    pub publication_offset: u32,
    /// Capacity of the confirmed tick ring
    pub number_of_stored_ticks: usize,
    /// Peers the transport aims to keep connected
    pub min_public_peers: usize,
    pub trust_anchor: TrustAnchorConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolParams::default(),
            target_tick_duration_ms: 1000,
            publication_offset: 2,
            number_of_stored_ticks: 1024,
            min_public_peers: 4,
            trust_anchor: TrustAnchorConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn target_tick_duration(&self) -> Duration {
        Duration::from_millis(self.target_tick_duration_ms.max(1))
    }

    /// Distinct peers that must vouch for a committee before it is adopted
    pub fn min_vouchers(&self) -> usize {
        EpochManager::vouchers_required(self.min_public_peers)
    }

    /// How far ahead a transaction tick may be set (one minute of ticks)
    pub fn max_ticks_ahead(&self) -> u32 {
        u32::try_from(60_000 / self.target_tick_duration_ms.max(1)).unwrap_or(u32::MAX)
    }
}
