//! Observable client events
//!
//! Every event goes out on one tokio broadcast channel. Slow subscribers lag
//! and lose the oldest events; the ledger never blocks on them.

use crate::peer::Protocol;
use serde::Serialize;

/// A committee became active
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpochEvent {
    pub epoch: u16,
    pub computors: Vec<String>,
    pub digest: String,
    pub signature: String,
}

/// A tick was confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickEvent {
    pub tick: u32,
    pub epoch: u16,
    pub timestamp: String,
    pub resource_testing_digest: String,
    pub spectrum_digest: String,
    pub universe_digest: String,
    pub computer_digest: String,
    pub transaction_digest: String,
    pub computor_indices: Vec<u16>,
}

/// Counters for the interval ending at `tick`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickStats {
    pub tick: u32,
    pub duration_ms: i64,
    pub number_of_skipped_ticks: u32,
    pub number_of_updated_entities: usize,
    pub number_of_skipped_entities: usize,
    pub number_of_cleared_transactions: usize,
}

/// An outgoing transaction reached its tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferEvent {
    pub source: String,
    pub destination: String,
    pub amount: u64,
    pub tick: u32,
    pub input_type: u16,
    pub digest: String,
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_ipo_bid: Option<BidSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_contract_index: Option<u64>,
    pub executed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BidSummary {
    pub price: u64,
    pub quantity: u16,
    pub amount: u128,
}

/// Verified account state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityEvent {
    pub id: String,
    pub energy: i128,
    pub incoming_amount: u64,
    pub outgoing_amount: u64,
    pub number_of_incoming_transfers: u32,
    pub number_of_outgoing_transfers: u32,
    pub latest_incoming_transfer_tick: u32,
    pub latest_outgoing_transfer_tick: u32,
    pub tick: u32,
    pub epoch: u16,
    pub timestamp: String,
    /// Digest of the spectrum leaf
    pub digest: String,
    pub siblings: Vec<String>,
    pub spectrum_index: u32,
    pub spectrum_digest: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outgoing_transaction: Option<TransferEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Issuance,
    Ownership,
    Possession,
}

/// Verified universe record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetEvent {
    pub kind: AssetKind,
    /// Issuer, owner or possessor identity
    pub holder: String,
    pub issuer: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_shares: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managing_contract_index: Option<u16>,
    pub tick: u32,
    pub epoch: u16,
    pub universe_index: u32,
    pub universe_digest: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum NetworkEvent {
    Connected { address: String, protocol: Protocol },
    Disconnected { address: String, protocol: Protocol },
    Ignored { address: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    Epoch(EpochEvent),
    Tick(TickEvent),
    TickStats(TickStats),
    Entity(EntityEvent),
    Asset(AssetEvent),
    Transfer(TransferEvent),
    ExecutionTick { id: String, tick: u32 },
    Error(String),
    Network(NetworkEvent),
}
