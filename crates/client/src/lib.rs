//! Light client state - verified entities, assets and owned wallets
//!
//! Architecture:
//! - Ledger owns every piece of mutable state behind one coordinator lock
//!   and turns incoming packets into state changes and polling directives
//! - Reconciler checks buffered Merkle proofs against confirmed digests
//! - Wallets persist their outgoing transaction and follow its execution
//! - Transport plugs in through the peer traits; events go out on a
//!   broadcast channel

pub mod asset;
pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod ledger;
pub mod peer;
pub mod poller;
pub mod reconciler;
pub mod store;
pub mod wallet;

#[cfg(test)]
mod testing;

pub use asset::{AssetKey, AssetProof, AssetState, AssetTable};
pub use client::LightClient;
pub use config::{Checkpoint, ClientConfig, TrustAnchorConfig};
pub use entity::{Entity, EntityState, EntityTable};
pub use error::{ClientError, StoreError};
pub use events::{
    AssetEvent, AssetKind, BidSummary, ClientEvent, EntityEvent, EpochEvent, NetworkEvent, TickEvent, TickStats,
    TransferEvent,
};
pub use ledger::{split_vote_flags, Directive, Ledger};
pub use peer::{Disconnected, PacketBuilder, PacketHandler, Peer, Protocol, Transmitter};
pub use store::{MemoryStore, SledStore, TransactionStore};
pub use wallet::Wallet;
