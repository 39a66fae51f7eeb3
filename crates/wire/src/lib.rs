//! Wire layer for the tick ledger light client
//!
//! - Fixed-layout packet codec with strict length checking
//! - Identity and digest string encodings
//! - Transaction layout, including contract IPO bids
//! - The `Crypto` capability every verification path goes through

mod codec;

pub mod asset;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod message;
pub mod packet;
pub mod params;
pub mod tick;
pub mod transaction;

pub use asset::{AssetRecord, IssuedAssetResponse, OwnedAssetResponse, ASSET_RECORD_LENGTH};
pub use crypto::{Crypto, DefaultCrypto, Digest, PublicKey, Signature};
pub use error::WireError;
pub use identity::{
    digest_to_string, identity_to_public_key, public_key_to_identity, resource_digest_to_string,
    signature_to_string, string_to_digest, string_to_signature,
};
pub use message::{
    committee_digest, Committee, CurrentTickInfo, EntityResponse, PublicPeers, QuorumTickRequest,
};
pub use packet::{packet_length, Message, MessageType, Packet, HEADER_LENGTH, MAX_PACKET_LENGTH};
pub use params::ProtocolParams;
pub use tick::{TickTime, TickVote};
pub use transaction::{
    contract_index, ContractBid, Transaction, TransactionHeader, MAX_AMOUNT, MAX_INPUT_SIZE,
    MAX_NUMBER_OF_CONTRACTS,
};
