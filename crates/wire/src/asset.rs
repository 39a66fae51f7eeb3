//! Universe records and their proofs (RespondIssuedAssets / RespondOwnedAssets)

use crate::codec::Reader;
use crate::crypto::{Digest, PublicKey};
use crate::error::WireError;
use crate::params::ProtocolParams;

/// Size of one universe record; also the Merkle leaf
pub const ASSET_RECORD_LENGTH: usize = 48;

const EMPTY: u8 = 0;
const ISSUANCE: u8 = 1;
const OWNERSHIP: u8 = 2;
const POSSESSION: u8 = 3;

/// Decoded universe record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRecord {
    Empty,
    Issuance {
        issuer: PublicKey,
        name: [u8; 7],
        number_of_decimal_places: i8,
        unit_of_measurement: [u8; 7],
    },
    Ownership {
        owner: PublicKey,
        managing_contract_index: u16,
        issuance_index: u32,
        number_of_shares: i64,
    },
    Possession {
        possessor: PublicKey,
        managing_contract_index: u16,
        ownership_index: u32,
        number_of_shares: i64,
    },
}

impl AssetRecord {
    pub fn decode(bytes: &[u8; ASSET_RECORD_LENGTH]) -> Result<Self, WireError> {
        let mut reader = Reader::new(bytes);
        let public_key = reader.array();
        let kind = reader.u8();
        Ok(match kind {
            EMPTY => Self::Empty,
            ISSUANCE => Self::Issuance {
                issuer: public_key,
                name: reader.array(),
                number_of_decimal_places: reader.i8(),
                unit_of_measurement: reader.array(),
            },
            OWNERSHIP => {
                let _padding = reader.u8();
                Self::Ownership {
                    owner: public_key,
                    managing_contract_index: reader.u16(),
                    issuance_index: reader.u32(),
                    number_of_shares: reader.i64(),
                }
            }
            POSSESSION => {
                let _padding = reader.u8();
                Self::Possession {
                    possessor: public_key,
                    managing_contract_index: reader.u16(),
                    ownership_index: reader.u32(),
                    number_of_shares: reader.i64(),
                }
            }
            other => return Err(WireError::InvalidAssetType(other)),
        })
    }

    pub fn encode(&self) -> [u8; ASSET_RECORD_LENGTH] {
        let mut out = Vec::with_capacity(ASSET_RECORD_LENGTH);
        match self {
            Self::Empty => out.resize(ASSET_RECORD_LENGTH, 0),
            Self::Issuance {
                issuer,
                name,
                number_of_decimal_places,
                unit_of_measurement,
            } => {
                out.extend_from_slice(issuer);
                out.push(ISSUANCE);
                out.extend_from_slice(name);
                out.extend_from_slice(&number_of_decimal_places.to_le_bytes());
                out.extend_from_slice(unit_of_measurement);
            }
            Self::Ownership {
                owner: key,
                managing_contract_index,
                issuance_index: index,
                number_of_shares,
            }
            | Self::Possession {
                possessor: key,
                managing_contract_index,
                ownership_index: index,
                number_of_shares,
            } => {
                out.extend_from_slice(key);
                out.push(if matches!(self, Self::Ownership { .. }) {
                    OWNERSHIP
                } else {
                    POSSESSION
                });
                out.push(0);
                out.extend_from_slice(&managing_contract_index.to_le_bytes());
                out.extend_from_slice(&index.to_le_bytes());
                out.extend_from_slice(&number_of_shares.to_le_bytes());
            }
        }
        let mut record = [0u8; ASSET_RECORD_LENGTH];
        record.copy_from_slice(&out);
        record
    }

    /// Issuer or holder the record belongs to
    pub fn public_key(&self) -> Option<&PublicKey> {
        match self {
            Self::Empty => None,
            Self::Issuance { issuer, .. } => Some(issuer),
            Self::Ownership { owner, .. } => Some(owner),
            Self::Possession { possessor, .. } => Some(possessor),
        }
    }

    /// Asset name with trailing NULs removed
    pub fn name(&self) -> Option<String> {
        match self {
            Self::Issuance { name, .. } => {
                let end = name.iter().position(|b| *b == 0).unwrap_or(name.len());
                Some(String::from_utf8_lossy(&name[..end]).into_owned())
            }
            _ => None,
        }
    }
}

/// Issuance record proven against the universe digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedAssetResponse {
    /// Raw record bytes, hashed as the Merkle leaf
    pub leaf: [u8; ASSET_RECORD_LENGTH],
    pub asset: AssetRecord,
    pub tick: u32,
    pub universe_index: u32,
    pub siblings: Vec<Digest>,
}

impl IssuedAssetResponse {
    pub fn length(params: &ProtocolParams) -> usize {
        ASSET_RECORD_LENGTH + 8 + 32 * params.assets_depth
    }

    pub(crate) fn decode(payload: &[u8], params: &ProtocolParams) -> Result<Self, WireError> {
        let mut reader = Reader::new(payload);
        let leaf = reader.array();
        let asset = AssetRecord::decode(&leaf)?;
        if !matches!(asset, AssetRecord::Issuance { .. }) {
            return Err(WireError::InvalidAssetType(leaf[32]));
        }
        Ok(Self {
            leaf,
            asset,
            tick: reader.u32(),
            universe_index: reader.u32(),
            siblings: reader.digests(params.assets_depth),
        })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.leaf);
        out.extend_from_slice(&self.tick.to_le_bytes());
        out.extend_from_slice(&self.universe_index.to_le_bytes());
        for sibling in &self.siblings {
            out.extend_from_slice(sibling);
        }
    }
}

/// Ownership or possession record, with the issuance it refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedAssetResponse {
    pub leaf: [u8; ASSET_RECORD_LENGTH],
    pub asset: AssetRecord,
    pub issuance: AssetRecord,
    pub tick: u32,
    pub universe_index: u32,
    pub siblings: Vec<Digest>,
}

impl OwnedAssetResponse {
    pub fn length(params: &ProtocolParams) -> usize {
        2 * ASSET_RECORD_LENGTH + 8 + 32 * params.assets_depth
    }

    pub(crate) fn decode(payload: &[u8], params: &ProtocolParams) -> Result<Self, WireError> {
        let mut reader = Reader::new(payload);
        let leaf = reader.array();
        let asset = AssetRecord::decode(&leaf)?;
        let issuance_bytes = reader.array();
        let issuance = AssetRecord::decode(&issuance_bytes)?;
        if !matches!(asset, AssetRecord::Ownership { .. } | AssetRecord::Possession { .. }) {
            return Err(WireError::InvalidAssetType(leaf[32]));
        }
        if !matches!(issuance, AssetRecord::Issuance { .. }) {
            return Err(WireError::InvalidAssetType(issuance_bytes[32]));
        }
        Ok(Self {
            leaf,
            asset,
            issuance,
            tick: reader.u32(),
            universe_index: reader.u32(),
            siblings: reader.digests(params.assets_depth),
        })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.leaf);
        out.extend_from_slice(&self.issuance.encode());
        out.extend_from_slice(&self.tick.to_le_bytes());
        out.extend_from_slice(&self.universe_index.to_le_bytes());
        for sibling in &self.siblings {
            out.extend_from_slice(sibling);
        }
    }
}
