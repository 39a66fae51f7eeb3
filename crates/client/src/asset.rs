//! Verified universe records of tracked entities

use crate::events::{AssetEvent, AssetKind};
use lrv_wire::{
    digest_to_string, public_key_to_identity, AssetRecord, Crypto, Digest, IssuedAssetResponse,
    OwnedAssetResponse, PublicKey, ASSET_RECORD_LENGTH,
};
use std::collections::BTreeMap;

/// Records are keyed by kind, holder, issuer and asset name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetKey {
    pub kind: AssetKind,
    pub holder: PublicKey,
    pub issuer: PublicKey,
    pub name: String,
}

/// A universe proof waiting for its tick to be confirmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetProof {
    Issued(IssuedAssetResponse),
    Owned(OwnedAssetResponse),
}

impl AssetProof {
    pub fn tick(&self) -> u32 {
        match self {
            Self::Issued(response) => response.tick,
            Self::Owned(response) => response.tick,
        }
    }

    pub fn universe_index(&self) -> u32 {
        match self {
            Self::Issued(response) => response.universe_index,
            Self::Owned(response) => response.universe_index,
        }
    }

    pub fn leaf(&self) -> &[u8; ASSET_RECORD_LENGTH] {
        match self {
            Self::Issued(response) => &response.leaf,
            Self::Owned(response) => &response.leaf,
        }
    }

    pub fn siblings(&self) -> &[Digest] {
        match self {
            Self::Issued(response) => &response.siblings,
            Self::Owned(response) => &response.siblings,
        }
    }

    /// Entity whose request this proof answers
    pub fn holder(&self) -> Option<&PublicKey> {
        match self {
            Self::Issued(response) => response.asset.public_key(),
            Self::Owned(response) => response.asset.public_key(),
        }
    }

    pub fn key(&self) -> Option<AssetKey> {
        let (kind, holder, issuance) = match self {
            Self::Issued(response) => (AssetKind::Issuance, response.asset.public_key()?, &response.asset),
            Self::Owned(response) => {
                let kind = match response.asset {
                    AssetRecord::Ownership { .. } => AssetKind::Ownership,
                    AssetRecord::Possession { .. } => AssetKind::Possession,
                    _ => return None,
                };
                (kind, response.asset.public_key()?, &response.issuance)
            }
        };
        Some(AssetKey {
            kind,
            holder: *holder,
            issuer: *issuance.public_key()?,
            name: issuance.name()?,
        })
    }

    fn shares(&self) -> (Option<i64>, Option<u16>) {
        match self {
            Self::Owned(response) => match response.asset {
                AssetRecord::Ownership {
                    number_of_shares,
                    managing_contract_index,
                    ..
                }
                | AssetRecord::Possession {
                    number_of_shares,
                    managing_contract_index,
                    ..
                } => (Some(number_of_shares), Some(managing_contract_index)),
                _ => (None, None),
            },
            Self::Issued(_) => (None, None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetState {
    pub record: AssetRecord,
    pub tick: u32,
    pub epoch: u16,
    pub universe_index: u32,
    pub universe_digest: Digest,
}

#[derive(Debug, Default)]
pub struct AssetTable {
    assets: BTreeMap<AssetKey, AssetState>,
}

impl AssetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &AssetKey) -> Option<&AssetState> {
        self.assets.get(key)
    }

    /// Tick the record under `key` was last reconciled at
    pub fn tick(&self, key: &AssetKey) -> u32 {
        self.assets.get(key).map_or(0, |state| state.tick)
    }

    /// Records held by `holder`
    pub fn held_by<'a>(&'a self, holder: &'a PublicKey) -> impl Iterator<Item = (&'a AssetKey, &'a AssetState)> {
        self.assets.iter().filter(move |(key, _)| key.holder == *holder)
    }

    /// Drop every record of an entity that is no longer tracked
    pub fn forget(&mut self, holder: &PublicKey) {
        self.assets.retain(|key, _| key.holder != *holder);
    }

    pub(crate) fn apply(
        &mut self,
        crypto: &dyn Crypto,
        key: AssetKey,
        proof: &AssetProof,
        epoch: u16,
        universe_digest: Digest,
    ) -> AssetEvent {
        let record = match proof {
            AssetProof::Issued(response) => response.asset.clone(),
            AssetProof::Owned(response) => response.asset.clone(),
        };
        let (number_of_shares, managing_contract_index) = proof.shares();
        let event = AssetEvent {
            kind: key.kind,
            holder: public_key_to_identity(crypto, &key.holder),
            issuer: public_key_to_identity(crypto, &key.issuer),
            name: key.name.clone(),
            number_of_shares,
            managing_contract_index,
            tick: proof.tick(),
            epoch,
            universe_index: proof.universe_index(),
            universe_digest: digest_to_string(&universe_digest),
        };
        self.assets.insert(
            key,
            AssetState {
                record,
                tick: proof.tick(),
                epoch,
                universe_index: proof.universe_index(),
                universe_digest,
            },
        );
        event
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
