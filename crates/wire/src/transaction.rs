//! Transactions (BroadcastTransaction payload)
//!
//! A transaction addressed to a contract with input type 0 and a 10-byte input
//! is an IPO bid; everything else is carried as an opaque plain transfer.

use crate::codec::Reader;
use crate::crypto::{Crypto, Digest, PublicKey, Signature};
use crate::error::WireError;

/// source, destination, amount, tick, input type, input size
pub const TRANSACTION_HEADER_LENGTH: usize = 80;
/// Header plus signature, without input
pub const MIN_TRANSACTION_LENGTH: usize = TRANSACTION_HEADER_LENGTH + 64;
pub const MAX_INPUT_SIZE: usize = 1024;
pub const MAX_AMOUNT: u64 = 1_000_000_000_000_000;
pub const MAX_NUMBER_OF_CONTRACTS: u64 = 1024;

const CONTRACT_BID_INPUT_LENGTH: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionHeader {
    pub source: PublicKey,
    pub destination: PublicKey,
    pub amount: u64,
    pub tick: u32,
    pub input_type: u16,
}

/// IPO bid placed with a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractBid {
    pub price: u64,
    pub quantity: u16,
}

impl ContractBid {
    /// Total energy locked by the bid
    pub fn total(&self) -> u128 {
        u128::from(self.price) * u128::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Plain {
        header: TransactionHeader,
        input: Vec<u8>,
        signature: Signature,
    },
    ContractBid {
        header: TransactionHeader,
        bid: ContractBid,
        signature: Signature,
    },
}

/// Contract index encoded in a destination, if it addresses a contract
pub fn contract_index(destination: &PublicKey) -> Option<u64> {
    if destination[8..].iter().any(|b| *b != 0) {
        return None;
    }
    let mut word = [0u8; 8];
    word.copy_from_slice(&destination[..8]);
    let index = u64::from_le_bytes(word);
    (index > 0 && index & !(MAX_NUMBER_OF_CONTRACTS - 1) == 0).then_some(index)
}

impl Transaction {
    /// Build an unsigned transaction; sign `digest()` and attach with
    /// [`Transaction::with_signature`].
    pub fn unsigned(header: TransactionHeader, input: Vec<u8>) -> Result<Self, WireError> {
        Self::classify(header, input, [0u8; 64])
    }

    pub fn with_signature(mut self, value: Signature) -> Self {
        match &mut self {
            Self::Plain { signature, .. } | Self::ContractBid { signature, .. } => *signature = value,
        }
        self
    }

    fn classify(header: TransactionHeader, input: Vec<u8>, signature: Signature) -> Result<Self, WireError> {
        if input.len() > MAX_INPUT_SIZE {
            return Err(WireError::InputTooLarge(input.len()));
        }
        if contract_index(&header.destination).is_some()
            && header.input_type == 0
            && input.len() == CONTRACT_BID_INPUT_LENGTH
        {
            let mut reader = Reader::new(&input);
            let bid = ContractBid {
                price: reader.u64(),
                quantity: reader.u16(),
            };
            return Ok(Self::ContractBid {
                header,
                bid,
                signature,
            });
        }
        Ok(Self::Plain {
            header,
            input,
            signature,
        })
    }

    /// Decode a payload; the caller has already checked the exact length.
    pub(crate) fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(payload);
        let header = TransactionHeader {
            source: reader.array(),
            destination: reader.array(),
            amount: reader.u64(),
            tick: reader.u32(),
            input_type: reader.u16(),
        };
        let input_size = usize::from(reader.u16());
        let input = reader.slice(input_size).to_vec();
        let signature = reader.array();
        Self::classify(header, input, signature)
    }

    /// Decode a stored or relayed payload, checking its length first
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        let expected = Self::declared_length(bytes).ok_or(WireError::Truncated(bytes.len()))?;
        if expected - MIN_TRANSACTION_LENGTH > MAX_INPUT_SIZE {
            return Err(WireError::InputTooLarge(expected - MIN_TRANSACTION_LENGTH));
        }
        if bytes.len() != expected {
            return Err(WireError::LengthMismatch {
                declared: expected,
                actual: bytes.len(),
            });
        }
        Self::decode(bytes)
    }

    /// Exact payload length announced by a payload's input size field
    pub(crate) fn declared_length(payload: &[u8]) -> Option<usize> {
        let size = payload.get(TRANSACTION_HEADER_LENGTH - 2..TRANSACTION_HEADER_LENGTH)?;
        Some(MIN_TRANSACTION_LENGTH + usize::from(u16::from_le_bytes([size[0], size[1]])))
    }

    pub fn header(&self) -> &TransactionHeader {
        match self {
            Self::Plain { header, .. } | Self::ContractBid { header, .. } => header,
        }
    }

    pub fn signature(&self) -> &Signature {
        match self {
            Self::Plain { signature, .. } | Self::ContractBid { signature, .. } => signature,
        }
    }

    pub fn source(&self) -> &PublicKey {
        &self.header().source
    }

    pub fn tick(&self) -> u32 {
        self.header().tick
    }

    pub fn amount(&self) -> u64 {
        self.header().amount
    }

    pub fn bid(&self) -> Option<&ContractBid> {
        match self {
            Self::ContractBid { bid, .. } => Some(bid),
            Self::Plain { .. } => None,
        }
    }

    pub fn input(&self) -> Vec<u8> {
        match self {
            Self::Plain { input, .. } => input.clone(),
            Self::ContractBid { bid, .. } => {
                let mut input = Vec::with_capacity(CONTRACT_BID_INPUT_LENGTH);
                input.extend_from_slice(&bid.price.to_le_bytes());
                input.extend_from_slice(&bid.quantity.to_le_bytes());
                input
            }
        }
    }

    /// Whether executing the transaction moves energy away from the source
    pub fn moves_funds(&self) -> bool {
        let header = self.header();
        header.destination != header.source && (header.amount > 0 || self.bid().is_some())
    }

    fn signed_bytes(&self) -> Vec<u8> {
        let header = self.header();
        let input = self.input();
        let mut out = Vec::with_capacity(MIN_TRANSACTION_LENGTH + input.len());
        out.extend_from_slice(&header.source);
        out.extend_from_slice(&header.destination);
        out.extend_from_slice(&header.amount.to_le_bytes());
        out.extend_from_slice(&header.tick.to_le_bytes());
        out.extend_from_slice(&header.input_type.to_le_bytes());
        // input length is bounded by MAX_INPUT_SIZE
        out.extend_from_slice(&(input.len() as u16).to_le_bytes());
        out.extend_from_slice(&input);
        out
    }

    /// Payload bytes including the signature
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.signed_bytes();
        out.extend_from_slice(self.signature());
        out
    }

    /// Digest signed by the source
    pub fn digest(&self, crypto: &dyn Crypto) -> Digest {
        crypto.digest(&self.signed_bytes())
    }

    pub fn verify(&self, crypto: &dyn Crypto) -> bool {
        crypto.verify(self.source(), &self.digest(crypto), self.signature())
    }
}
