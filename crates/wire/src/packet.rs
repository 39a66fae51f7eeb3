//! Packet framing and message dispatch
//!
//! Every packet starts with an 8-byte header: 3-byte little-endian total
//! length, 1-byte message type and a 4-byte nonce ("dejavu"). A zero nonce
//! marks an unsolicited broadcast; requests carry a random one that the
//! response echoes.

use crate::asset::{IssuedAssetResponse, OwnedAssetResponse};
use crate::crypto::PublicKey;
use crate::error::WireError;
use crate::message::{Committee, CurrentTickInfo, EntityResponse, PublicPeers, QuorumTickRequest};
use crate::params::ProtocolParams;
use crate::tick::{TickVote, TICK_VOTE_LENGTH};
use crate::transaction::{Transaction, MAX_INPUT_SIZE, MIN_TRANSACTION_LENGTH};

pub const HEADER_LENGTH: usize = 8;
pub const MAX_PACKET_LENGTH: usize = 0x00FF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    ExchangePublicPeers = 0,
    BroadcastComputors = 2,
    BroadcastTick = 3,
    RequestComputors = 11,
    RequestQuorumTick = 14,
    BroadcastTransaction = 24,
    RequestCurrentTickInfo = 27,
    RespondCurrentTickInfo = 28,
    RequestEntity = 31,
    RespondEntity = 32,
    RequestIssuedAssets = 36,
    RespondIssuedAssets = 37,
    RequestOwnedAssets = 38,
    RespondOwnedAssets = 39,
}

impl TryFrom<u8> for MessageType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::ExchangePublicPeers,
            2 => Self::BroadcastComputors,
            3 => Self::BroadcastTick,
            11 => Self::RequestComputors,
            14 => Self::RequestQuorumTick,
            24 => Self::BroadcastTransaction,
            27 => Self::RequestCurrentTickInfo,
            28 => Self::RespondCurrentTickInfo,
            31 => Self::RequestEntity,
            32 => Self::RespondEntity,
            36 => Self::RequestIssuedAssets,
            37 => Self::RespondIssuedAssets,
            38 => Self::RequestOwnedAssets,
            39 => Self::RespondOwnedAssets,
            other => return Err(WireError::UnknownType(other)),
        })
    }
}

impl MessageType {
    /// Payload length a message of this type must have. Transactions declare
    /// their own input size, so `payload` is consulted for them.
    pub fn payload_length(self, params: &ProtocolParams, payload: &[u8]) -> Result<usize, WireError> {
        Ok(match self {
            Self::ExchangePublicPeers => PublicPeers::LENGTH,
            Self::BroadcastComputors => Committee::length(params),
            Self::BroadcastTick => TICK_VOTE_LENGTH,
            Self::RequestComputors | Self::RequestCurrentTickInfo => 0,
            Self::RequestQuorumTick => QuorumTickRequest::length(params),
            Self::BroadcastTransaction => {
                let length = Transaction::declared_length(payload).unwrap_or(MIN_TRANSACTION_LENGTH);
                if length - MIN_TRANSACTION_LENGTH > MAX_INPUT_SIZE {
                    return Err(WireError::InputTooLarge(length - MIN_TRANSACTION_LENGTH));
                }
                length
            }
            Self::RespondCurrentTickInfo => CurrentTickInfo::LENGTH,
            Self::RequestEntity | Self::RequestIssuedAssets | Self::RequestOwnedAssets => 32,
            Self::RespondEntity => EntityResponse::length(params),
            Self::RespondIssuedAssets => IssuedAssetResponse::length(params),
            Self::RespondOwnedAssets => OwnedAssetResponse::length(params),
        })
    }
}

/// Total length announced by the first three bytes of a packet
pub fn packet_length(bytes: &[u8]) -> Option<usize> {
    match bytes {
        [a, b, c, ..] => Some(usize::from(*a) | usize::from(*b) << 8 | usize::from(*c) << 16),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    ExchangePublicPeers(PublicPeers),
    BroadcastComputors(Committee),
    BroadcastTick(TickVote),
    RequestComputors,
    RequestQuorumTick(QuorumTickRequest),
    BroadcastTransaction(Transaction),
    RequestCurrentTickInfo,
    RespondCurrentTickInfo(CurrentTickInfo),
    RequestEntity(PublicKey),
    RespondEntity(EntityResponse),
    RequestIssuedAssets(PublicKey),
    RespondIssuedAssets(IssuedAssetResponse),
    RequestOwnedAssets(PublicKey),
    RespondOwnedAssets(OwnedAssetResponse),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::ExchangePublicPeers(_) => MessageType::ExchangePublicPeers,
            Self::BroadcastComputors(_) => MessageType::BroadcastComputors,
            Self::BroadcastTick(_) => MessageType::BroadcastTick,
            Self::RequestComputors => MessageType::RequestComputors,
            Self::RequestQuorumTick(_) => MessageType::RequestQuorumTick,
            Self::BroadcastTransaction(_) => MessageType::BroadcastTransaction,
            Self::RequestCurrentTickInfo => MessageType::RequestCurrentTickInfo,
            Self::RespondCurrentTickInfo(_) => MessageType::RespondCurrentTickInfo,
            Self::RequestEntity(_) => MessageType::RequestEntity,
            Self::RespondEntity(_) => MessageType::RespondEntity,
            Self::RequestIssuedAssets(_) => MessageType::RequestIssuedAssets,
            Self::RespondIssuedAssets(_) => MessageType::RespondIssuedAssets,
            Self::RequestOwnedAssets(_) => MessageType::RequestOwnedAssets,
            Self::RespondOwnedAssets(_) => MessageType::RespondOwnedAssets,
        }
    }

    fn decode(message_type: MessageType, payload: &[u8], params: &ProtocolParams) -> Result<Self, WireError> {
        let key = |payload: &[u8]| {
            let mut key = [0u8; 32];
            key.copy_from_slice(payload);
            key
        };
        Ok(match message_type {
            MessageType::ExchangePublicPeers => Self::ExchangePublicPeers(PublicPeers::decode(payload)),
            MessageType::BroadcastComputors => Self::BroadcastComputors(Committee::decode(payload, params)),
            MessageType::BroadcastTick => Self::BroadcastTick(TickVote::decode(payload)),
            MessageType::RequestComputors => Self::RequestComputors,
            MessageType::RequestQuorumTick => Self::RequestQuorumTick(QuorumTickRequest::decode(payload, params)),
            MessageType::BroadcastTransaction => Self::BroadcastTransaction(Transaction::decode(payload)?),
            MessageType::RequestCurrentTickInfo => Self::RequestCurrentTickInfo,
            MessageType::RespondCurrentTickInfo => Self::RespondCurrentTickInfo(CurrentTickInfo::decode(payload)),
            MessageType::RequestEntity => Self::RequestEntity(key(payload)),
            MessageType::RespondEntity => Self::RespondEntity(EntityResponse::decode(payload, params)),
            MessageType::RequestIssuedAssets => Self::RequestIssuedAssets(key(payload)),
            MessageType::RespondIssuedAssets => {
                Self::RespondIssuedAssets(IssuedAssetResponse::decode(payload, params)?)
            }
            MessageType::RequestOwnedAssets => Self::RequestOwnedAssets(key(payload)),
            MessageType::RespondOwnedAssets => Self::RespondOwnedAssets(OwnedAssetResponse::decode(payload, params)?),
        })
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        match self {
            Self::ExchangePublicPeers(peers) => peers.encode(out),
            Self::BroadcastComputors(committee) => committee.encode(out),
            Self::BroadcastTick(vote) => vote.encode(out),
            Self::RequestComputors | Self::RequestCurrentTickInfo => {}
            Self::RequestQuorumTick(request) => request.encode(out),
            Self::BroadcastTransaction(transaction) => out.extend_from_slice(&transaction.encode()),
            Self::RespondCurrentTickInfo(info) => info.encode(out),
            Self::RequestEntity(key) | Self::RequestIssuedAssets(key) | Self::RequestOwnedAssets(key) => {
                out.extend_from_slice(key)
            }
            Self::RespondEntity(response) => response.encode(out),
            Self::RespondIssuedAssets(response) => response.encode(out),
            Self::RespondOwnedAssets(response) => response.encode(out),
        }
    }
}

/// A decoded packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub nonce: u32,
    pub message: Message,
}

impl Packet {
    pub fn new(nonce: u32, message: Message) -> Self {
        Self { nonce, message }
    }

    /// Request with a fresh non-zero nonce
    pub fn request(message: Message) -> Self {
        Self::new(rand::random::<u32>().max(1), message)
    }

    /// Unsolicited broadcast (zero nonce)
    pub fn broadcast(message: Message) -> Self {
        Self::new(0, message)
    }

    pub fn message_type(&self) -> MessageType {
        self.message.message_type()
    }

    /// Decode one complete packet. Any length disagreement is an error: the
    /// declared length must equal the buffer and the payload must be exactly
    /// the size its type prescribes.
    pub fn decode(bytes: &[u8], params: &ProtocolParams) -> Result<Self, WireError> {
        if bytes.len() < HEADER_LENGTH {
            return Err(WireError::Truncated(bytes.len()));
        }
        let declared = packet_length(bytes).unwrap_or_default();
        if declared != bytes.len() {
            return Err(WireError::LengthMismatch {
                declared,
                actual: bytes.len(),
            });
        }

        let message_type = MessageType::try_from(bytes[3])?;
        let nonce = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let payload = &bytes[HEADER_LENGTH..];

        let expected = message_type.payload_length(params, payload)?;
        if payload.len() != expected {
            return Err(WireError::PayloadLength {
                message_type,
                expected,
                actual: payload.len(),
            });
        }

        Ok(Self {
            nonce,
            message: Message::decode(message_type, payload, params)?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; HEADER_LENGTH];
        self.message.encode_payload(&mut out);

        let length = out.len();
        debug_assert!(length <= MAX_PACKET_LENGTH);
        out[..3].copy_from_slice(&(length as u32).to_le_bytes()[..3]);
        out[3] = self.message_type() as u8;
        out[4..8].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }
}
