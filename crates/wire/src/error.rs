//! Codec errors

use crate::packet::MessageType;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("packet of {0} bytes is shorter than the header")]
    Truncated(usize),

    #[error("declared packet length {declared} does not match {actual} received bytes")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("packet of {0} bytes exceeds the maximum packet size")]
    TooLarge(usize),

    #[error("unknown message type {0}")]
    UnknownType(u8),

    #[error("{message_type:?} payload must be {expected} bytes, got {actual}")]
    PayloadLength {
        message_type: MessageType,
        expected: usize,
        actual: usize,
    },

    #[error("transaction input of {0} bytes exceeds the input limit")]
    InputTooLarge(usize),

    #[error("unknown asset record type {0}")]
    InvalidAssetType(u8),

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("invalid encoded string: {0}")]
    InvalidEncoding(String),
}
