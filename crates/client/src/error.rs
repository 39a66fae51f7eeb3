//! Client API errors

use lrv_consensus::EpochError;
use lrv_wire::WireError;
use thiserror::Error;

/// Transaction store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sled: {0}")]
    Sled(#[from] sled::Error),

    #[error("no transaction stored under {0}")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Epoch(#[from] EpochError),

    #[error("system not synchronized yet")]
    NotSynchronized,

    #[error("entity {0} not synchronized yet")]
    EntityNotSynchronized(String),

    #[error("entity {0} is already owned by a wallet")]
    DuplicateWallet(String),

    #[error("there is a pending outgoing transaction at tick {0}")]
    PendingTransaction(u32),

    #[error("transaction at tick {0} is pending and cannot be removed")]
    TransactionIsPending(u32),

    #[error("invalid amount {0}")]
    InvalidAmount(u64),

    #[error("amount {amount} exceeds energy {energy}")]
    InsufficientEnergy { amount: u64, energy: i128 },

    #[error("invalid contract IPO bid (price {price}, quantity {quantity})")]
    InvalidBid { price: u64, quantity: u16 },

    #[error("contract IPO bid {total} exceeds remaining energy {remaining}")]
    BidExceedsEnergy { total: u128, remaining: i128 },

    #[error("transaction tick {tick} is before the execution tick {execution_tick}")]
    TickTooEarly { tick: u32, execution_tick: u32 },

    #[error("transaction tick {tick} is more than {max_ahead} ticks ahead of {current}")]
    TickTooFar { tick: u32, current: u32, max_ahead: u32 },

    #[error("transaction source {0} does not match the wallet")]
    ForeignTransaction(String),

    #[error("invalid transaction signature")]
    InvalidSignature,

    #[error("invalid stored transaction for {0}")]
    InvalidStoredTransaction(String),

    #[error("client stopped")]
    Closed,
}
