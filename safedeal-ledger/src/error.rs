//! Error types for the escrow ledger
//!
//! Every precondition of a ledger operation maps to its own variant so callers
//! can tell a cooldown from a full listing book from a bad payment without
//! parsing messages. A rejected operation never leaves partial state behind.

use crate::models::{ActorId, ItemId, ItemState};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for ledger operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// The actor acted again before their cooldown elapsed
    #[error("Cooldown active for {actor}: retry at {retry_at}")]
    CooldownActive {
        actor: ActorId,
        retry_at: DateTime<Utc>,
    },

    /// The actor already holds the maximum number of unsold listings
    #[error("Listing limit reached for {actor} (max {limit} items)")]
    ListingLimitReached { actor: ActorId, limit: u32 },

    /// Listings must carry a strictly positive price
    #[error("Price must be greater than 0")]
    InvalidPrice,

    #[error("Item {0} not found")]
    ItemNotFound(ItemId),

    /// Purchase attempted on an item that is no longer listed
    #[error("Item {item_id} is not available (state: {state})")]
    ItemNotAvailable { item_id: ItemId, state: ItemState },

    /// Payment did not match the listing price exactly
    #[error("Incorrect payment: expected {expected}, received {received}")]
    IncorrectPayment {
        expected: Decimal,
        received: Decimal,
    },

    /// Confirmation attempted on an item that holds no escrow
    #[error("Item {item_id} is not locked (state: {state})")]
    ItemNotLocked { item_id: ItemId, state: ItemState },

    /// Confirmation attempted before the release lock elapsed
    #[error("Lock period active for item {item_id}: unlocks at {unlocks_at}")]
    LockPeriodActive {
        item_id: ItemId,
        unlocks_at: DateTime<Utc>,
    },

    /// Caller is not the party allowed to perform the operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Funds could not be moved into or out of escrow
    #[error("Custody error: {0}")]
    Custody(#[from] CustodyError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Event sink errors
    #[error("Publish error: {0}")]
    Publish(String),
}

/// Failures reported by a funds custody backend.
///
/// Each failure is reported before any balance moves.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CustodyError {
    #[error("insufficient funds for {actor}: balance {available}, required {required}")]
    InsufficientFunds {
        actor: ActorId,
        available: Decimal,
        required: Decimal,
    },

    #[error("payee {0} rejected the transfer")]
    PayeeRejected(ActorId),

    #[error("escrow mismatch for item {item_id}: held {held}, requested {requested}")]
    EscrowMismatch {
        item_id: ItemId,
        held: Decimal,
        requested: Decimal,
    },

    #[error("amount must be greater than 0")]
    InvalidAmount,
}

impl LedgerError {
    /// Create an authorization error
    pub fn unauthorized<S: Into<String>>(msg: S) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a publish error
    pub fn publish<S: Into<String>>(msg: S) -> Self {
        Self::Publish(msg.into())
    }
}

impl From<config::ConfigError> for LedgerError {
    fn from(value: config::ConfigError) -> Self {
        Self::config(value.to_string())
    }
}
