//! Time-locked escrow ledger for marketplace listings
//!
//! Sellers list items, buyers lock the exact price in escrow, and the escrow
//! is paid to the seller only when the buyer confirms receipt after the
//! release lock has elapsed:
//! - `Listed -> Locked -> Released`, never backwards
//! - per-actor cooldown and a cap on unsold listings
//! - custody and event delivery behind traits, so the same state machine runs
//!   in-process, behind a service, or on a replicated log

pub mod actors;
pub mod clock;
pub mod config;
pub mod custody;
pub mod error;
pub mod ledger;
pub mod models;
pub mod node;
pub mod publisher;
pub mod telemetry;

pub use error::{CustodyError, LedgerError};

/// Result type alias for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
