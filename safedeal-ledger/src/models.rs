//! Core data models for the escrow ledger
//!
//! This module contains the item record and its state machine, the per-actor
//! bookkeeping record, and the audit events the ledger emits.

use crate::{error::LedgerError, LedgerResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Sequential item identifier, starting at 0
pub type ItemId = u64;

/// Identity of the caller of a ledger operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ActorId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Item state machine enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemState {
    /// Listed for sale, counted against the seller's listing cap
    Listed,
    /// Purchased; the price is held in escrow
    Locked,
    /// Escrow paid out to the seller
    Released,
}

impl ItemState {
    /// Check if this is a terminal state (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Released)
    }

    /// Check if this state allows purchase
    pub fn can_purchase(&self) -> bool {
        matches!(self, Self::Listed)
    }

    /// Check if this state allows receipt confirmation
    pub fn can_confirm(&self) -> bool {
        matches!(self, Self::Locked)
    }

    /// Check if escrow is held against an item in this state
    pub fn holds_escrow(&self) -> bool {
        matches!(self, Self::Locked)
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Listed => "Listed",
            Self::Locked => "Locked",
            Self::Released => "Released",
        };
        f.write_str(name)
    }
}

/// A marketplace listing and its escrow lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,

    // Parties
    pub seller: ActorId,
    pub buyer: Option<ActorId>,

    // Descriptive
    pub title: String,
    pub category: String,
    pub metadata_reference: String,

    pub price: Decimal,
    pub state: ItemState,

    // Timestamps
    pub created_at: DateTime<Utc>,
    pub purchased_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Create a new listed item
    pub fn new(
        id: ItemId,
        seller: ActorId,
        title: String,
        category: String,
        price: Decimal,
        metadata_reference: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            seller,
            buyer: None,
            title,
            category,
            metadata_reference,
            price,
            state: ItemState::Listed,
            created_at,
            purchased_at: None,
            released_at: None,
        }
    }

    /// Validate a state transition. Only `Listed -> Locked -> Released` exists.
    pub fn validate_transition(&self, to_state: ItemState) -> LedgerResult<()> {
        match (self.state, to_state) {
            (ItemState::Listed, ItemState::Locked) => Ok(()),
            (ItemState::Locked, ItemState::Released) => Ok(()),
            (from, ItemState::Locked) => Err(LedgerError::ItemNotAvailable {
                item_id: self.id,
                state: from,
            }),
            (from, _) => Err(LedgerError::ItemNotLocked {
                item_id: self.id,
                state: from,
            }),
        }
    }

    /// Move a listed item into escrow
    pub(crate) fn lock(&mut self, buyer: ActorId, now: DateTime<Utc>) -> LedgerResult<()> {
        self.validate_transition(ItemState::Locked)?;
        self.buyer = Some(buyer);
        self.purchased_at = Some(now);
        self.state = ItemState::Locked;
        Ok(())
    }

    /// Mark the escrow as paid out
    pub(crate) fn release(&mut self, now: DateTime<Utc>) -> LedgerResult<()> {
        self.validate_transition(ItemState::Released)?;
        self.released_at = Some(now);
        self.state = ItemState::Released;
        Ok(())
    }

    /// Time at which the buyer may confirm receipt; saturates at the latest
    /// representable instant
    pub fn unlocks_at(&self, release_lock: chrono::Duration) -> Option<DateTime<Utc>> {
        self.purchased_at.map(|at| {
            at.checked_add_signed(release_lock)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        })
    }
}

/// Per-actor bookkeeping kept by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorRecord {
    pub actor: ActorId,

    /// Items this actor listed that are still `Listed`
    pub active_listing_count: u32,
    /// Most recent cooldown-consuming action
    pub last_action_at: Option<DateTime<Utc>>,

    // Stats
    pub items_listed: u64,
    pub items_sold: u64,
    pub items_purchased: u64,
    pub items_confirmed: u64,
}

impl ActorRecord {
    /// Create a fresh record for an actor that has not acted yet
    pub fn new(actor: ActorId) -> Self {
        Self {
            actor,
            active_listing_count: 0,
            last_action_at: None,
            items_listed: 0,
            items_sold: 0,
            items_purchased: 0,
            items_confirmed: 0,
        }
    }
}

/// Kind of a ledger event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEventKind {
    ItemListed,
    ItemPurchased,
    ItemReleased,
}

impl LedgerEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ItemListed => "item.listed",
            Self::ItemPurchased => "item.purchased",
            Self::ItemReleased => "item.released",
        }
    }
}

/// Ledger event for the audit trail and external observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub id: Uuid,
    pub kind: LedgerEventKind,
    pub item_id: ItemId,

    /// Actor the event concerns: the seller for listings and releases,
    /// the buyer for purchases
    pub actor: ActorId,
    pub amount: Decimal,

    // Timestamp (immutable)
    pub created_at: DateTime<Utc>,
}

impl LedgerEvent {
    pub fn new(
        kind: LedgerEventKind,
        item_id: ItemId,
        actor: ActorId,
        amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            item_id,
            actor,
            amount,
            created_at,
        }
    }

    /// JSON payload for observers
    pub fn payload(&self) -> serde_json::Value {
        serde_json::json!({
            "event": self.kind.as_str(),
            "item_id": self.item_id,
            "actor": self.actor,
            "amount": self.amount,
            "created_at": self.created_at,
        })
    }
}
