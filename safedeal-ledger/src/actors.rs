//! Actor book - per-actor rate limiting and listing caps
//!
//! The book is owned by the ledger state and only mutated inside the same
//! critical section as the operation that triggers the change, so a cooldown
//! or cap check can never pass against stale data.

use crate::{
    config::{ActionKind, CooldownScope, LedgerConfig},
    error::LedgerError,
    models::{ActorId, ActorRecord},
    LedgerResult,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Table of actor records plus the limits they are checked against
#[derive(Debug)]
pub struct ActorBook {
    records: HashMap<ActorId, ActorRecord>,
    cooldown: Duration,
    cooldown_scope: CooldownScope,
    max_active_listings: u32,
}

impl ActorBook {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            records: HashMap::new(),
            cooldown: config.create_cooldown(),
            cooldown_scope: config.cooldown_scope,
            max_active_listings: config.max_active_listings,
        }
    }

    /// Snapshot of an actor's record; actors that never acted get a fresh one
    pub fn record(&self, actor: &ActorId) -> ActorRecord {
        self.records
            .get(actor)
            .cloned()
            .unwrap_or_else(|| ActorRecord::new(actor.clone()))
    }

    fn record_mut(&mut self, actor: &ActorId) -> &mut ActorRecord {
        self.records
            .entry(actor.clone())
            .or_insert_with(|| ActorRecord::new(actor.clone()))
    }

    /// Reject `action` if it falls inside the actor's cooldown window
    pub fn check_cooldown(
        &self,
        actor: &ActorId,
        action: ActionKind,
        now: DateTime<Utc>,
    ) -> LedgerResult<()> {
        if !self.cooldown_scope.covers(action) {
            return Ok(());
        }

        let Some(last) = self.records.get(actor).and_then(|r| r.last_action_at) else {
            return Ok(());
        };
        let retry_at = last
            .checked_add_signed(self.cooldown)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if now < retry_at {
            return Err(LedgerError::CooldownActive {
                actor: actor.clone(),
                retry_at,
            });
        }
        Ok(())
    }

    pub fn check_listing_capacity(&self, actor: &ActorId) -> LedgerResult<()> {
        let active = self
            .records
            .get(actor)
            .map(|r| r.active_listing_count)
            .unwrap_or(0);

        if active >= self.max_active_listings {
            return Err(LedgerError::ListingLimitReached {
                actor: actor.clone(),
                limit: self.max_active_listings,
            });
        }
        Ok(())
    }

    /// Stamp the cooldown clock if `action` is rate limited
    fn stamp(&mut self, actor: &ActorId, action: ActionKind, now: DateTime<Utc>) {
        if self.cooldown_scope.covers(action) {
            self.record_mut(actor).last_action_at = Some(now);
        }
    }

    pub fn note_listed(&mut self, seller: &ActorId, now: DateTime<Utc>) {
        self.stamp(seller, ActionKind::CreateItem, now);
        let record = self.record_mut(seller);
        record.active_listing_count += 1;
        record.items_listed += 1;
    }

    pub fn note_purchased(&mut self, buyer: &ActorId, seller: &ActorId, now: DateTime<Utc>) {
        self.stamp(buyer, ActionKind::PurchaseItem, now);
        self.record_mut(buyer).items_purchased += 1;

        let record = self.record_mut(seller);
        record.active_listing_count = record.active_listing_count.saturating_sub(1);
        record.items_sold += 1;
    }

    pub fn note_confirmed(&mut self, buyer: &ActorId, now: DateTime<Utc>) {
        self.stamp(buyer, ActionKind::ConfirmReceipt, now);
        self.record_mut(buyer).items_confirmed += 1;
    }
}
