//! Escrow Ledger - item lifecycle, rate limits and custody
//!
//! Every mutating operation runs under one lock over the item table and the
//! actor book, and the custody call is made while that lock is held. A
//! failed precondition or a failed transfer returns before anything is
//! written, so each operation is all-or-nothing.

use crate::{
    actors::ActorBook,
    clock::Clock,
    config::{ActionKind, LedgerConfig},
    custody::FundsCustody,
    error::LedgerError,
    models::{ActorId, ActorRecord, Item, ItemId, ItemState, LedgerEvent, LedgerEventKind},
    publisher::EventSink,
    LedgerResult,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Listing creation request
#[derive(Debug, Clone)]
pub struct CreateItemRequest {
    pub title: String,
    pub category: String,
    pub price: Decimal,
    pub metadata_reference: String,
}

impl CreateItemRequest {
    pub fn new<S: Into<String>>(title: S, category: S, price: Decimal, metadata_reference: S) -> Self {
        Self {
            title: title.into(),
            category: category.into(),
            price,
            metadata_reference: metadata_reference.into(),
        }
    }
}

/// One item whose custody balance disagrees with its state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscrowDiscrepancy {
    pub item_id: ItemId,
    pub state: ItemState,
    pub expected: Decimal,
    pub held: Decimal,
}

/// Result of comparing custody balances with item states
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscrowAudit {
    pub locked_items: usize,
    pub expected_total: Decimal,
    pub held_total: Decimal,
    pub discrepancies: Vec<EscrowDiscrepancy>,
}

impl EscrowAudit {
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

struct LedgerState {
    items: Vec<Item>,
    actors: ActorBook,
    events: Vec<LedgerEvent>,
    /// Latest committed clock reading
    last_seen: Option<DateTime<Utc>>,
}

impl LedgerState {
    /// Current time, never earlier than the last committed reading
    fn now(&self, clock: &dyn Clock) -> DateTime<Utc> {
        let now = clock.now();
        match self.last_seen {
            Some(last) if now < last => last,
            _ => now,
        }
    }

    fn item(&self, item_id: ItemId) -> LedgerResult<&Item> {
        usize::try_from(item_id)
            .ok()
            .and_then(|idx| self.items.get(idx))
            .ok_or(LedgerError::ItemNotFound(item_id))
    }

    fn item_mut(&mut self, item_id: ItemId) -> LedgerResult<&mut Item> {
        usize::try_from(item_id)
            .ok()
            .and_then(|idx| self.items.get_mut(idx))
            .ok_or(LedgerError::ItemNotFound(item_id))
    }

    fn commit(&mut self, now: DateTime<Utc>, event: LedgerEvent) {
        self.last_seen = Some(now);
        self.events.push(event);
    }
}

/// The escrow ledger
pub struct EscrowLedger {
    config: LedgerConfig,
    state: Mutex<LedgerState>,
    custody: Arc<dyn FundsCustody>,
    publisher: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl EscrowLedger {
    /// Create a new ledger over the given collaborators
    pub fn new(
        config: LedgerConfig,
        custody: Arc<dyn FundsCustody>,
        publisher: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> LedgerResult<Self> {
        config.validate()?;

        let state = LedgerState {
            items: Vec::new(),
            actors: ActorBook::new(&config),
            events: Vec::new(),
            last_seen: None,
        };

        Ok(Self {
            config,
            state: Mutex::new(state),
            custody,
            publisher,
            clock,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// List a new item for sale. The caller becomes the seller.
    pub async fn create_item(
        &self,
        caller: &ActorId,
        request: CreateItemRequest,
    ) -> LedgerResult<ItemId> {
        info!("Creating item '{}' for {}", request.title, caller);

        let event = {
            let mut state = self.state.lock().await;
            let now = state.now(self.clock.as_ref());

            Self::validate_create_item(&state, caller, &request, now)
                .inspect_err(|e| warn!("Rejected item creation by {}: {}", caller, e))?;

            let item_id = state.items.len() as ItemId;
            let price = request.price;
            state.items.push(Item::new(
                item_id,
                caller.clone(),
                request.title,
                request.category,
                price,
                request.metadata_reference,
                now,
            ));
            state.actors.note_listed(caller, now);

            let event = LedgerEvent::new(LedgerEventKind::ItemListed, item_id, caller.clone(), price, now);
            state.commit(now, event.clone());
            event
        };

        self.emit(&event).await;
        info!("Created item: {}", event.item_id);

        Ok(event.item_id)
    }

    /// Buy a listed item, moving exactly its price into escrow
    pub async fn purchase_item(
        &self,
        caller: &ActorId,
        item_id: ItemId,
        payment: Decimal,
    ) -> LedgerResult<()> {
        info!("Purchasing item {} by {} with {}", item_id, caller, payment);

        let event = {
            let mut state = self.state.lock().await;
            let now = state.now(self.clock.as_ref());

            let (seller, price) = Self::validate_purchase(&state, caller, item_id, payment, now)
                .inspect_err(|e| warn!("Rejected purchase of item {} by {}: {}", item_id, caller, e))?;

            self.custody
                .escrow(item_id, caller, price)
                .await
                .inspect_err(|e| warn!("Escrow failed for item {}: {}", item_id, e))?;

            state.item_mut(item_id)?.lock(caller.clone(), now)?;
            state.actors.note_purchased(caller, &seller, now);

            let event = LedgerEvent::new(LedgerEventKind::ItemPurchased, item_id, caller.clone(), price, now);
            state.commit(now, event.clone());
            event
        };

        self.emit(&event).await;
        info!("Item {} locked in escrow", item_id);

        Ok(())
    }

    /// Buyer attests receipt; once the lock period has elapsed the escrow is
    /// paid to the seller
    pub async fn confirm_receipt(&self, caller: &ActorId, item_id: ItemId) -> LedgerResult<()> {
        info!("Confirming receipt of item {} by {}", item_id, caller);

        let event = {
            let mut state = self.state.lock().await;
            let now = state.now(self.clock.as_ref());

            let (seller, price) = self
                .validate_confirm(&state, caller, item_id, now)
                .inspect_err(|e| warn!("Rejected confirmation of item {} by {}: {}", item_id, caller, e))?;

            self.custody
                .release(item_id, &seller, price)
                .await
                .inspect_err(|e| warn!("Release failed for item {}: {}", item_id, e))?;

            state.item_mut(item_id)?.release(now)?;
            state.actors.note_confirmed(caller, now);

            let event = LedgerEvent::new(LedgerEventKind::ItemReleased, item_id, seller, price, now);
            state.commit(now, event.clone());
            event
        };

        self.emit(&event).await;
        info!("Released item {} to {}", item_id, event.actor);

        Ok(())
    }

    /// Get an item by ID
    pub async fn get_item(&self, item_id: ItemId) -> LedgerResult<Item> {
        self.state.lock().await.item(item_id).cloned()
    }

    /// Number of items ever created; also the next item ID
    pub async fn item_count(&self) -> u64 {
        self.state.lock().await.items.len() as u64
    }

    pub async fn list_items(&self) -> Vec<Item> {
        self.state.lock().await.items.clone()
    }

    pub async fn items_by_seller(&self, seller: &ActorId) -> Vec<Item> {
        self.state
            .lock()
            .await
            .items
            .iter()
            .filter(|item| &item.seller == seller)
            .cloned()
            .collect()
    }

    pub async fn actor_record(&self, actor: &ActorId) -> ActorRecord {
        self.state.lock().await.actors.record(actor)
    }

    /// Audit trail for an item, oldest first
    pub async fn item_events(&self, item_id: ItemId) -> LedgerResult<Vec<LedgerEvent>> {
        let state = self.state.lock().await;
        state.item(item_id)?;

        Ok(state
            .events
            .iter()
            .filter(|event| event.item_id == item_id)
            .cloned()
            .collect())
    }

    /// Compare custody's per-item escrow against item states
    pub async fn escrow_audit(&self) -> EscrowAudit {
        let state = self.state.lock().await;

        let mut audit = EscrowAudit {
            locked_items: 0,
            expected_total: Decimal::ZERO,
            held_total: Decimal::ZERO,
            discrepancies: Vec::new(),
        };

        for item in &state.items {
            let expected = if item.state.holds_escrow() {
                audit.locked_items += 1;
                item.price
            } else {
                Decimal::ZERO
            };
            let held = self.custody.escrowed(item.id).await;

            audit.expected_total += expected;
            audit.held_total += held;
            if held != expected {
                audit.discrepancies.push(EscrowDiscrepancy {
                    item_id: item.id,
                    state: item.state,
                    expected,
                    held,
                });
            }
        }

        if !audit.is_clean() {
            warn!("Escrow audit found {} discrepancies", audit.discrepancies.len());
        }

        audit
    }

    async fn emit(&self, event: &LedgerEvent) {
        if let Err(e) = self.publisher.publish(event).await {
            warn!("Failed to publish {} for item {}: {}", event.kind.as_str(), event.item_id, e);
        }
    }

    fn validate_create_item(
        state: &LedgerState,
        caller: &ActorId,
        request: &CreateItemRequest,
        now: DateTime<Utc>,
    ) -> LedgerResult<()> {
        state.actors.check_cooldown(caller, ActionKind::CreateItem, now)?;
        state.actors.check_listing_capacity(caller)?;

        if request.price <= Decimal::ZERO {
            return Err(LedgerError::InvalidPrice);
        }

        Ok(())
    }

    /// Returns the seller and price of the item on success
    fn validate_purchase(
        state: &LedgerState,
        caller: &ActorId,
        item_id: ItemId,
        payment: Decimal,
        now: DateTime<Utc>,
    ) -> LedgerResult<(ActorId, Decimal)> {
        state.actors.check_cooldown(caller, ActionKind::PurchaseItem, now)?;

        let item = state.item(item_id)?;
        if !item.state.can_purchase() {
            return Err(LedgerError::ItemNotAvailable {
                item_id,
                state: item.state,
            });
        }

        if payment != item.price {
            return Err(LedgerError::IncorrectPayment {
                expected: item.price,
                received: payment,
            });
        }

        if &item.seller == caller {
            return Err(LedgerError::unauthorized("Seller cannot purchase their own item"));
        }

        Ok((item.seller.clone(), item.price))
    }

    /// Returns the seller and price of the item on success
    fn validate_confirm(
        &self,
        state: &LedgerState,
        caller: &ActorId,
        item_id: ItemId,
        now: DateTime<Utc>,
    ) -> LedgerResult<(ActorId, Decimal)> {
        state.actors.check_cooldown(caller, ActionKind::ConfirmReceipt, now)?;

        let item = state.item(item_id)?;
        let not_locked = LedgerError::ItemNotLocked {
            item_id,
            state: item.state,
        };
        if !item.state.can_confirm() {
            return Err(not_locked);
        }

        let unlocks_at = item.unlocks_at(self.config.release_lock()).ok_or(not_locked)?;
        if now < unlocks_at {
            return Err(LedgerError::LockPeriodActive { item_id, unlocks_at });
        }

        if item.buyer.as_ref() != Some(caller) {
            return Err(LedgerError::unauthorized("Only the buyer can confirm receipt"));
        }

        Ok((item.seller.clone(), item.price))
    }
}
