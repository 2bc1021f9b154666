//! Funds custody - moves value into and out of item escrow
//!
//! The ledger never touches balances itself. It asks a `FundsCustody`
//! backend to pull a payment into escrow on purchase and to pay the escrow
//! out on release. Both calls either complete fully or fail without moving
//! anything.

use crate::{
    error::CustodyError,
    models::{ActorId, ItemId},
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Funds-transfer primitive consumed by the ledger
#[async_trait]
pub trait FundsCustody: Send + Sync {
    /// Move `amount` from `from` into escrow held against `item_id`
    async fn escrow(
        &self,
        item_id: ItemId,
        from: &ActorId,
        amount: Decimal,
    ) -> Result<(), CustodyError>;

    /// Pay `amount` held against `item_id` out to `to`
    async fn release(
        &self,
        item_id: ItemId,
        to: &ActorId,
        amount: Decimal,
    ) -> Result<(), CustodyError>;

    /// Value currently held in escrow for `item_id`
    async fn escrowed(&self, item_id: ItemId) -> Decimal;
}

#[derive(Debug, Default)]
struct CustodyBook {
    balances: HashMap<ActorId, Decimal>,
    escrow: HashMap<ItemId, Decimal>,
    rejecting: HashSet<ActorId>,
}

/// In-process custody with per-actor balances and per-item escrow
#[derive(Debug, Default)]
pub struct InMemoryCustody {
    book: RwLock<CustodyBook>,
}

impl InMemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an actor's spendable balance
    pub async fn deposit(&self, actor: &ActorId, amount: Decimal) -> Result<Decimal, CustodyError> {
        if amount <= Decimal::ZERO {
            return Err(CustodyError::InvalidAmount);
        }

        let mut book = self.book.write().await;
        let balance = book.balances.entry(actor.clone()).or_insert(Decimal::ZERO);
        *balance += amount;

        debug!("Deposited {} for {} (balance {})", amount, actor, balance);
        Ok(*balance)
    }

    pub async fn balance_of(&self, actor: &ActorId) -> Decimal {
        self.book
            .read()
            .await
            .balances
            .get(actor)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Sum of every item's escrow
    pub async fn total_escrowed(&self) -> Decimal {
        self.book.read().await.escrow.values().copied().sum()
    }

    /// Make `actor` refuse incoming transfers, or accept them again
    pub async fn set_rejects_payments(&self, actor: &ActorId, rejects: bool) {
        let mut book = self.book.write().await;
        if rejects {
            book.rejecting.insert(actor.clone());
        } else {
            book.rejecting.remove(actor);
        }
    }
}

#[async_trait]
impl FundsCustody for InMemoryCustody {
    async fn escrow(
        &self,
        item_id: ItemId,
        from: &ActorId,
        amount: Decimal,
    ) -> Result<(), CustodyError> {
        if amount <= Decimal::ZERO {
            return Err(CustodyError::InvalidAmount);
        }

        let mut book = self.book.write().await;
        let available = book.balances.get(from).copied().unwrap_or(Decimal::ZERO);
        if available < amount {
            return Err(CustodyError::InsufficientFunds {
                actor: from.clone(),
                available,
                required: amount,
            });
        }

        book.balances.insert(from.clone(), available - amount);
        *book.escrow.entry(item_id).or_insert(Decimal::ZERO) += amount;

        info!("Escrowed {} from {} for item {}", amount, from, item_id);
        Ok(())
    }

    async fn release(
        &self,
        item_id: ItemId,
        to: &ActorId,
        amount: Decimal,
    ) -> Result<(), CustodyError> {
        let mut book = self.book.write().await;

        let held = book.escrow.get(&item_id).copied().unwrap_or(Decimal::ZERO);
        if held != amount {
            return Err(CustodyError::EscrowMismatch {
                item_id,
                held,
                requested: amount,
            });
        }
        if book.rejecting.contains(to) {
            return Err(CustodyError::PayeeRejected(to.clone()));
        }

        book.escrow.remove(&item_id);
        *book.balances.entry(to.clone()).or_insert(Decimal::ZERO) += amount;

        info!("Released {} for item {} to {}", amount, item_id, to);
        Ok(())
    }

    async fn escrowed(&self, item_id: ItemId) -> Decimal {
        self.book
            .read()
            .await
            .escrow
            .get(&item_id)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}
