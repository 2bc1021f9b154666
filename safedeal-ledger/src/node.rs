//! Ledger node - wires the ledger to in-process collaborators
//!
//! Hosts that do not bring their own custody backend or event channel get a
//! ready-to-use ledger from `LedgerNode`, backed by `InMemoryCustody` and a
//! `BroadcastPublisher`.

use crate::{
    clock::{Clock, SystemClock},
    config::LedgerConfig,
    custody::InMemoryCustody,
    ledger::EscrowLedger,
    models::LedgerEvent,
    publisher::BroadcastPublisher,
    LedgerResult,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Ledger plus the collaborators it was built with
pub struct LedgerNode {
    ledger: Arc<EscrowLedger>,
    custody: Arc<InMemoryCustody>,
    publisher: Arc<BroadcastPublisher>,
}

/// Node health status
#[derive(Debug, Clone)]
pub struct NodeHealth {
    pub healthy: bool,
    pub issues: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl LedgerNode {
    /// Create a node driven by the wall clock
    pub fn new(config: LedgerConfig) -> LedgerResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: LedgerConfig, clock: Arc<dyn Clock>) -> LedgerResult<Self> {
        info!("Initializing ledger node");

        let custody = Arc::new(InMemoryCustody::new());
        let publisher = Arc::new(BroadcastPublisher::new(config.event_buffer));
        let ledger = Arc::new(EscrowLedger::new(
            config,
            custody.clone(),
            publisher.clone(),
            clock,
        )?);

        info!("Ledger node initialized successfully");

        Ok(Self {
            ledger,
            custody,
            publisher,
        })
    }

    /// Create a node from `safedeal.toml` and `SAFEDEAL_*` environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let config = LedgerConfig::load().context("failed to load ledger configuration")?;
        Self::new(config).context("failed to initialize ledger node")
    }

    pub fn ledger(&self) -> Arc<EscrowLedger> {
        self.ledger.clone()
    }

    pub fn custody(&self) -> Arc<InMemoryCustody> {
        self.custody.clone()
    }

    /// Receive every ledger event committed from now on
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.publisher.subscribe()
    }

    /// Health check: escrow balances must match item states
    pub async fn health_check(&self) -> NodeHealth {
        let mut issues = Vec::new();

        let audit = self.ledger.escrow_audit().await;
        for d in &audit.discrepancies {
            issues.push(format!(
                "item {} ({}) holds {} in escrow, expected {}",
                d.item_id, d.state, d.held, d.expected
            ));
        }

        let total = self.custody.total_escrowed().await;
        if total != audit.expected_total {
            issues.push(format!(
                "custody holds {} in escrow, locked items account for {}",
                total, audit.expected_total
            ));
        }

        NodeHealth {
            healthy: issues.is_empty(),
            issues,
            timestamp: Utc::now(),
        }
    }
}
