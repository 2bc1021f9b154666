//! Ledger configuration
//!
//! Timing guards and the listing cap are plain configuration so hosts and
//! tests can shrink them. Values load from an optional `safedeal.toml` and
//! `SAFEDEAL_*` environment variables.

use crate::{error::LedgerError, LedgerResult};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Upper bound for `create_cooldown_secs` and `release_lock_secs` (one year)
pub const MAX_GUARD_SECS: u64 = 365 * 24 * 60 * 60;

/// Which mutating operations check and consume the per-actor cooldown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownScope {
    /// Only listing creation is rate limited
    CreateOnly,
    /// Listing, purchase and confirmation share one cooldown per actor
    AllActions,
}

/// Mutating ledger operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    CreateItem,
    PurchaseItem,
    ConfirmReceipt,
}

impl CooldownScope {
    pub fn covers(&self, action: ActionKind) -> bool {
        match self {
            Self::CreateOnly => action == ActionKind::CreateItem,
            Self::AllActions => true,
        }
    }
}

/// Configuration for the escrow ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Minimum time between two cooldown-consuming actions of one actor, in seconds
    pub create_cooldown_secs: u64,
    /// Time after purchase before the buyer may confirm receipt, in seconds
    pub release_lock_secs: u64,
    /// Maximum number of unsold listings per actor
    pub max_active_listings: u32,
    /// Operations subject to the cooldown
    pub cooldown_scope: CooldownScope,
    /// Capacity of the broadcast channel used for ledger events
    pub event_buffer: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            create_cooldown_secs: 300, // 5 minutes
            release_lock_secs: 600,    // 10 minutes
            max_active_listings: 4,
            cooldown_scope: CooldownScope::CreateOnly,
            event_buffer: 256,
        }
    }
}

impl LedgerConfig {
    /// Load from `safedeal.toml` (optional) overlaid with `SAFEDEAL_*` variables
    pub fn load() -> LedgerResult<Self> {
        let settings = Config::builder()
            .add_source(File::with_name("safedeal").required(false))
            .add_source(Environment::with_prefix("SAFEDEAL"))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse an inline TOML document; missing keys keep their defaults
    pub fn from_toml_str(toml: &str) -> LedgerResult<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.create_cooldown_secs == 0 {
            return Err(LedgerError::config("create_cooldown_secs must be greater than 0"));
        }
        if self.create_cooldown_secs > MAX_GUARD_SECS {
            return Err(LedgerError::config(format!(
                "create_cooldown_secs must not exceed {MAX_GUARD_SECS}"
            )));
        }
        if self.release_lock_secs > MAX_GUARD_SECS {
            return Err(LedgerError::config(format!(
                "release_lock_secs must not exceed {MAX_GUARD_SECS}"
            )));
        }
        if self.max_active_listings == 0 {
            return Err(LedgerError::config("max_active_listings must be greater than 0"));
        }
        if self.event_buffer == 0 {
            return Err(LedgerError::config("event_buffer must be greater than 0"));
        }
        Ok(())
    }

    pub fn create_cooldown(&self) -> chrono::Duration {
        secs_to_duration(self.create_cooldown_secs)
    }

    pub fn release_lock(&self) -> chrono::Duration {
        secs_to_duration(self.release_lock_secs)
    }
}

/// Saturates at `TimeDelta::MAX` so an unvalidated value can only lengthen a guard
fn secs_to_duration(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::TimeDelta::try_seconds)
        .unwrap_or(chrono::TimeDelta::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.create_cooldown() > chrono::Duration::zero());
        assert!(config.create_cooldown() < chrono::Duration::minutes(6));
        assert_eq!(config.release_lock(), chrono::Duration::minutes(10));
        assert_eq!(config.max_active_listings, 4);
    }

    #[test]
    fn test_from_toml_overrides() {
        let config = LedgerConfig::from_toml_str(
            r#"
            create_cooldown_secs = 2
            release_lock_secs = 5
            cooldown_scope = "all_actions"
            "#,
        )
        .unwrap();

        assert_eq!(config.create_cooldown_secs, 2);
        assert_eq!(config.release_lock_secs, 5);
        assert_eq!(config.cooldown_scope, CooldownScope::AllActions);
        assert_eq!(config.max_active_listings, 4);
    }

    #[test]
    fn test_rejects_zero_cooldown() {
        let result = LedgerConfig::from_toml_str("create_cooldown_secs = 0");
        match result.unwrap_err() {
            LedgerError::Config(msg) => assert!(msg.contains("create_cooldown_secs")),
            other => panic!("Expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_oversized_guards() {
        let result = LedgerConfig::from_toml_str("release_lock_secs = 1000000000000000");
        match result.unwrap_err() {
            LedgerError::Config(msg) => assert!(msg.contains("release_lock_secs")),
            other => panic!("Expected config error, got {other:?}"),
        }

        let config = LedgerConfig {
            create_cooldown_secs: MAX_GUARD_SECS + 1,
            ..LedgerConfig::default()
        };
        match config.validate().unwrap_err() {
            LedgerError::Config(msg) => assert!(msg.contains("create_cooldown_secs")),
            other => panic!("Expected config error, got {other:?}"),
        }

        let at_bound = LedgerConfig {
            create_cooldown_secs: MAX_GUARD_SECS,
            release_lock_secs: MAX_GUARD_SECS,
            ..LedgerConfig::default()
        };
        assert!(at_bound.validate().is_ok());
    }

    #[test]
    fn test_unvalidated_durations_saturate() {
        // values past i64::MAX used to wrap negative and disable the cooldown
        let config = LedgerConfig {
            create_cooldown_secs: u64::MAX,
            release_lock_secs: 10_000_000_000_000_000,
            ..LedgerConfig::default()
        };
        assert_eq!(config.create_cooldown(), chrono::TimeDelta::MAX);
        assert_eq!(config.release_lock(), chrono::TimeDelta::MAX);
    }

    #[test]
    fn test_cooldown_scope() {
        assert!(CooldownScope::CreateOnly.covers(ActionKind::CreateItem));
        assert!(!CooldownScope::CreateOnly.covers(ActionKind::PurchaseItem));
        assert!(!CooldownScope::CreateOnly.covers(ActionKind::ConfirmReceipt));
        assert!(CooldownScope::AllActions.covers(ActionKind::ConfirmReceipt));
    }
}
