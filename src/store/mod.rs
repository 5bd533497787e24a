//! Store contracts the engine reads from and the activation tracker writes to.
//!
//! `GameStore` covers tabular game data (catalog, holdings, property ownership);
//! `StateStore` covers the key-value state keyed by [StateKey]. Both are
//! synchronous and shared behind `Arc`, so implementations use interior locking.

pub mod file;
pub mod memory;

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{Catalog, CatalogError};
use crate::perks::model::{GuildId, OverrideMode, PerkId, PerkRef, PropertyId, UserId};

pub use file::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse '{path}': {message}")]
    Parse { path: PathBuf, message: String },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Composite key for per-user per-perk state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub guild: GuildId,
    pub user: UserId,
    pub perk: PerkRef,
}

impl StateKey {
    pub fn new(guild: GuildId, user: UserId, perk: PerkRef) -> Self {
        Self { guild, user, perk }
    }

    pub fn catalog_perk(guild: GuildId, user: UserId, perk: PerkId) -> Self {
        Self::new(guild, user, PerkRef::Perk(perk))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub commodity: String,
    pub quantity: i64,
    /// Current market price per unit; only used to derive a default net worth.
    #[serde(default)]
    pub unit_price: f64,
}

impl Holding {
    pub fn new(commodity: impl Into<String>, quantity: i64) -> Self {
        Self {
            commodity: commodity.into(),
            quantity,
            unit_price: 0.0,
        }
    }

    pub fn priced(mut self, unit_price: f64) -> Self {
        self.unit_price = unit_price;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyOwnership {
    pub property_id: PropertyId,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub ascended: bool,
}

pub trait GameStore: Send + Sync {
    fn catalog(&self, guild: GuildId) -> Result<Arc<Catalog>, StoreError>;

    fn holdings(&self, guild: GuildId, user: UserId) -> Result<Vec<Holding>, StoreError>;

    fn owned_properties(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> Result<Vec<PropertyOwnership>, StoreError>;

    /// Every registered user of a guild.
    fn users(&self, guild: GuildId) -> Result<Vec<UserId>, StoreError>;
}

pub trait StateStore: Send + Sync {
    /// Explicit overrides for catalog perks; `auto` entries may be omitted.
    fn overrides(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> Result<BTreeMap<PerkId, OverrideMode>, StoreError>;

    fn set_override(&self, key: &StateKey, mode: OverrideMode) -> Result<(), StoreError>;

    /// Perks whose activation flag is currently set.
    fn active_perks(&self, guild: GuildId, user: UserId) -> Result<BTreeSet<PerkRef>, StoreError>;

    fn set_active(&self, key: &StateKey, active: bool) -> Result<(), StoreError>;

    /// Applies several activation flags as one write batch.
    fn set_active_many(&self, updates: &[(StateKey, bool)]) -> Result<(), StoreError> {
        for (key, active) in updates {
            self.set_active(key, *active)?;
        }
        Ok(())
    }

    /// The time-scoped net-worth bonus; 0 when none is stored.
    fn networth_bonus(&self, guild: GuildId, user: UserId) -> Result<f64, StoreError>;

    fn set_networth_bonus(
        &self,
        guild: GuildId,
        user: UserId,
        bonus: f64,
    ) -> Result<(), StoreError>;
}
