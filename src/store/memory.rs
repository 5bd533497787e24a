//! In-process store used by tests, benches and embedding callers.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::catalog::Catalog;
use crate::perks::model::{GuildId, OverrideMode, PerkId, PerkRef, UserId};
use crate::store::{GameStore, Holding, PropertyOwnership, StateKey, StateStore, StoreError};

#[derive(Debug, Default)]
struct GameTables {
    catalogs: HashMap<GuildId, Arc<Catalog>>,
    holdings: BTreeMap<(GuildId, UserId), Vec<Holding>>,
    properties: BTreeMap<(GuildId, UserId), Vec<PropertyOwnership>>,
    users: BTreeMap<GuildId, BTreeSet<UserId>>,
}

/// Key-value state tables. Shared with [crate::store::JsonFileStore], which
/// persists the same tables to disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct StateTables {
    pub(crate) overrides: BTreeMap<StateKey, OverrideMode>,
    pub(crate) active: BTreeMap<StateKey, bool>,
    pub(crate) networth_bonus: BTreeMap<(GuildId, UserId), f64>,
}

impl StateTables {
    pub(crate) fn overrides_for(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> BTreeMap<PerkId, OverrideMode> {
        self.overrides
            .iter()
            .filter(|(key, _)| key.guild == guild && key.user == user)
            .filter_map(|(key, mode)| match key.perk {
                PerkRef::Perk(id) => Some((id, *mode)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn set_override(&mut self, key: &StateKey, mode: OverrideMode) {
        if mode == OverrideMode::Auto {
            self.overrides.remove(key);
        } else {
            self.overrides.insert(key.clone(), mode);
        }
    }

    pub(crate) fn active_for(&self, guild: GuildId, user: UserId) -> BTreeSet<PerkRef> {
        self.active
            .iter()
            .filter(|(key, active)| **active && key.guild == guild && key.user == user)
            .map(|(key, _)| key.perk.clone())
            .collect()
    }

    pub(crate) fn networth_bonus_for(&self, guild: GuildId, user: UserId) -> f64 {
        self.networth_bonus
            .get(&(guild, user))
            .copied()
            .filter(|bonus| bonus.is_finite())
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    game: RwLock<GameTables>,
    state: RwLock<StateTables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_catalog(&self, guild: GuildId, catalog: Catalog) -> Result<(), StoreError> {
        let mut game = self.game.write().map_err(|_| StoreError::Poisoned)?;
        game.catalogs.insert(guild, Arc::new(catalog));
        Ok(())
    }

    pub fn set_holdings(
        &self,
        guild: GuildId,
        user: UserId,
        holdings: Vec<Holding>,
    ) -> Result<(), StoreError> {
        let mut game = self.game.write().map_err(|_| StoreError::Poisoned)?;
        game.users.entry(guild).or_default().insert(user);
        game.holdings.insert((guild, user), holdings);
        Ok(())
    }

    pub fn set_properties(
        &self,
        guild: GuildId,
        user: UserId,
        properties: Vec<PropertyOwnership>,
    ) -> Result<(), StoreError> {
        let mut game = self.game.write().map_err(|_| StoreError::Poisoned)?;
        game.users.entry(guild).or_default().insert(user);
        game.properties.insert((guild, user), properties);
        Ok(())
    }

    /// Makes every subsequent call fail with [StoreError::Unavailable].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Raw activation flag, including explicit `false` entries.
    pub fn activation_flag(&self, key: &StateKey) -> Option<bool> {
        self.state.read().ok()?.active.get(key).copied()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }
}

impl GameStore for MemoryStore {
    fn catalog(&self, guild: GuildId) -> Result<Arc<Catalog>, StoreError> {
        self.check_available()?;
        let game = self.game.read().map_err(|_| StoreError::Poisoned)?;
        Ok(game.catalogs.get(&guild).cloned().unwrap_or_default())
    }

    fn holdings(&self, guild: GuildId, user: UserId) -> Result<Vec<Holding>, StoreError> {
        self.check_available()?;
        let game = self.game.read().map_err(|_| StoreError::Poisoned)?;
        Ok(game.holdings.get(&(guild, user)).cloned().unwrap_or_default())
    }

    fn owned_properties(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> Result<Vec<PropertyOwnership>, StoreError> {
        self.check_available()?;
        let game = self.game.read().map_err(|_| StoreError::Poisoned)?;
        Ok(game.properties.get(&(guild, user)).cloned().unwrap_or_default())
    }

    fn users(&self, guild: GuildId) -> Result<Vec<UserId>, StoreError> {
        self.check_available()?;
        let game = self.game.read().map_err(|_| StoreError::Poisoned)?;
        Ok(game
            .users
            .get(&guild)
            .map(|users| users.iter().copied().collect())
            .unwrap_or_default())
    }
}

impl StateStore for MemoryStore {
    fn overrides(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> Result<BTreeMap<PerkId, OverrideMode>, StoreError> {
        self.check_available()?;
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.overrides_for(guild, user))
    }

    fn set_override(&self, key: &StateKey, mode: OverrideMode) -> Result<(), StoreError> {
        self.check_available()?;
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        state.set_override(key, mode);
        Ok(())
    }

    fn active_perks(&self, guild: GuildId, user: UserId) -> Result<BTreeSet<PerkRef>, StoreError> {
        self.check_available()?;
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.active_for(guild, user))
    }

    fn set_active(&self, key: &StateKey, active: bool) -> Result<(), StoreError> {
        self.check_available()?;
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        state.active.insert(key.clone(), active);
        Ok(())
    }

    fn networth_bonus(&self, guild: GuildId, user: UserId) -> Result<f64, StoreError> {
        self.check_available()?;
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.networth_bonus_for(guild, user))
    }

    fn set_networth_bonus(
        &self,
        guild: GuildId,
        user: UserId,
        bonus: f64,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        state.networth_bonus.insert((guild, user), bonus);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_override_clears_the_entry() {
        let store = MemoryStore::new();
        let key = StateKey::catalog_perk(1, 2, 3);
        store.set_override(&key, OverrideMode::Off).expect("set");
        assert_eq!(store.overrides(1, 2).expect("read").get(&3), Some(&OverrideMode::Off));
        store.set_override(&key, OverrideMode::Auto).expect("set");
        assert!(store.overrides(1, 2).expect("read").is_empty());
    }

    #[test]
    fn state_is_scoped_per_guild_and_user() {
        let store = MemoryStore::new();
        store
            .set_active(&StateKey::catalog_perk(1, 2, 3), true)
            .expect("set");
        store
            .set_active(&StateKey::catalog_perk(1, 9, 4), true)
            .expect("set");
        store
            .set_active(&StateKey::catalog_perk(1, 2, 5), false)
            .expect("set");

        let active = store.active_perks(1, 2).expect("read");
        assert_eq!(active.into_iter().collect::<Vec<_>>(), vec![PerkRef::Perk(3)]);
        assert!(store.active_perks(7, 2).expect("read").is_empty());
    }

    #[test]
    fn unavailable_store_errors_instead_of_defaulting() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(store.holdings(1, 1), Err(StoreError::Unavailable(_))));
        assert!(matches!(store.networth_bonus(1, 1), Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn seeding_a_poisoned_store_reports_the_failure() {
        let store = Arc::new(MemoryStore::new());
        let poisoner = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.game.write().expect("lock");
            panic!("poison the game tables");
        })
        .join();

        assert!(matches!(
            store.set_holdings(1, 2, vec![Holding::new("gold", 3)]),
            Err(StoreError::Poisoned)
        ));
        assert!(matches!(store.set_catalog(1, Catalog::default()), Err(StoreError::Poisoned)));
        assert!(matches!(store.holdings(1, 2), Err(StoreError::Poisoned)));
    }
}
