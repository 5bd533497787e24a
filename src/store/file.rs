//! File-backed store: game data read from `world.json` (or `world.yaml`), state
//! persisted to `state.json` after every write batch.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, RawCatalog};
use crate::perks::model::{GuildId, OverrideMode, PerkId, PerkRef, UserId};
use crate::store::memory::StateTables;
use crate::store::{GameStore, Holding, PropertyOwnership, StateKey, StateStore, StoreError};

pub const WORLD_FILE_JSON: &str = "world.json";
pub const WORLD_FILE_YAML: &str = "world.yaml";
pub const STATE_FILE: &str = "state.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldFile {
    pub guilds: BTreeMap<GuildId, GuildFile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildFile {
    pub catalog: RawCatalog,
    pub players: BTreeMap<UserId, PlayerFile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerFile {
    pub holdings: Vec<Holding>,
    pub properties: Vec<PropertyOwnership>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OverrideEntry {
    guild: GuildId,
    user: UserId,
    perk: PerkId,
    mode: OverrideMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ActivationEntry {
    guild: GuildId,
    user: UserId,
    perk: PerkRef,
    active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BonusEntry {
    guild: GuildId,
    user: UserId,
    bonus: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct StateFile {
    overrides: Vec<OverrideEntry>,
    active: Vec<ActivationEntry>,
    networth_bonuses: Vec<BonusEntry>,
}

impl From<StateFile> for StateTables {
    fn from(file: StateFile) -> Self {
        let mut tables = StateTables::default();
        for entry in file.overrides {
            tables.set_override(
                &StateKey::catalog_perk(entry.guild, entry.user, entry.perk),
                entry.mode,
            );
        }
        for entry in file.active {
            tables
                .active
                .insert(StateKey::new(entry.guild, entry.user, entry.perk), entry.active);
        }
        for entry in file.networth_bonuses {
            tables
                .networth_bonus
                .insert((entry.guild, entry.user), entry.bonus);
        }
        tables
    }
}

impl From<&StateTables> for StateFile {
    fn from(tables: &StateTables) -> Self {
        StateFile {
            overrides: tables
                .overrides
                .iter()
                .filter_map(|(key, mode)| match key.perk {
                    PerkRef::Perk(perk) => Some(OverrideEntry {
                        guild: key.guild,
                        user: key.user,
                        perk,
                        mode: *mode,
                    }),
                    _ => None,
                })
                .collect(),
            active: tables
                .active
                .iter()
                .map(|(key, active)| ActivationEntry {
                    guild: key.guild,
                    user: key.user,
                    perk: key.perk.clone(),
                    active: *active,
                })
                .collect(),
            networth_bonuses: tables
                .networth_bonus
                .iter()
                .map(|((guild, user), bonus)| BonusEntry {
                    guild: *guild,
                    user: *user,
                    bonus: *bonus,
                })
                .collect(),
        }
    }
}

#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    catalogs: HashMap<GuildId, Arc<Catalog>>,
    players: BTreeMap<(GuildId, UserId), PlayerFile>,
    state: Mutex<StateTables>,
}

impl JsonFileStore {
    /// Opens a data directory. Missing world or state files start empty.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let world = load_world(dir)?;
        let state_path = dir.join(STATE_FILE);
        let state: StateFile = if state_path.exists() {
            let raw = fs::read_to_string(&state_path).map_err(|source| StoreError::Read {
                path: state_path.clone(),
                source,
            })?;
            serde_json::from_str(&raw).map_err(|err| StoreError::Parse {
                path: state_path.clone(),
                message: err.to_string(),
            })?
        } else {
            StateFile::default()
        };

        let mut catalogs = HashMap::new();
        let mut players = BTreeMap::new();
        for (guild, guild_file) in world.guilds {
            catalogs.insert(guild, Arc::new(guild_file.catalog.compile()));
            for (user, player) in guild_file.players {
                players.insert((guild, user), player);
            }
        }

        tracing::info!(
            target: "perkeval::store",
            dir = %dir.display(),
            guilds = catalogs.len(),
            players = players.len(),
            "file_store.opened"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            catalogs,
            players,
            state: Mutex::new(state.into()),
        })
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    /// Writes through a temp file, then renames it over `state.json`.
    fn persist(&self, tables: &StateTables) -> Result<(), StoreError> {
        let path = self.state_path();
        let tmp_path = self.dir.join(format!("{STATE_FILE}.tmp"));
        let payload = serde_json::to_string_pretty(&StateFile::from(tables)).map_err(|err| {
            StoreError::Parse {
                path: path.clone(),
                message: err.to_string(),
            }
        })?;
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Write {
            path: self.dir.clone(),
            source,
        })?;
        fs::write(&tmp_path, payload).map_err(|source| StoreError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &path).map_err(|source| StoreError::Write { path, source })
    }

    fn update<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut StateTables),
    {
        let mut state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        let mut next = state.clone();
        apply(&mut next);
        self.persist(&next)?;
        *state = next;
        Ok(())
    }

    fn read<T>(&self, view: impl FnOnce(&StateTables) -> T) -> Result<T, StoreError> {
        let state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(view(&state))
    }
}

fn load_world(dir: &Path) -> Result<WorldFile, StoreError> {
    let yaml_path = dir.join(WORLD_FILE_YAML);
    let json_path = dir.join(WORLD_FILE_JSON);
    let (path, is_yaml) = if json_path.exists() {
        (json_path, false)
    } else if yaml_path.exists() {
        (yaml_path, true)
    } else {
        return Ok(WorldFile::default());
    };

    let raw = fs::read_to_string(&path).map_err(|source| StoreError::Read {
        path: path.clone(),
        source,
    })?;
    let parsed = if is_yaml {
        serde_yaml::from_str(&raw).map_err(|err| err.to_string())
    } else {
        serde_json::from_str(&raw).map_err(|err| err.to_string())
    };
    parsed.map_err(|message| StoreError::Parse { path, message })
}

impl GameStore for JsonFileStore {
    fn catalog(&self, guild: GuildId) -> Result<Arc<Catalog>, StoreError> {
        Ok(self.catalogs.get(&guild).cloned().unwrap_or_default())
    }

    fn holdings(&self, guild: GuildId, user: UserId) -> Result<Vec<Holding>, StoreError> {
        Ok(self
            .players
            .get(&(guild, user))
            .map(|player| player.holdings.clone())
            .unwrap_or_default())
    }

    fn owned_properties(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> Result<Vec<PropertyOwnership>, StoreError> {
        Ok(self
            .players
            .get(&(guild, user))
            .map(|player| player.properties.clone())
            .unwrap_or_default())
    }

    fn users(&self, guild: GuildId) -> Result<Vec<UserId>, StoreError> {
        Ok(self
            .players
            .keys()
            .filter(|(g, _)| *g == guild)
            .map(|(_, user)| *user)
            .collect())
    }
}

impl StateStore for JsonFileStore {
    fn overrides(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> Result<BTreeMap<PerkId, OverrideMode>, StoreError> {
        self.read(|state| state.overrides_for(guild, user))
    }

    fn set_override(&self, key: &StateKey, mode: OverrideMode) -> Result<(), StoreError> {
        self.update(|state| state.set_override(key, mode))
    }

    fn active_perks(&self, guild: GuildId, user: UserId) -> Result<BTreeSet<PerkRef>, StoreError> {
        self.read(|state| state.active_for(guild, user))
    }

    fn set_active(&self, key: &StateKey, active: bool) -> Result<(), StoreError> {
        self.update(|state| {
            state.active.insert(key.clone(), active);
        })
    }

    fn set_active_many(&self, updates: &[(StateKey, bool)]) -> Result<(), StoreError> {
        if updates.is_empty() {
            return Ok(());
        }
        self.update(|state| {
            for (key, active) in updates {
                state.active.insert(key.clone(), *active);
            }
        })
    }

    fn networth_bonus(&self, guild: GuildId, user: UserId) -> Result<f64, StoreError> {
        self.read(|state| state.networth_bonus_for(guild, user))
    }

    fn set_networth_bonus(
        &self,
        guild: GuildId,
        user: UserId,
        bonus: f64,
    ) -> Result<(), StoreError> {
        self.update(|state| {
            state.networth_bonus.insert((guild, user), bonus);
        })
    }
}
