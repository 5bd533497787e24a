//! Per-guild rule catalog: perks, commodity perks, tag index and property effects.
//!
//! Rows are stored loosely typed (see [raw]); they are compiled into the validated
//! types of [crate::perks::model] once, when the catalog is loaded.

pub mod raw;
pub mod validate;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::perks::model::{CommodityPerk, PerkDefinition, PropertyEffectSet, PropertyId};

pub use raw::RawCatalog;
pub use validate::{
    validate_catalog_file, validate_raw_catalog, ValidationReport, ValidationSeverity,
};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse catalog json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse catalog yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Compiled catalog for one guild. Perks are kept in evaluation order
/// (`priority` ascending, then `id`).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    pub perks: Vec<PerkDefinition>,
    /// Keyed by lower-cased commodity name.
    pub commodity_perks: BTreeMap<String, CommodityPerk>,
    /// Lower-cased commodity name -> lower-cased tags.
    pub tags: BTreeMap<String, BTreeSet<String>>,
    pub properties: BTreeMap<PropertyId, PropertyEffectSet>,
}

impl Catalog {
    pub fn from_raw(raw: &RawCatalog) -> Self {
        raw.compile()
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_str(json)?;
        Ok(raw.compile())
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_yaml::from_str(yaml)?;
        Ok(raw.compile())
    }

    /// Loads a catalog file; `.yaml`/`.yml` are parsed as YAML, everything else as JSON.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let raw = load_raw_catalog(path)?;
        let catalog = raw.compile();
        tracing::info!(
            target: "perkeval::catalog",
            path = %path.display(),
            perks = catalog.perks.len(),
            commodity_perks = catalog.commodity_perks.len(),
            properties = catalog.properties.len(),
            "catalog.loaded"
        );
        Ok(catalog)
    }

    /// Adds a perk, keeping evaluation order.
    pub fn insert_perk(&mut self, perk: PerkDefinition) {
        self.perks.retain(|existing| existing.id != perk.id);
        if perk.enabled {
            self.perks.push(perk);
            self.perks.sort_by_key(|p| (p.priority, p.id));
        }
    }

    pub fn insert_commodity_perk(&mut self, perk: CommodityPerk) {
        self.commodity_perks.insert(perk.commodity.clone(), perk);
    }

    pub fn tag_commodity(&mut self, commodity: &str, tag: &str) {
        let commodity = commodity.trim().to_lowercase();
        let tag = tag.trim().to_lowercase();
        if commodity.is_empty() || tag.is_empty() {
            return;
        }
        self.tags.entry(commodity).or_default().insert(tag);
    }

    pub fn insert_property(&mut self, property: PropertyEffectSet) {
        self.properties.insert(property.id, property);
    }

    pub fn perk(&self, id: u64) -> Option<&PerkDefinition> {
        self.perks.iter().find(|perk| perk.id == id)
    }

    /// Every tag known to the index, whether or not anyone holds tagged items.
    pub fn all_tags(&self) -> BTreeSet<&str> {
        self.tags
            .values()
            .flat_map(|tags| tags.iter().map(String::as_str))
            .collect()
    }
}

pub fn load_raw_catalog(path: &Path) -> Result<RawCatalog, CatalogError> {
    let data = fs::read_to_string(path).map_err(|source| CatalogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if is_yaml_path(path) {
        Ok(serde_yaml::from_str(&data)?)
    } else {
        Ok(serde_json::from_str(&data)?)
    }
}

pub(crate) fn is_yaml_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}
