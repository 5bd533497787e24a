//! Evaluation context for one (guild, user): an immutable snapshot of holdings,
//! tag aggregates, property ownership, overrides and the time-scoped bonus.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::Catalog;
use crate::perks::model::{OverrideMode, PerkId};
use crate::store::{Holding, PropertyOwnership};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Facts {
    /// Lower-cased commodity name -> quantity held (only positive quantities).
    pub commodity_qty: BTreeMap<String, u64>,
    /// Lower-cased tag -> summed quantity of tagged commodities. Every indexed tag is present.
    pub tag_qty: BTreeMap<String, u64>,
    pub properties: Vec<PropertyOwnership>,
    pub overrides: BTreeMap<PerkId, OverrideMode>,
    /// Time-scoped net-worth bonus, read once per evaluation.
    pub networth_bonus: f64,
    /// Market value of the holdings; the default base net worth.
    pub holdings_value: f64,
}

impl Facts {
    pub fn collect(
        catalog: &Catalog,
        holdings: &[Holding],
        properties: Vec<PropertyOwnership>,
        overrides: BTreeMap<PerkId, OverrideMode>,
        networth_bonus: f64,
    ) -> Self {
        let mut commodity_qty: BTreeMap<String, u64> = BTreeMap::new();
        let mut holdings_value = 0.0;
        for holding in holdings {
            let key = holding.commodity.trim().to_lowercase();
            if key.is_empty() || holding.quantity <= 0 {
                continue;
            }
            *commodity_qty.entry(key).or_default() += holding.quantity as u64;
            if holding.unit_price.is_finite() {
                holdings_value += holding.quantity as f64 * holding.unit_price;
            }
        }

        let mut tag_qty: BTreeMap<String, u64> = catalog
            .all_tags()
            .into_iter()
            .map(|tag| (tag.to_string(), 0))
            .collect();
        for (commodity, tags) in &catalog.tags {
            let held = commodity_qty.get(commodity).copied().unwrap_or(0);
            for tag in tags {
                *tag_qty.entry(tag.clone()).or_default() += held;
            }
        }

        Self {
            commodity_qty,
            tag_qty,
            properties,
            overrides,
            networth_bonus: if networth_bonus.is_finite() {
                networth_bonus
            } else {
                0.0
            },
            holdings_value,
        }
    }

    pub fn commodity_quantity(&self, name: &str) -> f64 {
        self.commodity_qty.get(name).copied().unwrap_or(0) as f64
    }

    pub fn tag_quantity(&self, tag: &str) -> f64 {
        self.tag_qty.get(tag).copied().unwrap_or(0) as f64
    }

    /// Largest quantity of any single commodity, 0 when nothing is held.
    pub fn max_single_quantity(&self) -> f64 {
        self.commodity_qty.values().copied().max().unwrap_or(0) as f64
    }

    pub fn override_for(&self, perk: PerkId) -> OverrideMode {
        self.overrides.get(&perk).copied().unwrap_or_default()
    }

    /// Builder for tests and callers that already hold the numbers.
    pub fn with_commodity(mut self, name: &str, quantity: u64) -> Self {
        self.commodity_qty.insert(name.trim().to_lowercase(), quantity);
        self
    }

    pub fn with_override(mut self, perk: PerkId, mode: OverrideMode) -> Self {
        self.overrides.insert(perk, mode);
        self
    }
}
