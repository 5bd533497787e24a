//! Evaluation pipeline: facts -> requirement matching -> effect accumulation -> finalization.
//!
//! [evaluate_snapshot] is the pure core. [PerkEngine] wires it to the stores and
//! adds activation tracking.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::perks::activation::{track_activations, ActivatedPerk};
use crate::perks::effects::{apply_source, signed, SourceOutcome};
use crate::perks::facts::Facts;
use crate::perks::finalize::finalize_all;
use crate::perks::model::{Effect, GuildId, OverrideMode, PerkRef, UserId, EPSILON};
use crate::perks::requirements::match_perk;
use crate::perks::stacking::{StackContribution, StatStacking};
use crate::perks::stat::{Stat, StatValues};
use crate::store::{GameStore, StateStore, StoreError};

pub const NETWORTH_BONUS_NAME: &str = "Daily Close Rank Bonus";
pub const NETWORTH_BONUS_DESCRIPTION: &str = "Top close ranking bonus active until next close.";
pub const PROPERTY_DESCRIPTION: &str = "Property effect";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A contribution source that changed at least one accumulator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedPerk {
    pub perk: PerkRef,
    pub name: String,
    pub description: String,
    pub stacks: u32,
    /// Only present for catalog perks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_mode: Option<OverrideMode>,
    pub adds: StatValues,
    pub muls: StatValues,
    pub display: String,
}

impl MatchedPerk {
    fn from_outcome(
        perk: PerkRef,
        name: String,
        description: String,
        stacks: u32,
        override_mode: Option<OverrideMode>,
        outcome: &SourceOutcome,
    ) -> Self {
        let breakdown = outcome.breakdown();
        Self {
            perk,
            name,
            description,
            stacks,
            override_mode,
            adds: breakdown.adds,
            muls: breakdown.muls,
            display: outcome.display(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub base: StatValues,
    #[serde(rename = "final")]
    pub final_values: StatValues,
    pub matched_perks: Vec<MatchedPerk>,
}

impl Evaluation {
    pub fn final_value(&self, stat: Stat) -> f64 {
        self.final_values.value(stat)
    }

    pub fn base_value(&self, stat: Stat) -> f64 {
        self.base.value(stat)
    }

    pub fn matched_refs(&self) -> impl Iterator<Item = &PerkRef> {
        self.matched_perks.iter().map(|matched| &matched.perk)
    }

    pub fn matched(&self, perk: &PerkRef) -> Option<&MatchedPerk> {
        self.matched_perks.iter().find(|matched| &matched.perk == perk)
    }
}

/// Completes a caller-supplied partial base: config defaults for unset stats,
/// and the holdings' market value for an unset net worth.
pub fn resolve_base(partial: &StatValues, facts: &Facts, config: &EngineConfig) -> StatValues {
    let mut base = partial.clone();
    if !base.contains(Stat::Networth) {
        base.set(Stat::Networth, facts.holdings_value);
    }
    base.fill_from(&config.defaults);
    for stat in Stat::ALL {
        if !base.contains(stat) {
            base.set(stat, 0.0);
        }
    }
    base
}

/// Accumulates every source in processing order and records the ones that changed something.
struct Accumulator<'a> {
    facts: &'a Facts,
    config: &'a EngineConfig,
    stacking: StatStacking<Stat>,
    matched: Vec<MatchedPerk>,
}

impl<'a> Accumulator<'a> {
    fn source<'e, I>(
        &mut self,
        perk: PerkRef,
        name: String,
        description: String,
        stacks: u32,
        override_mode: Option<OverrideMode>,
        effects: I,
    ) where
        I: IntoIterator<Item = &'e Effect>,
    {
        let outcome = apply_source(effects, stacks, self.facts, self.config);
        if !outcome.has_change() {
            return;
        }
        self.stacking.merge_from(&outcome.stacking);
        self.matched.push(MatchedPerk::from_outcome(
            perk,
            name,
            description,
            stacks,
            override_mode,
            &outcome,
        ));
    }
}

/// Pure evaluation of one snapshot. Performs no I/O.
pub fn evaluate_snapshot(
    catalog: &Catalog,
    facts: &Facts,
    base: &StatValues,
    config: &EngineConfig,
) -> Evaluation {
    let base = resolve_base(base, facts, config);
    let mut acc = Accumulator {
        facts,
        config,
        stacking: StatStacking::new(),
        matched: Vec::new(),
    };

    for perk in &catalog.perks {
        let mode = facts.override_for(perk.id);
        let Some(stacks) = match_perk(perk, facts, mode) else {
            continue;
        };
        acc.source(
            PerkRef::Perk(perk.id),
            perk.name.clone(),
            perk.description.clone(),
            stacks,
            Some(mode),
            &perk.effects,
        );
    }

    for (commodity, perk) in &catalog.commodity_perks {
        let held = facts.commodity_qty.get(commodity).copied().unwrap_or(0);
        let min_qty = perk.min_qty.max(1);
        if held < min_qty {
            continue;
        }
        let stacks = u32::try_from((held / min_qty).max(1)).unwrap_or(u32::MAX);
        acc.source(
            PerkRef::Commodity(commodity.clone()),
            perk.name.clone(),
            perk.description.clone(),
            stacks,
            None,
            &perk.effects,
        );
    }

    let mut owned = facts.properties.clone();
    owned.sort_by_key(|ownership| ownership.property_id);
    for ownership in owned {
        let Some(property) = catalog.properties.get(&ownership.property_id) else {
            continue;
        };
        acc.source(
            PerkRef::Property(property.id),
            format!("{} L{}", property.name, ownership.level),
            PROPERTY_DESCRIPTION.to_string(),
            1,
            None,
            property.effects_for_level(ownership.level),
        );
        if ownership.ascended {
            acc.source(
                PerkRef::PropertyAscension(property.id),
                format!("{} Ascension", property.name),
                PROPERTY_DESCRIPTION.to_string(),
                1,
                None,
                &property.ascension,
            );
        }
    }

    if facts.networth_bonus.abs() > EPSILON {
        acc.stacking
            .add(StackContribution::additive(Stat::Networth, facts.networth_bonus));
        acc.matched.push(MatchedPerk {
            perk: PerkRef::NetworthBonus,
            name: NETWORTH_BONUS_NAME.to_string(),
            description: NETWORTH_BONUS_DESCRIPTION.to_string(),
            stacks: 1,
            override_mode: None,
            adds: StatValues::new().with(Stat::Networth, facts.networth_bonus),
            muls: StatValues::new(),
            display: format!("{} {}", Stat::Networth, signed(facts.networth_bonus)),
        });
    }

    let final_values = finalize_all(&base, &acc.stacking, config);
    Evaluation {
        base,
        final_values,
        matched_perks: acc.matched,
    }
}

/// Store-backed engine shared across callers.
#[derive(Clone)]
pub struct PerkEngine {
    game: Arc<dyn GameStore>,
    state: Arc<dyn StateStore>,
    config: Arc<EngineConfig>,
}

impl fmt::Debug for PerkEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerkEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PerkEngine {
    pub fn new(game: Arc<dyn GameStore>, state: Arc<dyn StateStore>) -> Self {
        Self::with_config(game, state, EngineConfig::default())
    }

    pub fn with_config(
        game: Arc<dyn GameStore>,
        state: Arc<dyn StateStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            game,
            state,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn game(&self) -> &Arc<dyn GameStore> {
        &self.game
    }

    pub fn state(&self) -> &Arc<dyn StateStore> {
        &self.state
    }

    /// Reads the catalog and the user's facts in one batch.
    pub fn collect_facts(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> Result<(Arc<Catalog>, Facts), EngineError> {
        let catalog = self.game.catalog(guild)?;
        let holdings = self.game.holdings(guild, user)?;
        let properties = self.game.owned_properties(guild, user)?;
        let overrides = self.state.overrides(guild, user)?;
        let networth_bonus = self.state.networth_bonus(guild, user)?;
        let facts = Facts::collect(&catalog, &holdings, properties, overrides, networth_bonus);
        Ok((catalog, facts))
    }

    /// Read-only evaluation.
    pub fn evaluate(
        &self,
        guild: GuildId,
        user: UserId,
        base: &StatValues,
    ) -> Result<Evaluation, EngineError> {
        let (catalog, facts) = self.collect_facts(guild, user).map_err(|err| {
            tracing::warn!(
                target: "perkeval::engine",
                guild,
                user,
                error = %err,
                "evaluate.store_failed"
            );
            err
        })?;
        let evaluation = evaluate_snapshot(&catalog, &facts, base, &self.config);
        tracing::debug!(
            target: "perkeval::engine",
            guild,
            user,
            matched = evaluation.matched_perks.len(),
            "evaluate.done"
        );
        Ok(evaluation)
    }

    /// Evaluation plus activation bookkeeping; returns the newly activated perks.
    pub fn evaluate_and_track_activations(
        &self,
        guild: GuildId,
        user: UserId,
        base: &StatValues,
    ) -> Result<(Evaluation, Vec<ActivatedPerk>), EngineError> {
        let evaluation = self.evaluate(guild, user, base)?;
        let activated = track_activations(self.state.as_ref(), guild, user, &evaluation)?;
        Ok((evaluation, activated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perks::model::{CommodityPerk, PerkDefinition, PropertyEffectSet};
    use crate::store::PropertyOwnership;

    #[test]
    fn resolve_base_uses_holdings_value_for_networth() {
        let facts = Facts {
            holdings_value: 1234.5,
            ..Facts::default()
        };
        let base = resolve_base(&StatValues::new(), &facts, &EngineConfig::default());
        assert_eq!(base.get(Stat::Networth), Some(1234.5));
        assert_eq!(base.get(Stat::TradeLimits), Some(40.0));
        assert_eq!(base.len(), Stat::ALL.len());

        let explicit = resolve_base(
            &StatValues::new().with(Stat::Networth, 10.0),
            &facts,
            &EngineConfig::default(),
        );
        assert_eq!(explicit.get(Stat::Networth), Some(10.0));
    }

    #[test]
    fn sources_are_processed_in_documented_order() {
        let mut catalog = Catalog::default();
        catalog.insert_perk(
            PerkDefinition::new(9, "Late")
                .with_effect(Effect::flat(Stat::Income, 1.0)),
        );
        catalog.insert_perk({
            let mut perk =
                PerkDefinition::new(20, "Early").with_effect(Effect::flat(Stat::Income, 1.0));
            perk.priority = -1;
            perk
        });
        catalog.insert_commodity_perk(CommodityPerk {
            commodity: "gold".to_string(),
            name: "Gold perk".to_string(),
            description: String::new(),
            min_qty: 2,
            effects: vec![Effect::flat(Stat::Income, 1.0)],
        });
        catalog.insert_property(PropertyEffectSet {
            id: 3,
            name: "Farm".to_string(),
            max_level: 2,
            levels: vec![vec![Effect::flat(Stat::Income, 2.0)], vec![]],
            ascension: vec![Effect::multiplier(Stat::Income, 2.0)],
        });

        let facts = Facts {
            properties: vec![PropertyOwnership {
                property_id: 3,
                level: 1,
                ascended: true,
            }],
            networth_bonus: 50.0,
            ..Facts::default()
        }
        .with_commodity("gold", 5);

        let evaluation = evaluate_snapshot(
            &catalog,
            &facts,
            &StatValues::new().with(Stat::Income, 10.0),
            &EngineConfig::default(),
        );
        let refs: Vec<String> = evaluation.matched_refs().map(ToString::to_string).collect();
        assert_eq!(
            refs,
            vec![
                "perk:20",
                "perk:9",
                "commodity:gold",
                "property:3",
                "property:3:ascension",
                "networth_bonus"
            ]
        );
        // (10 + 1 + 1 + 1*2 + 2) * 2
        assert_eq!(evaluation.final_value(Stat::Income), 32.0);
        assert_eq!(evaluation.final_value(Stat::Networth), 50.0);

        let commodity = evaluation
            .matched(&PerkRef::Commodity("gold".to_string()))
            .expect("commodity perk matched");
        assert_eq!(commodity.stacks, 2);
        assert_eq!(commodity.override_mode, None);
        assert_eq!(
            evaluation.matched(&PerkRef::Property(3)).map(|m| m.name.as_str()),
            Some("Farm L1")
        );
    }

    #[test]
    fn sources_without_change_are_not_matched() {
        let mut catalog = Catalog::default();
        catalog.insert_perk(
            PerkDefinition::new(1, "Neutral").with_effect(Effect::multiplier(Stat::Income, 1.0)),
        );
        let evaluation = evaluate_snapshot(
            &catalog,
            &Facts::default(),
            &StatValues::new(),
            &EngineConfig::default(),
        );
        assert!(evaluation.matched_perks.is_empty());
    }
}
