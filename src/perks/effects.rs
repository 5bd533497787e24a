//! Effect application for one contribution source.
//!
//! Every source (catalog perk, commodity perk, property level, property
//! ascension) runs its effect list through [apply_source], which yields the
//! per-stat accumulators it produced plus a human-readable summary.

use serde::Serialize;

use crate::config::EngineConfig;
use crate::perks::facts::Facts;
use crate::perks::model::{Effect, EffectMode, ScaleSource, EPSILON};
use crate::perks::stacking::{StackContribution, StatStacking};
use crate::perks::stat::{Stat, StatValues};

/// What one source did to the accumulators.
#[derive(Debug, Clone, Default)]
pub struct SourceOutcome {
    pub stacking: StatStacking<Stat>,
    pub display_parts: Vec<String>,
}

impl SourceOutcome {
    /// True if any accumulator moved by more than the tolerance.
    pub fn has_change(&self) -> bool {
        self.stacking.iter().any(|(_, totals)| !totals.is_identity())
    }

    /// Changed stats only.
    pub fn breakdown(&self) -> StatBreakdown {
        let mut breakdown = StatBreakdown::default();
        for (stat, totals) in self.stacking.iter() {
            if totals.additive.abs() > EPSILON {
                breakdown.adds.set(*stat, totals.additive);
            }
            if (totals.multiplicative - 1.0).abs() > EPSILON {
                breakdown.muls.set(*stat, totals.multiplicative);
            }
        }
        breakdown
    }

    pub fn display(&self) -> String {
        self.display_parts.join(" | ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatBreakdown {
    pub adds: StatValues,
    pub muls: StatValues,
}

/// Quantity an effect scales with; 0 when it has no scale source.
pub fn scaled_quantity(scale: Option<&ScaleSource>, facts: &Facts) -> f64 {
    match scale {
        Some(ScaleSource::CommodityQty(key)) => facts.commodity_quantity(key),
        None => 0.0,
    }
}

fn clamp_to_cap(value: f64, cap: Option<f64>) -> f64 {
    match cap {
        Some(cap) if cap > 0.0 => value.clamp(-cap, cap),
        _ => value,
    }
}

pub(crate) fn signed(value: f64) -> String {
    let sign = if value >= 0.0 { '+' } else { '-' };
    format!("{sign}{:.2}", value.abs())
}

/// Applies one effect at `stacks` into `outcome`. Denylisted targets are skipped.
pub fn apply_effect(
    effect: &Effect,
    stacks: u32,
    facts: &Facts,
    config: &EngineConfig,
    outcome: &mut SourceOutcome,
) {
    let target = effect.target;
    if config.is_disabled(target) {
        return;
    }
    let n = f64::from(stacks);

    match &effect.mode {
        EffectMode::Flat { value } => {
            let contribution = clamp_to_cap(*value, effect.cap);
            outcome
                .stacking
                .add(StackContribution::additive(target, contribution * n));
            if contribution.abs() > EPSILON {
                outcome
                    .display_parts
                    .push(format!("{target} {}", signed(contribution)));
            }
        }
        EffectMode::Multiplier { value } => {
            let factor = value.max(0.0);
            outcome
                .stacking
                .add(StackContribution::multiplicative(target, factor.powf(n)));
            if (factor - 1.0).abs() > EPSILON {
                outcome.display_parts.push(format!("{target} x{factor:.2}"));
            }
        }
        EffectMode::PerItem {
            value,
            scale,
            factor,
        } => {
            let quantity = scaled_quantity(scale.as_ref(), facts);
            let contribution = clamp_to_cap(value + factor * quantity, effect.cap);
            outcome
                .stacking
                .add(StackContribution::additive(target, contribution * n));

            let base = (value.abs() > EPSILON).then(|| format!("{target} {}", signed(*value)));
            let per_item = (factor.abs() > EPSILON).then(|| format!("x{factor:.2} per item after"));
            match (base, per_item) {
                (Some(base), Some(per_item)) => {
                    outcome.display_parts.push(format!("{base}, {per_item}"))
                }
                (Some(base), None) => outcome.display_parts.push(base),
                (None, Some(per_item)) => {
                    outcome.display_parts.push(format!("{target} {per_item}"))
                }
                (None, None) => {}
            }
        }
    }
}

/// Applies a whole effect list at one stack count.
pub fn apply_source<'a, I>(
    effects: I,
    stacks: u32,
    facts: &Facts,
    config: &EngineConfig,
) -> SourceOutcome
where
    I: IntoIterator<Item = &'a Effect>,
{
    let mut outcome = SourceOutcome::default();
    for effect in effects {
        apply_effect(effect, stacks, facts, config, &mut outcome);
    }
    outcome
}
