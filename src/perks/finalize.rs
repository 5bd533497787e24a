//! Combines base values with accumulated modifiers and applies per-stat post-rules.

use crate::config::EngineConfig;
use crate::perks::stacking::StatStacking;
use crate::perks::stat::{Stat, StatValues};

/// Rounds to whole cents.
pub fn money_round(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Post-rule for one stat, applied to an already composed value.
pub fn finalize_stat(stat: Stat, value: f64, config: &EngineConfig) -> f64 {
    match stat {
        Stat::Income => money_round(value),
        Stat::Networth => money_round(value.max(0.0)),
        Stat::TimedDuration => value.max(config.duration_floor),
        Stat::SlotBetMultiplier => value.max(config.bet_multiplier_floor),
        Stat::SlotBetLimit | Stat::SlotWinMultiplier => value.max(0.0),
        Stat::StealChance => value.clamp(0.0, 1.0),
        Stat::StealAmountMin | Stat::StealAmountMax => value.max(0.0),
        _ if stat.is_integral() => value.round().max(0.0),
        _ => value,
    }
}

/// Final value of every stat present in `base`.
pub fn finalize_all(
    base: &StatValues,
    stacking: &StatStacking<Stat>,
    config: &EngineConfig,
) -> StatValues {
    let mut finals: StatValues = base
        .iter()
        .map(|(stat, base_value)| {
            let mut composed = stacking.composed_for(&stat, base_value);
            if !composed.is_finite() {
                tracing::warn!(
                    target: "perkeval::engine",
                    stat = %stat,
                    base = base_value,
                    "final_value.non_finite"
                );
                composed = base_value;
            }
            (stat, finalize_stat(stat, composed, config))
        })
        .collect();

    if let (Some(min), Some(max)) = (
        finals.get(Stat::StealAmountMin),
        finals.get(Stat::StealAmountMax),
    ) {
        if min > max {
            finals.set(Stat::StealAmountMin, max);
            finals.set(Stat::StealAmountMax, min);
        }
    }
    finals
}
