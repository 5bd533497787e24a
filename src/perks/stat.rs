//! Tracked stats: the closed whitelist of numeric game values perks may modify.
//! Keys match the catalog's `target_stat` column and the API payloads.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Income,
    TradeLimits,
    Networth,
    CommoditiesLimit,
    JobSlots,
    TimedDuration,
    ChanceRollBonus,
    SlotBetMultiplier,
    SlotBetLimit,
    SlotWinMultiplier,
    SlotHourlySpinLimit,
    StealChance,
    StealAmountMin,
    StealAmountMax,
}

impl Stat {
    pub const ALL: [Stat; 14] = [
        Stat::Income,
        Stat::TradeLimits,
        Stat::Networth,
        Stat::CommoditiesLimit,
        Stat::JobSlots,
        Stat::TimedDuration,
        Stat::ChanceRollBonus,
        Stat::SlotBetMultiplier,
        Stat::SlotBetLimit,
        Stat::SlotWinMultiplier,
        Stat::SlotHourlySpinLimit,
        Stat::StealChance,
        Stat::StealAmountMin,
        Stat::StealAmountMax,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::TradeLimits => "trade_limits",
            Self::Networth => "networth",
            Self::CommoditiesLimit => "commodities_limit",
            Self::JobSlots => "job_slots",
            Self::TimedDuration => "timed_duration",
            Self::ChanceRollBonus => "chance_roll_bonus",
            Self::SlotBetMultiplier => "slot_bet_multiplier",
            Self::SlotBetLimit => "slot_bet_limit",
            Self::SlotWinMultiplier => "slot_win_multiplier",
            Self::SlotHourlySpinLimit => "slot_hourly_spin_limit",
            Self::StealChance => "steal_chance",
            Self::StealAmountMin => "steal_amount_min",
            Self::StealAmountMax => "steal_amount_max",
        }
    }

    /// Stats presented to players as whole numbers.
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            Self::TradeLimits | Self::CommoditiesLimit | Self::JobSlots | Self::SlotHourlySpinLimit
        )
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Stat {
    type Err = String;

    /// Case-insensitive, whitespace-tolerant lookup against the whitelist.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let key = raw.trim().to_ascii_lowercase();
        Stat::ALL
            .iter()
            .copied()
            .find(|stat| stat.as_str() == key)
            .ok_or_else(|| format!("unknown stat '{}'", raw.trim()))
    }
}

/// A (possibly partial) set of per-stat numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatValues(BTreeMap<Stat, f64>);

impl StatValues {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, stat: Stat, value: f64) -> Self {
        self.0.insert(stat, value);
        self
    }

    pub fn get(&self, stat: Stat) -> Option<f64> {
        self.0.get(&stat).copied()
    }

    /// Value for `stat`, or 0 when unset.
    pub fn value(&self, stat: Stat) -> f64 {
        self.get(stat).unwrap_or(0.0)
    }

    pub fn set(&mut self, stat: Stat, value: f64) {
        self.0.insert(stat, value);
    }

    pub fn contains(&self, stat: Stat) -> bool {
        self.0.contains_key(&stat)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stat, f64)> + '_ {
        self.0.iter().map(|(stat, value)| (*stat, *value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fills every stat missing from `self` with the value from `defaults`.
    pub fn fill_from(&mut self, defaults: &StatValues) {
        for (stat, value) in defaults.iter() {
            self.0.entry(stat).or_insert(value);
        }
    }
}

impl FromIterator<(Stat, f64)> for StatValues {
    fn from_iter<I: IntoIterator<Item = (Stat, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
