//! Validated perk rule types. Built once from catalog rows at load time
//! (see [crate::catalog]); evaluation never re-parses payloads.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::perks::stat::Stat;

pub type GuildId = u64;
pub type UserId = u64;
pub type PerkId = u64;
pub type PropertyId = u64;

/// Tolerance for `==` / `!=` comparisons and "did this change anything" checks.
pub const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackMode {
    #[default]
    Add,
    Override,
    MaxOnly,
}

impl StackMode {
    /// Unknown or empty values fall back to `add`.
    pub fn parse_loose(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "override" => Self::Override,
            "max_only" => Self::MaxOnly,
            _ => Self::Add,
        }
    }

    /// `override` and `max_only` never stack past one.
    pub fn collapses(&self) -> bool {
        matches!(self, Self::Override | Self::MaxOnly)
    }
}

/// Per-user manual switch for a catalog perk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideMode {
    #[default]
    Auto,
    On,
    Off,
}

impl OverrideMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

impl FromStr for OverrideMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            other => Err(format!("unknown override mode '{other}'")),
        }
    }
}

impl fmt::Display for OverrideMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl Comparison {
    /// Returns None for operators outside the supported set.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }

    pub fn compare(&self, actual: f64, expected: f64) -> bool {
        match self {
            Self::Gt => actual > expected,
            Self::Ge => actual >= expected,
            Self::Lt => actual < expected,
            Self::Le => actual <= expected,
            Self::Eq => (actual - expected).abs() < EPSILON,
            Self::Ne => (actual - expected).abs() >= EPSILON,
        }
    }

    /// Lower-bound operators scale stacks with quantity.
    pub fn is_lower_bound(&self) -> bool {
        matches!(self, Self::Gt | Self::Ge)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "key", rename_all = "snake_case")]
pub enum RequirementKind {
    CommodityQty(String),
    TagQty(String),
    AnySingleCommodityQty,
    /// A stored type this engine does not understand; always fails its group.
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub kind: RequirementKind,
    pub operator: Comparison,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementGroup {
    pub group_id: u32,
    pub requirements: Vec<Requirement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "key", rename_all = "snake_case")]
pub enum ScaleSource {
    /// Quantity held of the named commodity (lower-cased).
    CommodityQty(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EffectMode {
    Flat {
        value: f64,
    },
    Multiplier {
        value: f64,
    },
    PerItem {
        value: f64,
        #[serde(default)]
        scale: Option<ScaleSource>,
        #[serde(default)]
        factor: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub target: Stat,
    pub mode: EffectMode,
    /// Symmetric clamp on the per-stack contribution; only caps > 0 apply.
    #[serde(default)]
    pub cap: Option<f64>,
}

impl Effect {
    pub fn flat(target: Stat, value: f64) -> Self {
        Self {
            target,
            mode: EffectMode::Flat { value },
            cap: None,
        }
    }

    pub fn multiplier(target: Stat, value: f64) -> Self {
        Self {
            target,
            mode: EffectMode::Multiplier { value },
            cap: None,
        }
    }

    pub fn per_item(target: Stat, value: f64, scale_key: &str, factor: f64) -> Self {
        Self {
            target,
            mode: EffectMode::PerItem {
                value,
                scale: Some(ScaleSource::CommodityQty(scale_key.trim().to_lowercase())),
                factor,
            },
            cap: None,
        }
    }

    pub fn with_cap(mut self, cap: f64) -> Self {
        self.cap = Some(cap);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerkDefinition {
    pub id: PerkId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub stack_mode: StackMode,
    #[serde(default = "default_max_stacks")]
    pub max_stacks: u32,
    #[serde(default)]
    pub groups: Vec<RequirementGroup>,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

fn default_enabled() -> bool {
    true
}

fn default_max_stacks() -> u32 {
    1
}

impl PerkDefinition {
    pub fn new(id: PerkId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            enabled: true,
            priority: 0,
            stack_mode: StackMode::Add,
            max_stacks: 1,
            groups: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn with_max_stacks(mut self, max_stacks: u32) -> Self {
        self.max_stacks = max_stacks.max(1);
        self
    }

    pub fn with_stack_mode(mut self, stack_mode: StackMode) -> Self {
        self.stack_mode = stack_mode;
        self
    }

    pub fn with_group(mut self, requirements: Vec<Requirement>) -> Self {
        let group_id = self.groups.len() as u32 + 1;
        self.groups.push(RequirementGroup {
            group_id,
            requirements,
        });
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Bonus attached directly to a commodity definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommodityPerk {
    /// Lower-cased commodity name.
    pub commodity: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub min_qty: u64,
    pub effects: Vec<Effect>,
}

/// Level-indexed and ascension effects of one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyEffectSet {
    pub id: PropertyId,
    pub name: String,
    pub max_level: u32,
    /// `levels[0]` holds the effects of level 1.
    pub levels: Vec<Vec<Effect>>,
    #[serde(default)]
    pub ascension: Vec<Effect>,
}

impl PropertyEffectSet {
    /// Effects for an owned level; level 0 (not owned) and out-of-range levels yield none.
    pub fn effects_for_level(&self, level: u32) -> &[Effect] {
        if level == 0 {
            return &[];
        }
        self.levels
            .get(level as usize - 1)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Identity of any contribution source: catalog perks and the implicit sources.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PerkRef {
    Perk(PerkId),
    Commodity(String),
    Property(PropertyId),
    PropertyAscension(PropertyId),
    NetworthBonus,
}

impl fmt::Display for PerkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Perk(id) => write!(f, "perk:{id}"),
            Self::Commodity(name) => write!(f, "commodity:{name}"),
            Self::Property(id) => write!(f, "property:{id}"),
            Self::PropertyAscension(id) => write!(f, "property:{id}:ascension"),
            Self::NetworthBonus => write!(f, "networth_bonus"),
        }
    }
}

impl FromStr for PerkRef {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw == "networth_bonus" {
            return Ok(Self::NetworthBonus);
        }
        let parse_id = |value: &str| {
            value
                .parse::<u64>()
                .map_err(|err| format!("invalid id in perk ref '{raw}': {err}"))
        };
        match raw.split_once(':') {
            Some(("perk", id)) => parse_id(id).map(Self::Perk),
            Some(("commodity", name)) if !name.is_empty() => Ok(Self::Commodity(name.to_string())),
            Some(("property", rest)) => match rest.split_once(':') {
                Some((id, "ascension")) => parse_id(id).map(Self::PropertyAscension),
                None => parse_id(rest).map(Self::Property),
                Some(_) => Err(format!("invalid property perk ref '{raw}'")),
            },
            _ => Err(format!("invalid perk ref '{raw}'")),
        }
    }
}

impl From<PerkRef> for String {
    fn from(value: PerkRef) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for PerkRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perk_refs_round_trip_through_strings() {
        let refs = [
            PerkRef::Perk(42),
            PerkRef::Commodity("gold".to_string()),
            PerkRef::Property(7),
            PerkRef::PropertyAscension(7),
            PerkRef::NetworthBonus,
        ];
        for perk in refs {
            let text = perk.to_string();
            assert_eq!(text.parse::<PerkRef>(), Ok(perk));
        }
        assert!("perk:abc".parse::<PerkRef>().is_err());
        assert!("property:3:level".parse::<PerkRef>().is_err());
    }

    #[test]
    fn comparison_equality_uses_tolerance() {
        assert!(Comparison::Eq.compare(5.0, 5.0 + 1e-12));
        assert!(!Comparison::Ne.compare(5.0, 5.0 + 1e-12));
        assert!(Comparison::Ge.compare(5.0, 5.0));
        assert!(!Comparison::Gt.compare(5.0, 5.0));
    }

    #[test]
    fn property_level_zero_has_no_effects() {
        let property = PropertyEffectSet {
            id: 1,
            name: "Farm".to_string(),
            max_level: 2,
            levels: vec![vec![Effect::flat(Stat::Income, 5.0)], vec![]],
            ascension: vec![],
        };
        assert!(property.effects_for_level(0).is_empty());
        assert_eq!(property.effects_for_level(1).len(), 1);
        assert!(property.effects_for_level(2).is_empty());
        assert!(property.effects_for_level(9).is_empty());
    }

    #[test]
    fn override_mode_parses_case_insensitively() {
        assert_eq!(" ON ".parse::<OverrideMode>(), Ok(OverrideMode::On));
        assert!("maybe".parse::<OverrideMode>().is_err());
    }
}
