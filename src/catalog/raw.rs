//! Catalog rows as stored: loosely typed, possibly string-encoded JSON payloads.
//!
//! Compilation never fails as a whole. A broken row degrades to "no effect" or a
//! failing requirement group, and numeric fields that do not parse fall back to
//! identity values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::Catalog;
use crate::perks::model::{
    CommodityPerk, Comparison, Effect, EffectMode, PerkDefinition, PropertyEffectSet,
    Requirement, RequirementGroup, RequirementKind, ScaleSource, StackMode,
};
use crate::perks::stat::Stat;

pub const DEFAULT_PROPERTY_MAX_LEVEL: u32 = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCatalog {
    pub perks: Vec<Value>,
    pub commodities: Vec<Value>,
    pub tags: Vec<Value>,
    pub properties: Vec<Value>,
}

impl RawCatalog {
    pub fn compile(&self) -> Catalog {
        let mut catalog = Catalog::default();

        for (index, row) in self.perks.iter().enumerate() {
            match compile_perk(row) {
                Some(perk) => catalog.insert_perk(perk),
                None => tracing::debug!(
                    target: "perkeval::catalog",
                    row = index,
                    "perk row skipped"
                ),
            }
        }

        for row in &self.commodities {
            let Some(object) = row.as_object() else {
                continue;
            };
            let name = text(object.get("name"));
            for tag in tag_list(object.get("tags")) {
                catalog.tag_commodity(&name, &tag);
            }
            if let Some(perk) = compile_commodity_perk(object) {
                catalog.insert_commodity_perk(perk);
            }
        }

        for row in &self.tags {
            let Some(object) = row.as_object() else {
                continue;
            };
            let commodity = first_text(object, &["commodity_name", "commodity"]);
            catalog.tag_commodity(&commodity, &text(object.get("tag")));
        }

        for (index, row) in self.properties.iter().enumerate() {
            match compile_property(row) {
                Some(property) => catalog.insert_property(property),
                None => tracing::debug!(
                    target: "perkeval::catalog",
                    row = index,
                    "property row skipped"
                ),
            }
        }

        catalog
    }
}

/// Reads a number from a JSON number or a numeric string.
pub fn number(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

pub fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn first_text(object: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .map(|key| text(object.get(*key)))
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

fn flag(value: Option<&Value>, default: bool) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(default, |v| v != 0.0),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        _ => default,
    }
}

fn positive_id(value: Option<&Value>) -> Option<u64> {
    let id = number(value)?;
    (id >= 1.0).then_some(id.trunc() as u64)
}

fn tag_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().map(|item| text(Some(item))).collect(),
        Some(Value::String(s)) => s.split(',').map(|t| t.trim().to_string()).collect(),
        _ => Vec::new(),
    }
}

/// Accepts an object, an array of objects, or a string holding either.
/// Undecodable payloads yield `None`; non-object array items are dropped.
pub fn coerce_rows(value: Option<&Value>) -> Option<Vec<Map<String, Value>>> {
    match value {
        None | Some(Value::Null) => Some(Vec::new()),
        Some(Value::Object(object)) => Some(vec![object.clone()]),
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .filter_map(|item| item.as_object().cloned())
                .collect(),
        ),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Some(Vec::new());
            }
            let parsed: Value = serde_json::from_str(trimmed).ok()?;
            if parsed.is_string() {
                return None;
            }
            coerce_rows(Some(&parsed))
        }
        Some(_) => None,
    }
}

/// Effect rows of a payload; malformed payloads contribute nothing.
pub fn coerce_effects(value: Option<&Value>, default_scale_key: Option<&str>) -> Vec<Effect> {
    coerce_rows(value)
        .unwrap_or_default()
        .iter()
        .filter_map(|row| compile_effect(row, default_scale_key))
        .collect()
}

/// Level-indexed effect lists, always exactly `max_level` long.
pub fn coerce_level_effects(value: Option<&Value>, max_level: u32) -> Vec<Vec<Effect>> {
    let mut levels = vec![Vec::new(); max_level.max(1) as usize];
    let parsed = match value {
        Some(Value::String(s)) => serde_json::from_str::<Value>(s.trim()).ok(),
        Some(other) => Some(other.clone()),
        None => None,
    };
    if let Some(Value::Array(entries)) = parsed {
        for (slot, entry) in levels.iter_mut().zip(entries.iter()) {
            *slot = coerce_effects(Some(entry), None);
        }
    }
    levels
}

pub fn compile_effect(row: &Map<String, Value>, default_scale_key: Option<&str>) -> Option<Effect> {
    let target_raw = text(row.get("target_stat"));
    let target = match target_raw.parse::<Stat>() {
        Ok(stat) => stat,
        Err(_) => {
            tracing::debug!(
                target: "perkeval::catalog",
                target_stat = %target_raw,
                "effect dropped: untracked stat"
            );
            return None;
        }
    };

    let mode = match text(row.get("value_mode")).to_ascii_lowercase().as_str() {
        "multiplier" => EffectMode::Multiplier {
            value: number(row.get("value")).unwrap_or(1.0),
        },
        "per_item" => EffectMode::PerItem {
            value: number(row.get("value")).unwrap_or(0.0),
            scale: scale_source(row, default_scale_key),
            factor: number(row.get("scale_factor")).unwrap_or(0.0),
        },
        _ => EffectMode::Flat {
            value: number(row.get("value")).unwrap_or(0.0),
        },
    };

    Some(Effect {
        target,
        mode,
        cap: number(row.get("cap")).filter(|cap| *cap > 0.0),
    })
}

fn scale_source(row: &Map<String, Value>, default_scale_key: Option<&str>) -> Option<ScaleSource> {
    let source = text(row.get("scale_source")).to_ascii_lowercase();
    let mut key = text(row.get("scale_key")).to_lowercase();
    if key.is_empty() {
        key = default_scale_key.unwrap_or_default().trim().to_lowercase();
    }
    match source.as_str() {
        "commodity_qty" | "" if !key.is_empty() => Some(ScaleSource::CommodityQty(key)),
        _ => None,
    }
}

pub fn compile_requirement(row: &Map<String, Value>) -> Requirement {
    let mut req_type = text(row.get("req_type")).to_ascii_lowercase();
    if req_type.is_empty() {
        req_type = "commodity_qty".to_string();
    }
    let key = first_text(row, &["commodity_name", "key", "tag"]).to_lowercase();
    let kind = match req_type.as_str() {
        "commodity_qty" => RequirementKind::CommodityQty(key),
        "tag_qty" => RequirementKind::TagQty(key),
        "any_single_commodity_qty" | "any_single_commodities_qty" => {
            RequirementKind::AnySingleCommodityQty
        }
        _ => RequirementKind::Unsupported(req_type),
    };
    Requirement {
        kind,
        operator: Comparison::parse(&text(row.get("operator"))).unwrap_or(Comparison::Ge),
        threshold: number(row.get("value")).unwrap_or(1.0).trunc().max(0.0),
    }
}

fn unsupported_group(reason: &str) -> RequirementGroup {
    RequirementGroup {
        group_id: 1,
        requirements: vec![Requirement {
            kind: RequirementKind::Unsupported(reason.to_string()),
            operator: Comparison::Ge,
            threshold: 0.0,
        }],
    }
}

fn compile_groups(value: Option<&Value>) -> Vec<RequirementGroup> {
    let rows: Vec<Value> = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => match coerce_rows(Some(other)) {
            Some(rows) => rows.into_iter().map(Value::Object).collect(),
            None => return vec![unsupported_group("malformed")],
        },
    };

    let mut grouped: BTreeMap<u32, Vec<Requirement>> = BTreeMap::new();
    for row in &rows {
        match row.as_object() {
            Some(object) => {
                let group_id = number(object.get("group_id"))
                    .filter(|id| *id >= 1.0)
                    .map_or(1, |id| id.trunc() as u32);
                grouped
                    .entry(group_id)
                    .or_default()
                    .push(compile_requirement(object));
            }
            None => grouped.entry(1).or_default().push(Requirement {
                kind: RequirementKind::Unsupported("malformed".to_string()),
                operator: Comparison::Ge,
                threshold: 0.0,
            }),
        }
    }

    grouped
        .into_iter()
        .map(|(group_id, requirements)| RequirementGroup {
            group_id,
            requirements,
        })
        .collect()
}

pub fn compile_perk(row: &Value) -> Option<PerkDefinition> {
    let object = row.as_object()?;
    let id = positive_id(object.get("id"))?;
    let enabled = flag(object.get("enabled"), true);
    if !enabled {
        return None;
    }
    let mut name = text(object.get("name"));
    if name.is_empty() {
        name = format!("perk#{id}");
    }
    let effects = coerce_effects(object.get("effects"), None);
    Some(PerkDefinition {
        id,
        name,
        description: text(object.get("description")),
        enabled,
        priority: number(object.get("priority")).map_or(0, |p| p.trunc() as i64),
        stack_mode: StackMode::parse_loose(&text(object.get("stack_mode"))),
        max_stacks: number(object.get("max_stacks"))
            .map_or(1, |m| m.trunc().clamp(1.0, u32::MAX as f64) as u32),
        groups: compile_groups(object.get("requirements")),
        effects,
    })
}

pub fn compile_commodity_perk(object: &Map<String, Value>) -> Option<CommodityPerk> {
    let display_name = text(object.get("name"));
    if display_name.is_empty() {
        return None;
    }
    let commodity = display_name.to_lowercase();
    let payload = object
        .get("perk_effects")
        .or_else(|| object.get("perk_effects_json"));
    let effects = coerce_effects(payload, Some(&commodity));
    if effects.is_empty() {
        return None;
    }
    let mut name = text(object.get("perk_name"));
    if name.is_empty() {
        name = format!("{display_name} perk");
    }
    Some(CommodityPerk {
        commodity,
        name,
        description: text(object.get("perk_description")),
        min_qty: number(object.get("perk_min_qty")).map_or(1, |q| q.trunc().max(1.0) as u64),
        effects,
    })
}

pub fn compile_property(row: &Value) -> Option<PropertyEffectSet> {
    let object = row.as_object()?;
    let id = positive_id(object.get("id"))?;
    let max_level = number(object.get("max_level"))
        .map_or(DEFAULT_PROPERTY_MAX_LEVEL, |m| m.trunc().clamp(1.0, 1000.0) as u32);
    let mut name = text(object.get("name"));
    if name.is_empty() {
        name = format!("Property #{id}");
    }
    let levels = coerce_level_effects(
        object
            .get("level_effects")
            .or_else(|| object.get("level_effects_json")),
        max_level,
    );
    let ascension = coerce_effects(
        object
            .get("ascension_effects")
            .or_else(|| object.get("ascension_effects_json")),
        None,
    );
    Some(PropertyEffectSet {
        id,
        name,
        max_level,
        levels,
        ascension,
    })
}
