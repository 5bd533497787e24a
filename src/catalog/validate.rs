use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::catalog::raw::{coerce_rows, number, text};
use crate::catalog::{load_raw_catalog, RawCatalog};
use crate::config::EngineConfig;
use crate::perks::model::Comparison;
use crate::perks::stat::Stat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSeverity {
    Error,
    Warning,
    Info,
}

impl ValidationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for ValidationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationDiagnostic {
    pub severity: ValidationSeverity,
    pub context: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub diagnostics: Vec<ValidationDiagnostic>,
}

impl ValidationReport {
    pub fn push(
        &mut self,
        severity: ValidationSeverity,
        context: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(ValidationDiagnostic {
            severity,
            context: context.into(),
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diag| diag.severity == ValidationSeverity::Error)
    }

    pub fn count(&self, severity: ValidationSeverity) -> usize {
        self.diagnostics
            .iter()
            .filter(|diag| diag.severity == severity)
            .count()
    }
}

const REQUIREMENT_TYPES: &[&str] = &[
    "commodity_qty",
    "tag_qty",
    "any_single_commodity_qty",
    "any_single_commodities_qty",
];

const VALUE_MODES: &[&str] = &["flat", "multiplier", "per_item"];

const STACK_MODES: &[&str] = &["add", "override", "max_only"];

/// Reports catalog rows the engine will drop or degrade. Evaluation itself never
/// rejects a catalog; this is the authoring-side view of the same rules.
pub fn validate_catalog_file(
    path: &str,
    config: &EngineConfig,
) -> Result<ValidationReport, String> {
    let raw = load_raw_catalog(Path::new(path)).map_err(|err| err.to_string())?;
    Ok(validate_raw_catalog(&raw, config))
}

pub fn validate_raw_catalog(raw: &RawCatalog, config: &EngineConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut seen_ids = HashSet::new();

    for (index, entry) in raw.perks.iter().enumerate() {
        let base_context = format!("perks[{index}]");
        let Some(object) = entry.as_object() else {
            report.push(ValidationSeverity::Error, base_context, "perk is not an object");
            continue;
        };

        match number(object.get("id")) {
            Some(id) if id >= 1.0 => {
                if !seen_ids.insert(id.trunc() as u64) {
                    report.push(
                        ValidationSeverity::Error,
                        format!("{base_context}.id"),
                        format!("duplicate id '{id}'"),
                    );
                }
            }
            _ => report.push(
                ValidationSeverity::Error,
                format!("{base_context}.id"),
                "missing positive numeric 'id' (row is skipped)",
            ),
        }

        if text(object.get("name")).is_empty() {
            report.push(
                ValidationSeverity::Warning,
                format!("{base_context}.name"),
                "missing non-empty 'name'",
            );
        }

        let stack_mode = text(object.get("stack_mode")).to_ascii_lowercase();
        if !stack_mode.is_empty() && !STACK_MODES.contains(&stack_mode.as_str()) {
            report.push(
                ValidationSeverity::Warning,
                format!("{base_context}.stack_mode"),
                format!("unsupported stack_mode '{stack_mode}' (treated as 'add')"),
            );
        }

        if let Some(max_stacks) = object.get("max_stacks") {
            match number(Some(max_stacks)) {
                Some(value) if value >= 1.0 => {}
                _ => report.push(
                    ValidationSeverity::Warning,
                    format!("{base_context}.max_stacks"),
                    "max_stacks below 1 or not numeric (coerced to 1)",
                ),
            }
        }

        validate_requirements(&mut report, &base_context, object.get("requirements"));
        let effect_count = validate_effects(
            &mut report,
            &format!("{base_context}.effects"),
            object.get("effects"),
            config,
        );
        if effect_count == 0 {
            report.push(
                ValidationSeverity::Info,
                format!("{base_context}.effects"),
                "perk has no effects and will never be reported as matched",
            );
        }
    }

    for (index, entry) in raw.commodities.iter().enumerate() {
        let context = format!("commodities[{index}]");
        let Some(object) = entry.as_object() else {
            report.push(ValidationSeverity::Error, context, "commodity is not an object");
            continue;
        };
        if text(object.get("name")).is_empty() {
            report.push(
                ValidationSeverity::Error,
                format!("{context}.name"),
                "missing non-empty 'name'",
            );
        }
        let payload = object
            .get("perk_effects")
            .or_else(|| object.get("perk_effects_json"));
        if payload.is_some() {
            validate_effects(&mut report, &format!("{context}.perk_effects"), payload, config);
        }
    }

    for (index, entry) in raw.properties.iter().enumerate() {
        let context = format!("properties[{index}]");
        let Some(object) = entry.as_object() else {
            report.push(ValidationSeverity::Error, context, "property is not an object");
            continue;
        };
        if !matches!(number(object.get("id")), Some(id) if id >= 1.0) {
            report.push(
                ValidationSeverity::Error,
                format!("{context}.id"),
                "missing positive numeric 'id' (row is skipped)",
            );
        }
        let ascension = object
            .get("ascension_effects")
            .or_else(|| object.get("ascension_effects_json"));
        if ascension.is_some() {
            validate_effects(
                &mut report,
                &format!("{context}.ascension_effects"),
                ascension,
                config,
            );
        }
    }

    report
}

fn validate_requirements(
    report: &mut ValidationReport,
    base_context: &str,
    payload: Option<&Value>,
) {
    let context = format!("{base_context}.requirements");
    let Some(payload) = payload else {
        return;
    };
    let rows = match payload {
        Value::Array(items) => items.clone(),
        other => match coerce_rows(Some(other)) {
            Some(rows) => rows.into_iter().map(Value::Object).collect(),
            None => {
                report.push(
                    ValidationSeverity::Error,
                    context,
                    "undecodable requirements payload (perk never matches)",
                );
                return;
            }
        },
    };

    for (index, row) in rows.iter().enumerate() {
        let row_context = format!("{context}[{index}]");
        let Some(object) = row.as_object() else {
            report.push(
                ValidationSeverity::Error,
                row_context,
                "requirement is not an object (its group always fails)",
            );
            continue;
        };
        validate_requirement_row(report, &row_context, object);
    }
}

fn validate_requirement_row(
    report: &mut ValidationReport,
    context: &str,
    object: &Map<String, Value>,
) {
    let req_type = text(object.get("req_type")).to_ascii_lowercase();
    if !req_type.is_empty() && !REQUIREMENT_TYPES.contains(&req_type.as_str()) {
        report.push(
            ValidationSeverity::Error,
            format!("{context}.req_type"),
            format!("unsupported requirement type '{req_type}' (its group always fails)"),
        );
    }
    let operator = text(object.get("operator"));
    if !operator.is_empty() && Comparison::parse(&operator).is_none() {
        report.push(
            ValidationSeverity::Warning,
            format!("{context}.operator"),
            format!("unsupported operator '{operator}' (treated as '>=')"),
        );
    }
    if object.get("value").is_some() && number(object.get("value")).is_none() {
        report.push(
            ValidationSeverity::Warning,
            format!("{context}.value"),
            "threshold is not numeric (treated as 1)",
        );
    }
}

/// Returns how many effect rows survive compilation.
fn validate_effects(
    report: &mut ValidationReport,
    context: &str,
    payload: Option<&Value>,
    config: &EngineConfig,
) -> usize {
    let Some(rows) = coerce_rows(payload) else {
        report.push(
            ValidationSeverity::Error,
            context.to_string(),
            "undecodable effects payload (no effect)",
        );
        return 0;
    };

    let mut kept = 0;
    for (index, row) in rows.iter().enumerate() {
        let row_context = format!("{context}[{index}]");
        let target = text(row.get("target_stat"));
        match target.parse::<Stat>() {
            Ok(stat) => {
                kept += 1;
                if config.disabled_targets.contains(&stat) {
                    report.push(
                        ValidationSeverity::Info,
                        format!("{row_context}.target_stat"),
                        format!("target '{stat}' is disabled by engine policy"),
                    );
                }
            }
            Err(_) => report.push(
                ValidationSeverity::Warning,
                format!("{row_context}.target_stat"),
                format!("untracked target stat '{target}' (effect dropped)"),
            ),
        }

        let mode = text(row.get("value_mode")).to_ascii_lowercase();
        if !mode.is_empty() && !VALUE_MODES.contains(&mode.as_str()) {
            report.push(
                ValidationSeverity::Warning,
                format!("{row_context}.value_mode"),
                format!("unsupported value_mode '{mode}' (treated as 'flat')"),
            );
        }
        if row.get("value").is_some() && number(row.get("value")).is_none() {
            report.push(
                ValidationSeverity::Warning,
                format!("{row_context}.value"),
                "value is not numeric (identity value used)",
            );
        }
    }
    kept
}
