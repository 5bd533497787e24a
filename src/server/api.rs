use std::fmt;

use serde::{Deserialize, Serialize};

use crate::perks::{
    render_announcements, ActivatedPerk, EngineError, Evaluation, GuildId, OverrideMode,
    PerkEngine, PerkId, PerkRef, StatValues, UserId,
};
use crate::services::{rank_by_effective_networth, RankedUser, RankingOptions, MIN_RANKING_NOTE};
use crate::store::StateKey;

const DEFAULT_RANKING_LIMIT: usize = 50;

#[derive(Debug)]
pub enum ApiError {
    Parse(serde_json::Error),
    Validation(String),
    Engine(EngineError),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "Invalid request body: {err}"),
            Self::Validation(msg) => write!(f, "{msg}"),
            Self::Engine(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err)
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateRequest {
    pub guild: GuildId,
    pub user: UserId,
    #[serde(default)]
    pub base: StatValues,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverrideRequest {
    pub guild: GuildId,
    pub user: UserId,
    pub perk: PerkId,
    pub mode: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivatedPerkPayload {
    #[serde(flatten)]
    pub perk: ActivatedPerk,
    pub announcement: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackResponse {
    pub evaluation: Evaluation,
    pub activated: Vec<ActivatedPerkPayload>,
    /// All announcements joined, empty when nothing newly activated.
    pub announcement: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankingResponse {
    pub guild: GuildId,
    pub note: &'static str,
    pub ranking: Vec<RankedUser>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogPerkSummary {
    pub perk: PerkRef,
    pub name: String,
    pub description: String,
    pub priority: i64,
    pub max_stacks: u32,
    pub groups: usize,
    pub effects: usize,
}

pub fn health_payload() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&serde_json::json!({
        "status": "ok",
        "service": "perkeval-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Value of `key` in the query string of `path`.
pub fn query_param<'a>(path: &'a str, key: &str) -> Option<&'a str> {
    let query = path.split('?').nth(1)?;
    query.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name.trim() == key).then(|| value.trim())
    })
}

fn required_id(path: &str, key: &str) -> Result<u64, ApiError> {
    let raw = query_param(path, key)
        .ok_or_else(|| ApiError::Validation(format!("missing query parameter '{key}'")))?;
    raw.parse::<u64>().map_err(|_| {
        ApiError::Validation(format!("query parameter '{key}' must be an unsigned integer"))
    })
}

pub fn catalog_payload(engine: &PerkEngine, path: &str) -> Result<String, ApiError> {
    let guild = required_id(path, "guild")?;
    let catalog = engine.game().catalog(guild).map_err(EngineError::from)?;
    let perks: Vec<CatalogPerkSummary> = catalog
        .perks
        .iter()
        .map(|perk| CatalogPerkSummary {
            perk: PerkRef::Perk(perk.id),
            name: perk.name.clone(),
            description: perk.description.clone(),
            priority: perk.priority,
            max_stacks: perk.max_stacks,
            groups: perk.groups.len(),
            effects: perk.effects.len(),
        })
        .collect();
    let commodities: Vec<&str> = catalog.commodity_perks.keys().map(String::as_str).collect();
    let properties: Vec<_> = catalog
        .properties
        .values()
        .map(|property| {
            serde_json::json!({
                "id": property.id,
                "name": property.name,
                "max_level": property.max_level,
            })
        })
        .collect();
    Ok(serde_json::to_string_pretty(&serde_json::json!({
        "guild": guild,
        "perks": perks,
        "commodity_perks": commodities,
        "tags": catalog.all_tags(),
        "properties": properties,
    }))?)
}

pub fn evaluate_payload(engine: &PerkEngine, body: &str) -> Result<String, ApiError> {
    let request: EvaluateRequest = serde_json::from_str(body)?;
    let evaluation = engine.evaluate(request.guild, request.user, &request.base)?;
    Ok(serde_json::to_string_pretty(&evaluation)?)
}

pub fn evaluate_track_payload(engine: &PerkEngine, body: &str) -> Result<String, ApiError> {
    let request: EvaluateRequest = serde_json::from_str(body)?;
    let (evaluation, activated) =
        engine.evaluate_and_track_activations(request.guild, request.user, &request.base)?;
    let announcement = render_announcements(&activated);
    let response = TrackResponse {
        evaluation,
        activated: activated
            .into_iter()
            .map(|perk| ActivatedPerkPayload {
                announcement: perk.announcement(),
                perk,
            })
            .collect(),
        announcement,
    };
    Ok(serde_json::to_string_pretty(&response)?)
}

pub fn override_put_payload(engine: &PerkEngine, body: &str) -> Result<String, ApiError> {
    let request: OverrideRequest = serde_json::from_str(body)?;
    let mode: OverrideMode = request.mode.parse().map_err(ApiError::Validation)?;
    let key = StateKey::catalog_perk(request.guild, request.user, request.perk);
    engine
        .state()
        .set_override(&key, mode)
        .map_err(EngineError::from)?;
    tracing::info!(
        target: "perkeval::server",
        guild = request.guild,
        user = request.user,
        perk = request.perk,
        mode = %mode,
        "override.set"
    );
    Ok(serde_json::to_string_pretty(&serde_json::json!({
        "status": "ok",
        "guild": request.guild,
        "user": request.user,
        "perk": PerkRef::Perk(request.perk),
        "mode": mode,
    }))?)
}

pub fn ranking_payload(engine: &PerkEngine, path: &str) -> Result<String, ApiError> {
    let guild = required_id(path, "guild")?;
    let limit = match query_param(path, "limit") {
        Some(raw) => raw.parse::<usize>().map_err(|_| {
            ApiError::Validation("query parameter 'limit' must be an unsigned integer".to_string())
        })?,
        None => DEFAULT_RANKING_LIMIT,
    };
    let options = RankingOptions::default().with_limit(limit);
    let ranking = rank_by_effective_networth(engine, guild, options)?;
    Ok(serde_json::to_string_pretty(&RankingResponse {
        guild,
        note: MIN_RANKING_NOTE,
        ranking,
    })?)
}
