//! Thin wrappers for callers that need one adjusted number: payouts, trade
//! caps, job scheduling, gambling and stealing.

use serde::Serialize;

use crate::perks::{EngineError, Evaluation, GuildId, PerkEngine, Stat, StatValues, UserId};

fn evaluate_with(
    engine: &PerkEngine,
    guild: GuildId,
    user: UserId,
    base: StatValues,
) -> Result<Evaluation, EngineError> {
    engine.evaluate(guild, user, &base)
}

/// Adjusted income for a base payout; may be negative.
pub fn effective_income(
    engine: &PerkEngine,
    guild: GuildId,
    user: UserId,
    base_income: f64,
) -> Result<f64, EngineError> {
    let base = StatValues::new().with(Stat::Income, base_income);
    let evaluation = evaluate_with(engine, guild, user, base)?;
    Ok(evaluation.final_value(Stat::Income))
}

/// Daily trade cap. `base` of `None` uses the configured default.
pub fn effective_trade_limit(
    engine: &PerkEngine,
    guild: GuildId,
    user: UserId,
    base: Option<u64>,
) -> Result<u64, EngineError> {
    integral_stat(engine, guild, user, Stat::TradeLimits, base)
}

/// Number of distinct commodities a user may hold.
pub fn effective_commodity_limit(
    engine: &PerkEngine,
    guild: GuildId,
    user: UserId,
    base: Option<u64>,
) -> Result<u64, EngineError> {
    integral_stat(engine, guild, user, Stat::CommoditiesLimit, base)
}

pub fn effective_job_slots(
    engine: &PerkEngine,
    guild: GuildId,
    user: UserId,
    base: Option<u64>,
) -> Result<u64, EngineError> {
    integral_stat(engine, guild, user, Stat::JobSlots, base)
}

/// Timed-job duration in the caller's unit, never below the configured floor.
pub fn effective_timed_duration(
    engine: &PerkEngine,
    guild: GuildId,
    user: UserId,
    base_duration: f64,
) -> Result<f64, EngineError> {
    let evaluation = evaluate_with(
        engine,
        guild,
        user,
        StatValues::new().with(Stat::TimedDuration, base_duration),
    )?;
    Ok(evaluation.final_value(Stat::TimedDuration))
}

fn integral_stat(
    engine: &PerkEngine,
    guild: GuildId,
    user: UserId,
    stat: Stat,
    base: Option<u64>,
) -> Result<u64, EngineError> {
    let mut values = StatValues::new();
    if let Some(base) = base {
        values.set(stat, base as f64);
    }
    let evaluation = evaluate_with(engine, guild, user, values)?;
    Ok(evaluation.final_value(stat).max(0.0) as u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GamblingModifiers {
    pub chance_roll_bonus: f64,
    pub slot_bet_multiplier: f64,
    pub slot_bet_limit: f64,
    pub slot_win_multiplier: f64,
    pub slot_hourly_spin_limit: u64,
}

/// Gambling parameters from configured defaults.
pub fn gambling_modifiers(
    engine: &PerkEngine,
    guild: GuildId,
    user: UserId,
) -> Result<GamblingModifiers, EngineError> {
    let evaluation = evaluate_with(engine, guild, user, StatValues::new())?;
    Ok(GamblingModifiers {
        chance_roll_bonus: evaluation.final_value(Stat::ChanceRollBonus),
        slot_bet_multiplier: evaluation.final_value(Stat::SlotBetMultiplier),
        slot_bet_limit: evaluation.final_value(Stat::SlotBetLimit),
        slot_win_multiplier: evaluation.final_value(Stat::SlotWinMultiplier),
        slot_hourly_spin_limit: evaluation.final_value(Stat::SlotHourlySpinLimit).max(0.0) as u64,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StealParameters {
    pub chance: f64,
    pub amount_min: f64,
    pub amount_max: f64,
}

/// Steal chance in [0, 1] and an ordered amount range.
pub fn steal_parameters(
    engine: &PerkEngine,
    guild: GuildId,
    user: UserId,
) -> Result<StealParameters, EngineError> {
    let evaluation = evaluate_with(engine, guild, user, StatValues::new())?;
    Ok(StealParameters {
        chance: evaluation.final_value(Stat::StealChance),
        amount_min: evaluation.final_value(Stat::StealAmountMin),
        amount_max: evaluation.final_value(Stat::StealAmountMax),
    })
}
