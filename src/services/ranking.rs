//! Guild leaderboard by effective net worth.

use rayon::prelude::*;
use serde::Serialize;

use crate::perks::{EngineError, GuildId, PerkEngine, PerkRef, Stat, StatValues, UserId};

pub const MIN_RANKING_NETWORTH: f64 = 100.0;
pub const MIN_RANKING_NOTE: &str = "You must have networth > $100 to be listed on the ranking.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingOptions {
    pub limit: usize,
    pub min_networth: f64,
    pub exclude_user: Option<UserId>,
    /// Evaluate users on the rayon pool instead of sequentially.
    pub parallel: bool,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            limit: 50,
            min_networth: MIN_RANKING_NETWORTH,
            exclude_user: None,
            parallel: true,
        }
    }
}

impl RankingOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedUser {
    pub user: UserId,
    /// Effective net worth after perks and the time-scoped bonus.
    pub networth: f64,
    /// Effective net worth without the time-scoped bonus, for display.
    pub display_base_networth: f64,
    pub networth_bonus: f64,
}

/// Users of `guild` at or above `min_networth`, sorted by net worth descending
/// then user id ascending, truncated to `max(1, limit)` entries.
pub fn rank_by_effective_networth(
    engine: &PerkEngine,
    guild: GuildId,
    options: RankingOptions,
) -> Result<Vec<RankedUser>, EngineError> {
    let users: Vec<UserId> = engine
        .game()
        .users(guild)?
        .into_iter()
        .filter(|user| Some(*user) != options.exclude_user)
        .collect();

    let rank_one = |user: &UserId| -> Result<RankedUser, EngineError> {
        let evaluation = engine.evaluate(guild, *user, &StatValues::new())?;
        let networth = evaluation.final_value(Stat::Networth);
        let networth_bonus = evaluation
            .matched(&PerkRef::NetworthBonus)
            .and_then(|matched| matched.adds.get(Stat::Networth))
            .unwrap_or(0.0);
        Ok(RankedUser {
            user: *user,
            networth,
            display_base_networth: networth - networth_bonus,
            networth_bonus,
        })
    };

    let evaluated: Result<Vec<RankedUser>, EngineError> = if options.parallel {
        users.par_iter().map(rank_one).collect()
    } else {
        users.iter().map(rank_one).collect()
    };

    let mut ranked: Vec<RankedUser> = evaluated?
        .into_iter()
        .filter(|row| row.networth >= options.min_networth)
        .collect();
    ranked.sort_by(|a, b| {
        b.networth
            .total_cmp(&a.networth)
            .then_with(|| a.user.cmp(&b.user))
    });
    ranked.truncate(options.limit.max(1));

    tracing::debug!(
        target: "perkeval::engine",
        guild,
        ranked = ranked.len(),
        "ranking.done"
    );
    Ok(ranked)
}
