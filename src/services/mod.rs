pub mod economy;
pub mod ranking;

pub use economy::{
    effective_commodity_limit, effective_income, effective_job_slots, effective_timed_duration,
    effective_trade_limit, gambling_modifiers, steal_parameters, GamblingModifiers,
    StealParameters,
};
pub use ranking::{
    rank_by_effective_networth, RankedUser, RankingOptions, MIN_RANKING_NETWORTH,
    MIN_RANKING_NOTE,
};
