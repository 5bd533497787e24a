pub mod activation;
pub mod effects;
pub mod engine;
pub mod facts;
pub mod finalize;
pub mod model;
pub mod requirements;
pub mod stacking;
pub mod stat;

pub use activation::{
    diff_activations, render_announcements, track_activations, ActivatedPerk, ActivationDiff,
};
pub use effects::{apply_effect, apply_source, scaled_quantity, SourceOutcome, StatBreakdown};
pub use engine::{
    evaluate_snapshot, resolve_base, EngineError, Evaluation, MatchedPerk, PerkEngine,
    NETWORTH_BONUS_DESCRIPTION, NETWORTH_BONUS_NAME,
};
pub use facts::Facts;
pub use finalize::{finalize_all, finalize_stat, money_round};
pub use model::{
    CommodityPerk, Comparison, Effect, EffectMode, GuildId, OverrideMode, PerkDefinition, PerkId,
    PerkRef, PropertyEffectSet, PropertyId, Requirement, RequirementGroup, RequirementKind,
    ScaleSource, StackMode, UserId, EPSILON,
};
pub use requirements::{evaluate_group, match_perk, requirement_actual, stack_eligibility};
pub use stacking::{CategoryTotals, StackCategory, StackContribution, StatStacking};
pub use stat::{Stat, StatValues};
