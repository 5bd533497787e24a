//! Requirement matching: groups are OR'd, requirements inside a group are AND'd.
//! A match carries the stack count its effects apply at.

use crate::perks::facts::Facts;
use crate::perks::model::{
    Comparison, OverrideMode, PerkDefinition, Requirement, RequirementGroup, RequirementKind,
};

/// Observed value for a requirement; `None` for kinds the engine does not support.
pub fn requirement_actual(requirement: &Requirement, facts: &Facts) -> Option<f64> {
    match &requirement.kind {
        RequirementKind::CommodityQty(name) => Some(facts.commodity_quantity(name)),
        RequirementKind::TagQty(tag) => Some(facts.tag_quantity(tag)),
        RequirementKind::AnySingleCommodityQty => Some(facts.max_single_quantity()),
        RequirementKind::Unsupported(_) => None,
    }
}

/// How many stacks one requirement supports. Lower-bound operators scale with
/// `floor(actual / threshold)`; everything else is 1 when passed, 0 otherwise.
pub fn stack_eligibility(actual: f64, operator: Comparison, threshold: f64) -> u32 {
    if threshold <= 0.0 {
        return 1;
    }
    if operator.is_lower_bound() {
        let stacks = (actual / threshold).floor();
        return stacks.clamp(0.0, u32::MAX as f64) as u32;
    }
    u32::from(operator.compare(actual, threshold))
}

/// Stack count of a passing group; `None` if any requirement fails.
pub fn evaluate_group(group: &RequirementGroup, facts: &Facts) -> Option<u32> {
    let mut group_stack: Option<u32> = None;
    for requirement in &group.requirements {
        let actual = requirement_actual(requirement, facts)?;
        if !requirement.operator.compare(actual, requirement.threshold) {
            return None;
        }
        let eligibility = stack_eligibility(actual, requirement.operator, requirement.threshold);
        group_stack = Some(group_stack.map_or(eligibility, |current| current.min(eligibility)));
    }
    Some(group_stack.unwrap_or(1).max(1))
}

/// Stack count for a perk, or `None` when it does not match.
pub fn match_perk(perk: &PerkDefinition, facts: &Facts, mode: OverrideMode) -> Option<u32> {
    let raw_stacks = match mode {
        OverrideMode::Off => return None,
        OverrideMode::On => 1,
        OverrideMode::Auto if perk.groups.is_empty() => 1,
        OverrideMode::Auto => perk
            .groups
            .iter()
            .filter_map(|group| evaluate_group(group, facts))
            .min()?,
    };

    if perk.stack_mode.collapses() {
        return Some(1);
    }
    Some(raw_stacks.clamp(1, perk.max_stacks.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perks::model::{PerkDefinition, StackMode};

    fn requirement(kind: RequirementKind, operator: Comparison, threshold: f64) -> Requirement {
        Requirement {
            kind,
            operator,
            threshold,
        }
    }

    fn gold_at_least(threshold: f64) -> Requirement {
        requirement(
            RequirementKind::CommodityQty("gold".to_string()),
            Comparison::Ge,
            threshold,
        )
    }

    #[test]
    fn stacks_scale_with_quantity_and_clamp_to_max() {
        let perk = PerkDefinition::new(1, "Goldbug")
            .with_max_stacks(3)
            .with_group(vec![gold_at_least(5.0)]);
        let facts = Facts::default().with_commodity("gold", 17);
        assert_eq!(match_perk(&perk, &facts, OverrideMode::Auto), Some(3));

        let facts = Facts::default().with_commodity("gold", 12);
        assert_eq!(match_perk(&perk, &facts, OverrideMode::Auto), Some(2));

        let facts = Facts::default().with_commodity("gold", 3);
        assert_eq!(match_perk(&perk, &facts, OverrideMode::Auto), None);
    }

    #[test]
    fn overrides_bypass_requirements() {
        let perk = PerkDefinition::new(1, "Goldbug")
            .with_max_stacks(3)
            .with_group(vec![gold_at_least(5.0)]);
        let poor = Facts::default();
        let rich = Facts::default().with_commodity("gold", 50);
        assert_eq!(match_perk(&perk, &poor, OverrideMode::On), Some(1));
        assert_eq!(match_perk(&perk, &rich, OverrideMode::Off), None);
    }

    #[test]
    fn groups_or_and_requirements_and() {
        let perk = PerkDefinition::new(2, "Either")
            .with_max_stacks(10)
            .with_group(vec![
                gold_at_least(2.0),
                requirement(RequirementKind::TagQty("gem".to_string()), Comparison::Ge, 1.0),
            ])
            .with_group(vec![requirement(
                RequirementKind::AnySingleCommodityQty,
                Comparison::Ge,
                4.0,
            )]);

        // First group fails on the tag, second group passes with floor(9/4) = 2.
        let facts = Facts::default().with_commodity("gold", 9);
        assert_eq!(match_perk(&perk, &facts, OverrideMode::Auto), Some(2));

        // Both pass: group stacks 4 (min(floor(9/2), floor(5/1)) = 4) and 2 -> min is 2.
        let mut facts = Facts::default().with_commodity("gold", 9);
        facts.tag_qty.insert("gem".to_string(), 5);
        assert_eq!(match_perk(&perk, &facts, OverrideMode::Auto), Some(2));

        // Neither passes.
        let facts = Facts::default().with_commodity("gold", 1);
        assert_eq!(match_perk(&perk, &facts, OverrideMode::Auto), None);
    }

    #[test]
    fn unsupported_requirement_fails_only_its_group() {
        let perk = PerkDefinition::new(3, "Odd")
            .with_group(vec![requirement(
                RequirementKind::Unsupported("karma".to_string()),
                Comparison::Ge,
                1.0,
            )])
            .with_group(vec![gold_at_least(1.0)]);
        let facts = Facts::default().with_commodity("gold", 1);
        assert_eq!(match_perk(&perk, &facts, OverrideMode::Auto), Some(1));
        assert_eq!(match_perk(&perk, &Facts::default(), OverrideMode::Auto), None);
    }

    #[test]
    fn perk_without_groups_always_matches() {
        let perk = PerkDefinition::new(4, "Free").with_max_stacks(5);
        assert_eq!(match_perk(&perk, &Facts::default(), OverrideMode::Auto), Some(1));
    }

    #[test]
    fn collapsing_stack_modes_force_one() {
        let facts = Facts::default().with_commodity("gold", 100);
        for mode in [StackMode::Override, StackMode::MaxOnly] {
            let perk = PerkDefinition::new(5, "Once")
                .with_max_stacks(10)
                .with_stack_mode(mode)
                .with_group(vec![gold_at_least(1.0)]);
            assert_eq!(match_perk(&perk, &facts, OverrideMode::Auto), Some(1));
        }
    }

    #[test]
    fn upper_bound_operators_give_single_stack() {
        let perk = PerkDefinition::new(6, "Minimalist")
            .with_max_stacks(5)
            .with_group(vec![requirement(
                RequirementKind::AnySingleCommodityQty,
                Comparison::Lt,
                3.0,
            )]);
        assert_eq!(match_perk(&perk, &Facts::default(), OverrideMode::Auto), Some(1));
        let facts = Facts::default().with_commodity("gold", 3);
        assert_eq!(match_perk(&perk, &facts, OverrideMode::Auto), None);
    }

    #[test]
    fn zero_threshold_is_one_stack() {
        assert_eq!(stack_eligibility(40.0, Comparison::Ge, 0.0), 1);
        assert_eq!(stack_eligibility(40.0, Comparison::Gt, 10.0), 4);
        assert_eq!(stack_eligibility(3.0, Comparison::Ne, 2.0), 1);
        assert_eq!(stack_eligibility(2.0, Comparison::Ne, 2.0), 0);
    }
}
