//! Activation tracking: which matched sources are new since the last tracked evaluation.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::perks::engine::{Evaluation, MatchedPerk};
use crate::perks::model::{GuildId, PerkRef, UserId};
use crate::store::{StateKey, StateStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivatedPerk {
    pub perk: PerkRef,
    pub name: String,
    pub description: String,
    /// Display summary of the modifiers applied at activation time.
    pub summary: String,
}

impl ActivatedPerk {
    fn from_matched(matched: &MatchedPerk) -> Self {
        Self {
            perk: matched.perk.clone(),
            name: matched.name.clone(),
            description: matched.description.trim().to_string(),
            summary: matched.display.trim().to_string(),
        }
    }

    /// Pre-rendered notification text; delivering it is up to the caller.
    pub fn announcement(&self) -> String {
        let description = if self.description.is_empty() {
            "No description."
        } else {
            self.description.as_str()
        };
        let modifier = if self.summary.is_empty() {
            "No modifier."
        } else {
            self.summary.as_str()
        };
        format!(
            "**PERK ACTIVATED!!**:\n**{}**\n*{}*\n**MODIFIERS**:\n{}",
            self.name, description, modifier
        )
    }
}

/// Joins several announcements into one message block.
pub fn render_announcements(activated: &[ActivatedPerk]) -> String {
    activated
        .iter()
        .map(ActivatedPerk::announcement)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Set difference between the current matched set and the persisted active set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationDiff {
    pub newly_active: BTreeSet<PerkRef>,
    pub deactivated: BTreeSet<PerkRef>,
}

pub fn diff_activations(
    current: &BTreeSet<PerkRef>,
    previous: &BTreeSet<PerkRef>,
) -> ActivationDiff {
    ActivationDiff {
        newly_active: current.difference(previous).cloned().collect(),
        deactivated: previous.difference(current).cloned().collect(),
    }
}

/// Persists the current matched set as active and returns the newly activated perks,
/// sorted by [PerkRef].
pub fn track_activations(
    state: &dyn StateStore,
    guild: GuildId,
    user: UserId,
    evaluation: &Evaluation,
) -> Result<Vec<ActivatedPerk>, StoreError> {
    let current: BTreeSet<PerkRef> = evaluation.matched_refs().cloned().collect();
    let previous = state.active_perks(guild, user)?;
    let diff = diff_activations(&current, &previous);

    let updates: Vec<(StateKey, bool)> = current
        .iter()
        .map(|perk| (StateKey::new(guild, user, perk.clone()), true))
        .chain(
            diff.deactivated
                .iter()
                .map(|perk| (StateKey::new(guild, user, perk.clone()), false)),
        )
        .collect();
    state.set_active_many(&updates)?;

    let activated: Vec<ActivatedPerk> = diff
        .newly_active
        .iter()
        .filter_map(|perk| evaluation.matched(perk))
        .map(ActivatedPerk::from_matched)
        .collect();

    for perk in &activated {
        tracing::info!(
            target: "perkeval::engine",
            guild,
            user,
            perk = %perk.perk,
            name = %perk.name,
            "perk.activated"
        );
    }
    for perk in &diff.deactivated {
        tracing::info!(
            target: "perkeval::engine",
            guild,
            user,
            perk = %perk,
            "perk.deactivated"
        );
    }
    Ok(activated)
}
