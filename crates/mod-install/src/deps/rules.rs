//! Rule maintenance around a dependency batch
//!
//! Before gathering, rules pointing at mods that no longer exist get their
//! id cleared so the gatherer re-matches them. After the batch, rules are
//! pinned to the mods that actually satisfied them.

use tracing::debug;

use crate::api::Api;
use crate::model::{is_fuzzy_version, ModRule};

/// Clear stale ids from fuzzy rules so they can re-match
///
/// A rule whose `reference.id` names a missing mod is only recoverable when
/// the reference still carries a fuzzy description; those get rewritten
/// with the id cleared, everything else passes through unchanged.
pub(super) fn repair_rules(api: &Api, game_id: &str, mod_id: &str, rules: &[ModRule]) -> Vec<ModRule> {
    rules
        .iter()
        .map(|rule| {
            let stale = rule
                .reference
                .id
                .as_deref()
                .map(|id| api.store.mod_entry(game_id, id).is_none())
                .unwrap_or(false);
            if stale && rule.reference.is_fuzzy() {
                debug!(reference = %rule.reference.key(), "clearing stale rule id");
                let mut repaired = rule.clone();
                repaired.reference.id = None;
                api.store.remove_rule(game_id, mod_id, rule);
                api.store.add_rule(game_id, mod_id, repaired.clone());
                repaired
            } else {
                rule.clone()
            }
        })
        .collect()
}

/// Pin a rule to the mod that satisfied it
///
/// The md5 is dropped when the reference combines a fuzzy version match
/// with a logical name or file expression; keeping it would tie the rule to
/// this exact file and defeat future updates.
pub(super) fn update_rule(api: &Api, game_id: &str, source_mod_id: &str, rule: &ModRule, installed_id: &str) {
    let mut updated = rule.clone();
    updated.reference.id = Some(installed_id.to_owned());

    let fuzzy_version = updated
        .reference
        .version_match
        .as_deref()
        .map(is_fuzzy_version)
        .unwrap_or(false);
    let named = updated.reference.logical_file_name.is_some()
        || updated.reference.file_expression.is_some();
    if fuzzy_version && named {
        updated.reference.file_md5 = None;
    }

    if updated != *rule {
        api.store.remove_rule(game_id, source_mod_id, rule);
        api.store.add_rule(game_id, source_mod_id, updated);
    }
}
