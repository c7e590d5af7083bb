//! Comparison of one declared rule against one live rule.

use super::actions;
use super::conditions::condition_lists_equal;
use super::types::{Action, Condition, Rule};
use serde::{Deserialize, Serialize};

/// Content change for an existing rule.
///
/// Only the parts that differ are present. Priority is never part of a patch;
/// priority moves go through `SetRulePriorities` instead.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RulePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_arn: Option<String>,
    /// Patch targets the listener's default rule (applied via `ModifyListener`)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Action>>,
}

impl RulePatch {
    pub fn is_empty(&self) -> bool {
        self.conditions.is_none() && self.actions.is_none()
    }
}

/// Compare a live rule with a declared one.
///
/// Returns `None` when they are equal after normalization. Otherwise the
/// patch carries the declared conditions and/or the declared actions (in
/// write form), plus the live rule's ARN when known.
pub fn compare_rule(current: &Rule, declared: &Rule) -> Option<RulePatch> {
    let mut patch = RulePatch {
        rule_arn: current.rule_arn.clone(),
        is_default: current.is_default_rule(),
        ..RulePatch::default()
    };

    if !actions::actions_equal(&current.actions, &declared.actions) {
        patch.actions = Some(actions::for_modify(&declared.actions));
    }

    // The default rule has no conditions to change
    if !patch.is_default && !condition_lists_equal(&current.conditions, &declared.conditions) {
        patch.conditions = Some(declared.conditions.clone());
    }

    if patch.is_empty() {
        tracing::trace!(priority = %current.priority, "rule unchanged");
        None
    } else {
        tracing::trace!(
            priority = %current.priority,
            conditions = patch.conditions.is_some(),
            actions = patch.actions.is_some(),
            "rule content differs"
        );
        Some(patch)
    }
}

/// Whether two rules have the same content, ignoring priority
pub fn same_content(current: &Rule, declared: &Rule) -> bool {
    compare_rule(current, declared).is_none()
}
