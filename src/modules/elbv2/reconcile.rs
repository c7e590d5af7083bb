//! Listener rule set reconciliation.
//!
//! Given the live rules of one listener and the declared rule list, work out
//! which rules to create, which to modify in place, which only need a new
//! priority, and which are left over. The computation is pure; the caller
//! applies the result (see [`super::apply`]).
//!
//! Matching runs in three passes over the numbered rules:
//!
//! 1. exact matches: same priority, same content, nothing to do;
//! 2. content matches at another priority, which become priority moves
//!    (this is what turns a swap of two rules into two `SetRulePriorities`
//!    entries instead of two content modifications);
//! 3. positional matches: same priority, different content, which become
//!    content patches.
//!
//! Declared rules left after pass 3 are created; live rules left are
//! returned for deletion regardless of the purge flag.
//!
//! The result is applied as creates, modifies, one priority batch, then
//! deletes. A pass 2 move is kept only when that order can carry it out:
//! its target priority is free or vacated within the batch, and the priority
//! it leaves is not wanted by a rule that would have to be created. Blocked
//! moves fall through to pass 3, so creates only ever land on priorities no
//! live rule holds.

use super::actions;
use super::compare::{compare_rule, same_content, RulePatch};
use super::types::{Action, Condition, Rule};
use serde::{Deserialize, Serialize};

/// A rule to create on a listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewRule {
    pub listener_arn: String,
    pub priority: u32,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}

/// A priority move for an existing rule, content unchanged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PriorityChange {
    pub rule_arn: String,
    pub priority: u32,
}

/// The four disjoint change sets for one listener
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleChanges {
    pub rules_to_add: Vec<NewRule>,
    pub rules_to_modify: Vec<RulePatch>,
    pub rules_to_set_priority: Vec<PriorityChange>,
    /// ARNs of live rules absent from the declared set
    pub rules_to_delete: Vec<String>,
}

impl RuleChanges {
    pub fn is_empty(&self) -> bool {
        self.rules_to_add.is_empty()
            && self.rules_to_modify.is_empty()
            && self.rules_to_set_priority.is_empty()
            && self.rules_to_delete.is_empty()
    }

    /// Whether applying these changes mutates anything, given the purge flag
    pub fn has_changes(&self, purge_rules: bool) -> bool {
        !self.rules_to_add.is_empty()
            || !self.rules_to_modify.is_empty()
            || !self.rules_to_set_priority.is_empty()
            || (purge_rules && !self.rules_to_delete.is_empty())
    }
}

fn live_arn(rule: &Rule) -> String {
    rule.rule_arn.clone().unwrap_or_default()
}

fn numbered(rule: &Rule) -> Option<u32> {
    if rule.is_default_rule() {
        None
    } else {
        rule.priority.number()
    }
}

/// Whether moving `remaining_current[from]` to the priority of
/// `remaining_declared[to]` can be applied, given the other `moves`.
///
/// Rules are created before the priority batch runs and deleted after it, so
/// the target priority must be free or vacated by the same batch, and a
/// declared rule at the vacated priority must itself arrive through the batch
/// rather than be created while the priority is still held.
fn move_is_applicable(
    (from, to): (usize, usize),
    moves: &[(usize, usize)],
    current: &[(u32, &Rule)],
    declared: &[(u32, &Rule)],
) -> bool {
    let source = current[from].0;
    let target = declared[to].0;

    let target_free = current
        .iter()
        .enumerate()
        .filter(|&(index, &(priority, _))| index != from && priority == target)
        .all(|(index, _)| moves.iter().any(|&(moving, _)| moving == index));
    let source_refilled = declared
        .iter()
        .enumerate()
        .filter(|&(_, &(priority, _))| priority == source)
        .all(|(index, _)| moves.iter().any(|&(_, arriving)| arriving == index));

    target_free && source_refilled
}

/// Reconcile the declared rules of one listener against its live rules
pub fn reconcile_rules(listener_arn: &str, current: &[Rule], declared: &[Rule]) -> RuleChanges {
    let mut changes = RuleChanges::default();

    // The default rule is never created, moved or deleted; only its actions change
    let current_default = current.iter().find(|rule| rule.is_default_rule());
    let declared_default = declared.iter().find(|rule| rule.is_default_rule());
    if let (Some(live), Some(wanted)) = (current_default, declared_default) {
        if !actions::actions_equal(&live.actions, &wanted.actions) {
            changes.rules_to_modify.push(RulePatch {
                rule_arn: live.rule_arn.clone(),
                is_default: true,
                conditions: None,
                actions: Some(actions::for_modify(&wanted.actions)),
            });
        }
    }

    let mut remaining_current: Vec<(u32, &Rule)> = current
        .iter()
        .filter_map(|rule| numbered(rule).map(|priority| (priority, rule)))
        .collect();
    let mut remaining_declared: Vec<(u32, &Rule)> = declared
        .iter()
        .filter_map(|rule| numbered(rule).map(|priority| (priority, rule)))
        .collect();

    // Pass 1: exact matches
    remaining_current.retain(|&(priority, live)| {
        let exact = remaining_declared
            .iter()
            .position(|&(wanted, rule)| wanted == priority && same_content(live, rule));
        match exact {
            Some(index) => {
                remaining_declared.remove(index);
                false
            }
            None => true,
        }
    });

    // Pass 2: same content at another priority, as one SetRulePriorities batch
    let mut claimed = vec![false; remaining_declared.len()];
    let mut moves: Vec<(usize, usize)> = Vec::new();
    for (from, &(_, live)) in remaining_current.iter().enumerate() {
        let target = (0..remaining_declared.len())
            .find(|&to| !claimed[to] && same_content(live, remaining_declared[to].1));
        if let Some(to) = target {
            claimed[to] = true;
            moves.push((from, to));
        }
    }
    loop {
        let blocked = moves
            .iter()
            .position(|&mv| !move_is_applicable(mv, &moves, &remaining_current, &remaining_declared));
        let Some(blocked) = blocked else {
            break;
        };
        let (from, to) = moves.remove(blocked);
        tracing::trace!(
            rule_arn = %live_arn(remaining_current[from].1),
            to = remaining_declared[to].0,
            "priority move blocked, matching by position instead"
        );
    }

    let mut moved_current = vec![false; remaining_current.len()];
    let mut moved_declared = vec![false; remaining_declared.len()];
    for &(from, to) in &moves {
        let (priority, live) = remaining_current[from];
        let wanted = remaining_declared[to].0;
        tracing::debug!(
            rule_arn = %live_arn(live),
            from = priority,
            to = wanted,
            "rule priority changed"
        );
        changes.rules_to_set_priority.push(PriorityChange {
            rule_arn: live_arn(live),
            priority: wanted,
        });
        moved_current[from] = true;
        moved_declared[to] = true;
    }
    let remaining_current: Vec<(u32, &Rule)> = remaining_current
        .into_iter()
        .zip(moved_current)
        .filter_map(|(entry, moved)| (!moved).then_some(entry))
        .collect();
    let mut remaining_declared: Vec<(u32, &Rule)> = remaining_declared
        .into_iter()
        .zip(moved_declared)
        .filter_map(|(entry, moved)| (!moved).then_some(entry))
        .collect();

    // Pass 3: same priority, different content
    for (priority, live) in remaining_current {
        let positional = remaining_declared
            .iter()
            .position(|&(wanted, _)| wanted == priority);
        match positional {
            Some(index) => {
                let (_, rule) = remaining_declared.remove(index);
                if let Some(mut patch) = compare_rule(live, rule) {
                    patch.rule_arn = Some(live_arn(live));
                    changes.rules_to_modify.push(patch);
                }
            }
            None => changes.rules_to_delete.push(live_arn(live)),
        }
    }

    for (priority, rule) in remaining_declared {
        changes.rules_to_add.push(NewRule {
            listener_arn: listener_arn.to_string(),
            priority,
            conditions: rule.conditions.clone(),
            actions: actions::for_create(&rule.actions),
        });
    }

    tracing::debug!(
        listener_arn,
        add = changes.rules_to_add.len(),
        modify = changes.rules_to_modify.len(),
        set_priority = changes.rules_to_set_priority.len(),
        delete = changes.rules_to_delete.len(),
        "reconciled listener rules"
    );

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LISTENER: &str = "arn:aws:elasticloadbalancing:us-east-1:123456789012:listener/app/web/1/2";

    fn path_rule(priority: u32, path: &str, target: &str) -> Rule {
        Rule::new(
            priority,
            vec![Condition::with_values("path-pattern", [path])],
            vec![Action::forward(target)],
        )
    }

    fn live(rule: Rule, arn: &str) -> Rule {
        let mut rule = rule.with_arn(arn);
        rule.actions = rule
            .actions
            .into_iter()
            .enumerate()
            .map(|(i, action)| action.with_order(u32::try_from(i + 1).unwrap()))
            .collect();
        rule
    }

    fn live_default(target: &str) -> Rule {
        Rule::default_rule(vec![Action::forward(target).with_order(1)]).with_arn("arn:rule/default")
    }

    #[test]
    fn test_no_op_convergence() {
        let current = vec![
            live_default("arn:tg/default"),
            live(path_rule(1, "/a", "arn:tg/a"), "arn:rule/a"),
            live(path_rule(2, "/b", "arn:tg/b"), "arn:rule/b"),
        ];
        let declared = vec![
            path_rule(2, "/b", "arn:tg/b"),
            path_rule(1, "/a", "arn:tg/a"),
            Rule::default_rule(vec![Action::forward("arn:tg/default")]),
        ];

        let changes = reconcile_rules(LISTENER, &current, &declared);
        assert!(changes.is_empty(), "{:?}", changes);
    }

    #[test]
    fn test_priority_swap_only_sets_priorities() {
        let current = vec![
            live_default("arn:tg/default"),
            live(path_rule(1, "/a", "arn:tg/a"), "arn:rule/a"),
            live(path_rule(2, "/b", "arn:tg/b"), "arn:rule/b"),
        ];
        let declared = vec![path_rule(1, "/b", "arn:tg/b"), path_rule(2, "/a", "arn:tg/a")];

        let changes = reconcile_rules(LISTENER, &current, &declared);
        assert!(changes.rules_to_add.is_empty());
        assert!(changes.rules_to_modify.is_empty());
        assert!(changes.rules_to_delete.is_empty());
        assert_eq!(
            changes.rules_to_set_priority,
            vec![
                PriorityChange {
                    rule_arn: "arn:rule/a".to_string(),
                    priority: 2
                },
                PriorityChange {
                    rule_arn: "arn:rule/b".to_string(),
                    priority: 1
                },
            ]
        );
    }

    #[test]
    fn test_add_only() {
        let current = vec![
            live_default("arn:tg/default"),
            live(path_rule(1, "/a", "arn:tg/a"), "arn:rule/a"),
        ];
        let declared = vec![path_rule(1, "/a", "arn:tg/a"), path_rule(2, "/b", "arn:tg/b")];

        let changes = reconcile_rules(LISTENER, &current, &declared);
        assert!(changes.rules_to_modify.is_empty());
        assert!(changes.rules_to_set_priority.is_empty());
        assert!(changes.rules_to_delete.is_empty());
        assert_eq!(changes.rules_to_add.len(), 1);
        let added = &changes.rules_to_add[0];
        assert_eq!(added.priority, 2);
        assert_eq!(added.listener_arn, LISTENER);
        assert_eq!(added.actions[0].target_group_arn.as_deref(), Some("arn:tg/b"));
    }

    #[test]
    fn test_content_change_at_same_priority_modifies() {
        let current = vec![live(path_rule(1, "/a", "arn:tg/a"), "arn:rule/a")];
        let declared = vec![path_rule(1, "/a", "arn:tg/other")];

        let changes = reconcile_rules(LISTENER, &current, &declared);
        assert_eq!(changes.rules_to_modify.len(), 1);
        let patch = &changes.rules_to_modify[0];
        assert_eq!(patch.rule_arn.as_deref(), Some("arn:rule/a"));
        assert!(patch.conditions.is_none());
        assert!(patch.actions.is_some());
        assert!(changes.rules_to_add.is_empty());
        assert!(changes.rules_to_delete.is_empty());
    }

    #[test]
    fn test_unmatched_live_rule_is_returned_for_deletion() {
        let current = vec![
            live_default("arn:tg/default"),
            live(path_rule(1, "/a", "arn:tg/a"), "arn:rule/a"),
            live(path_rule(5, "/old", "arn:tg/old"), "arn:rule/old"),
        ];
        let declared = vec![path_rule(1, "/a", "arn:tg/a")];

        let changes = reconcile_rules(LISTENER, &current, &declared);
        assert_eq!(changes.rules_to_delete, vec!["arn:rule/old".to_string()]);
        assert!(changes.has_changes(true));
        assert!(!changes.has_changes(false));
    }

    #[test]
    fn test_moved_rule_with_new_content_is_delete_and_add() {
        let current = vec![live(path_rule(1, "/a", "arn:tg/a"), "arn:rule/a")];
        let declared = vec![path_rule(3, "/a", "arn:tg/changed")];

        let changes = reconcile_rules(LISTENER, &current, &declared);
        assert!(changes.rules_to_set_priority.is_empty());
        assert!(changes.rules_to_modify.is_empty());
        assert_eq!(changes.rules_to_add.len(), 1);
        assert_eq!(changes.rules_to_delete, vec!["arn:rule/a".to_string()]);
    }

    #[test]
    fn test_exact_match_preferred_over_move() {
        let current = vec![
            live(path_rule(1, "/a", "arn:tg/a"), "arn:rule/first"),
            live(path_rule(2, "/a", "arn:tg/a"), "arn:rule/second"),
        ];
        let declared = vec![path_rule(2, "/a", "arn:tg/a")];

        let changes = reconcile_rules(LISTENER, &current, &declared);
        assert!(changes.rules_to_set_priority.is_empty());
        assert_eq!(changes.rules_to_delete, vec!["arn:rule/first".to_string()]);
    }

    fn set_priority(arn: &str, priority: u32) -> PriorityChange {
        PriorityChange {
            rule_arn: arn.to_string(),
            priority,
        }
    }

    #[test]
    fn test_insert_ahead_modifies_in_place_and_adds_behind() {
        let current = vec![live(path_rule(1, "/a", "arn:tg/a"), "arn:rule/a")];
        let declared = vec![path_rule(1, "/new", "arn:tg/new"), path_rule(2, "/a", "arn:tg/a")];

        let changes = reconcile_rules(LISTENER, &current, &declared);
        assert!(changes.rules_to_set_priority.is_empty());
        assert!(changes.rules_to_delete.is_empty());
        assert_eq!(changes.rules_to_modify.len(), 1);
        assert_eq!(changes.rules_to_modify[0].rule_arn.as_deref(), Some("arn:rule/a"));
        assert_eq!(changes.rules_to_add.len(), 1);
        assert_eq!(changes.rules_to_add[0].priority, 2);
    }

    #[test]
    fn test_move_onto_held_priority_falls_back_to_position() {
        let current = vec![
            live(path_rule(1, "/a", "arn:tg/a"), "arn:rule/a"),
            live(path_rule(2, "/b", "arn:tg/b"), "arn:rule/b"),
        ];
        let declared = vec![path_rule(2, "/a", "arn:tg/a"), path_rule(3, "/c", "arn:tg/c")];

        let changes = reconcile_rules(LISTENER, &current, &declared);
        assert!(changes.rules_to_set_priority.is_empty());
        assert_eq!(changes.rules_to_modify.len(), 1);
        assert_eq!(changes.rules_to_modify[0].rule_arn.as_deref(), Some("arn:rule/b"));
        assert_eq!(changes.rules_to_add.len(), 1);
        assert_eq!(changes.rules_to_add[0].priority, 3);
        assert_eq!(changes.rules_to_delete, vec!["arn:rule/a".to_string()]);
    }

    #[test]
    fn test_move_into_free_priority_is_kept() {
        let current = vec![
            live(path_rule(1, "/a", "arn:tg/a"), "arn:rule/a"),
            live(path_rule(2, "/b", "arn:tg/b"), "arn:rule/b"),
        ];
        let declared = vec![path_rule(2, "/b", "arn:tg/b"), path_rule(5, "/a", "arn:tg/a")];

        let changes = reconcile_rules(LISTENER, &current, &declared);
        assert_eq!(changes.rules_to_set_priority, vec![set_priority("arn:rule/a", 5)]);
        assert!(changes.rules_to_add.is_empty());
        assert!(changes.rules_to_modify.is_empty());
        assert!(changes.rules_to_delete.is_empty());
    }

    #[test]
    fn test_rotation_stays_one_batch() {
        let current = vec![
            live(path_rule(1, "/a", "arn:tg/a"), "arn:rule/a"),
            live(path_rule(2, "/b", "arn:tg/b"), "arn:rule/b"),
            live(path_rule(3, "/c", "arn:tg/c"), "arn:rule/c"),
        ];
        let declared = vec![
            path_rule(1, "/c", "arn:tg/c"),
            path_rule(2, "/a", "arn:tg/a"),
            path_rule(3, "/b", "arn:tg/b"),
        ];

        let changes = reconcile_rules(LISTENER, &current, &declared);
        assert_eq!(
            changes.rules_to_set_priority,
            vec![
                set_priority("arn:rule/a", 2),
                set_priority("arn:rule/b", 3),
                set_priority("arn:rule/c", 1),
            ]
        );
        assert!(changes.rules_to_add.is_empty());
        assert!(changes.rules_to_modify.is_empty());
    }

    #[test]
    fn test_shifting_a_chain_down_never_adds_onto_held_priority() {
        let current = vec![
            live(path_rule(1, "/a", "arn:tg/a"), "arn:rule/a"),
            live(path_rule(2, "/b", "arn:tg/b"), "arn:rule/b"),
        ];
        let declared = vec![
            path_rule(1, "/new", "arn:tg/new"),
            path_rule(2, "/a", "arn:tg/a"),
            path_rule(3, "/b", "arn:tg/b"),
        ];

        let changes = reconcile_rules(LISTENER, &current, &declared);
        assert!(changes.rules_to_set_priority.is_empty());
        assert_eq!(changes.rules_to_modify.len(), 2);
        let added: Vec<u32> = changes.rules_to_add.iter().map(|rule| rule.priority).collect();
        assert_eq!(added, vec![3]);
    }

    #[test]
    fn test_default_rule_only_modified() {
        let current = vec![
            live_default("arn:tg/default"),
            live(path_rule(1, "/a", "arn:tg/a"), "arn:rule/a"),
        ];
        let declared = vec![
            path_rule(1, "/a", "arn:tg/a"),
            Rule::default_rule(vec![Action::forward("arn:tg/new-default")]),
        ];

        let changes = reconcile_rules(LISTENER, &current, &declared);
        assert_eq!(changes.rules_to_modify.len(), 1);
        let patch = &changes.rules_to_modify[0];
        assert!(patch.is_default);
        assert_eq!(patch.rule_arn.as_deref(), Some("arn:rule/default"));
        assert!(changes.rules_to_add.is_empty());
        assert!(changes.rules_to_delete.is_empty());
        assert!(changes.rules_to_set_priority.is_empty());
    }

    #[test]
    fn test_default_rule_never_deleted_without_declaration() {
        let current = vec![live_default("arn:tg/default")];
        let changes = reconcile_rules(LISTENER, &current, &[]);
        assert!(changes.is_empty());
    }
}
