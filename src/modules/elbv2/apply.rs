//! Issue the API calls for computed listener and rule changes.
//!
//! Rule changes are applied in a fixed order: create, modify, set priority,
//! delete. Deletes go last and only when purging is enabled.

use super::actions;
use super::client::Elbv2Api;
use super::listeners::ListenerChanges;
use super::reconcile::RuleChanges;
use crate::modules::{ModuleError, ModuleResult};
use indexmap::IndexMap;

/// Apply the rule changes of one listener, returning whether anything changed
pub async fn apply_rule_changes(
    client: &dyn Elbv2Api,
    listener_arn: &str,
    changes: &RuleChanges,
    purge_rules: bool,
    check_mode: bool,
) -> ModuleResult<bool> {
    let changed = changes.has_changes(purge_rules);
    if check_mode || !changed {
        return Ok(changed);
    }

    for rule in &changes.rules_to_add {
        let rule_arn = client.create_rule(rule).await?;
        tracing::info!(
            "Created rule {} at priority {} on listener {}",
            rule_arn,
            rule.priority,
            listener_arn
        );
    }

    for patch in &changes.rules_to_modify {
        if patch.is_default {
            let Some(actions) = &patch.actions else {
                continue;
            };
            client.modify_default_actions(listener_arn, actions).await?;
            tracing::info!("Modified default actions of listener {}", listener_arn);
            continue;
        }

        let rule_arn = patch.rule_arn.as_deref().ok_or_else(|| {
            ModuleError::ExecutionFailed(format!(
                "Cannot modify a rule without an ARN on listener {}",
                listener_arn
            ))
        })?;
        client.modify_rule(rule_arn, patch).await?;
        tracing::info!("Modified rule {}", rule_arn);
    }

    if !changes.rules_to_set_priority.is_empty() {
        client
            .set_rule_priorities(changes.rules_to_set_priority.clone())
            .await?;
        tracing::info!(
            "Set priorities of {} rules on listener {}",
            changes.rules_to_set_priority.len(),
            listener_arn
        );
    }

    if purge_rules {
        for rule_arn in &changes.rules_to_delete {
            client.delete_rule(rule_arn).await?;
            tracing::info!("Deleted rule {}", rule_arn);
        }
    } else if !changes.rules_to_delete.is_empty() {
        tracing::debug!(
            "Keeping {} undeclared rules on listener {} (purge_rules disabled)",
            changes.rules_to_delete.len(),
            listener_arn
        );
    }

    Ok(true)
}

/// Apply listener changes, returning the ARNs of created listeners by port.
///
/// In check mode nothing is created and the returned map is empty.
pub async fn apply_listener_changes(
    client: &dyn Elbv2Api,
    load_balancer_arn: &str,
    changes: &ListenerChanges,
    purge_listeners: bool,
    check_mode: bool,
) -> ModuleResult<IndexMap<u16, String>> {
    let mut created = IndexMap::new();
    if check_mode {
        return Ok(created);
    }

    for listener in &changes.listeners_to_add {
        let mut listener = listener.clone();
        listener.default_actions = actions::for_create(&listener.default_actions);
        let listener_arn = client.create_listener(load_balancer_arn, &listener).await?;
        tracing::info!(
            "Created {} listener on port {} ({})",
            listener.protocol,
            listener.port,
            listener_arn
        );
        created.insert(listener.port, listener_arn);
    }

    for modification in &changes.listeners_to_modify {
        client.modify_listener(modification).await?;
        tracing::info!(
            "Modified listener on port {} ({})",
            modification.port,
            modification.listener_arn
        );
    }

    if purge_listeners {
        for listener_arn in &changes.listeners_to_delete {
            client.delete_listener(listener_arn).await?;
            tracing::info!("Deleted listener {}", listener_arn);
        }
    }

    Ok(created)
}
