//! The ELBv2 control plane as seen by the load balancer module.
//!
//! Everything the module needs from AWS goes through [`Elbv2Api`], so the
//! reconciliation and apply logic can run against the SDK client or against
//! a fake in tests.

use super::compare::RulePatch;
use super::listeners::ListenerModification;
use super::reconcile::{NewRule, PriorityChange};
use super::types::{Action, Listener, LoadBalancerInfo, Rule};
use crate::modules::ModuleResult;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Elbv2Api: Send + Sync {
    /// Look up a load balancer by name
    async fn find_load_balancer(&self, name: &str) -> ModuleResult<Option<LoadBalancerInfo>>;

    /// All listeners of a load balancer (without rules)
    async fn describe_listeners(&self, load_balancer_arn: &str) -> ModuleResult<Vec<Listener>>;

    /// All rules of a listener, including the default rule
    async fn describe_rules(&self, listener_arn: &str) -> ModuleResult<Vec<Rule>>;

    /// Resolve a target group name to its ARN
    async fn target_group_arn(&self, name: &str) -> ModuleResult<Option<String>>;

    /// Create a listener with its default actions, returning the listener ARN
    async fn create_listener(
        &self,
        load_balancer_arn: &str,
        listener: &Listener,
    ) -> ModuleResult<String>;

    async fn modify_listener(&self, modification: &ListenerModification) -> ModuleResult<()>;

    /// Replace the default actions of a listener
    async fn modify_default_actions(
        &self,
        listener_arn: &str,
        actions: &[Action],
    ) -> ModuleResult<()>;

    async fn delete_listener(&self, listener_arn: &str) -> ModuleResult<()>;

    /// Create a rule, returning the rule ARN
    async fn create_rule(&self, rule: &NewRule) -> ModuleResult<String>;

    /// Replace the conditions and/or actions carried by `patch`
    async fn modify_rule(&self, rule_arn: &str, patch: &RulePatch) -> ModuleResult<()>;

    /// Move rules to new priorities in one atomic batch
    async fn set_rule_priorities(&self, changes: Vec<PriorityChange>) -> ModuleResult<()>;

    async fn delete_rule(&self, rule_arn: &str) -> ModuleResult<()>;
}
