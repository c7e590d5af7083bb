//! Shared test utilities for rustible-elbv2 integration tests.
//!
//! [`FakeElbv2`] is a stateful in-memory ELBv2 control plane. It stores what
//! it is sent and reads it back the way AWS does: OIDC secrets are dropped
//! together with `UseExistingClientSecret`, single-target forwards are echoed
//! with a `ForwardConfig`, and omitted OIDC and redirect fields come back with
//! their AWS defaults. Priority collisions are rejected like the real API.

#![allow(dead_code)]

use async_trait::async_trait;
use rustible_elbv2::modules::elbv2::types::{
    Action, ActionType, Condition, ForwardConfig, Listener, LoadBalancerInfo,
    TargetGroupStickinessConfig, TargetGroupTuple, ValuesConfig,
};
use rustible_elbv2::modules::elbv2::{
    Elbv2Api, ListenerModification, NewRule, PriorityChange, Rule, RulePatch, RulePriority,
};
use rustible_elbv2::modules::{ModuleError, ModuleResult, ModuleParams};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const LB_NAME: &str = "web-alb";
pub const LB_ARN: &str =
    "arn:aws:elasticloadbalancing:us-east-1:123456789012:loadbalancer/app/web-alb/50dc6c495c0c9188";
pub const TG_WEB: &str =
    "arn:aws:elasticloadbalancing:us-east-1:123456789012:targetgroup/web/73e2d6bc24d8a067";
pub const TG_API: &str =
    "arn:aws:elasticloadbalancing:us-east-1:123456789012:targetgroup/api/2453ed029918f21f";

#[derive(Debug, Default)]
struct State {
    listeners: Vec<Listener>,
    /// Numbered rules keyed by ARN, with their listener ARN
    rules: Vec<(String, Rule)>,
    target_groups: HashMap<String, String>,
    calls: Vec<String>,
    next_id: u32,
}

impl State {
    fn next_arn(&mut self, kind: &str) -> String {
        self.next_id += 1;
        format!(
            "arn:aws:elasticloadbalancing:us-east-1:123456789012:{}/app/web-alb/{:016x}",
            kind, self.next_id
        )
    }

    fn listener_mut(&mut self, listener_arn: &str) -> ModuleResult<&mut Listener> {
        self.listeners
            .iter_mut()
            .find(|l| l.listener_arn.as_deref() == Some(listener_arn))
            .ok_or_else(|| {
                ModuleError::ExecutionFailed(format!("ListenerNotFound: {}", listener_arn))
            })
    }

    fn priority_taken(&self, listener_arn: &str, priority: u32) -> bool {
        self.rules.iter().any(|(owner, rule)| {
            owner == listener_arn && rule.priority == RulePriority::Number(priority)
        })
    }
}

/// In-memory ELBv2 control plane with AWS read-back behavior
#[derive(Debug, Clone)]
pub struct FakeElbv2 {
    state: Arc<Mutex<State>>,
}

impl Default for FakeElbv2 {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeElbv2 {
    /// A fake holding the `web-alb` load balancer and the `web` and `api`
    /// target groups, with no listeners
    pub fn new() -> Self {
        let mut state = State::default();
        state.target_groups.insert("web".to_string(), TG_WEB.to_string());
        state.target_groups.insert("api".to_string(), TG_API.to_string());
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Seed a live listener with rules, returning the listener ARN
    pub fn seed_listener(&self, listener: Listener, rules: Vec<Rule>) -> String {
        let mut state = self.state.lock().unwrap();
        let listener_arn = state.next_arn("listener");

        let mut live = listener;
        live.listener_arn = Some(listener_arn.clone());
        live.default_actions = echo_actions(&live.default_actions);
        live.rules.clear();
        state.listeners.push(live);

        for rule in rules {
            let rule_arn = state.next_arn("listener-rule");
            let live_rule = Rule {
                conditions: echo_conditions(&rule.conditions),
                actions: echo_actions(&rule.actions),
                rule_arn: Some(rule_arn),
                is_default: false,
                ..rule
            };
            state.rules.push((listener_arn.clone(), live_rule));
        }

        listener_arn
    }

    /// Live rules of a listener sorted by priority, default rule last
    pub fn rules(&self, listener_arn: &str) -> Vec<Rule> {
        let state = self.state.lock().unwrap();
        collect_rules(&state, listener_arn).unwrap_or_default()
    }

    /// Live rules of a listener as `(priority, first condition value)` pairs
    pub fn rule_summary(&self, listener_arn: &str) -> Vec<(u32, String)> {
        self.rules(listener_arn)
            .into_iter()
            .filter_map(|rule| {
                let priority = rule.priority.number()?;
                let value = rule
                    .conditions
                    .first()
                    .and_then(|c| c.values.as_ref())
                    .and_then(|v| v.first().cloned())
                    .unwrap_or_default();
                Some((priority, value))
            })
            .collect()
    }

    pub fn listener(&self, port: u16) -> Option<Listener> {
        let state = self.state.lock().unwrap();
        state.listeners.iter().find(|l| l.port == port).cloned()
    }

    pub fn listener_ports(&self) -> Vec<u16> {
        let state = self.state.lock().unwrap();
        let mut ports: Vec<u16> = state.listeners.iter().map(|l| l.port).collect();
        ports.sort_unstable();
        ports
    }

    /// Mutating calls received so far, e.g. `create_rule 3`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

fn collect_rules(state: &State, listener_arn: &str) -> ModuleResult<Vec<Rule>> {
    let listener = state
        .listeners
        .iter()
        .find(|l| l.listener_arn.as_deref() == Some(listener_arn))
        .ok_or_else(|| ModuleError::ExecutionFailed(format!("ListenerNotFound: {}", listener_arn)))?;

    let mut rules: Vec<Rule> = state
        .rules
        .iter()
        .filter(|(owner, _)| owner == listener_arn)
        .map(|(_, rule)| rule.clone())
        .collect();
    rules.sort_by_key(|rule| rule.priority.number());

    rules.push(
        Rule::default_rule(listener.default_actions.clone())
            .with_arn(format!("{}/default", listener_arn)),
    );
    Ok(rules)
}

/// Conditions as AWS echoes them: flat values mirrored into the typed config
pub fn echo_conditions(conditions: &[Condition]) -> Vec<Condition> {
    conditions
        .iter()
        .map(|condition| {
            let mut condition = condition.clone();
            if let Some(values) = condition.values.clone() {
                let config = Some(ValuesConfig { values });
                match condition.field.as_str() {
                    "path-pattern" if condition.path_pattern_config.is_none() => {
                        condition.path_pattern_config = config;
                    }
                    "host-header" if condition.host_header_config.is_none() => {
                        condition.host_header_config = config;
                    }
                    _ => {}
                }
            }
            condition
        })
        .collect()
}

/// Actions as AWS echoes them
pub fn echo_actions(actions: &[Action]) -> Vec<Action> {
    actions
        .iter()
        .enumerate()
        .map(|(index, action)| {
            let mut action = action.clone();
            action.order.get_or_insert(index as u32 + 1);
            action.target_group_name = None;

            if action.action_type == ActionType::Forward && action.forward_config.is_none() {
                if let Some(arn) = &action.target_group_arn {
                    action.forward_config = Some(ForwardConfig {
                        target_groups: vec![TargetGroupTuple {
                            target_group_arn: arn.clone(),
                            weight: Some(1),
                        }],
                        target_group_stickiness_config: Some(TargetGroupStickinessConfig {
                            enabled: false,
                            duration_seconds: None,
                        }),
                    });
                }
            }

            if let Some(oidc) = &mut action.authenticate_oidc_config {
                oidc.client_secret = None;
                oidc.use_existing_client_secret = None;
                oidc.scope.get_or_insert_with(|| "openid".to_string());
                oidc.session_timeout.get_or_insert(604_800);
                oidc.session_cookie_name
                    .get_or_insert_with(|| "AWSELBAuthSessionCookie".to_string());
                oidc.on_unauthenticated_request
                    .get_or_insert_with(|| "authenticate".to_string());
            }

            if let Some(redirect) = &mut action.redirect_config {
                redirect.protocol.get_or_insert_with(|| "#{protocol}".to_string());
                redirect.port.get_or_insert_with(|| "#{port}".to_string());
                redirect.host.get_or_insert_with(|| "#{host}".to_string());
                redirect.path.get_or_insert_with(|| "/#{path}".to_string());
                redirect.query.get_or_insert_with(|| "#{query}".to_string());
            }

            action
        })
        .collect()
}

/// Reject OIDC payloads AWS would refuse
fn check_oidc_write(actions: &[Action], creating: bool) -> ModuleResult<()> {
    for oidc in actions.iter().filter_map(|a| a.authenticate_oidc_config.as_ref()) {
        let reuse = oidc.use_existing_client_secret.unwrap_or(false);
        if reuse && oidc.client_secret.is_some() {
            return Err(ModuleError::ExecutionFailed(
                "ValidationError: ClientSecret cannot be set with UseExistingClientSecret".to_string(),
            ));
        }
        if (creating || !reuse) && !oidc.has_client_secret() {
            return Err(ModuleError::ExecutionFailed(
                "ValidationError: ClientSecret is required".to_string(),
            ));
        }
    }
    Ok(())
}

#[async_trait]
impl Elbv2Api for FakeElbv2 {
    async fn find_load_balancer(&self, name: &str) -> ModuleResult<Option<LoadBalancerInfo>> {
        Ok((name == LB_NAME).then(|| LoadBalancerInfo {
            load_balancer_arn: LB_ARN.to_string(),
            load_balancer_name: LB_NAME.to_string(),
            load_balancer_type: Some("application".to_string()),
        }))
    }

    async fn describe_listeners(&self, load_balancer_arn: &str) -> ModuleResult<Vec<Listener>> {
        if load_balancer_arn != LB_ARN {
            return Err(ModuleError::ExecutionFailed(format!(
                "LoadBalancerNotFound: {}",
                load_balancer_arn
            )));
        }
        Ok(self.state.lock().unwrap().listeners.clone())
    }

    async fn describe_rules(&self, listener_arn: &str) -> ModuleResult<Vec<Rule>> {
        let state = self.state.lock().unwrap();
        collect_rules(&state, listener_arn)
    }

    async fn target_group_arn(&self, name: &str) -> ModuleResult<Option<String>> {
        Ok(self.state.lock().unwrap().target_groups.get(name).cloned())
    }

    async fn create_listener(
        &self,
        load_balancer_arn: &str,
        listener: &Listener,
    ) -> ModuleResult<String> {
        let mut state = self.state.lock().unwrap();
        if load_balancer_arn != LB_ARN {
            return Err(ModuleError::ExecutionFailed("LoadBalancerNotFound".to_string()));
        }
        if state.listeners.iter().any(|l| l.port == listener.port) {
            return Err(ModuleError::ExecutionFailed(format!(
                "DuplicateListener: port {}",
                listener.port
            )));
        }
        check_oidc_write(&listener.default_actions, true)?;

        let listener_arn = state.next_arn("listener");
        let mut live = listener.clone();
        live.listener_arn = Some(listener_arn.clone());
        live.default_actions = echo_actions(&listener.default_actions);
        live.rules.clear();
        state.listeners.push(live);
        state.calls.push(format!("create_listener {}", listener.port));
        Ok(listener_arn)
    }

    async fn modify_listener(&self, modification: &ListenerModification) -> ModuleResult<()> {
        let mut state = self.state.lock().unwrap();
        let listener = state.listener_mut(&modification.listener_arn)?;
        if let Some(protocol) = modification.protocol {
            listener.protocol = protocol;
        }
        if let Some(ssl_policy) = &modification.ssl_policy {
            listener.ssl_policy = Some(ssl_policy.clone());
        }
        if let Some(certificates) = &modification.certificates {
            listener.certificates = certificates.clone();
        }
        if let Some(alpn_policy) = &modification.alpn_policy {
            listener.alpn_policy = alpn_policy.clone();
        }
        state.calls.push(format!("modify_listener {}", modification.port));
        Ok(())
    }

    async fn modify_default_actions(
        &self,
        listener_arn: &str,
        actions: &[Action],
    ) -> ModuleResult<()> {
        check_oidc_write(actions, false)?;
        let mut state = self.state.lock().unwrap();
        let listener = state.listener_mut(listener_arn)?;
        listener.default_actions = echo_actions(actions);
        let port = listener.port;
        state.calls.push(format!("modify_default_actions {}", port));
        Ok(())
    }

    async fn delete_listener(&self, listener_arn: &str) -> ModuleResult<()> {
        let mut state = self.state.lock().unwrap();
        let port = state.listener_mut(listener_arn)?.port;
        state
            .listeners
            .retain(|l| l.listener_arn.as_deref() != Some(listener_arn));
        state.rules.retain(|(owner, _)| owner != listener_arn);
        state.calls.push(format!("delete_listener {}", port));
        Ok(())
    }

    async fn create_rule(&self, rule: &NewRule) -> ModuleResult<String> {
        check_oidc_write(&rule.actions, true)?;
        let mut state = self.state.lock().unwrap();
        state.listener_mut(&rule.listener_arn)?;
        if state.priority_taken(&rule.listener_arn, rule.priority) {
            return Err(ModuleError::ExecutionFailed(format!(
                "PriorityInUse: {}",
                rule.priority
            )));
        }

        let rule_arn = state.next_arn("listener-rule");
        let live = Rule::new(
            rule.priority,
            echo_conditions(&rule.conditions),
            echo_actions(&rule.actions),
        )
        .with_arn(rule_arn.clone());
        state.rules.push((rule.listener_arn.clone(), live));
        state.calls.push(format!("create_rule {}", rule.priority));
        Ok(rule_arn)
    }

    async fn modify_rule(&self, rule_arn: &str, patch: &RulePatch) -> ModuleResult<()> {
        if let Some(actions) = &patch.actions {
            check_oidc_write(actions, false)?;
        }
        let mut state = self.state.lock().unwrap();
        let (_, rule) = state
            .rules
            .iter_mut()
            .find(|(_, rule)| rule.rule_arn.as_deref() == Some(rule_arn))
            .ok_or_else(|| ModuleError::ExecutionFailed(format!("RuleNotFound: {}", rule_arn)))?;

        if let Some(conditions) = &patch.conditions {
            rule.conditions = echo_conditions(conditions);
        }
        if let Some(actions) = &patch.actions {
            rule.actions = echo_actions(actions);
        }
        let priority = rule.priority;
        state.calls.push(format!("modify_rule {}", priority));
        Ok(())
    }

    async fn set_rule_priorities(&self, changes: Vec<PriorityChange>) -> ModuleResult<()> {
        let mut state = self.state.lock().unwrap();
        let mut updated = state.rules.clone();

        for change in &changes {
            let (_, rule) = updated
                .iter_mut()
                .find(|(_, rule)| rule.rule_arn.as_deref() == Some(change.rule_arn.as_str()))
                .ok_or_else(|| {
                    ModuleError::ExecutionFailed(format!("RuleNotFound: {}", change.rule_arn))
                })?;
            rule.priority = RulePriority::Number(change.priority);
        }

        let mut seen = HashSet::new();
        for (owner, rule) in &updated {
            if !seen.insert((owner.clone(), rule.priority)) {
                return Err(ModuleError::ExecutionFailed(format!(
                    "PriorityInUse: {}",
                    rule.priority
                )));
            }
        }

        state.rules = updated;
        let mut moved: Vec<u32> = changes.iter().map(|c| c.priority).collect();
        moved.sort_unstable();
        state.calls.push(format!("set_rule_priorities {:?}", moved));
        Ok(())
    }

    async fn delete_rule(&self, rule_arn: &str) -> ModuleResult<()> {
        let mut state = self.state.lock().unwrap();
        let position = state
            .rules
            .iter()
            .position(|(_, rule)| rule.rule_arn.as_deref() == Some(rule_arn))
            .ok_or_else(|| ModuleError::ExecutionFailed(format!("RuleNotFound: {}", rule_arn)))?;
        let (_, rule) = state.rules.remove(position);
        state.calls.push(format!("delete_rule {}", rule.priority));
        Ok(())
    }
}

/// Module parameters from a JSON object
pub fn params(value: serde_json::Value) -> ModuleParams {
    serde_json::from_value(value).unwrap()
}
