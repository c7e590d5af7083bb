//! `aws_elb_application_lb` - converge the listeners and listener rules of an
//! existing Application Load Balancer.

use super::{actions, conditions};
use super::apply::{apply_listener_changes, apply_rule_changes};
use super::client::Elbv2Api;
use super::listeners::compare_listeners;
use super::reconcile::{reconcile_rules, RuleChanges};
use super::types::{Listener, LoadBalancerInfo, Rule};
use super::validate::validate_listeners;
use crate::modules::{
    Diff, Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult,
    ParallelizationHint, ParamExt,
};
use indexmap::IndexMap;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::collections::HashMap;
use std::sync::Arc;

/// Parsed module parameters
#[derive(Debug, Clone)]
#[cfg_attr(not(feature = "aws"), allow(dead_code))]
struct LoadBalancerConfig {
    name: Option<String>,
    load_balancer_arn: Option<String>,
    /// `None` leaves listeners untouched
    listeners: Option<Vec<Listener>>,
    purge_listeners: bool,
    purge_rules: bool,
    region: Option<String>,
    endpoint_url: Option<String>,
}

impl LoadBalancerConfig {
    fn from_params(params: &ModuleParams) -> ModuleResult<Self> {
        let name = params.get_string("name")?;
        let load_balancer_arn = params.get_string("load_balancer_arn")?;
        if name.is_none() && load_balancer_arn.is_none() {
            return Err(ModuleError::MissingParameter(
                "name or load_balancer_arn".to_string(),
            ));
        }

        Ok(Self {
            name,
            load_balancer_arn,
            listeners: params.get_typed::<Vec<Listener>>("listeners")?,
            purge_listeners: params.get_bool("purge_listeners")?.unwrap_or(true),
            purge_rules: params.get_bool("purge_rules")?.unwrap_or(true),
            region: params.get_string("region")?,
            endpoint_url: params.get_string("endpoint_url")?,
        })
    }

    fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.load_balancer_arn.as_deref())
            .unwrap_or_default()
    }
}

/// Per-listener summary reported in the module output
#[derive(Debug, Serialize)]
struct ListenerReport {
    port: u16,
    listener_arn: String,
    changed: bool,
    #[serde(flatten)]
    changes: RuleChanges,
}

/// Module for Application Load Balancer listeners and listener rules
#[derive(Default)]
pub struct ElbApplicationLbModule {
    client: Option<Arc<dyn Elbv2Api>>,
}

impl ElbApplicationLbModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `client` instead of building an SDK client from the environment
    pub fn with_client(client: Arc<dyn Elbv2Api>) -> Self {
        Self {
            client: Some(client),
        }
    }

    #[allow(unused_variables)]
    async fn client_for(&self, config: &LoadBalancerConfig) -> ModuleResult<Arc<dyn Elbv2Api>> {
        if let Some(client) = &self.client {
            return Ok(Arc::clone(client));
        }

        #[cfg(feature = "aws")]
        {
            let client = super::sdk::SdkElbv2Client::from_env(
                config.region.as_deref(),
                config.endpoint_url.as_deref(),
            )
            .await;
            Ok(Arc::new(client))
        }

        #[cfg(not(feature = "aws"))]
        {
            Err(ModuleError::Unsupported(
                "aws_elb_application_lb requires the 'aws' feature".to_string(),
            ))
        }
    }

    async fn resolve_load_balancer(
        client: &dyn Elbv2Api,
        config: &LoadBalancerConfig,
    ) -> ModuleResult<LoadBalancerInfo> {
        if let Some(arn) = &config.load_balancer_arn {
            return Ok(LoadBalancerInfo {
                load_balancer_arn: arn.clone(),
                load_balancer_name: config.name.clone().unwrap_or_default(),
                load_balancer_type: None,
            });
        }

        let name = config.display_name();
        client.find_load_balancer(name).await?.ok_or_else(|| {
            ModuleError::ExecutionFailed(format!("Load balancer '{}' does not exist", name))
        })
    }

    /// Replace `TargetGroupName` references with ARNs
    async fn resolve_target_groups(
        client: &dyn Elbv2Api,
        listeners: &mut [Listener],
    ) -> ModuleResult<()> {
        let mut resolved: HashMap<String, String> = HashMap::new();

        for listener in listeners.iter_mut() {
            let port = listener.port;
            let chains = std::iter::once(&mut listener.default_actions)
                .chain(listener.rules.iter_mut().map(|rule| &mut rule.actions));

            for chain in chains {
                for action in chain.iter_mut() {
                    let Some(name) = action.target_group_name.take() else {
                        continue;
                    };
                    if action.target_group_arn.is_some() {
                        continue;
                    }

                    let arn = match resolved.get(&name) {
                        Some(arn) => arn.clone(),
                        None => {
                            let arn = client.target_group_arn(&name).await?.ok_or_else(|| {
                                ModuleError::Configuration(format!(
                                    "Target group '{}' referenced on listener port {} does not exist",
                                    name, port
                                ))
                            })?;
                            tracing::debug!("Resolved target group {} to {}", name, arn);
                            resolved.insert(name, arn.clone());
                            arn
                        }
                    };
                    action.target_group_arn = Some(arn);
                }
            }
        }

        Ok(())
    }

    pub async fn execute_async(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let mut config = LoadBalancerConfig::from_params(params)?;
        if let Some(listeners) = &config.listeners {
            validate_listeners(listeners)?;
        }

        let client = self.client_for(&config).await?;
        let client = client.as_ref();
        let lb = Self::resolve_load_balancer(client, &config).await?;

        let Some(mut declared) = config.listeners.take() else {
            return Ok(ModuleOutput::ok(format!(
                "No listeners declared for load balancer '{}'",
                config.display_name()
            ))
            .with_data("load_balancer_arn", serde_json::json!(lb.load_balancer_arn)));
        };
        Self::resolve_target_groups(client, &mut declared).await?;

        let current_listeners = client.describe_listeners(&lb.load_balancer_arn).await?;
        let listener_changes = compare_listeners(&current_listeners, &declared);
        let mut changed = listener_changes.has_changes(config.purge_listeners);

        let created = apply_listener_changes(
            client,
            &lb.load_balancer_arn,
            &listener_changes,
            config.purge_listeners,
            context.check_mode,
        )
        .await?;

        let live_arns: IndexMap<u16, String> = current_listeners
            .iter()
            .filter_map(|l| l.listener_arn.clone().map(|arn| (l.port, arn)))
            .collect();

        let mut reports = Vec::with_capacity(declared.len());
        let mut before = String::new();
        let mut after = String::new();
        let mut warnings = Vec::new();

        for listener in &declared {
            let listener_arn = live_arns
                .get(&listener.port)
                .or_else(|| created.get(&listener.port))
                .cloned();

            // A listener that would be created in check mode has no live rules yet
            let current_rules = match &listener_arn {
                Some(arn) => client.describe_rules(arn).await?,
                None => Vec::new(),
            };
            let listener_arn = listener_arn.unwrap_or_default();

            let declared_rules = listener.declared_rules();
            let mut rule_changes = reconcile_rules(&listener_arn, &current_rules, &declared_rules);
            let listener_changed = apply_rule_changes(
                client,
                &listener_arn,
                &rule_changes,
                config.purge_rules,
                context.check_mode,
            )
            .await?;
            changed |= listener_changed;

            if context.diff_mode {
                before.push_str(&render_rules(listener.port, &comparable_rules(&current_rules)));
                after.push_str(&render_rules(
                    listener.port,
                    &comparable_declared_rules(&declared_rules, &current_rules),
                ));
            }

            if !config.purge_rules && !rule_changes.rules_to_delete.is_empty() {
                warnings.push(format!(
                    "Keeping {} undeclared rule(s) on listener port {}",
                    rule_changes.rules_to_delete.len(),
                    listener.port
                ));
                rule_changes.rules_to_delete.clear();
            }
            reports.push(ListenerReport {
                port: listener.port,
                listener_arn,
                changed: listener_changed,
                changes: rule_changes,
            });
        }

        let mut listeners_to_delete = listener_changes.listeners_to_delete.clone();
        if !config.purge_listeners && !listeners_to_delete.is_empty() {
            warnings.push(format!(
                "Keeping {} undeclared listener(s) on load balancer '{}'",
                listeners_to_delete.len(),
                config.display_name()
            ));
            listeners_to_delete.clear();
        }

        let name = config.display_name();
        let msg = match (changed, context.check_mode) {
            (false, _) => format!("Load balancer '{}' listeners are up to date", name),
            (true, true) => format!("Would update listeners of load balancer '{}'", name),
            (true, false) => format!("Updated listeners of load balancer '{}'", name),
        };

        let mut output = ModuleOutput::from_changed(changed, msg)
            .with_data("load_balancer_arn", serde_json::json!(lb.load_balancer_arn))
            .with_serialized("listeners_to_add", &listener_changes.listeners_to_add)?
            .with_serialized("listeners_to_modify", &listener_changes.listeners_to_modify)?
            .with_serialized("listeners_to_delete", &listeners_to_delete)?
            .with_serialized("listeners", &reports)?;
        for warning in warnings {
            output = output.with_warning(warning);
        }

        if context.diff_mode && changed {
            output = output.with_diff(rules_diff(&before, &after));
        }

        Ok(output)
    }
}

/// Live rules as compared: no ARNs, actions normalized
fn comparable_rules(rules: &[Rule]) -> Vec<Rule> {
    let mut view: Vec<Rule> = rules
        .iter()
        .map(|rule| Rule {
            priority: rule.priority,
            conditions: rule.conditions.iter().map(conditions::canonical).collect(),
            actions: actions::comparable_current(&rule.actions),
            rule_arn: None,
            is_default: false,
        })
        .collect();
    view.sort_by_key(|rule| rule.priority);
    view
}

/// Declared rules as compared against the live rule at the same priority
fn comparable_declared_rules(declared: &[Rule], current: &[Rule]) -> Vec<Rule> {
    let mut view: Vec<Rule> = declared
        .iter()
        .map(|rule| {
            let live_actions = current
                .iter()
                .find(|live| live.priority == rule.priority)
                .map(|live| actions::comparable_current(&live.actions))
                .unwrap_or_default();
            Rule {
                priority: rule.priority,
                conditions: rule.conditions.iter().map(conditions::canonical).collect(),
                actions: actions::comparable_declared(&rule.actions, &live_actions),
                rule_arn: None,
                is_default: false,
            }
        })
        .collect();
    view.sort_by_key(|rule| rule.priority);
    view
}

fn render_rules(port: u16, rules: &[Rule]) -> String {
    let body = serde_yaml::to_string(rules).unwrap_or_default();
    format!("# listener {}\n{}", port, body)
}

/// Unified-style diff of the rendered rule sets
fn rules_diff(before: &str, after: &str) -> Diff {
    let text_diff = TextDiff::from_lines(before, after);

    let mut details = String::new();
    let mut additions = 0;
    let mut deletions = 0;

    for change in text_diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => {
                deletions += 1;
                "-"
            }
            ChangeTag::Insert => {
                additions += 1;
                "+"
            }
            ChangeTag::Equal => " ",
        };
        details.push_str(&format!("{}{}", sign, change));
    }

    Diff::new(
        format!("{} rule lines", before.lines().count()),
        format!(
            "{} rule lines ({} additions, {} deletions)",
            after.lines().count(),
            additions,
            deletions
        ),
    )
    .with_details(details)
}

impl Module for ElbApplicationLbModule {
    fn name(&self) -> &'static str {
        "aws_elb_application_lb"
    }

    fn description(&self) -> &'static str {
        "Manage the listeners and listener rules of an AWS Application Load Balancer"
    }

    fn parallelization_hint(&self) -> ParallelizationHint {
        ParallelizationHint::RateLimited {
            requests_per_second: 10,
        }
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        let config = LoadBalancerConfig::from_params(params)?;
        if let Some(listeners) = &config.listeners {
            validate_listeners(listeners)?;
        }
        Ok(())
    }

    fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| ModuleError::ExecutionFailed("No tokio runtime available".to_string()))?;

        let params = params.clone();
        let context = context.clone();
        let module = self;

        std::thread::scope(|s| {
            s.spawn(|| handle.block_on(module.execute_async(&params, &context)))
                .join()
                .unwrap_or_else(|_| {
                    Err(ModuleError::ExecutionFailed(
                        "Module execution thread panicked".to_string(),
                    ))
                })
        })
    }
}
