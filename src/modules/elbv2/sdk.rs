//! [`Elbv2Api`] backed by the official AWS SDK for Rust.
//!
//! Credentials come from the standard AWS credential chain; the region from
//! the module parameter, `AWS_REGION`/`AWS_DEFAULT_REGION`, or `~/.aws/config`.

use super::client::Elbv2Api;
use super::compare::RulePatch;
use super::listeners::ListenerModification;
use super::reconcile::{NewRule, PriorityChange};
use super::types::{
    Action, ActionType, AuthenticateCognitoConfig, AuthenticateOidcConfig, Certificate,
    Condition, FixedResponseConfig, ForwardConfig, HttpHeaderConfig, Listener, LoadBalancerInfo,
    QueryStringConfig, QueryStringPair, RedirectConfig, Rule, RulePriority,
    TargetGroupStickinessConfig, TargetGroupTuple, ValuesConfig,
};
use crate::modules::{ModuleError, ModuleResult};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_elasticloadbalancingv2::types as sdk;
use aws_sdk_elasticloadbalancingv2::Client;

/// ELBv2 client for one region
pub struct SdkElbv2Client {
    client: Client,
}

impl SdkElbv2Client {
    /// Create an ELBv2 client from the ambient AWS configuration
    pub async fn from_env(region: Option<&str>, endpoint_url: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region_str) = region {
            loader = loader.region(aws_sdk_elasticloadbalancingv2::config::Region::new(
                region_str.to_string(),
            ));
        }
        if let Some(url) = endpoint_url {
            loader = loader.endpoint_url(url);
        }
        let config = loader.load().await;

        Self {
            client: Client::new(&config),
        }
    }
}

fn build_error(err: impl std::fmt::Display) -> ModuleError {
    ModuleError::InvalidParameter(format!("Invalid ELBv2 request: {}", err))
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}

// ============================================================================
// SDK -> wire model
// ============================================================================

fn condition_from_sdk(condition: &sdk::RuleCondition) -> Condition {
    Condition {
        field: condition.field().unwrap_or_default().to_string(),
        values: non_empty(condition.values()),
        host_header_config: condition.host_header_config().map(|config| ValuesConfig {
            values: config.values().to_vec(),
        }),
        path_pattern_config: condition.path_pattern_config().map(|config| ValuesConfig {
            values: config.values().to_vec(),
        }),
        http_header_config: condition.http_header_config().map(|config| HttpHeaderConfig {
            http_header_name: config.http_header_name().map(str::to_string),
            values: config.values().to_vec(),
        }),
        http_request_method_config: condition.http_request_method_config().map(|config| {
            ValuesConfig {
                values: config.values().to_vec(),
            }
        }),
        query_string_config: condition.query_string_config().map(|config| QueryStringConfig {
            values: config
                .values()
                .iter()
                .map(|pair| QueryStringPair {
                    key: pair.key().map(str::to_string),
                    value: pair.value().unwrap_or_default().to_string(),
                })
                .collect(),
        }),
        source_ip_config: condition.source_ip_config().map(|config| ValuesConfig {
            values: config.values().to_vec(),
        }),
    }
}

fn action_from_sdk(action: &sdk::Action) -> ModuleResult<Action> {
    let action_type: ActionType = action
        .r#type()
        .as_str()
        .parse()
        .map_err(ModuleError::ExecutionFailed)?;

    Ok(Action {
        action_type,
        order: action.order().and_then(|order| u32::try_from(order).ok()),
        target_group_arn: action.target_group_arn().map(str::to_string),
        target_group_name: None,
        forward_config: action.forward_config().map(|forward| ForwardConfig {
            target_groups: forward
                .target_groups()
                .iter()
                .map(|group| TargetGroupTuple {
                    target_group_arn: group.target_group_arn().unwrap_or_default().to_string(),
                    weight: group.weight(),
                })
                .collect(),
            target_group_stickiness_config: forward.target_group_stickiness_config().map(
                |stickiness| TargetGroupStickinessConfig {
                    enabled: stickiness.enabled().unwrap_or(false),
                    duration_seconds: stickiness.duration_seconds(),
                },
            ),
        }),
        redirect_config: action.redirect_config().map(|redirect| RedirectConfig {
            protocol: redirect.protocol().map(str::to_string),
            port: redirect.port().map(str::to_string),
            host: redirect.host().map(str::to_string),
            path: redirect.path().map(str::to_string),
            query: redirect.query().map(str::to_string),
            status_code: redirect.status_code().as_str().to_string(),
        }),
        fixed_response_config: action
            .fixed_response_config()
            .map(|fixed| FixedResponseConfig {
                message_body: fixed.message_body().map(str::to_string),
                status_code: fixed.status_code().to_string(),
                content_type: fixed.content_type().map(str::to_string),
            }),
        authenticate_oidc_config: action.authenticate_oidc_config().map(|oidc| {
            AuthenticateOidcConfig {
                issuer: oidc.issuer().to_string(),
                authorization_endpoint: oidc.authorization_endpoint().to_string(),
                token_endpoint: oidc.token_endpoint().to_string(),
                user_info_endpoint: oidc.user_info_endpoint().to_string(),
                client_id: oidc.client_id().to_string(),
                client_secret: None,
                session_cookie_name: oidc.session_cookie_name().map(str::to_string),
                scope: oidc.scope().map(str::to_string),
                session_timeout: oidc.session_timeout(),
                authentication_request_extra_params: oidc
                    .authentication_request_extra_params()
                    .map(|params| params.clone().into_iter().collect()),
                on_unauthenticated_request: oidc
                    .on_unauthenticated_request()
                    .map(|behavior| behavior.as_str().to_string()),
                use_existing_client_secret: oidc.use_existing_client_secret(),
            }
        }),
        authenticate_cognito_config: action.authenticate_cognito_config().map(|cognito| {
            AuthenticateCognitoConfig {
                user_pool_arn: cognito.user_pool_arn().to_string(),
                user_pool_client_id: cognito.user_pool_client_id().to_string(),
                user_pool_domain: cognito.user_pool_domain().to_string(),
                session_cookie_name: cognito.session_cookie_name().map(str::to_string),
                scope: cognito.scope().map(str::to_string),
                session_timeout: cognito.session_timeout(),
                authentication_request_extra_params: cognito
                    .authentication_request_extra_params()
                    .map(|params| params.clone().into_iter().collect()),
                on_unauthenticated_request: cognito
                    .on_unauthenticated_request()
                    .map(|behavior| behavior.as_str().to_string()),
            }
        }),
    })
}

fn rule_from_sdk(rule: &sdk::Rule) -> ModuleResult<Rule> {
    let priority = rule
        .priority()
        .unwrap_or("default")
        .parse::<RulePriority>()
        .map_err(ModuleError::ExecutionFailed)?;

    Ok(Rule {
        priority,
        conditions: rule.conditions().iter().map(condition_from_sdk).collect(),
        actions: rule
            .actions()
            .iter()
            .map(action_from_sdk)
            .collect::<ModuleResult<_>>()?,
        rule_arn: rule.rule_arn().map(str::to_string),
        is_default: rule.is_default().unwrap_or(false),
    })
}

fn listener_from_sdk(listener: &sdk::Listener) -> ModuleResult<Listener> {
    let port = listener
        .port()
        .and_then(|port| u16::try_from(port).ok())
        .ok_or_else(|| ModuleError::ExecutionFailed("Listener without a valid port".to_string()))?;
    let protocol = listener
        .protocol()
        .map(|protocol| protocol.as_str())
        .unwrap_or_default()
        .parse()
        .map_err(ModuleError::ExecutionFailed)?;

    Ok(Listener {
        port,
        protocol,
        ssl_policy: listener.ssl_policy().map(str::to_string),
        certificates: listener
            .certificates()
            .iter()
            .filter_map(|cert| cert.certificate_arn())
            .map(|arn| Certificate {
                certificate_arn: arn.to_string(),
            })
            .collect(),
        alpn_policy: listener.alpn_policy().to_vec(),
        default_actions: listener
            .default_actions()
            .iter()
            .map(action_from_sdk)
            .collect::<ModuleResult<_>>()?,
        rules: Vec::new(),
        listener_arn: listener.listener_arn().map(str::to_string),
    })
}

// ============================================================================
// Wire model -> SDK
// ============================================================================

fn values_config(config: &ValuesConfig) -> Vec<String> {
    config.values.clone()
}

fn condition_to_sdk(condition: &Condition) -> sdk::RuleCondition {
    sdk::RuleCondition::builder()
        .field(&condition.field)
        .set_values(condition.values.clone())
        .set_host_header_config(condition.host_header_config.as_ref().map(|config| {
            sdk::HostHeaderConditionConfig::builder()
                .set_values(Some(values_config(config)))
                .build()
        }))
        .set_path_pattern_config(condition.path_pattern_config.as_ref().map(|config| {
            sdk::PathPatternConditionConfig::builder()
                .set_values(Some(values_config(config)))
                .build()
        }))
        .set_http_header_config(condition.http_header_config.as_ref().map(|config| {
            sdk::HttpHeaderConditionConfig::builder()
                .set_http_header_name(config.http_header_name.clone())
                .set_values(Some(config.values.clone()))
                .build()
        }))
        .set_http_request_method_config(condition.http_request_method_config.as_ref().map(
            |config| {
                sdk::HttpRequestMethodConditionConfig::builder()
                    .set_values(Some(values_config(config)))
                    .build()
            },
        ))
        .set_query_string_config(condition.query_string_config.as_ref().map(|config| {
            sdk::QueryStringConditionConfig::builder()
                .set_values(Some(
                    config
                        .values
                        .iter()
                        .map(|pair| {
                            sdk::QueryStringKeyValuePair::builder()
                                .set_key(pair.key.clone())
                                .value(&pair.value)
                                .build()
                        })
                        .collect(),
                ))
                .build()
        }))
        .set_source_ip_config(condition.source_ip_config.as_ref().map(|config| {
            sdk::SourceIpConditionConfig::builder()
                .set_values(Some(values_config(config)))
                .build()
        }))
        .build()
}

fn action_to_sdk(action: &Action) -> ModuleResult<sdk::Action> {
    let mut builder = sdk::Action::builder()
        .r#type(sdk::ActionTypeEnum::from(action.action_type.as_str()))
        .set_order(action.order.map(to_i32))
        .set_target_group_arn(action.target_group_arn.clone());

    if let Some(forward) = &action.forward_config {
        builder = builder.forward_config(
            sdk::ForwardActionConfig::builder()
                .set_target_groups(Some(
                    forward
                        .target_groups
                        .iter()
                        .map(|group| {
                            sdk::TargetGroupTuple::builder()
                                .target_group_arn(&group.target_group_arn)
                                .set_weight(group.weight)
                                .build()
                        })
                        .collect(),
                ))
                .set_target_group_stickiness_config(
                    forward
                        .target_group_stickiness_config
                        .as_ref()
                        .map(|stickiness| {
                            sdk::TargetGroupStickinessConfig::builder()
                                .enabled(stickiness.enabled)
                                .set_duration_seconds(stickiness.duration_seconds)
                                .build()
                        }),
                )
                .build(),
        );
    }

    if let Some(redirect) = &action.redirect_config {
        builder = builder.redirect_config(
            sdk::RedirectActionConfig::builder()
                .set_protocol(redirect.protocol.clone())
                .set_port(redirect.port.clone())
                .set_host(redirect.host.clone())
                .set_path(redirect.path.clone())
                .set_query(redirect.query.clone())
                .status_code(sdk::RedirectActionStatusCodeEnum::from(
                    redirect.status_code.as_str(),
                ))
                .build()
                .map_err(build_error)?,
        );
    }

    if let Some(fixed) = &action.fixed_response_config {
        builder = builder.fixed_response_config(
            sdk::FixedResponseActionConfig::builder()
                .set_message_body(fixed.message_body.clone())
                .status_code(&fixed.status_code)
                .set_content_type(fixed.content_type.clone())
                .build()
                .map_err(build_error)?,
        );
    }

    if let Some(oidc) = &action.authenticate_oidc_config {
        builder = builder.authenticate_oidc_config(
            sdk::AuthenticateOidcActionConfig::builder()
                .issuer(&oidc.issuer)
                .authorization_endpoint(&oidc.authorization_endpoint)
                .token_endpoint(&oidc.token_endpoint)
                .user_info_endpoint(&oidc.user_info_endpoint)
                .client_id(&oidc.client_id)
                .set_client_secret(oidc.client_secret.clone())
                .set_session_cookie_name(oidc.session_cookie_name.clone())
                .set_scope(oidc.scope.clone())
                .set_session_timeout(oidc.session_timeout)
                .set_authentication_request_extra_params(
                    oidc.authentication_request_extra_params
                        .clone()
                        .map(|params| params.into_iter().collect()),
                )
                .set_on_unauthenticated_request(
                    oidc.on_unauthenticated_request
                        .as_deref()
                        .map(sdk::AuthenticateOidcActionConditionalBehaviorEnum::from),
                )
                .set_use_existing_client_secret(oidc.use_existing_client_secret)
                .build()
                .map_err(build_error)?,
        );
    }

    if let Some(cognito) = &action.authenticate_cognito_config {
        builder = builder.authenticate_cognito_config(
            sdk::AuthenticateCognitoActionConfig::builder()
                .user_pool_arn(&cognito.user_pool_arn)
                .user_pool_client_id(&cognito.user_pool_client_id)
                .user_pool_domain(&cognito.user_pool_domain)
                .set_session_cookie_name(cognito.session_cookie_name.clone())
                .set_scope(cognito.scope.clone())
                .set_session_timeout(cognito.session_timeout)
                .set_authentication_request_extra_params(
                    cognito
                        .authentication_request_extra_params
                        .clone()
                        .map(|params| params.into_iter().collect()),
                )
                .set_on_unauthenticated_request(
                    cognito
                        .on_unauthenticated_request
                        .as_deref()
                        .map(sdk::AuthenticateCognitoActionConditionalBehaviorEnum::from),
                )
                .build()
                .map_err(build_error)?,
        );
    }

    builder.build().map_err(build_error)
}

fn actions_to_sdk(actions: &[Action]) -> ModuleResult<Vec<sdk::Action>> {
    actions.iter().map(action_to_sdk).collect()
}

fn certificates_to_sdk(certificates: &[Certificate]) -> Vec<sdk::Certificate> {
    certificates
        .iter()
        .map(|cert| {
            sdk::Certificate::builder()
                .certificate_arn(&cert.certificate_arn)
                .build()
        })
        .collect()
}

#[async_trait]
impl Elbv2Api for SdkElbv2Client {
    async fn find_load_balancer(&self, name: &str) -> ModuleResult<Option<LoadBalancerInfo>> {
        let resp = match self.client.describe_load_balancers().names(name).send().await {
            Ok(resp) => resp,
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_load_balancer_not_found_exception()) =>
            {
                return Ok(None);
            }
            Err(err) => {
                return Err(ModuleError::ExecutionFailed(format!(
                    "Failed to describe load balancer '{}': {}",
                    name, err
                )))
            }
        };

        Ok(resp.load_balancers().first().map(|lb| LoadBalancerInfo {
            load_balancer_arn: lb.load_balancer_arn().unwrap_or_default().to_string(),
            load_balancer_name: lb.load_balancer_name().unwrap_or_default().to_string(),
            load_balancer_type: lb.r#type().map(|t| t.as_str().to_string()),
        }))
    }

    async fn describe_listeners(&self, load_balancer_arn: &str) -> ModuleResult<Vec<Listener>> {
        let mut listeners = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let resp = self
                .client
                .describe_listeners()
                .load_balancer_arn(load_balancer_arn)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| {
                    ModuleError::ExecutionFailed(format!("Failed to describe listeners: {}", e))
                })?;

            for listener in resp.listeners() {
                listeners.push(listener_from_sdk(listener)?);
            }

            marker = resp.next_marker().map(str::to_string);
            if marker.is_none() {
                break;
            }
        }

        Ok(listeners)
    }

    async fn describe_rules(&self, listener_arn: &str) -> ModuleResult<Vec<Rule>> {
        let mut rules = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let resp = self
                .client
                .describe_rules()
                .listener_arn(listener_arn)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| {
                    ModuleError::ExecutionFailed(format!("Failed to describe rules: {}", e))
                })?;

            for rule in resp.rules() {
                rules.push(rule_from_sdk(rule)?);
            }

            marker = resp.next_marker().map(str::to_string);
            if marker.is_none() {
                break;
            }
        }

        Ok(rules)
    }

    async fn target_group_arn(&self, name: &str) -> ModuleResult<Option<String>> {
        match self.client.describe_target_groups().names(name).send().await {
            Ok(resp) => Ok(resp
                .target_groups()
                .first()
                .and_then(|tg| tg.target_group_arn())
                .map(str::to_string)),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_target_group_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(err) => Err(ModuleError::ExecutionFailed(format!(
                "Failed to describe target group '{}': {}",
                name, err
            ))),
        }
    }

    async fn create_listener(
        &self,
        load_balancer_arn: &str,
        listener: &Listener,
    ) -> ModuleResult<String> {
        let certificates = certificates_to_sdk(&listener.certificates);
        let resp = self
            .client
            .create_listener()
            .load_balancer_arn(load_balancer_arn)
            .port(i32::from(listener.port))
            .protocol(sdk::ProtocolEnum::from(listener.protocol.as_str()))
            .set_ssl_policy(listener.ssl_policy.clone())
            .set_certificates(if certificates.is_empty() {
                None
            } else {
                Some(certificates)
            })
            .set_alpn_policy(non_empty(&listener.alpn_policy))
            .set_default_actions(Some(actions_to_sdk(&listener.default_actions)?))
            .send()
            .await
            .map_err(|e| {
                ModuleError::ExecutionFailed(format!(
                    "Failed to create listener on port {}: {}",
                    listener.port, e
                ))
            })?;

        Ok(resp
            .listeners()
            .first()
            .and_then(|l| l.listener_arn())
            .unwrap_or_default()
            .to_string())
    }

    async fn modify_listener(&self, modification: &ListenerModification) -> ModuleResult<()> {
        self.client
            .modify_listener()
            .listener_arn(&modification.listener_arn)
            .port(i32::from(modification.port))
            .set_protocol(
                modification
                    .protocol
                    .map(|protocol| sdk::ProtocolEnum::from(protocol.as_str())),
            )
            .set_ssl_policy(modification.ssl_policy.clone())
            .set_certificates(
                modification
                    .certificates
                    .as_deref()
                    .map(certificates_to_sdk),
            )
            .set_alpn_policy(modification.alpn_policy.clone())
            .send()
            .await
            .map_err(|e| {
                ModuleError::ExecutionFailed(format!(
                    "Failed to modify listener {}: {}",
                    modification.listener_arn, e
                ))
            })?;
        Ok(())
    }

    async fn modify_default_actions(
        &self,
        listener_arn: &str,
        actions: &[Action],
    ) -> ModuleResult<()> {
        self.client
            .modify_listener()
            .listener_arn(listener_arn)
            .set_default_actions(Some(actions_to_sdk(actions)?))
            .send()
            .await
            .map_err(|e| {
                ModuleError::ExecutionFailed(format!(
                    "Failed to modify default actions of listener {}: {}",
                    listener_arn, e
                ))
            })?;
        Ok(())
    }

    async fn delete_listener(&self, listener_arn: &str) -> ModuleResult<()> {
        self.client
            .delete_listener()
            .listener_arn(listener_arn)
            .send()
            .await
            .map_err(|e| {
                ModuleError::ExecutionFailed(format!(
                    "Failed to delete listener {}: {}",
                    listener_arn, e
                ))
            })?;
        Ok(())
    }

    async fn create_rule(&self, rule: &NewRule) -> ModuleResult<String> {
        let resp = self
            .client
            .create_rule()
            .listener_arn(&rule.listener_arn)
            .priority(to_i32(rule.priority))
            .set_conditions(Some(rule.conditions.iter().map(condition_to_sdk).collect()))
            .set_actions(Some(actions_to_sdk(&rule.actions)?))
            .send()
            .await
            .map_err(|e| {
                ModuleError::ExecutionFailed(format!(
                    "Failed to create rule at priority {}: {}",
                    rule.priority, e
                ))
            })?;

        Ok(resp
            .rules()
            .first()
            .and_then(|r| r.rule_arn())
            .unwrap_or_default()
            .to_string())
    }

    async fn modify_rule(&self, rule_arn: &str, patch: &RulePatch) -> ModuleResult<()> {
        let actions = match &patch.actions {
            Some(actions) => Some(actions_to_sdk(actions)?),
            None => None,
        };

        self.client
            .modify_rule()
            .rule_arn(rule_arn)
            .set_conditions(
                patch
                    .conditions
                    .as_ref()
                    .map(|conditions| conditions.iter().map(condition_to_sdk).collect()),
            )
            .set_actions(actions)
            .send()
            .await
            .map_err(|e| {
                ModuleError::ExecutionFailed(format!("Failed to modify rule {}: {}", rule_arn, e))
            })?;
        Ok(())
    }

    async fn set_rule_priorities(&self, changes: Vec<PriorityChange>) -> ModuleResult<()> {
        let pairs = changes
            .iter()
            .map(|change| {
                sdk::RulePriorityPair::builder()
                    .rule_arn(&change.rule_arn)
                    .priority(to_i32(change.priority))
                    .build()
            })
            .collect();

        self.client
            .set_rule_priorities()
            .set_rule_priorities(Some(pairs))
            .send()
            .await
            .map_err(|e| {
                ModuleError::ExecutionFailed(format!("Failed to set rule priorities: {}", e))
            })?;
        Ok(())
    }

    async fn delete_rule(&self, rule_arn: &str) -> ModuleResult<()> {
        self.client
            .delete_rule()
            .rule_arn(rule_arn)
            .send()
            .await
            .map_err(|e| {
                ModuleError::ExecutionFailed(format!("Failed to delete rule {}: {}", rule_arn, e))
            })?;
        Ok(())
    }
}
