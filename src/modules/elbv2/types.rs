//! Wire data model for ELBv2 listeners, rules, conditions and actions.
//!
//! Field names follow the AWS API (`PascalCase`), so declared rules written in
//! playbook YAML and rules read back from `DescribeRules` share one
//! representation.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Lowest and highest priority AWS accepts for a non-default rule.
pub const MIN_RULE_PRIORITY: u32 = 1;
pub const MAX_RULE_PRIORITY: u32 = 50_000;

// ============================================================================
// Priority
// ============================================================================

/// Evaluation priority of a listener rule.
///
/// AWS reports priorities as strings (`"1"`, `"default"`), while playbooks
/// usually give plain integers. Both forms deserialize into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RulePriority {
    /// The listener's fallback rule
    Default,
    /// A numbered rule, lower values are evaluated first
    Number(u32),
}

impl RulePriority {
    /// Returns the numeric priority, or `None` for the default rule
    pub fn number(self) -> Option<u32> {
        match self {
            RulePriority::Default => None,
            RulePriority::Number(n) => Some(n),
        }
    }

    pub fn is_default(self) -> bool {
        matches!(self, RulePriority::Default)
    }
}

impl fmt::Display for RulePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulePriority::Default => write!(f, "default"),
            RulePriority::Number(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for RulePriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("default") {
            return Ok(RulePriority::Default);
        }
        trimmed
            .parse::<u32>()
            .map(RulePriority::Number)
            .map_err(|_| format!("invalid rule priority '{}'", s))
    }
}

impl Serialize for RulePriority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RulePriority::Default => serializer.serialize_str("default"),
            RulePriority::Number(n) => serializer.serialize_u32(*n),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPriority {
    Number(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for RulePriority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawPriority::deserialize(deserializer)? {
            RawPriority::Number(n) => u32::try_from(n)
                .map(RulePriority::Number)
                .map_err(|_| de::Error::custom(format!("rule priority {} is out of range", n))),
            RawPriority::Text(s) => s.parse().map_err(de::Error::custom),
        }
    }
}

// ============================================================================
// Conditions
// ============================================================================

/// `{"Values": [...]}` payload shared by most condition configs
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ValuesConfig {
    #[serde(default)]
    pub values: Vec<String>,
}

/// Payload of an `http-header` condition
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HttpHeaderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_header_name: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
}

/// One `key=value` pair of a `query-string` condition
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryStringPair {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub value: String,
}

/// Payload of a `query-string` condition
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryStringConfig {
    #[serde(default)]
    pub values: Vec<QueryStringPair>,
}

/// A single match predicate of a rule.
///
/// The value payload arrives either as a flat `Values` list or nested under
/// a field specific `*Config` object. AWS echoes both shapes for
/// `host-header` and `path-pattern`; callers usually give just one. Use
/// [`Condition::value_set`] instead of reading the shapes directly.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Condition {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_header_config: Option<ValuesConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_pattern_config: Option<ValuesConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_header_config: Option<HttpHeaderConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_request_method_config: Option<ValuesConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_string_config: Option<QueryStringConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip_config: Option<ValuesConfig>,
}

/// Order-insensitive view of a condition's values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionValues<'a> {
    Strings(BTreeSet<&'a str>),
    Pairs(BTreeSet<&'a QueryStringPair>),
}

impl Condition {
    /// Flat `{"Field": .., "Values": [..]}` condition
    pub fn with_values<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: field.into(),
            values: Some(values.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// The effective value list, whichever wire shape carries it.
    ///
    /// A nested `*Config.Values` list wins over the flat `Values` list; a
    /// condition with neither yields an empty string set.
    pub fn value_set(&self) -> ConditionValues<'_> {
        if let Some(query) = &self.query_string_config {
            return ConditionValues::Pairs(query.values.iter().collect());
        }

        let nested = self
            .host_header_config
            .as_ref()
            .or(self.path_pattern_config.as_ref())
            .or(self.http_request_method_config.as_ref())
            .or(self.source_ip_config.as_ref())
            .map(|config| config.values.as_slice())
            .or_else(|| {
                self.http_header_config
                    .as_ref()
                    .map(|config| config.values.as_slice())
            });

        let values = nested
            .or(self.values.as_deref())
            .unwrap_or_default();
        ConditionValues::Strings(values.iter().map(String::as_str).collect())
    }

    /// Header name of an `http-header` condition
    pub fn http_header_name(&self) -> Option<&str> {
        self.http_header_config
            .as_ref()
            .and_then(|config| config.http_header_name.as_deref())
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Discriminator of a rule action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    Forward,
    Redirect,
    FixedResponse,
    AuthenticateOidc,
    AuthenticateCognito,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Forward => "forward",
            ActionType::Redirect => "redirect",
            ActionType::FixedResponse => "fixed-response",
            ActionType::AuthenticateOidc => "authenticate-oidc",
            ActionType::AuthenticateCognito => "authenticate-cognito",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(ActionType::Forward),
            "redirect" => Ok(ActionType::Redirect),
            "fixed-response" => Ok(ActionType::FixedResponse),
            "authenticate-oidc" => Ok(ActionType::AuthenticateOidc),
            "authenticate-cognito" => Ok(ActionType::AuthenticateCognito),
            other => Err(format!("unsupported action type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TargetGroupTuple {
    pub target_group_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TargetGroupStickinessConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ForwardConfig {
    #[serde(default)]
    pub target_groups: Vec<TargetGroupTuple>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_group_stickiness_config: Option<TargetGroupStickinessConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RedirectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub status_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FixedResponseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_body: Option<String>,
    pub status_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// `authenticate-oidc` payload.
///
/// `ClientSecret` is write-only: AWS never returns it and reports
/// `UseExistingClientSecret` instead. The secret is never serialized, so
/// module output and plans cannot leak it.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthenticateOidcConfig {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub user_info_endpoint: String,
    pub client_id: String,
    #[serde(default, skip_serializing)]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_cookie_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_timeout: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_request_extra_params: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_unauthenticated_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_existing_client_secret: Option<bool>,
}

impl fmt::Debug for AuthenticateOidcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticateOidcConfig")
            .field("issuer", &self.issuer)
            .field("authorization_endpoint", &self.authorization_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("user_info_endpoint", &self.user_info_endpoint)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("session_cookie_name", &self.session_cookie_name)
            .field("scope", &self.scope)
            .field("session_timeout", &self.session_timeout)
            .field(
                "authentication_request_extra_params",
                &self.authentication_request_extra_params,
            )
            .field("on_unauthenticated_request", &self.on_unauthenticated_request)
            .field("use_existing_client_secret", &self.use_existing_client_secret)
            .finish()
    }
}

impl AuthenticateOidcConfig {
    /// Whether the caller supplied secret material
    pub fn has_client_secret(&self) -> bool {
        self.client_secret.as_deref().is_some_and(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthenticateCognitoConfig {
    pub user_pool_arn: String,
    pub user_pool_client_id: String,
    pub user_pool_domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_cookie_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_timeout: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_request_extra_params: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_unauthenticated_request: Option<String>,
}

/// One step of a rule's action chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Action {
    #[serde(rename = "Type")]
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_group_arn: Option<String>,
    /// Resolved to `TargetGroupArn` before reconciliation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_config: Option<ForwardConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_config: Option<RedirectConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_response_config: Option<FixedResponseConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticate_oidc_config: Option<AuthenticateOidcConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticate_cognito_config: Option<AuthenticateCognitoConfig>,
}

impl Action {
    fn empty(action_type: ActionType) -> Self {
        Self {
            action_type,
            order: None,
            target_group_arn: None,
            target_group_name: None,
            forward_config: None,
            redirect_config: None,
            fixed_response_config: None,
            authenticate_oidc_config: None,
            authenticate_cognito_config: None,
        }
    }

    /// Simple forward to a single target group
    pub fn forward(target_group_arn: impl Into<String>) -> Self {
        Self {
            target_group_arn: Some(target_group_arn.into()),
            ..Self::empty(ActionType::Forward)
        }
    }

    pub fn redirect(config: RedirectConfig) -> Self {
        Self {
            redirect_config: Some(config),
            ..Self::empty(ActionType::Redirect)
        }
    }

    pub fn fixed_response(config: FixedResponseConfig) -> Self {
        Self {
            fixed_response_config: Some(config),
            ..Self::empty(ActionType::FixedResponse)
        }
    }

    pub fn authenticate_oidc(config: AuthenticateOidcConfig) -> Self {
        Self {
            authenticate_oidc_config: Some(config),
            ..Self::empty(ActionType::AuthenticateOidc)
        }
    }

    pub fn authenticate_cognito(config: AuthenticateCognitoConfig) -> Self {
        Self {
            authenticate_cognito_config: Some(config),
            ..Self::empty(ActionType::AuthenticateCognito)
        }
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }
}

// ============================================================================
// Rules and listeners
// ============================================================================

/// A listener rule, either declared by the caller or read back from AWS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Rule {
    pub priority: RulePriority,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_arn: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_default: bool,
}

impl Rule {
    pub fn new(priority: u32, conditions: Vec<Condition>, actions: Vec<Action>) -> Self {
        Self {
            priority: RulePriority::Number(priority),
            conditions,
            actions,
            rule_arn: None,
            is_default: false,
        }
    }

    /// The listener's fallback rule carrying only actions
    pub fn default_rule(actions: Vec<Action>) -> Self {
        Self {
            priority: RulePriority::Default,
            conditions: Vec::new(),
            actions,
            rule_arn: None,
            is_default: true,
        }
    }

    pub fn with_arn(mut self, rule_arn: impl Into<String>) -> Self {
        self.rule_arn = Some(rule_arn.into());
        self
    }

    /// True for the listener's fallback rule, however AWS flagged it
    pub fn is_default_rule(&self) -> bool {
        self.is_default || self.priority.is_default()
    }
}

/// Listener protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListenerProtocol {
    Http,
    Https,
    Tcp,
    Tls,
    Udp,
    TcpUdp,
    Geneve,
}

impl ListenerProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            ListenerProtocol::Http => "HTTP",
            ListenerProtocol::Https => "HTTPS",
            ListenerProtocol::Tcp => "TCP",
            ListenerProtocol::Tls => "TLS",
            ListenerProtocol::Udp => "UDP",
            ListenerProtocol::TcpUdp => "TCP_UDP",
            ListenerProtocol::Geneve => "GENEVE",
        }
    }

    /// Protocols that terminate TLS and therefore need a certificate
    pub fn requires_certificate(self) -> bool {
        matches!(self, ListenerProtocol::Https | ListenerProtocol::Tls)
    }
}

impl fmt::Display for ListenerProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListenerProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "HTTP" => Ok(ListenerProtocol::Http),
            "HTTPS" => Ok(ListenerProtocol::Https),
            "TCP" => Ok(ListenerProtocol::Tcp),
            "TLS" => Ok(ListenerProtocol::Tls),
            "UDP" => Ok(ListenerProtocol::Udp),
            "TCP_UDP" => Ok(ListenerProtocol::TcpUdp),
            "GENEVE" => Ok(ListenerProtocol::Geneve),
            other => Err(format!("unsupported listener protocol '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Certificate {
    pub certificate_arn: String,
}

/// A load balancer listener.
///
/// `Rules` is only meaningful on declared listeners; live listeners carry
/// their rules separately (see `Elbv2Api::describe_rules`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Listener {
    pub port: u16,
    pub protocol: ListenerProtocol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<Certificate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alpn_policy: Vec<String>,
    #[serde(default)]
    pub default_actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listener_arn: Option<String>,
}

impl Listener {
    pub fn new(port: u16, protocol: ListenerProtocol, default_actions: Vec<Action>) -> Self {
        Self {
            port,
            protocol,
            ssl_policy: None,
            certificates: Vec::new(),
            alpn_policy: Vec::new(),
            default_actions,
            rules: Vec::new(),
            listener_arn: None,
        }
    }

    /// Declared rules plus the default rule built from `DefaultActions`
    pub fn declared_rules(&self) -> Vec<Rule> {
        let mut rules = self.rules.clone();
        if !self.default_actions.is_empty() && !rules.iter().any(Rule::is_default_rule) {
            rules.push(Rule::default_rule(self.default_actions.clone()));
        }
        rules
    }
}

/// Load balancer identity as returned by `DescribeLoadBalancers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerInfo {
    pub load_balancer_arn: String,
    pub load_balancer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancer_type: Option<String>,
}
