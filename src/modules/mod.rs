//! Module system for rustible-elbv2
//!
//! A module reads declared parameters, diffs them against what AWS reports
//! and converges the live resources. Every run produces a [`ModuleOutput`]
//! that says whether anything changed (or would change in check mode).

pub mod elbv2;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during module execution
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// Declared listeners or rules that can never converge, caught before
    /// any AWS call is made
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An AWS call failed or returned something unusable
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Failed to serialize module output: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

pub type ModuleResult<T> = Result<T, ModuleError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    Ok,
    /// Live state was changed, or would be in check mode
    Changed,
    Failed,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ModuleStatus::Ok => "ok",
            ModuleStatus::Changed => "changed",
            ModuleStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// How callers may fan out many invocations of one module.
///
/// The ELBv2 control plane throttles per account and region, so modules
/// talking to it report `RateLimited`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParallelizationHint {
    #[default]
    FullyParallel,
    RateLimited {
        /// Budget shared by every concurrent invocation
        requests_per_second: u32,
    },
}

/// Rendered before/after state of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diff {
    pub before: String,
    pub after: String,
    /// Line diff between `before` and `after`, when one was computed
    pub details: Option<String>,
}

impl Diff {
    pub fn new(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            before: before.into(),
            after: after.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// What a module reports back, serialized as the JSON result of `run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleOutput {
    pub changed: bool,
    pub msg: String,
    pub status: ModuleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<Diff>,
    /// Non-fatal notices, e.g. undeclared resources left in place
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,
}

impl ModuleOutput {
    fn with_status(msg: impl Into<String>, status: ModuleStatus) -> Self {
        Self {
            changed: status == ModuleStatus::Changed,
            msg: msg.into(),
            status,
            diff: None,
            warnings: Vec::new(),
            data: HashMap::new(),
        }
    }

    pub fn ok(msg: impl Into<String>) -> Self {
        Self::with_status(msg, ModuleStatus::Ok)
    }

    pub fn changed(msg: impl Into<String>) -> Self {
        Self::with_status(msg, ModuleStatus::Changed)
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self::with_status(msg, ModuleStatus::Failed)
    }

    /// `changed` or `ok` depending on the flag
    pub fn from_changed(changed: bool, msg: impl Into<String>) -> Self {
        if changed {
            Self::changed(msg)
        } else {
            Self::ok(msg)
        }
    }

    pub fn with_diff(mut self, diff: Diff) -> Self {
        self.diff = Some(diff);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Serialize `value` into the data map under `key`
    pub fn with_serialized<T: Serialize + ?Sized>(
        self,
        key: impl Into<String>,
        value: &T,
    ) -> ModuleResult<Self> {
        let value = serde_json::to_value(value)?;
        Ok(self.with_data(key, value))
    }
}

/// Raw module parameters, as loaded from a JSON or YAML mapping
pub type ModuleParams = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, Default)]
pub struct ModuleContext {
    /// Compute and report changes without calling any mutating API
    pub check_mode: bool,
    /// Attach a rendered [`Diff`] to changed outputs
    pub diff_mode: bool,
}

impl ModuleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    pub fn with_diff_mode(mut self, diff_mode: bool) -> Self {
        self.diff_mode = diff_mode;
        self
    }
}

/// A named, idempotent unit of convergence.
pub trait Module: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn parallelization_hint(&self) -> ParallelizationHint {
        ParallelizationHint::FullyParallel
    }

    fn execute(&self, params: &ModuleParams, context: &ModuleContext)
        -> ModuleResult<ModuleOutput>;

    /// Dry run; modules with a cheaper planning path may override this
    fn check(&self, params: &ModuleParams, context: &ModuleContext) -> ModuleResult<ModuleOutput> {
        self.execute(params, &context.clone().with_check_mode(true))
    }

    /// Reject parameters before the module touches AWS
    fn validate_params(&self, _params: &ModuleParams) -> ModuleResult<()> {
        Ok(())
    }

    fn required_params(&self) -> &[&'static str] {
        &[]
    }
}

/// Typed access to [`ModuleParams`]. Absent and `null` keys both read as `None`.
pub trait ParamExt {
    fn get_string(&self, key: &str) -> ModuleResult<Option<String>>;
    fn get_bool(&self, key: &str) -> ModuleResult<Option<bool>>;
    /// Deserialize a structured parameter such as a list of listeners
    fn get_typed<T: DeserializeOwned>(&self, key: &str) -> ModuleResult<Option<T>>;
}

impl ParamExt for ModuleParams {
    fn get_string(&self, key: &str) -> ModuleResult<Option<String>> {
        match self.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
            Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
            Some(_) => Err(ModuleError::InvalidParameter(format!(
                "{} must be a string",
                key
            ))),
        }
    }

    fn get_bool(&self, key: &str) -> ModuleResult<Option<bool>> {
        let parsed = match self.get(key) {
            None | Some(serde_json::Value::Null) => return Ok(None),
            Some(serde_json::Value::Bool(b)) => Some(*b),
            Some(serde_json::Value::String(s)) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            Some(_) => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| ModuleError::InvalidParameter(format!("{} must be a boolean", key)))
    }

    fn get_typed<T: DeserializeOwned>(&self, key: &str) -> ModuleResult<Option<T>> {
        match self.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| ModuleError::InvalidParameter(format!("{}: {}", key, e))),
        }
    }
}

/// Modules addressable by name from the CLI.
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn Module>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(elbv2::ElbApplicationLbModule::new()));
        registry
    }

    pub fn register(&mut self, module: Arc<dyn Module>) {
        self.modules.insert(module.name().to_string(), module);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Registered module names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Look up `name`, check its required parameters, then run or dry-run it
    pub fn execute(
        &self,
        name: &str,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let module = self.get(name).ok_or_else(|| {
            ModuleError::NotFound(format!("{} (available: {})", name, self.names().join(", ")))
        })?;

        if let Some(missing) = module
            .required_params()
            .iter()
            .find(|param| matches!(params.get(**param), None | Some(serde_json::Value::Null)))
        {
            return Err(ModuleError::MissingParameter((*missing).to_string()));
        }
        module.validate_params(params)?;

        if context.check_mode {
            module.check(params, context)
        } else {
            module.execute(params, context)
        }
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
