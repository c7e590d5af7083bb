//! Loading module parameters and rule sets from JSON or YAML files.

use crate::error::{Error, Result};
use crate::modules::elbv2::Rule;
use crate::modules::ModuleParams;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputFormat {
    Json,
    Yaml,
}

impl InputFormat {
    fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(InputFormat::Json),
            Some("yml") | Some("yaml") => Ok(InputFormat::Yaml),
            _ => Err(Error::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Rule files hold either a bare list or the `describe-rules` envelope
#[derive(Deserialize)]
#[serde(untagged)]
enum RulesDocument {
    Envelope {
        #[serde(rename = "Rules")]
        rules: Vec<Rule>,
    },
    List(Vec<Rule>),
}

/// Parse a JSON or YAML document, picking the format from the file extension
pub fn load_document<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let format = InputFormat::from_path(path)?;

    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;

    match format {
        InputFormat::Json => serde_json::from_str(&content)
            .map_err(|e| Error::input_parse(path, e.to_string(), Some(Box::new(e)))),
        InputFormat::Yaml => serde_yaml::from_str(&content)
            .map_err(|e| Error::input_parse(path, e.to_string(), Some(Box::new(e)))),
    }
}

/// Load module parameters from a mapping document
pub fn load_params(path: impl AsRef<Path>) -> Result<ModuleParams> {
    let path = path.as_ref();
    let params: Option<ModuleParams> = load_document(path)?;
    tracing::debug!("Loaded module parameters from {}", path.display());
    Ok(params.unwrap_or_default())
}

/// Load a rule set, as declared by a caller or as returned by `describe-rules`
pub fn load_rules(path: impl AsRef<Path>) -> Result<Vec<Rule>> {
    let path = path.as_ref();
    let rules = match load_document::<RulesDocument>(path)? {
        RulesDocument::Envelope { rules } | RulesDocument::List(rules) => rules,
    };
    tracing::debug!("Loaded {} rules from {}", rules.len(), path.display());
    Ok(rules)
}
