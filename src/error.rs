//! Error types for rustible-elbv2.
//!
//! Failures inside a module run are [`ModuleError`]s. The crate-level
//! [`Error`] adds the input-file failures seen before a module is reached and
//! decides the CLI exit status.

use crate::modules::ModuleError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for rustible-elbv2 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the input loaders and the CLI.
#[derive(Error, Debug)]
pub enum Error {
    /// A parameters or rules file that is not valid JSON/YAML for its target type.
    #[error("Failed to parse '{path}': {message}")]
    InputParse {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported input format for '{0}' (expected .json, .yaml or .yml)")]
    UnsupportedFormat(PathBuf),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// A module (or the offline planner) rejected its input or failed against AWS.
    #[error("Module '{module}' failed: {source}")]
    Module {
        module: String,
        #[source]
        source: ModuleError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn input_parse(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::InputParse {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    pub fn module(module: impl Into<String>, source: ModuleError) -> Self {
        Self::Module {
            module: module.into(),
            source,
        }
    }

    /// Process exit status: 2 when a module failed, 4 when the input could
    /// not be read at all.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Module { .. } => 2,
            Error::InputParse { .. } | Error::UnsupportedFormat(_) | Error::FileNotFound(_) => 4,
            Error::Io(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let err = Error::module(
            "aws_elb_application_lb",
            ModuleError::ExecutionFailed("throttled".to_string()),
        );
        assert_eq!(err.exit_code(), 2);

        let err = Error::input_parse("rules.yml", "bad indentation", None);
        assert_eq!(err.exit_code(), 4);
        assert_eq!(Error::FileNotFound(PathBuf::from("alb.yml")).exit_code(), 4);

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(Error::from(io).exit_code(), 1);
    }

    #[test]
    fn test_module_error_keeps_source() {
        let err = Error::module(
            "plan",
            ModuleError::Configuration("Rule priority 3 is declared more than once".to_string()),
        );
        assert!(err.to_string().starts_with("Module 'plan' failed"));
        assert!(err.to_string().contains("priority 3"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
