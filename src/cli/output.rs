//! Output formatting for the rustible-elbv2 CLI
//!
//! Results go to stdout as JSON so they can be piped; status lines, diffs and
//! errors go to stderr, colored unless disabled.

use colored::Colorize;
use rustible_elbv2::modules::{Diff, ModuleStatus};
use serde::Serialize;

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// JSON output mode
    json_mode: bool,
    /// Verbosity level
    verbosity: u8,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, json_mode: bool, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();
        colored::control::set_override(use_color);

        Self {
            use_color,
            json_mode,
            verbosity,
        }
    }

    /// Print a serializable result on stdout
    pub fn result<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Print a one-line module status
    pub fn status(&self, target: &str, status: ModuleStatus, message: &str) {
        if self.json_mode {
            return;
        }

        let label = match status {
            ModuleStatus::Ok => "ok",
            ModuleStatus::Changed => "changed",
            ModuleStatus::Failed => "failed",
        };

        if self.use_color {
            let label = match status {
                ModuleStatus::Ok => label.green(),
                ModuleStatus::Changed => label.yellow(),
                ModuleStatus::Failed => label.red().bold(),
            };
            eprintln!("{}: [{}] {}", label, target.bright_white().bold(), message);
        } else {
            eprintln!("{}: [{}] {}", label, target, message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.json_mode {
            let err = serde_json::json!({
                "type": "error",
                "message": message
            });
            eprintln!("{}", err);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.json_mode {
            let warn = serde_json::json!({
                "type": "warning",
                "message": message
            });
            eprintln!("{}", warn);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }

    /// Print a debug message (only at -vv and above)
    pub fn debug(&self, message: &str) {
        if self.json_mode || self.verbosity < 2 {
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "DEBUG:".bright_black(), message.bright_black());
        } else {
            eprintln!("DEBUG: {}", message);
        }
    }

    /// Print a module diff; the unified details are preferred when present
    pub fn diff(&self, diff: &Diff) {
        if self.json_mode {
            return;
        }

        let text = match &diff.details {
            Some(details) => details.clone(),
            None => format!("--- before\n+++ after\n-{}\n+{}\n", diff.before, diff.after),
        };

        eprintln!();
        for line in text.lines() {
            if !self.use_color {
                eprintln!("{}", line);
            } else if line.starts_with("+++") || line.starts_with("---") {
                eprintln!("{}", line.bold());
            } else if line.starts_with('+') {
                eprintln!("{}", line.green());
            } else if line.starts_with('-') {
                eprintln!("{}", line.red());
            } else if line.starts_with("@@") {
                eprintln!("{}", line.cyan());
            } else {
                eprintln!("{}", line);
            }
        }
    }
}
