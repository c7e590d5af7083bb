//! Command-line surface: global flags shared by `run` and `plan`.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// rustible-elbv2 - Declarative listener management for AWS load balancers
#[derive(Parser, Debug, Clone)]
#[command(name = "rustible-elbv2")]
#[command(author = "Rustible Contributors")]
#[command(version)]
#[command(about = "Reconcile AWS load balancer listeners and rules", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Report the changes a run would make without calling any mutating API
    #[arg(long = "check", global = true)]
    pub check_mode: bool,

    /// Print a before/after rendering of listener rules that change
    #[arg(long = "diff", global = true)]
    pub diff_mode: bool,

    /// Output format for status messages
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Configuration file (TOML, YAML or JSON) overriding the default search path
    #[arg(short = 'c', long, global = true, env = "RUSTIBLE_ELBV2_CONFIG")]
    pub config: Option<PathBuf>,

    /// Never colorize output (NO_COLOR is also honored)
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Status lines and diffs on stderr, result on stdout
    #[default]
    Human,
    /// Only the JSON result on stdout, messages as JSON on stderr
    Json,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Apply a parameters file with the load balancer module
    Run(commands::run::RunArgs),

    /// Reconcile a declared rule set against a live snapshot offline
    Plan(commands::plan::PlanArgs),
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// `-v` count, capped at trace
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}
