//! `run` and `plan` subcommands

pub mod plan;
pub mod run;

use crate::cli::output::OutputFormatter;
use anyhow::Result;
use rustible_elbv2::config::Config;

/// Global flags and loaded configuration, resolved once in `main`
pub struct CommandContext {
    pub config: Config,
    pub output: OutputFormatter,
    /// `--check`: plan against live state without mutating it
    pub check_mode: bool,
    pub diff_mode: bool,
}

impl CommandContext {
    pub fn new(cli: &crate::cli::Cli, config: Config) -> Self {
        Self {
            output: OutputFormatter::new(!cli.no_color, cli.is_json(), cli.verbosity()),
            check_mode: cli.check_mode,
            diff_mode: cli.diff_mode,
            config,
        }
    }
}

/// A subcommand. `Ok` carries the process exit code; `Err` is reserved for
/// failures writing output.
#[allow(async_fn_in_trait)]
pub trait Runnable {
    async fn run(&self, ctx: &mut CommandContext) -> Result<i32>;
}
