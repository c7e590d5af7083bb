//! `rustible-elbv2` binary: declarative listener management for AWS
//! Application Load Balancers.

mod cli;

use anyhow::Result;
use cli::commands::{CommandContext, Runnable};
use cli::{Cli, Commands};
use rustible_elbv2::config::{Config, LogFormat};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load configuration before logging so it can pick the log format
    let (config, config_error) = match Config::load(cli.config.as_ref()) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    init_logging(cli.verbosity(), &config);

    if cli.verbosity() >= 2 {
        tracing::debug!("rustible-elbv2 v{}", VERSION);
    }

    let mut ctx = CommandContext::new(&cli, config);

    if let Some(e) = config_error {
        ctx.output
            .warning(&format!("Failed to load config, using defaults: {:#}", e));
    }

    let exit_code = match &cli.command {
        Commands::Run(args) => args.run(&mut ctx).await?,
        Commands::Plan(args) => args.run(&mut ctx).await?,
    };

    std::process::exit(exit_code);
}

/// `-v` flags win over `logging.level` from the config file; `RUST_LOG` wins
/// over both.
fn init_logging(verbosity: u8, config: &Config) {
    let filter = match verbosity {
        0 => config.logging.level.as_deref().unwrap_or("warn"),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so stdout stays parseable
    match config.log_format() {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(verbosity >= 3),
            )
            .with(env_filter)
            .init(),
    }
}
