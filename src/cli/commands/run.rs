//! Run command - apply a parameters file with a module
//!
//! The parameters file is a JSON or YAML mapping of module arguments. Values
//! the file leaves unset are filled from the configuration.

use super::{CommandContext, Runnable};
use anyhow::Result;
use clap::Parser;
use rustible_elbv2::input::load_params;
use rustible_elbv2::modules::{ModuleContext, ModuleRegistry, ModuleStatus};
use rustible_elbv2::Error;
use std::path::PathBuf;

/// Arguments for the run command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to the module parameters file (.json, .yml or .yaml)
    #[arg(required = true)]
    pub params: PathBuf,

    /// Module to execute
    #[arg(long, short = 'm', default_value = "aws_elb_application_lb")]
    pub module: String,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let mut params = match load_params(&self.params) {
            Ok(params) => params,
            Err(e) => {
                ctx.output.error(&e.to_string());
                return Ok(e.exit_code());
            }
        };
        ctx.config.apply_to_params(&mut params);

        let context = ModuleContext::new()
            .with_check_mode(ctx.check_mode)
            .with_diff_mode(ctx.diff_mode);
        let registry = ModuleRegistry::with_builtins();

        tracing::info!(
            "Running {} with {} (check_mode: {})",
            self.module,
            self.params.display(),
            ctx.check_mode
        );

        let target = params
            .get("name")
            .or_else(|| params.get("load_balancer_arn"))
            .and_then(|v| v.as_str())
            .unwrap_or(&self.module)
            .to_string();

        // Module::execute blocks on the current runtime from a scoped thread
        let result = tokio::task::block_in_place(|| registry.execute(&self.module, &params, &context));

        match result {
            Ok(output) => {
                ctx.output.status(&target, output.status, &output.msg);
                for warning in &output.warnings {
                    ctx.output.warning(warning);
                }
                if let Some(diff) = &output.diff {
                    ctx.output.diff(diff);
                }
                ctx.output.result(&output)?;
                Ok(if output.status == ModuleStatus::Failed {
                    2
                } else {
                    0
                })
            }
            Err(e) => {
                let err = Error::module(&self.module, e);
                ctx.output.status(&target, ModuleStatus::Failed, &err.to_string());
                ctx.output.result(&serde_json::json!({
                    "changed": false,
                    "failed": true,
                    "msg": err.to_string(),
                }))?;
                Ok(err.exit_code())
            }
        }
    }
}

impl Runnable for RunArgs {
    async fn run(&self, ctx: &mut CommandContext) -> Result<i32> {
        self.execute(ctx).await
    }
}
