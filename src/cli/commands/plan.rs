//! Plan command - offline rule reconciliation
//!
//! Reconciles a declared rule set against a snapshot of live rules (for
//! example the output of `aws elbv2 describe-rules`) and prints the resulting
//! change sets. Nothing is sent to AWS.

use super::{CommandContext, Runnable};
use anyhow::Result;
use clap::Parser;
use rustible_elbv2::input::load_rules;
use rustible_elbv2::modules::elbv2::{reconcile_rules, validate_rules};
use rustible_elbv2::Error;
use std::path::PathBuf;

/// Arguments for the plan command
#[derive(Parser, Debug, Clone)]
pub struct PlanArgs {
    /// Live rules snapshot (.json, .yml or .yaml)
    #[arg(long, required = true)]
    pub current: PathBuf,

    /// Declared rules (.json, .yml or .yaml)
    #[arg(long, required = true)]
    pub declared: PathBuf,

    /// Listener ARN stamped on the rules to add
    #[arg(long, default_value = "")]
    pub listener_arn: String,

    /// Keep undeclared live rules out of the delete set
    #[arg(long)]
    pub no_purge_rules: bool,
}

impl PlanArgs {
    /// Execute the plan command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let loaded = load_rules(&self.current).and_then(|current| {
            let declared = load_rules(&self.declared)?;
            validate_rules(&declared, &self.declared.display().to_string())
                .map_err(|e| Error::module("plan", e))?;
            Ok((current, declared))
        });

        let (current, declared) = match loaded {
            Ok(rules) => rules,
            Err(e) => {
                ctx.output.error(&e.to_string());
                return Ok(e.exit_code());
            }
        };

        ctx.output.debug(&format!(
            "Reconciling {} declared rules against {} live rules",
            declared.len(),
            current.len()
        ));

        let mut changes = reconcile_rules(&self.listener_arn, &current, &declared);
        if self.no_purge_rules {
            changes.rules_to_delete.clear();
        }

        if ctx.check_mode {
            ctx.output.warning("plan never calls AWS; --check has no effect");
        }

        ctx.output.result(&changes)?;
        Ok(0)
    }
}

impl Runnable for PlanArgs {
    async fn run(&self, ctx: &mut CommandContext) -> Result<i32> {
        self.execute(ctx).await
    }
}
