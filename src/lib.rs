//! # rustible-elbv2 - Declarative listener management for AWS load balancers
//!
//! rustible-elbv2 drives an Application Load Balancer's listeners and listener
//! rules toward a declared state. A run describes the live listeners, diffs
//! them against the declaration and issues only the calls needed to converge:
//! listeners are created, modified or deleted, and rules are added, patched,
//! re-prioritized or purged.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      CLI (run / plan)                     │
//! └───────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │        Module registry: aws_elb_application_lb            │
//! └───────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//! │   Comparison    │ │  Reconciliation │ │      Apply      │
//! │ (conditions and │ │  (rule change   │ │  (ordered ELBv2 │
//! │    actions)     │ │     sets)       │ │     calls)      │
//! └─────────────────┘ └─────────────────┘ └─────────────────┘
//!                                                  │
//!                                                  ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │           Elbv2Api (AWS SDK, or a test double)            │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use rustible_elbv2::prelude::*;
//!
//! let current = vec![Rule::new(
//!     1,
//!     vec![Condition::with_values("path-pattern", ["/api/*"])],
//!     vec![Action::forward("arn:aws:elasticloadbalancing:tg/api")],
//! )
//! .with_arn("arn:aws:elasticloadbalancing:rule/1")];
//! let declared = vec![Rule::new(
//!     2,
//!     vec![Condition::with_values("path-pattern", ["/api/*"])],
//!     vec![Action::forward("arn:aws:elasticloadbalancing:tg/api")],
//! )];
//!
//! let changes = reconcile_rules("arn:aws:elasticloadbalancing:listener/1", &current, &declared);
//! assert_eq!(changes.rules_to_set_priority.len(), 1);
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    // Error handling
    pub use crate::error::{Error, Result};

    // Configuration
    pub use crate::config::Config;

    // Module system
    pub use crate::modules::{
        Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleRegistry,
        ModuleResult,
    };

    // Load balancer model and reconciliation
    pub use crate::modules::elbv2::{
        compare_listeners, compare_rule, reconcile_rules, Action, ActionType, Condition,
        ElbApplicationLbModule, Elbv2Api, Listener, ListenerChanges, ListenerProtocol, Rule,
        RuleChanges, RulePriority,
    };
}

/// Error types and result aliases.
pub mod error;

/// Layered configuration: config files, then environment variables.
pub mod config;

/// JSON and YAML loading of module parameters and rule sets.
pub mod input;

/// Module system and the load balancer module.
pub mod modules;

pub use error::{Error, Result};
