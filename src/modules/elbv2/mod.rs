//! Elastic Load Balancing v2 modules.
//!
//! The reconciliation core (conditions, actions, compare, reconcile,
//! listeners) is pure and works on the wire model in [`types`]. All AWS
//! access goes through [`client::Elbv2Api`]; the SDK-backed implementation
//! lives in `sdk` and is compiled with the `aws` feature.
//!
//! ## Available Modules
//!
//! - [`ElbApplicationLbModule`](module::ElbApplicationLbModule): listeners and
//!   listener rules of an Application Load Balancer
//!
//! ## Authentication
//!
//! AWS credentials are loaded from the standard AWS credential chain:
//!
//! 1. Environment variables (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`)
//! 2. AWS credentials file (`~/.aws/credentials`)
//! 3. IAM instance profile or ECS task role
//!
//! The region can be specified via:
//! - Module parameter (`region`)
//! - Environment variable (`AWS_REGION` or `AWS_DEFAULT_REGION`)
//! - AWS config file (`~/.aws/config`)

pub mod actions;
pub mod apply;
pub mod client;
pub mod compare;
pub mod conditions;
pub mod listeners;
pub mod module;
pub mod reconcile;
#[cfg(feature = "aws")]
pub mod sdk;
pub mod types;
pub mod validate;

pub use client::Elbv2Api;
pub use compare::{compare_rule, RulePatch};
pub use conditions::{condition_lists_equal, condition_matches};
pub use listeners::{compare_listeners, ListenerChanges, ListenerModification};
pub use module::ElbApplicationLbModule;
pub use reconcile::{reconcile_rules, NewRule, PriorityChange, RuleChanges};
#[cfg(feature = "aws")]
pub use sdk::SdkElbv2Client;
pub use types::{Action, ActionType, Condition, Listener, ListenerProtocol, Rule, RulePriority};
pub use validate::{validate_listeners, validate_rules};
