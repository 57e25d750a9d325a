//! Permission grants
//!
//! Turns heterogeneous "allow this function to do X" descriptors into an
//! ordered list of normalized statements per function.
//!
//! ## Pipeline
//!
//! ```text
//! Permissions ("*" | [descriptor, ...])
//!     └── GrantDispatcher::resolve (one descriptor -> grant records)
//!             └── ResourcePolicy::attach (baseline first, then in call order)
//! ```
//!
//! Repeated attaches are not deduplicated unless
//! [`PolicyOptions::dedupe_statements`] is switched on.

pub mod arn;
pub mod descriptor;
pub mod dispatcher;
pub mod handle;
pub mod policy;

pub use arn::AwsEnv;
pub use descriptor::{PermissionDescriptor, Permissions};
pub use dispatcher::GrantDispatcher;
pub use handle::{Identity, ResourceHandle, ResourceKind};
pub use policy::{BASELINE_ACTIONS, Effect, GrantRecord, PolicyOptions, ResourcePolicy};
