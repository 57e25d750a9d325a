//! cloudgrant
//!
//! Configuration defaults and permission grants for infrastructure constructs.
//!
//! ## Features
//!
//! - **Defaults cascade** - app, unit, construct and inline function props merged with per-field rules
//! - **Scope locking** - defaults can no longer change once a function has consumed them
//! - **Grant resolution** - strings, resource handles, native grant methods and raw statements
//!   normalized into ordered per-function policies
//! - **Manifest driven** - a TOML manifest plus environment overrides builds the whole app
//!
//! ## Cascade
//!
//! ```text
//! app defaults ⊕ unit defaults ⊕ construct defaults.function ⊕ inline props
//! ```
//!
//! ## Example Manifest
//!
//! ```toml
//! [app]
//! name = "notes"
//! stage = "dev"
//!
//! [defaults]
//! timeout = 10
//! environment = { LOG_LEVEL = "info" }
//!
//! [[units]]
//! name = "storage"
//!
//! [[units.resources]]
//! id = "table"
//! kind = "table"
//!
//! [[units]]
//! name = "api"
//!
//! [[units.constructs]]
//! id = "api"
//! kind = "api"
//! permissions = [{ resource = "table", unit = "storage" }]
//!
//! [units.constructs.routes]
//! "GET /notes" = "src/list.main"
//! ```

pub mod config;
pub mod error;
pub mod permissions;
pub mod props;
pub mod scope;
pub mod synth;

// Re-export main types
pub use config::{Manifest, build_app, load_manifest, load_manifest_from_str};
pub use error::{AppError, Result, SynthError, SynthResult};
pub use permissions::{GrantDispatcher, PermissionDescriptor, Permissions, ResourceHandle};
pub use props::{FunctionProps, MergeProps, merge_all, merge_props};
pub use synth::{App, SynthOutput};
