//! Manifest module
//!
//! Loads, validates and builds the app manifest from TOML files and
//! environment variables.

pub mod build;
pub mod loader;
pub mod types;

pub use build::{build_app, resolve_permissions};
pub use loader::{load_manifest, load_manifest_from_str};
pub use types::*;
