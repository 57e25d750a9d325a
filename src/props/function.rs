//! Function props
//!
//! The partial configuration of one compute function. Every field is optional
//! so that an empty value is the identity of the merge.

use crate::permissions::{Permissions, ResourceHandle};
use cloudgrant_macros::MergeProps;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Partial function configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema, MergeProps)]
#[serde(default)]
pub struct FunctionProps {
    /// Handler entry point, e.g. `src/lambda.main`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,

    /// Source directory the handler path is relative to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<Runtime>,

    /// Timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,

    /// Memory size in MB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_size: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<Architecture>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Environment variables
    #[serde(skip_serializing_if = "Option::is_none")]
    #[merge(strategy = "union")]
    pub environment: Option<BTreeMap<String, String>>,

    /// Permissions attached to the function when it is constructed
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<serde_json::Value>")]
    #[merge(strategy = "permissions")]
    pub permissions: Option<Permissions>,

    /// Bundling: `true`/`false`, or an options table
    #[serde(skip_serializing_if = "Option::is_none")]
    #[merge(strategy = "replace")]
    pub bundle: Option<Bundle>,

    /// Layers, in attachment order
    #[serde(skip_serializing_if = "Option::is_none")]
    #[merge(strategy = "concat")]
    pub layers: Option<Vec<LayerRef>>,

    /// Resources bound to the function. Each one grants the kind's full
    /// action set, after the configured permissions.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<Vec<serde_json::Value>>")]
    #[merge(strategy = "concat")]
    pub bind: Option<Vec<ResourceHandle>>,
}

impl FunctionProps {
    /// Props carrying only environment variables
    pub fn with_environment<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            environment: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    /// Props carrying only permissions
    pub fn with_permissions(permissions: Permissions) -> Self {
        Self {
            permissions: Some(permissions),
            ..Default::default()
        }
    }

    /// Props carrying only layers
    pub fn with_layers(layers: Vec<LayerRef>) -> Self {
        Self {
            layers: Some(layers),
            ..Default::default()
        }
    }

    /// Props carrying only bound resources
    pub fn with_bind(bind: Vec<ResourceHandle>) -> Self {
        Self {
            bind: Some(bind),
            ..Default::default()
        }
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Function runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Runtime {
    #[serde(rename = "nodejs16.x")]
    Nodejs16,
    #[serde(rename = "nodejs18.x")]
    Nodejs18,
    #[serde(rename = "nodejs20.x")]
    Nodejs20,
    #[serde(rename = "python3.9")]
    Python39,
    #[serde(rename = "python3.10")]
    Python310,
    #[serde(rename = "python3.11")]
    Python311,
    #[serde(rename = "go1.x")]
    Go,
    #[serde(rename = "java11")]
    Java11,
    #[serde(rename = "java17")]
    Java17,
    #[serde(rename = "dotnetcore3.1")]
    DotnetCore31,
    #[serde(rename = "dotnet6")]
    Dotnet6,
    #[serde(rename = "rust")]
    Rust,
    #[serde(rename = "container")]
    Container,
}

impl Runtime {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Runtime::Nodejs16 => "nodejs16.x",
            Runtime::Nodejs18 => "nodejs18.x",
            Runtime::Nodejs20 => "nodejs20.x",
            Runtime::Python39 => "python3.9",
            Runtime::Python310 => "python3.10",
            Runtime::Python311 => "python3.11",
            Runtime::Go => "go1.x",
            Runtime::Java11 => "java11",
            Runtime::Java17 => "java17",
            Runtime::DotnetCore31 => "dotnetcore3.1",
            Runtime::Dotnet6 => "dotnet6",
            Runtime::Rust => "rust",
            Runtime::Container => "container",
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Instruction set architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    X86_64,
    Arm64,
}

/// Tri-state bundling setting
///
/// `true`/`false` toggle bundling, a table configures it. Merging never
/// combines the two: the override replaces the base wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Bundle {
    Enabled(bool),
    Options(BundleOptions),
}

/// Bundling options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct BundleOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_modules: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_modules: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minify: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub loader: Option<BTreeMap<String, String>>,
}

/// Reference to a layer by identity (usually its version ARN)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct LayerRef(String);

impl LayerRef {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    pub fn identity(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
