//! Manifest types for cloudgrant
//!
//! A manifest describes one app: its identity, app-level defaults, and an
//! ordered list of deployment units with their resources, functions,
//! compound constructs and permission attachments.
//!
//! Permission lists in a manifest accept every descriptor shape plus a
//! reference form, `{ resource = "id", unit = "other", grant = "grantX" }`,
//! resolved against resources already defined when the entry is applied.
//! A `bind` list holds the same reference form without `grant`.

use crate::permissions::{AwsEnv, ResourceKind};
use crate::props::FunctionProps;
use crate::synth::ConstructKind;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Root manifest structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub app: AppSection,

    pub logging: LoggingConfig,

    /// App-level function defaults, applied to every unit
    pub defaults: DefaultsManifest,

    /// Deployment units, in construction order
    pub units: Vec<UnitManifest>,
}

/// App identity and policy switches
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,

    pub stage: String,

    pub region: String,

    pub account: String,

    /// Skip repeated identical derived statements (off by default)
    pub dedupe_statements: bool,
}

impl Default for AppSection {
    fn default() -> Self {
        let env = AwsEnv::default();
        Self {
            name: String::new(),
            stage: "dev".to_string(),
            region: env.region,
            account: env.account,
            dedupe_statements: false,
        }
    }
}

impl AppSection {
    pub fn env(&self) -> AwsEnv {
        AwsEnv::new(&self.account, &self.region)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}

/// Function props with permission and bind lists that may hold references
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultsManifest {
    #[serde(default)]
    pub permissions: Option<Value>,

    /// Resources bound to the function, as `{ resource = "id", unit = "other" }`
    #[serde(default)]
    pub bind: Option<Value>,

    #[serde(flatten)]
    pub props: FunctionProps,
}

impl DefaultsManifest {
    pub fn is_empty(&self) -> bool {
        self.permissions.is_none() && self.bind.is_none() && self.props.is_empty()
    }
}

/// One deployment unit
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UnitManifest {
    pub name: String,

    pub defaults: DefaultsManifest,

    /// Plain resources; these never lock the defaults
    pub resources: Vec<ResourceManifest>,

    pub functions: Vec<FunctionManifest>,

    pub constructs: Vec<ConstructManifest>,

    /// Sub-resources added to constructs of earlier units
    pub extend: Vec<ExtendManifest>,

    /// Permission attachments, applied after everything above
    pub attach: Vec<AttachManifest>,
}

/// A plain resource handle
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceManifest {
    pub id: String,

    pub kind: ResourceKind,

    /// Import an existing resource instead of deriving its ARN
    #[serde(default)]
    pub arn: Option<String>,

    #[serde(default)]
    pub secret_arn: Option<String>,

    #[serde(default)]
    pub key_arn: Option<String>,
}

/// A standalone function
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionManifest {
    pub id: String,

    #[serde(flatten)]
    pub body: DefaultsManifest,
}

/// A compound construct
#[derive(Debug, Clone, Deserialize)]
pub struct ConstructManifest {
    pub id: String,

    pub kind: ConstructKind,

    #[serde(default)]
    pub defaults: ConstructDefaults,

    /// Routes (APIs) or consumers (queues, streams), keyed by name
    #[serde(default, alias = "consumers")]
    pub routes: IndexMap<String, SubResourceManifest>,

    /// Construct-wide permissions
    #[serde(default)]
    pub permissions: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConstructDefaults {
    /// Defaults for every function the construct builds
    pub function: Option<DefaultsManifest>,
}

/// The function behind a route or consumer
#[derive(Debug, Clone)]
pub enum SubResourceManifest {
    /// Shorthand: the handler path
    Handler(String),
    /// An already-defined function
    Existing {
        function: String,
        unit: Option<String>,
    },
    /// Props for a new function
    Props(DefaultsManifest),
}

/// Keys allowed next to `function` in the existing-function form
const EXISTING_KEYS: &[&str] = &["function", "unit"];

impl<'de> Deserialize<'de> for SubResourceManifest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let value = Value::deserialize(deserializer)?;
        match &value {
            Value::String(handler) => Ok(SubResourceManifest::Handler(handler.clone())),
            Value::Object(map) if map.contains_key("function") => {
                if let Some(extra) = map.keys().find(|key| !EXISTING_KEYS.contains(&key.as_str())) {
                    return Err(D::Error::custom(format!(
                        "'{}' cannot be combined with 'function': an existing function takes no props",
                        extra
                    )));
                }
                let function = map
                    .get("function")
                    .and_then(Value::as_str)
                    .ok_or_else(|| D::Error::custom("'function' must be a function id"))?;
                let unit = match map.get("unit") {
                    None => None,
                    Some(Value::String(unit)) => Some(unit.clone()),
                    Some(_) => return Err(D::Error::custom("'unit' must be a unit name")),
                };
                Ok(SubResourceManifest::Existing {
                    function: function.to_string(),
                    unit,
                })
            }
            Value::Object(_) => serde_json::from_value(value.clone())
                .map(SubResourceManifest::Props)
                .map_err(D::Error::custom),
            other => Err(D::Error::custom(format!(
                "expected a handler path or a table, found {}",
                other
            ))),
        }
    }
}

/// Sub-resource added from this unit to a construct defined elsewhere
#[derive(Debug, Clone, Deserialize)]
pub struct ExtendManifest {
    pub construct: String,

    /// Unit that defines the construct
    pub unit: String,

    pub key: String,

    pub target: SubResourceManifest,
}

/// An `attachPermissions` / `attachPermissionsTo` call
#[derive(Debug, Clone, Deserialize)]
pub struct AttachManifest {
    /// Target function id
    #[serde(default)]
    pub function: Option<String>,

    /// Target construct id
    #[serde(default)]
    pub construct: Option<String>,

    /// Sub-resource key; the whole construct when absent
    #[serde(default)]
    pub key: Option<String>,

    /// Unit of the target; the current unit when absent
    #[serde(default)]
    pub unit: Option<String>,

    pub permissions: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_section_defaults() {
        let app = AppSection::default();
        assert_eq!(app.stage, "dev");
        assert_eq!(app.env(), AwsEnv::default());
        assert!(!app.dedupe_statements);
    }

    #[test]
    fn test_defaults_manifest_splits_permissions() {
        let manifest: DefaultsManifest = toml::from_str(
            r#"
timeout = 10
permissions = [{ resource = "notes" }, "s3"]
environment = { STAGE = "dev" }
"#,
        )
        .unwrap();

        assert_eq!(manifest.props.timeout, Some(10));
        assert!(manifest.props.permissions.is_none());
        assert_eq!(manifest.permissions.unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_sub_resource_shapes() {
        let handler: SubResourceManifest =
            serde_json::from_value(serde_json::json!("src/get.main")).unwrap();
        assert!(matches!(handler, SubResourceManifest::Handler(_)));

        let existing: SubResourceManifest =
            toml::from_str(r#"function = "worker""#).unwrap();
        assert!(matches!(existing, SubResourceManifest::Existing { .. }));

        let props: SubResourceManifest = toml::from_str(r#"handler = "src/post.main""#).unwrap();
        match props {
            SubResourceManifest::Props(body) => {
                assert_eq!(body.props.handler.as_deref(), Some("src/post.main"))
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn test_existing_function_with_props_rejected() {
        let err = toml::from_str::<SubResourceManifest>(
            r#"
function = "worker"
timeout = 3
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("'timeout' cannot be combined with 'function'"));

        let existing: SubResourceManifest = toml::from_str(
            r#"
function = "worker"
unit = "jobs"
"#,
        )
        .unwrap();
        assert!(matches!(
            existing,
            SubResourceManifest::Existing { unit: Some(unit), .. } if unit == "jobs"
        ));
    }

    #[test]
    fn test_defaults_manifest_keeps_bind_references() {
        let manifest: DefaultsManifest =
            toml::from_str(r#"bind = [{ resource = "notes", unit = "storage" }]"#).unwrap();
        assert!(manifest.props.bind.is_none());
        assert!(!manifest.is_empty());
        assert_eq!(manifest.bind.unwrap().as_array().unwrap().len(), 1);
    }
}
