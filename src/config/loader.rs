//! Manifest loader with layered sources
//!
//! The manifest body (units, functions, constructs) comes from one TOML file.
//! The `[app]` and `[logging]` sections are layered, highest first:
//! 1. Environment variables (`CLOUDGRANT__APP__STAGE`, ...)
//! 2. Provider conventions (`AWS_REGION`, `AWS_DEFAULT_REGION`, `CDK_DEFAULT_ACCOUNT`)
//! 3. The manifest file
//! 4. Default values

use crate::config::types::{AppSection, DefaultsManifest, LoggingConfig, Manifest};
use crate::error::ConfigError;
use config::{Config, Environment, File, FileFormat};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// Default manifest paths to check (in order)
const DEFAULT_MANIFEST_PATHS: &[&str] = &[
    "cloudgrant.toml",
    ".cloudgrant.toml",
    "~/.config/cloudgrant/config.toml",
];

const ENV_PREFIX: &str = "CLOUDGRANT";

static REGION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2}(-gov|-iso[a-z]*)?-[a-z]+-\d+$").expect("valid region pattern")
});

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("valid name pattern"));

/// Load a manifest from a TOML string, without environment overrides
pub fn load_manifest_from_str(toml_str: &str) -> Result<Manifest, ConfigError> {
    let manifest: Manifest =
        toml::from_str(toml_str).map_err(|e| ConfigError::Load(e.to_string()))?;
    validate_manifest(&manifest)?;
    Ok(manifest)
}

/// Load a manifest from a file and layer environment overrides on top
pub fn load_manifest(path: Option<&str>) -> Result<Manifest, ConfigError> {
    let path = find_manifest(path)?;
    debug!(path = %path.display(), "Loading manifest");

    let text = std::fs::read_to_string(&path)?;
    let mut manifest: Manifest =
        toml::from_str(&text).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;

    apply_overrides(&mut manifest, &text)?;
    validate_manifest(&manifest)?;
    Ok(manifest)
}

fn find_manifest(path: Option<&str>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        // Explicit path provided - must exist
        let expanded = shellexpand::tilde(path);
        if !Path::new(expanded.as_ref()).exists() {
            return Err(ConfigError::Load(format!(
                "Manifest file not found: {}",
                path
            )));
        }
        return Ok(PathBuf::from(expanded.as_ref()));
    }

    DEFAULT_MANIFEST_PATHS
        .iter()
        .map(|path| PathBuf::from(shellexpand::tilde(path).as_ref()))
        .find(|path| path.exists())
        .ok_or_else(|| ConfigError::Missing {
            field: format!("manifest (looked for {})", DEFAULT_MANIFEST_PATHS.join(", ")),
        })
}

fn apply_overrides(manifest: &mut Manifest, text: &str) -> Result<(), ConfigError> {
    let mut builder = Config::builder()
        .add_source(File::from_str(text, FileFormat::Toml))
        // e.g. CLOUDGRANT__APP__STAGE -> app.stage
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

    // Provider conventions apply only when the prefixed variable is absent
    let prefixed = |key: &str| std::env::var(format!("{}__APP__{}", ENV_PREFIX, key)).is_ok();

    if !prefixed("REGION") {
        if let Some(region) = ["AWS_REGION", "AWS_DEFAULT_REGION"]
            .iter()
            .find_map(|var| std::env::var(var).ok())
        {
            builder = builder
                .set_override("app.region", region)
                .map_err(|e| ConfigError::Load(e.to_string()))?;
        }
    }

    if !prefixed("ACCOUNT") {
        if let Ok(account) = std::env::var("CDK_DEFAULT_ACCOUNT") {
            builder = builder
                .set_override("app.account", account)
                .map_err(|e| ConfigError::Load(e.to_string()))?;
        }
    }

    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    if let Some(app) = section::<AppSection>(&config, "app")? {
        manifest.app = app;
    }
    if let Some(logging) = section::<LoggingConfig>(&config, "logging")? {
        manifest.logging = logging;
    }
    Ok(())
}

fn section<T: serde::de::DeserializeOwned>(
    config: &Config,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match config.get::<T>(key) {
        Ok(value) => Ok(Some(value)),
        Err(config::ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(ConfigError::Load(format!("{}: {}", key, e))),
    }
}

/// Validate manifest values
fn validate_manifest(manifest: &Manifest) -> Result<(), ConfigError> {
    let app = &manifest.app;

    if app.name.is_empty() {
        return Err(ConfigError::Missing {
            field: "app.name".to_string(),
        });
    }
    validate_name(&app.name, "app.name")?;
    validate_name(&app.stage, "app.stage")?;

    if !REGION_PATTERN.is_match(&app.region) {
        return Err(ConfigError::Invalid {
            message: format!("app.region is not a valid region: {}", app.region),
        });
    }

    if app.account.is_empty() {
        return Err(ConfigError::Missing {
            field: "app.account".to_string(),
        });
    }

    let mut units = HashSet::new();
    for (index, unit) in manifest.units.iter().enumerate() {
        if unit.name.is_empty() {
            return Err(ConfigError::Missing {
                field: format!("units[{}].name", index),
            });
        }
        validate_name(&unit.name, &format!("units[{}].name", index))?;
        if !units.insert(unit.name.as_str()) {
            return Err(ConfigError::Invalid {
                message: format!("unit '{}' is defined more than once", unit.name),
            });
        }

        for attach in &unit.attach {
            if attach.function.is_some() == attach.construct.is_some() {
                return Err(ConfigError::Invalid {
                    message: format!(
                        "units.{}.attach: exactly one of 'function' or 'construct' must be set",
                        unit.name
                    ),
                });
            }
            if attach.key.is_some() && attach.construct.is_none() {
                return Err(ConfigError::Invalid {
                    message: format!(
                        "units.{}.attach: 'key' requires 'construct'",
                        unit.name
                    ),
                });
            }
        }
    }

    validate_defaults(&manifest.defaults, "defaults")?;
    Ok(())
}

/// App defaults are read before any unit exists, so they cannot reference resources
fn validate_defaults(defaults: &DefaultsManifest, field: &str) -> Result<(), ConfigError> {
    let references = defaults
        .permissions
        .as_ref()
        .and_then(|p| p.as_array())
        .is_some_and(|list| list.iter().any(|entry| entry.get("resource").is_some()));

    if references {
        return Err(ConfigError::Invalid {
            message: format!(
                "{}.permissions cannot reference resources; set them on a unit instead",
                field
            ),
        });
    }
    if defaults.bind.is_some() {
        return Err(ConfigError::Invalid {
            message: format!("{}.bind cannot reference resources; set it on a unit instead", field),
        });
    }
    Ok(())
}

fn validate_name(name: &str, field: &str) -> Result<(), ConfigError> {
    if !NAME_PATTERN.is_match(name) {
        return Err(ConfigError::Invalid {
            message: format!(
                "{} must start with a letter and contain only letters, digits, '-' or '_', got: {}",
                field, name
            ),
        });
    }
    Ok(())
}
