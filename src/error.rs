//! Error types for cloudgrant
//!
//! This module defines the error hierarchy used throughout the crate.
//! Every error is raised synchronously during the synthesis pass and is never
//! retried: the pass is deterministic, so a retry reproduces the same failure.

use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Synthesis error: {0}")]
    Synth(#[from] SynthError),
}

/// Manifest loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while building constructs and resolving permissions
#[derive(Error, Debug)]
pub enum SynthError {
    #[error(transparent)]
    ConfigLocked(#[from] ConfigLockedError),

    #[error(transparent)]
    UnsupportedPermission(#[from] UnsupportedPermissionError),

    #[error(transparent)]
    UnknownSubResource(#[from] UnknownSubResourceError),

    #[error(transparent)]
    IncompatibleDefaults(#[from] IncompatibleDefaultsError),

    #[error(transparent)]
    CrossUnitReference(#[from] CrossUnitReferenceError),

    #[error(transparent)]
    PolicyFrozen(#[from] PolicyFrozenError),

    #[error(transparent)]
    UnitRendered(#[from] UnitRenderedError),

    #[error("Resource '{id}' is already defined in unit '{unit}'")]
    DuplicateResource { unit: String, id: String },

    #[error("Unit not found: {0}")]
    UnknownUnit(String),

    /// A function or construct id minted by a different [`App`](crate::synth::App)
    #[error("Id not found in this app: {0}")]
    UnknownId(String),

    #[error("Attach entry in unit '{0}' names neither a function nor a construct")]
    MissingAttachTarget(String),
}

/// Defaults were mutated after a function consumed them
#[derive(Error, Debug)]
#[error(
    "Defaults for {scope} are locked: they must be set before any functions have been added"
)]
pub struct ConfigLockedError {
    pub scope: String,
}

impl ConfigLockedError {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }
}

/// A permission descriptor had a shape the dispatcher does not recognize
#[derive(Error, Debug)]
#[error("The specified permissions are not supported: {value} ({reason})")]
pub struct UnsupportedPermissionError {
    pub value: String,
    pub reason: String,
}

impl UnsupportedPermissionError {
    pub fn new(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn unrecognized(value: impl Into<String>) -> Self {
        Self::new(value, "unrecognized descriptor shape")
    }

    /// The top-level permissions value was neither `"*"` nor a list
    pub fn not_a_list(value: impl Into<String>) -> Self {
        Self::new(value, "expected \"*\" or a list of permissions")
    }

    pub fn unknown_grant_method(handle: impl Into<String>, method: impl Into<String>) -> Self {
        Self::new(
            handle,
            format!(
                "the grant method '{}' does not exist on this resource",
                method.into()
            ),
        )
    }
}

/// A sub-resource key (route, consumer) was not found on a construct
#[derive(Error, Debug)]
#[error("Failed to attach permissions: '{key}' does not exist on '{construct}'")]
pub struct UnknownSubResourceError {
    pub construct: String,
    pub key: String,
}

impl UnknownSubResourceError {
    pub fn new(construct: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            construct: construct.into(),
            key: key.into(),
        }
    }
}

/// Construct-level function defaults combined with an already-built function
#[derive(Error, Debug)]
#[error(
    "The function defaults of '{construct}' cannot be applied to '{key}' because an existing function was passed in; define it with function props instead"
)]
pub struct IncompatibleDefaultsError {
    pub construct: String,
    pub key: String,
}

impl IncompatibleDefaultsError {
    pub fn new(construct: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            construct: construct.into(),
            key: key.into(),
        }
    }
}

/// A reference was resolved before the referenced resource was defined
#[derive(Error, Debug)]
#[error("Cannot resolve '{resource}' in unit '{unit}' (referenced from '{from_unit}')")]
pub struct CrossUnitReferenceError {
    pub unit: String,
    pub resource: String,
    pub from_unit: String,
}

impl CrossUnitReferenceError {
    pub fn new(
        unit: impl Into<String>,
        resource: impl Into<String>,
        from_unit: impl Into<String>,
    ) -> Self {
        Self {
            unit: unit.into(),
            resource: resource.into(),
            from_unit: from_unit.into(),
        }
    }
}

/// A grant was attached to a policy whose unit has already been rendered
#[derive(Error, Debug)]
#[error(
    "The policy of '{function}' in unit '{unit}' has already been rendered; attach new permissions from the importing unit"
)]
pub struct PolicyFrozenError {
    pub unit: String,
    pub function: String,
}

impl PolicyFrozenError {
    pub fn new(unit: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            function: function.into(),
        }
    }
}

/// A unit was modified after it was rendered
#[derive(Error, Debug)]
#[error("Unit '{unit}' has already been rendered; define new resources and defaults before rendering")]
pub struct UnitRenderedError {
    pub unit: String,
}

impl UnitRenderedError {
    pub fn new(unit: impl Into<String>) -> Self {
        Self { unit: unit.into() }
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for synthesis operations
pub type SynthResult<T> = std::result::Result<T, SynthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_permission_constructors() {
        let err = UnsupportedPermissionError::not_a_list("\"abc\"");
        assert!(err.to_string().contains("not supported"));
        assert!(err.reason.contains("list"));

        let err = UnsupportedPermissionError::unknown_grant_method("topic:events", "grantFly");
        assert!(err.reason.contains("grantFly"));
        assert_eq!(err.value, "topic:events");
    }

    #[test]
    fn test_synth_error_is_transparent() {
        let err: SynthError = ConfigLockedError::new("unit 'api'").into();
        assert!(err.to_string().starts_with("Defaults for unit 'api' are locked"));

        let err: SynthError = UnknownSubResourceError::new("Api", "GET /missing").into();
        assert!(err.to_string().contains("GET /missing"));
    }

    #[test]
    fn test_app_error_wraps_synth() {
        let err: AppError = SynthError::UnknownUnit("storage".into()).into();
        assert!(matches!(err, AppError::Synth(SynthError::UnknownUnit(_))));
        assert!(err.to_string().contains("storage"));
    }
}
