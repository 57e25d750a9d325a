//! Per-scope defaults registry

use crate::error::ConfigLockedError;
use crate::permissions::{Permissions, ResourceHandle};
use crate::props::{FunctionProps, LayerRef, merge_props};
use crate::scope::UnitInfo;
use crate::scope::lock::{LockGuard, ScopeState};
use std::fmt;
use tracing::{debug, trace};

/// Defaults computed from the identity of the unit reading them
pub type DeferredDefaults = Box<dyn Fn(&UnitInfo) -> FunctionProps>;

/// One `set_defaults` contribution
pub enum DefaultsSource {
    Props(FunctionProps),
    /// Evaluated every time a unit reads the snapshot
    Deferred(DeferredDefaults),
}

impl DefaultsSource {
    fn evaluate(&self, unit: &UnitInfo) -> FunctionProps {
        match self {
            DefaultsSource::Props(props) => props.clone(),
            DefaultsSource::Deferred(f) => f(unit),
        }
    }
}

impl fmt::Debug for DefaultsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultsSource::Props(props) => f.debug_tuple("Props").field(props).finish(),
            DefaultsSource::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<FunctionProps> for DefaultsSource {
    fn from(props: FunctionProps) -> Self {
        DefaultsSource::Props(props)
    }
}

/// Mutable defaults of one app or unit scope.
///
/// Contributions are merged in registration order; a deferred contribution
/// is evaluated against the reading unit and merged at its position.
#[derive(Debug)]
pub struct ScopeDefaults {
    guard: LockGuard,
    sources: Vec<DefaultsSource>,
}

impl ScopeDefaults {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            guard: LockGuard::new(scope),
            sources: Vec::new(),
        }
    }

    /// Merge `props` on top of the current defaults
    pub fn set_defaults(&mut self, props: FunctionProps) -> Result<(), ConfigLockedError> {
        self.push(DefaultsSource::Props(props))
    }

    /// Register defaults computed per unit
    pub fn set_defaults_with<F>(&mut self, f: F) -> Result<(), ConfigLockedError>
    where
        F: Fn(&UnitInfo) -> FunctionProps + 'static,
    {
        self.push(DefaultsSource::Deferred(Box::new(f)))
    }

    pub fn add_default_env<I, K, V>(&mut self, vars: I) -> Result<(), ConfigLockedError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.set_defaults(FunctionProps::with_environment(vars))
    }

    pub fn add_default_permissions(
        &mut self,
        permissions: impl Into<Permissions>,
    ) -> Result<(), ConfigLockedError> {
        self.set_defaults(FunctionProps::with_permissions(permissions.into()))
    }

    pub fn add_default_layers(&mut self, layers: Vec<LayerRef>) -> Result<(), ConfigLockedError> {
        self.set_defaults(FunctionProps::with_layers(layers))
    }

    /// Bind resources to every function built from this scope
    pub fn add_default_binding(&mut self, bind: Vec<ResourceHandle>) -> Result<(), ConfigLockedError> {
        self.set_defaults(FunctionProps::with_bind(bind))
    }

    fn push(&mut self, source: DefaultsSource) -> Result<(), ConfigLockedError> {
        self.guard.ensure_open()?;
        trace!(scope = %self.guard.scope(), ?source, "Registering defaults");
        self.sources.push(source);
        Ok(())
    }

    /// Merged defaults as seen by `unit`
    pub fn snapshot(&self, unit: &UnitInfo) -> FunctionProps {
        self.sources
            .iter()
            .fold(FunctionProps::default(), |acc, source| {
                merge_props(&acc, &source.evaluate(unit))
            })
    }

    /// Mark the scope as consumed by `consumer`
    pub fn lock(&mut self, consumer: &str) {
        if self.guard.lock(consumer) {
            debug!(
                scope = %self.guard.scope(),
                sources = self.sources.len(),
                "Defaults frozen"
            );
        }
    }

    pub fn state(&self) -> ScopeState {
        self.guard.state()
    }

    pub fn guard(&self) -> &LockGuard {
        &self.guard
    }

    /// Number of registered contributions
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{AwsEnv, PermissionDescriptor, ResourceKind};

    fn unit(name: &str) -> UnitInfo {
        UnitInfo::new("notes", "dev", name, &AwsEnv::default())
    }

    #[test]
    fn test_set_defaults_merges_in_order() {
        let mut defaults = ScopeDefaults::new("app");
        defaults
            .set_defaults(FunctionProps {
                timeout: Some(5),
                memory_size: Some(512),
                ..Default::default()
            })
            .unwrap();
        defaults
            .set_defaults(FunctionProps {
                timeout: Some(10),
                ..Default::default()
            })
            .unwrap();

        let snapshot = defaults.snapshot(&unit("api"));
        assert_eq!(snapshot.timeout, Some(10));
        assert_eq!(snapshot.memory_size, Some(512));
    }

    #[test]
    fn test_add_default_permissions_appends() {
        let mut defaults = ScopeDefaults::new("app");
        defaults
            .add_default_permissions(vec![PermissionDescriptor::service("s3")])
            .unwrap();
        defaults
            .add_default_permissions(vec![PermissionDescriptor::service("sns")])
            .unwrap();

        let snapshot = defaults.snapshot(&unit("api"));
        assert_eq!(
            snapshot.permissions,
            Some(Permissions::List(vec![
                PermissionDescriptor::service("s3"),
                PermissionDescriptor::service("sns"),
            ]))
        );
    }

    #[test]
    fn test_deferred_defaults_see_the_reading_unit() {
        let mut defaults = ScopeDefaults::new("app");
        defaults
            .set_defaults_with(|unit| FunctionProps::with_environment([("UNIT", unit.name.clone())]))
            .unwrap();

        assert_eq!(
            defaults.snapshot(&unit("api")).environment.unwrap()["UNIT"],
            "api"
        );
        assert_eq!(
            defaults.snapshot(&unit("jobs")).environment.unwrap()["UNIT"],
            "jobs"
        );
    }

    #[test]
    fn test_mutation_after_lock_fails() {
        let mut defaults = ScopeDefaults::new("unit 'api'");
        defaults.add_default_env([("A", "1")]).unwrap();
        defaults.lock("handler");

        assert!(defaults.add_default_env([("B", "2")]).is_err());
        assert!(defaults.set_defaults_with(|_| FunctionProps::default()).is_err());
        assert!(defaults.add_default_binding(Vec::new()).is_err());
        assert_eq!(defaults.len(), 1);
    }

    #[test]
    fn test_add_default_binding_concatenates() {
        let env = AwsEnv::default();
        let table = ResourceHandle::new(&env, ResourceKind::Table, "notes", "dev-notes-notes");
        let bucket = ResourceHandle::new(&env, ResourceKind::Bucket, "uploads", "dev-notes-uploads");

        let mut defaults = ScopeDefaults::new("app");
        defaults.add_default_binding(vec![table.clone()]).unwrap();
        defaults.add_default_binding(vec![bucket.clone()]).unwrap();

        assert_eq!(defaults.snapshot(&unit("api")).bind, Some(vec![table, bucket]));
    }
}
