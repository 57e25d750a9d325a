//! Defaults scopes
//!
//! An app and each of its deployment units own one [`ScopeDefaults`]. A
//! function reads the snapshots of both scopes when it is constructed, which
//! locks them through their [`LockGuard`].

pub mod layers;
pub mod lock;
pub mod registry;

pub use layers::{LayerArena, LayerBinding};
pub use lock::{LockGuard, ScopeState};
pub use registry::{DefaultsSource, ScopeDefaults};

use crate::permissions::AwsEnv;
use serde::Serialize;

/// Identity of one deployment unit, as seen by deferred defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitInfo {
    pub app: String,
    pub stage: String,
    pub name: String,
    pub region: String,
    pub account: String,
}

impl UnitInfo {
    pub fn new(app: &str, stage: &str, name: &str, env: &AwsEnv) -> Self {
        Self {
            app: app.to_string(),
            stage: stage.to_string(),
            name: name.to_string(),
            region: env.region.clone(),
            account: env.account.clone(),
        }
    }

    /// Physical name of a resource: `{stage}-{app}-{name}`
    pub fn logical_prefixed_name(&self, name: &str) -> String {
        format!("{}-{}-{}", self.stage, self.app, name)
    }

    /// Physical name of the unit itself
    pub fn stack_name(&self) -> String {
        self.logical_prefixed_name(&self.name)
    }

    pub fn env(&self) -> AwsEnv {
        AwsEnv::new(&self.account, &self.region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_prefixed_name() {
        let info = UnitInfo::new("notes", "dev", "api", &AwsEnv::new("123", "eu-west-1"));
        assert_eq!(info.logical_prefixed_name("table"), "dev-notes-table");
        assert_eq!(info.stack_name(), "dev-notes-api");
        assert_eq!(info.env().region, "eu-west-1");
    }
}
