//! One-way lock on a defaults scope

use crate::error::ConfigLockedError;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Lock state of a defaults scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeState {
    #[default]
    Open,
    /// Terminal
    Locked,
}

impl ScopeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeState::Open => "open",
            ScopeState::Locked => "locked",
        }
    }
}

impl fmt::Display for ScopeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Guards a scope's defaults against mutation after the first consumer.
///
/// `Open -> Locked` fires when the first defaults-consuming resource is
/// constructed in the scope. There is no way back to `Open`.
#[derive(Debug, Clone)]
pub struct LockGuard {
    scope: String,
    state: ScopeState,
    locked_by: Option<String>,
}

impl LockGuard {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            state: ScopeState::Open,
            locked_by: None,
        }
    }

    pub fn state(&self) -> ScopeState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.state == ScopeState::Locked
    }

    /// The resource whose construction locked the scope
    pub fn locked_by(&self) -> Option<&str> {
        self.locked_by.as_deref()
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Record that `consumer` read the scope's defaults.
    ///
    /// Returns true when this call performed the transition.
    pub fn lock(&mut self, consumer: &str) -> bool {
        if self.is_locked() {
            return false;
        }
        self.state = ScopeState::Locked;
        self.locked_by = Some(consumer.to_string());
        debug!(scope = %self.scope, consumer, "Defaults scope locked");
        true
    }

    /// Fail if the scope no longer accepts mutations
    pub fn ensure_open(&self) -> Result<(), ConfigLockedError> {
        match self.state {
            ScopeState::Open => Ok(()),
            ScopeState::Locked => Err(ConfigLockedError::new(&self.scope)),
        }
    }
}
