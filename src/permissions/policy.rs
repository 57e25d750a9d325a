//! Grant records and per-function policy accumulation

use crate::error::{PolicyFrozenError, SynthResult};
use crate::permissions::descriptor::{PermissionDescriptor, Permissions};
use crate::permissions::dispatcher::GrantDispatcher;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Telemetry actions granted to every function before any user grant
pub const BASELINE_ACTIONS: &[&str] = &["xray:PutTraceSegments", "xray:PutTelemetryRecords"];

/// Statement effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

/// Normalized `(effect, actions, resources)` statement
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantRecord {
    #[serde(default)]
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<String>,
}

impl GrantRecord {
    /// Allow `actions` on `resources`
    pub fn allow<A, R>(actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            effect: Effect::Allow,
            actions: actions.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().map(Into::into).collect(),
        }
    }

    /// The fixed telemetry grant every policy begins with
    pub fn baseline() -> Self {
        Self::allow(BASELINE_ACTIONS.iter().copied(), ["*"])
    }
}

/// Switches for policy accumulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PolicyOptions {
    /// Skip derived statements identical to one already in the policy.
    ///
    /// Off by default: repeated attaches of the same descriptor produce
    /// repeated statements. Raw statements are never deduplicated.
    #[serde(default)]
    pub dedupe_statements: bool,
}

#[derive(Debug, Clone)]
struct Entry {
    record: GrantRecord,
    raw: bool,
}

/// Ordered access policy of one function
#[derive(Debug, Clone)]
pub struct ResourcePolicy {
    unit: String,
    function: String,
    options: PolicyOptions,
    entries: Vec<Entry>,
    frozen: bool,
}

impl ResourcePolicy {
    /// Baseline-only policy owned by `function` in `unit`
    pub fn new(unit: impl Into<String>, function: impl Into<String>, options: PolicyOptions) -> Self {
        Self {
            unit: unit.into(),
            function: function.into(),
            options,
            entries: vec![Entry {
                record: GrantRecord::baseline(),
                raw: false,
            }],
            frozen: false,
        }
    }

    /// Resolve `permissions` and append the records in order.
    ///
    /// Resolution completes before anything is appended, so a failing
    /// descriptor leaves the policy untouched. Returns the number of
    /// statements appended.
    pub fn attach(&mut self, permissions: &Permissions) -> SynthResult<usize> {
        self.ensure_open()?;

        let mut resolved = Vec::new();
        match permissions {
            Permissions::All => {
                resolved.push((
                    GrantDispatcher::resolve(&PermissionDescriptor::Wildcard)?,
                    false,
                ));
            }
            Permissions::List(descriptors) => {
                for descriptor in descriptors {
                    resolved.push((GrantDispatcher::resolve(descriptor)?, descriptor.is_raw()));
                }
            }
        }

        let mut appended = 0;
        for (records, raw) in resolved {
            for record in records {
                if self.options.dedupe_statements && !raw && self.contains_derived(&record) {
                    trace!(function = %self.function, ?record, "Skipping duplicate statement");
                    continue;
                }
                self.entries.push(Entry { record, raw });
                appended += 1;
            }
        }

        debug!(
            unit = %self.unit,
            function = %self.function,
            appended,
            total = self.entries.len(),
            "Attached permissions"
        );
        Ok(appended)
    }

    /// Append already-resolved records (native grants issued by a construct)
    pub fn attach_records(&mut self, records: Vec<GrantRecord>) -> SynthResult<()> {
        self.ensure_open()?;
        self.entries
            .extend(records.into_iter().map(|record| Entry { record, raw: false }));
        Ok(())
    }

    fn contains_derived(&self, record: &GrantRecord) -> bool {
        self.entries
            .iter()
            .any(|entry| !entry.raw && entry.record == *record)
    }

    fn ensure_open(&self) -> Result<(), PolicyFrozenError> {
        if self.frozen {
            return Err(PolicyFrozenError::new(&self.unit, &self.function));
        }
        Ok(())
    }

    /// Freeze the policy and return its statements.
    ///
    /// Rendering again returns the same statements.
    pub fn render(&mut self) -> Vec<GrantRecord> {
        self.frozen = true;
        self.statements()
    }

    pub fn statements(&self) -> Vec<GrantRecord> {
        self.entries.iter().map(|e| e.record.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true: the baseline statement is always present
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }
}
