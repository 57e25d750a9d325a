//! Compound constructs
//!
//! A compound construct (an API, a queue, a stream) owns named sub-resources,
//! each backed by a function. Construct-level function defaults sit between
//! the unit defaults and the inline props of every sub-resource function.
//!
//! ```text
//! Api "notes"
//!   ├── "GET /notes"   -> function notes-GET_notes
//!   └── "POST /notes"  -> function notes-POST_notes
//! ```

use crate::error::{IncompatibleDefaultsError, PolicyFrozenError, SynthError, SynthResult, UnknownSubResourceError};
use crate::permissions::{GrantDispatcher, Permissions, ResourceHandle, ResourceKind};
use crate::props::FunctionProps;
use crate::synth::app::{App, ConstructId, Entry, FunctionId, FunctionRecord};
use crate::synth::output::{ConstructOutput, SubResourceOutput};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Kind of compound construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructKind {
    /// HTTP API with routes
    Api,
    /// WebSocket API with routes
    WebsocketApi,
    /// Queue with at most one consumer
    Queue,
    /// Kinesis stream with named consumers
    KinesisStream,
}

impl ConstructKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstructKind::Api => "api",
            ConstructKind::WebsocketApi => "websocket_api",
            ConstructKind::Queue => "queue",
            ConstructKind::KinesisStream => "kinesis_stream",
        }
    }

    pub fn try_parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|kind| kind.as_str() == s)
    }

    pub fn all() -> &'static [ConstructKind] {
        &[
            ConstructKind::Api,
            ConstructKind::WebsocketApi,
            ConstructKind::Queue,
            ConstructKind::KinesisStream,
        ]
    }

    /// Kind of the handle the construct exposes
    pub fn resource_kind(&self) -> ResourceKind {
        match self {
            ConstructKind::Api => ResourceKind::HttpApi,
            ConstructKind::WebsocketApi => ResourceKind::WebsocketApi,
            ConstructKind::Queue => ResourceKind::Queue,
            ConstructKind::KinesisStream => ResourceKind::KinesisStream,
        }
    }

    /// Native grant every sub-resource function receives from the construct
    fn consumer_grant(&self) -> Option<&'static str> {
        match self {
            ConstructKind::Queue => Some("grantConsumeMessages"),
            ConstructKind::KinesisStream => Some("grantRead"),
            ConstructKind::Api | ConstructKind::WebsocketApi => None,
        }
    }

    fn single_consumer(&self) -> bool {
        matches!(self, ConstructKind::Queue)
    }
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a sub-resource gets its function
#[derive(Debug, Clone)]
pub enum FunctionDefinition {
    /// Build a new function through the cascade
    Props(FunctionProps),
    /// Reuse a function that is already constructed
    Existing(FunctionId),
}

impl From<FunctionProps> for FunctionDefinition {
    fn from(props: FunctionProps) -> Self {
        FunctionDefinition::Props(props)
    }
}

impl From<FunctionId> for FunctionDefinition {
    fn from(fid: FunctionId) -> Self {
        FunctionDefinition::Existing(fid)
    }
}

/// A route or consumer of a construct
#[derive(Debug, Clone)]
pub struct SubResource {
    pub key: String,
    pub function: FunctionId,
    /// Unit the sub-resource was added from
    pub unit: String,
}

#[derive(Debug)]
pub struct Construct {
    pub(crate) unit: String,
    pub(crate) id: String,
    pub(crate) kind: ConstructKind,
    pub(crate) handle: ResourceHandle,
    /// `defaults.function`
    pub(crate) function_defaults: Option<FunctionProps>,
    pub(crate) sub_resources: IndexMap<String, SubResource>,
    /// Construct-wide grants, replayed onto sub-resources added later
    pub(crate) permissions: Vec<Permissions>,
}

impl Construct {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn kind(&self) -> ConstructKind {
        self.kind
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    pub fn sub_resources(&self) -> impl Iterator<Item = &SubResource> {
        self.sub_resources.values()
    }

    pub fn sub_resource(&self, key: &str) -> Option<&SubResource> {
        self.sub_resources.get(key)
    }

    pub(crate) fn output(&self, functions: &[FunctionRecord]) -> ConstructOutput {
        ConstructOutput {
            id: self.id.clone(),
            kind: self.kind,
            arn: self.handle.arn().to_string(),
            sub_resources: self
                .sub_resources
                .values()
                .map(|sub| {
                    let record = &functions[sub.function.0];
                    SubResourceOutput {
                        key: sub.key.clone(),
                        unit: record.unit.clone(),
                        function: record.id.clone(),
                    }
                })
                .collect(),
        }
    }
}

/// Logical id fragment for a sub-resource key: `GET /notes/{id}` -> `GET_notes_id`
fn key_slug(key: &str) -> String {
    let slug = key
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if slug.is_empty() {
        "default".to_string()
    } else {
        slug
    }
}

impl App {
    /// Register a compound construct with optional `defaults.function`
    pub fn add_construct(
        &mut self,
        unit: &str,
        id: &str,
        kind: ConstructKind,
        function_defaults: Option<FunctionProps>,
    ) -> SynthResult<ConstructId> {
        self.ensure_free(unit, id)?;
        let name = self.unit(unit)?.info.logical_prefixed_name(id);
        let handle = ResourceHandle::new(&self.env, kind.resource_kind(), id, &name);

        let cid = ConstructId(self.constructs.len());
        debug!(unit, construct = id, %kind, "Adding construct");
        self.constructs.push(Construct {
            unit: unit.to_string(),
            id: id.to_string(),
            kind,
            handle,
            function_defaults,
            sub_resources: IndexMap::new(),
            permissions: Vec::new(),
        });
        self.insert_entry(unit, id, Entry::Construct(cid))?;
        Ok(cid)
    }

    /// # Panics
    ///
    /// Panics if `cid` was returned by a different [`App`].
    pub fn construct(&self, cid: ConstructId) -> &Construct {
        &self.constructs[cid.0]
    }

    fn checked_construct(&self, cid: ConstructId) -> SynthResult<&Construct> {
        self.constructs
            .get(cid.0)
            .ok_or_else(|| SynthError::UnknownId(format!("construct #{}", cid.0)))
    }

    pub fn construct_id(&self, unit: &str, id: &str) -> Option<ConstructId> {
        match self.units.get(unit)?.entries.get(id)? {
            Entry::Construct(cid) => Some(*cid),
            _ => None,
        }
    }

    /// Add a route or consumer to a construct from `unit`.
    ///
    /// The sub-resource function lives in `unit`, which may differ from the
    /// construct's own unit; the construct is then imported into `unit`.
    /// The function receives, in order: its configured permissions, the
    /// construct's consumer grant, and every construct-wide grant so far.
    pub fn add_sub_resource(
        &mut self,
        unit: &str,
        cid: ConstructId,
        key: &str,
        definition: impl Into<FunctionDefinition>,
    ) -> SynthResult<FunctionId> {
        let construct = self.checked_construct(cid)?;
        let construct_unit = construct.unit.clone();
        let construct_id = construct.id.clone();

        if construct.sub_resources.contains_key(key)
            || (construct.kind.single_consumer() && !construct.sub_resources.is_empty())
        {
            let existing = construct.sub_resources.keys().next().cloned().unwrap_or_default();
            return Err(SynthError::DuplicateResource {
                unit: construct_unit,
                id: format!("{}/{}", construct_id, existing),
            });
        }

        let kind = construct.kind;
        let function_defaults = construct.function_defaults.clone();
        let replay = construct.permissions.clone();
        let consumer_grant = kind
            .consumer_grant()
            .and_then(|method| construct.handle.native_grant(method))
            .unwrap_or_default();

        let fid = match definition.into() {
            FunctionDefinition::Props(props) => {
                let function_id = format!("{}-{}", construct_id, key_slug(key));
                self.build_function(unit, &function_id, function_defaults.as_ref(), &props)?
            }
            FunctionDefinition::Existing(fid) => {
                if function_defaults.is_some() {
                    return Err(IncompatibleDefaultsError::new(&construct_id, key).into());
                }
                let record = self.checked_function(fid)?;
                if record.policy.is_frozen() {
                    return Err(PolicyFrozenError::new(&record.unit, &record.id).into());
                }
                fid
            }
        };

        let record = self.function_mut(fid)?;
        let owner = record.unit.clone();
        let policy = &mut record.policy;
        policy.attach_records(consumer_grant)?;
        for permissions in &replay {
            policy.attach(permissions)?;
        }

        if owner != construct_unit {
            self.record_import(&owner, &construct_unit, &construct_id)?;
        }

        info!(
            construct = %construct_id,
            key,
            unit = %owner,
            replayed = replay.len(),
            "Added sub-resource"
        );
        self.constructs[cid.0].sub_resources.insert(
            key.to_string(),
            SubResource {
                key: key.to_string(),
                function: fid,
                unit: owner,
            },
        );
        Ok(fid)
    }

    /// Attach permissions to every sub-resource, present and future.
    ///
    /// Fails without side effects if a descriptor is unsupported or any
    /// current sub-resource belongs to a rendered unit.
    pub fn attach_permissions_to_construct(
        &mut self,
        cid: ConstructId,
        permissions: &Permissions,
    ) -> SynthResult<()> {
        for descriptor in permissions.descriptors() {
            GrantDispatcher::resolve(descriptor)?;
        }

        let targets: Vec<FunctionId> = self
            .checked_construct(cid)?
            .sub_resources
            .values()
            .map(|sub| sub.function)
            .collect();
        for fid in &targets {
            let record = self.checked_function(*fid)?;
            if record.policy.is_frozen() {
                return Err(PolicyFrozenError::new(&record.unit, &record.id).into());
            }
        }

        for fid in &targets {
            self.function_mut(*fid)?.policy.attach(permissions)?;
        }

        let construct = &mut self.constructs[cid.0];
        construct.permissions.push(permissions.clone());
        debug!(
            construct = %construct.id,
            sub_resources = targets.len(),
            "Attached construct-wide permissions"
        );
        Ok(())
    }

    /// Attach permissions to the function of one sub-resource
    pub fn attach_permissions_to(
        &mut self,
        cid: ConstructId,
        key: &str,
        permissions: &Permissions,
    ) -> SynthResult<usize> {
        let construct = self.checked_construct(cid)?;
        let fid = construct
            .sub_resources
            .get(key)
            .map(|sub| sub.function)
            .ok_or_else(|| UnknownSubResourceError::new(&construct.id, key))?;
        self.attach_permissions(fid, permissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_slug() {
        assert_eq!(key_slug("GET /notes/{id}"), "GET_notes_id");
        assert_eq!(key_slug("$default"), "default");
        assert_eq!(key_slug("/"), "default");
    }

    #[test]
    fn test_construct_kind_handles() {
        assert_eq!(ConstructKind::Api.resource_kind(), ResourceKind::HttpApi);
        assert_eq!(ConstructKind::try_parse("kinesis_stream"), Some(ConstructKind::KinesisStream));
        assert!(ConstructKind::Queue.single_consumer());
    }
}
