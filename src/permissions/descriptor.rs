//! Permission descriptors
//!
//! A descriptor is one "allow this function to do X" request. The set of
//! shapes is closed:
//!
//! ```text
//! "*"                          -> Wildcard
//! "s3" | "dynamodb:GetItem"    -> ServiceAction
//! { "kind": "table", ... }     -> Resource (a handle)
//! [ { "kind": ... }, "grant" ] -> GrantMethod (native grant escape hatch)
//! { "actions": [..], ... }     -> Statement (raw, passed through)
//! ```
//!
//! Any other JSON value is rejected with `UnsupportedPermissionError`.

use crate::error::UnsupportedPermissionError;
use crate::permissions::handle::ResourceHandle;
use crate::permissions::policy::GrantRecord;
use regex::Regex;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;

static SERVICE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]*$").expect("valid service pattern"));

static ACTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z0-9][a-z0-9-]*):([A-Za-z0-9*]+)$").expect("valid action pattern")
});

/// One permission-grant request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PermissionDescriptor {
    /// `"*"`: every action on every resource
    Wildcard,
    /// `"s3"` or `"s3:GetObject"` on every resource
    ServiceAction {
        service: String,
        action: Option<String>,
    },
    /// The kind's fixed action set on the handle's own ARNs
    Resource(ResourceHandle),
    /// A native grant method of the handle
    GrantMethod {
        handle: ResourceHandle,
        method: String,
    },
    /// A raw statement, passed through unchanged
    Statement(GrantRecord),
}

impl PermissionDescriptor {
    /// All actions of `service`
    pub fn service(service: impl Into<String>) -> Self {
        PermissionDescriptor::ServiceAction {
            service: service.into(),
            action: None,
        }
    }

    /// One action of `service`
    pub fn action(service: impl Into<String>, action: impl Into<String>) -> Self {
        PermissionDescriptor::ServiceAction {
            service: service.into(),
            action: Some(action.into()),
        }
    }

    pub fn grant(handle: ResourceHandle, method: impl Into<String>) -> Self {
        PermissionDescriptor::GrantMethod {
            handle,
            method: method.into(),
        }
    }

    /// True for raw statements, which are never deduplicated
    pub fn is_raw(&self) -> bool {
        matches!(self, PermissionDescriptor::Statement(_))
    }

    /// Parse a descriptor from its string form
    pub fn parse_str(s: &str) -> Result<Self, UnsupportedPermissionError> {
        if s == "*" {
            return Ok(PermissionDescriptor::Wildcard);
        }
        if SERVICE_PATTERN.is_match(s) {
            return Ok(PermissionDescriptor::service(s));
        }
        if let Some(caps) = ACTION_PATTERN.captures(s) {
            return Ok(PermissionDescriptor::action(&caps[1], &caps[2]));
        }
        Err(UnsupportedPermissionError::unrecognized(format!("{:?}", s)))
    }

    /// Parse a descriptor from any JSON value
    pub fn from_value(value: &Value) -> Result<Self, UnsupportedPermissionError> {
        match value {
            Value::String(s) => Self::parse_str(s),
            Value::Array(items) => match items.as_slice() {
                [handle @ Value::Object(_), Value::String(method)] => {
                    let handle = parse_handle(handle)?;
                    Ok(PermissionDescriptor::grant(handle, method.clone()))
                }
                _ => Err(UnsupportedPermissionError::unrecognized(value.to_string())),
            },
            Value::Object(map) if map.contains_key("kind") => {
                Ok(PermissionDescriptor::Resource(parse_handle(value)?))
            }
            Value::Object(map) if map.contains_key("actions") => {
                serde_json::from_value::<GrantRecord>(value.clone())
                    .map(PermissionDescriptor::Statement)
                    .map_err(|e| UnsupportedPermissionError::new(value.to_string(), e.to_string()))
            }
            _ => Err(UnsupportedPermissionError::unrecognized(value.to_string())),
        }
    }
}

fn parse_handle(value: &Value) -> Result<ResourceHandle, UnsupportedPermissionError> {
    serde_json::from_value(value.clone())
        .map_err(|e| UnsupportedPermissionError::new(value.to_string(), e.to_string()))
}

impl fmt::Display for PermissionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionDescriptor::Wildcard => f.write_str("*"),
            PermissionDescriptor::ServiceAction {
                service,
                action: None,
            } => f.write_str(service),
            PermissionDescriptor::ServiceAction {
                service,
                action: Some(action),
            } => write!(f, "{}:{}", service, action),
            PermissionDescriptor::Resource(handle) => write!(f, "{}", handle),
            PermissionDescriptor::GrantMethod { handle, method } => {
                write!(f, "{}.{}", handle, method)
            }
            PermissionDescriptor::Statement(record) => write!(f, "{}", record.actions.join(",")),
        }
    }
}

impl Serialize for PermissionDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PermissionDescriptor::Wildcard | PermissionDescriptor::ServiceAction { .. } => {
                serializer.collect_str(self)
            }
            PermissionDescriptor::Resource(handle) => handle.serialize(serializer),
            PermissionDescriptor::GrantMethod { handle, method } => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(handle)?;
                seq.serialize_element(method)?;
                seq.end()
            }
            PermissionDescriptor::Statement(record) => record.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for PermissionDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(de::Error::custom)
    }
}

/// The `permissions` field: everything, or a list of descriptors
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Permissions {
    /// `"*"`
    All,
    List(Vec<PermissionDescriptor>),
}

impl Permissions {
    /// Parse from `"*"` or a JSON array of descriptors
    pub fn from_value(value: &Value) -> Result<Self, UnsupportedPermissionError> {
        match value {
            Value::String(s) if s == "*" => Ok(Permissions::All),
            Value::Array(items) => items
                .iter()
                .map(PermissionDescriptor::from_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Permissions::List),
            other => Err(UnsupportedPermissionError::not_a_list(other.to_string())),
        }
    }

    /// Descriptors in order; empty for `All`
    pub fn descriptors(&self) -> &[PermissionDescriptor] {
        match self {
            Permissions::All => &[],
            Permissions::List(list) => list,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Permissions::All)
    }
}

impl From<Vec<PermissionDescriptor>> for Permissions {
    fn from(list: Vec<PermissionDescriptor>) -> Self {
        Permissions::List(list)
    }
}

impl Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Permissions::All => serializer.serialize_str("*"),
            Permissions::List(list) => list.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(de::Error::custom)
    }
}
