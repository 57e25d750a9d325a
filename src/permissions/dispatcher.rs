//! Grant dispatcher
//!
//! Resolves one descriptor into normalized grant records, with this precedence:
//! 1. `"*"` - every action on every resource
//! 2. bare service name - `<service>:*` on every resource
//! 3. `service:Action` - that action on every resource
//! 4. resource handle - the kind's fixed action set on the handle's ARNs
//! 5. `[handle, method]` - the handle's native grant method
//! 6. raw statement - passed through unchanged
//!
//! Unrecognized shapes never reach the dispatcher: they are rejected when the
//! descriptor is parsed.
//!
//! A raw JSON array is ambiguous: `[handle, "grantPublish"]` is one grant
//! tuple, `["s3", "sns"]` is a list. [`GrantDispatcher::resolve_value`] reads
//! it as a tuple first and as a list only when the tuple does not resolve.

use crate::error::UnsupportedPermissionError;
use crate::permissions::descriptor::{PermissionDescriptor, Permissions};
use crate::permissions::handle::{ResourceHandle, ResourceKind, SECRET_READ};
use crate::permissions::policy::GrantRecord;
use serde_json::Value;
use tracing::trace;

/// Stateless descriptor resolver
pub struct GrantDispatcher;

impl GrantDispatcher {
    /// Resolve one descriptor
    pub fn resolve(
        descriptor: &PermissionDescriptor,
    ) -> Result<Vec<GrantRecord>, UnsupportedPermissionError> {
        let records = match descriptor {
            PermissionDescriptor::Wildcard => vec![GrantRecord::allow(["*"], ["*"])],

            PermissionDescriptor::ServiceAction {
                service,
                action: None,
            } => vec![GrantRecord::allow([format!("{}:*", service)], ["*"])],

            PermissionDescriptor::ServiceAction {
                service,
                action: Some(action),
            } => vec![GrantRecord::allow([format!("{}:{}", service, action)], ["*"])],

            PermissionDescriptor::Resource(handle) => Self::resolve_handle(handle),

            PermissionDescriptor::GrantMethod { handle, method } => handle
                .native_grant(method)
                .ok_or_else(|| {
                    UnsupportedPermissionError::unknown_grant_method(handle.to_string(), method)
                })?,

            PermissionDescriptor::Statement(record) => vec![record.clone()],
        };

        trace!(descriptor = %descriptor, count = records.len(), "Resolved descriptor");
        Ok(records)
    }

    /// Resolve a raw descriptor value: one descriptor, a grant tuple, or a list
    pub fn resolve_value(value: &Value) -> Result<Vec<GrantRecord>, UnsupportedPermissionError> {
        if !value.is_array() {
            return Self::resolve(&PermissionDescriptor::from_value(value)?);
        }

        let tuple_err = match PermissionDescriptor::from_value(value) {
            Ok(descriptor) => match Self::resolve(&descriptor) {
                Ok(records) => return Ok(records),
                Err(err) => Some(err),
            },
            Err(_) => None,
        };

        let permissions = match (Permissions::from_value(value), tuple_err) {
            (Ok(permissions), _) => permissions,
            (Err(_), Some(err)) | (Err(err), None) => return Err(err),
        };
        let mut records = Vec::new();
        for descriptor in permissions.descriptors() {
            records.extend(Self::resolve(descriptor)?);
        }
        Ok(records)
    }

    /// Fixed per-kind action table
    fn resolve_handle(handle: &ResourceHandle) -> Vec<GrantRecord> {
        let arn = handle.arn();

        match handle.kind {
            ResourceKind::Function | ResourceKind::Job => {
                vec![GrantRecord::allow(["lambda:*"], [arn])]
            }
            ResourceKind::Queue => vec![GrantRecord::allow(["sqs:*"], [arn])],
            ResourceKind::Topic => vec![GrantRecord::allow(["sns:*"], [arn])],
            ResourceKind::Table => vec![GrantRecord::allow(
                ["dynamodb:*"],
                [arn.to_string(), format!("{}/*", arn)],
            )],
            ResourceKind::Bucket => vec![GrantRecord::allow(
                ["s3:*"],
                [arn.to_string(), format!("{}/*", arn)],
            )],
            ResourceKind::EventBus => vec![GrantRecord::allow(["events:*"], [arn])],
            ResourceKind::KinesisStream => vec![GrantRecord::allow(["kinesis:*"], [arn])],
            ResourceKind::DeliveryStream => vec![GrantRecord::allow(["firehose:*"], [arn])],
            ResourceKind::HttpApi | ResourceKind::RestApi | ResourceKind::GraphqlApi => {
                vec![GrantRecord::allow(
                    ["execute-api:Invoke"],
                    [format!("{}/*", arn)],
                )]
            }
            ResourceKind::WebsocketApi => vec![
                GrantRecord::allow(["execute-api:Invoke"], [format!("{}/*", arn)]),
                GrantRecord::allow(
                    ["execute-api:ManageConnections"],
                    [handle.connections_arn()],
                ),
            ],
            ResourceKind::AppsyncApi => {
                vec![GrantRecord::allow(["appsync:GraphQL"], [format!("{}/*", arn)])]
            }
            ResourceKind::Database => {
                let mut records = vec![GrantRecord::allow(["rds-data:*"], [arn])];
                if let Some(secret) = &handle.identity.secret_arn {
                    records.push(GrantRecord::allow(SECRET_READ.iter().copied(), [secret]));
                }
                if let Some(key) = &handle.identity.key_arn {
                    records.push(GrantRecord::allow(["kms:Decrypt"], [key]));
                }
                records
            }
        }
    }
}
