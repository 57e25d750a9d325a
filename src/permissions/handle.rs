//! Resource handles
//!
//! A handle is the provisioning engine's reference to a resource: a kind tag
//! plus the identity attributes (ARNs) grants are derived from. Handles also
//! expose the engine's native grant methods by name.

use crate::permissions::arn::AwsEnv;
use crate::permissions::policy::GrantRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind tag of a resource handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Function,
    Job,
    Queue,
    Topic,
    Table,
    Bucket,
    EventBus,
    KinesisStream,
    DeliveryStream,
    HttpApi,
    RestApi,
    WebsocketApi,
    GraphqlApi,
    AppsyncApi,
    Database,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Function => "function",
            ResourceKind::Job => "job",
            ResourceKind::Queue => "queue",
            ResourceKind::Topic => "topic",
            ResourceKind::Table => "table",
            ResourceKind::Bucket => "bucket",
            ResourceKind::EventBus => "event_bus",
            ResourceKind::KinesisStream => "kinesis_stream",
            ResourceKind::DeliveryStream => "delivery_stream",
            ResourceKind::HttpApi => "http_api",
            ResourceKind::RestApi => "rest_api",
            ResourceKind::WebsocketApi => "websocket_api",
            ResourceKind::GraphqlApi => "graphql_api",
            ResourceKind::AppsyncApi => "appsync_api",
            ResourceKind::Database => "database",
        }
    }

    /// Try to parse a kind from a string
    pub fn try_parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|kind| kind.as_str() == s)
    }

    pub fn all() -> &'static [ResourceKind] {
        &[
            ResourceKind::Function,
            ResourceKind::Job,
            ResourceKind::Queue,
            ResourceKind::Topic,
            ResourceKind::Table,
            ResourceKind::Bucket,
            ResourceKind::EventBus,
            ResourceKind::KinesisStream,
            ResourceKind::DeliveryStream,
            ResourceKind::HttpApi,
            ResourceKind::RestApi,
            ResourceKind::WebsocketApi,
            ResourceKind::GraphqlApi,
            ResourceKind::AppsyncApi,
            ResourceKind::Database,
        ]
    }

    /// Derive the primary ARN of a resource of this kind named `name`
    fn arn(&self, env: &AwsEnv, name: &str) -> String {
        match self {
            ResourceKind::Function | ResourceKind::Job => env.function_arn(name),
            ResourceKind::Queue => env.queue_arn(name),
            ResourceKind::Topic => env.topic_arn(name),
            ResourceKind::Table => env.table_arn(name),
            ResourceKind::Bucket => env.bucket_arn(name),
            ResourceKind::EventBus => env.event_bus_arn(name),
            ResourceKind::KinesisStream => env.stream_arn(name),
            ResourceKind::DeliveryStream => env.delivery_stream_arn(name),
            ResourceKind::HttpApi
            | ResourceKind::RestApi
            | ResourceKind::WebsocketApi
            | ResourceKind::GraphqlApi => env.execute_api_arn(name),
            ResourceKind::AppsyncApi => env.appsync_api_arn(name),
            ResourceKind::Database => env.cluster_arn(name),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity attributes grants are derived from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Primary ARN. For jobs this is the invoker function, for API gateway
    /// APIs the execute-api ARN.
    pub arn: String,

    /// Credentials secret of a database cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_arn: Option<String>,

    /// Customer-managed encryption key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_arn: Option<String>,
}

/// Reference to a provisioned resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle {
    /// Logical id, unique within its unit
    pub id: String,
    pub kind: ResourceKind,
    #[serde(flatten)]
    pub identity: Identity,
}

impl ResourceHandle {
    /// Handle for a resource named `name`, with its ARN derived from `env`
    pub fn new(env: &AwsEnv, kind: ResourceKind, id: impl Into<String>, name: &str) -> Self {
        Self {
            id: id.into(),
            kind,
            identity: Identity {
                arn: kind.arn(env, name),
                secret_arn: None,
                key_arn: None,
            },
        }
    }

    /// Handle for an existing resource referenced by ARN
    pub fn imported(kind: ResourceKind, id: impl Into<String>, arn: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            identity: Identity {
                arn: arn.into(),
                secret_arn: None,
                key_arn: None,
            },
        }
    }

    pub fn with_secret(mut self, secret_arn: impl Into<String>) -> Self {
        self.identity.secret_arn = Some(secret_arn.into());
        self
    }

    pub fn with_key(mut self, key_arn: impl Into<String>) -> Self {
        self.identity.key_arn = Some(key_arn.into());
        self
    }

    pub fn arn(&self) -> &str {
        &self.identity.arn
    }

    /// Management ARN for websocket connections
    pub fn connections_arn(&self) -> String {
        format!("{}/*/*/@connections/*", self.identity.arn)
    }

    /// Invoke the engine's native grant method `method`.
    ///
    /// Returns `None` when the resource kind has no such method.
    pub fn native_grant(&self, method: &str) -> Option<Vec<GrantRecord>> {
        let arn = self.identity.arn.as_str();
        let objects = format!("{}/*", arn);

        let records = match (self.kind, method) {
            (ResourceKind::Function | ResourceKind::Job, "grantInvoke") => vec![
                GrantRecord::allow(["lambda:InvokeFunction"], [arn.to_string(), format!("{}:*", arn)]),
            ],

            (ResourceKind::Queue, "grantSendMessages") => {
                vec![GrantRecord::allow(QUEUE_SEND.iter().copied(), [arn])]
            }
            (ResourceKind::Queue, "grantConsumeMessages") => {
                vec![GrantRecord::allow(QUEUE_CONSUME.iter().copied(), [arn])]
            }
            (ResourceKind::Queue, "grantPurge") => {
                vec![GrantRecord::allow(QUEUE_PURGE.iter().copied(), [arn])]
            }

            (ResourceKind::Topic, "grantPublish") => {
                vec![GrantRecord::allow(["sns:Publish"], [arn])]
            }
            (ResourceKind::Topic, "grantSubscribe") => {
                vec![GrantRecord::allow(["sns:Subscribe"], [arn])]
            }

            (ResourceKind::Table, "grantReadData") => {
                vec![GrantRecord::allow(TABLE_READ.iter().copied(), [arn])]
            }
            (ResourceKind::Table, "grantWriteData") => {
                vec![GrantRecord::allow(TABLE_WRITE.iter().copied(), [arn])]
            }
            (ResourceKind::Table, "grantReadWriteData") => vec![GrantRecord::allow(
                union_of(TABLE_READ, TABLE_WRITE),
                [arn],
            )],
            (ResourceKind::Table, "grantFullAccess") => {
                vec![GrantRecord::allow(["dynamodb:*"], [arn])]
            }

            (ResourceKind::Bucket, "grantRead") => vec![GrantRecord::allow(
                BUCKET_READ.iter().copied(),
                [arn.to_string(), objects],
            )],
            (ResourceKind::Bucket, "grantWrite") => vec![GrantRecord::allow(
                BUCKET_WRITE.iter().copied(),
                [arn.to_string(), objects],
            )],
            (ResourceKind::Bucket, "grantReadWrite") => vec![GrantRecord::allow(
                union_of(BUCKET_READ, BUCKET_WRITE),
                [arn.to_string(), objects],
            )],
            (ResourceKind::Bucket, "grantPut") => {
                vec![GrantRecord::allow(BUCKET_PUT.iter().copied(), [objects])]
            }
            (ResourceKind::Bucket, "grantDelete") => {
                vec![GrantRecord::allow(["s3:DeleteObject*"], [objects])]
            }

            (ResourceKind::EventBus, "grantPutEventsTo") => {
                vec![GrantRecord::allow(["events:PutEvents"], [arn])]
            }

            (ResourceKind::KinesisStream, "grantRead") => {
                vec![GrantRecord::allow(STREAM_READ.iter().copied(), [arn])]
            }
            (ResourceKind::KinesisStream, "grantWrite") => {
                vec![GrantRecord::allow(STREAM_WRITE.iter().copied(), [arn])]
            }
            (ResourceKind::KinesisStream, "grantReadWrite") => vec![GrantRecord::allow(
                union_of(STREAM_READ, STREAM_WRITE),
                [arn],
            )],

            (ResourceKind::DeliveryStream, "grantPutRecords") => vec![GrantRecord::allow(
                ["firehose:PutRecord", "firehose:PutRecordBatch"],
                [arn],
            )],

            (
                ResourceKind::HttpApi
                | ResourceKind::RestApi
                | ResourceKind::WebsocketApi
                | ResourceKind::GraphqlApi,
                "grantInvoke",
            ) => vec![GrantRecord::allow(["execute-api:Invoke"], [objects])],
            (ResourceKind::WebsocketApi, "grantManageConnections") => vec![GrantRecord::allow(
                ["execute-api:ManageConnections"],
                [self.connections_arn()],
            )],

            (ResourceKind::AppsyncApi, "grantQuery") => vec![GrantRecord::allow(
                ["appsync:GraphQL"],
                [format!("{}/types/Query/*", arn)],
            )],
            (ResourceKind::AppsyncApi, "grantMutation") => vec![GrantRecord::allow(
                ["appsync:GraphQL"],
                [format!("{}/types/Mutation/*", arn)],
            )],

            (ResourceKind::Database, "grantDataApiAccess") => {
                let mut records = vec![GrantRecord::allow(DATA_API.iter().copied(), [arn])];
                if let Some(secret) = &self.identity.secret_arn {
                    records.push(GrantRecord::allow(SECRET_READ.iter().copied(), [secret]));
                }
                records
            }

            _ => return None,
        };

        Some(records)
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

const QUEUE_SEND: &[&str] = &[
    "sqs:SendMessage",
    "sqs:GetQueueAttributes",
    "sqs:GetQueueUrl",
];

const QUEUE_CONSUME: &[&str] = &[
    "sqs:ReceiveMessage",
    "sqs:ChangeMessageVisibility",
    "sqs:GetQueueUrl",
    "sqs:DeleteMessage",
    "sqs:GetQueueAttributes",
];

const QUEUE_PURGE: &[&str] = &["sqs:PurgeQueue", "sqs:GetQueueAttributes", "sqs:GetQueueUrl"];

const TABLE_READ: &[&str] = &[
    "dynamodb:BatchGetItem",
    "dynamodb:GetRecords",
    "dynamodb:GetShardIterator",
    "dynamodb:Query",
    "dynamodb:GetItem",
    "dynamodb:Scan",
    "dynamodb:ConditionCheckItem",
    "dynamodb:DescribeTable",
];

const TABLE_WRITE: &[&str] = &[
    "dynamodb:BatchWriteItem",
    "dynamodb:PutItem",
    "dynamodb:UpdateItem",
    "dynamodb:DeleteItem",
    "dynamodb:DescribeTable",
];

const BUCKET_READ: &[&str] = &["s3:GetObject*", "s3:GetBucket*", "s3:List*"];

const BUCKET_WRITE: &[&str] = &[
    "s3:DeleteObject*",
    "s3:PutObject",
    "s3:PutObjectLegalHold",
    "s3:PutObjectRetention",
    "s3:PutObjectTagging",
    "s3:PutObjectVersionTagging",
    "s3:Abort*",
];

const BUCKET_PUT: &[&str] = &[
    "s3:PutObject",
    "s3:PutObjectLegalHold",
    "s3:PutObjectRetention",
    "s3:PutObjectTagging",
    "s3:PutObjectVersionTagging",
    "s3:Abort*",
];

const STREAM_READ: &[&str] = &[
    "kinesis:DescribeStreamSummary",
    "kinesis:GetRecords",
    "kinesis:GetShardIterator",
    "kinesis:ListShards",
    "kinesis:SubscribeToShard",
    "kinesis:DescribeStream",
    "kinesis:ListStreams",
    "kinesis:DescribeStreamConsumer",
];

const STREAM_WRITE: &[&str] = &["kinesis:ListShards", "kinesis:PutRecord", "kinesis:PutRecords"];

const DATA_API: &[&str] = &[
    "rds-data:BatchExecuteStatement",
    "rds-data:BeginTransaction",
    "rds-data:CommitTransaction",
    "rds-data:ExecuteStatement",
    "rds-data:RollbackTransaction",
];

pub(crate) const SECRET_READ: &[&str] = &[
    "secretsmanager:GetSecretValue",
    "secretsmanager:DescribeSecret",
];

/// Actions of `first` followed by the actions of `second` not already listed
fn union_of(first: &[&'static str], second: &[&'static str]) -> Vec<&'static str> {
    let mut actions = first.to_vec();
    for action in second {
        if !actions.contains(action) {
            actions.push(*action);
        }
    }
    actions
}
