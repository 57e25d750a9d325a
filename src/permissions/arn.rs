//! ARN construction for handle identities

use serde::{Deserialize, Serialize};

/// Account and region a unit deploys into
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AwsEnv {
    pub account: String,
    pub region: String,
}

impl AwsEnv {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }

    /// `arn:aws:{service}:{region}:{account}:{resource}`
    pub fn arn(&self, service: &str, resource: &str) -> String {
        format!(
            "arn:aws:{}:{}:{}:{}",
            service, self.region, self.account, resource
        )
    }

    pub fn function_arn(&self, name: &str) -> String {
        self.arn("lambda", &format!("function:{}", name))
    }

    pub fn queue_arn(&self, name: &str) -> String {
        self.arn("sqs", name)
    }

    pub fn topic_arn(&self, name: &str) -> String {
        self.arn("sns", name)
    }

    pub fn table_arn(&self, name: &str) -> String {
        self.arn("dynamodb", &format!("table/{}", name))
    }

    /// Bucket ARNs carry neither region nor account
    pub fn bucket_arn(&self, name: &str) -> String {
        format!("arn:aws:s3:::{}", name)
    }

    pub fn event_bus_arn(&self, name: &str) -> String {
        self.arn("events", &format!("event-bus/{}", name))
    }

    pub fn stream_arn(&self, name: &str) -> String {
        self.arn("kinesis", &format!("stream/{}", name))
    }

    pub fn delivery_stream_arn(&self, name: &str) -> String {
        self.arn("firehose", &format!("deliverystream/{}", name))
    }

    /// Execute ARN of an API gateway API; routes are addressed below it
    pub fn execute_api_arn(&self, api_id: &str) -> String {
        self.arn("execute-api", api_id)
    }

    pub fn appsync_api_arn(&self, api_id: &str) -> String {
        self.arn("appsync", &format!("apis/{}", api_id))
    }

    pub fn cluster_arn(&self, name: &str) -> String {
        self.arn("rds", &format!("cluster:{}", name))
    }

    pub fn secret_arn(&self, name: &str) -> String {
        self.arn("secretsmanager", &format!("secret:{}", name))
    }

    pub fn key_arn(&self, key_id: &str) -> String {
        self.arn("kms", &format!("key/{}", key_id))
    }
}

impl Default for AwsEnv {
    fn default() -> Self {
        Self {
            account: "my-account".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regional_arns() {
        let env = AwsEnv::new("123456789012", "eu-west-1");
        assert_eq!(
            env.function_arn("dev-app-fn"),
            "arn:aws:lambda:eu-west-1:123456789012:function:dev-app-fn"
        );
        assert_eq!(
            env.table_arn("notes"),
            "arn:aws:dynamodb:eu-west-1:123456789012:table/notes"
        );
        assert_eq!(
            env.cluster_arn("db"),
            "arn:aws:rds:eu-west-1:123456789012:cluster:db"
        );
    }

    #[test]
    fn test_bucket_arn_is_global() {
        let env = AwsEnv::default();
        assert_eq!(env.bucket_arn("uploads"), "arn:aws:s3:::uploads");
    }
}
