//! Kafka administration seam used by the registrar to create topics.
//!
//! [`AdminClient`] is the only capability the registrar needs from the broker.
//! [`KafkaAdmin`] implements it on top of rdkafka's admin API and folds the
//! broker's error codes into [`AdminError`].

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::admin::{AdminClient as RdAdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::ClientConfig;
use tracing::debug;

use crate::config::Settings;
use crate::error::AdminError;
use crate::topic::TopicSpec;

/// Broker-side topic management.
#[async_trait]
pub trait AdminClient: Send + Sync {
    /// Issue a single create-topic request.
    async fn create_topic(&self, spec: &TopicSpec) -> Result<(), AdminError>;
}

/// [`AdminClient`] backed by an rdkafka admin connection.
pub struct KafkaAdmin {
    client: RdAdminClient<DefaultClientContext>,
    timeout: Duration,
}

impl KafkaAdmin {
    /// Connect to `brokers` with automatic topic creation disabled.
    ///
    /// `timeout` bounds both the request and the broker-side operation.
    pub fn new(brokers: &str, timeout: Duration) -> Result<Self, KafkaError> {
        let client: RdAdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("allow.auto.create.topics", "false")
            .create()?;
        Ok(Self { client, timeout })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, KafkaError> {
        Self::new(&settings.message_broker_url, settings.admin_timeout())
    }

    fn options(&self) -> AdminOptions {
        AdminOptions::new()
            .operation_timeout(Some(self.timeout))
            .request_timeout(Some(self.timeout))
    }
}

#[async_trait]
impl AdminClient for KafkaAdmin {
    async fn create_topic(&self, spec: &TopicSpec) -> Result<(), AdminError> {
        let mut new_topic = NewTopic::new(
            &spec.name,
            spec.partitions,
            TopicReplication::Fixed(spec.replication_factor),
        );
        for (key, value) in &spec.config {
            new_topic = new_topic.set(key, value);
        }

        let results = self
            .client
            .create_topics([&new_topic], &self.options())
            .await
            .map_err(|e| classify_kafka_error(&spec.name, e))?;

        for result in results {
            match result {
                Ok(name) => debug!(topic = %name, "create_topics acknowledged"),
                Err((name, code)) => return Err(classify_error_code(&name, code)),
            }
        }
        Ok(())
    }
}

/// Map a per-topic broker error code onto the admin error taxonomy.
pub fn classify_error_code(topic: &str, code: RDKafkaErrorCode) -> AdminError {
    use RDKafkaErrorCode::*;

    let detail = format!("topic '{topic}': {code}");
    match code {
        TopicAlreadyExists => AdminError::AlreadyExists(topic.to_string()),
        BrokerTransportFailure | AllBrokersDown | BrokerNotAvailable | NetworkException
        | OperationTimedOut | RequestTimedOut => AdminError::Connection(detail),
        TopicAuthorizationFailed | ClusterAuthorizationFailed | SaslAuthenticationFailed
        | Authentication => AdminError::Authorization(detail),
        InvalidPartitions | InvalidReplicationFactor | InvalidReplicaAssignment | InvalidConfig
        | InvalidTopic | InvalidRequest | PolicyViolation => AdminError::InvalidSpec(detail),
        _ => AdminError::Other(detail),
    }
}

/// Map a request-level client error, which may not carry a broker code.
///
/// A failed admin request surfaces as `AdminOp`, whose code
/// `rdkafka_error_code()` does not expose, so it is matched first.
pub fn classify_kafka_error(topic: &str, err: KafkaError) -> AdminError {
    if let KafkaError::AdminOp(code) = err {
        return classify_error_code(topic, code);
    }
    match err.rdkafka_error_code() {
        Some(code) => classify_error_code(topic, code),
        None => AdminError::Other(format!("topic '{topic}': {err}")),
    }
}
