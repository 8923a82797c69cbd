use thiserror::Error;

/// Failure reported by an administrative collaborator when creating a topic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdminError {
    #[error("topic '{0}' already exists")]
    AlreadyExists(String),
    #[error("broker unreachable: {0}")]
    Connection(String),
    #[error("not authorized: {0}")]
    Authorization(String),
    #[error("rejected topic spec: {0}")]
    InvalidSpec(String),
    #[error("admin request failed: {0}")]
    Other(String),
}

/// Error surfaced by [`crate::registrar::TopicRegistrar::ensure_topic`].
///
/// `AlreadyExists` never appears here: the registrar treats it as success.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrarError {
    #[error("connection failure: {0}")]
    ConnectionFailure(String),
    #[error("authorization failure: {0}")]
    AuthorizationFailure(String),
    #[error("invalid topic spec: {0}")]
    InvalidSpec(String),
    #[error("unknown failure: {0}")]
    Unknown(String),
}

/// Error raised by a [`crate::producer::Publisher`].
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("producer is closed")]
    Closed,
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
    #[error("flush task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Error raised by a [`crate::producer::TopicProducer`].
#[derive(Error, Debug)]
pub enum ProducerError {
    #[error(transparent)]
    Registrar(#[from] RegistrarError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
