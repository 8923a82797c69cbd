//! Topic registration for Kafka producers: ensures each topic is created at
//! most once per process, no matter how many producers ask for it or how
//! concurrently, and wraps producer handles with flush/close lifecycle hooks.

pub mod admin;
pub mod config;
pub mod error;
pub mod producer;
pub mod registrar;
pub mod topic;

pub use admin::{AdminClient, KafkaAdmin};
pub use error::{AdminError, ProducerError, PublishError, RegistrarError};
pub use producer::{KafkaPublisher, Publisher, PublisherLifecycle, TopicProducer};
pub use registrar::{RegistryState, TopicRegistrar};
pub use topic::TopicSpec;
