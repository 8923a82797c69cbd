use std::time::Duration;

use serde::Deserialize;

use crate::topic::TopicSpec;

fn default_message_broker_url() -> String {
    "localhost:9092".into()
}

fn default_schema_registry_url() -> String {
    "http://localhost:8081".into()
}

fn default_one() -> i32 {
    1
}

fn default_admin_timeout_ms() -> u64 {
    5_000
}

fn default_flush_timeout_ms() -> u64 {
    10_000
}

fn default_message_timeout_ms() -> u64 {
    5_000
}

fn default_heartbeat_interval_ms() -> u64 {
    1_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_message_broker_url")]
    pub message_broker_url: String,
    /// Passed through to serializers; the registrar itself never contacts it.
    #[serde(default = "default_schema_registry_url")]
    pub schema_registry_url: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default = "default_one")]
    pub topic_partitions: i32,
    #[serde(default = "default_one")]
    pub topic_replicas: i32,
    #[serde(default = "default_admin_timeout_ms")]
    pub admin_timeout_ms: u64,
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("topics"),
            )
            .build()?
            .try_deserialize()
    }

    pub fn admin_timeout(&self) -> Duration {
        Duration::from_millis(self.admin_timeout_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// One [`TopicSpec`] per configured topic, using the configured layout.
    pub fn topic_specs(&self) -> Vec<TopicSpec> {
        self.topics
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| {
                TopicSpec::new(t)
                    .partitions(self.topic_partitions)
                    .replication_factor(self.topic_replicas)
            })
            .collect()
    }
}
