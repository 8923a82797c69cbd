//! Topic definitions submitted to the broker's administrative API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::RegistrarError;

/// Longest topic name Kafka accepts.
pub const MAX_TOPIC_NAME_LEN: usize = 249;

/// Topic-level settings applied when no override is given.
pub const DEFAULT_TOPIC_CONFIG: &[(&str, &str)] = &[
    ("cleanup.policy", "delete"),
    ("compression.type", "lz4"),
    ("delete.retention.ms", "2000"),
    ("file.delete.delay.ms", "2000"),
];

/// Name, layout and retention settings of a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i32,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

impl TopicSpec {
    /// Single partition, replication factor 1 and [`DEFAULT_TOPIC_CONFIG`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partitions: 1,
            replication_factor: 1,
            config: DEFAULT_TOPIC_CONFIG
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn partitions(mut self, partitions: i32) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn replication_factor(mut self, replication_factor: i32) -> Self {
        self.replication_factor = replication_factor;
        self
    }

    /// Sets or replaces a single topic-level config entry.
    pub fn config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Drops all config entries, including the defaults.
    pub fn without_config(mut self) -> Self {
        self.config.clear();
        self
    }

    /// Checks the spec locally so obviously broken requests never reach the broker.
    pub fn validate(&self) -> Result<(), RegistrarError> {
        validate_name(&self.name)?;
        if self.partitions <= 0 {
            return Err(RegistrarError::InvalidSpec(format!(
                "topic '{}': partitions must be positive, got {}",
                self.name, self.partitions
            )));
        }
        if self.replication_factor <= 0 {
            return Err(RegistrarError::InvalidSpec(format!(
                "topic '{}': replication factor must be positive, got {}",
                self.name, self.replication_factor
            )));
        }
        if self.config.keys().any(|k| k.trim().is_empty()) {
            return Err(RegistrarError::InvalidSpec(format!(
                "topic '{}': empty config key",
                self.name
            )));
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), RegistrarError> {
    if name.is_empty() {
        return Err(RegistrarError::InvalidSpec("topic name is empty".into()));
    }
    if name == "." || name == ".." {
        return Err(RegistrarError::InvalidSpec(format!(
            "topic name '{name}' is reserved"
        )));
    }
    if name.len() > MAX_TOPIC_NAME_LEN {
        return Err(RegistrarError::InvalidSpec(format!(
            "topic name is {} characters long, limit is {MAX_TOPIC_NAME_LEN}",
            name.len()
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(RegistrarError::InvalidSpec(format!(
            "topic name '{name}' contains illegal character '{c}'"
        )));
    }
    Ok(())
}
