//! Producer handles built on top of the registrar.
//!
//! A [`TopicProducer`] is bound to one topic. Constructing it ensures the topic
//! exists; closing it flushes and shuts down the underlying [`Publisher`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::{ProducerError, PublishError};
use crate::registrar::TopicRegistrar;
use crate::topic::TopicSpec;

/// Shutdown hooks of a producer. Both are safe to call more than once.
#[async_trait]
pub trait PublisherLifecycle: Send + Sync {
    async fn flush(&self) -> Result<(), PublishError>;
    /// Deliver what is still queued, then release the producer.
    async fn close(&self) -> Result<(), PublishError>;
}

/// Opaque message sink; serialization and partitioning belong to the implementation.
#[async_trait]
pub trait Publisher: PublisherLifecycle {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), PublishError>;
}

/// [`Publisher`] backed by an rdkafka [`FutureProducer`].
pub struct KafkaPublisher {
    producer: RwLock<Option<FutureProducer>>,
    queue_timeout: Duration,
    flush_timeout: Duration,
}

impl KafkaPublisher {
    pub fn new(
        brokers: &str,
        message_timeout: Duration,
        flush_timeout: Duration,
    ) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", message_timeout.as_millis().to_string())
            .set("allow.auto.create.topics", "false")
            .create()?;
        Ok(Self {
            producer: RwLock::new(Some(producer)),
            queue_timeout: Duration::from_secs(0),
            flush_timeout,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, KafkaError> {
        Self::new(
            &settings.message_broker_url,
            Duration::from_millis(settings.message_timeout_ms),
            settings.flush_timeout(),
        )
    }

    fn handle(&self) -> Option<FutureProducer> {
        self.producer.read().clone()
    }

    async fn flush_producer(&self, producer: FutureProducer) -> Result<(), PublishError> {
        let timeout = self.flush_timeout;
        // rdkafka's flush blocks the calling thread until the queue drains.
        tokio::task::spawn_blocking(move || producer.flush(timeout)).await??;
        Ok(())
    }
}

#[async_trait]
impl PublisherLifecycle for KafkaPublisher {
    async fn flush(&self) -> Result<(), PublishError> {
        match self.handle() {
            Some(producer) => self.flush_producer(producer).await,
            None => Ok(()),
        }
    }

    async fn close(&self) -> Result<(), PublishError> {
        let taken = self.producer.write().take();
        let Some(producer) = taken else {
            debug!("producer already closed");
            return Ok(());
        };
        self.flush_producer(producer).await
    }
}

#[async_trait]
impl Publisher for KafkaPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), PublishError> {
        let producer = self.handle().ok_or(PublishError::Closed)?;
        let record = FutureRecord::to(topic).key(key).payload(payload);
        let (partition, offset) = producer
            .send(record, self.queue_timeout)
            .await
            .map_err(|(e, _)| PublishError::Kafka(e))?;
        debug!(topic, partition, offset, "message delivered");
        Ok(())
    }
}

/// Epoch milliseconds, used as the default message key.
pub fn time_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Producer bound to a single topic that is guaranteed to exist.
pub struct TopicProducer {
    spec: TopicSpec,
    publisher: Arc<dyn Publisher>,
}

impl TopicProducer {
    /// Ensure `spec` via `registrar`, then bind `publisher` to it.
    ///
    /// Producers sharing a registrar create each topic only once.
    pub async fn new(
        registrar: &TopicRegistrar,
        spec: TopicSpec,
        publisher: Arc<dyn Publisher>,
    ) -> Result<Self, ProducerError> {
        registrar.ensure_topic(&spec).await?;
        Ok(Self { spec, publisher })
    }

    pub fn topic(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &TopicSpec {
        &self.spec
    }

    pub async fn publish(&self, key: &str, payload: &[u8]) -> Result<(), ProducerError> {
        self.publisher.publish(&self.spec.name, key, payload).await?;
        Ok(())
    }

    pub async fn publish_json<T>(&self, key: &str, value: &T) -> Result<(), ProducerError>
    where
        T: Serialize + ?Sized + Sync,
    {
        let payload = serde_json::to_vec(value)?;
        self.publish(key, &payload).await
    }

    /// Publish `value` keyed by [`time_millis`].
    pub async fn publish_event<T>(&self, value: &T) -> Result<(), ProducerError>
    where
        T: Serialize + ?Sized + Sync,
    {
        let key = time_millis().to_string();
        self.publish_json(&key, value).await
    }

    /// Flush outstanding messages and close the publisher.
    pub async fn close(&self) -> Result<(), ProducerError> {
        self.publisher.close().await?;
        info!(topic = %self.spec.name, "closed producer");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::AdminClient;
    use crate::error::{AdminError, RegistrarError};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct MemoryPublisher {
        sent: Mutex<Vec<(String, String, Vec<u8>)>>,
        flushes: AtomicUsize,
        closes: AtomicUsize,
        closed: AtomicBool,
    }

    #[async_trait]
    impl PublisherLifecycle for MemoryPublisher {
        async fn flush(&self) -> Result<(), PublishError> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self) -> Result<(), PublishError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl Publisher for MemoryPublisher {
        async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), PublishError> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(PublishError::Closed);
            }
            self.sent.lock().push((topic.into(), key.into(), payload.to_vec()));
            Ok(())
        }
    }

    struct FixedAdmin(Result<(), AdminError>);

    #[async_trait]
    impl AdminClient for FixedAdmin {
        async fn create_topic(&self, _spec: &TopicSpec) -> Result<(), AdminError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn publishes_json_events() {
        let registrar = TopicRegistrar::new(Arc::new(FixedAdmin(Ok(()))));
        let publisher = Arc::new(MemoryPublisher::default());
        let producer = TopicProducer::new(&registrar, TopicSpec::new("arrivals"), publisher.clone())
            .await
            .unwrap();

        producer
            .publish_event(&serde_json::json!({"station_id": 40380, "line": "blue"}))
            .await
            .unwrap();

        let sent = publisher.sent.lock();
        assert_eq!(sent.len(), 1);
        let (topic, key, payload) = &sent[0];
        assert_eq!(topic, "arrivals");
        assert!(key.parse::<i64>().unwrap() > 0);
        let value: serde_json::Value = serde_json::from_slice(payload).unwrap();
        assert_eq!(value["line"], "blue");
    }

    #[tokio::test]
    async fn close_shuts_publisher_once_then_rejects_publish() {
        let registrar = TopicRegistrar::new(Arc::new(FixedAdmin(Ok(()))));
        let publisher = Arc::new(MemoryPublisher::default());
        let producer = TopicProducer::new(&registrar, TopicSpec::new("turnstile"), publisher.clone())
            .await
            .unwrap();

        producer.close().await.unwrap();
        assert_eq!(publisher.flushes.load(Ordering::SeqCst), 0);
        assert_eq!(publisher.closes.load(Ordering::SeqCst), 1);
        assert!(publisher.closed.load(Ordering::SeqCst));

        let err = producer.publish("k", b"v").await.unwrap_err();
        assert!(matches!(err, ProducerError::Publish(PublishError::Closed)));
    }

    #[tokio::test]
    async fn construction_fails_when_topic_cannot_be_created() {
        let registrar = TopicRegistrar::new(Arc::new(FixedAdmin(Err(AdminError::Connection(
            "all brokers down".into(),
        )))));
        let publisher = Arc::new(MemoryPublisher::default());

        let err = TopicProducer::new(&registrar, TopicSpec::new("weather"), publisher)
            .await
            .err()
            .unwrap();

        assert!(matches!(
            err,
            ProducerError::Registrar(RegistrarError::ConnectionFailure(_))
        ));
        assert!(!registrar.is_known("weather"));
    }

    #[tokio::test]
    async fn kafka_publisher_close_is_idempotent() {
        let publisher = KafkaPublisher::new(
            "localhost:9092",
            Duration::from_millis(500),
            Duration::from_millis(500),
        )
        .unwrap();

        publisher.close().await.unwrap();
        publisher.close().await.unwrap();
        publisher.flush().await.unwrap();

        let err = publisher.publish("arrivals", "k", b"v").await.unwrap_err();
        assert!(matches!(err, PublishError::Closed));
    }
}
