//! Service that registers the configured topics and keeps a heartbeat flowing
//! into each of them until shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use topic_registrar::config::Settings;
use topic_registrar::{KafkaAdmin, KafkaPublisher, TopicProducer, TopicRegistrar, TopicSpec};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Serialize)]
struct Heartbeat<'a> {
    topic: &'a str,
    sequence: u64,
    emitted_at: DateTime<Utc>,
}

fn heartbeat(topic: &str, sequence: u64) -> Heartbeat<'_> {
    Heartbeat {
        topic,
        sequence,
        emitted_at: Utc::now(),
    }
}

async fn open_producers(
    settings: &Settings,
    registrar: &TopicRegistrar,
    specs: Vec<TopicSpec>,
) -> anyhow::Result<Vec<TopicProducer>> {
    let mut producers = Vec::with_capacity(specs.len());
    for spec in specs {
        let name = spec.name.clone();
        let publisher = KafkaPublisher::from_settings(settings)
            .with_context(|| format!("creating kafka producer for {name}"))?;
        let producer = TopicProducer::new(registrar, spec, Arc::new(publisher))
            .await
            .with_context(|| format!("registering topic {name}"))?;
        producers.push(producer);
    }
    Ok(producers)
}

/// Publish one heartbeat per producer every `period` until `shutdown` resolves.
///
/// `shutdown` is polled as a single future for the whole run, so a signal
/// that lands while a round is publishing is seen on the next iteration.
/// Returns the number of rounds published.
async fn run_heartbeats<F>(producers: &[TopicProducer], period: Duration, shutdown: F) -> u64
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut sequence = 0u64;
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                for producer in producers {
                    if let Err(e) = producer.publish_event(&heartbeat(producer.topic(), sequence)).await {
                        error!(topic = producer.topic(), %e, "failed to publish heartbeat");
                    }
                }
                sequence += 1;
            }
        }
    }
    sequence
}

async fn close_all(producers: &[TopicProducer]) {
    for producer in producers {
        if let Err(e) = producer.close().await {
            warn!(topic = producer.topic(), %e, "failed to close producer cleanly");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let settings = Settings::new().context("loading settings")?;
    let specs = settings.topic_specs();
    if specs.is_empty() {
        warn!("TOPICS is empty, nothing to produce");
        return Ok(());
    }

    let admin = KafkaAdmin::from_settings(&settings).context("creating kafka admin client")?;
    let registrar = TopicRegistrar::new(Arc::new(admin));
    let producers = open_producers(&settings, &registrar, specs).await?;
    info!(
        broker = %settings.message_broker_url,
        topics = ?registrar.known_topics(),
        "station-producer started"
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(%e, "failed to listen for shutdown signal");
        }
    };
    let rounds = run_heartbeats(&producers, settings.heartbeat_interval(), shutdown).await;

    info!(rounds, "shutting down");
    close_all(&producers).await;
    Ok(())
}
