//! Activity Events Consumer
//!
//! Consumes like/comment count updates from Kafka and applies them to stored
//! posts. Events are fire-and-forget: one for an unknown post is logged and
//! dropped, and an event older than the post's stored activity timestamp is
//! ignored.

use crate::error::AppError;
use crate::models::ActivityEvent;
use crate::services::PostService;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Configuration for the activity Kafka consumer
#[derive(Debug, Clone)]
pub struct ActivityConsumerConfig {
    pub brokers: String,
    pub group_id: String,
    pub activity_topic: String,
}

impl ActivityConsumerConfig {
    /// Load configuration from environment variables. Returns None when no
    /// brokers are configured, which disables the consumer.
    pub fn from_env() -> Option<Self> {
        let brokers = std::env::var("KAFKA_BROKERS").ok()?;

        if brokers.trim().is_empty() {
            return None;
        }

        Some(Self {
            brokers,
            group_id: std::env::var("KAFKA_ACTIVITY_GROUP_ID")
                .unwrap_or_else(|_| "activity-group".to_string()),
            activity_topic: std::env::var("KAFKA_ACTIVITY_TOPIC")
                .unwrap_or_else(|_| "activity-topic".to_string()),
        })
    }
}

/// Activity consumer that overwrites post engagement counters
pub struct ActivityConsumer {
    service: Arc<PostService>,
    config: ActivityConsumerConfig,
}

impl ActivityConsumer {
    pub fn new(service: Arc<PostService>, config: ActivityConsumerConfig) -> Self {
        Self { service, config }
    }

    /// Run the consumer loop
    pub async fn run(self) {
        if let Err(err) = self.run_inner().await {
            error!("Activity consumer terminated with error: {err}");
        }
    }

    async fn run_inner(self) -> Result<(), KafkaError> {
        info!(
            "Starting activity consumer (topic: {}, group: {})",
            self.config.activity_topic, self.config.group_id
        );

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.config.brokers)
            .set("group.id", &self.config.group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "latest")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "45000")
            .set("max.poll.interval.ms", "300000")
            .create()?;

        consumer.subscribe(&[&self.config.activity_topic])?;

        loop {
            match consumer.recv().await {
                Ok(record) => {
                    let Some(data) = record.payload() else {
                        debug!(
                            "Received Kafka message with empty payload (topic: {})",
                            record.topic()
                        );
                        continue;
                    };

                    if let Err(e) = self.handle_event(data).await {
                        warn!("Failed to handle activity event: {}", e);
                    }

                    if let Err(commit_err) = consumer.commit_message(&record, CommitMode::Async) {
                        warn!("Failed to commit Kafka offset: {}", commit_err);
                    }
                }
                Err(err) => {
                    error!("Kafka error: {}", err);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    /// Handle one activity event: parse, then overwrite the post's counters.
    async fn handle_event(&self, data: &[u8]) -> anyhow::Result<()> {
        let event: ActivityEvent = serde_json::from_slice(data)?;
        let post_id = event.post_id;

        match self.service.apply_activity(event).await {
            Ok(true) => {
                info!("Applied activity event for post {}", post_id);
                Ok(())
            }
            Ok(false) => {
                debug!("Ignored stale activity event for post {}", post_id);
                Ok(())
            }
            Err(AppError::NotFound(_)) => {
                // No retry and no dead-letter: the event is dropped.
                warn!("Dropping activity event for unknown post {}", post_id);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    #[test]
    fn activity_event_parses_from_queue_payload() {
        let raw = r#"{
            "post_id": "5f2f1f5d-6a5b-4c89-9f5e-3f2b8f1c0a11",
            "like_count": 5,
            "comment_count": 2,
            "occurred_at": "2026-08-06T12:00:00Z"
        }"#;

        let event: ActivityEvent = serde_json::from_slice(raw.as_bytes()).expect("parse");
        assert_eq!(
            event.post_id,
            Uuid::parse_str("5f2f1f5d-6a5b-4c89-9f5e-3f2b8f1c0a11").expect("uuid")
        );
        assert_eq!(event.like_count, 5);
        assert_eq!(event.comment_count, 2);
        assert_eq!(
            event.occurred_at,
            Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let raw = br#"{"post_id": "not-a-uuid"}"#;
        assert!(serde_json::from_slice::<ActivityEvent>(raw).is_err());
    }
}
