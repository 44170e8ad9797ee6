//! Periodic telemetry publisher

use crate::config::BridgeConfig;
use crate::gateway::PublishGateway;
use crate::transport::MqttTransport;
use bytes::Bytes;
use log::{debug, warn};
use otabridge_core::topics::device_publish_topic;
use otabridge_core::{QoS, Result};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::{interval_at, sleep, Instant};

const MAX_TOPIC_LENGTH: usize = 128;

/// Publishes queued readings to the device topic on a fixed cadence
pub struct PeriodicPublisher<T: MqttTransport> {
    gateway: PublishGateway<T>,
    topic: String,
    interval: Duration,
    spacing: Duration,
}

impl<T: MqttTransport> PeriodicPublisher<T> {
    pub fn new(gateway: PublishGateway<T>, client_id: &str, config: &BridgeConfig) -> Result<Self> {
        let topic = device_publish_topic::<MAX_TOPIC_LENGTH>(client_id)?;
        Ok(Self {
            gateway,
            topic: topic.as_str().to_string(),
            interval: config.publish_interval(),
            spacing: config.publish_spacing(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Drain `readings` every interval until the channel closes
    ///
    /// A reading that fails to publish is dropped. Returns how many were
    /// published.
    pub async fn run(self, mut readings: mpsc::Receiver<Bytes>) -> usize {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        let mut published = 0;

        loop {
            ticker.tick().await;
            loop {
                match readings.try_recv() {
                    Ok(reading) => {
                        match self
                            .gateway
                            .publish(&self.topic, &reading, QoS::AtMostOnce)
                            .await
                        {
                            Ok(()) => published += 1,
                            Err(e) => warn!("Dropping reading for '{}': {}", self.topic, e),
                        }
                        sleep(self.spacing).await;
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        debug!("Readings channel closed after {} publishes", published);
                        return published;
                    }
                }
            }
        }
    }
}
