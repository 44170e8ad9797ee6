//! Serialised access to the shared MQTT client

use crate::transport::{MessageHandler, MqttTransport};
use log::{error, info};
use otabridge_core::{BridgeError, QoS, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

/// Publish/subscribe/unsubscribe through one shared transport
///
/// Every call waits at most `lock_timeout` for the client lock and gives up
/// with [`BridgeError::LockTimeout`] instead of retrying. Clones share the
/// same client.
pub struct PublishGateway<T: MqttTransport> {
    client: Arc<Mutex<T>>,
    lock_timeout: Duration,
}

impl<T: MqttTransport> Clone for PublishGateway<T> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            lock_timeout: self.lock_timeout,
        }
    }
}

impl<T: MqttTransport> PublishGateway<T> {
    pub fn new(client: T, lock_timeout: Duration) -> Self {
        Self {
            client: Arc::new(Mutex::new(client)),
            lock_timeout,
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    pub async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> Result<()> {
        let mut client = self.lock().await?;
        match client.publish(topic, payload, qos).await {
            Ok(()) => {
                info!("Published to topic '{}'", topic);
                Ok(())
            }
            Err(e) => {
                error!("Failed to publish to topic '{}': {}", topic, e);
                Err(e.into())
            }
        }
    }

    pub async fn subscribe(&self, filter: &str, qos: QoS, handler: MessageHandler) -> Result<()> {
        let mut client = self.lock().await?;
        match client.subscribe(filter, qos, handler).await {
            Ok(()) => {
                info!("Subscribed to topic filter '{}'", filter);
                Ok(())
            }
            Err(e) => {
                error!("Failed to subscribe to topic filter '{}': {}", filter, e);
                Err(e.into())
            }
        }
    }

    pub async fn unsubscribe(&self, filter: &str) -> Result<()> {
        let mut client = self.lock().await?;
        match client.unsubscribe(filter).await {
            Ok(()) => {
                info!("Unsubscribed from topic filter '{}'", filter);
                Ok(())
            }
            Err(e) => {
                error!("Failed to unsubscribe from topic filter '{}': {}", filter, e);
                Err(e.into())
            }
        }
    }

    async fn lock(&self) -> Result<MutexGuard<'_, T>> {
        tokio::time::timeout(self.lock_timeout, self.client.lock())
            .await
            .map_err(|_| {
                error!("Could not take the client lock within {:?}", self.lock_timeout);
                BridgeError::LockTimeout {
                    timeout_ms: self.lock_timeout.as_millis() as u64,
                }
            })
    }
}
