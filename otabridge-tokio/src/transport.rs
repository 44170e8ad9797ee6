//! MQTT transport abstraction
//!
//! The client library behind the bridge. Connection handling and keep-alive
//! stay inside the implementation; the bridge only publishes, subscribes and
//! unsubscribes.

use async_trait::async_trait;
use bytes::Bytes;
use otabridge_core::{QoS, TransportError};
use tokio::sync::mpsc;

/// A publish received from the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Where a subscription delivers its messages
pub type MessageHandler = mpsc::Sender<InboundMessage>;

/// Receiving end drained by the ingest task
pub type InboundReceiver = mpsc::Receiver<InboundMessage>;

/// Bounded channel carrying inbound publishes to the ingest task
pub fn inbound_channel(capacity: usize) -> (MessageHandler, InboundReceiver) {
    mpsc::channel(capacity)
}

/// MQTT client operations used by the bridge
#[async_trait]
pub trait MqttTransport: Send + 'static {
    async fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS)
        -> Result<(), TransportError>;

    async fn subscribe(
        &mut self,
        filter: &str,
        qos: QoS,
        handler: MessageHandler,
    ) -> Result<(), TransportError>;

    async fn unsubscribe(&mut self, filter: &str) -> Result<(), TransportError>;
}
