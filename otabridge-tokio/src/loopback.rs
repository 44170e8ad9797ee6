//! In-memory MQTT transport
//!
//! Routes publishes between clients of the same process through the topic
//! matcher. Stands in for a broker connection in hosted runs and tests.

use crate::transport::{InboundMessage, MessageHandler, MqttTransport};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use log::{debug, trace, warn};
use otabridge_core::{topic_matches, QoS, TransportError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared subscription table of the loopback broker
#[derive(Debug, Clone)]
pub struct LoopbackBroker {
    subscriptions: Arc<DashMap<String, MessageHandler>>,
    online: Arc<AtomicBool>,
}

impl LoopbackBroker {
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(DashMap::new()),
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    /// A client connected to this broker
    pub fn client(&self) -> LoopbackTransport {
        LoopbackTransport {
            broker: self.clone(),
        }
    }

    /// Take the broker off the network; client operations fail while offline
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Deliver a publish to every matching subscription
    ///
    /// Returns the number of subscriptions that accepted it. A subscriber
    /// whose channel is full misses the message.
    pub fn deliver(&self, topic: &str, payload: impl Into<Bytes>) -> usize {
        let message = InboundMessage::new(topic, payload);
        let mut delivered = 0;

        for entry in self.subscriptions.iter() {
            if !topic_matches(topic, entry.key()).unwrap_or(false) {
                continue;
            }
            match entry.value().try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Subscriber of '{}' missed '{}': {}", entry.key(), topic, e),
            }
        }

        trace!("Delivered '{}' to {} subscriptions", topic, delivered);
        delivered
    }

    pub fn is_subscribed(&self, filter: &str) -> bool {
        self.subscriptions.contains_key(filter)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn ensure_online(&self) -> Result<(), TransportError> {
        if self.is_online() {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }
}

impl Default for LoopbackBroker {
    fn default() -> Self {
        Self::new()
    }
}

/// Client handle onto a [`LoopbackBroker`]
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    broker: LoopbackBroker,
}

impl LoopbackTransport {
    pub fn broker(&self) -> &LoopbackBroker {
        &self.broker
    }
}

#[async_trait]
impl MqttTransport for LoopbackTransport {
    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        _qos: QoS,
    ) -> Result<(), TransportError> {
        self.broker.ensure_online()?;
        if topic.is_empty() || topic.contains(['+', '#']) {
            return Err(TransportError::Rejected);
        }
        self.broker.deliver(topic, Bytes::copy_from_slice(payload));
        Ok(())
    }

    async fn subscribe(
        &mut self,
        filter: &str,
        _qos: QoS,
        handler: MessageHandler,
    ) -> Result<(), TransportError> {
        self.broker.ensure_online()?;
        if filter.is_empty() {
            return Err(TransportError::Rejected);
        }
        debug!("Loopback subscription to '{}'", filter);
        self.broker.subscriptions.insert(filter.to_string(), handler);
        Ok(())
    }

    async fn unsubscribe(&mut self, filter: &str) -> Result<(), TransportError> {
        self.broker.ensure_online()?;
        self.broker.subscriptions.remove(filter);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::inbound_channel;

    #[tokio::test]
    async fn test_publish_reaches_matching_subscriptions() {
        let broker = LoopbackBroker::new();
        let mut client = broker.client();
        let (handler, mut inbound) = inbound_channel(4);

        client
            .subscribe("$aws/things/+/streams/#", QoS::AtMostOnce, handler)
            .await
            .unwrap();
        client
            .publish("$aws/things/core2/streams/s1/data", b"abc", QoS::AtMostOnce)
            .await
            .unwrap();
        client
            .publish("$aws/things/core2/jobs/notify-next", b"{}", QoS::AtMostOnce)
            .await
            .unwrap();

        let message = inbound.recv().await.unwrap();
        assert_eq!(message.topic, "$aws/things/core2/streams/s1/data");
        assert_eq!(&message.payload[..], b"abc");
        assert!(inbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_offline_broker_fails_operations() {
        let broker = LoopbackBroker::new();
        let mut client = broker.client();
        let (handler, _inbound) = inbound_channel(1);

        broker.set_online(false);
        assert_eq!(
            client.publish("a/b", b"x", QoS::AtMostOnce).await,
            Err(TransportError::NotConnected)
        );
        assert_eq!(
            client.subscribe("a/#", QoS::AtMostOnce, handler).await,
            Err(TransportError::NotConnected)
        );
        assert_eq!(broker.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let broker = LoopbackBroker::new();
        let mut client = broker.client();
        let (handler, _inbound) = inbound_channel(1);

        client.subscribe("a/+", QoS::AtMostOnce, handler).await.unwrap();
        assert!(broker.is_subscribed("a/+"));
        assert_eq!(broker.deliver("a/b", "x"), 1);

        client.unsubscribe("a/+").await.unwrap();
        assert_eq!(broker.deliver("a/b", "x"), 0);
    }

    #[tokio::test]
    async fn test_publish_to_wildcard_topic_is_rejected() {
        let broker = LoopbackBroker::new();
        let mut client = broker.client();
        assert_eq!(
            client.publish("a/+", b"x", QoS::AtMostOnce).await,
            Err(TransportError::Rejected)
        );
    }
}
