//! Composition root wiring transport, arena and engine together

use crate::config::BridgeConfig;
use crate::engine::{event_channel, SharedArena, UpdateEngine};
use crate::gateway::PublishGateway;
use crate::ingest::run_ingest;
use crate::shell::ProcessingTaskShell;
use crate::transport::{inbound_channel, InboundReceiver, MessageHandler, MqttTransport};
use log::{error, info};
use otabridge_core::topics::thing_topic;
use otabridge_core::{AgentStatistics, QoS, Result};
use std::sync::Arc;
use tokio::sync::oneshot;

const MAX_TOPIC_LENGTH: usize = 128;

/// Topic suffixes under `$aws/things/<thing>/` the engine listens on
const UPDATE_TOPIC_SUFFIXES: [&str; 3] = ["jobs/notify-next", "jobs/$next/get/accepted", "streams/#"];

/// Update bridge for one thing
///
/// Owns the event buffers and the inbound channel; [`OtaBridge::run`] drives
/// the engine until it stops.
pub struct OtaBridge<T, E, const NUM_BUFFERS: usize, const BUFFER_SIZE: usize>
where
    T: MqttTransport,
    E: UpdateEngine,
{
    config: BridgeConfig,
    gateway: PublishGateway<T>,
    engine: Arc<E>,
    arena: Arc<SharedArena<NUM_BUFFERS, BUFFER_SIZE>>,
    inbound_handler: MessageHandler,
    inbound: InboundReceiver,
}

impl<T, E, const NUM_BUFFERS: usize, const BUFFER_SIZE: usize>
    OtaBridge<T, E, NUM_BUFFERS, BUFFER_SIZE>
where
    T: MqttTransport,
    E: UpdateEngine,
{
    pub fn new(config: BridgeConfig, gateway: PublishGateway<T>, engine: Arc<E>) -> Self {
        let (inbound_handler, inbound) = inbound_channel(config.inbound_capacity);
        Self {
            config,
            gateway,
            engine,
            arena: Arc::new(SharedArena::new()),
            inbound_handler,
            inbound,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn gateway(&self) -> &PublishGateway<T> {
        &self.gateway
    }

    pub fn arena(&self) -> &Arc<SharedArena<NUM_BUFFERS, BUFFER_SIZE>> {
        &self.arena
    }

    /// Sender feeding the ingest task, for transports that push messages directly
    pub fn inbound_handler(&self) -> MessageHandler {
        self.inbound_handler.clone()
    }

    /// Concrete update topics for the configured thing
    pub fn update_topics(&self) -> Result<Vec<String>> {
        UPDATE_TOPIC_SUFFIXES
            .iter()
            .map(|suffix| {
                thing_topic::<MAX_TOPIC_LENGTH>(&self.config.thing_name, suffix)
                    .map(|topic| topic.as_str().to_string())
            })
            .collect()
    }

    /// Subscribe the inbound channel to the thing's update topics
    pub async fn subscribe_updates(&self) -> Result<()> {
        for topic in self.update_topics()? {
            self.gateway
                .subscribe(&topic, QoS::AtLeastOnce, self.inbound_handler.clone())
                .await?;
        }
        Ok(())
    }

    /// Unsubscribe from the thing's update topics, logging failures
    pub async fn unsubscribe_updates(&self) -> Result<()> {
        for topic in self.update_topics()? {
            if let Err(e) = self.gateway.unsubscribe(&topic).await {
                error!("Leaving subscription to '{}' in place: {}", topic, e);
            }
        }
        Ok(())
    }

    /// Run the engine until it reports `Stopped`
    ///
    /// Subscribes, starts ingest and the engine task, sends `Start` and
    /// monitors statistics. Returns the statistics read once the engine
    /// stopped.
    pub async fn run(self) -> Result<AgentStatistics> {
        info!(
            "Update bridge for '{}' running firmware {}",
            self.config.thing_name, self.config.firmware_version
        );
        self.subscribe_updates().await?;

        let (events, receiver) = event_channel(self.config.event_queue_depth);
        let shell = ProcessingTaskShell::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.arena),
            events.clone(),
            self.config.unsubscribe_on_shutdown,
        );
        let agent = shell.spawn_agent(receiver);

        let (stop_ingest, ingest_shutdown) = oneshot::channel();
        let ingest = tokio::spawn(run_ingest(
            self.inbound,
            Arc::clone(&self.arena),
            events,
            ingest_shutdown,
        ));

        shell.start()?;
        let stats = shell.monitor(self.config.stats_interval(), &agent).await;

        let _ = stop_ingest.send(());
        if let Err(e) = ingest.await {
            error!("Ingest task failed: {}", e);
        }
        if let Err(e) = agent.await {
            error!("Update engine task failed: {}", e);
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::{LoopbackBroker, LoopbackTransport};
    use crate::testing::{EngineCall, ScriptedEngine};
    use otabridge_core::{BridgeError, EventKind, TransportError};

    type TestBridge = OtaBridge<LoopbackTransport, ScriptedEngine, 4, 64>;

    fn new_bridge(broker: &LoopbackBroker, engine: ScriptedEngine) -> TestBridge {
        let config = BridgeConfig {
            thing_name: "core2".to_string(),
            ..BridgeConfig::default()
        };
        let gateway = PublishGateway::new(broker.client(), config.gateway_lock_timeout());
        OtaBridge::new(config, gateway, Arc::new(engine))
    }

    #[test]
    fn test_update_topics_for_thing() {
        let broker = LoopbackBroker::new();
        let bridge = new_bridge(&broker, ScriptedEngine::default());
        assert_eq!(
            bridge.update_topics().unwrap(),
            [
                "$aws/things/core2/jobs/notify-next",
                "$aws/things/core2/jobs/$next/get/accepted",
                "$aws/things/core2/streams/#",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_then_activation() {
        let broker = LoopbackBroker::new();
        let bridge = new_bridge(&broker, ScriptedEngine::activating_after(2));
        let engine = Arc::clone(&bridge.engine);
        let arena = Arc::clone(bridge.arena());

        let run = tokio::spawn(bridge.run());
        tokio::task::yield_now().await;
        assert_eq!(broker.subscription_count(), 3);

        broker.deliver("$aws/things/core2/jobs/notify-next", "{\"job\":1}");
        broker.deliver("$aws/things/core2/streams/fw/data", "block-0");
        broker.deliver("$aws/things/other/streams/fw/data", "not ours");
        broker.deliver("core2/", "telemetry");
        broker.deliver("$aws/things/core2/streams/fw/data", "block-1");

        let stats = run.await.unwrap().unwrap();
        assert_eq!(stats.packets_received, 3);
        assert_eq!(stats.packets_processed, 3);

        assert_eq!(
            engine.received_kinds(),
            [
                EventKind::Start,
                EventKind::JobDocumentReceived,
                EventKind::FileBlockReceived,
                EventKind::FileBlockReceived,
            ]
        );
        assert_eq!(
            engine.payloads(),
            [
                b"{\"job\":1}".to_vec(),
                b"block-0".to_vec(),
                b"block-1".to_vec()
            ]
        );
        assert_eq!(
            engine.calls(),
            [
                EngineCall::ActivateNewImage,
                EngineCall::Shutdown { unsubscribe: true }
            ]
        );
        assert_eq!(arena.free_count(), 4);
    }

    #[tokio::test]
    async fn test_run_fails_when_broker_offline() {
        let broker = LoopbackBroker::new();
        broker.set_online(false);
        let bridge = new_bridge(&broker, ScriptedEngine::default());

        assert_eq!(
            bridge.run().await,
            Err(BridgeError::TransportFailure {
                error: TransportError::NotConnected
            })
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_updates() {
        let broker = LoopbackBroker::new();
        let bridge = new_bridge(&broker, ScriptedEngine::default());

        bridge.subscribe_updates().await.unwrap();
        assert!(broker.is_subscribed("$aws/things/core2/streams/#"));

        bridge.unsubscribe_updates().await.unwrap();
        assert_eq!(broker.subscription_count(), 0);
    }
}
