use async_trait::async_trait;
use bytes::Bytes;
use log::{error, info, warn};
use otabridge_core::topics::device_subscribe_filter;
use otabridge_tokio::*;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

const NUM_BUFFERS: usize = 4;
const BUFFER_SIZE: usize = 1024;
const FIRMWARE_BLOCKS: u32 = 4;

type Bridge = OtaBridge<LoopbackTransport, DemoEngine, NUM_BUFFERS, BUFFER_SIZE>;

struct EngineState {
    state: AgentState,
    stats: AgentStatistics,
    blocks: u32,
}

/// Toy engine: takes a job document, downloads a fixed number of blocks, activates
struct DemoEngine {
    inner: Mutex<EngineState>,
    total_blocks: u32,
}

impl DemoEngine {
    fn new(total_blocks: u32) -> Self {
        Self {
            inner: Mutex::new(EngineState {
                state: AgentState::Init,
                stats: AgentStatistics::default(),
                blocks: 0,
            }),
            total_blocks,
        }
    }

    fn inner(&self) -> MutexGuard<'_, EngineState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: AgentState) {
        self.inner().state = state;
    }

    /// Returns true once the last block has arrived
    fn consume(&self, event: DispatchedEvent, payloads: &dyn PayloadSource) -> bool {
        let Some(handle) = event.buffer else {
            return false;
        };

        let mut scratch = [0u8; BUFFER_SIZE];
        let mut inner = self.inner();
        inner.stats.packets_received += 1;

        match payloads.copy_payload(handle, &mut scratch) {
            Ok(len) => {
                inner.stats.packets_processed += 1;
                match event.kind {
                    EventKind::JobDocumentReceived => {
                        info!(
                            "Job document: {}",
                            String::from_utf8_lossy(&scratch[..len])
                        );
                    }
                    EventKind::FileBlockReceived => {
                        inner.blocks += 1;
                        info!(
                            "File block {}/{} ({} bytes)",
                            inner.blocks, self.total_blocks, len
                        );
                    }
                    _ => {}
                }
            }
            Err(e) => {
                inner.stats.packets_dropped += 1;
                warn!("Could not read {}: {}", handle, e);
            }
        }

        inner.blocks >= self.total_blocks
    }
}

impl EngineControl for DemoEngine {
    fn activate_new_image(&self) -> Result<()> {
        info!("Activating the downloaded image");
        Ok(())
    }

    fn shutdown(&self, unsubscribe: bool) {
        info!("Engine shutdown requested (unsubscribe: {})", unsubscribe);
        self.set_state(AgentState::ShuttingDown);
    }

    fn set_image_state(&self, state: ImageState) -> Result<()> {
        info!("Image state set to {:?}", state);
        Ok(())
    }

    fn state(&self) -> AgentState {
        self.inner().state
    }

    fn statistics(&self) -> AgentStatistics {
        self.inner().stats
    }
}

#[async_trait]
impl UpdateEngine for DemoEngine {
    async fn run_event_loop(
        &self,
        mut events: EngineEventReceiver,
        payloads: &(dyn PayloadSource + Sync),
        callback: &(dyn JobCallback + Sync),
    ) {
        while let Some(event) = events.recv().await {
            match event.kind {
                EventKind::Start => self.set_state(AgentState::Active),
                EventKind::Stop => break,
                _ => {
                    let complete = self.consume(event, payloads);
                    callback.on_job_event(JobEvent::Processed(event.buffer));
                    if complete {
                        callback.on_job_event(JobEvent::Activate);
                    }
                }
            }
            if self.state() == AgentState::ShuttingDown {
                break;
            }
        }
        self.set_state(AgentState::Stopped);
    }
}

/// Plays the cloud side: offers a job, streams the image, watches telemetry
async fn run_cloud(broker: LoopbackBroker, thing_name: String) -> Result<()> {
    let mut client = broker.client();
    let (telemetry_handler, mut telemetry) = inbound_channel(8);
    let filter = device_subscribe_filter::<64>(&thing_name)?;
    client
        .subscribe(&filter, QoS::AtMostOnce, telemetry_handler)
        .await?;

    tokio::spawn(async move {
        while let Some(message) = telemetry.recv().await {
            info!(
                "Telemetry on '{}': {}",
                message.topic,
                String::from_utf8_lossy(&message.payload)
            );
        }
    });

    sleep(Duration::from_millis(500)).await;
    let job_topic = format!("$aws/things/{}/jobs/notify-next", thing_name);
    client
        .publish(&job_topic, br#"{"execution":{"jobId":"fw-1.2.0"}}"#, QoS::AtLeastOnce)
        .await?;

    let stream_topic = format!("$aws/things/{}/streams/fw-1.2.0/data", thing_name);
    for block in 0..FIRMWARE_BLOCKS {
        sleep(Duration::from_millis(700)).await;
        let payload = vec![block as u8; BUFFER_SIZE / 2];
        client
            .publish(&stream_topic, &payload, QoS::AtMostOnce)
            .await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = BridgeConfig {
        thing_name: "core2".to_string(),
        ..BridgeConfig::default()
    };
    let broker = LoopbackBroker::new();
    let gateway = PublishGateway::new(broker.client(), config.gateway_lock_timeout());

    info!(
        "Configuration: {} buffers of {} bytes, engine queue depth {}",
        NUM_BUFFERS, BUFFER_SIZE, config.event_queue_depth
    );

    let publisher = PeriodicPublisher::new(gateway.clone(), &config.thing_name, &config)?;
    let (readings, readings_rx) = mpsc::channel::<Bytes>(8);
    let telemetry = tokio::spawn(publisher.run(readings_rx));
    let sensor = tokio::spawn(async move {
        for tick in 0..4u32 {
            let reading = format!("{{\"temperature\":{}.{}}}", 21 + tick / 2, tick * 3);
            if readings.send(Bytes::from(reading)).await.is_err() {
                break;
            }
            sleep(Duration::from_millis(800)).await;
        }
    });

    let cloud = tokio::spawn(run_cloud(broker.clone(), config.thing_name.clone()));

    let bridge = Bridge::new(config, gateway, Arc::new(DemoEngine::new(FIRMWARE_BLOCKS)));
    let stats = bridge.run().await?;
    info!("Update finished. {}", stats);

    match cloud.await? {
        Ok(()) => {}
        Err(e) => error!("Cloud side failed: {}", e),
    }
    sensor.await?;
    info!("Published {} telemetry readings", telemetry.await?);

    Ok(())
}
