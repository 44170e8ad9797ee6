//! # otabridge tokio
//!
//! Tokio runtime support for the otabridge update bridge.
//!
//! Runs the `no_std` core on hosted targets: a shared MQTT client behind a
//! lock with a bounded wait, an ingest task feeding inbound publishes
//! through the dispatcher, the engine's event loop on its own task with a
//! statistics monitor, and a periodic telemetry publisher. Re-exports all
//! types from `otabridge-core` for convenience.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use otabridge_tokio::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = BridgeConfig::default();
//!     let broker = LoopbackBroker::new();
//!     let gateway = PublishGateway::new(broker.client(), config.gateway_lock_timeout());
//!     let bridge = DefaultOtaBridge::new(config, gateway, Arc::new(MyEngine::new()));
//!     let stats = bridge.run().await?;
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod engine;
pub mod gateway;
pub mod ingest;
pub mod loopback;
pub mod shell;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export core for convenience
pub use otabridge_core::*;

pub use bridge::OtaBridge;
pub use config::{AppVersion, BridgeConfig};
pub use engine::{event_channel, EngineEventReceiver, EngineEventSender, SharedArena, UpdateEngine};
pub use gateway::PublishGateway;
pub use ingest::{run_ingest, IngestSummary};
pub use loopback::{LoopbackBroker, LoopbackTransport};
pub use shell::ProcessingTaskShell;
pub use telemetry::PeriodicPublisher;
pub use transport::{inbound_channel, InboundMessage, InboundReceiver, MessageHandler, MqttTransport};

/// Bridge with the default arena sizing
pub type DefaultOtaBridge<T, E> = OtaBridge<T, E, 4, 5120>;
