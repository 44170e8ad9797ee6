//! # otabridge core
//!
//! `no_std` core of the bridge between an MQTT broker and a firmware update
//! engine.
//!
//! Inbound publishes are classified by topic filter, staged in a fixed pool
//! of event buffers and handed to the engine as events. The engine gives each
//! buffer back through its lifecycle callback once it is done with it.
//!
//! ## Features
//!
//! - **no_std** compatible, no heap usage
//! - **MQTT wildcards** - `+` and `#` topic filter matching
//! - **Bounded** - event buffers sized at compile time via const generics;
//!   when they run out, inbound messages are dropped, never queued
//! - **Runtime agnostic** - the arena lock is any `embassy_sync` raw mutex,
//!   the engine and transport are traits
//!
//! ## Limitations
//!
//! - No message persistence or redelivery
//! - Payloads are opaque; job documents and file blocks are not parsed

#![cfg_attr(not(test), no_std)]

pub mod arena;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod qos;
pub mod topics;
pub mod traits;

pub use arena::{BufferHandle, EventBufferArena};
pub use dispatcher::{DispatchOutcome, IngestDispatcher, Route, OTA_ROUTES};
pub use error::{BridgeError, Result, TransportError};
pub use event::{
    AgentState, AgentStatistics, DispatchedEvent, EventKind, ImageState, JobEvent,
};
pub use lifecycle::{handle_job_event, LifecycleReactor};
pub use qos::QoS;
pub use topics::{
    topic_matches, DATA_STREAM_TOPIC_FILTER, DEFAULT_TOPIC_FILTER,
    JOB_ACCEPTED_RESPONSE_TOPIC_FILTER, JOB_NOTIFY_TOPIC_FILTER, TOPIC_PREFIX,
};
pub use traits::{EngineControl, EventSink, JobCallback, PayloadSource};

/// Arena sized for one file block per buffer and a short engine queue
pub type DefaultEventBufferArena<M> = EventBufferArena<M, 4, 5120>;

/// Small arena for constrained targets
pub type SmallEventBufferArena<M> = EventBufferArena<M, 2, 1024>;
