//! Events exchanged with the update engine

use crate::arena::BufferHandle;

/// Semantic kind of an event submitted to the engine
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A job document arrived (notification or accepted response)
    JobDocumentReceived,
    /// A block of the streamed file arrived
    FileBlockReceived,
    /// Begin processing jobs
    Start,
    /// Stop processing jobs
    Stop,
    /// Topic outside the update namespace, never submitted
    OtherIgnored,
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            EventKind::JobDocumentReceived => write!(f, "job document received"),
            EventKind::FileBlockReceived => write!(f, "file block received"),
            EventKind::Start => write!(f, "start"),
            EventKind::Stop => write!(f, "stop"),
            EventKind::OtherIgnored => write!(f, "ignored"),
        }
    }
}

/// Event handed to the engine's submission entry point
///
/// When `buffer` is set, the engine owns that buffer until it reports
/// [`JobEvent::Processed`] with the same handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DispatchedEvent {
    pub kind: EventKind,
    pub buffer: Option<BufferHandle>,
    pub len: usize,
}

impl DispatchedEvent {
    pub const fn start() -> Self {
        Self {
            kind: EventKind::Start,
            buffer: None,
            len: 0,
        }
    }

    pub const fn stop() -> Self {
        Self {
            kind: EventKind::Stop,
            buffer: None,
            len: 0,
        }
    }

    pub const fn with_buffer(kind: EventKind, buffer: BufferHandle, len: usize) -> Self {
        Self {
            kind,
            buffer: Some(buffer),
            len,
        }
    }
}

/// Lifecycle callback delivered by the engine
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// Downloaded image verified, ready to boot
    Activate,
    /// Job failed; the engine recovers on its own
    Fail,
    /// Running a freshly booted image for the first time
    StartTest,
    /// Engine is done with an event and its buffer
    Processed(Option<BufferHandle>),
    /// The new image failed its self test
    SelfTestFailed,
}

/// Verdict on the running image reported back to the engine
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ImageState {
    Testing,
    Accepted,
    Rejected,
    Aborted,
}

/// Coarse engine state as seen by the monitor loop
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AgentState {
    Init,
    Ready,
    Active,
    Suspended,
    ShuttingDown,
    Stopped,
}

/// Packet counters for the job in progress
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct AgentStatistics {
    pub packets_received: u32,
    pub packets_queued: u32,
    pub packets_processed: u32,
    pub packets_dropped: u32,
}

impl core::fmt::Display for AgentStatistics {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Received: {}   Queued: {}   Processed: {}   Dropped: {}",
            self.packets_received,
            self.packets_queued,
            self.packets_processed,
            self.packets_dropped
        )
    }
}
