//! Inbound publish classification and hand-off
//!
//! Runs in the transport's callback context. Routes each publish on a
//! reserved update topic into an event buffer and submits it to the engine;
//! everything else is ignored.

use crate::arena::{BufferHandle, EventBufferArena};
use crate::error::{BridgeError, Result};
use crate::event::{DispatchedEvent, EventKind};
use crate::topics::{
    topic_matches, DATA_STREAM_TOPIC_FILTER, JOB_ACCEPTED_RESPONSE_TOPIC_FILTER,
    JOB_NOTIFY_TOPIC_FILTER,
};
use crate::traits::EventSink;
use embassy_sync::blocking_mutex::raw::RawMutex;
use log::{debug, error, trace, warn};

/// A topic filter and the event kind its messages become
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Route {
    pub filter: &'static str,
    pub kind: EventKind,
}

impl Route {
    pub const fn new(filter: &'static str, kind: EventKind) -> Self {
        Self { filter, kind }
    }
}

/// Update-protocol routes in priority order
pub const OTA_ROUTES: [Route; 3] = [
    Route::new(JOB_NOTIFY_TOPIC_FILTER, EventKind::JobDocumentReceived),
    Route::new(
        JOB_ACCEPTED_RESPONSE_TOPIC_FILTER,
        EventKind::JobDocumentReceived,
    ),
    Route::new(DATA_STREAM_TOPIC_FILTER, EventKind::FileBlockReceived),
];

/// What happened to an inbound message
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Staged in `handle` and submitted to the engine
    Dispatched {
        kind: EventKind,
        handle: BufferHandle,
        len: usize,
    },
    /// Topic outside the routed namespace
    Ignored,
    /// Routed but not delivered
    Dropped(BridgeError),
}

/// Classifies inbound publishes and forwards them to the engine
pub struct IngestDispatcher<'a, M, S, const NUM_BUFFERS: usize, const BUFFER_SIZE: usize>
where
    M: RawMutex,
    S: EventSink,
{
    arena: &'a EventBufferArena<M, NUM_BUFFERS, BUFFER_SIZE>,
    sink: S,
    routes: &'a [Route],
}

impl<'a, M, S, const NUM_BUFFERS: usize, const BUFFER_SIZE: usize>
    IngestDispatcher<'a, M, S, NUM_BUFFERS, BUFFER_SIZE>
where
    M: RawMutex,
    S: EventSink,
{
    /// Dispatcher over the update-protocol routes
    pub fn new(arena: &'a EventBufferArena<M, NUM_BUFFERS, BUFFER_SIZE>, sink: S) -> Self {
        Self::with_routes(arena, sink, &OTA_ROUTES)
    }

    pub fn with_routes(
        arena: &'a EventBufferArena<M, NUM_BUFFERS, BUFFER_SIZE>,
        sink: S,
        routes: &'a [Route],
    ) -> Self {
        Self {
            arena,
            sink,
            routes,
        }
    }

    /// Event kind of the first route whose filter matches `topic`
    ///
    /// Returns `EventKind::OtherIgnored` when no route matches.
    pub fn classify(&self, topic: &str) -> Result<EventKind> {
        for route in self.routes {
            if topic_matches(topic, route.filter)? {
                return Ok(route.kind);
            }
        }
        Ok(EventKind::OtherIgnored)
    }

    /// Handle one inbound publish
    ///
    /// Drops the message (and logs) when it cannot be staged or the engine
    /// refuses it; never blocks beyond the arena's critical section.
    pub fn on_message(&self, topic: &str, payload: &[u8]) -> DispatchOutcome {
        let kind = match self.classify(topic) {
            Ok(EventKind::OtherIgnored) => {
                trace!("Ignoring message on '{}'", topic);
                return DispatchOutcome::Ignored;
            }
            Ok(kind) => kind,
            Err(e) => {
                warn!("Cannot classify inbound message: {}", e);
                return DispatchOutcome::Dropped(e);
            }
        };

        match self.stage_and_signal(kind, payload) {
            Ok((handle, len)) => {
                debug!("Dispatched {} ({} bytes, {}) from '{}'", kind, len, handle, topic);
                DispatchOutcome::Dispatched { kind, handle, len }
            }
            Err(e) => {
                error!("Dropping {} message from '{}': {}", kind, topic, e);
                DispatchOutcome::Dropped(e)
            }
        }
    }

    fn stage_and_signal(&self, kind: EventKind, payload: &[u8]) -> Result<(BufferHandle, usize)> {
        // Checked up front so an oversize payload never takes a buffer
        if payload.len() > BUFFER_SIZE {
            return Err(BridgeError::PayloadTooLarge {
                max_size: BUFFER_SIZE,
                actual_size: payload.len(),
            });
        }

        let handle = self.arena.acquire()?;
        let submitted = self
            .arena
            .fill(handle, payload)
            .and_then(|len| {
                self.sink
                    .signal(DispatchedEvent::with_buffer(kind, handle, len))
                    .map(|_| len)
            });

        match submitted {
            Ok(len) => Ok((handle, len)),
            Err(e) => {
                // Engine never saw the buffer, so it will never release it
                let _ = self.arena.release(handle);
                Err(e)
            }
        }
    }

    pub fn arena(&self) -> &'a EventBufferArena<M, NUM_BUFFERS, BUFFER_SIZE> {
        self.arena
    }
}
