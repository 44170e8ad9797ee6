//! Ingest task: inbound publishes into engine events

use crate::engine::SharedArena;
use crate::transport::InboundReceiver;
use log::{debug, info};
use otabridge_core::{DispatchOutcome, EventSink, IngestDispatcher};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Tally of what the ingest task did with its messages
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub dispatched: u32,
    pub ignored: u32,
    pub dropped: u32,
}

impl IngestSummary {
    fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Dispatched { .. } => self.dispatched += 1,
            DispatchOutcome::Ignored => self.ignored += 1,
            DispatchOutcome::Dropped(_) => self.dropped += 1,
        }
    }
}

/// Drain `inbound` through an [`IngestDispatcher`]
///
/// Runs until the inbound channel closes or `shutdown` fires.
pub async fn run_ingest<S, const NUM_BUFFERS: usize, const BUFFER_SIZE: usize>(
    mut inbound: InboundReceiver,
    arena: Arc<SharedArena<NUM_BUFFERS, BUFFER_SIZE>>,
    sink: S,
    mut shutdown: oneshot::Receiver<()>,
) -> IngestSummary
where
    S: EventSink + Send,
{
    let dispatcher = IngestDispatcher::new(&*arena, sink);
    let mut summary = IngestSummary::default();

    loop {
        tokio::select! {
            message = inbound.recv() => {
                let Some(message) = message else {
                    debug!("Inbound channel closed");
                    break;
                };
                let outcome = dispatcher.on_message(&message.topic, &message.payload);
                summary.record(&outcome);
            }
            _ = &mut shutdown => {
                debug!("Ingest shutdown requested");
                break;
            }
        }
    }

    info!(
        "Ingest finished: {} dispatched, {} ignored, {} dropped",
        summary.dispatched, summary.ignored, summary.dropped
    );
    summary
}
