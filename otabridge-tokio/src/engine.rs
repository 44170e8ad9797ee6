//! Seam to the update engine on tokio

use async_trait::async_trait;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::warn;
use otabridge_core::{
    BridgeError, DispatchedEvent, EngineControl, EventBufferArena, EventSink, JobCallback,
    PayloadSource, Result,
};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Arena shared between the ingest task and the engine task
pub type SharedArena<const NUM_BUFFERS: usize, const BUFFER_SIZE: usize> =
    EventBufferArena<CriticalSectionRawMutex, NUM_BUFFERS, BUFFER_SIZE>;

/// Receiving end of the engine's event queue
pub type EngineEventReceiver = mpsc::Receiver<DispatchedEvent>;

/// Submission end of the engine's event queue
///
/// Never waits: a full queue is reported as [`BridgeError::QueueFull`].
#[derive(Debug, Clone)]
pub struct EngineEventSender(mpsc::Sender<DispatchedEvent>);

impl EventSink for EngineEventSender {
    fn signal(&self, event: DispatchedEvent) -> Result<()> {
        self.0.try_send(event).map_err(|e| match e {
            TrySendError::Full(event) => {
                warn!("Engine event queue full, {} event not submitted", event.kind);
                BridgeError::QueueFull
            }
            TrySendError::Closed(_) => BridgeError::QueueClosed,
        })
    }
}

/// Bounded engine event queue of `depth` entries
pub fn event_channel(depth: usize) -> (EngineEventSender, EngineEventReceiver) {
    let (tx, rx) = mpsc::channel(depth);
    (EngineEventSender(tx), rx)
}

/// An update engine that can be driven from a tokio task
#[async_trait]
pub trait UpdateEngine: EngineControl + Send + Sync + 'static {
    /// Process events until the engine stops
    ///
    /// Payloads of buffered events are read through `payloads`. Every
    /// buffered event must eventually be reported back through `callback`
    /// as `JobEvent::Processed` with its handle.
    async fn run_event_loop(
        &self,
        events: EngineEventReceiver,
        payloads: &(dyn PayloadSource + Sync),
        callback: &(dyn JobCallback + Sync),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use otabridge_core::EventKind;

    #[tokio::test]
    async fn test_sender_reports_full_and_closed_queue() {
        let (sender, mut receiver) = event_channel(1);

        sender.signal(DispatchedEvent::start()).unwrap();
        assert_eq!(
            sender.signal(DispatchedEvent::stop()),
            Err(BridgeError::QueueFull)
        );
        assert_eq!(receiver.recv().await.unwrap().kind, EventKind::Start);

        drop(receiver);
        assert_eq!(
            sender.signal(DispatchedEvent::stop()),
            Err(BridgeError::QueueClosed)
        );
    }
}
