//! Seams to the collaborators around the core

use crate::arena::BufferHandle;
use crate::error::Result;
use crate::event::{AgentState, AgentStatistics, DispatchedEvent, ImageState, JobEvent};

/// Event submission entry point of the update engine
///
/// Called from the network callback context, so implementations must not
/// block: a full queue is reported as `BridgeError::QueueFull`.
pub trait EventSink {
    fn signal(&self, event: DispatchedEvent) -> Result<()>;
}

impl<S: EventSink + ?Sized> EventSink for &S {
    fn signal(&self, event: DispatchedEvent) -> Result<()> {
        (**self).signal(event)
    }
}

/// Read access to payloads staged for the engine
pub trait PayloadSource {
    /// Copy the payload behind `handle` into `out`, returning its length
    fn copy_payload(&self, handle: BufferHandle, out: &mut [u8]) -> Result<usize>;
}

/// Control requests the core makes of the update engine
pub trait EngineControl {
    /// Boot into the downloaded image
    ///
    /// Normally does not return on a device; returning at all means the
    /// activation did not happen.
    fn activate_new_image(&self) -> Result<()>;

    /// Ask the engine to wind down, optionally dropping its job subscriptions
    fn shutdown(&self, unsubscribe: bool);

    fn set_image_state(&self, state: ImageState) -> Result<()>;

    fn state(&self) -> AgentState;

    fn statistics(&self) -> AgentStatistics;
}

impl<E: EngineControl + ?Sized> EngineControl for &E {
    fn activate_new_image(&self) -> Result<()> {
        (**self).activate_new_image()
    }

    fn shutdown(&self, unsubscribe: bool) {
        (**self).shutdown(unsubscribe)
    }

    fn set_image_state(&self, state: ImageState) -> Result<()> {
        (**self).set_image_state(state)
    }

    fn state(&self) -> AgentState {
        (**self).state()
    }

    fn statistics(&self) -> AgentStatistics {
        (**self).statistics()
    }
}

/// Receiver of the engine's lifecycle callbacks
pub trait JobCallback {
    fn on_job_event(&self, event: JobEvent);
}
