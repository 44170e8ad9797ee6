//! Reactions to the engine's lifecycle callbacks

use crate::arena::EventBufferArena;
use crate::error::Result;
use crate::event::{ImageState, JobEvent};
use crate::traits::{EngineControl, JobCallback};
use embassy_sync::blocking_mutex::raw::RawMutex;
use log::{debug, error, info};

/// Apply the application's policy for one lifecycle callback
///
/// `Processed` is the only place event buffers go back to the arena.
pub fn handle_job_event<M, E, const NUM_BUFFERS: usize, const BUFFER_SIZE: usize>(
    event: JobEvent,
    arena: &EventBufferArena<M, NUM_BUFFERS, BUFFER_SIZE>,
    engine: &E,
    unsubscribe_on_shutdown: bool,
) -> Result<()>
where
    M: RawMutex,
    E: EngineControl + ?Sized,
{
    match event {
        JobEvent::Activate => {
            info!("Received activate callback from the update engine");
            match engine.activate_new_image() {
                Ok(()) => info!("New image activated"),
                // Needs manual activation from here on
                Err(e) => error!("New image activation failed: {}", e),
            }
            engine.shutdown(unsubscribe_on_shutdown);
            Ok(())
        }
        JobEvent::Fail => {
            info!("Received fail callback from the update engine");
            Ok(())
        }
        JobEvent::StartTest => {
            info!("Received start-test callback from the update engine");
            match engine.set_image_state(ImageState::Accepted) {
                Ok(()) => {
                    info!("Successfully updated with the new image");
                    Ok(())
                }
                Err(e) => {
                    error!("Failed to set image state as accepted: {}", e);
                    Err(e)
                }
            }
        }
        JobEvent::Processed(Some(handle)) => {
            debug!("Received processed callback for {}", handle);
            arena.release(handle)
        }
        JobEvent::Processed(None) => {
            debug!("Received processed callback without a buffer");
            Ok(())
        }
        JobEvent::SelfTestFailed => {
            error!("Self-test of new image failed, shutting down the update engine");
            engine.shutdown(unsubscribe_on_shutdown);
            Ok(())
        }
    }
}

/// [`JobCallback`] applying [`handle_job_event`] against borrowed state
pub struct LifecycleReactor<'a, M, E, const NUM_BUFFERS: usize, const BUFFER_SIZE: usize>
where
    M: RawMutex,
    E: EngineControl + ?Sized,
{
    arena: &'a EventBufferArena<M, NUM_BUFFERS, BUFFER_SIZE>,
    engine: &'a E,
    unsubscribe_on_shutdown: bool,
}

impl<'a, M, E, const NUM_BUFFERS: usize, const BUFFER_SIZE: usize>
    LifecycleReactor<'a, M, E, NUM_BUFFERS, BUFFER_SIZE>
where
    M: RawMutex,
    E: EngineControl + ?Sized,
{
    pub fn new(
        arena: &'a EventBufferArena<M, NUM_BUFFERS, BUFFER_SIZE>,
        engine: &'a E,
        unsubscribe_on_shutdown: bool,
    ) -> Self {
        Self {
            arena,
            engine,
            unsubscribe_on_shutdown,
        }
    }
}

impl<M, E, const NUM_BUFFERS: usize, const BUFFER_SIZE: usize> JobCallback
    for LifecycleReactor<'_, M, E, NUM_BUFFERS, BUFFER_SIZE>
where
    M: RawMutex,
    E: EngineControl + ?Sized,
{
    fn on_job_event(&self, event: JobEvent) {
        // Failures are logged where they happen; the engine cannot act on them
        let _ = handle_job_event(event, self.arena, self.engine, self.unsubscribe_on_shutdown);
    }
}
