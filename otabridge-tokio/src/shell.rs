//! Processing task shell
//!
//! Runs the engine's event loop on its own task and watches its statistics
//! until it stops. The lifecycle policy itself lives in
//! [`otabridge_core::lifecycle`].

use crate::engine::{EngineEventReceiver, EngineEventSender, SharedArena, UpdateEngine};
use log::{debug, error, info};
use otabridge_core::{
    AgentState, AgentStatistics, DispatchedEvent, EventSink, LifecycleReactor, Result,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct ProcessingTaskShell<E: UpdateEngine, const NUM_BUFFERS: usize, const BUFFER_SIZE: usize>
{
    engine: Arc<E>,
    arena: Arc<SharedArena<NUM_BUFFERS, BUFFER_SIZE>>,
    events: EngineEventSender,
    unsubscribe_on_shutdown: bool,
}

impl<E: UpdateEngine, const NUM_BUFFERS: usize, const BUFFER_SIZE: usize>
    ProcessingTaskShell<E, NUM_BUFFERS, BUFFER_SIZE>
{
    pub fn new(
        engine: Arc<E>,
        arena: Arc<SharedArena<NUM_BUFFERS, BUFFER_SIZE>>,
        events: EngineEventSender,
        unsubscribe_on_shutdown: bool,
    ) -> Self {
        Self {
            engine,
            arena,
            events,
            unsubscribe_on_shutdown,
        }
    }

    /// Spawn the engine's event loop, wired to the arena and the lifecycle reactor
    pub fn spawn_agent(&self, receiver: EngineEventReceiver) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let arena = Arc::clone(&self.arena);
        let unsubscribe = self.unsubscribe_on_shutdown;

        tokio::spawn(async move {
            let reactor = LifecycleReactor::new(&*arena, &*engine, unsubscribe);
            info!("Update engine task started");
            engine.run_event_loop(receiver, &*arena, &reactor).await;
            info!("Update engine task finished");
        })
    }

    pub fn start(&self) -> Result<()> {
        info!("Starting the update engine");
        self.events.signal(DispatchedEvent::start())
    }

    pub fn stop(&self) -> Result<()> {
        info!("Stopping the update engine");
        self.events.signal(DispatchedEvent::stop())
    }

    /// Report statistics every `interval` until the engine reaches `Stopped`
    ///
    /// Also ends when the `agent` task has finished without reaching
    /// `Stopped`, e.g. after a panic. Returns the statistics read once the
    /// engine stopped.
    pub async fn monitor(&self, interval: Duration, agent: &JoinHandle<()>) -> AgentStatistics {
        let mut ticker = tokio::time::interval(interval);
        let mut last = AgentStatistics::default();

        loop {
            ticker.tick().await;
            match self.engine.state() {
                AgentState::Stopped => {
                    last = self.engine.statistics();
                    break;
                }
                _ if agent.is_finished() => {
                    error!("Update engine task ended without reaching the stopped state");
                    last = self.engine.statistics();
                    break;
                }
                AgentState::Suspended => debug!("Update engine suspended"),
                _ => {
                    last = self.engine.statistics();
                    info!("{}", last);
                }
            }
        }

        info!("Update engine stopped. {}", last);
        last
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::event_channel;
    use crate::testing::{EngineCall, ScriptedEngine};
    use otabridge_core::{EngineControl, EventKind};

    fn new_shell(
        engine: ScriptedEngine,
    ) -> (
        ProcessingTaskShell<ScriptedEngine, 2, 16>,
        EngineEventReceiver,
    ) {
        let (events, receiver) = event_channel(4);
        let shell = ProcessingTaskShell::new(
            Arc::new(engine),
            Arc::new(SharedArena::new()),
            events,
            true,
        );
        (shell, receiver)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_ends_monitor() {
        let (shell, receiver) = new_shell(ScriptedEngine::default());
        let agent = shell.spawn_agent(receiver);

        shell.start().unwrap();
        shell.stop().unwrap();
        shell.monitor(Duration::from_secs(1), &agent).await;
        agent.await.unwrap();

        assert_eq!(
            shell.engine().received_kinds(),
            [EventKind::Start, EventKind::Stop]
        );
        assert_eq!(shell.engine().state(), AgentState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_processed_buffers_return_to_arena() {
        let (shell, receiver) = new_shell(ScriptedEngine::default());
        let agent = shell.spawn_agent(receiver);

        let handle = shell.arena.acquire().unwrap();
        shell.arena.fill(handle, b"block").unwrap();
        shell.start().unwrap();
        shell
            .events
            .signal(DispatchedEvent::with_buffer(
                EventKind::FileBlockReceived,
                handle,
                5,
            ))
            .unwrap();
        shell.stop().unwrap();
        agent.await.unwrap();

        assert_eq!(shell.arena.free_count(), 2);
        assert_eq!(shell.engine().payloads(), [b"block".to_vec()]);
        assert_eq!(shell.engine().statistics().packets_processed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_shuts_engine_down() {
        let (shell, receiver) = new_shell(ScriptedEngine::activating_after(1));
        let agent = shell.spawn_agent(receiver);

        let handle = shell.arena.acquire().unwrap();
        shell.start().unwrap();
        shell
            .events
            .signal(DispatchedEvent::with_buffer(
                EventKind::FileBlockReceived,
                handle,
                0,
            ))
            .unwrap();

        let stats = shell.monitor(Duration::from_secs(1), &agent).await;
        agent.await.unwrap();

        assert_eq!(stats.packets_received, 1);
        assert_eq!(
            shell.engine().calls(),
            [
                EngineCall::ActivateNewImage,
                EngineCall::Shutdown { unsubscribe: true }
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_skips_statistics_while_suspended() {
        let engine = ScriptedEngine::default();
        engine.set_state(AgentState::Suspended);
        let (shell, receiver) = new_shell(engine);
        // Idles on an empty queue
        let agent = shell.spawn_agent(receiver);

        let engine = Arc::clone(shell.engine());
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            engine.set_state(AgentState::Stopped);
        });

        let stats = shell.monitor(Duration::from_secs(1), &agent).await;
        stopper.await.unwrap();

        // Only the final readout after the engine stopped
        assert_eq!(stats, AgentStatistics::default());
        assert_eq!(shell.engine().statistics_reads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_ends_when_engine_task_dies() {
        let (shell, receiver) = new_shell(ScriptedEngine::panicking_on_start());
        let agent = shell.spawn_agent(receiver);
        shell.start().unwrap();

        let monitor = tokio::time::timeout(
            Duration::from_secs(10),
            shell.monitor(Duration::from_secs(1), &agent),
        );
        let stats = monitor.await.expect("monitor kept polling a dead engine");

        assert_eq!(stats, AgentStatistics::default());
        assert_ne!(shell.engine().state(), AgentState::Stopped);
        assert!(agent.await.unwrap_err().is_panic());
    }
}
