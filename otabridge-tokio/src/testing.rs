//! Test doubles shared by the runtime tests

use crate::engine::{EngineEventReceiver, UpdateEngine};
use async_trait::async_trait;
use otabridge_core::{
    AgentState, AgentStatistics, DispatchedEvent, EngineControl, EventKind, ImageState,
    JobCallback, JobEvent, PayloadSource, Result,
};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    ActivateNewImage,
    Shutdown { unsubscribe: bool },
    SetImageState(ImageState),
}

#[derive(Debug)]
struct Recorded {
    state: AgentState,
    stats: AgentStatistics,
    kinds: Vec<EventKind>,
    payloads: Vec<Vec<u8>>,
    calls: Vec<EngineCall>,
    statistics_reads: u32,
    file_blocks: u32,
}

/// Engine that records what it is given and reports every buffer processed
///
/// With `activating_after(n)` it raises `Activate` after the n-th file block,
/// like an engine that finished a download.
#[derive(Debug)]
pub struct ScriptedEngine {
    recorded: Mutex<Recorded>,
    activate_after_blocks: Option<u32>,
    panic_on_start: bool,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self {
            recorded: Mutex::new(Recorded {
                state: AgentState::Init,
                stats: AgentStatistics::default(),
                kinds: Vec::new(),
                payloads: Vec::new(),
                calls: Vec::new(),
                statistics_reads: 0,
                file_blocks: 0,
            }),
            activate_after_blocks: None,
            panic_on_start: false,
        }
    }
}

impl ScriptedEngine {
    pub fn activating_after(blocks: u32) -> Self {
        Self {
            activate_after_blocks: Some(blocks),
            ..Self::default()
        }
    }

    /// Engine whose task dies on `Start` without ever reaching `Stopped`
    pub fn panicking_on_start() -> Self {
        Self {
            panic_on_start: true,
            ..Self::default()
        }
    }

    pub fn set_state(&self, state: AgentState) {
        self.recorded.lock().unwrap().state = state;
    }

    pub fn received_kinds(&self) -> Vec<EventKind> {
        self.recorded.lock().unwrap().kinds.clone()
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.recorded.lock().unwrap().payloads.clone()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.recorded.lock().unwrap().calls.clone()
    }

    pub fn statistics_reads(&self) -> u32 {
        self.recorded.lock().unwrap().statistics_reads
    }

    /// Record one event; returns the callbacks it triggers
    fn accept(&self, event: DispatchedEvent, payloads: &dyn PayloadSource) -> Vec<JobEvent> {
        let mut recorded = self.recorded.lock().unwrap();
        recorded.kinds.push(event.kind);

        match event.kind {
            EventKind::Start => recorded.state = AgentState::Active,
            EventKind::Stop => recorded.state = AgentState::Stopped,
            _ => {}
        }

        let Some(handle) = event.buffer else {
            return Vec::new();
        };

        recorded.stats.packets_received += 1;
        let mut payload = vec![0u8; event.len];
        match payloads.copy_payload(handle, &mut payload) {
            Ok(len) => {
                payload.truncate(len);
                recorded.payloads.push(payload);
                recorded.stats.packets_processed += 1;
            }
            Err(_) => recorded.stats.packets_dropped += 1,
        }

        let mut callbacks = vec![JobEvent::Processed(Some(handle))];
        if event.kind == EventKind::FileBlockReceived {
            recorded.file_blocks += 1;
            if Some(recorded.file_blocks) == self.activate_after_blocks {
                callbacks.push(JobEvent::Activate);
            }
        }
        callbacks
    }
}

impl EngineControl for ScriptedEngine {
    fn activate_new_image(&self) -> Result<()> {
        self.recorded
            .lock()
            .unwrap()
            .calls
            .push(EngineCall::ActivateNewImage);
        Ok(())
    }

    fn shutdown(&self, unsubscribe: bool) {
        let mut recorded = self.recorded.lock().unwrap();
        recorded.calls.push(EngineCall::Shutdown { unsubscribe });
        recorded.state = AgentState::ShuttingDown;
    }

    fn set_image_state(&self, state: ImageState) -> Result<()> {
        self.recorded
            .lock()
            .unwrap()
            .calls
            .push(EngineCall::SetImageState(state));
        Ok(())
    }

    fn state(&self) -> AgentState {
        self.recorded.lock().unwrap().state
    }

    fn statistics(&self) -> AgentStatistics {
        let mut recorded = self.recorded.lock().unwrap();
        recorded.statistics_reads += 1;
        recorded.stats
    }
}

#[async_trait]
impl UpdateEngine for ScriptedEngine {
    async fn run_event_loop(
        &self,
        mut events: EngineEventReceiver,
        payloads: &(dyn PayloadSource + Sync),
        callback: &(dyn JobCallback + Sync),
    ) {
        while let Some(event) = events.recv().await {
            if self.panic_on_start && event.kind == EventKind::Start {
                panic!("engine task failed on start");
            }
            for job_event in self.accept(event, payloads) {
                callback.on_job_event(job_event);
            }
            if matches!(self.state(), AgentState::ShuttingDown | AgentState::Stopped) {
                break;
            }
        }
        self.set_state(AgentState::Stopped);
    }
}
