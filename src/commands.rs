use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use crate::agent_engine::cancel::CancelToken;
use crate::agent_engine::engine::AgentEngine;
use crate::agent_engine::event_bus::EventBus;
use crate::agent_engine::state::RunReport;
use crate::errors::{PilotError, PilotResult};

/// Slot entry for the current run. It stays in place until the run task has
/// returned, even while a caller is waiting on the task.
struct ActiveRun {
    generation: u64,
    cancel: CancelToken,
    finished: Arc<AtomicBool>,
    /// Taken by `wait`; `None` means someone is already waiting.
    task: Option<JoinHandle<RunReport>>,
}

impl ActiveRun {
    fn is_active(&self) -> bool {
        !self.finished.load(Ordering::Acquire)
    }
}

/// Marks the run finished when the task ends, including by panic.
struct FinishedOnDrop(Arc<AtomicBool>);

impl Drop for FinishedOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// What `toggle` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started,
    Stopping,
}

/// Serialises runs of one engine: at most one is in flight, and every run
/// gets its own cancellation token.
pub struct AgentHandle {
    engine: Arc<AgentEngine>,
    active: Mutex<Option<ActiveRun>>,
    generation: AtomicU64,
}

impl AgentHandle {
    pub fn new(engine: Arc<AgentEngine>) -> Self {
        Self {
            engine,
            active: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn engine(&self) -> &Arc<AgentEngine> {
        &self.engine
    }

    /// Progress events of every run started through this handle.
    pub fn events(&self) -> &EventBus {
        self.engine.events()
    }

    pub fn is_running(&self) -> bool {
        self.lock().as_ref().is_some_and(ActiveRun::is_active)
    }

    /// Start a run in the background. Rejected with `Busy` while another is
    /// still in flight.
    pub fn start_task(&self, instruction: String) -> PilotResult<()> {
        let mut active = self.lock();
        if active.as_ref().is_some_and(ActiveRun::is_active) {
            tracing::warn!(task = %instruction, "start_task rejected: run in progress");
            return Err(PilotError::Busy);
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancelToken::new();
        let finished = Arc::new(AtomicBool::new(false));
        let engine = self.engine.clone();
        let token = cancel.clone();
        let flag = FinishedOnDrop(finished.clone());
        tracing::info!(task = %instruction, "start_task");
        let task = tokio::spawn(async move {
            let _flag = flag;
            engine.run(&instruction, token).await
        });
        *active = Some(ActiveRun {
            generation,
            cancel,
            finished,
            task: Some(task),
        });
        Ok(())
    }

    /// Signal the active run to stop. Returns `false` when nothing is running.
    pub fn stop_task(&self) -> bool {
        match self.lock().as_ref() {
            Some(run) if run.is_active() => {
                tracing::info!("stop_task: cancellation requested");
                run.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Start/stop button semantics: stop the active run if there is one,
    /// otherwise start `instruction`.
    pub fn toggle(&self, instruction: String) -> PilotResult<ToggleOutcome> {
        if self.stop_task() {
            return Ok(ToggleOutcome::Stopping);
        }
        self.start_task(instruction)?;
        Ok(ToggleOutcome::Started)
    }

    /// Waits for the most recently started run and hands back its report.
    /// `stop_task` keeps working while this is pending. Returns `None` when
    /// there is no run or another caller is already waiting on it.
    pub async fn wait(&self) -> PilotResult<Option<RunReport>> {
        let (generation, task) = {
            let mut active = self.lock();
            let Some(run) = active.as_mut() else {
                return Ok(None);
            };
            let Some(task) = run.task.take() else {
                return Ok(None);
            };
            (run.generation, task)
        };

        let joined = task.await;

        {
            let mut active = self.lock();
            if active.as_ref().is_some_and(|run| run.generation == generation) {
                *active = None;
            }
        }

        let report = joined.map_err(|e| PilotError::Executor(format!("run task aborted: {e}")))?;
        Ok(Some(report))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ActiveRun>> {
        // A poisoned slot still holds a valid Option; keep going with it.
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}
