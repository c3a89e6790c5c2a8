use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::agent_engine::action::ActionDescriptor;
use crate::agent_engine::state::AgentState;
use crate::executor::dispatcher::DispatchOutcome;

/// Progress notifications for whatever host is displaying the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    StateChanged { run_id: String, state: AgentState },
    StepStarted { run_id: String, step: u32 },
    ActionParsed { run_id: String, step: u32, action: ActionDescriptor },
    ActionDispatched { run_id: String, step: u32, outcome: DispatchOutcome },
    RunFinished { run_id: String, state: AgentState, actions: usize },
}

/// Fan-out of run events. Publishing never blocks and never fails the run;
/// with no subscribers events are simply dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RunEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.tx.subscribe()
    }

    pub fn send(&self, event: RunEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
