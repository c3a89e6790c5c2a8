use std::time::Duration;

use crate::agent_engine::action::ActionProtocol;
use crate::agent_engine::history::HistoryEntry;
use crate::errors::PilotError;

/// Lifecycle states of one run. Every state except `Idle` and `Running` is terminal.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AgentState {
    Idle,
    Running { step: u32 },
    Completed,
    Cancelled,
    Capped { steps: u32 },
    Failed { message: String },
}

impl AgentState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AgentState::Idle | AgentState::Running { .. })
    }
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub protocol: ActionProtocol,
    pub max_steps: u32,
    pub capture_delay: Duration,
    pub settle_delay: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            protocol: ActionProtocol::Coordinate,
            max_steps: 10,
            capture_delay: Duration::from_millis(250),
            settle_delay: Duration::from_millis(1000),
        }
    }
}

/// What a finished run hands back to its caller.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub state: AgentState,
    pub history: Vec<HistoryEntry>,
    /// Set when `state` is `Failed`.
    pub error: Option<PilotError>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.state == AgentState::Completed
    }
}
