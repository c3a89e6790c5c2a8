use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use crate::agent_engine::action::ActionDescriptor;
use crate::agent_engine::cancel::CancelToken;
use crate::agent_engine::event_bus::{EventBus, RunEvent};
use crate::agent_engine::history::ActionHistory;
use crate::agent_engine::loop_control::LoopController;
use crate::agent_engine::prompt::build_prompt;
use crate::agent_engine::state::{AgentState, LoopConfig, RunReport};
use crate::errors::{PilotError, PilotResult};
use crate::executor::dispatcher::Dispatcher;
use crate::executor::input::InputSimulator;
use crate::llm::provider::LlmProvider;
use crate::perception::pipeline::observe;
use crate::perception::traits::{Accessibility, ScreenSource};

/// The perception-action loop. Holds only collaborators and configuration;
/// everything that belongs to a run lives in [`AgentEngine::run`].
pub struct AgentEngine {
    provider: Arc<dyn LlmProvider>,
    screen: Arc<dyn ScreenSource>,
    accessibility: Arc<dyn Accessibility>,
    dispatcher: Dispatcher,
    config: LoopConfig,
    events: EventBus,
}

impl AgentEngine {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        screen: Arc<dyn ScreenSource>,
        accessibility: Arc<dyn Accessibility>,
        input: Arc<dyn InputSimulator>,
        config: LoopConfig,
    ) -> Self {
        let dispatcher = Dispatcher::new(input, accessibility.clone());
        Self {
            provider,
            screen,
            accessibility,
            dispatcher,
            config,
            events: EventBus::new(),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Drives one instruction to a terminal state. History starts empty and
    /// is handed back in the report; nothing outlives the call.
    pub async fn run(&self, instruction: &str, cancel: CancelToken) -> RunReport {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("run", run_id = %run_id);

        async {
            tracing::info!(
                instruction = %instruction,
                protocol = ?self.config.protocol,
                max_steps = self.config.max_steps,
                provider = %self.provider.name(),
                "run started"
            );

            let mut history = ActionHistory::new();
            let (state, error) = match self.drive(&run_id, instruction, &cancel, &mut history).await {
                Ok(state) => (state, None),
                Err(e) => {
                    tracing::error!(error = %e, "run failed");
                    (AgentState::Failed { message: e.to_string() }, Some(e))
                }
            };

            tracing::info!(state = ?state, actions = history.len(), "run finished");
            self.events.send(RunEvent::StateChanged {
                run_id: run_id.clone(),
                state: state.clone(),
            });
            self.events.send(RunEvent::RunFinished {
                run_id: run_id.clone(),
                state: state.clone(),
                actions: history.len(),
            });

            RunReport {
                run_id: run_id.clone(),
                state,
                history: history.into_entries(),
                error,
            }
        }
        .instrument(span)
        .await
    }

    /// Step loop. `Ok` carries a non-failure terminal state.
    async fn drive(
        &self,
        run_id: &str,
        instruction: &str,
        cancel: &CancelToken,
        history: &mut ActionHistory,
    ) -> PilotResult<AgentState> {
        let mut ctrl = LoopController::new(self.config.max_steps);

        loop {
            if cancel.is_cancelled() {
                tracing::info!(step = ctrl.step(), "cancellation observed");
                return Ok(AgentState::Cancelled);
            }
            if ctrl.is_capped() {
                tracing::warn!(steps = ctrl.step(), "step limit reached without DONE");
                return Ok(AgentState::Capped { steps: ctrl.step() });
            }

            let step = ctrl.step();
            self.events.send(RunEvent::StateChanged {
                run_id: run_id.to_string(),
                state: AgentState::Running { step },
            });
            self.events.send(RunEvent::StepStarted {
                run_id: run_id.to_string(),
                step,
            });

            if !pause(self.config.capture_delay, cancel).await {
                return Ok(AgentState::Cancelled);
            }

            let observation = observe(
                self.screen.as_ref(),
                self.accessibility.as_ref(),
                self.config.protocol,
            )
            .await?;
            let prompt = build_prompt(instruction, self.config.protocol, history, &observation.elements);
            tracing::debug!(step, prompt_len = prompt.len(), elements = observation.elements.len(), "prompt assembled");

            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(step, "cancelled while waiting for the model");
                    return Ok(AgentState::Cancelled);
                }
                reply = self.provider.chat(&prompt, &observation.image_base64) => reply?,
            };
            // A reply that lands after cancellation is dropped unseen.
            if cancel.is_cancelled() {
                tracing::info!(step, "discarding reply received after cancellation");
                return Ok(AgentState::Cancelled);
            }

            if reply.content.trim().is_empty() {
                return Err(PilotError::malformed("empty reply", reply.content));
            }
            let action = self.config.protocol.parse(&reply.content)?;
            tracing::info!(step, %action, "action parsed");

            history.push(step, action.clone(), &reply.content);
            self.events.send(RunEvent::ActionParsed {
                run_id: run_id.to_string(),
                step,
                action: action.clone(),
            });

            if action.is_done() {
                return Ok(AgentState::Completed);
            }

            match &action {
                ActionDescriptor::Unknown { kind } => {
                    tracing::warn!(step, kind = %kind, "unrecognised action skipped");
                }
                _ => {
                    let outcome = self.dispatcher.dispatch(&action).await;
                    if !outcome.is_success() {
                        tracing::warn!(step, %action, %outcome, "dispatch did not succeed; continuing");
                    }
                    history.record_outcome(outcome.clone());
                    self.events.send(RunEvent::ActionDispatched {
                        run_id: run_id.to_string(),
                        step,
                        outcome,
                    });
                }
            }

            ctrl.record_step();
            if ctrl.is_capped() {
                tracing::warn!(steps = ctrl.step(), "step limit reached without DONE");
                return Ok(AgentState::Capped { steps: ctrl.step() });
            }

            if !pause(self.config.settle_delay, cancel).await {
                return Ok(AgentState::Cancelled);
            }
        }
    }
}

/// Sleeps unless cancelled first. Returns `false` on cancellation.
async fn pause(duration: Duration, cancel: &CancelToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
