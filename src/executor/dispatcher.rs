// Action dispatcher: coordinate actions go to synthetic input, control
// actions are re-resolved against the live accessibility tree.
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent_engine::action::{ActionDescriptor, ControlReference};
use crate::executor::input::InputSimulator;
use crate::executor::resolver::find_first;
use crate::perception::traits::{Accessibility, PatternRequest};
use crate::perception::tree::UiTree;

/// Result of one dispatch. None of these end a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Success,
    NotFound,
    Unsupported { reason: String },
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success)
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::Success => f.write_str("success"),
            DispatchOutcome::NotFound => f.write_str("not found"),
            DispatchOutcome::Unsupported { reason } => write!(f, "unsupported: {reason}"),
        }
    }
}

/// Resolve `control` in `tree` and apply `request` to the first match.
pub fn act_on_tree<T: UiTree>(
    tree: &T,
    control: &ControlReference,
    request: &PatternRequest,
) -> DispatchOutcome {
    let Some(target) = find_first(tree, control) else {
        tracing::info!(%control, "no control matches reference");
        return DispatchOutcome::NotFound;
    };
    let result = match request {
        PatternRequest::Invoke => tree.invoke(&target),
        PatternRequest::SetValue(value) => tree.set_value(&target, value),
    };
    match result {
        Ok(()) => DispatchOutcome::Success,
        Err(e) => {
            tracing::info!(%control, error = %e, "control capability failed");
            DispatchOutcome::Unsupported {
                reason: e.to_string(),
            }
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    input: Arc<dyn InputSimulator>,
    accessibility: Arc<dyn Accessibility>,
}

impl Dispatcher {
    pub fn new(input: Arc<dyn InputSimulator>, accessibility: Arc<dyn Accessibility>) -> Self {
        Self {
            input,
            accessibility,
        }
    }

    /// Executes one descriptor. `Done` and `Unknown` are the loop's business
    /// and are never passed here; if they are, nothing happens.
    pub async fn dispatch(&self, action: &ActionDescriptor) -> DispatchOutcome {
        let outcome = match action {
            ActionDescriptor::Type { text } => match self.input.type_text(text).await {
                Ok(()) => DispatchOutcome::Success,
                Err(e) => DispatchOutcome::Unsupported { reason: e.to_string() },
            },
            ActionDescriptor::Click { x, y } => match self.input.click_at(*x, *y).await {
                Ok(()) => DispatchOutcome::Success,
                Err(e) => DispatchOutcome::Unsupported { reason: e.to_string() },
            },
            ActionDescriptor::Invoke { control } => {
                self.accessibility
                    .perform(control, PatternRequest::Invoke)
                    .await
            }
            ActionDescriptor::SetValue { control, value } => {
                self.accessibility
                    .perform(control, PatternRequest::SetValue(value.clone()))
                    .await
            }
            ActionDescriptor::Done | ActionDescriptor::Unknown { .. } => {
                tracing::debug!(%action, "nothing to dispatch");
                return DispatchOutcome::Success;
            }
        };
        tracing::info!(%action, %outcome, "action dispatched");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::types::ControlType;
    use crate::perception::ui_automation::LiveAccessibility;
    use crate::testing::{FakeTree, FakeTreeProvider, PatternSupport, RecordingInput};

    fn dispatcher(tree: &FakeTree, input: Arc<RecordingInput>) -> Dispatcher {
        Dispatcher::new(
            input,
            Arc::new(LiveAccessibility::new(FakeTreeProvider::new(tree.clone()))),
        )
    }

    #[tokio::test]
    async fn click_and_type_go_to_input() {
        let tree = FakeTree::without_foreground();
        let input = Arc::new(RecordingInput::default());
        let d = dispatcher(&tree, input.clone());

        assert_eq!(d.dispatch(&ActionDescriptor::Click { x: -5, y: 99999 }).await, DispatchOutcome::Success);
        assert_eq!(
            d.dispatch(&ActionDescriptor::Type { text: "hi".into() }).await,
            DispatchOutcome::Success
        );
        assert_eq!(input.clicks(), vec![(-5, 99999)]);
        assert_eq!(input.typed(), vec!["hi".to_string()]);
    }

    #[tokio::test]
    async fn input_error_is_unsupported_not_fatal() {
        let tree = FakeTree::without_foreground();
        let input = Arc::new(RecordingInput::failing());
        let d = dispatcher(&tree, input);

        let outcome = d.dispatch(&ActionDescriptor::Click { x: 1, y: 1 }).await;
        assert!(matches!(outcome, DispatchOutcome::Unsupported { .. }));
    }

    #[tokio::test]
    async fn invoke_resolves_and_invokes() {
        let tree = FakeTree::window("Doc");
        tree.add(tree.root_id(), "Save", ControlType::Button, "btnSave", false);
        let d = dispatcher(&tree, Arc::new(RecordingInput::default()));

        let outcome = d
            .dispatch(&ActionDescriptor::Invoke { control: ControlReference::named("Save") })
            .await;
        assert_eq!(outcome, DispatchOutcome::Success);
        assert_eq!(tree.invoked(), vec!["Save".to_string()]);
    }

    #[tokio::test]
    async fn set_value_writes_text() {
        let tree = FakeTree::window("Search");
        tree.add(tree.root_id(), "Query", ControlType::Edit, "q", false);
        let d = dispatcher(&tree, Arc::new(RecordingInput::default()));

        let control = ControlReference {
            automation_id: Some("q".into()),
            ..ControlReference::default()
        };
        let outcome = d
            .dispatch(&ActionDescriptor::SetValue { control, value: "rust".into() })
            .await;
        assert_eq!(outcome, DispatchOutcome::Success);
        assert_eq!(tree.values(), vec![("Query".to_string(), "rust".to_string())]);
    }

    #[tokio::test]
    async fn missing_control_is_not_found() {
        let tree = FakeTree::window("Doc");
        tree.add(tree.root_id(), "Save", ControlType::Button, "", false);
        let d = dispatcher(&tree, Arc::new(RecordingInput::default()));

        let outcome = d
            .dispatch(&ActionDescriptor::Invoke { control: ControlReference::named("Open") })
            .await;
        assert_eq!(outcome, DispatchOutcome::NotFound);
        assert!(tree.invoked().is_empty());
    }

    #[tokio::test]
    async fn missing_or_failing_pattern_is_unsupported() {
        let tree = FakeTree::window("Doc");
        let root = tree.root_id();
        let label = tree.add(root, "Label", ControlType::Text, "", false);
        tree.set_patterns(label, PatternSupport::Missing);
        let stale = tree.add(root, "Stale", ControlType::Button, "", false);
        tree.set_patterns(stale, PatternSupport::Failing);
        let d = dispatcher(&tree, Arc::new(RecordingInput::default()));

        let missing = d
            .dispatch(&ActionDescriptor::Invoke { control: ControlReference::named("Label") })
            .await;
        assert!(matches!(missing, DispatchOutcome::Unsupported { .. }));

        let failing = d
            .dispatch(&ActionDescriptor::SetValue {
                control: ControlReference::named("Stale"),
                value: "x".into(),
            })
            .await;
        assert!(matches!(failing, DispatchOutcome::Unsupported { .. }));
    }

    #[tokio::test]
    async fn resolution_uses_the_live_tree_not_the_snapshot() {
        let tree = FakeTree::window("Wizard");
        let root = tree.root_id();
        let next = tree.add(root, "Next", ControlType::Button, "", false);
        let live = Arc::new(LiveAccessibility::new(FakeTreeProvider::new(tree.clone())));
        let d = Dispatcher::new(Arc::new(RecordingInput::default()), live.clone());

        let snap = live.snapshot().await.unwrap();
        assert_eq!(snap[0].name, "Next");

        tree.rename(next, "Finish");
        let stale = d
            .dispatch(&ActionDescriptor::Invoke { control: ControlReference::named("Next") })
            .await;
        assert_eq!(stale, DispatchOutcome::NotFound);
        let fresh = d
            .dispatch(&ActionDescriptor::Invoke { control: ControlReference::named("Finish") })
            .await;
        assert_eq!(fresh, DispatchOutcome::Success);
    }
}
