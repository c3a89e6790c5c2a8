use async_trait::async_trait;

use crate::agent_engine::action::ControlReference;
use crate::errors::PilotResult;
use crate::executor::dispatcher::DispatchOutcome;
use crate::perception::screenshot::ScreenshotResult;
use crate::perception::types::UIElement;

/// Full-screen image source.
#[async_trait]
pub trait ScreenSource: Send + Sync {
    async fn capture(&self) -> PilotResult<ScreenshotResult>;
}

/// Capability requested from a resolved control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternRequest {
    Invoke,
    SetValue(String),
}

/// Async face of the accessibility tree. The two operations are independent
/// reads of the live tree: the snapshot used for prompting is never reused
/// to locate the control that gets acted on.
#[async_trait]
pub trait Accessibility: Send + Sync {
    async fn snapshot(&self) -> PilotResult<Vec<UIElement>>;

    async fn perform(&self, control: &ControlReference, request: PatternRequest) -> DispatchOutcome;
}
