//! Perception pipeline: one fresh observation per loop step.
use crate::agent_engine::action::ActionProtocol;
use crate::errors::PilotResult;
use crate::perception::traits::{Accessibility, ScreenSource};
use crate::perception::types::Observation;

/// Capture the screen and, in accessibility mode, walk the element tree.
///
/// A capture failure is an error. A failed tree walk only degrades to an
/// empty element list, the same as a window that refuses introspection.
pub async fn observe(
    screen: &dyn ScreenSource,
    accessibility: &dyn Accessibility,
    protocol: ActionProtocol,
) -> PilotResult<Observation> {
    let shot = screen.capture().await?;

    let elements = match protocol {
        ActionProtocol::Coordinate => Vec::new(),
        ActionProtocol::Accessibility => match accessibility.snapshot().await {
            Ok(elements) => elements,
            Err(e) => {
                tracing::warn!(error = %e, "element snapshot failed, continuing without");
                Vec::new()
            }
        },
    };

    tracing::debug!(elements = elements.len(), ?protocol, "observation ready");
    Ok(Observation {
        image_base64: shot.image_base64,
        meta: shot.meta,
        elements,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::types::ControlType;
    use crate::perception::ui_automation::LiveAccessibility;
    use crate::testing::{FakeTree, FakeTreeProvider, StaticScreen};

    #[tokio::test]
    async fn coordinate_mode_skips_the_tree() {
        let tree = FakeTree::window("W");
        tree.add(tree.root_id(), "OK", ControlType::Button, "", false);
        let live = LiveAccessibility::new(FakeTreeProvider::new(tree));

        let obs = observe(&StaticScreen, &live, ActionProtocol::Coordinate).await.unwrap();
        assert!(obs.elements.is_empty());
        assert!(!obs.image_base64.is_empty());
    }

    #[tokio::test]
    async fn accessibility_mode_includes_snapshot() {
        let tree = FakeTree::window("W");
        tree.add(tree.root_id(), "OK", ControlType::Button, "", false);
        let live = LiveAccessibility::new(FakeTreeProvider::new(tree));

        let obs = observe(&StaticScreen, &live, ActionProtocol::Accessibility).await.unwrap();
        assert_eq!(obs.elements.len(), 1);
    }

    #[tokio::test]
    async fn tree_failure_degrades_to_empty() {
        let live = LiveAccessibility::new(FakeTreeProvider::failing());
        let obs = observe(&StaticScreen, &live, ActionProtocol::Accessibility).await.unwrap();
        assert!(obs.elements.is_empty());
    }
}
