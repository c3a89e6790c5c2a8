//! Platform-neutral view of the OS accessibility tree and the depth-first
//! walker that turns it into a snapshot.
use crate::errors::PilotResult;
use crate::perception::types::{NodeProperties, UIElement};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// The control does not expose the requested capability.
    Unavailable,
    /// The capability call itself failed (stale element, access denied, ...).
    Failed(String),
}

impl std::fmt::Display for PatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternError::Unavailable => f.write_str("pattern not available"),
            PatternError::Failed(msg) => write!(f, "pattern call failed: {msg}"),
        }
    }
}

/// Accessibility capability consumed by the walker and the resolver.
///
/// Implementations are driven from a single blocking thread; nodes never
/// outlive the tree value they came from.
pub trait UiTree {
    type Node;

    /// Root of the current foreground top-level window, if it can be introspected.
    fn foreground_root(&self) -> Option<Self::Node>;

    /// Direct children in natural order.
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// `None` when the node can no longer be read.
    fn properties(&self, node: &Self::Node) -> Option<NodeProperties>;

    fn invoke(&self, node: &Self::Node) -> Result<(), PatternError>;

    fn set_value(&self, node: &Self::Node, value: &str) -> Result<(), PatternError>;
}

/// Opens a fresh view of the live tree. Called once per snapshot and once per
/// control-targeted dispatch.
pub trait TreeProvider: Send + Sync + 'static {
    type Tree: UiTree;

    fn open(&self) -> PilotResult<Self::Tree>;
}

/// Depth-first pre-order walk from the foreground window, keeping on-screen
/// nodes whose control type is in the interesting set.
pub fn snapshot<T: UiTree>(tree: &T) -> Vec<UIElement> {
    let Some(root) = tree.foreground_root() else {
        tracing::debug!("no foreground root; empty snapshot");
        return Vec::new();
    };
    let mut out = Vec::new();
    walk(tree, &root, &mut out);
    tracing::debug!(count = out.len(), "snapshot collected");
    out
}

fn walk<T: UiTree>(tree: &T, node: &T::Node, out: &mut Vec<UIElement>) {
    if let Some(props) = tree.properties(node) {
        if !props.is_offscreen {
            if let Some(control_type) = props.control_type.filter(|ct| ct.is_interesting()) {
                out.push(UIElement {
                    name: props.name,
                    control_type,
                    automation_id: props.automation_id,
                    bounding_rectangle: props.bounding_rectangle,
                });
            }
        }
    }

    // Containers that do not qualify can still hold interesting descendants.
    for child in tree.children(node) {
        walk(tree, &child, out);
    }
}
