//! Resolves a `ControlReference` against the live accessibility tree.
use crate::agent_engine::action::ControlReference;
use crate::perception::tree::UiTree;
use crate::perception::types::{ControlType, NodeProperties};

/// Conjunction of exact-equality conditions built from the present fields of
/// a reference. An absent field imposes nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlPredicate {
    name: Option<String>,
    automation_id: Option<String>,
    control_type: TypeCondition,
}

#[derive(Debug, Clone, PartialEq)]
enum TypeCondition {
    Any,
    Is(ControlType),
    /// The reference named a type that is not in the control-type table.
    Unmappable,
}

impl ControlPredicate {
    pub fn from_reference(reference: &ControlReference) -> Self {
        let control_type = match present(&reference.control_type) {
            None => TypeCondition::Any,
            Some(name) => match ControlType::from_name(name) {
                Some(ct) => TypeCondition::Is(ct),
                None => {
                    tracing::warn!(type_name = %name, "unknown control type in reference; nothing can match");
                    TypeCondition::Unmappable
                }
            },
        };
        Self {
            name: present(&reference.name).map(str::to_string),
            automation_id: present(&reference.automation_id).map(str::to_string),
            control_type,
        }
    }

    pub fn matches(&self, props: &NodeProperties) -> bool {
        if let Some(name) = &self.name {
            if props.name != *name {
                return false;
            }
        }
        if let Some(id) = &self.automation_id {
            if props.automation_id != *id {
                return false;
            }
        }
        match self.control_type {
            TypeCondition::Any => true,
            TypeCondition::Is(ct) => props.control_type == Some(ct),
            TypeCondition::Unmappable => false,
        }
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// First descendant of the foreground root, in depth-first pre-order, that
/// satisfies every present field of `reference`.
pub fn find_first<T: UiTree>(tree: &T, reference: &ControlReference) -> Option<T::Node> {
    let root = tree.foreground_root()?;
    let predicate = ControlPredicate::from_reference(reference);
    search_children(tree, &root, &predicate)
}

fn search_children<T: UiTree>(
    tree: &T,
    node: &T::Node,
    predicate: &ControlPredicate,
) -> Option<T::Node> {
    for child in tree.children(node) {
        let hit = tree
            .properties(&child)
            .map(|p| predicate.matches(&p))
            .unwrap_or(false);
        if hit {
            return Some(child);
        }
        if let Some(found) = search_children(tree, &child, predicate) {
            return Some(found);
        }
    }
    None
}
