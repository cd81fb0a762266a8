//! Host Configuration
//!
//! The reconciler never touches a concrete UI tree. Everything it needs from
//! the host (creating nodes, applying prop changes, moving nodes around) goes
//! through [`HostConfig`]. Host nodes are opaque [`HostNodeId`]s owned by the
//! adapter.
//!
//! Hosts are called while the runtime holds its internal borrows, so an
//! adapter must not call back into the [`Runtime`](crate::Runtime).

mod memory;

use std::rc::Rc;

use serde::{Deserialize, Serialize};

pub use memory::{HostOp, MemoryHost};

use crate::element::{Child, Props};
use crate::value::Value;

/// Opaque handle to a host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostNodeId(pub u64);

/// One attribute change computed by [`HostConfig::diff_props`].
#[derive(Debug, Clone)]
pub enum PropChange {
    Set(Rc<str>, Value),
    Remove(Rc<str>),
    /// Replace the direct text content of an element.
    Text(Rc<str>),
}

/// The operations the reconciler performs on the host tree.
pub trait HostConfig {
    fn create_element(&self, tag: &str, props: &Props) -> HostNodeId;

    fn create_text(&self, text: &str) -> HostNodeId;

    fn set_props(&self, node: HostNodeId, tag: &str, changes: &[PropChange]);

    fn set_text(&self, node: HostNodeId, text: &str);

    fn append_child(&self, parent: HostNodeId, child: HostNodeId);

    fn insert_before(&self, parent: HostNodeId, child: HostNodeId, before: HostNodeId);

    fn remove_child(&self, parent: HostNodeId, child: HostNodeId);

    /// Remove every child of `node`.
    fn clear_children(&self, node: HostNodeId);

    /// Drop direct text content set through [`PropChange::Text`].
    fn reset_text_content(&self, node: HostNodeId);

    fn hide_element(&self, node: HostNodeId);

    fn unhide_element(&self, node: HostNodeId);

    /// Release a node created by a pass that never committed it. Children
    /// still attached to it go too.
    fn discard_instance(&self, _node: HostNodeId) {}

    /// Called before the submit pass mutates anything.
    fn prepare_for_submit(&self) {}

    /// Called once the submit pass is done.
    fn reset_after_submit(&self) {}

    /// Re-sync form controls whose value is owned by props.
    fn handle_controlled_input_elements(&self, _node: HostNodeId, _tag: &str, _props: &Props) {}

    /// Whether an element renders its children as direct text content
    /// instead of child text nodes.
    fn should_set_text_content(&self, _tag: &str, props: &Props) -> bool {
        matches!(props.children(), Child::Text(_) | Child::Number(_))
    }

    /// Attribute changes between two prop sets of the same element.
    fn diff_props(&self, tag: &str, old: &Props, new: &Props) -> Vec<PropChange> {
        let mut changes = Vec::new();
        for (name, _) in old.attrs() {
            if new.get(name).is_none() {
                changes.push(PropChange::Remove(Rc::from(name)));
            }
        }
        for (name, value) in new.attrs() {
            if !old.get(name).is_some_and(|prev| prev.is_same(value)) {
                changes.push(PropChange::Set(Rc::from(name), value.clone()));
            }
        }
        if self.should_set_text_content(tag, new) {
            let text = new.children().text_content().unwrap_or_default();
            if old.children().text_content().as_deref() != Some(text.as_str()) {
                changes.push(PropChange::Text(Rc::from(text)));
            }
        }
        changes
    }
}
