//! In-Memory Host
//!
//! A deterministic [`HostConfig`] that keeps its node tree in a map and
//! records every operation it receives. Tests assert against the markup it
//! prints and against the exact operation log.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write as _;

use indexmap::IndexMap;

use super::{HostConfig, HostNodeId, PropChange};
use crate::element::Props;
use crate::value::Value;

/// An operation received by a [`MemoryHost`].
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    CreateElement { node: HostNodeId, tag: String },
    CreateText { node: HostNodeId, text: String },
    SetProps { node: HostNodeId, changes: usize },
    SetText { node: HostNodeId, text: String },
    AppendChild { parent: HostNodeId, child: HostNodeId },
    InsertBefore { parent: HostNodeId, child: HostNodeId, before: HostNodeId },
    RemoveChild { parent: HostNodeId, child: HostNodeId },
    ClearChildren { node: HostNodeId },
    ResetText { node: HostNodeId },
    Hide { node: HostNodeId },
    Unhide { node: HostNodeId },
}

impl HostOp {
    /// Whether the operation places a node under a parent.
    pub fn is_placement(&self) -> bool {
        matches!(self, HostOp::AppendChild { .. } | HostOp::InsertBefore { .. })
    }
}

#[derive(Debug)]
enum MemKind {
    Container,
    Element(String),
    Text,
}

#[derive(Debug)]
struct MemNode {
    kind: MemKind,
    attrs: IndexMap<String, Value>,
    text: String,
    children: Vec<HostNodeId>,
    parent: Option<HostNodeId>,
    hidden: bool,
}

impl MemNode {
    fn new(kind: MemKind) -> Self {
        Self {
            kind,
            attrs: IndexMap::new(),
            text: String::new(),
            children: Vec::new(),
            parent: None,
            hidden: false,
        }
    }
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    nodes: HashMap<HostNodeId, MemNode>,
    ops: Vec<HostOp>,
}

impl Inner {
    fn alloc(&mut self, node: MemNode) -> HostNodeId {
        self.next_id += 1;
        let id = HostNodeId(self.next_id);
        self.nodes.insert(id, node);
        id
    }

    fn detach(&mut self, child: HostNodeId) {
        let parent = self.nodes.get_mut(&child).and_then(|n| n.parent.take());
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != child);
        }
    }

    fn drop_subtree(&mut self, id: HostNodeId) {
        if let Some(node) = self.nodes.remove(&id) {
            for child in node.children {
                self.drop_subtree(child);
            }
        }
    }

    fn place(&mut self, parent: HostNodeId, child: HostNodeId, before: Option<HostNodeId>) {
        self.detach(child);
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            let index = before
                .and_then(|b| parent_node.children.iter().position(|c| *c == b))
                .unwrap_or(parent_node.children.len());
            parent_node.children.insert(index, child);
        }
    }
}

/// A host tree held in memory.
#[derive(Default)]
pub struct MemoryHost {
    inner: RefCell<Inner>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a root container to render into.
    pub fn create_container(&self) -> HostNodeId {
        self.inner.borrow_mut().alloc(MemNode::new(MemKind::Container))
    }

    /// Every operation received so far.
    pub fn ops(&self) -> Vec<HostOp> {
        self.inner.borrow().ops.clone()
    }

    /// Return and forget the operation log.
    pub fn take_ops(&self) -> Vec<HostOp> {
        std::mem::take(&mut self.inner.borrow_mut().ops)
    }

    pub fn children(&self, node: HostNodeId) -> Vec<HostNodeId> {
        self.inner
            .borrow()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn attr(&self, node: HostNodeId, name: &str) -> Option<Value> {
        self.inner.borrow().nodes.get(&node)?.attrs.get(name).cloned()
    }

    pub fn is_hidden(&self, node: HostNodeId) -> bool {
        self.inner.borrow().nodes.get(&node).is_some_and(|n| n.hidden)
    }

    /// Number of live nodes, containers included.
    pub fn node_count(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    /// Visible markup of the children of `node`. Hidden nodes are omitted.
    pub fn markup(&self, node: HostNodeId) -> String {
        let inner = self.inner.borrow();
        let mut out = String::new();
        if let Some(n) = inner.nodes.get(&node) {
            for child in &n.children {
                write_markup(&inner, *child, &mut out);
            }
        }
        out
    }

    fn record(&self, op: HostOp) {
        self.inner.borrow_mut().ops.push(op);
    }
}

fn write_markup(inner: &Inner, id: HostNodeId, out: &mut String) {
    let Some(node) = inner.nodes.get(&id) else { return };
    if node.hidden {
        return;
    }
    match &node.kind {
        MemKind::Text => out.push_str(&node.text),
        MemKind::Container => {
            for child in &node.children {
                write_markup(inner, *child, out);
            }
        }
        MemKind::Element(tag) => {
            let _ = write!(out, "<{tag}");
            for (name, value) in &node.attrs {
                if !matches!(value, Value::Object(_)) {
                    let _ = write!(out, " {name}=\"{value}\"");
                }
            }
            out.push('>');
            out.push_str(&node.text);
            for child in &node.children {
                write_markup(inner, *child, out);
            }
            let _ = write!(out, "</{tag}>");
        }
    }
}

impl HostConfig for MemoryHost {
    fn create_element(&self, tag: &str, props: &Props) -> HostNodeId {
        let mut node = MemNode::new(MemKind::Element(tag.to_string()));
        for (name, value) in props.attrs() {
            node.attrs.insert(name.to_string(), value.clone());
        }
        if self.should_set_text_content(tag, props) {
            node.text = props.children().text_content().unwrap_or_default();
        }
        let id = self.inner.borrow_mut().alloc(node);
        self.record(HostOp::CreateElement {
            node: id,
            tag: tag.to_string(),
        });
        id
    }

    fn create_text(&self, text: &str) -> HostNodeId {
        let mut node = MemNode::new(MemKind::Text);
        node.text = text.to_string();
        let id = self.inner.borrow_mut().alloc(node);
        self.record(HostOp::CreateText {
            node: id,
            text: text.to_string(),
        });
        id
    }

    fn set_props(&self, node: HostNodeId, _tag: &str, changes: &[PropChange]) {
        if let Some(n) = self.inner.borrow_mut().nodes.get_mut(&node) {
            for change in changes {
                match change {
                    PropChange::Set(name, value) => {
                        n.attrs.insert(name.to_string(), value.clone());
                    }
                    PropChange::Remove(name) => {
                        n.attrs.shift_remove(&**name);
                    }
                    PropChange::Text(text) => n.text = text.to_string(),
                }
            }
        }
        self.record(HostOp::SetProps {
            node,
            changes: changes.len(),
        });
    }

    fn set_text(&self, node: HostNodeId, text: &str) {
        if let Some(n) = self.inner.borrow_mut().nodes.get_mut(&node) {
            n.text = text.to_string();
        }
        self.record(HostOp::SetText {
            node,
            text: text.to_string(),
        });
    }

    fn append_child(&self, parent: HostNodeId, child: HostNodeId) {
        self.inner.borrow_mut().place(parent, child, None);
        self.record(HostOp::AppendChild { parent, child });
    }

    fn insert_before(&self, parent: HostNodeId, child: HostNodeId, before: HostNodeId) {
        self.inner.borrow_mut().place(parent, child, Some(before));
        self.record(HostOp::InsertBefore {
            parent,
            child,
            before,
        });
    }

    fn remove_child(&self, parent: HostNodeId, child: HostNodeId) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.detach(child);
            inner.drop_subtree(child);
        }
        self.record(HostOp::RemoveChild { parent, child });
    }

    fn clear_children(&self, node: HostNodeId) {
        {
            let mut inner = self.inner.borrow_mut();
            let children = inner
                .nodes
                .get_mut(&node)
                .map(|n| std::mem::take(&mut n.children))
                .unwrap_or_default();
            for child in children {
                inner.drop_subtree(child);
            }
        }
        self.record(HostOp::ClearChildren { node });
    }

    fn reset_text_content(&self, node: HostNodeId) {
        if let Some(n) = self.inner.borrow_mut().nodes.get_mut(&node) {
            n.text.clear();
        }
        self.record(HostOp::ResetText { node });
    }

    fn hide_element(&self, node: HostNodeId) {
        if let Some(n) = self.inner.borrow_mut().nodes.get_mut(&node) {
            n.hidden = true;
        }
        self.record(HostOp::Hide { node });
    }

    fn unhide_element(&self, node: HostNodeId) {
        if let Some(n) = self.inner.borrow_mut().nodes.get_mut(&node) {
            n.hidden = false;
        }
        self.record(HostOp::Unhide { node });
    }

    fn discard_instance(&self, node: HostNodeId) {
        let mut inner = self.inner.borrow_mut();
        inner.detach(node);
        inner.drop_subtree(node);
    }
}
