//! Devtools Hook
//!
//! External inspectors attach through [`DevtoolsHook`]. The runtime hands
//! the hook a [`DevtoolsHelper`] once, when it is installed, and notifies it
//! after every commit.
//!
//! Snapshots are plain serializable data. They can be shipped as JSON or,
//! for larger trees, as MessagePack.

use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use slotmap::Key;

use crate::error::ReconcileError;
use crate::runtime::{self, RuntimeInner};
use crate::update::{Payload, Update, UpdateTag};
use crate::vnode::{Tag, VNode, VNodeId, VNodeTree};

/// An inspector attached to a runtime.
pub trait DevtoolsHook {
    fn init(&self, helper: DevtoolsHelper);

    /// Called after `root` committed.
    fn on_commit(&self, _helper: &DevtoolsHelper, _root: VNodeId) {}
}

/// One hook slot of a function component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookSnapshot {
    pub kind: String,
    pub value: String,
}

/// A node and its subtree as seen by an inspector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VNodeSnapshot {
    pub id: u64,
    pub name: String,
    pub tag: Tag,
    pub key: Option<String>,
    pub path: String,
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<HookSnapshot>,
    #[serde(default)]
    pub children: Vec<VNodeSnapshot>,
}

impl VNodeSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }

    /// Nodes of this subtree in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = &VNodeSnapshot> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}

/// Read access to a runtime's trees, plus a forced-update entry point.
#[derive(Clone)]
pub struct DevtoolsHelper {
    runtime: Weak<RuntimeInner>,
}

impl DevtoolsHelper {
    pub(crate) fn new(rt: &Rc<RuntimeInner>) -> Self {
        Self {
            runtime: Rc::downgrade(rt),
        }
    }

    /// Mounted roots, ordered by container.
    pub fn roots(&self) -> Vec<VNodeId> {
        let Some(rt) = self.runtime.upgrade() else {
            return Vec::new();
        };
        let roots = rt.roots.borrow();
        let mut entries: Vec<_> = roots.iter().map(|(c, r)| (*c, *r)).collect();
        entries.sort_by_key(|(container, _)| *container);
        entries.into_iter().map(|(_, root)| root).collect()
    }

    pub fn snapshot(&self, id: VNodeId) -> Option<VNodeSnapshot> {
        let rt = self.runtime.upgrade()?;
        let tree = rt.tree.borrow();
        tree.contains(id).then(|| snapshot_of(&tree, id))
    }

    /// Hook slots of a function component, in call order.
    pub fn hooks(&self, id: VNodeId) -> Vec<HookSnapshot> {
        let Some(rt) = self.runtime.upgrade() else {
            return Vec::new();
        };
        let tree = rt.tree.borrow();
        tree.get(id).map(hook_snapshots).unwrap_or_default()
    }

    /// Nodes below `root` whose display name is `name`, in pre-order.
    pub fn find_by_name(&self, root: VNodeId, name: &str) -> Vec<VNodeId> {
        let Some(rt) = self.runtime.upgrade() else {
            return Vec::new();
        };
        let tree = rt.tree.borrow();
        if !tree.contains(root) {
            return Vec::new();
        }
        tree.subtree(root)
            .into_iter()
            .filter(|&id| tree[id].name() == name)
            .collect()
    }

    /// Re-render `id`, bypassing `should_component_update`. Returns `false`
    /// if the node is gone.
    pub fn force_update(&self, id: VNodeId) -> Result<bool, ReconcileError> {
        let Some(rt) = self.runtime.upgrade() else {
            return Ok(false);
        };
        let tag = match rt.tree.borrow().get(id) {
            Some(node) => node.tag,
            None => return Ok(false),
        };
        if tag == Tag::ClassComponent {
            runtime::schedule_update(&rt, id, Update::new(UpdateTag::ForceUpdate, Payload::None))?;
        } else {
            runtime::launch_update_from_vnode(&rt, id)?;
        }
        Ok(true)
    }
}

fn hook_snapshots(node: &VNode) -> Vec<HookSnapshot> {
    node.hooks
        .iter()
        .map(|hook| {
            let (kind, value) = hook.describe();
            HookSnapshot {
                kind: kind.to_string(),
                value,
            }
        })
        .collect()
}

fn snapshot_of(tree: &VNodeTree, id: VNodeId) -> VNodeSnapshot {
    let node = &tree[id];
    VNodeSnapshot {
        id: id.data().as_ffi(),
        name: node.name(),
        tag: node.tag,
        key: node.key().map(str::to_string),
        path: node.path.clone(),
        hidden: node.hidden,
        hooks: hook_snapshots(node),
        children: tree
            .children(id)
            .into_iter()
            .map(|child| snapshot_of(tree, child))
            .collect(),
    }
}
