//! Node Arena
//!
//! Owns every [`VNode`] and provides the traversal helpers the work loop and
//! the submit passes share. None of these helpers call application code, so
//! they are safe to use while the arena is mutably borrowed.

use std::collections::VecDeque;
use std::ops::{Index, IndexMut};

use slotmap::SlotMap;

use super::{Tag, VNode, VNodeId};
use crate::host::HostNodeId;

#[derive(Default)]
pub(crate) struct VNodeTree {
    nodes: SlotMap<VNodeId, VNode>,
}

impl VNodeTree {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, node: VNode) -> VNodeId {
        self.nodes.insert(node)
    }

    pub(crate) fn get(&self, id: VNodeId) -> Option<&VNode> {
        self.nodes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: VNodeId) -> Option<&mut VNode> {
        self.nodes.get_mut(id)
    }

    pub(crate) fn contains(&self, id: VNodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Children of `id` in sibling order.
    pub(crate) fn children(&self, id: VNodeId) -> Vec<VNodeId> {
        let mut out = Vec::new();
        let mut cursor = self.nodes[id].child;
        while let Some(child) = cursor {
            out.push(child);
            cursor = self.nodes[child].next;
        }
        out
    }

    /// Ancestors of `id`, nearest first.
    pub(crate) fn ancestors(&self, id: VNodeId) -> Vec<VNodeId> {
        let mut out = Vec::new();
        let mut cursor = self.nodes[id].parent;
        while let Some(parent) = cursor {
            out.push(parent);
            cursor = self.nodes.get(parent).and_then(|n| n.parent);
        }
        out
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub(crate) fn is_ancestor_or_self(&self, ancestor: VNodeId, id: VNodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(node) = cursor {
            if node == ancestor {
                return true;
            }
            cursor = self.nodes.get(node).and_then(|n| n.parent);
        }
        false
    }

    /// The root `id` is attached to, if its parent chain is intact.
    pub(crate) fn root_of(&self, id: VNodeId) -> Option<VNodeId> {
        let mut cursor = id;
        loop {
            let node = self.nodes.get(cursor)?;
            if node.tag == Tag::TreeRoot {
                return Some(cursor);
            }
            let parent = node.parent?;
            // A node unlinked by a diff keeps its parent pointer but is no
            // longer among the parent's children.
            if node.flags.contains(super::Flags::DELETION) {
                return None;
            }
            cursor = parent;
        }
    }

    /// Mark `id` for re-render and flag the path above it.
    pub(crate) fn mark_should_update(&mut self, id: VNodeId) {
        self.nodes[id].should_update = true;
        self.mark_ancestors_child_update(id);
    }

    pub(crate) fn mark_ancestors_child_update(&mut self, id: VNodeId) {
        let mut cursor = self.nodes[id].parent;
        while let Some(parent) = cursor {
            let Some(node) = self.nodes.get_mut(parent) else { break };
            node.child_should_update = true;
            cursor = node.parent;
        }
    }

    /// The subtree rooted at `id` in pre-order.
    pub(crate) fn subtree(&self, id: VNodeId) -> Vec<VNodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            let mut children = self.children(node);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Drop the subtree rooted at `id` from the arena.
    pub(crate) fn remove_subtree(&mut self, id: VNodeId) {
        for node in self.subtree(id) {
            self.nodes.remove(node);
        }
    }

    /// Recompute `path` for the subtree under `id` after `id` itself moved.
    pub(crate) fn repair_paths(&mut self, id: VNodeId) {
        let mut queue = VecDeque::from([id]);
        while let Some(node) = queue.pop_front() {
            let path = self.nodes[node].path.clone();
            for child in self.children(node) {
                let expected = format!("{path},{}", self.nodes[child].c_index);
                if self.nodes[child].path != expected {
                    self.nodes[child].path = expected;
                    queue.push_back(child);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Host lookups
    // ------------------------------------------------------------------

    /// The host node children of `id` are inserted into.
    pub(crate) fn host_parent(&self, id: VNodeId) -> Option<HostNodeId> {
        self.host_parent_node(id).and_then(|parent| self.nodes[parent].real_node)
    }

    /// The nearest ancestor of `id` owning a host node.
    pub(crate) fn host_parent_node(&self, id: VNodeId) -> Option<VNodeId> {
        let mut cursor = self.nodes[id].parent;
        while let Some(parent) = cursor {
            let node = self.nodes.get(parent)?;
            match node.tag {
                Tag::DomComponent | Tag::DomPortal | Tag::TreeRoot => return Some(parent),
                _ => cursor = node.parent,
            }
        }
        None
    }

    /// Host nodes directly owned by the subtree at `id`, without descending
    /// into host nodes or portals.
    pub(crate) fn top_host_nodes(&self, id: VNodeId) -> Vec<HostNodeId> {
        let mut out = Vec::new();
        self.collect_top_host_nodes(id, false, &mut out);
        out
    }

    /// Like [`VNodeTree::top_host_nodes`], leaving out nodes that were never
    /// committed and so never reached the host tree.
    pub(crate) fn placed_host_nodes(&self, id: VNodeId) -> Vec<HostNodeId> {
        let mut out = Vec::new();
        self.collect_top_host_nodes(id, true, &mut out);
        out
    }

    fn collect_top_host_nodes(&self, id: VNodeId, placed_only: bool, out: &mut Vec<HostNodeId>) {
        let node = &self.nodes[id];
        if placed_only && node.is_created {
            return;
        }
        if node.tag.is_host() {
            out.extend(node.real_node);
            return;
        }
        if node.tag == Tag::DomPortal {
            return;
        }
        let mut cursor = node.child;
        while let Some(child) = cursor {
            self.collect_top_host_nodes(child, placed_only, out);
            cursor = self.nodes[child].next;
        }
    }

    /// The first host node after `id` that is already in place in its host
    /// parent. Nodes still waiting for insertion are skipped.
    pub(crate) fn host_sibling(&self, id: VNodeId) -> Option<HostNodeId> {
        let mut node = id;
        loop {
            // Climb until a sibling exists, stopping at the host parent.
            while self.nodes[node].next.is_none() {
                let parent = self.nodes[node].parent?;
                if matches!(
                    self.nodes[parent].tag,
                    Tag::DomComponent | Tag::DomPortal | Tag::TreeRoot
                ) {
                    return None;
                }
                node = parent;
            }
            node = self.nodes[node].next?;

            // Descend to the first host node of the sibling.
            loop {
                let current = &self.nodes[node];
                if current.tag.is_host() {
                    if !current.flags.contains(super::Flags::ADDITION) {
                        if let Some(real) = current.real_node {
                            return Some(real);
                        }
                    }
                    break;
                }
                if current.tag == Tag::DomPortal || current.flags.contains(super::Flags::ADDITION) {
                    break;
                }
                match current.child {
                    Some(child) => node = child,
                    None => break,
                }
            }
        }
    }
}

impl Index<VNodeId> for VNodeTree {
    type Output = VNode;

    fn index(&self, id: VNodeId) -> &VNode {
        &self.nodes[id]
    }
}

impl IndexMut<VNodeId> for VNodeTree {
    fn index_mut(&mut self, id: VNodeId) -> &mut VNode {
        &mut self.nodes[id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Props;
    use crate::vnode::Flags;
    use std::rc::Rc;

    fn link(tree: &mut VNodeTree, parent: VNodeId, children: &[VNodeId]) {
        tree[parent].child = children.first().copied();
        for (i, &child) in children.iter().enumerate() {
            tree[child].parent = Some(parent);
            tree[child].c_index = i;
            tree[child].next = children.get(i + 1).copied();
        }
    }

    fn node(tree: &mut VNodeTree, tag: Tag) -> VNodeId {
        tree.insert(VNode::new(tag, Rc::new(Props::new()), None))
    }

    #[test]
    fn host_sibling_skips_pending_insertions_and_descends_fragments() {
        let mut tree = VNodeTree::new();
        let root = node(&mut tree, Tag::TreeRoot);
        let a = node(&mut tree, Tag::DomComponent);
        let frag = node(&mut tree, Tag::Fragment);
        let pending = node(&mut tree, Tag::DomComponent);
        let placed = node(&mut tree, Tag::DomComponent);
        link(&mut tree, root, &[a, frag]);
        link(&mut tree, frag, &[pending, placed]);
        tree[root].real_node = Some(HostNodeId(1));
        tree[pending].real_node = Some(HostNodeId(2));
        tree[pending].flags = Flags::ADDITION;
        tree[placed].real_node = Some(HostNodeId(3));

        // The fragment's first host child is still being inserted, so the
        // walk continues with the next sibling inside it.
        assert_eq!(tree.host_sibling(a), Some(HostNodeId(3)));
        assert_eq!(tree.host_sibling(placed), None);
        assert_eq!(tree.host_parent(pending), Some(HostNodeId(1)));
    }

    #[test]
    fn top_host_nodes_stop_at_portals() {
        let mut tree = VNodeTree::new();
        let frag = node(&mut tree, Tag::Fragment);
        let text = node(&mut tree, Tag::DomText);
        let portal = node(&mut tree, Tag::DomPortal);
        let inner = node(&mut tree, Tag::DomComponent);
        link(&mut tree, frag, &[text, portal]);
        link(&mut tree, portal, &[inner]);
        tree[text].real_node = Some(HostNodeId(7));
        tree[inner].real_node = Some(HostNodeId(8));

        assert_eq!(tree.top_host_nodes(frag), vec![HostNodeId(7)]);
    }

    #[test]
    fn repair_paths_rewrites_moved_subtree() {
        let mut tree = VNodeTree::new();
        let root = node(&mut tree, Tag::TreeRoot);
        let a = node(&mut tree, Tag::Fragment);
        let b = node(&mut tree, Tag::DomText);
        link(&mut tree, root, &[a]);
        link(&mut tree, a, &[b]);
        tree[root].path = "0".into();
        tree[a].path = "0,3".into();
        tree[b].path = "stale".into();

        tree.repair_paths(a);
        assert_eq!(tree[b].path, "0,3,0");
    }
}
