//! Children Reconciliation
//!
//! Given a parent node, its current child list and a new child description,
//! [`diff_children`] rebuilds the child list, reusing old nodes wherever the
//! reuse predicate allows and flagging what the submit pass has to do.
//!
//! # List algorithm
//!
//! 1. Left scan: reuse old and new entries pairwise from the front until the
//!    first mismatch.
//! 2. Right scan: the same from the back.
//! 3. Middle: index the remaining old nodes by key (or position when
//!    unkeyed), look every remaining new entry up, and reuse what matches.
//!    The reused nodes' old `e_index` values are fed to a longest increasing
//!    subsequence; only nodes outside it are moved.
//!
//! Old nodes nothing matched are flagged `DELETION` and put on the parent's
//! dirty list. A host element given an empty list gets a single `CLEAR`
//! instead. An empty description deletes the children one by one.
//!
//! No application code runs here, so the whole diff works on a borrowed
//! arena.

mod lis;

use std::collections::HashSet;
use std::rc::Rc;

use indexmap::IndexMap;

pub(crate) use lis::{is_increasing, longest_increasing_subsequence};

use crate::builder::PassJournal;
use crate::element::{Child, Element, ElementType, Key, Props};
use crate::value::format_number;
use crate::vnode::{Flags, Tag, VNode, VNodeId, VNodeTree};

/// Lookup key of an old node in the middle segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SlotKey {
    Key(Key),
    Index(usize),
}

struct DiffCx<'a> {
    tree: &'a mut VNodeTree,
    journal: &'a mut PassJournal,
    parent: VNodeId,
    /// New and moved children need an explicit insertion.
    tracking: bool,
}

/// Reconcile the children of `parent` against `children` and return the new
/// first child.
pub(crate) fn diff_children(
    tree: &mut VNodeTree,
    journal: &mut PassJournal,
    parent: VNodeId,
    children: &Child,
) -> Option<VNodeId> {
    let tracking = {
        let node = &tree[parent];
        !node.is_created || matches!(node.tag, Tag::DomPortal | Tag::TreeRoot)
    };
    let mut cx = DiffCx {
        tree,
        journal,
        parent,
        tracking,
    };
    match children {
        Child::Element(el) if is_unkeyed_fragment(el) => {
            diff_children(cx.tree, cx.journal, parent, el.props.children())
        }
        Child::Empty => {
            cx.delete_all(false);
            None
        }
        Child::List(items) => cx.diff_list(items),
        single => cx.diff_list(std::slice::from_ref(single)),
    }
}

fn is_unkeyed_fragment(el: &Element) -> bool {
    matches!(el.element_type, ElementType::Fragment) && el.key.is_none()
}

fn text_of(child: &Child) -> Option<Rc<str>> {
    match child {
        Child::Text(text) => Some(text.clone()),
        Child::Number(n) => Some(Rc::from(format_number(*n))),
        _ => None,
    }
}

impl DiffCx<'_> {
    fn diff_list(&mut self, items: &[Child]) -> Option<VNodeId> {
        if items.iter().all(|c| matches!(c, Child::Empty)) {
            self.delete_all(true);
            return None;
        }

        let old = self.tree.children(self.parent);
        let n = items.len();
        let mut placed: Vec<Option<VNodeId>> = vec![None; n];

        // Left scan.
        let mut start_new = 0;
        let mut start_old = 0;
        loop {
            while start_new < n && matches!(items[start_new], Child::Empty) {
                start_new += 1;
            }
            if start_new >= n || start_old >= old.len() {
                break;
            }
            let candidate = old[start_old];
            if !self.can_reuse(candidate, &items[start_new], start_new) {
                break;
            }
            placed[start_new] = Some(self.reuse(candidate, &items[start_new]));
            start_new += 1;
            start_old += 1;
        }

        // Right scan.
        let mut end_new = n;
        let mut end_old = old.len();
        loop {
            while end_new > start_new && matches!(items[end_new - 1], Child::Empty) {
                end_new -= 1;
            }
            if end_new <= start_new || end_old <= start_old {
                break;
            }
            let candidate = old[end_old - 1];
            if !self.can_reuse(candidate, &items[end_new - 1], end_new - 1) {
                break;
            }
            placed[end_new - 1] = Some(self.reuse(candidate, &items[end_new - 1]));
            end_new -= 1;
            end_old -= 1;
        }

        // Middle.
        let middle_old = &old[start_old..end_old];
        if middle_old.is_empty() {
            for k in start_new..end_new {
                if !matches!(items[k], Child::Empty) {
                    placed[k] = Some(self.create(&items[k]));
                }
            }
        } else {
            let mut by_slot: IndexMap<SlotKey, VNodeId> = middle_old
                .iter()
                .map(|&id| {
                    let node = &self.tree[id];
                    let slot = match &node.key {
                        Some(key) => SlotKey::Key(key.clone()),
                        None => SlotKey::Index(node.e_index),
                    };
                    (slot, id)
                })
                .collect();

            // (new index, old e_index) of every reused middle node, in new order.
            let mut reused: Vec<(usize, usize)> = Vec::new();
            for (k, item) in items.iter().enumerate().take(end_new).skip(start_new) {
                if matches!(item, Child::Empty) {
                    continue;
                }
                let slot = match item.key() {
                    Some(key) => SlotKey::Key(key.clone()),
                    None => SlotKey::Index(k),
                };
                let id = match by_slot.swap_remove(&slot) {
                    Some(old_id) if self.can_reuse(old_id, item, k) => {
                        reused.push((k, self.tree[old_id].e_index));
                        self.reuse(old_id, item)
                    }
                    Some(old_id) => {
                        self.delete(old_id);
                        self.create(item)
                    }
                    None => self.create(item),
                };
                placed[k] = Some(id);
            }
            for (_, old_id) in by_slot {
                self.delete(old_id);
            }

            if self.tracking && !reused.is_empty() {
                let old_order: Vec<usize> = reused.iter().map(|&(_, e)| e).collect();
                if !is_increasing(&old_order) {
                    let keep: HashSet<usize> =
                        longest_increasing_subsequence(&old_order).into_iter().collect();
                    for (pos, &(k, _)) in reused.iter().enumerate() {
                        if !keep.contains(&pos) {
                            if let Some(id) = placed[k] {
                                self.tree[id].flags |= Flags::ADDITION;
                            }
                        }
                    }
                }
            }
        }

        self.link(&placed)
    }

    /// Rewrite sibling links, indices and paths for the new child list.
    fn link(&mut self, placed: &[Option<VNodeId>]) -> Option<VNodeId> {
        let parent_path = self.tree[self.parent].path.clone();
        let mut first = None;
        let mut prev: Option<VNodeId> = None;
        let mut c_index = 0;
        for (e_index, id) in placed.iter().enumerate() {
            let Some(id) = *id else { continue };
            let node = &mut self.tree[id];
            node.parent = Some(self.parent);
            node.c_index = c_index;
            node.e_index = e_index;
            node.next = None;
            node.path = format!("{parent_path},{c_index}");
            match prev {
                Some(p) => self.tree[p].next = Some(id),
                None => first = Some(id),
            }
            prev = Some(id);
            c_index += 1;
        }
        self.tree[self.parent].child = first;
        first
    }

    // ------------------------------------------------------------------
    // Reuse predicate
    // ------------------------------------------------------------------

    fn can_reuse(&self, id: VNodeId, item: &Child, index: usize) -> bool {
        let node = &self.tree[id];
        let same_slot = |key: Option<&Key>| match (&node.key, key) {
            (Some(a), Some(b)) => a == b,
            (None, None) => node.e_index == index,
            _ => false,
        };
        match item {
            Child::Empty => false,
            Child::Text(_) | Child::Number(_) => node.tag == Tag::DomText && same_slot(None),
            Child::List(_) => node.tag == Tag::Fragment && same_slot(None),
            Child::Portal(portal) => {
                node.tag == Tag::DomPortal
                    && same_slot(portal.key.as_ref())
                    && node.real_node == Some(portal.container)
            }
            Child::Element(el) => same_slot(el.key.as_ref()) && type_matches(node, &el.element_type),
        }
    }

    // ------------------------------------------------------------------
    // Node operations
    // ------------------------------------------------------------------

    fn reuse(&mut self, id: VNodeId, item: &Child) -> VNodeId {
        let tracking = self.tracking;
        let node = &mut self.tree[id];
        // A placement from a pass that never committed is still owed.
        node.flags &= Flags::INTERRUPTED | Flags::ADDITION;
        match item {
            Child::Text(_) | Child::Number(_) => {
                if let Some(text) = text_of(item) {
                    if node.text != text {
                        node.text = text;
                        node.flags |= Flags::UPDATE;
                    }
                }
            }
            Child::Element(el) => {
                if !Rc::ptr_eq(&node.props, &el.props) {
                    node.props = el.props.clone();
                }
                node.ref_ = el.ref_.clone();
                // A resolved lazy node keeps the component it resolved to.
                if node.lazy_type.is_none() {
                    node.element_type = Some(el.element_type.clone());
                }
            }
            Child::Portal(portal) => node.props = portal.props.clone(),
            Child::List(items) => {
                node.props = Rc::new(Props::with_children(Child::List(items.clone())));
            }
            Child::Empty => {}
        }
        // Never inserted: a previous pass that created it did not commit.
        if tracking && node.is_created {
            node.flags |= Flags::ADDITION;
        }
        id
    }

    fn create(&mut self, item: &Child) -> VNodeId {
        let mut node = match item {
            Child::Element(el) => node_from_element(el),
            Child::Portal(portal) => {
                let mut node = VNode::new(Tag::DomPortal, portal.props.clone(), portal.key.clone());
                node.real_node = Some(portal.container);
                node
            }
            Child::List(items) => VNode::new(
                Tag::Fragment,
                Rc::new(Props::with_children(Child::List(items.clone()))),
                None,
            ),
            Child::Text(_) | Child::Number(_) | Child::Empty => {
                VNode::text_node(text_of(item).unwrap_or_else(|| Rc::from("")))
            }
        };
        if self.tracking {
            node.flags |= Flags::ADDITION;
        }
        self.tree.insert(node)
    }

    fn delete(&mut self, id: VNodeId) {
        self.tree[id].flags = Flags::DELETION;
        self.tree[self.parent].dirty_nodes.push(id);
        self.journal.deletions.push(id);
    }

    /// Delete every child. With `allow_clear`, a committed host parent
    /// drops them with one `CLEAR`.
    fn delete_all(&mut self, allow_clear: bool) {
        let children = self.tree.children(self.parent);
        if children.is_empty() {
            return;
        }
        let parent = &self.tree[self.parent];
        let bulk = allow_clear && parent.tag == Tag::DomComponent && !parent.is_created;
        for &child in &children {
            if bulk {
                self.tree[child].flags = Flags::DELETION;
                self.tree[self.parent].cleared_children.push(child);
                self.journal.deletions.push(child);
            } else {
                self.delete(child);
            }
        }
        if bulk {
            self.tree[self.parent].flags |= Flags::CLEAR;
        }
        self.tree[self.parent].child = None;
    }
}

pub(crate) fn node_from_element(el: &Element) -> VNode {
    let mut node = VNode::new(Tag::of(&el.element_type), el.props.clone(), el.key.clone());
    node.element_type = Some(el.element_type.clone());
    node.ref_ = el.ref_.clone();
    if let ElementType::Lazy(lazy) = &el.element_type {
        node.lazy_type = Some(lazy.clone());
    }
    node
}

fn type_matches(node: &VNode, ty: &ElementType) -> bool {
    match ty {
        ElementType::Lazy(lazy) => node.lazy_type.as_ref().is_some_and(|l| l.ptr_eq(lazy)),
        _ => {
            node.lazy_type.is_none()
                && node.element_type.as_ref().is_some_and(|t| t.same_as(ty))
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::h;

    fn keyed(keys: &[&str]) -> Child {
        Child::from(
            keys.iter()
                .map(|k| Child::from(h("li").key(*k)))
                .collect::<Vec<_>>(),
        )
    }

    /// A committed `<ul>` under a root, with children from `initial`.
    fn mounted(initial: &Child) -> (VNodeTree, VNodeId) {
        let mut tree = VNodeTree::new();
        let mut journal = PassJournal::default();
        let root = tree.insert(VNode::new(Tag::TreeRoot, Rc::new(Props::new()), None));
        let ul = tree.insert(VNode::new(Tag::DomComponent, Rc::new(Props::new()), None));
        tree[ul].parent = Some(root);
        tree[root].child = Some(ul);
        diff_children(&mut tree, &mut journal, ul, initial);
        // Commit: nothing is freshly created any more.
        for id in tree.subtree(ul) {
            tree[id].is_created = false;
            tree[id].flags = Flags::empty();
        }
        (tree, ul)
    }

    fn keys_of(tree: &VNodeTree, parent: VNodeId) -> Vec<String> {
        tree.children(parent)
            .into_iter()
            .map(|id| tree[id].key().unwrap_or("").to_string())
            .collect()
    }

    fn count(tree: &VNodeTree, parent: VNodeId, flag: Flags) -> usize {
        tree.children(parent)
            .into_iter()
            .filter(|&id| tree[id].flags.contains(flag))
            .count()
    }

    #[test]
    fn rotation_moves_exactly_one_node() {
        let (mut tree, ul) = mounted(&keyed(&["1", "2", "3"]));
        let before = tree.len();
        let mut journal = PassJournal::default();
        diff_children(&mut tree, &mut journal, ul, &keyed(&["3", "1", "2"]));

        assert_eq!(keys_of(&tree, ul), ["3", "1", "2"]);
        assert_eq!(count(&tree, ul, Flags::ADDITION), 1);
        assert_eq!(tree.len(), before);
        assert!(journal.deletions.is_empty());
    }

    #[test]
    fn unmatched_keys_are_deleted_and_new_keys_created() {
        let (mut tree, ul) = mounted(&keyed(&["a", "b", "c"]));
        let old_b = tree.children(ul)[1];
        let mut journal = PassJournal::default();
        diff_children(&mut tree, &mut journal, ul, &keyed(&["a", "d", "c"]));

        assert_eq!(keys_of(&tree, ul), ["a", "d", "c"]);
        assert_eq!(journal.deletions, vec![old_b]);
        assert!(tree[old_b].flags.contains(Flags::DELETION));
        assert_eq!(tree[ul].dirty_nodes, vec![old_b]);
        assert_eq!(count(&tree, ul, Flags::ADDITION), 1);
    }

    #[test]
    fn empty_list_clears_committed_host_parent() {
        let (mut tree, ul) = mounted(&keyed(&["a", "b"]));
        let mut journal = PassJournal::default();
        let first = diff_children(&mut tree, &mut journal, ul, &Child::from(Vec::<Child>::new()));

        assert!(first.is_none());
        assert!(tree[ul].flags.contains(Flags::CLEAR));
        assert_eq!(tree[ul].cleared_children.len(), 2);
        assert!(tree[ul].dirty_nodes.is_empty());
    }

    #[test]
    fn empty_description_deletes_each_child() {
        let (mut tree, ul) = mounted(&keyed(&["a", "b"]));
        let old = tree.children(ul);
        let mut journal = PassJournal::default();
        let first = diff_children(&mut tree, &mut journal, ul, &Child::Empty);

        assert!(first.is_none());
        assert!(!tree[ul].flags.contains(Flags::CLEAR));
        assert!(tree[ul].cleared_children.is_empty());
        assert_eq!(tree[ul].dirty_nodes, old);
        assert_eq!(journal.deletions, old);
    }

    #[test]
    fn text_reuse_updates_in_place() {
        let (mut tree, ul) = mounted(&Child::from("old"));
        let text = tree.children(ul)[0];
        let mut journal = PassJournal::default();
        diff_children(&mut tree, &mut journal, ul, &Child::from("new"));

        assert_eq!(tree.children(ul), vec![text]);
        assert_eq!(&*tree[text].text, "new");
        assert!(tree[text].flags.contains(Flags::UPDATE));
    }

    #[test]
    fn type_change_replaces_node() {
        let (mut tree, ul) = mounted(&Child::from(h("span")));
        let span = tree.children(ul)[0];
        let mut journal = PassJournal::default();
        diff_children(&mut tree, &mut journal, ul, &Child::from(h("div")));

        let div = tree.children(ul)[0];
        assert_ne!(span, div);
        assert!(tree[div].flags.contains(Flags::ADDITION));
        assert_eq!(journal.deletions, vec![span]);
    }

    #[test]
    fn indices_skip_empty_entries() {
        let (mut tree, ul) = mounted(&Child::from(Vec::<Child>::new()));
        let mut journal = PassJournal::default();
        let items = Child::from(vec![Child::Empty, Child::from("a"), Child::Empty, Child::from("b")]);
        diff_children(&mut tree, &mut journal, ul, &items);

        let children = tree.children(ul);
        assert_eq!(children.len(), 2);
        assert_eq!((tree[children[0]].c_index, tree[children[0]].e_index), (0, 1));
        assert_eq!((tree[children[1]].c_index, tree[children[1]].e_index), (1, 3));
    }
}
