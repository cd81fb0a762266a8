//! Tree Builder
//!
//! One build pass walks the subtree below a start node in two directions:
//!
//! - **capture** (top-down): re-render the node, or take the fast path when
//!   nothing about it changed, and move to its first child
//! - **bubble** (bottom-up): once a node has no unvisited child, finish its
//!   tag-specific work and fold its dirty list into the parent's
//!
//! The walk is an explicit loop over `child`/`next`/`parent` links rather
//! than recursion, so a thrown value can move the cursor back up to a
//! boundary and continue from there.
//!
//! # Start node
//!
//! The start node is the lowest common ancestor of every node with a pending
//! update. Context providers above it are re-entered before the walk begins
//! so consumers below see the right values.
//!
//! # Journal
//!
//! Every captured node and every deletion of the pass is recorded. The
//! commit finalizes only nodes that finished bubbling; a pass that aborts
//! hands its deletions to the root so the next commit still performs them.

use std::rc::Rc;

use tracing::{debug, debug_span, trace};

use crate::diff::diff_children;
use crate::element::{Child, Context, ElementType};
use crate::error::{ReconcileError, Throw};
use crate::error_handler::{self, Recovery};
use crate::render;
use crate::runtime::RuntimeInner;
use crate::value::Value;
use crate::vnode::{Flags, Tag, VNodeId, VNodeTree};

/// Nodes a pass touched.
#[derive(Debug, Default)]
pub(crate) struct PassJournal {
    /// Captured nodes, in capture order. A node captured twice appears twice.
    pub(crate) rendered: Vec<VNodeId>,
    pub(crate) deletions: Vec<VNodeId>,
}

/// How a build pass ended.
pub(crate) enum BuildStatus {
    Completed(CompletedBuild),
    /// No pending update was still attached to the tree.
    Incomplete,
    /// An application error reached the root.
    Errored(ReconcileError),
    /// A reconciler invariant was violated.
    FatalErrored(ReconcileError),
}

/// Output of a completed pass, consumed by the commit.
pub(crate) struct CompletedBuild {
    /// Nodes needing commit, descendants before ancestors.
    pub(crate) dirty: Vec<VNodeId>,
    pub(crate) journal: PassJournal,
}

struct ContextFrame {
    provider: VNodeId,
    context: Context,
    prev: Value,
}

/// State of one build pass.
pub(crate) struct Build<'a> {
    pub(crate) rt: &'a Rc<RuntimeInner>,
    pub(crate) root: VNodeId,
    start: VNodeId,
    pub(crate) journal: PassJournal,
    contexts: Vec<ContextFrame>,
    dirty: Vec<VNodeId>,
}

/// Flags a render recomputes every time it runs.
fn render_flags() -> Flags {
    Flags::UPDATE
        | Flags::CALLBACK
        | Flags::SNAPSHOT
        | Flags::REF
        | Flags::CLEAR
        | Flags::RESET_TEXT
        | Flags::INTERRUPTED
}

/// Run one build pass for `root`.
pub(crate) fn build_root(rt: &Rc<RuntimeInner>, root: VNodeId) -> BuildStatus {
    let _span = debug_span!("build", ?root).entered();

    let start = find_start(&mut rt.tree.borrow_mut(), root);
    let Some(start) = start else {
        trace!("no attached node has a pending update");
        return BuildStatus::Incomplete;
    };
    debug!(?start, "build pass started");

    let mut build = Build {
        rt,
        root,
        start,
        journal: PassJournal::default(),
        contexts: Vec::new(),
        dirty: Vec::new(),
    };
    build.restore_contexts();
    let status = build.work_loop();
    build.unwind_all_contexts();
    status
}

/// Lowest common ancestor of the pending updates that are still attached.
fn find_start(tree: &mut VNodeTree, root: VNodeId) -> Option<VNodeId> {
    let pending = std::mem::take(&mut tree.get_mut(root)?.root.as_mut()?.to_update);
    let live: Vec<VNodeId> = pending
        .into_iter()
        .filter(|&id| tree.get(id).is_some_and(|n| n.should_update) && tree.root_of(id) == Some(root))
        .collect();

    let (&first, rest) = live.split_first()?;
    let mut lca = first;
    for &id in rest {
        while !tree.is_ancestor_or_self(lca, id) {
            lca = tree[lca].parent?;
        }
    }
    Some(lca)
}

impl<'a> Build<'a> {
    fn work_loop(&mut self) -> BuildStatus {
        let mut cursor = Some(self.start);
        while let Some(id) = cursor {
            cursor = match self.capture(id) {
                Ok(Some(child)) => Some(child),
                Ok(None) => self.bubble(id),
                Err(thrown) => match error_handler::handle_thrown(self, id, thrown) {
                    Recovery::Resume(boundary) => {
                        self.resume_at(boundary);
                        Some(boundary)
                    }
                    Recovery::Abort(err) => {
                        self.abort();
                        return match err {
                            ReconcileError::Uncaught(_) => BuildStatus::Errored(err),
                            _ => BuildStatus::FatalErrored(err),
                        };
                    }
                },
            };
        }

        BuildStatus::Completed(CompletedBuild {
            dirty: std::mem::take(&mut self.dirty),
            journal: std::mem::take(&mut self.journal),
        })
    }

    // ------------------------------------------------------------------
    // Capture
    // ------------------------------------------------------------------

    fn capture(&mut self, id: VNodeId) -> Result<Option<VNodeId>, Throw> {
        let bail = {
            let mut tree = self.rt.tree.borrow_mut();
            let node = &mut tree[id];
            let interrupted = node.flags.contains(Flags::INTERRUPTED);
            if node.tag == Tag::DomText {
                // Text nodes get their flags from the parent's diff.
                node.flags.remove(Flags::INTERRUPTED);
            } else {
                node.flags.remove(render_flags());
            }
            node.dirty_nodes.clear();
            node.cleared_children.clear();
            node.change_list.clear();
            node.pass_done = false;

            let bail = !node.is_created
                && !node.should_update
                && !interrupted
                && !node.has_new_props()
                && node.tag != Tag::TreeRoot;
            node.should_update = false;
            bail
        };
        self.journal.rendered.push(id);

        if bail {
            return Ok(self.bail_out(id));
        }
        trace!(node = ?id, "capture");
        render::render_node(self, id)
    }

    /// Fast path for an unchanged node: keep its children as they are and
    /// descend only if something below has an update.
    fn bail_out(&mut self, id: VNodeId) -> Option<VNodeId> {
        let provided = {
            let tree = self.rt.tree.borrow();
            let node = &tree[id];
            match &node.element_type {
                Some(ElementType::Provider(context)) if node.tag == Tag::ContextProvider => {
                    Some((context.clone(), node.props.value("value")))
                }
                _ => None,
            }
        };
        if let Some((context, value)) = provided {
            self.push_context(id, &context, value);
        }
        self.skip_children(id)
    }

    /// The first child to visit when `id` itself did not re-render.
    pub(crate) fn skip_children(&mut self, id: VNodeId) -> Option<VNodeId> {
        let mut tree = self.rt.tree.borrow_mut();
        if !tree[id].child_should_update {
            return None;
        }
        tree.repair_paths(id);
        tree[id].child
    }

    /// Reconcile the children of `id` and return the first one.
    pub(crate) fn reconcile_children(&mut self, id: VNodeId, children: &Child) -> Option<VNodeId> {
        let mut tree = self.rt.tree.borrow_mut();
        diff_children(&mut tree, &mut self.journal, id, children)
    }

    // ------------------------------------------------------------------
    // Bubble
    // ------------------------------------------------------------------

    /// Complete `id` and its ancestors until one has an unvisited sibling.
    fn bubble(&mut self, mut id: VNodeId) -> Option<VNodeId> {
        loop {
            self.complete(id);
            if id == self.start {
                return None;
            }
            let (next, parent) = {
                let tree = self.rt.tree.borrow();
                (tree[id].next, tree[id].parent)
            };
            if next.is_some() {
                return next;
            }
            id = parent?;
        }
    }

    fn complete(&mut self, id: VNodeId) {
        render::bubble_node(self, id);

        let mut tree = self.rt.tree.borrow_mut();
        let node = &mut tree[id];
        node.pass_done = true;
        node.child_should_update = false;
        let mut dirty = std::mem::take(&mut node.dirty_nodes);
        if node.flags.needs_commit() {
            dirty.push(id);
        }
        let parent = node.parent;

        if id == self.start {
            self.dirty = dirty;
        } else if let Some(parent) = parent {
            tree[parent].dirty_nodes.extend(dirty);
        }
    }

    // ------------------------------------------------------------------
    // Context stack
    // ------------------------------------------------------------------

    pub(crate) fn push_context(&mut self, provider: VNodeId, context: &Context, value: Value) {
        let prev = context.replace_current(value);
        self.contexts.push(ContextFrame {
            provider,
            context: context.clone(),
            prev,
        });
    }

    pub(crate) fn pop_context(&mut self, provider: VNodeId) {
        if self.contexts.last().is_some_and(|f| f.provider == provider) {
            if let Some(frame) = self.contexts.pop() {
                frame.context.replace_current(frame.prev);
            }
        }
    }

    /// Re-enter the providers above the start node, outermost first.
    fn restore_contexts(&mut self) {
        let providers: Vec<(VNodeId, Context, Value)> = {
            let tree = self.rt.tree.borrow();
            tree.ancestors(self.start)
                .into_iter()
                .rev()
                .filter_map(|id| match &tree[id].element_type {
                    Some(ElementType::Provider(context)) if tree[id].tag == Tag::ContextProvider => {
                        Some((id, context.clone(), tree[id].props.value("value")))
                    }
                    _ => None,
                })
                .collect()
        };
        for (id, context, value) in providers {
            self.push_context(id, &context, value);
        }
    }

    /// Pop every frame that is not a strict ancestor of `boundary`.
    fn unwind_contexts_to(&mut self, boundary: VNodeId) {
        loop {
            let keep = match self.contexts.last() {
                Some(frame) => {
                    frame.provider != boundary
                        && self.rt.tree.borrow().is_ancestor_or_self(frame.provider, boundary)
                }
                None => return,
            };
            if keep {
                return;
            }
            if let Some(frame) = self.contexts.pop() {
                frame.context.replace_current(frame.prev);
            }
        }
    }

    fn unwind_all_contexts(&mut self) {
        while let Some(frame) = self.contexts.pop() {
            frame.context.replace_current(frame.prev);
        }
    }

    // ------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------

    /// Continue the walk at `boundary`. Everything its subtree rendered so
    /// far stays queued, since parts of it may not be rendered again before
    /// the commit.
    fn resume_at(&mut self, boundary: VNodeId) {
        self.unwind_contexts_to(boundary);

        let mut tree = self.rt.tree.borrow_mut();
        if !tree.is_ancestor_or_self(self.start, boundary) {
            debug!(from = ?self.start, to = ?boundary, "build start moved up to boundary");
            self.start = boundary;
        }

        let mut unfinished = Vec::new();
        for &id in &self.journal.rendered {
            if id == boundary || !tree.contains(id) || !tree.is_ancestor_or_self(boundary, id) {
                continue;
            }
            let node = &mut tree[id];
            if node.flags.contains(Flags::DELETION) {
                continue;
            }
            node.pass_done = false;
            unfinished.push(id);
        }
        self.requeue(&mut tree, unfinished);
    }

    /// Leave the tree as the last commit saw it, keeping the pass's work
    /// queued for the next one.
    fn abort(&mut self) {
        self.unwind_all_contexts();

        let mut tree = self.rt.tree.borrow_mut();
        let deletions = std::mem::take(&mut self.journal.deletions);
        if let Some(state) = tree[self.root].root.as_mut() {
            state.orphans.extend(deletions);
        }

        let mut unfinished = Vec::new();
        for &id in &self.journal.rendered {
            let Some(node) = tree.get_mut(id) else { continue };
            if node.flags.contains(Flags::DELETION) {
                continue;
            }
            node.pass_done = false;
            node.dirty_nodes.clear();
            node.flags.remove(Flags::DID_CAPTURE);
            if let Some(suspense) = node.suspense.as_mut() {
                suspense.did_capture = false;
            }
            unfinished.push(id);
        }
        self.requeue(&mut tree, unfinished);
    }

    fn requeue(&self, tree: &mut VNodeTree, ids: Vec<VNodeId>) {
        if ids.is_empty() {
            return;
        }
        for &id in &ids {
            tree.mark_should_update(id);
        }
        if let Some(state) = tree[self.root].root.as_mut() {
            state.to_update.extend(ids);
        }
    }
}
