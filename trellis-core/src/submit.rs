//! Commit
//!
//! A completed build pass is applied in three sweeps over its dirty list,
//! which is ordered children before parents:
//!
//! 1. **before submit**: class components read host state with
//!    `get_snapshot_before_update`
//! 2. **submit**: host mutations (insertions, moves, prop and text updates,
//!    deletions) and layout effect cleanups
//! 3. **after submit**: layout effects, `component_did_mount` and
//!    `component_did_update`, update callbacks and ref attachment
//!
//! Passive effects are queued on the scheduler instead of run here.
//!
//! No user code runs while the tree is borrowed: each sweep gathers what it
//! needs from a node, releases the tree and then calls out.

use std::rc::Rc;

use tracing::{debug, debug_span, trace};

use crate::builder::{CompletedBuild, PassJournal};
use crate::component::ComponentRef;
use crate::devtools::DevtoolsHelper;
use crate::element::{ElementType, Props, Ref};
use crate::error::ReconcileError;
use crate::error_handler::capture_commit_error;
use crate::hooks::{
    changed_layout_slots, changed_passive_slots, take_due_effects, unmount_effects, DueEffect,
    EffectSlot,
};
use crate::host::HostNodeId;
use crate::render::primary_child;
use crate::runtime::RuntimeInner;
use crate::update::State;
use crate::value::Value;
use crate::vnode::{Flags, SuspenseChildStatus, Tag, VNodeId};

/// Apply a completed build of `root` to the host.
pub(crate) fn commit_root(
    rt: &Rc<RuntimeInner>,
    root: VNodeId,
    build: CompletedBuild,
) -> Result<(), ReconcileError> {
    let CompletedBuild { dirty, journal } = build;
    let _span = debug_span!("commit", ?root, dirty = dirty.len()).entered();
    let mut uncaught = Vec::new();

    rt.host.prepare_for_submit();
    before_submit(rt, &dirty);
    submit(rt, root, &dirty, &journal);
    rt.host.reset_after_submit();
    after_submit(rt, &dirty, &mut uncaught);
    finalize(rt, &journal);
    debug!(rendered = journal.rendered.len(), deleted = journal.deletions.len(), "committed");

    let devtools = rt.devtools.borrow().clone();
    if let Some(devtools) = devtools {
        devtools.on_commit(&DevtoolsHelper::new(rt), root);
    }

    match uncaught.into_iter().next() {
        Some(value) => Err(ReconcileError::Uncaught(value)),
        None => Ok(()),
    }
}

// ----------------------------------------------------------------------------
// Before submit
// ----------------------------------------------------------------------------

fn before_submit(rt: &Rc<RuntimeInner>, dirty: &[VNodeId]) {
    for &id in dirty {
        let Some((instance, prev_props, prev_state)) = snapshot_inputs(rt, id) else {
            continue;
        };
        let snapshot = instance
            .borrow_mut()
            .get_snapshot_before_update(&prev_props, &prev_state);
        if let Some(class) = rt.tree.borrow_mut().get_mut(id).and_then(|n| n.class.as_mut()) {
            class.snapshot = snapshot;
        }
    }
}

fn snapshot_inputs(rt: &RuntimeInner, id: VNodeId) -> Option<(ComponentRef, Rc<Props>, Rc<State>)> {
    let tree = rt.tree.borrow();
    let node = tree.get(id)?;
    if !node.flags.contains(Flags::SNAPSHOT) || node.flags.contains(Flags::DELETION) {
        return None;
    }
    let class = node.class.as_ref()?;
    let prev_props = node.old_props.clone().unwrap_or_else(|| node.props.clone());
    Some((class.instance.clone(), prev_props, class.committed_state.clone()))
}

// ----------------------------------------------------------------------------
// Submit
// ----------------------------------------------------------------------------

fn submit(rt: &Rc<RuntimeInner>, root: VNodeId, dirty: &[VNodeId], journal: &PassJournal) {
    for &id in dirty {
        let Some(flags) = rt.tree.borrow().get(id).map(|n| n.flags) else {
            continue;
        };

        if flags.contains(Flags::DELETION) {
            commit_deletion(rt, id, true);
            continue;
        }
        if flags.contains(Flags::RESET_TEXT) {
            if let Some(real) = rt.tree.borrow()[id].real_node {
                rt.host.reset_text_content(real);
            }
        }
        if flags.contains(Flags::REF) {
            detach_old_ref(rt, id);
        }
        if flags.contains(Flags::ADDITION) {
            commit_placement(rt, id);
        }
        if flags.contains(Flags::CLEAR) {
            commit_clear(rt, id);
        }
        if flags.contains(Flags::UPDATE) {
            commit_update(rt, id);
        }
    }

    // Deletions a failed pass left behind, and deletions whose parent's
    // dirty list was discarded by a retry.
    let orphans = rt
        .tree
        .borrow_mut()
        .get_mut(root)
        .and_then(|n| n.root.as_mut())
        .map(|state| std::mem::take(&mut state.orphans))
        .unwrap_or_default();
    for id in orphans.into_iter().chain(journal.deletions.iter().copied()) {
        if rt.tree.borrow().contains(id) {
            commit_deletion(rt, id, true);
        }
    }
}

fn detach_old_ref(rt: &RuntimeInner, id: VNodeId) {
    let old = {
        let tree = rt.tree.borrow();
        let node = &tree[id];
        if node.is_created {
            return;
        }
        node.old_ref.clone()
    };
    if let Some(old) = old {
        old.detach();
    }
}

fn commit_placement(rt: &RuntimeInner, id: VNodeId) {
    let (nodes, parent, before, reset_text) = {
        let mut tree = rt.tree.borrow_mut();
        tree[id].flags.remove(Flags::ADDITION);
        // A parent dropping its text content resets it before the first
        // child lands, not after.
        let reset_text = match tree.host_parent_node(id) {
            Some(p) if tree[p].flags.contains(Flags::RESET_TEXT) => {
                tree[p].flags.remove(Flags::RESET_TEXT);
                true
            }
            _ => false,
        };
        (tree.top_host_nodes(id), tree.host_parent(id), tree.host_sibling(id), reset_text)
    };
    let Some(parent) = parent else { return };
    if reset_text {
        rt.host.reset_text_content(parent);
    }
    trace!(node = ?id, count = nodes.len(), ?before, "placing host nodes");
    for node in nodes {
        match before {
            Some(before) => rt.host.insert_before(parent, node, before),
            None => rt.host.append_child(parent, node),
        }
    }
}

fn commit_update(rt: &Rc<RuntimeInner>, id: VNodeId) {
    let tree = rt.tree.borrow();
    let node = &tree[id];
    match node.tag {
        Tag::DomComponent if !node.is_created => {
            let Some(real) = node.real_node else { return };
            let tag = match &node.element_type {
                Some(ElementType::Host(tag)) => tag.clone(),
                _ => return,
            };
            let changes = node.change_list.clone();
            let props = node.props.clone();
            drop(tree);
            rt.host.set_props(real, &tag, &changes);
            rt.host.handle_controlled_input_elements(real, &tag, &props);
        }
        Tag::DomText if !node.is_created => {
            let Some(real) = node.real_node else { return };
            let text = node.text.clone();
            drop(tree);
            rt.host.set_text(real, &text);
        }
        Tag::Suspense => {
            let showing_fallback = node
                .suspense
                .as_ref()
                .is_some_and(|s| s.child_status == SuspenseChildStatus::ShowingFallback);
            let Some(primary) = primary_child(&tree, id) else { return };
            let nodes = tree.placed_host_nodes(primary);
            drop(tree);
            for real in nodes {
                if showing_fallback {
                    rt.host.hide_element(real);
                } else {
                    rt.host.unhide_element(real);
                }
            }
        }
        Tag::FunctionComponent | Tag::ForwardRef => {
            let slots = changed_layout_slots(&node.hooks);
            drop(tree);
            for slot in slots {
                slot.run_destroy();
            }
        }
        _ => {}
    }
}

/// Remove every host child of a host element at once, then tear down the
/// nodes that owned them.
fn commit_clear(rt: &Rc<RuntimeInner>, id: VNodeId) {
    let (real, cleared) = {
        let mut tree = rt.tree.borrow_mut();
        let node = &mut tree[id];
        (node.real_node, std::mem::take(&mut node.cleared_children))
    };
    if let Some(real) = real {
        rt.host.clear_children(real);
    }
    for child in cleared {
        if rt.tree.borrow().contains(child) {
            commit_deletion(rt, child, false);
        }
    }
}

/// What unmounting a subtree has to run once the tree is released.
#[derive(Default)]
struct Teardown {
    layout_destroys: Vec<Rc<EffectSlot>>,
    unmounting: Vec<ComponentRef>,
    refs: Vec<Ref>,
    /// Host nodes rendered into portal containers.
    portal_nodes: Vec<(HostNodeId, HostNodeId)>,
}

/// Unmount the subtree at `id` and drop it from the tree. With
/// `remove_host`, its top host nodes are also removed from their parent.
fn commit_deletion(rt: &Rc<RuntimeInner>, id: VNodeId, remove_host: bool) {
    let (teardown, host_nodes, host_parent) = {
        let tree = rt.tree.borrow();
        let mut teardown = Teardown::default();
        let mut sched = rt.sched.borrow_mut();
        for n in tree.subtree(id) {
            let node = &tree[n];
            let (layout, passive) = unmount_effects(&node.hooks);
            teardown.layout_destroys.extend(layout);
            sched.passive_destroys.extend(passive);
            if node.is_created {
                continue;
            }
            if let Some(class) = node.class.as_ref() {
                teardown.unmounting.push(class.instance.clone());
            }
            if matches!(node.tag, Tag::DomComponent | Tag::ClassComponent) {
                teardown.refs.extend(node.old_ref.clone());
            }
            if node.tag == Tag::DomPortal {
                if let Some(container) = node.real_node {
                    for child in tree.children(n) {
                        for real in tree.placed_host_nodes(child) {
                            teardown.portal_nodes.push((container, real));
                        }
                    }
                }
            }
        }
        let host_nodes = if remove_host {
            tree.placed_host_nodes(id)
        } else {
            Vec::new()
        };
        (teardown, host_nodes, tree.host_parent(id))
    };
    trace!(node = ?id, host_nodes = host_nodes.len(), "deleting subtree");

    for slot in teardown.layout_destroys {
        slot.run_destroy();
    }
    for instance in teardown.unmounting {
        instance.borrow_mut().component_will_unmount();
    }
    for ref_ in teardown.refs {
        ref_.detach();
    }
    for (container, real) in teardown.portal_nodes {
        rt.host.remove_child(container, real);
    }
    if let Some(parent) = host_parent {
        for real in host_nodes {
            rt.host.remove_child(parent, real);
        }
    }

    rt.tree.borrow_mut().remove_subtree(id);
}

// ----------------------------------------------------------------------------
// After submit
// ----------------------------------------------------------------------------

/// Per-node work of the after-submit sweep, gathered under the tree borrow.
enum Lifecycle {
    Function {
        layout: Vec<DueEffect>,
    },
    Class {
        instance: ComponentRef,
        mounted: bool,
        updated: bool,
        prev_props: Rc<Props>,
        prev_state: Rc<State>,
        snapshot: Value,
        caught: Vec<Value>,
    },
    None,
}

fn after_submit(rt: &Rc<RuntimeInner>, dirty: &[VNodeId], uncaught: &mut Vec<Value>) {
    for &id in dirty {
        let Some((lifecycle, callbacks, attach)) = gather_after_submit(rt, id) else {
            continue;
        };

        match lifecycle {
            Lifecycle::Function { layout } => {
                for due in layout {
                    if let Err(value) = due.slot.run_create(due.create) {
                        uncaught.extend(capture_commit_error(rt, id, value));
                    }
                }
            }
            Lifecycle::Class {
                instance,
                mounted,
                updated,
                prev_props,
                prev_state,
                snapshot,
                caught,
            } => {
                let result = if mounted {
                    instance.borrow_mut().component_did_mount()
                } else if updated {
                    instance
                        .borrow_mut()
                        .component_did_update(&prev_props, &prev_state, &snapshot)
                } else {
                    Ok(())
                };
                if let Err(value) = result {
                    uncaught.extend(capture_commit_error(rt, id, value));
                }
                for error in &caught {
                    instance.borrow_mut().component_did_catch(error);
                }
            }
            Lifecycle::None => {}
        }

        for callback in callbacks {
            callback();
        }
        if let Some((ref_, value)) = attach {
            ref_.attach(value);
        }
    }
}

type AfterSubmit = (Lifecycle, Vec<Box<dyn FnOnce()>>, Option<(Ref, Value)>);

fn gather_after_submit(rt: &Rc<RuntimeInner>, id: VNodeId) -> Option<AfterSubmit> {
    let mut tree = rt.tree.borrow_mut();
    let node = tree.get_mut(id)?;
    if node.flags.contains(Flags::DELETION) {
        return None;
    }
    let flags = node.flags;

    let lifecycle = match node.tag {
        Tag::FunctionComponent | Tag::ForwardRef if flags.contains(Flags::UPDATE) => {
            let passive_destroys = changed_passive_slots(&node.hooks);
            let (layout, passive) = take_due_effects(&mut node.hooks);
            let mut sched = rt.sched.borrow_mut();
            sched.passive_destroys.extend(passive_destroys);
            sched.passive_creates.extend(passive.into_iter().map(|due| (id, due)));
            Lifecycle::Function { layout }
        }
        Tag::ClassComponent if flags.intersects(Flags::UPDATE | Flags::CALLBACK) => {
            let is_created = node.is_created;
            let prev_props = node.old_props.clone().unwrap_or_else(|| node.props.clone());
            match node.class.as_mut() {
                Some(class) => Lifecycle::Class {
                    instance: class.instance.clone(),
                    mounted: is_created && flags.contains(Flags::UPDATE),
                    updated: !is_created && flags.contains(Flags::UPDATE),
                    prev_props,
                    prev_state: class.committed_state.clone(),
                    snapshot: std::mem::replace(&mut class.snapshot, Value::Undefined),
                    caught: std::mem::take(&mut class.caught),
                },
                None => Lifecycle::None,
            }
        }
        _ => Lifecycle::None,
    };

    let callbacks = if flags.contains(Flags::CALLBACK) {
        std::mem::take(&mut node.callbacks)
    } else {
        Vec::new()
    };

    let attach = if flags.contains(Flags::REF) {
        let value = match node.tag {
            Tag::DomComponent => node.real_node.map(Value::object),
            Tag::ClassComponent => node.class.as_ref().map(|c| Value::object(c.instance.clone())),
            _ => None,
        };
        node.ref_.clone().zip(value)
    } else {
        None
    };

    Some((lifecycle, callbacks, attach))
}

// ----------------------------------------------------------------------------
// Finalize
// ----------------------------------------------------------------------------

/// Make every node that finished this pass the new committed state.
fn finalize(rt: &RuntimeInner, journal: &PassJournal) {
    let mut tree = rt.tree.borrow_mut();
    for &id in &journal.rendered {
        let Some(node) = tree.get_mut(id) else { continue };
        if !node.pass_done || node.flags.contains(Flags::DELETION) {
            continue;
        }
        node.is_created = false;
        node.old_props = Some(node.props.clone());
        node.old_ref = node.ref_.clone();
        if let Some(class) = node.class.as_mut() {
            class.committed_state = class.state.clone();
            class.snapshot = Value::Undefined;
        }
        if let Some(suspense) = node.suspense.as_mut() {
            suspense.old_child_status = suspense.child_status;
            suspense.did_capture = false;
        }
        node.flags = Flags::empty();
        node.change_list.clear();
        node.dirty_nodes.clear();
        node.cleared_children.clear();
        node.pass_done = false;
    }
}
