//! Thrown Value Routing
//!
//! A render that unwinds hands its [`Throw`] to [`handle_thrown`], which
//! decides where the build continues:
//!
//! - a promise goes to the nearest Suspense boundary not already showing its
//!   fallback
//! - an error value goes to the nearest class component that is an error
//!   boundary and has not caught anything yet in this pass
//! - an invariant violation always aborts the pass
//!
//! Errors raised by commit-phase lifecycles and effects take the same route
//! through [`capture_commit_error`], except the boundary re-renders in a new
//! pass instead of the current one.

use std::rc::Rc;

use tracing::{debug, error, warn};

use crate::builder::Build;
use crate::component::ComponentRef;
use crate::error::{ReconcileError, Throw};
use crate::runtime::{self, RuntimeInner};
use crate::thenable::Promise;
use crate::update::{Payload, Update, UpdateTag};
use crate::value::Value;
use crate::vnode::{Flags, Tag, VNodeId, VNodeTree};

/// Where the work loop goes after a throw.
pub(crate) enum Recovery {
    /// Re-render from this boundary.
    Resume(VNodeId),
    /// Stop the pass and report the error.
    Abort(ReconcileError),
}

pub(crate) fn handle_thrown(build: &mut Build<'_>, thrower: VNodeId, thrown: Throw) -> Recovery {
    let name = {
        let mut tree = build.rt.tree.borrow_mut();
        let node = &mut tree[thrower];
        node.flags |= Flags::INTERRUPTED;
        node.dirty_nodes.clear();
        let name = node.name();
        tree.mark_should_update(thrower);
        name
    };

    match thrown {
        Throw::Suspend(promise) => match attach_to_suspense(build.rt, thrower, promise) {
            Some(boundary) => Recovery::Resume(boundary),
            None => {
                warn!(component = %name, "suspended outside any Suspense boundary");
                let reason = Value::from(format!(
                    "{name} suspended while rendering, but no Suspense boundary was found"
                ));
                match route_error(build.rt, thrower, reason) {
                    Some(boundary) => Recovery::Resume(boundary),
                    None => Recovery::Abort(ReconcileError::UnhandledSuspension { component: name }),
                }
            }
        },
        Throw::Error(value) => match route_error(build.rt, thrower, value.clone()) {
            Some(boundary) => Recovery::Resume(boundary),
            None => {
                error!(component = %name, error = %value, "uncaught error while rendering");
                Recovery::Abort(ReconcileError::Uncaught(value))
            }
        },
        Throw::Fatal(err) => {
            error!(component = %name, %err, "render failed");
            Recovery::Abort(err)
        }
    }
}

/// Record `promise` on the nearest Suspense boundary above `thrower` and
/// re-render that boundary once the promise settles.
fn attach_to_suspense(rt: &Rc<RuntimeInner>, thrower: VNodeId, promise: Promise) -> Option<VNodeId> {
    let (boundary, known) = {
        let mut tree = rt.tree.borrow_mut();
        let boundary = tree.ancestors(thrower).into_iter().find(|&id| {
            tree[id].tag == Tag::Suspense && tree[id].suspense.as_ref().is_some_and(|s| !s.did_capture)
        })?;
        tree.mark_should_update(boundary);
        let state = tree[boundary].suspense.as_mut()?;
        state.did_capture = true;
        let known = state.promises.iter().any(|p| p.id() == promise.id());
        if !known {
            state.promises.push(promise.clone());
        }
        (boundary, known)
    };
    // Already waiting on this promise.
    if known {
        return Some(boundary);
    }
    debug!(?boundary, promise = promise.id(), "suspended, showing fallback");

    let weak = Rc::downgrade(rt);
    let id = promise.id();
    promise.then(move |_| {
        let Some(rt) = weak.upgrade() else { return };
        if let Some(state) = rt
            .tree
            .borrow_mut()
            .get_mut(boundary)
            .and_then(|node| node.suspense.as_mut())
        {
            state.promises.retain(|p| p.id() != id);
        }
        if let Err(err) = runtime::launch_update_from_vnode(&rt, boundary) {
            error!(?boundary, %err, "retry after suspension failed");
        }
    });
    Some(boundary)
}

/// Class components above `source` that might be error boundaries,
/// nearest first.
fn boundary_candidates(tree: &VNodeTree, source: VNodeId) -> Vec<(VNodeId, ComponentRef)> {
    tree.ancestors(source)
        .into_iter()
        .filter_map(|id| {
            let node = &tree[id];
            if node.tag != Tag::ClassComponent || node.flags.contains(Flags::DID_CAPTURE) {
                return None;
            }
            node.class.as_ref().map(|class| (id, class.instance.clone()))
        })
        .collect()
}

/// Enqueue `value` on the nearest error boundary above `source`.
fn route_error(rt: &Rc<RuntimeInner>, source: VNodeId, value: Value) -> Option<VNodeId> {
    let candidates = boundary_candidates(&rt.tree.borrow(), source);
    // Instances are asked without holding the tree.
    let boundary = candidates
        .into_iter()
        .find(|(_, instance)| instance.borrow().is_error_boundary())
        .map(|(id, _)| id)?;

    let mut tree = rt.tree.borrow_mut();
    let node = &mut tree[boundary];
    node.update_queue
        .get_or_insert_with(Default::default)
        .push(Update::new(UpdateTag::Error, Payload::Error(value)));
    node.flags |= Flags::DID_CAPTURE;
    tree.mark_should_update(boundary);
    debug!(?boundary, "error captured by boundary");
    Some(boundary)
}

/// Route an error raised after commit. Returns the value back if no
/// boundary took it.
pub(crate) fn capture_commit_error(rt: &Rc<RuntimeInner>, source: VNodeId, value: Value) -> Option<Value> {
    if !rt.tree.borrow().contains(source) {
        error!(error = %value, "error from an unmounted component");
        return Some(value);
    }
    match route_error(rt, source, value.clone()) {
        Some(boundary) => {
            if let Err(err) = runtime::launch_update_from_vnode(rt, boundary) {
                error!(?boundary, %err, "could not re-render error boundary");
            }
            None
        }
        None => {
            error!(error = %value, "uncaught error during commit");
            Some(value)
        }
    }
}
