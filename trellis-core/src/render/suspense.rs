//! Suspense boundaries and lazy components.
//!
//! A boundary has at most two children, both keyed fragments: the primary
//! content and the fallback. While a descendant is pending, a primary that
//! was already on screen stays mounted but hidden next to the fallback, so
//! its state survives until the content can be shown again.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::builder::Build;
use crate::element::{Child, Element, ElementType, Props};
use crate::error::Throw;
use crate::update::UpdateQueue;
use crate::vnode::{Flags, SuspenseChildStatus, Tag, VNodeId, VNodeTree};

const PRIMARY_KEY: &str = "__primary";
const FALLBACK_KEY: &str = "__fallback";

/// The primary content fragment of a Suspense boundary.
pub(crate) fn primary_child(tree: &VNodeTree, boundary: VNodeId) -> Option<VNodeId> {
    tree.children(boundary)
        .into_iter()
        .find(|&child| tree[child].key.as_deref() == Some(PRIMARY_KEY))
}

fn keyed_fragment(key: &str, props: Rc<Props>) -> Child {
    Child::Element(Element {
        element_type: ElementType::Fragment,
        key: Some(Rc::from(key)),
        props,
        ref_: None,
    })
}

pub(super) fn render_suspense(build: &mut Build<'_>, id: VNodeId) -> Result<Option<VNodeId>, Throw> {
    let (did_capture, props, primary) = {
        let tree = build.rt.tree.borrow();
        let node = &tree[id];
        let did_capture = node.suspense.as_ref().is_some_and(|s| s.did_capture);
        (did_capture, node.props.clone(), primary_child(&tree, id))
    };

    if !did_capture {
        set_status(build, id, SuspenseChildStatus::ShowingContent);
        if let Some(primary) = primary {
            build.rt.tree.borrow_mut()[primary].hidden = false;
        }
        let content = Rc::new(Props::with_children(props.children().clone()));
        return Ok(build.reconcile_children(id, &keyed_fragment(PRIMARY_KEY, content)));
    }

    set_status(build, id, SuspenseChildStatus::ShowingFallback);
    let fallback = props
        .get("fallback")
        .and_then(|value| value.downcast_ref::<Child>())
        .cloned()
        .unwrap_or_default();
    let fallback = keyed_fragment(FALLBACK_KEY, Rc::new(Props::with_children(fallback)));

    let kept = primary.filter(|&p| !build.rt.tree.borrow()[p].is_created);
    let Some(primary) = kept else {
        trace!(boundary = ?id, "showing fallback");
        return Ok(build.reconcile_children(id, &fallback));
    };

    // Keep the committed primary as it is and only render the fallback.
    let primary_props = build.rt.tree.borrow()[primary].props.clone();
    let children = Child::List(vec![keyed_fragment(PRIMARY_KEY, primary_props), fallback].into());
    build.reconcile_children(id, &children);

    let mut tree = build.rt.tree.borrow_mut();
    tree[primary].hidden = true;
    trace!(boundary = ?id, "hiding content behind fallback");
    Ok(tree[primary].next)
}

fn set_status(build: &mut Build<'_>, id: VNodeId, status: SuspenseChildStatus) {
    if let Some(suspense) = build.rt.tree.borrow_mut()[id].suspense.as_mut() {
        suspense.child_status = status;
    }
}

pub(super) fn bubble_suspense(build: &mut Build<'_>, id: VNodeId) {
    let mut tree = build.rt.tree.borrow_mut();
    let node = &mut tree[id];
    let switched = node
        .suspense
        .as_ref()
        .is_some_and(|s| s.child_status != s.old_child_status);
    if !node.is_created && switched {
        node.flags |= Flags::UPDATE;
    }
}

/// Resolve a lazy node's component, turn the node into that component and
/// render it. Suspends while the loader is pending.
pub(super) fn render_lazy(build: &mut Build<'_>, id: VNodeId) -> Result<Option<VNodeId>, Throw> {
    let lazy = build.rt.tree.borrow()[id].lazy_type.clone();
    let Some(lazy) = lazy else {
        return Ok(None);
    };
    let resolved = lazy.resolve()?;
    if matches!(resolved, ElementType::Lazy(_)) {
        return Err(Throw::error("lazy component resolved to another lazy component"));
    }

    {
        let mut tree = build.rt.tree.borrow_mut();
        let node = &mut tree[id];
        node.tag = Tag::of(&resolved);
        if node.tag == Tag::ClassComponent && node.update_queue.is_none() {
            node.update_queue = Some(UpdateQueue::default());
        }
        if node.tag == Tag::Suspense && node.suspense.is_none() {
            node.suspense = Some(Default::default());
        }
        debug!(node = ?id, component = %resolved.name(), "lazy component resolved");
        node.element_type = Some(resolved);
    }
    super::render_node(build, id)
}
