//! Per-Tag Render Paths
//!
//! [`render_node`] is the capture half of the work loop for a node that has
//! to re-render: it runs the node's render logic and reconciles the result
//! into the node's children. [`bubble_node`] is the bubble half, run once
//! every child has completed.
//!
//! Both dispatch on [`Tag`] with a plain `match`.

mod class;
mod context;
mod function;
mod host;
mod suspense;

pub(crate) use suspense::primary_child;

use crate::builder::Build;
use crate::element::ref_changed;
use crate::error::Throw;
use crate::update::process_root_updates;
use crate::vnode::{Flags, Tag, VNodeId};

/// Render `id` and return the first child to capture next.
pub(crate) fn render_node(build: &mut Build<'_>, id: VNodeId) -> Result<Option<VNodeId>, Throw> {
    let tag = build.rt.tree.borrow()[id].tag;
    match tag {
        Tag::TreeRoot => render_root(build, id),
        Tag::FunctionComponent | Tag::ForwardRef => function::render_function(build, id),
        Tag::Memo => function::render_memo(build, id),
        Tag::ClassComponent => class::render_class(build, id),
        Tag::DomComponent => host::render_host(build, id),
        Tag::DomText => Ok(None),
        Tag::Fragment | Tag::DomPortal => render_fragment(build, id),
        Tag::ContextProvider => context::render_provider(build, id),
        Tag::ContextConsumer => context::render_consumer(build, id),
        Tag::Lazy => suspense::render_lazy(build, id),
        Tag::Suspense => suspense::render_suspense(build, id),
    }
}

/// Finish `id` after its children completed.
pub(crate) fn bubble_node(build: &mut Build<'_>, id: VNodeId) {
    let tag = build.rt.tree.borrow()[id].tag;
    match tag {
        Tag::DomComponent => host::bubble_host(build, id),
        Tag::DomText => host::bubble_text(build, id),
        Tag::ContextProvider => build.pop_context(id),
        Tag::Suspense => suspense::bubble_suspense(build, id),
        _ => {}
    }

    if matches!(tag, Tag::DomComponent | Tag::ClassComponent) {
        let mut tree = build.rt.tree.borrow_mut();
        let node = &mut tree[id];
        if ref_changed(node.old_ref.as_ref(), node.ref_.as_ref()) {
            node.flags |= Flags::REF;
        }
    }
}

fn render_root(build: &mut Build<'_>, id: VNodeId) -> Result<Option<VNodeId>, Throw> {
    let element = {
        let mut tree = build.rt.tree.borrow_mut();
        let node = &mut tree[id];
        let queue = node.update_queue.as_mut().map(std::mem::take).unwrap_or_default();
        let (element, callbacks) = process_root_updates(queue);
        node.callbacks.extend(callbacks);
        if !node.callbacks.is_empty() {
            node.flags |= Flags::CALLBACK;
        }
        let state = node.root.get_or_insert_with(Default::default);
        if let Some(element) = element {
            state.element = element;
        }
        state.element.clone()
    };
    Ok(build.reconcile_children(id, &element))
}

/// Fragments and portals render their `children` prop as is.
fn render_fragment(build: &mut Build<'_>, id: VNodeId) -> Result<Option<VNodeId>, Throw> {
    let props = build.rt.tree.borrow()[id].props.clone();
    Ok(build.reconcile_children(id, props.children()))
}
