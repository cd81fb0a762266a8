//! Context providers and consumers.

use tracing::trace;

use crate::builder::Build;
use crate::element::{Child, ConsumerRender, Context, ContextId, ElementType};
use crate::error::Throw;
use crate::vnode::{Tag, VNodeId, VNodeTree};

pub(super) fn render_provider(build: &mut Build<'_>, id: VNodeId) -> Result<Option<VNodeId>, Throw> {
    let (context, value, changed, props) = {
        let tree = build.rt.tree.borrow();
        let node = &tree[id];
        let Some(ElementType::Provider(context)) = node.element_type.clone() else {
            return Ok(None);
        };
        let value = node.props.value("value");
        let changed = !node.is_created
            && node
                .old_props
                .as_ref()
                .is_some_and(|old| !old.value("value").is_same(&value));
        (context, value, changed, node.props.clone())
    };

    build.push_context(id, &context, value);
    if changed {
        let mut tree = build.rt.tree.borrow_mut();
        let marked = propagate_context_change(&mut tree, id, &context);
        trace!(provider = ?id, marked, "context value changed");
    }
    Ok(build.reconcile_children(id, props.children()))
}

/// Mark every consumer of `context` below `provider` for re-render, without
/// entering nested providers of the same context. Returns how many were
/// marked.
fn propagate_context_change(tree: &mut VNodeTree, provider: VNodeId, context: &Context) -> usize {
    let id = context.id();
    let mut marked = 0;
    let mut stack = tree.children(provider);
    while let Some(node) = stack.pop() {
        if depends_on(tree, node, id) {
            tree.mark_should_update(node);
            marked += 1;
        }
        let shadowed = tree[node].tag == Tag::ContextProvider
            && matches!(&tree[node].element_type, Some(ElementType::Provider(c)) if c.ptr_eq(context));
        if !shadowed {
            stack.extend(tree.children(node));
        }
    }
    marked
}

fn depends_on(tree: &VNodeTree, node: VNodeId, id: ContextId) -> bool {
    tree[node].context_deps.contains(&id)
}

pub(super) fn render_consumer(build: &mut Build<'_>, id: VNodeId) -> Result<Option<VNodeId>, Throw> {
    let (context, render) = {
        let mut tree = build.rt.tree.borrow_mut();
        let node = &mut tree[id];
        let Some(ElementType::Consumer(context)) = node.element_type.clone() else {
            return Ok(None);
        };
        let render = node
            .props
            .get("render")
            .and_then(|value| value.downcast_ref::<ConsumerRender>())
            .map(|render| render.0.clone());
        if !node.context_deps.contains(&context.id()) {
            node.context_deps.push(context.id());
        }
        (context, render)
    };

    let children = match render {
        Some(render) => render(&context.current()),
        None => Child::Empty,
    };
    Ok(build.reconcile_children(id, &children))
}
