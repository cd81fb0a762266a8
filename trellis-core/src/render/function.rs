//! Function, forward-ref and memo components.

use std::rc::Rc;

use tracing::trace;

use crate::builder::Build;
use crate::element::{ref_changed, Child, Element, ElementType, Props, Ref, RenderResult};
use crate::error::{ReconcileError, Throw};
use crate::hooks::{Hook, HookStage, RenderCx, RenderOutput};
use crate::runtime::RuntimeInner;
use crate::vnode::{Flags, VNodeId};

/// Restores the render bookkeeping of an outer render on drop.
struct RenderingGuard<'a> {
    rt: &'a RuntimeInner,
    prev_node: Option<VNodeId>,
    prev_update: bool,
}

impl<'a> RenderingGuard<'a> {
    fn enter(rt: &'a RuntimeInner, node: VNodeId) -> Self {
        Self {
            rt,
            prev_node: rt.current_render.replace(Some(node)),
            prev_update: rt.render_phase_update.replace(false),
        }
    }
}

impl Drop for RenderingGuard<'_> {
    fn drop(&mut self) {
        self.rt.current_render.set(self.prev_node);
        self.rt.render_phase_update.set(self.prev_update);
    }
}

pub(super) fn render_function(build: &mut Build<'_>, id: VNodeId) -> Result<Option<VNodeId>, Throw> {
    let (element_type, props, ref_, hooks, name) = {
        let mut tree = build.rt.tree.borrow_mut();
        let node = &mut tree[id];
        (
            node.element_type.clone(),
            node.props.clone(),
            node.ref_.clone(),
            std::mem::take(&mut node.hooks),
            node.name(),
        )
    };
    let stage = if hooks.is_empty() {
        HookStage::Init
    } else {
        HookStage::Update
    };

    let (result, output) = run_with_hooks(build.rt, id, stage, hooks, &name, |cx| {
        match &element_type {
            Some(ElementType::Function(f)) => f.call(cx, &props),
            Some(ElementType::ForwardRef(f)) => f.call(cx, &props, ref_.as_ref()),
            _ => Ok(Child::Empty),
        }
    });

    {
        let mut tree = build.rt.tree.borrow_mut();
        let node = &mut tree[id];
        node.hooks = output.hooks;
        node.context_deps = output.context_deps;
        if output.effect_changed {
            node.flags |= Flags::UPDATE;
        }
    }

    let children = result?;
    Ok(build.reconcile_children(id, &children))
}

/// Run `body` with a hook context, re-running it while it updates its own
/// state mid-render.
fn run_with_hooks<F>(
    rt: &Rc<RuntimeInner>,
    id: VNodeId,
    stage: HookStage,
    hooks: Vec<Hook>,
    name: &str,
    body: F,
) -> (RenderResult, RenderOutput)
where
    F: Fn(&mut RenderCx<'_>) -> RenderResult,
{
    let limit = rt.config.nested_render_limit;
    let _guard = RenderingGuard::enter(rt, id);
    let mut cx = RenderCx::new(rt, id, stage, hooks);
    let mut renders = 0usize;

    let result = loop {
        rt.render_phase_update.set(false);
        let result = body(&mut cx);
        if result.is_err() || !rt.render_phase_update.get() {
            break result;
        }
        renders += 1;
        if renders >= limit {
            break Err(Throw::Fatal(ReconcileError::NestedRenderLimit {
                component: name.to_string(),
                limit,
            }));
        }
        trace!(node = ?id, renders, "render-phase update, rendering again");
        cx.restart();
    };

    let result = match result {
        Ok(children) => cx.finish().map(|()| children).map_err(Throw::from),
        Err(thrown) => Err(thrown),
    };
    (result, cx.into_output())
}

/// Render a memo wrapper: skip when the props compare equal, otherwise
/// render the wrapped component as the only child.
pub(super) fn render_memo(build: &mut Build<'_>, id: VNodeId) -> Result<Option<VNodeId>, Throw> {
    let (memo, props, ref_, skip) = {
        let tree = build.rt.tree.borrow();
        let node = &tree[id];
        let Some(ElementType::Memo(memo)) = node.element_type.clone() else {
            return Ok(None);
        };
        let skip = !node.is_created
            && node.child.is_some()
            && node
                .old_props
                .as_ref()
                .is_some_and(|old| memo.props_equal(old, &node.props))
            && !ref_changed(node.old_ref.as_ref(), node.ref_.as_ref());
        (memo, node.props.clone(), node.ref_.clone(), skip)
    };

    if skip {
        trace!(node = ?id, "memo props equal, skipping render");
        return Ok(build.skip_children(id));
    }

    let inner = wrapped_element(memo.inner().clone(), props, ref_);
    Ok(build.reconcile_children(id, &Child::Element(inner)))
}

fn wrapped_element(element_type: ElementType, props: Rc<Props>, ref_: Option<Ref>) -> Element {
    Element {
        element_type,
        key: None,
        props,
        ref_,
    }
}
