//! Class components.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::builder::Build;
use crate::component::ClassHandle;
use crate::element::{Child, ElementType};
use crate::error::Throw;
use crate::update::{process_updates, State};
use crate::value::Value;
use crate::vnode::{ClassState, Flags, VNodeId};

pub(super) fn render_class(build: &mut Build<'_>, id: VNodeId) -> Result<Option<VNodeId>, Throw> {
    ensure_instance(build, id);

    let (instance, props, base, queue, is_created, old_props) = {
        let mut tree = build.rt.tree.borrow_mut();
        let node = &mut tree[id];
        let queue = node.update_queue.as_mut().map(std::mem::take).unwrap_or_default();
        let Some(class) = node.class.as_ref() else {
            return Ok(None);
        };
        (
            class.instance.clone(),
            node.props.clone(),
            class.state.clone(),
            queue,
            node.is_created,
            node.old_props.clone(),
        )
    };

    let processed = process_updates(&base, &props, queue);
    let mut next = processed.state;
    let caught = processed.errors;
    {
        let component = instance.borrow();
        if let Some(partial) = component.derive_state_from_props(&props, &next) {
            next.extend(partial);
        }
        for error in &caught {
            if let Some(partial) = component.derive_state_from_error(error) {
                next.extend(partial);
            }
        }
    }

    let state_changed = processed.force || !caught.is_empty() || !same_state(&base, &next);
    let props_changed = old_props.as_ref().map_or(true, |old| !Rc::ptr_eq(old, &props));
    let should_render = is_created
        || processed.force
        || !caught.is_empty()
        || ((state_changed || props_changed) && instance.borrow().should_component_update(&props, &next));

    let state = Rc::new(next);
    {
        let mut tree = build.rt.tree.borrow_mut();
        let node = &mut tree[id];
        node.callbacks.extend(processed.callbacks);
        if !node.callbacks.is_empty() {
            node.flags |= Flags::CALLBACK;
        }
        if let Some(class) = node.class.as_mut() {
            class.state = state.clone();
            if !caught.is_empty() {
                class.caught.extend(caught);
                node.flags |= Flags::CALLBACK;
            }
        }
        if should_render {
            node.flags |= Flags::UPDATE;
            if !is_created {
                node.flags |= Flags::SNAPSHOT;
            }
        }
    }

    if !should_render {
        trace!(node = ?id, "should_component_update declined");
        return Ok(build.skip_children(id));
    }

    let children: Child = instance.borrow().render(&props, &state)?;
    Ok(build.reconcile_children(id, &children))
}

/// Construct the instance of a node rendered for the first time.
fn ensure_instance(build: &mut Build<'_>, id: VNodeId) {
    let (class_type, props) = {
        let tree = build.rt.tree.borrow();
        let node = &tree[id];
        if node.class.is_some() {
            return;
        }
        let Some(ElementType::Class(class_type)) = node.element_type.clone() else {
            return;
        };
        (class_type, node.props.clone())
    };

    let handle = ClassHandle {
        node: id,
        runtime: Rc::downgrade(build.rt),
    };
    let instance = class_type.construct(&props, handle);
    let state = Rc::new(instance.initial_state(&props));
    trace!(node = ?id, class = class_type.name(), "class instance constructed");

    let mut tree = build.rt.tree.borrow_mut();
    tree[id].class = Some(ClassState {
        instance: Rc::new(RefCell::new(instance)),
        committed_state: state.clone(),
        state,
        snapshot: Value::Undefined,
        caught: Vec::new(),
    });
}

fn same_state(a: &State, b: &State) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b.iter())
            .all(|((ka, va), (kb, vb))| ka == kb && va.is_same(vb))
}
