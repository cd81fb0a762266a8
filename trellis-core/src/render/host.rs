//! Host elements and text.

use tracing::trace;

use crate::builder::Build;
use crate::element::{Child, ElementType};
use crate::error::Throw;
use crate::vnode::{Flags, Tag, VNodeId};

fn host_tag(element_type: Option<&ElementType>) -> &str {
    match element_type {
        Some(ElementType::Host(tag)) => tag,
        _ => "",
    }
}

pub(super) fn render_host(build: &mut Build<'_>, id: VNodeId) -> Result<Option<VNodeId>, Throw> {
    let (props, text_content) = {
        let tree = build.rt.tree.borrow();
        let node = &tree[id];
        let tag = host_tag(node.element_type.as_ref());
        (node.props.clone(), build.rt.host.should_set_text_content(tag, &node.props))
    };
    // Text content is written by the host as a prop, not as child nodes.
    if text_content {
        return Ok(build.reconcile_children(id, &Child::Empty));
    }
    Ok(build.reconcile_children(id, props.children()))
}

pub(super) fn bubble_host(build: &mut Build<'_>, id: VNodeId) {
    let host = build.rt.host.clone();
    let mut tree = build.rt.tree.borrow_mut();

    if tree[id].is_created {
        let tag = host_tag(tree[id].element_type.as_ref()).to_string();
        let real = host.create_element(&tag, &tree[id].props);
        for child in tree.children(id) {
            for node in tree.top_host_nodes(child) {
                host.append_child(real, node);
            }
        }
        trace!(node = ?id, tag, ?real, "host element created");
        // Rendered again before its first commit: the earlier instance is dead.
        if let Some(stale) = tree[id].real_node.replace(real) {
            host.discard_instance(stale);
        }
        return;
    }

    let node = &tree[id];
    if !node.has_new_props() {
        return;
    }
    let Some(old) = node.old_props.clone() else { return };
    let tag = host_tag(node.element_type.as_ref()).to_string();
    let changes = host.diff_props(&tag, &old, &node.props);
    let lost_text =
        host.should_set_text_content(&tag, &old) && !host.should_set_text_content(&tag, &node.props);

    let node = &mut tree[id];
    if lost_text {
        node.flags |= Flags::RESET_TEXT;
    }
    if !changes.is_empty() {
        node.change_list = changes;
        node.flags |= Flags::UPDATE;
    }
}

pub(super) fn bubble_text(build: &mut Build<'_>, id: VNodeId) {
    let mut tree = build.rt.tree.borrow_mut();
    let node = &mut tree[id];
    if node.tag == Tag::DomText && node.is_created {
        let real = build.rt.host.create_text(&node.text);
        if let Some(stale) = node.real_node.replace(real) {
            build.rt.host.discard_instance(stale);
        }
    }
}
