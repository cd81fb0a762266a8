//! Shadow Tree Nodes
//!
//! Every rendered component instance and host node has a [`VNode`]. Nodes
//! live in a [`VNodeTree`] arena and refer to each other by [`VNodeId`]:
//!
//! - `child` points at the first child, `next` at the next sibling, so the
//!   children of a node form a singly linked list
//! - `parent` is a back reference, rewritten whenever a node is (re)linked
//!
//! Ids are generational, so an id held by a stale closure (a state setter of
//! an unmounted component, a promise reaction) simply fails to resolve.
//!
//! # Bookkeeping
//!
//! `flags` and `dirty_nodes` describe the commit work of the current pass.
//! `should_update` marks a node that must re-render, `child_should_update`
//! marks the ancestors of such nodes so the work loop knows where to descend.

mod flags;
mod tree;

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use smallvec::SmallVec;

pub use flags::Flags;
pub(crate) use tree::VNodeTree;

use crate::component::ComponentRef;
use crate::element::{Child, ContextId, ElementType, Key, LazyType, Props, Ref};
use crate::hooks::Hook;
use crate::host::{HostNodeId, PropChange};
use crate::thenable::Promise;
use crate::update::{State, UpdateQueue};
use crate::value::Value;

new_key_type! {
    /// Handle to a node in the shadow tree.
    pub struct VNodeId;
}

/// The kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    TreeRoot,
    FunctionComponent,
    ClassComponent,
    DomComponent,
    DomText,
    Fragment,
    ContextProvider,
    ContextConsumer,
    ForwardRef,
    Memo,
    Lazy,
    Suspense,
    DomPortal,
}

impl Tag {
    pub(crate) fn of(element_type: &ElementType) -> Tag {
        match element_type {
            ElementType::Host(_) => Tag::DomComponent,
            ElementType::Function(_) => Tag::FunctionComponent,
            ElementType::Class(_) => Tag::ClassComponent,
            ElementType::Fragment => Tag::Fragment,
            ElementType::Provider(_) => Tag::ContextProvider,
            ElementType::Consumer(_) => Tag::ContextConsumer,
            ElementType::ForwardRef(_) => Tag::ForwardRef,
            ElementType::Memo(_) => Tag::Memo,
            ElementType::Lazy(_) => Tag::Lazy,
            ElementType::Suspense => Tag::Suspense,
        }
    }

    /// Whether the node owns a host node of its own.
    pub fn is_host(self) -> bool {
        matches!(self, Tag::DomComponent | Tag::DomText)
    }

    /// Whether hooks can be called while rendering this node.
    pub fn has_hooks(self) -> bool {
        matches!(self, Tag::FunctionComponent | Tag::ForwardRef)
    }
}

/// What a Suspense boundary currently displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SuspenseChildStatus {
    #[default]
    Init,
    ShowingContent,
    ShowingFallback,
}

#[derive(Debug, Default)]
pub(crate) struct SuspenseState {
    /// Promises thrown by descendants that have not settled yet.
    pub(crate) promises: Vec<Promise>,
    /// A descendant suspended during the current pass.
    pub(crate) did_capture: bool,
    pub(crate) child_status: SuspenseChildStatus,
    pub(crate) old_child_status: SuspenseChildStatus,
}

/// Instance and state of a class component.
pub(crate) struct ClassState {
    pub(crate) instance: ComponentRef,
    pub(crate) state: Rc<State>,
    pub(crate) committed_state: Rc<State>,
    pub(crate) snapshot: Value,
    /// Errors captured this pass, reported through `component_did_catch`.
    pub(crate) caught: Vec<Value>,
}

/// Bookkeeping only the tree root carries.
#[derive(Default)]
pub(crate) struct RootState {
    pub(crate) element: Child,
    /// Nodes with pending updates, consumed at the start of a pass.
    pub(crate) to_update: Vec<VNodeId>,
    /// Deletions made by a pass that never committed.
    pub(crate) orphans: Vec<VNodeId>,
    /// Drop the root once its empty tree is committed.
    pub(crate) unmount: bool,
}

/// A node of the shadow tree.
pub struct VNode {
    pub(crate) tag: Tag,
    pub(crate) key: Option<Key>,
    pub(crate) element_type: Option<ElementType>,
    /// The lazy wrapper a resolved lazy node was created from.
    pub(crate) lazy_type: Option<LazyType>,

    pub(crate) parent: Option<VNodeId>,
    pub(crate) child: Option<VNodeId>,
    pub(crate) next: Option<VNodeId>,
    pub(crate) c_index: usize,
    pub(crate) e_index: usize,
    pub(crate) path: String,

    pub(crate) props: Rc<Props>,
    pub(crate) old_props: Option<Rc<Props>>,
    pub(crate) text: Rc<str>,
    pub(crate) hooks: Vec<Hook>,
    pub(crate) class: Option<ClassState>,
    pub(crate) update_queue: Option<UpdateQueue>,
    pub(crate) ref_: Option<Ref>,
    pub(crate) old_ref: Option<Ref>,

    pub(crate) flags: Flags,
    pub(crate) dirty_nodes: Vec<VNodeId>,
    pub(crate) is_created: bool,
    pub(crate) should_update: bool,
    pub(crate) child_should_update: bool,
    /// Bubbled during the current pass.
    pub(crate) pass_done: bool,

    pub(crate) suspense: Option<SuspenseState>,
    /// Primary content of a Suspense boundary hidden behind its fallback.
    pub(crate) hidden: bool,
    pub(crate) root: Option<RootState>,

    /// Host node bound to this node, or the container of a root or portal.
    pub(crate) real_node: Option<HostNodeId>,
    pub(crate) context_deps: SmallVec<[ContextId; 2]>,
    pub(crate) callbacks: Vec<Box<dyn FnOnce()>>,
    pub(crate) change_list: Vec<PropChange>,
    pub(crate) cleared_children: Vec<VNodeId>,
}

impl VNode {
    pub(crate) fn new(tag: Tag, props: Rc<Props>, key: Option<Key>) -> Self {
        Self {
            tag,
            key,
            element_type: None,
            lazy_type: None,
            parent: None,
            child: None,
            next: None,
            c_index: 0,
            e_index: 0,
            path: String::new(),
            props,
            old_props: None,
            text: Rc::from(""),
            hooks: Vec::new(),
            class: None,
            update_queue: match tag {
                Tag::TreeRoot | Tag::ClassComponent => Some(UpdateQueue::default()),
                _ => None,
            },
            ref_: None,
            old_ref: None,
            flags: Flags::empty(),
            dirty_nodes: Vec::new(),
            is_created: true,
            should_update: false,
            child_should_update: false,
            pass_done: false,
            suspense: (tag == Tag::Suspense).then(SuspenseState::default),
            hidden: false,
            root: (tag == Tag::TreeRoot).then(RootState::default),
            real_node: None,
            context_deps: SmallVec::new(),
            callbacks: Vec::new(),
            change_list: Vec::new(),
            cleared_children: Vec::new(),
        }
    }

    pub(crate) fn text_node(text: Rc<str>) -> Self {
        let mut node = Self::new(Tag::DomText, Rc::new(Props::new()), None);
        node.text = text;
        node
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn props(&self) -> &Rc<Props> {
        &self.props
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Display name for diagnostics.
    pub fn name(&self) -> String {
        match (&self.element_type, self.tag) {
            (_, Tag::DomText) => "#text".to_string(),
            (_, Tag::TreeRoot) => "Root".to_string(),
            (_, Tag::DomPortal) => "Portal".to_string(),
            (Some(ty), _) => ty.name(),
            (None, tag) => format!("{tag:?}"),
        }
    }

    /// Whether this node's committed props differ from the ones it holds now.
    pub(crate) fn has_new_props(&self) -> bool {
        match &self.old_props {
            Some(old) => !Rc::ptr_eq(old, &self.props),
            None => true,
        }
    }
}
