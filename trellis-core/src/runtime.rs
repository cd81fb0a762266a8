//! Runtime
//!
//! [`Runtime`] owns everything one UI instance needs: the shadow tree, the
//! host adapter, the scheduler and the roots mounted into host containers.
//! It is single threaded and cheap to clone; clones share the same state.
//!
//! # Entry points
//!
//! - [`Runtime::render`] mounts or updates the tree in a container
//! - [`Runtime::unmount_component_at_node`] tears it down again
//! - [`Runtime::batched_updates`] coalesces every update made inside it into
//!   one pass per root
//! - [`Runtime::run_pending_tasks`] is the checkpoint where deferred effects
//!   run and queued roots are flushed
//!
//! Component code reaches the runtime through a weak handle (state setters,
//! [`ClassHandle`](crate::ClassHandle)), so a dropped runtime simply ignores
//! late updates.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::config::RuntimeConfig;
use crate::devtools::{DevtoolsHelper, DevtoolsHook};
use crate::element::{Child, Props};
use crate::error::ReconcileError;
use crate::host::{HostConfig, HostNodeId};
use crate::scheduler::{self, ExecutionMode, ModeGuard, Scheduler};
use crate::update::{Payload, Update, UpdateTag};
use crate::vnode::{Tag, VNode, VNodeId, VNodeTree};

pub(crate) struct RuntimeInner {
    pub(crate) config: RuntimeConfig,
    pub(crate) host: Rc<dyn HostConfig>,
    pub(crate) tree: RefCell<VNodeTree>,
    pub(crate) sched: RefCell<Scheduler>,
    pub(crate) mode: Cell<ExecutionMode>,
    /// Tree root mounted in each container.
    pub(crate) roots: RefCell<HashMap<HostNodeId, VNodeId>>,
    pub(crate) devtools: RefCell<Option<Rc<dyn DevtoolsHook>>>,
    /// Function component whose body is running.
    pub(crate) current_render: Cell<Option<VNodeId>>,
    /// That component set its own state while rendering.
    pub(crate) render_phase_update: Cell<bool>,
}

pub(crate) fn is_rendering(rt: &RuntimeInner) -> bool {
    rt.mode.get().contains(ExecutionMode::IN_RENDER)
}

/// Append `update` to the queue of `node` and schedule its root.
pub(crate) fn schedule_update(
    rt: &Rc<RuntimeInner>,
    node: VNodeId,
    update: Update,
) -> Result<(), ReconcileError> {
    {
        let mut tree = rt.tree.borrow_mut();
        let Some(target) = tree.get_mut(node) else {
            warn!(?node, "update on an unmounted component ignored");
            return Ok(());
        };
        let tag = target.tag;
        let Some(queue) = target.update_queue.as_mut() else {
            return Err(ReconcileError::MissingUpdateQueue { tag });
        };
        queue.push(update);
    }
    launch_update_from_vnode(rt, node)
}

/// Mark `node` for re-render and schedule the root it is attached to.
pub(crate) fn launch_update_from_vnode(rt: &Rc<RuntimeInner>, node: VNodeId) -> Result<(), ReconcileError> {
    let root = {
        let mut tree = rt.tree.borrow_mut();
        let Some(root) = tree.root_of(node) else {
            warn!(?node, "update on a detached component ignored");
            return Ok(());
        };
        tree.mark_should_update(node);
        if let Some(state) = tree[root].root.as_mut() {
            state.to_update.push(node);
        }
        root
    };
    scheduler::schedule_root(rt, root)
}

/// A UI runtime rendering into one host.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(host: Rc<dyn HostConfig>) -> Self {
        Self::with_config(host, RuntimeConfig::default())
    }

    pub fn with_config(host: Rc<dyn HostConfig>, config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                host,
                tree: RefCell::new(VNodeTree::new()),
                sched: RefCell::new(Scheduler::default()),
                mode: Cell::new(ExecutionMode::empty()),
                roots: RefCell::new(HashMap::new()),
                devtools: RefCell::new(None),
                current_render: Cell::new(None),
                render_phase_update: Cell::new(false),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Render `element` into `container`, reusing the tree already mounted
    /// there.
    pub fn render(&self, element: impl Into<Child>, container: HostNodeId) -> Result<(), ReconcileError> {
        self.schedule_root_element(element.into(), container, None)
    }

    /// Like [`Runtime::render`], running `callback` once the element is
    /// committed.
    pub fn render_with_callback<F>(
        &self,
        element: impl Into<Child>,
        container: HostNodeId,
        callback: F,
    ) -> Result<(), ReconcileError>
    where
        F: FnOnce() + 'static,
    {
        self.schedule_root_element(element.into(), container, Some(Box::new(callback)))
    }

    /// Unmount the tree rendered into `container`. Returns whether there
    /// was one.
    pub fn unmount_component_at_node(&self, container: HostNodeId) -> Result<bool, ReconcileError> {
        let root = self.inner.roots.borrow().get(&container).copied();
        let Some(root) = root else {
            return Ok(false);
        };
        if let Some(state) = self.inner.tree.borrow_mut()[root].root.as_mut() {
            state.unmount = true;
        }
        debug!(?container, "unmounting root");
        let update = Update::new(UpdateTag::Update, Payload::Element(Child::Empty));
        schedule_update(&self.inner, root, update)?;
        Ok(true)
    }

    fn schedule_root_element(
        &self,
        element: Child,
        container: HostNodeId,
        callback: Option<Box<dyn FnOnce()>>,
    ) -> Result<(), ReconcileError> {
        let root = self.root_for(container);
        let update = Update::new(UpdateTag::Update, Payload::Element(element)).with_callback(callback);
        schedule_update(&self.inner, root, update)
    }

    /// The root mounted in `container`, created on first use.
    fn root_for(&self, container: HostNodeId) -> VNodeId {
        let existing = self.inner.roots.borrow().get(&container).copied();
        if let Some(root) = existing {
            // Rendering again cancels a pending unmount.
            if let Some(state) = self.inner.tree.borrow_mut()[root].root.as_mut() {
                state.unmount = false;
            }
            return root;
        }

        let mut node = VNode::new(Tag::TreeRoot, Rc::new(Props::new()), None);
        node.real_node = Some(container);
        node.path = "0".to_string();
        let root = self.inner.tree.borrow_mut().insert(node);
        self.inner.roots.borrow_mut().insert(container, root);
        debug!(?container, ?root, "root created");
        root
    }

    /// Run `f`, deferring every build it triggers until it returns.
    pub fn batched_updates<R>(&self, f: impl FnOnce() -> R) -> Result<R, ReconcileError> {
        let result = {
            let _mode = ModeGuard::enter(&self.inner.mode, ExecutionMode::IN_EVENT);
            f()
        };
        if self.inner.mode.get().is_empty() {
            scheduler::flush_sync(&self.inner)?;
        }
        Ok(result)
    }

    /// Run deferred effects and flush queued roots until nothing is left.
    pub fn run_pending_tasks(&self) -> Result<(), ReconcileError> {
        if !self.inner.mode.get().is_empty() {
            return Ok(());
        }
        let limit = self.inner.config.looping_update_limit;
        for _ in 0..limit {
            if !scheduler::has_pending_work(&self.inner) {
                return Ok(());
            }
            scheduler::flush_passive_effects(&self.inner)?;
            scheduler::flush_sync(&self.inner)?;
        }
        if scheduler::has_pending_work(&self.inner) {
            return Err(ReconcileError::LoopingUpdateLimit { limit });
        }
        Ok(())
    }

    /// [`Runtime::batched_updates`] followed by [`Runtime::run_pending_tasks`].
    pub fn act<R>(&self, f: impl FnOnce() -> R) -> Result<R, ReconcileError> {
        let result = self.batched_updates(f)?;
        self.run_pending_tasks()?;
        Ok(result)
    }

    /// Whether effects or builds are still queued.
    pub fn has_pending_work(&self) -> bool {
        scheduler::has_pending_work(&self.inner)
    }

    /// Inspection handle over this runtime's trees.
    pub fn devtools(&self) -> DevtoolsHelper {
        DevtoolsHelper::new(&self.inner)
    }

    /// Hand `hook` a [`DevtoolsHelper`] and notify it of every commit.
    /// Ignored unless [`RuntimeConfig::devtools`] is set.
    pub fn install_devtools_hook(&self, hook: Rc<dyn DevtoolsHook>) -> bool {
        if !self.inner.config.devtools {
            debug!("devtools disabled, hook not installed");
            return false;
        }
        hook.init(DevtoolsHelper::new(&self.inner));
        *self.inner.devtools.borrow_mut() = Some(hook);
        true
    }
}
