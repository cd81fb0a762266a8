//! Update Scheduler
//!
//! There is no priority queue and no preemption. What the scheduler decides
//! is *when* a root that received an update gets rebuilt:
//!
//! 1. Outside any runtime activity the root is rebuilt before the triggering
//!    call returns.
//! 2. Inside a batch, a build or an effect flush, the root is queued and the
//!    outermost activity flushes the queue when it exits.
//!
//! The execution mode is a small flag set saved and restored by
//! [`ModeGuard`], so nested activities always put back what they found.
//!
//! # Deferred effects
//!
//! Passive effects committed by a pass are queued here and run by
//! [`flush_passive_effects`]: every queued cleanup first, then every queued
//! setup. A new pass flushes the previous pass's effects before it starts.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use bitflags::bitflags;
use tracing::{debug, error, trace};

use crate::builder::{self, BuildStatus};
use crate::error::ReconcileError;
use crate::error_handler;
use crate::hooks::{DueEffect, EffectSlot};
use crate::runtime::RuntimeInner;
use crate::submit;
use crate::vnode::VNodeId;

bitflags! {
    /// What the runtime is doing right now.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ExecutionMode: u8 {
        /// Running deferred effects.
        const BY_ASYNC = 1 << 0;
        /// Flushing the render queue.
        const BY_SYNC = 1 << 1;
        /// Inside a build pass or its commit.
        const IN_RENDER = 1 << 2;
        /// Inside `batched_updates`.
        const IN_EVENT = 1 << 3;
    }
}

/// Adds mode bits for its lifetime.
pub(crate) struct ModeGuard<'a> {
    cell: &'a Cell<ExecutionMode>,
    prev: ExecutionMode,
}

impl<'a> ModeGuard<'a> {
    pub(crate) fn enter(cell: &'a Cell<ExecutionMode>, mode: ExecutionMode) -> Self {
        let prev = cell.get();
        cell.set(prev | mode);
        Self { cell, prev }
    }
}

impl Drop for ModeGuard<'_> {
    fn drop(&mut self) {
        self.cell.set(self.prev);
    }
}

#[derive(Default)]
pub(crate) struct Scheduler {
    /// Roots waiting for a build, oldest first.
    pub(crate) render_queue: VecDeque<VNodeId>,
    pub(crate) passive_destroys: Vec<Rc<EffectSlot>>,
    pub(crate) passive_creates: Vec<(VNodeId, DueEffect)>,
}

impl Scheduler {
    pub(crate) fn has_pending_work(&self) -> bool {
        !self.render_queue.is_empty()
            || !self.passive_destroys.is_empty()
            || !self.passive_creates.is_empty()
    }

    fn has_passive_effects(&self) -> bool {
        !self.passive_destroys.is_empty() || !self.passive_creates.is_empty()
    }
}

/// Queue `root` for a build, flushing right away when nothing else is running.
pub(crate) fn schedule_root(rt: &Rc<RuntimeInner>, root: VNodeId) -> Result<(), ReconcileError> {
    {
        let mut sched = rt.sched.borrow_mut();
        if !sched.render_queue.contains(&root) {
            sched.render_queue.push_back(root);
        }
    }
    if rt.mode.get().is_empty() {
        flush_sync(rt)
    } else {
        trace!(?root, mode = ?rt.mode.get(), "root queued");
        Ok(())
    }
}

/// Build and commit every queued root.
///
/// A root rebuilt more than `looping_update_limit` times in a row, with no
/// other root in between, fails with [`ReconcileError::LoopingUpdateLimit`].
pub(crate) fn flush_sync(rt: &Rc<RuntimeInner>) -> Result<(), ReconcileError> {
    if rt.mode.get().contains(ExecutionMode::BY_SYNC) {
        return Ok(());
    }
    let _mode = ModeGuard::enter(&rt.mode, ExecutionMode::BY_SYNC);
    let limit = rt.config.looping_update_limit;
    let mut last: Option<VNodeId> = None;
    let mut count = 0usize;

    loop {
        let next = rt.sched.borrow_mut().render_queue.pop_front();
        let Some(root) = next else { break };

        if last == Some(root) {
            count += 1;
        } else {
            last = Some(root);
            count = 1;
        }
        if count > limit {
            rt.sched.borrow_mut().render_queue.clear();
            if let Some(state) = rt.tree.borrow_mut().get_mut(root).and_then(|n| n.root.as_mut()) {
                state.to_update.clear();
            }
            error!(?root, limit, "update loop detected");
            return Err(ReconcileError::LoopingUpdateLimit { limit });
        }

        render_from_root(rt, root)?;
    }
    Ok(())
}

/// One build pass over `root`, committed if it completes.
pub(crate) fn render_from_root(rt: &Rc<RuntimeInner>, root: VNodeId) -> Result<(), ReconcileError> {
    let passive = flush_passive_effects(rt);

    let status = {
        let _mode = ModeGuard::enter(&rt.mode, ExecutionMode::IN_RENDER);
        match builder::build_root(rt, root) {
            BuildStatus::Completed(build) => submit::commit_root(rt, root, build),
            BuildStatus::Incomplete => Ok(()),
            BuildStatus::Errored(err) | BuildStatus::FatalErrored(err) => Err(err),
        }
    };
    release_unmounted_root(rt, root);

    passive?;
    status
}

/// Forget a root whose unmount has been committed.
fn release_unmounted_root(rt: &Rc<RuntimeInner>, root: VNodeId) {
    let mut tree = rt.tree.borrow_mut();
    let Some(node) = tree.get(root) else { return };
    let done = node.child.is_none() && node.root.as_ref().is_some_and(|s| s.unmount);
    if !done {
        return;
    }
    let container = node.real_node;
    tree.remove_subtree(root);
    drop(tree);
    if let Some(container) = container {
        rt.roots.borrow_mut().remove(&container);
    }
    debug!(?root, "root unmounted");
}

/// Run queued passive cleanups, then queued passive setups.
pub(crate) fn flush_passive_effects(rt: &Rc<RuntimeInner>) -> Result<(), ReconcileError> {
    let (destroys, creates) = {
        let mut sched = rt.sched.borrow_mut();
        if !sched.has_passive_effects() {
            return Ok(());
        }
        (
            std::mem::take(&mut sched.passive_destroys),
            std::mem::take(&mut sched.passive_creates),
        )
    };
    trace!(destroys = destroys.len(), creates = creates.len(), "flushing passive effects");

    let mut uncaught = None;
    {
        let _mode = ModeGuard::enter(&rt.mode, ExecutionMode::BY_ASYNC);
        for slot in destroys {
            slot.run_destroy();
        }
        for (node, due) in creates {
            if let Err(value) = due.slot.run_create(due.create) {
                if let Some(value) = error_handler::capture_commit_error(rt, node, value) {
                    uncaught.get_or_insert(value);
                }
            }
        }
    }

    if rt.mode.get().is_empty() {
        flush_sync(rt)?;
    }
    match uncaught {
        Some(value) => Err(ReconcileError::Uncaught(value)),
        None => Ok(()),
    }
}

pub(crate) fn has_pending_work(rt: &RuntimeInner) -> bool {
    rt.sched.borrow().has_pending_work()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_guard_restores_previous_bits() {
        let cell = Cell::new(ExecutionMode::IN_EVENT);
        {
            let _outer = ModeGuard::enter(&cell, ExecutionMode::BY_SYNC);
            {
                let _inner = ModeGuard::enter(&cell, ExecutionMode::IN_RENDER);
                assert_eq!(
                    cell.get(),
                    ExecutionMode::IN_EVENT | ExecutionMode::BY_SYNC | ExecutionMode::IN_RENDER
                );
            }
            assert_eq!(cell.get(), ExecutionMode::IN_EVENT | ExecutionMode::BY_SYNC);
        }
        assert_eq!(cell.get(), ExecutionMode::IN_EVENT);
    }

    #[test]
    fn empty_scheduler_has_no_work() {
        assert!(!Scheduler::default().has_pending_work());
    }
}
