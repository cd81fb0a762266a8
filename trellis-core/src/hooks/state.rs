//! State and Reducer Hooks
//!
//! Both hooks share one slot shape: a [`HookQueue`] holding the current value,
//! the reducer (if any) and the actions dispatched since the last render.
//! The queue is shared between the slot and every [`Dispatch`] handed out, so
//! dispatching never needs the shadow tree.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::ReconcileError;
use crate::runtime::{self, RuntimeInner};
use crate::value::Value;
use crate::vnode::VNodeId;

/// A reducer: `(state, action) -> state`.
pub type Reducer = Rc<dyn Fn(&Value, &Value) -> Value>;

/// A state transition requested through a [`Dispatch`].
#[derive(Clone)]
pub enum Action {
    /// Replace the value, or hand the action to the reducer.
    Set(Value),
    /// Compute the next value from the latest one.
    Update(Rc<dyn Fn(&Value) -> Value>),
}

struct Pending {
    action: Action,
    /// Value computed at dispatch time and the reducer it was computed with.
    eager: Option<(Value, Option<Reducer>)>,
}

pub(crate) struct HookQueue {
    state: RefCell<Value>,
    reducer: RefCell<Option<Reducer>>,
    pending: RefCell<Vec<Pending>>,
}

fn same_reducer(a: &Option<Reducer>, b: &Option<Reducer>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

fn apply(reducer: Option<&Reducer>, state: &Value, action: &Action) -> Value {
    match action {
        Action::Update(update) => update(state),
        Action::Set(value) => match reducer {
            Some(reducer) => reducer(state, value),
            None => value.clone(),
        },
    }
}

impl HookQueue {
    pub(crate) fn new(initial: Value, reducer: Option<Reducer>) -> Self {
        Self {
            state: RefCell::new(initial),
            reducer: RefCell::new(reducer),
            pending: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn state(&self) -> Value {
        self.state.borrow().clone()
    }

    pub(crate) fn set_reducer(&self, reducer: Option<Reducer>) {
        *self.reducer.borrow_mut() = reducer;
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.borrow().is_empty()
    }

    /// Fold pending actions into the state, left to right.
    pub(crate) fn process(&self) {
        let pending = std::mem::take(&mut *self.pending.borrow_mut());
        if pending.is_empty() {
            return;
        }
        let reducer = self.reducer.borrow().clone();
        let mut state = self.state();
        for Pending { action, eager } in pending {
            state = match eager {
                Some((value, with)) if same_reducer(&with, &reducer) => value,
                _ => apply(reducer.as_ref(), &state, &action),
            };
        }
        *self.state.borrow_mut() = state;
    }
}

/// Setter returned by `use_state` and `use_reducer`.
#[derive(Clone)]
pub struct Dispatch {
    pub(crate) queue: Rc<HookQueue>,
    pub(crate) node: VNodeId,
    pub(crate) runtime: Weak<RuntimeInner>,
}

impl Dispatch {
    /// Set the value (`use_state`) or dispatch an action (`use_reducer`).
    pub fn set(&self, value: impl Into<Value>) -> Result<(), ReconcileError> {
        self.dispatch(Action::Set(value.into()))
    }

    /// Compute the next value from the latest one.
    pub fn update<F>(&self, update: F) -> Result<(), ReconcileError>
    where
        F: Fn(&Value) -> Value + 'static,
    {
        self.dispatch(Action::Update(Rc::new(update)))
    }

    pub fn dispatch(&self, action: Action) -> Result<(), ReconcileError> {
        let Some(rt) = self.runtime.upgrade() else {
            return Ok(());
        };

        // Set from inside the component's own body: re-run the body before
        // returning instead of scheduling a new pass.
        if rt.current_render.get() == Some(self.node) {
            self.queue.pending.borrow_mut().push(Pending {
                action,
                eager: None,
            });
            rt.render_phase_update.set(true);
            return Ok(());
        }

        let eager = if !self.queue.has_pending() && !runtime::is_rendering(&rt) {
            let current = self.queue.state();
            let reducer = self.queue.reducer.borrow().clone();
            let next = apply(reducer.as_ref(), &current, &action);
            if next.is_same(&current) {
                tracing::trace!(node = ?self.node, "state unchanged, skipping update");
                return Ok(());
            }
            Some((next, reducer))
        } else {
            None
        };

        self.queue.pending.borrow_mut().push(Pending { action, eager });
        runtime::launch_update_from_vnode(&rt, self.node)
    }
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch").field("node", &self.node).finish()
    }
}

pub(crate) struct StateHook {
    pub(crate) queue: Rc<HookQueue>,
    pub(crate) dispatch: Dispatch,
}
