//! Thenables
//!
//! A component that is not ready to render yet throws a [`Promise`]. The
//! runtime never blocks on it: it records the promise on the nearest Suspense
//! boundary and registers a reaction that re-enters the build loop once the
//! promise settles.
//!
//! Everything here is single-threaded. Reactions registered on an already
//! settled promise run immediately.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::value::Value;

/// Counter for generating unique promise IDs.
static PROMISE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Settlement state of a promise.
#[derive(Debug, Clone)]
pub enum PromiseState {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

type Reaction = Box<dyn FnOnce(&PromiseState)>;

struct PromiseInner {
    id: u64,
    state: RefCell<PromiseState>,
    reactions: RefCell<Vec<Reaction>>,
}

/// A shared, single-assignment result slot.
#[derive(Clone)]
pub struct Promise {
    inner: Rc<PromiseInner>,
}

impl Promise {
    /// Create a pending promise.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(PromiseInner {
                id: PROMISE_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
                state: RefCell::new(PromiseState::Pending),
                reactions: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Create a promise that is already fulfilled.
    pub fn resolved(value: Value) -> Self {
        let promise = Self::new();
        promise.resolve(value);
        promise
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn state(&self) -> PromiseState {
        self.inner.state.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.inner.state.borrow(), PromiseState::Pending)
    }

    /// Fulfil the promise. Settling twice is a no-op.
    pub fn resolve(&self, value: Value) {
        self.settle(PromiseState::Fulfilled(value));
    }

    /// Reject the promise. Settling twice is a no-op.
    pub fn reject(&self, reason: Value) {
        self.settle(PromiseState::Rejected(reason));
    }

    /// Register a reaction to settlement.
    pub fn then<F>(&self, reaction: F)
    where
        F: FnOnce(&PromiseState) + 'static,
    {
        if self.is_pending() {
            self.inner.reactions.borrow_mut().push(Box::new(reaction));
        } else {
            let state = self.state();
            reaction(&state);
        }
    }

    fn settle(&self, next: PromiseState) {
        {
            let mut state = self.inner.state.borrow_mut();
            if !matches!(*state, PromiseState::Pending) {
                return;
            }
            *state = next;
        }

        // Reactions may register further reactions; those run immediately.
        let reactions = std::mem::take(&mut *self.inner.reactions.borrow_mut());
        let state = self.state();
        for reaction in reactions {
            reaction(&state);
        }
    }
}

impl Default for Promise {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Promise {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("id", &self.inner.id)
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn reactions_run_on_resolve() {
        let promise = Promise::new();
        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        promise.then(move |state| {
            assert!(matches!(state, PromiseState::Fulfilled(_)));
            hits_clone.set(hits_clone.get() + 1);
        });

        assert_eq!(hits.get(), 0);
        promise.resolve(Value::from(1));
        assert_eq!(hits.get(), 1);

        // Second settlement is ignored
        promise.reject(Value::from("late"));
        assert_eq!(hits.get(), 1);
        assert!(matches!(promise.state(), PromiseState::Fulfilled(_)));
    }

    #[test]
    fn then_on_settled_promise_runs_immediately() {
        let promise = Promise::resolved(Value::from(7));
        let seen = Rc::new(Cell::new(false));
        let seen_clone = seen.clone();
        promise.then(move |_| seen_clone.set(true));
        assert!(seen.get());
    }

    #[test]
    fn clones_share_identity() {
        let a = Promise::new();
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, Promise::new());
    }
}
