//! Errors and Thrown Values
//!
//! Two layers of failure flow through the runtime:
//!
//! - [`ReconcileError`] is what public entry points return. It covers
//!   programmer errors (hook order violations, runaway update loops) and
//!   root-fatal errors that no boundary caught.
//! - [`Throw`] is what render functions unwind with. A thrown promise means
//!   "not ready yet" and is routed to a Suspense boundary, a thrown value is
//!   routed to an error boundary, and a fatal error stops the pass.

use thiserror::Error;

use crate::thenable::Promise;
use crate::value::Value;
use crate::vnode::Tag;

/// Errors surfaced by the reconciler.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A function component called fewer hooks than on its previous render.
    #[error("Hooks are less than expected, please check whether the hook is written in the condition.")]
    HooksLessThanExpected,

    /// A hook slot was reused by a hook of a different kind.
    #[error("hook {slot} was {expected} on the previous render but {found} now")]
    HookKindMismatch {
        slot: usize,
        expected: &'static str,
        found: &'static str,
    },

    /// A root kept re-rendering itself from commit-phase callbacks.
    #[error(
        "The number of updates exceeds the upper limit {limit}. \
         A component maybe repeatedly invokes setState on componentWillUpdate or componentDidUpdate."
    )]
    LoopingUpdateLimit { limit: usize },

    /// A state setter called during render kept requesting re-renders.
    #[error("too many re-renders of {component}: the render-phase update limit is {limit}")]
    NestedRenderLimit { component: String, limit: usize },

    /// An update was enqueued on a node kind that cannot hold one.
    #[error("{tag:?} node has no update queue")]
    MissingUpdateQueue { tag: Tag },

    /// A component suspended with no Suspense boundary above it.
    #[error("{component} suspended while rendering, but no Suspense boundary was found")]
    UnhandledSuspension { component: String },

    /// An error reached the root without meeting an error boundary.
    #[error("uncaught error: {0}")]
    Uncaught(Value),

    #[error("invalid runtime config: {0}")]
    Config(#[from] serde_json::Error),
}

/// A value unwinding out of a render function.
#[derive(Debug)]
pub enum Throw {
    /// Not ready: retry once the promise settles.
    Suspend(Promise),
    /// An application error, caught by the nearest error boundary.
    Error(Value),
    /// A reconciler invariant was violated.
    Fatal(ReconcileError),
}

impl Throw {
    /// Throw an application error.
    pub fn error(value: impl Into<Value>) -> Self {
        Throw::Error(value.into())
    }
}

impl From<ReconcileError> for Throw {
    fn from(err: ReconcileError) -> Self {
        Throw::Fatal(err)
    }
}

impl From<Promise> for Throw {
    fn from(promise: Promise) -> Self {
        Throw::Suspend(promise)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
