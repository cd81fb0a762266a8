//! Trellis Core
//!
//! This crate provides the reconciliation runtime for the Trellis
//! declarative UI framework. It implements:
//!
//! - A persistent shadow tree of component instances and host nodes
//! - Keyed child reconciliation with minimal host moves
//! - Function components with hooks, and class components with lifecycles
//! - Error boundaries, Suspense and lazy components
//! - Context propagation, portals, memoized and forward-ref components
//!
//! The host tree is reached only through the [`HostConfig`] trait. The
//! in-memory [`MemoryHost`] is a complete implementation used by the tests.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `element`: The element descriptions application code builds
//! - `vnode`: The shadow tree arena
//! - `builder` and `render`: The capture/bubble walk of a build pass
//! - `diff`: Child list reconciliation
//! - `hooks`: Slot storage for function components
//! - `submit`: Applying a completed pass to the host
//! - `scheduler`: When passes run, and the deferred effect queue
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use trellis_core::{h, Child, FunctionType, MemoryHost, Runtime};
//!
//! let host = Rc::new(MemoryHost::new());
//! let container = host.create_container();
//! let runtime = Runtime::new(host.clone());
//!
//! let counter = FunctionType::new("Counter", |cx, _props| {
//!     let (count, _set_count) = cx.use_state(1)?;
//!     Ok(Child::from(h("b").child(count.to_string())))
//! });
//!
//! runtime.render(counter.element(), container).unwrap();
//! assert_eq!(host.markup(container), "<b>1</b>");
//! ```

mod builder;
mod component;
mod config;
mod diff;
mod element;
mod error;
mod error_handler;
mod render;
mod runtime;
mod scheduler;
mod submit;
mod thenable;
mod update;
mod value;

pub mod devtools;
pub mod hooks;
pub mod host;
pub mod vnode;

pub use component::{ClassHandle, Component, ComponentRef};
pub use config::RuntimeConfig;
pub use devtools::{DevtoolsHelper, DevtoolsHook, HookSnapshot, VNodeSnapshot};
pub use element::{
    create_context, create_portal, create_ref, fragment, h, suspense, Child, ClassType, Context,
    ContextId, Element, ElementBuilder, ElementType, ForwardRefType, FunctionType, Key, LazyType,
    MemoType, Portal, Props, Ref, RefObject, RenderResult,
};
pub use error::{ReconcileError, Throw};
pub use hooks::{Action, Destroy, Dispatch, EffectResult, Reducer, RenderCx};
pub use host::{HostConfig, HostNodeId, HostOp, MemoryHost, PropChange};
pub use runtime::Runtime;
pub use scheduler::ExecutionMode;
pub use thenable::{Promise, PromiseState};
pub use update::{state, State};
pub use value::{deps_equal, Value};
pub use vnode::{Flags, SuspenseChildStatus, Tag, VNodeId};
