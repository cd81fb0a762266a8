//! Class Components
//!
//! A class component is a [`Component`] trait object created by a
//! [`ClassType`](crate::ClassType) constructor. The runtime owns the instance
//! and its [`State`]; the instance talks back to the runtime through the
//! [`ClassHandle`] it was constructed with.
//!
//! Lifecycle methods that can fail return `Result<(), Value>`. An error from
//! a commit-phase lifecycle is routed to the nearest error boundary above the
//! component, just like an error thrown while rendering.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::element::{Props, RenderResult};
use crate::error::ReconcileError;
use crate::runtime::{self, RuntimeInner};
use crate::update::{Payload, State, StateProducer, Update, UpdateTag};
use crate::value::Value;
use crate::vnode::VNodeId;

/// Shared handle to a mounted class instance. Object refs attached to a
/// class element receive one of these wrapped in a [`Value`].
pub type ComponentRef = Rc<RefCell<Box<dyn Component>>>;

/// Behaviour of a class component.
pub trait Component {
    /// State before the first render.
    fn initial_state(&self, _props: &Props) -> State {
        State::new()
    }

    fn render(&self, props: &Props, state: &State) -> RenderResult;

    /// Partial state derived from props, applied before every render.
    fn derive_state_from_props(&self, _props: &Props, _state: &State) -> Option<State> {
        None
    }

    fn should_component_update(&self, _next_props: &Props, _next_state: &State) -> bool {
        true
    }

    /// Read host state before an update is applied. The result is passed to
    /// [`Component::component_did_update`].
    fn get_snapshot_before_update(&mut self, _prev_props: &Props, _prev_state: &State) -> Value {
        Value::Undefined
    }

    fn component_did_mount(&mut self) -> Result<(), Value> {
        Ok(())
    }

    fn component_did_update(
        &mut self,
        _prev_props: &Props,
        _prev_state: &State,
        _snapshot: &Value,
    ) -> Result<(), Value> {
        Ok(())
    }

    fn component_will_unmount(&mut self) {}

    /// Whether this component catches errors thrown below it.
    fn is_error_boundary(&self) -> bool {
        false
    }

    /// Partial state to render after a descendant threw `error`.
    fn derive_state_from_error(&self, _error: &Value) -> Option<State> {
        None
    }

    fn component_did_catch(&mut self, _error: &Value) {}
}

/// A class instance's line back to the runtime.
#[derive(Clone)]
pub struct ClassHandle {
    pub(crate) node: VNodeId,
    pub(crate) runtime: Weak<RuntimeInner>,
}

impl ClassHandle {
    /// Shallow-merge `partial` into the state and re-render.
    pub fn set_state(&self, partial: State) -> Result<(), ReconcileError> {
        self.enqueue(Update::new(UpdateTag::Update, Payload::Partial(partial)))
    }

    /// Like [`ClassHandle::set_state`], running `callback` once the update
    /// is committed.
    pub fn set_state_then<F>(&self, partial: State, callback: F) -> Result<(), ReconcileError>
    where
        F: FnOnce() + 'static,
    {
        self.enqueue(
            Update::new(UpdateTag::Update, Payload::Partial(partial))
                .with_callback(Some(Box::new(callback))),
        )
    }

    /// Merge the state produced from the latest state and props.
    pub fn set_state_with<F>(&self, produce: F) -> Result<(), ReconcileError>
    where
        F: Fn(&State, &Props) -> State + 'static,
    {
        let produce: StateProducer = Rc::new(produce);
        self.enqueue(Update::new(UpdateTag::Update, Payload::Producer(produce)))
    }

    /// Replace the state wholesale.
    pub fn replace_state(&self, state: State) -> Result<(), ReconcileError> {
        self.enqueue(Update::new(UpdateTag::Override, Payload::Partial(state)))
    }

    /// Re-render, skipping `should_component_update`.
    pub fn force_update(&self) -> Result<(), ReconcileError> {
        self.enqueue(Update::new(UpdateTag::ForceUpdate, Payload::None))
    }

    fn enqueue(&self, update: Update) -> Result<(), ReconcileError> {
        match self.runtime.upgrade() {
            Some(rt) => runtime::schedule_update(&rt, self.node, update),
            None => Ok(()),
        }
    }
}
