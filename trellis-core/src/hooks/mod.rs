//! Hooks Engine
//!
//! Function components get persistent state through hooks. A hook call has
//! no name: its identity is its position in the sequence of hook calls made
//! during one render. The engine walks the previous render's slot list in
//! lock step with the calls of the current render, so call N always lands on
//! slot N.
//!
//! # Rules
//!
//! - On mount every call appends a fresh slot.
//! - On update, call N reuses slot N. A call past the end appends.
//! - If an update makes fewer calls than the previous render, rendering fails
//!   with [`ReconcileError::HooksLessThanExpected`]. A call whose kind differs
//!   from the slot's fails with [`ReconcileError::HookKindMismatch`].
//!
//! The cursor lives in the [`RenderCx`] passed to the component, never in a
//! global, so nested renders cannot observe each other's slots.

mod effect;
mod state;

use std::rc::Rc;

use smallvec::SmallVec;

pub use effect::{Destroy, EffectResult};
pub use state::{Action, Dispatch, Reducer};

pub(crate) use effect::{
    changed_layout_slots, changed_passive_slots, take_due_effects, unmount_effects, DueEffect,
    EffectSlot,
};

use effect::{EffectHook, EffectKind};
use state::{HookQueue, StateHook};

use crate::element::{Context, ContextId, Ref, RefObject};
use crate::error::ReconcileError;
use crate::runtime::RuntimeInner;
use crate::value::{deps_equal, Value};
use crate::vnode::VNodeId;

/// Whether slots are being created or reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HookStage {
    Init,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HookKind {
    State,
    Effect,
    Memo,
    Ref,
}

impl HookKind {
    fn name(self) -> &'static str {
        match self {
            HookKind::State => "a state hook",
            HookKind::Effect => "an effect hook",
            HookKind::Memo => "a memo hook",
            HookKind::Ref => "a ref hook",
        }
    }
}

pub(crate) struct MemoHook {
    value: Value,
    deps: Option<Vec<Value>>,
}

/// One slot of a function component's hook list.
pub(crate) enum Hook {
    State(StateHook),
    Effect(EffectHook),
    Memo(MemoHook),
    Ref(RefObject),
}

impl Hook {
    fn kind(&self) -> HookKind {
        match self {
            Hook::State(_) => HookKind::State,
            Hook::Effect(_) => HookKind::Effect,
            Hook::Memo(_) => HookKind::Memo,
            Hook::Ref(_) => HookKind::Ref,
        }
    }

    /// Kind label and current value, for devtools.
    pub(crate) fn describe(&self) -> (&'static str, String) {
        match self {
            Hook::State(h) => ("State", h.queue.state().to_string()),
            Hook::Effect(e) => match e.kind {
                EffectKind::Layout => ("LayoutEffect", format!("{:?}", e.deps)),
                EffectKind::Passive => ("Effect", format!("{:?}", e.deps)),
            },
            Hook::Memo(m) => ("Memo", m.value.to_string()),
            Hook::Ref(r) => ("Ref", r.current().to_string()),
        }
    }
}

/// Render context handed to function components.
///
/// All hooks are methods on this type. Hooks return `Result` so a misuse
/// unwinds the render with `?`.
pub struct RenderCx<'a> {
    rt: &'a Rc<RuntimeInner>,
    node: VNodeId,
    stage: HookStage,
    prev: Vec<Option<Hook>>,
    hooks: Vec<Hook>,
    effect_changed: bool,
    context_deps: SmallVec<[ContextId; 2]>,
}

/// What a finished render leaves behind on its node.
pub(crate) struct RenderOutput {
    pub(crate) hooks: Vec<Hook>,
    pub(crate) effect_changed: bool,
    pub(crate) context_deps: SmallVec<[ContextId; 2]>,
}

impl<'a> RenderCx<'a> {
    pub(crate) fn new(
        rt: &'a Rc<RuntimeInner>,
        node: VNodeId,
        stage: HookStage,
        prev: Vec<Hook>,
    ) -> Self {
        let prev = match stage {
            HookStage::Init => Vec::new(),
            HookStage::Update => prev.into_iter().map(Some).collect(),
        };
        Self {
            rt,
            node,
            stage,
            prev,
            hooks: Vec::new(),
            effect_changed: false,
            context_deps: SmallVec::new(),
        }
    }

    /// Handle of the node being rendered.
    pub fn node(&self) -> VNodeId {
        self.node
    }

    /// Take slot N of the previous render, checking it has the right kind.
    fn next_slot(&mut self, kind: HookKind) -> Result<Option<Hook>, ReconcileError> {
        let slot = self.hooks.len();
        let Some(entry) = self.prev.get_mut(slot) else {
            return Ok(None);
        };
        match entry.take() {
            Some(hook) if hook.kind() == kind => Ok(Some(hook)),
            Some(hook) => {
                let expected = hook.kind().name();
                *entry = Some(hook);
                Err(ReconcileError::HookKindMismatch {
                    slot,
                    expected,
                    found: kind.name(),
                })
            }
            None => Ok(None),
        }
    }

    /// Verify every slot of the previous render was consumed.
    pub(crate) fn finish(&self) -> Result<(), ReconcileError> {
        if self.stage == HookStage::Update && self.prev.len() > self.hooks.len() {
            return Err(ReconcileError::HooksLessThanExpected);
        }
        Ok(())
    }

    /// Prepare to run the body again after a render-phase update.
    pub(crate) fn restart(&mut self) {
        self.prev = std::mem::take(&mut self.hooks).into_iter().map(Some).collect();
        self.stage = HookStage::Update;
        self.context_deps.clear();
    }

    pub(crate) fn into_output(self) -> RenderOutput {
        let mut hooks = self.hooks;
        let consumed = hooks.len();
        // Slots a failed render never reached keep their state.
        hooks.extend(self.prev.into_iter().skip(consumed).flatten());
        RenderOutput {
            hooks,
            effect_changed: self.effect_changed,
            context_deps: self.context_deps,
        }
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    pub fn use_state(&mut self, initial: impl Into<Value>) -> Result<(Value, Dispatch), ReconcileError> {
        let initial = initial.into();
        self.use_state_hook(move || initial, None)
    }

    /// `use_state` with a lazily computed initial value.
    pub fn use_state_with<F>(&mut self, init: F) -> Result<(Value, Dispatch), ReconcileError>
    where
        F: FnOnce() -> Value,
    {
        self.use_state_hook(init, None)
    }

    pub fn use_reducer(
        &mut self,
        reducer: Reducer,
        initial: impl Into<Value>,
    ) -> Result<(Value, Dispatch), ReconcileError> {
        let initial = initial.into();
        self.use_state_hook(move || initial, Some(reducer))
    }

    fn use_state_hook<F>(
        &mut self,
        init: F,
        reducer: Option<Reducer>,
    ) -> Result<(Value, Dispatch), ReconcileError>
    where
        F: FnOnce() -> Value,
    {
        let hook = match self.next_slot(HookKind::State)? {
            Some(Hook::State(hook)) => {
                hook.queue.set_reducer(reducer);
                hook.queue.process();
                hook
            }
            _ => {
                let queue = Rc::new(HookQueue::new(init(), reducer));
                let dispatch = Dispatch {
                    queue: queue.clone(),
                    node: self.node,
                    runtime: Rc::downgrade(self.rt),
                };
                StateHook { queue, dispatch }
            }
        };
        let value = hook.queue.state();
        let dispatch = hook.dispatch.clone();
        self.hooks.push(Hook::State(hook));
        Ok((value, dispatch))
    }

    // ------------------------------------------------------------------
    // Effects
    // ------------------------------------------------------------------

    /// Run `create` after commit, in the deferred flush, whenever `deps`
    /// changed. `None` deps run it after every render.
    pub fn use_effect<F>(&mut self, create: F, deps: Option<Vec<Value>>) -> Result<(), ReconcileError>
    where
        F: FnOnce() -> EffectResult + 'static,
    {
        self.use_effect_hook(EffectKind::Passive, Box::new(create), deps)
    }

    /// Like [`RenderCx::use_effect`], but runs synchronously after host
    /// mutation, children before parents.
    pub fn use_layout_effect<F>(
        &mut self,
        create: F,
        deps: Option<Vec<Value>>,
    ) -> Result<(), ReconcileError>
    where
        F: FnOnce() -> EffectResult + 'static,
    {
        self.use_effect_hook(EffectKind::Layout, Box::new(create), deps)
    }

    fn use_effect_hook(
        &mut self,
        kind: EffectKind,
        create: effect::EffectCreate,
        deps: Option<Vec<Value>>,
    ) -> Result<(), ReconcileError> {
        let hook = match self.next_slot(HookKind::Effect)? {
            Some(Hook::Effect(mut prev))
                if prev.kind == kind && deps_equal(prev.deps.as_deref(), deps.as_deref()) =>
            {
                // Not committed yet: the latest closure is the one that runs.
                if prev.changed {
                    prev.create = Some(create);
                }
                prev
            }
            Some(Hook::Effect(prev)) => EffectHook {
                slot: prev.slot,
                create: Some(create),
                deps,
                kind,
                changed: true,
            },
            _ => EffectHook {
                slot: Rc::new(EffectSlot::default()),
                create: Some(create),
                deps,
                kind,
                changed: true,
            },
        };
        if hook.changed {
            self.effect_changed = true;
        }
        self.hooks.push(Hook::Effect(hook));
        Ok(())
    }

    /// Expose `create()` through `ref_` while mounted.
    pub fn use_imperative_handle<F>(
        &mut self,
        ref_: Option<&Ref>,
        create: F,
        deps: Option<Vec<Value>>,
    ) -> Result<(), ReconcileError>
    where
        F: FnOnce() -> Value + 'static,
    {
        let ref_ = ref_.cloned();
        self.use_layout_effect(
            move || {
                let Some(ref_) = ref_ else { return Ok(None) };
                ref_.attach(create());
                Ok(Some(Box::new(move || ref_.detach()) as Destroy))
            },
            deps,
        )
    }

    // ------------------------------------------------------------------
    // Memoization
    // ------------------------------------------------------------------

    /// Recompute only when `deps` changed. `None` deps recompute every render.
    pub fn use_memo<F>(&mut self, compute: F, deps: Option<Vec<Value>>) -> Result<Value, ReconcileError>
    where
        F: FnOnce() -> Value,
    {
        let hook = match self.next_slot(HookKind::Memo)? {
            Some(Hook::Memo(prev)) if deps_equal(prev.deps.as_deref(), deps.as_deref()) => prev,
            _ => MemoHook {
                value: compute(),
                deps,
            },
        };
        let value = hook.value.clone();
        self.hooks.push(Hook::Memo(hook));
        Ok(value)
    }

    /// Keep `callback` stable while `deps` hold.
    pub fn use_callback(
        &mut self,
        callback: Value,
        deps: Option<Vec<Value>>,
    ) -> Result<Value, ReconcileError> {
        self.use_memo(move || callback, deps)
    }

    pub fn use_ref(&mut self, initial: impl Into<Value>) -> Result<RefObject, ReconcileError> {
        let obj = match self.next_slot(HookKind::Ref)? {
            Some(Hook::Ref(obj)) => obj,
            _ => RefObject::new(initial),
        };
        self.hooks.push(Hook::Ref(obj.clone()));
        Ok(obj)
    }

    /// Read the nearest provided value of `context` and re-render when it
    /// changes. Does not occupy a slot.
    pub fn use_context(&mut self, context: &Context) -> Value {
        if !self.context_deps.contains(&context.id()) {
            self.context_deps.push(context.id());
        }
        context.current()
    }
}
