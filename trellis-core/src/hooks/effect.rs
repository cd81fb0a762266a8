//! Effect Hooks
//!
//! An effect slot keeps its cleanup in a shared [`EffectSlot`], so a cleanup
//! queued for the deferred flush still runs after the component that owned
//! it is gone. Creates of an unmounted slot are dropped.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::Hook;
use crate::value::Value;

/// Cleanup returned by an effect.
pub type Destroy = Box<dyn FnOnce()>;

/// What an effect callback returns: an optional cleanup, or an error routed
/// to the nearest error boundary.
pub type EffectResult = Result<Option<Destroy>, Value>;

pub(crate) type EffectCreate = Box<dyn FnOnce() -> EffectResult>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EffectKind {
    /// Runs synchronously after host mutation.
    Layout,
    /// Runs in the deferred flush after commit.
    Passive,
}

#[derive(Default)]
pub(crate) struct EffectSlot {
    destroy: RefCell<Option<Destroy>>,
    unmounted: Cell<bool>,
}

impl EffectSlot {
    pub(crate) fn run_destroy(&self) {
        let destroy = self.destroy.borrow_mut().take();
        if let Some(destroy) = destroy {
            destroy();
        }
    }

    /// Run `create` and keep its cleanup. Skipped once unmounted.
    pub(crate) fn run_create(&self, create: EffectCreate) -> Result<(), Value> {
        if self.unmounted.get() {
            return Ok(());
        }
        let destroy = create()?;
        *self.destroy.borrow_mut() = destroy;
        Ok(())
    }

    pub(crate) fn mark_unmounted(&self) {
        self.unmounted.set(true);
    }
}

pub(crate) struct EffectHook {
    pub(crate) slot: Rc<EffectSlot>,
    pub(crate) create: Option<EffectCreate>,
    pub(crate) deps: Option<Vec<Value>>,
    pub(crate) kind: EffectKind,
    /// Dependencies changed since the last commit.
    pub(crate) changed: bool,
}

/// An effect whose create is due in this commit.
pub(crate) struct DueEffect {
    pub(crate) slot: Rc<EffectSlot>,
    pub(crate) create: EffectCreate,
}

/// Slots of changed layout effects, whose cleanups run in the submit pass.
pub(crate) fn changed_layout_slots(hooks: &[Hook]) -> Vec<Rc<EffectSlot>> {
    hooks
        .iter()
        .filter_map(|hook| match hook {
            Hook::Effect(e) if e.changed && e.kind == EffectKind::Layout => Some(e.slot.clone()),
            _ => None,
        })
        .collect()
}

/// Take the creates due this commit, split by kind, and reset `changed`.
pub(crate) fn take_due_effects(hooks: &mut [Hook]) -> (Vec<DueEffect>, Vec<DueEffect>) {
    let mut layout = Vec::new();
    let mut passive = Vec::new();
    for hook in hooks {
        let Hook::Effect(effect) = hook else { continue };
        if !effect.changed {
            continue;
        }
        effect.changed = false;
        if let Some(create) = effect.create.take() {
            let due = DueEffect {
                slot: effect.slot.clone(),
                create,
            };
            match effect.kind {
                EffectKind::Layout => layout.push(due),
                EffectKind::Passive => passive.push(due),
            }
        }
    }
    (layout, passive)
}

/// Passive slots of changed effects, whose cleanups precede their creates.
pub(crate) fn changed_passive_slots(hooks: &[Hook]) -> Vec<Rc<EffectSlot>> {
    hooks
        .iter()
        .filter_map(|hook| match hook {
            Hook::Effect(e) if e.changed && e.kind == EffectKind::Passive => Some(e.slot.clone()),
            _ => None,
        })
        .collect()
}

/// Mark every effect unmounted, returning `(layout, passive)` slots.
pub(crate) fn unmount_effects(hooks: &[Hook]) -> (Vec<Rc<EffectSlot>>, Vec<Rc<EffectSlot>>) {
    let mut layout = Vec::new();
    let mut passive = Vec::new();
    for hook in hooks {
        if let Hook::Effect(effect) = hook {
            effect.slot.mark_unmounted();
            match effect.kind {
                EffectKind::Layout => layout.push(effect.slot.clone()),
                EffectKind::Passive => passive.push(effect.slot.clone()),
            }
        }
    }
    (layout, passive)
}
