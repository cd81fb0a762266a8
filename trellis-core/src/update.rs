//! Update Queues
//!
//! Class components and tree roots do not re-render by mutating their state
//! in place. Every request is appended to the node's [`UpdateQueue`] and
//! folded into a new state the next time the node is captured.
//!
//! # Tags
//!
//! - `Update` shallow-merges a partial state (or the result of a producer)
//! - `Override` replaces the state wholesale
//! - `ForceUpdate` renders even if `should_component_update` says no
//! - `Error` carries an error captured by a boundary

use std::rc::Rc;

use indexmap::IndexMap;

use crate::element::{Child, Props};
use crate::value::Value;

/// Class component state: named fields shallow-merged on update.
pub type State = IndexMap<Rc<str>, Value>;

/// Build a [`State`] from name/value pairs.
pub fn state<I, K, V>(pairs: I) -> State
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<Rc<str>>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

pub(crate) type StateProducer = Rc<dyn Fn(&State, &Props) -> State>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpdateTag {
    Update,
    Override,
    ForceUpdate,
    Error,
}

pub(crate) enum Payload {
    None,
    Partial(State),
    Producer(StateProducer),
    /// New element for a tree root.
    Element(Child),
    Error(Value),
}

pub(crate) struct Update {
    pub(crate) tag: UpdateTag,
    pub(crate) payload: Payload,
    pub(crate) callback: Option<Box<dyn FnOnce()>>,
}

impl Update {
    pub(crate) fn new(tag: UpdateTag, payload: Payload) -> Self {
        Self {
            tag,
            payload,
            callback: None,
        }
    }

    pub(crate) fn with_callback(mut self, callback: Option<Box<dyn FnOnce()>>) -> Self {
        self.callback = callback;
        self
    }
}

pub(crate) type UpdateQueue = Vec<Update>;

/// Result of folding a class component's queue.
pub(crate) struct Processed {
    pub(crate) state: State,
    pub(crate) force: bool,
    pub(crate) errors: Vec<Value>,
    pub(crate) callbacks: Vec<Box<dyn FnOnce()>>,
}

/// Fold `queue` into `base` left to right.
///
/// Error updates are returned unapplied: deriving state from an error is
/// the component's job and happens after the fold.
pub(crate) fn process_updates(base: &State, props: &Props, queue: UpdateQueue) -> Processed {
    let mut processed = Processed {
        state: base.clone(),
        force: false,
        errors: Vec::new(),
        callbacks: Vec::new(),
    };

    for update in queue {
        match (update.tag, update.payload) {
            (UpdateTag::Override, Payload::Partial(next)) => processed.state = next,
            (UpdateTag::Override, Payload::Producer(produce)) => {
                processed.state = produce(&processed.state, props);
            }
            (UpdateTag::Update, Payload::Partial(partial)) => {
                processed.state.extend(partial);
            }
            (UpdateTag::Update, Payload::Producer(produce)) => {
                let partial = produce(&processed.state, props);
                processed.state.extend(partial);
            }
            (UpdateTag::ForceUpdate, _) => processed.force = true,
            (UpdateTag::Error, Payload::Error(error)) => processed.errors.push(error),
            _ => {}
        }
        processed.callbacks.extend(update.callback);
    }

    processed
}

/// Fold a root's queue, returning the newest element if any update set one.
pub(crate) fn process_root_updates(
    queue: UpdateQueue,
) -> (Option<Child>, Vec<Box<dyn FnOnce()>>) {
    let mut element = None;
    let mut callbacks = Vec::new();
    for update in queue {
        if let Payload::Element(child) = update.payload {
            element = Some(child);
        }
        callbacks.extend(update.callback);
    }
    (element, callbacks)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn updates_merge_and_overrides_replace() {
        let base = state([("a", 1), ("b", 2)]);
        let queue = vec![
            Update::new(UpdateTag::Update, Payload::Partial(state([("b", 3)]))),
            Update::new(UpdateTag::Update, Payload::Partial(state([("c", 4)]))),
        ];
        let processed = process_updates(&base, &Props::new(), queue);
        assert_eq!(processed.state.len(), 3);
        assert_eq!(processed.state["b"], Value::from(3));

        let queue = vec![Update::new(
            UpdateTag::Override,
            Payload::Partial(state([("z", 0)])),
        )];
        let processed = process_updates(&base, &Props::new(), queue);
        assert_eq!(processed.state.len(), 1);
        assert!(processed.state.contains_key("z"));
    }

    #[test]
    fn producers_see_previous_updates() {
        let increment: StateProducer = Rc::new(|state, _| {
            let n = state.get("n").and_then(Value::as_number).unwrap_or(0.0);
            super::state([("n", n + 1.0)])
        });
        let queue = vec![
            Update::new(UpdateTag::Update, Payload::Producer(increment.clone())),
            Update::new(UpdateTag::Update, Payload::Producer(increment)),
        ];
        let processed = process_updates(&state([("n", 0)]), &Props::new(), queue);
        assert_eq!(processed.state["n"], Value::from(2));
    }

    #[test]
    fn force_errors_and_callbacks_are_collected() {
        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        let queue = vec![
            Update::new(UpdateTag::ForceUpdate, Payload::None)
                .with_callback(Some(Box::new(move || hits_clone.set(hits_clone.get() + 1)))),
            Update::new(UpdateTag::Error, Payload::Error(Value::from("boom"))),
        ];
        let processed = process_updates(&State::new(), &Props::new(), queue);
        assert!(processed.force);
        assert_eq!(processed.errors.len(), 1);
        for callback in processed.callbacks {
            callback();
        }
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn root_queue_keeps_latest_element() {
        let queue = vec![
            Update::new(UpdateTag::Update, Payload::Element(Child::from("a"))),
            Update::new(UpdateTag::Update, Payload::Element(Child::from("b"))),
        ];
        let (element, callbacks) = process_root_updates(queue);
        assert!(matches!(element, Some(Child::Text(t)) if &*t == "b"));
        assert!(callbacks.is_empty());
    }
}
