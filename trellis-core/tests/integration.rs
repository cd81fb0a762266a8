//! Integration Tests for the Reconciler
//!
//! These tests mount component trees into a `MemoryHost` and check the
//! markup and the host operations each pass produced.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use trellis_core::{
    create_context, create_portal, create_ref, h, state, suspense, Child, ClassHandle, ClassType,
    Component, DevtoolsHelper, DevtoolsHook, Dispatch, ElementType, FunctionType, HostConfig,
    HostNodeId, HostOp, LazyType, MemoType, MemoryHost, Promise, PropChange, Props,
    ReconcileError, RenderResult, Runtime, RuntimeConfig, State, Throw, VNodeId, Value,
};

type Log = Rc<RefCell<Vec<String>>>;

fn setup() -> (Rc<MemoryHost>, HostNodeId, Runtime) {
    let host = Rc::new(MemoryHost::new());
    let container = host.create_container();
    let runtime = Runtime::new(host.clone());
    (host, container, runtime)
}

fn keyed_list(keys: &[&str]) -> Child {
    h("ul")
        .children(keys.iter().map(|k| h("li").key(k).child(*k)))
        .into()
}

fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

/// Test that moving one keyed child moves exactly one host node.
#[test]
fn keyed_reorder_moves_a_single_node() {
    let (host, container, rt) = setup();
    rt.render(keyed_list(&["a", "b", "c", "d"]), container).unwrap();
    host.take_ops();

    rt.render(keyed_list(&["a", "c", "d", "b"]), container).unwrap();

    let ops = host.take_ops();
    assert_eq!(ops.iter().filter(|op| op.is_placement()).count(), 1);
    assert!(!ops.iter().any(|op| matches!(op, HostOp::CreateElement { .. })));
    assert_eq!(
        host.markup(container),
        "<ul><li>a</li><li>c</li><li>d</li><li>b</li></ul>"
    );
}

/// Test that rotating the last item to the front is a single insertion.
#[test]
fn rotate_right_is_one_insert_before() {
    let (host, container, rt) = setup();
    rt.render(keyed_list(&["1", "2", "3"]), container).unwrap();
    let items = host.children(host.children(container)[0]);
    host.take_ops();

    rt.render(keyed_list(&["3", "1", "2"]), container).unwrap();

    let ul = host.children(container)[0];
    assert_eq!(
        host.take_ops(),
        [HostOp::InsertBefore {
            parent: ul,
            child: items[2],
            before: items[0],
        }]
    );
    assert_eq!(host.children(ul), [items[2], items[0], items[1]]);
}

/// Test that keyed children added and removed in one pass land in order.
#[test]
fn keyed_insert_and_remove() {
    let (host, container, rt) = setup();
    rt.render(keyed_list(&["a", "b", "c"]), container).unwrap();

    rt.render(keyed_list(&["x", "a", "c", "y"]), container).unwrap();

    assert_eq!(
        host.markup(container),
        "<ul><li>x</li><li>a</li><li>c</li><li>y</li></ul>"
    );
}

/// Test that setting a state to the value it already holds does not render.
#[test]
fn same_state_value_bails_out() {
    let (host, container, rt) = setup();
    let renders = Rc::new(Cell::new(0));
    let setter: Rc<RefCell<Option<Dispatch>>> = Rc::default();

    let counter = {
        let renders = renders.clone();
        let setter = setter.clone();
        FunctionType::new("Counter", move |cx, _props| {
            renders.set(renders.get() + 1);
            let (count, set_count) = cx.use_state(0)?;
            *setter.borrow_mut() = Some(set_count);
            Ok(h("b").child(count.to_string()).into())
        })
    };

    rt.render(counter.element(), container).unwrap();
    let set = setter.borrow().clone().unwrap();

    set.set(0).unwrap();
    assert_eq!(renders.get(), 1);

    set.set(5).unwrap();
    assert_eq!(renders.get(), 2);
    assert_eq!(host.markup(container), "<b>5</b>");
}

/// Test that updates made inside a batch render once.
#[test]
fn batched_state_updates_render_once() {
    let (host, container, rt) = setup();
    let renders = Rc::new(Cell::new(0));
    let setter: Rc<RefCell<Option<Dispatch>>> = Rc::default();

    let counter = {
        let renders = renders.clone();
        let setter = setter.clone();
        FunctionType::new("Counter", move |cx, _props| {
            renders.set(renders.get() + 1);
            let (count, set_count) = cx.use_state(0)?;
            *setter.borrow_mut() = Some(set_count);
            Ok(h("b").child(count.to_string()).into())
        })
    };

    rt.render(counter.element(), container).unwrap();
    let set = setter.borrow().clone().unwrap();
    let increment = |v: &Value| Value::from(v.as_number().unwrap_or(0.0) + 1.0);

    rt.batched_updates(|| {
        set.update(increment).unwrap();
        set.update(increment).unwrap();
        set.update(increment).unwrap();
    })
    .unwrap();

    assert_eq!(renders.get(), 2);
    assert_eq!(host.markup(container), "<b>3</b>");
}

/// Test that a render calling fewer hooks than before is rejected.
#[test]
fn conditional_hook_is_reported() {
    let (_host, container, rt) = setup();
    let component = FunctionType::new("Conditional", |cx, props| {
        cx.use_state(1)?;
        if props.value("extra").as_bool() == Some(true) {
            cx.use_state(2)?;
        }
        Ok(Child::Empty)
    });

    rt.render(component.element().prop("extra", true), container)
        .unwrap();
    let err = rt
        .render(component.element().prop("extra", false), container)
        .unwrap_err();

    assert!(matches!(err, ReconcileError::HooksLessThanExpected));
}

/// Test that a hook slot taken by a different kind of hook is rejected.
#[test]
fn swapped_hook_kinds_are_reported() {
    let (_host, container, rt) = setup();
    let component = FunctionType::new("Swapper", |cx, props| {
        if props.value("swap").as_bool() == Some(true) {
            cx.use_ref(0)?;
            cx.use_state(1)?;
        } else {
            cx.use_state(1)?;
            cx.use_ref(0)?;
        }
        Ok(Child::Empty)
    });

    rt.render(component.element().prop("swap", false), container)
        .unwrap();
    let err = rt
        .render(component.element().prop("swap", true), container)
        .unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::HookKindMismatch {
            slot: 0,
            expected: "a state hook",
            found: "a ref hook",
        }
    ));
}

/// Test that setting state from the component body renders it again before
/// committing, and that the committed effect sees the settled value.
#[test]
fn state_set_while_rendering_settles_before_commit() {
    let (host, container, rt) = setup();
    let renders = Rc::new(Cell::new(0));
    let log: Log = Rc::default();

    let component = {
        let renders = renders.clone();
        let log = log.clone();
        FunctionType::new("Settler", move |cx, _props| {
            renders.set(renders.get() + 1);
            let (value, set_value) = cx.use_state(0)?;
            if value.as_number() == Some(0.0) {
                set_value.set(1)?;
            }
            let log = log.clone();
            let seen = value.to_string();
            cx.use_layout_effect(
                move || {
                    log.borrow_mut().push(format!("saw {seen}"));
                    Ok(None)
                },
                Some(Vec::new()),
            )?;
            Ok(h("b").child(value.to_string()).into())
        })
    };

    rt.render(component.element(), container).unwrap();

    assert_eq!(renders.get(), 2);
    assert_eq!(host.markup(container), "<b>1</b>");
    assert_eq!(entries(&log), ["saw 1"]);
}

/// Test that a body setting a new value on every run is stopped.
#[test]
fn endless_state_set_while_rendering_hits_the_limit() {
    let (host, container, rt) = setup();
    let component = FunctionType::new("Runaway", |cx, _props| {
        let (n, set_n) = cx.use_state(0)?;
        set_n.set(n.as_number().unwrap_or(0.0) + 1.0)?;
        Ok(h("b").child(n.to_string()).into())
    });

    let err = rt.render(component.element(), container).unwrap_err();

    match err {
        ReconcileError::NestedRenderLimit { component, limit } => {
            assert_eq!(component, "Runaway");
            assert_eq!(limit, 50);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(host.markup(container), "");
}

/// Test that passive cleanups run before setups and only when deps change.
#[test]
fn passive_effects_clean_up_before_running_again() {
    let (_host, container, rt) = setup();
    let log: Log = Rc::default();

    let component = {
        let log = log.clone();
        FunctionType::new("Tracker", move |cx, props| {
            let id = props.value("id");
            let log = log.clone();
            let label = id.to_string();
            cx.use_effect(
                move || {
                    log.borrow_mut().push(format!("create {label}"));
                    let log = log.clone();
                    Ok(Some(Box::new(move || {
                        log.borrow_mut().push(format!("destroy {label}"));
                    }) as trellis_core::Destroy))
                },
                Some(vec![id]),
            )?;
            Ok(Child::Empty)
        })
    };

    rt.render(component.element().prop("id", 1), container).unwrap();
    assert!(entries(&log).is_empty());
    rt.run_pending_tasks().unwrap();
    assert_eq!(entries(&log), ["create 1"]);

    // Same deps: nothing to do.
    rt.render(component.element().prop("id", 1), container).unwrap();
    rt.run_pending_tasks().unwrap();
    assert_eq!(entries(&log), ["create 1"]);

    rt.render(component.element().prop("id", 2), container).unwrap();
    rt.run_pending_tasks().unwrap();
    assert_eq!(entries(&log), ["create 1", "destroy 1", "create 2"]);

    rt.unmount_component_at_node(container).unwrap();
    rt.run_pending_tasks().unwrap();
    assert_eq!(
        entries(&log),
        ["create 1", "destroy 1", "create 2", "destroy 2"]
    );
}

/// Test that cleanups of a removed component and of a changed effect both
/// run after the host removal and before any new setup.
#[test]
fn cleanups_of_removed_and_changed_effects_precede_setups() {
    let (host, container, rt) = setup();
    let log: Log = Rc::default();

    let tracker = {
        let log = log.clone();
        let host = host.clone();
        FunctionType::new("Tracker", move |cx, props| {
            let name = props.value("name").to_string();
            let dep = props.value("dep");
            let label = format!("{name}:{dep}");
            let log = log.clone();
            let host = host.clone();
            cx.use_effect(
                move || {
                    log.borrow_mut().push(format!("create {label}"));
                    let log = log.clone();
                    Ok(Some(Box::new(move || {
                        let markup = host.markup(container);
                        log.borrow_mut().push(format!("destroy {label} {markup}"));
                    }) as trellis_core::Destroy))
                },
                Some(vec![dep]),
            )?;
            Ok(h("span").child(name).into())
        })
    };
    let view = |items: &[(&str, i32)]| -> Child {
        h("div")
            .children(items.iter().map(|&(name, dep)| {
                tracker
                    .element()
                    .key(name)
                    .prop("name", name)
                    .prop("dep", dep)
            }))
            .into()
    };

    rt.render(view(&[("A", 1), ("B", 1)]), container).unwrap();
    rt.run_pending_tasks().unwrap();
    assert_eq!(entries(&log), ["create A:1", "create B:1"]);

    rt.render(view(&[("B", 2)]), container).unwrap();
    rt.run_pending_tasks().unwrap();

    assert_eq!(
        entries(&log),
        [
            "create A:1",
            "create B:1",
            "destroy A:1 <div><span>B</span></div>",
            "destroy B:1 <div><span>B</span></div>",
            "create B:2",
        ]
    );
}

/// Test that layout effects run during commit, children before parents.
#[test]
fn layout_effects_run_synchronously() {
    let (_host, container, rt) = setup();
    let log: Log = Rc::default();

    let make = |name: &'static str, child: Option<FunctionType>| {
        let log = log.clone();
        FunctionType::new(name, move |cx, _props| {
            let log = log.clone();
            cx.use_layout_effect(
                move || {
                    log.borrow_mut().push(name.to_string());
                    Ok(None)
                },
                Some(Vec::new()),
            )?;
            Ok(child.as_ref().map(|c| c.element()).into())
        })
    };
    let inner = make("inner", None);
    let outer = make("outer", Some(inner));

    rt.render(outer.element(), container).unwrap();

    assert_eq!(entries(&log), ["inner", "outer"]);
}

/// Test that `use_memo` recomputes only when its deps change.
#[test]
fn memo_recomputes_on_dep_change() {
    let (host, container, rt) = setup();
    let computed = Rc::new(Cell::new(0));

    let component = {
        let computed = computed.clone();
        FunctionType::new("Doubler", move |cx, props| {
            let n = props.value("n");
            let input = n.as_number().unwrap_or(0.0);
            let computed = computed.clone();
            let doubled = cx.use_memo(
                move || {
                    computed.set(computed.get() + 1);
                    Value::from(input * 2.0)
                },
                Some(vec![n]),
            )?;
            Ok(h("i").child(doubled.to_string()).into())
        })
    };

    rt.render(component.element().prop("n", 2), container).unwrap();
    rt.render(component.element().prop("n", 2), container).unwrap();
    assert_eq!(computed.get(), 1);

    rt.render(component.element().prop("n", 3), container).unwrap();
    assert_eq!(computed.get(), 2);
    assert_eq!(host.markup(container), "<i>6</i>");
}

struct Boundary {
    log: Log,
}

impl Component for Boundary {
    fn render(&self, props: &Props, state: &State) -> RenderResult {
        match state.get("error") {
            Some(error) => Ok(h("p").child(format!("caught: {error}")).into()),
            None => Ok(props.children().clone()),
        }
    }

    fn is_error_boundary(&self) -> bool {
        true
    }

    fn derive_state_from_error(&self, error: &Value) -> Option<State> {
        Some(state([("error", error.clone())]))
    }

    fn component_did_catch(&mut self, error: &Value) {
        self.log.borrow_mut().push(format!("did catch {error}"));
    }
}

fn boundary_type(log: &Log) -> ClassType {
    let log = log.clone();
    ClassType::new("Boundary", move |_props, _handle| {
        Box::new(Boundary { log: log.clone() })
    })
}

/// Test that a render error is caught by the nearest error boundary.
#[test]
fn error_boundary_renders_fallback() {
    let (host, container, rt) = setup();
    let log: Log = Rc::default();
    let boundary = boundary_type(&log);
    let thrower = FunctionType::new("Thrower", |_cx, _props| Err(Throw::error("boom")));

    rt.render(
        h("main").child(boundary.element().child(thrower.element())),
        container,
    )
    .unwrap();

    assert_eq!(host.markup(container), "<main><p>caught: boom</p></main>");
    assert_eq!(entries(&log), ["did catch boom"]);
}

/// Test that an error without a boundary fails the render.
#[test]
fn uncaught_error_is_returned() {
    let (host, container, rt) = setup();
    let thrower = FunctionType::new("Thrower", |_cx, _props| Err(Throw::error("boom")));

    let err = rt.render(h("div").child(thrower.element()), container).unwrap_err();

    match err {
        ReconcileError::Uncaught(value) => assert_eq!(value, Value::from("boom")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(host.markup(container), "");
}

struct Banner;

impl Component for Banner {
    fn render(&self, props: &Props, state: &State) -> RenderResult {
        let body = match state.get("error") {
            Some(error) => h("p").child(format!("caught: {error}")).into(),
            None => props.children().clone(),
        };
        Ok(Child::from(vec![h("b").child("ok").into(), body]))
    }

    fn is_error_boundary(&self) -> bool {
        true
    }

    fn derive_state_from_error(&self, error: &Value) -> Option<State> {
        Some(state([("error", error.clone())]))
    }
}

/// Test that host nodes rendered twice before their first commit leave no
/// stale instance behind.
#[test]
fn rerendered_uncommitted_host_nodes_are_released() {
    let (host, container, rt) = setup();
    let banner = ClassType::new("Banner", |_props, _handle| Box::new(Banner));
    let thrower = FunctionType::new("Thrower", |_cx, _props| Err(Throw::error("boom")));

    rt.render(banner.element().child(thrower.element()), container)
        .unwrap();

    assert_eq!(host.markup(container), "<b>ok</b><p>caught: boom</p>");
    // The container, <b> and <p>.
    assert_eq!(host.node_count(), 3);
}

fn loaded_component() -> ElementType {
    ElementType::Function(FunctionType::new("Loaded", |_cx, _props| {
        Ok(h("p").child("loaded").into())
    }))
}

/// Test that a lazy component shows the fallback until it loads.
#[test]
fn suspense_shows_fallback_until_lazy_resolves() {
    let (host, container, rt) = setup();
    let promise = Promise::new();
    let lazy = {
        let promise = promise.clone();
        LazyType::new(move || promise.clone())
    };

    rt.render(suspense("loading").child(lazy.element()), container)
        .unwrap();
    assert_eq!(host.markup(container), "loading");

    promise.resolve(Value::object(loaded_component()));

    assert_eq!(host.markup(container), "<p>loaded</p>");
}

/// Test that content already on screen is hidden, not removed, while a new
/// descendant is pending.
#[test]
fn suspended_update_hides_committed_content() {
    let (host, container, rt) = setup();
    let promise = Promise::new();
    let lazy = {
        let promise = promise.clone();
        LazyType::new(move || promise.clone())
    };

    rt.render(suspense("loading").child(h("span").child("a")), container)
        .unwrap();
    let span_count = host.node_count();

    rt.render(
        suspense("loading")
            .child(h("span").child("a"))
            .child(lazy.element()),
        container,
    )
    .unwrap();
    assert_eq!(host.markup(container), "loading");
    assert!(host.node_count() > span_count);

    promise.resolve(Value::object(loaded_component()));
    assert_eq!(host.markup(container), "<span>a</span><p>loaded</p>");
}

/// Test that a context change reaches a consumer below a memoized parent.
#[test]
fn context_change_bypasses_memo() {
    let (host, container, rt) = setup();
    let theme = create_context("light");
    let reader_renders = Rc::new(Cell::new(0));
    let static_renders = Rc::new(Cell::new(0));

    let reader = {
        let theme = theme.clone();
        let renders = reader_renders.clone();
        FunctionType::new("Reader", move |cx, _props| {
            renders.set(renders.get() + 1);
            let value = cx.use_context(&theme);
            Ok(h("em").child(value.to_string()).into())
        })
    };
    let plain = {
        let renders = static_renders.clone();
        FunctionType::new("Plain", move |_cx, _props| {
            renders.set(renders.get() + 1);
            Ok(h("hr").into())
        })
    };
    let memo_reader = MemoType::new(ElementType::Function(reader));
    let memo_plain = MemoType::new(ElementType::Function(plain));

    let tree = |value: &str| {
        theme
            .provider(value)
            .child(memo_reader.element())
            .child(memo_plain.element())
    };

    rt.render(tree("dark"), container).unwrap();
    assert_eq!(host.markup(container), "<em>dark</em><hr></hr>");

    rt.render(tree("light"), container).unwrap();

    assert_eq!(host.markup(container), "<em>light</em><hr></hr>");
    assert_eq!(reader_renders.get(), 2);
    assert_eq!(static_renders.get(), 1);
}

/// Test that consumers outside any provider see the default value.
#[test]
fn consumer_without_provider_reads_default() {
    let (host, container, rt) = setup();
    let locale = create_context("en");

    rt.render(
        locale.consumer(|value| h("span").child(value.to_string()).into()),
        container,
    )
    .unwrap();

    assert_eq!(host.markup(container), "<span>en</span>");
}

struct Counter {
    log: Log,
}

impl Component for Counter {
    fn initial_state(&self, _props: &Props) -> State {
        state([("count", 0)])
    }

    fn render(&self, _props: &Props, state: &State) -> RenderResult {
        let count = state.get("count").cloned().unwrap_or_default();
        Ok(h("span").child(count.to_string()).into())
    }

    fn component_did_mount(&mut self) -> Result<(), Value> {
        self.log.borrow_mut().push("did mount".to_string());
        Ok(())
    }

    fn component_did_update(
        &mut self,
        _prev_props: &Props,
        prev_state: &State,
        _snapshot: &Value,
    ) -> Result<(), Value> {
        let prev = prev_state.get("count").cloned().unwrap_or_default();
        self.log.borrow_mut().push(format!("did update from {prev}"));
        Ok(())
    }

    fn component_will_unmount(&mut self) {
        self.log.borrow_mut().push("will unmount".to_string());
    }
}

fn counter_type(log: &Log, handle: &Rc<RefCell<Option<ClassHandle>>>) -> ClassType {
    let log = log.clone();
    let slot = handle.clone();
    ClassType::new("Counter", move |_props, handle| {
        *slot.borrow_mut() = Some(handle);
        Box::new(Counter { log: log.clone() })
    })
}

/// Test the class lifecycle across mount, `set_state` and unmount.
#[test]
fn class_lifecycle() {
    let (host, container, rt) = setup();
    let log: Log = Rc::default();
    let handle: Rc<RefCell<Option<ClassHandle>>> = Rc::default();
    let counter = counter_type(&log, &handle);

    rt.render(counter.element(), container).unwrap();
    assert_eq!(host.markup(container), "<span>0</span>");

    let committed = Rc::new(Cell::new(false));
    let flag = committed.clone();
    let handle = handle.borrow().clone().unwrap();
    handle
        .set_state_then(state([("count", 4)]), move || flag.set(true))
        .unwrap();

    assert!(committed.get());
    assert_eq!(host.markup(container), "<span>4</span>");

    assert!(rt.unmount_component_at_node(container).unwrap());
    assert_eq!(host.markup(container), "");
    assert_eq!(
        entries(&log),
        ["did mount", "did update from 0", "will unmount"]
    );
}

struct Looper {
    handle: ClassHandle,
}

impl Component for Looper {
    fn initial_state(&self, _props: &Props) -> State {
        state([("n", 0)])
    }

    fn render(&self, _props: &Props, _state: &State) -> RenderResult {
        Ok(Child::Empty)
    }

    fn component_did_mount(&mut self) -> Result<(), Value> {
        self.handle
            .set_state_with(|s, _| {
                let n = s.get("n").and_then(Value::as_number).unwrap_or(0.0);
                state([("n", n + 1.0)])
            })
            .map_err(|err| Value::from(err.to_string()))
    }

    fn component_did_update(
        &mut self,
        _prev_props: &Props,
        _prev_state: &State,
        _snapshot: &Value,
    ) -> Result<(), Value> {
        self.component_did_mount()
    }
}

/// Test that a component updating itself after every commit is stopped.
#[test]
fn update_loop_hits_the_limit() {
    let (_host, container, rt) = setup();
    let looper = ClassType::new("Looper", |_props, handle| Box::new(Looper { handle }));

    let err = rt.render(looper.element(), container).unwrap_err();

    assert!(matches!(err, ReconcileError::LoopingUpdateLimit { limit: 50 }));
}

/// Test that an effect setting state on every run is stopped too.
#[test]
fn effect_loop_hits_the_limit() {
    let host = Rc::new(MemoryHost::new());
    let container = host.create_container();
    let config = RuntimeConfig {
        looping_update_limit: 5,
        ..RuntimeConfig::default()
    };
    let rt = Runtime::with_config(host, config);

    let component = FunctionType::new("Spinner", |cx, _props| {
        let (n, set_n) = cx.use_state(0)?;
        cx.use_effect(
            move || {
                let next = n.as_number().unwrap_or(0.0) + 1.0;
                set_n.set(next).map_err(|err| Value::from(err.to_string()))?;
                Ok(None)
            },
            None,
        )?;
        Ok(Child::Empty)
    });

    rt.render(component.element(), container).unwrap();
    let err = rt.run_pending_tasks().unwrap_err();

    assert!(matches!(err, ReconcileError::LoopingUpdateLimit { limit: 5 }));
}

/// Test that portal children render into their own container and leave
/// with their owner.
#[test]
fn portal_renders_into_another_container() {
    let (host, container, rt) = setup();
    let overlay = host.create_container();

    rt.render(
        h("div").child(create_portal(h("dialog").child("hi"), overlay, None)),
        container,
    )
    .unwrap();
    assert_eq!(host.markup(container), "<div></div>");
    assert_eq!(host.markup(overlay), "<dialog>hi</dialog>");

    rt.unmount_component_at_node(container).unwrap();
    assert_eq!(host.markup(overlay), "");
}

/// Test that object refs receive the host node and are cleared on unmount.
#[test]
fn refs_follow_the_host_node() {
    let (host, container, rt) = setup();
    let input = create_ref();

    rt.render(h("input").ref_(input.clone()), container).unwrap();
    let node = host.children(container)[0];
    assert_eq!(input.current().downcast_ref::<HostNodeId>(), Some(&node));

    rt.unmount_component_at_node(container).unwrap();
    assert!(input.current().is_nullish());
}

/// Test that the render callback runs once the element is committed.
#[test]
fn render_callback_sees_committed_tree() {
    let (host, container, rt) = setup();
    let seen = Rc::new(RefCell::new(String::new()));

    let probe = host.clone();
    let out = seen.clone();
    rt.render_with_callback(h("p").child("done"), container, move || {
        *out.borrow_mut() = probe.markup(container);
    })
    .unwrap();

    assert_eq!(*seen.borrow(), "<p>done</p>");
}

#[derive(Default)]
struct RecordingHook {
    helper: RefCell<Option<DevtoolsHelper>>,
    commits: RefCell<Vec<VNodeId>>,
}

impl DevtoolsHook for RecordingHook {
    fn init(&self, helper: DevtoolsHelper) {
        *self.helper.borrow_mut() = Some(helper);
    }

    fn on_commit(&self, _helper: &DevtoolsHelper, root: VNodeId) {
        self.commits.borrow_mut().push(root);
    }
}

/// Test that an installed devtools hook sees every commit and can inspect
/// hook state.
#[test]
fn devtools_hook_observes_commits() {
    let host = Rc::new(MemoryHost::new());
    let container = host.create_container();
    let config = RuntimeConfig::from_json(r#"{ "devtools": true }"#).unwrap();
    let rt = Runtime::with_config(host, config);
    let hook = Rc::new(RecordingHook::default());
    assert!(rt.install_devtools_hook(hook.clone()));

    let counter = FunctionType::new("Counter", |cx, _props| {
        let (count, _) = cx.use_state(7)?;
        Ok(h("b").child(count.to_string()).into())
    });
    rt.render(counter.element(), container).unwrap();
    rt.render(counter.element(), container).unwrap();

    let commits = hook.commits.borrow().clone();
    assert_eq!(commits.len(), 2);

    let helper = hook.helper.borrow().clone().unwrap();
    assert_eq!(helper.roots(), vec![commits[0]]);
    let found = helper.find_by_name(commits[0], "Counter");
    assert_eq!(found.len(), 1);
    let hooks = helper.hooks(found[0]);
    assert_eq!(hooks[0].kind, "State");
    assert_eq!(hooks[0].value, "7");

    let snapshot = helper.snapshot(commits[0]).unwrap();
    assert!(snapshot.iter().any(|node| node.name == "b"));
}

/// Test that the hook is refused when devtools are disabled.
#[test]
fn devtools_hook_requires_config() {
    let (_host, _container, rt) = setup();
    assert!(!rt.install_devtools_hook(Rc::new(RecordingHook::default())));
}

/// A host where direct text content and child nodes share one slot, as in
/// the DOM: writing text drops the children and clearing drops the text.
struct DomHost(Rc<MemoryHost>);

impl DomHost {
    fn drop_children(&self, node: HostNodeId) {
        for child in self.0.children(node) {
            self.0.remove_child(node, child);
        }
    }
}

impl HostConfig for DomHost {
    fn create_element(&self, tag: &str, props: &Props) -> HostNodeId {
        self.0.create_element(tag, props)
    }

    fn create_text(&self, text: &str) -> HostNodeId {
        self.0.create_text(text)
    }

    fn set_props(&self, node: HostNodeId, tag: &str, changes: &[PropChange]) {
        if changes.iter().any(|c| matches!(c, PropChange::Text(_))) {
            self.drop_children(node);
        }
        self.0.set_props(node, tag, changes);
    }

    fn set_text(&self, node: HostNodeId, text: &str) {
        self.0.set_text(node, text);
    }

    fn append_child(&self, parent: HostNodeId, child: HostNodeId) {
        self.0.append_child(parent, child);
    }

    fn insert_before(&self, parent: HostNodeId, child: HostNodeId, before: HostNodeId) {
        self.0.insert_before(parent, child, before);
    }

    fn remove_child(&self, parent: HostNodeId, child: HostNodeId) {
        self.0.remove_child(parent, child);
    }

    fn clear_children(&self, node: HostNodeId) {
        self.0.clear_children(node);
        self.0.reset_text_content(node);
    }

    fn reset_text_content(&self, node: HostNodeId) {
        self.drop_children(node);
        self.0.reset_text_content(node);
    }

    fn hide_element(&self, node: HostNodeId) {
        self.0.hide_element(node);
    }

    fn unhide_element(&self, node: HostNodeId) {
        self.0.unhide_element(node);
    }
}

fn dom_setup() -> (Rc<MemoryHost>, HostNodeId, Runtime) {
    let memory = Rc::new(MemoryHost::new());
    let container = memory.create_container();
    let runtime = Runtime::new(Rc::new(DomHost(memory.clone())));
    (memory, container, runtime)
}

/// Test that switching from child nodes to text content removes the
/// children before the text is written.
#[test]
fn children_replaced_by_text_content() {
    let (host, container, rt) = dom_setup();
    rt.render(h("div").child(h("span")), container).unwrap();
    let div = host.children(container)[0];
    let span = host.children(div)[0];
    host.take_ops();

    rt.render(h("div").child("hi"), container).unwrap();

    assert_eq!(
        host.take_ops(),
        [
            HostOp::RemoveChild {
                parent: div,
                child: span,
            },
            HostOp::SetProps {
                node: div,
                changes: 1,
            },
        ]
    );
    assert_eq!(host.markup(container), "<div>hi</div>");
}

/// Test that switching from text content to child nodes resets the text
/// before the first child is inserted.
#[test]
fn text_content_replaced_by_children() {
    let (host, container, rt) = dom_setup();
    rt.render(h("div").child("hi"), container).unwrap();
    host.take_ops();

    rt.render(h("div").child(h("span")), container).unwrap();

    let ops = host.take_ops();
    let reset = ops
        .iter()
        .position(|op| matches!(op, HostOp::ResetText { .. }));
    let placed = ops.iter().position(HostOp::is_placement);
    assert!(reset.is_some() && reset < placed);
    assert_eq!(
        ops.iter()
            .filter(|op| matches!(op, HostOp::ResetText { .. }))
            .count(),
        1
    );
    assert_eq!(host.markup(container), "<div><span></span></div>");
}
