//! Element Descriptions
//!
//! Application code describes what it wants on screen as a tree of
//! [`Child`] values. Descriptions are immutable and cheap to clone: props live
//! behind an `Rc`, so the reconciler can tell whether a node received new
//! props by pointer comparison alone.
//!
//! # Component kinds
//!
//! [`ElementType`] is a closed set. Function and class components are
//! identified by the allocation of their definition, which is why they are
//! created once (typically in a `thread_local!` or a `static` `OnceCell`) and
//! cloned into elements, never re-created per render.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::component::{ClassHandle, Component};
use crate::error::Throw;
use crate::hooks::RenderCx;
use crate::host::HostNodeId;
use crate::thenable::{Promise, PromiseState};
use crate::value::{format_number, Value};

/// Stable identity of an element within its sibling list.
pub type Key = Rc<str>;

/// What render functions produce.
pub type RenderResult = Result<Child, Throw>;

// ----------------------------------------------------------------------------
// Children
// ----------------------------------------------------------------------------

/// A child description.
#[derive(Clone, Default)]
pub enum Child {
    /// Renders nothing (`null`, `undefined`, booleans).
    #[default]
    Empty,
    Text(Rc<str>),
    Number(f64),
    Element(Element),
    List(Rc<[Child]>),
    Portal(Portal),
}

impl Child {
    pub fn text(text: impl Into<Rc<str>>) -> Self {
        Child::Text(text.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Child::Empty => true,
            Child::List(items) => items.iter().all(Child::is_empty),
            _ => false,
        }
    }

    /// Text content for text and number children.
    pub fn text_content(&self) -> Option<String> {
        match self {
            Child::Text(text) => Some(text.to_string()),
            Child::Number(n) => Some(format_number(*n)),
            _ => None,
        }
    }

    pub(crate) fn key(&self) -> Option<&Key> {
        match self {
            Child::Element(el) => el.key.as_ref(),
            Child::Portal(portal) => portal.key.as_ref(),
            _ => None,
        }
    }

    /// Shallow identity used by memo comparisons.
    pub(crate) fn shallow_same(&self, other: &Child) -> bool {
        match (self, other) {
            (Child::Empty, Child::Empty) => true,
            (Child::Text(a), Child::Text(b)) => a == b,
            (Child::Number(a), Child::Number(b)) => {
                Value::Number(*a).is_same(&Value::Number(*b))
            }
            (Child::Element(a), Child::Element(b)) => {
                Rc::ptr_eq(&a.props, &b.props)
                    && a.key == b.key
                    && a.element_type.same_as(&b.element_type)
            }
            (Child::List(a), Child::List(b)) => Rc::ptr_eq(a, b),
            (Child::Portal(a), Child::Portal(b)) => Rc::ptr_eq(&a.props, &b.props),
            _ => false,
        }
    }
}

impl fmt::Debug for Child {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Child::Empty => f.write_str("Empty"),
            Child::Text(text) => write!(f, "Text({text:?})"),
            Child::Number(n) => write!(f, "Number({})", format_number(*n)),
            Child::Element(el) => el.fmt(f),
            Child::List(items) => f.debug_list().entries(items.iter()).finish(),
            Child::Portal(portal) => write!(f, "Portal({:?})", portal.container),
        }
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(Rc::from(text))
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(Rc::from(text))
    }
}

impl From<f64> for Child {
    fn from(n: f64) -> Self {
        Child::Number(n)
    }
}

impl From<i32> for Child {
    fn from(n: i32) -> Self {
        Child::Number(n.into())
    }
}

impl From<Element> for Child {
    fn from(el: Element) -> Self {
        Child::Element(el)
    }
}

impl From<ElementBuilder> for Child {
    fn from(builder: ElementBuilder) -> Self {
        Child::Element(builder.build())
    }
}

impl From<Vec<Child>> for Child {
    fn from(items: Vec<Child>) -> Self {
        Child::List(items.into())
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(child: Option<T>) -> Self {
        child.map(Into::into).unwrap_or_default()
    }
}

// ----------------------------------------------------------------------------
// Props
// ----------------------------------------------------------------------------

/// Attribute bag plus the `children` slot.
#[derive(Clone, Default)]
pub struct Props {
    attrs: IndexMap<Rc<str>, Value>,
    children: Child,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_children(children: Child) -> Self {
        Self {
            attrs: IndexMap::new(),
            children,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    /// Attribute value, `Undefined` when absent.
    pub fn value(&self, name: &str) -> Value {
        self.attrs.get(name).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, name: impl Into<Rc<str>>, value: impl Into<Value>) {
        self.attrs.insert(name.into(), value.into());
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attrs.iter().map(|(k, v)| (&**k, v))
    }

    pub fn children(&self) -> &Child {
        &self.children
    }

    pub fn set_children(&mut self, children: impl Into<Child>) {
        self.children = children.into();
    }

    /// Every attribute and the children slot are the same by identity.
    pub fn shallow_equal(&self, other: &Props) -> bool {
        self.attrs.len() == other.attrs.len()
            && self
                .attrs
                .iter()
                .all(|(k, v)| other.attrs.get(k).is_some_and(|o| o.is_same(v)))
            && self.children.shallow_same(&other.children)
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in &self.attrs {
            map.entry(k, v);
        }
        if !matches!(self.children, Child::Empty) {
            map.entry(&"children", &self.children);
        }
        map.finish()
    }
}

// ----------------------------------------------------------------------------
// Refs
// ----------------------------------------------------------------------------

/// A mutable box whose `current` the runtime fills in.
#[derive(Clone, Default)]
pub struct RefObject(Rc<RefCell<Value>>);

impl RefObject {
    pub fn new(initial: impl Into<Value>) -> Self {
        Self(Rc::new(RefCell::new(initial.into())))
    }

    pub fn current(&self) -> Value {
        self.0.borrow().clone()
    }

    pub fn set_current(&self, value: impl Into<Value>) {
        *self.0.borrow_mut() = value.into();
    }

    pub fn ptr_eq(&self, other: &RefObject) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for RefObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefObject").field(&*self.0.borrow()).finish()
    }
}

/// Create an object ref holding `null`.
pub fn create_ref() -> RefObject {
    RefObject::new(Value::Null)
}

/// A ref attached to an element.
#[derive(Clone)]
pub enum Ref {
    Callback(Rc<dyn Fn(Option<Value>)>),
    Object(RefObject),
}

impl Ref {
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(Option<Value>) + 'static,
    {
        Ref::Callback(Rc::new(f))
    }

    pub(crate) fn attach(&self, value: Value) {
        match self {
            Ref::Callback(f) => f(Some(value)),
            Ref::Object(obj) => obj.set_current(value),
        }
    }

    pub(crate) fn detach(&self) {
        match self {
            Ref::Callback(f) => f(None),
            Ref::Object(obj) => obj.set_current(Value::Null),
        }
    }

    pub fn same_as(&self, other: &Ref) -> bool {
        match (self, other) {
            (Ref::Callback(a), Ref::Callback(b)) => Rc::ptr_eq(a, b),
            (Ref::Object(a), Ref::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<RefObject> for Ref {
    fn from(obj: RefObject) -> Self {
        Ref::Object(obj)
    }
}

pub(crate) fn ref_changed(old: Option<&Ref>, new: Option<&Ref>) -> bool {
    match (old, new) {
        (None, None) => false,
        (Some(a), Some(b)) => !a.same_as(b),
        _ => true,
    }
}

// ----------------------------------------------------------------------------
// Component definitions
// ----------------------------------------------------------------------------

type FunctionRender = dyn Fn(&mut RenderCx<'_>, &Props) -> RenderResult;
type ForwardRefRender = dyn Fn(&mut RenderCx<'_>, &Props, Option<&Ref>) -> RenderResult;
type ClassConstructor = dyn Fn(&Props, ClassHandle) -> Box<dyn Component>;
type PropsCompare = dyn Fn(&Props, &Props) -> bool;

pub struct FunctionDef {
    name: Rc<str>,
    render: Box<FunctionRender>,
}

/// A function component.
#[derive(Clone)]
pub struct FunctionType(Rc<FunctionDef>);

impl FunctionType {
    pub fn new<F>(name: &str, render: F) -> Self
    where
        F: Fn(&mut RenderCx<'_>, &Props) -> RenderResult + 'static,
    {
        Self(Rc::new(FunctionDef {
            name: Rc::from(name),
            render: Box::new(render),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn element(&self) -> ElementBuilder {
        Element::new(ElementType::Function(self.clone()))
    }

    pub(crate) fn call(&self, cx: &mut RenderCx<'_>, props: &Props) -> RenderResult {
        (self.0.render)(cx, props)
    }
}

pub struct ForwardRefDef {
    name: Rc<str>,
    render: Box<ForwardRefRender>,
}

/// A function component that receives the ref of its element.
#[derive(Clone)]
pub struct ForwardRefType(Rc<ForwardRefDef>);

impl ForwardRefType {
    pub fn new<F>(name: &str, render: F) -> Self
    where
        F: Fn(&mut RenderCx<'_>, &Props, Option<&Ref>) -> RenderResult + 'static,
    {
        Self(Rc::new(ForwardRefDef {
            name: Rc::from(name),
            render: Box::new(render),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn element(&self) -> ElementBuilder {
        Element::new(ElementType::ForwardRef(self.clone()))
    }

    pub(crate) fn call(
        &self,
        cx: &mut RenderCx<'_>,
        props: &Props,
        ref_: Option<&Ref>,
    ) -> RenderResult {
        (self.0.render)(cx, props, ref_)
    }
}

pub struct ClassDef {
    name: Rc<str>,
    construct: Box<ClassConstructor>,
}

/// A class component: a constructor for [`Component`] instances.
#[derive(Clone)]
pub struct ClassType(Rc<ClassDef>);

impl ClassType {
    pub fn new<F>(name: &str, construct: F) -> Self
    where
        F: Fn(&Props, ClassHandle) -> Box<dyn Component> + 'static,
    {
        Self(Rc::new(ClassDef {
            name: Rc::from(name),
            construct: Box::new(construct),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn element(&self) -> ElementBuilder {
        Element::new(ElementType::Class(self.clone()))
    }

    pub(crate) fn construct(&self, props: &Props, handle: ClassHandle) -> Box<dyn Component> {
        (self.0.construct)(props, handle)
    }
}

pub struct MemoDef {
    inner: ElementType,
    compare: Option<Box<PropsCompare>>,
}

/// Wraps a component so it skips re-rendering when its props compare equal.
#[derive(Clone)]
pub struct MemoType(Rc<MemoDef>);

impl MemoType {
    /// Memoize with shallow prop identity.
    pub fn new(inner: ElementType) -> Self {
        Self(Rc::new(MemoDef {
            inner,
            compare: None,
        }))
    }

    /// Memoize with a custom "props are equal" predicate.
    pub fn with_compare<F>(inner: ElementType, compare: F) -> Self
    where
        F: Fn(&Props, &Props) -> bool + 'static,
    {
        Self(Rc::new(MemoDef {
            inner,
            compare: Some(Box::new(compare)),
        }))
    }

    pub fn element(&self) -> ElementBuilder {
        Element::new(ElementType::Memo(self.clone()))
    }

    pub(crate) fn inner(&self) -> &ElementType {
        &self.0.inner
    }

    pub(crate) fn props_equal(&self, old: &Props, new: &Props) -> bool {
        match &self.0.compare {
            Some(compare) => compare(old, new),
            None => old.shallow_equal(new),
        }
    }
}

#[derive(Clone)]
pub(crate) enum LazyStatus {
    Uninitialized,
    Pending(Promise),
    Resolved(ElementType),
    Rejected(Value),
}

pub struct LazyDef {
    loader: Box<dyn Fn() -> Promise>,
    status: RefCell<LazyStatus>,
}

/// A component whose definition is loaded on first render.
///
/// The loader's promise must fulfil with `Value::object(ElementType)`.
#[derive(Clone)]
pub struct LazyType(Rc<LazyDef>);

impl LazyType {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Promise + 'static,
    {
        Self(Rc::new(LazyDef {
            loader: Box::new(loader),
            status: RefCell::new(LazyStatus::Uninitialized),
        }))
    }

    pub fn element(&self) -> ElementBuilder {
        Element::new(ElementType::Lazy(self.clone()))
    }

    pub(crate) fn ptr_eq(&self, other: &LazyType) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The loaded component, or the thrown value to unwind with.
    pub(crate) fn resolve(&self) -> Result<ElementType, Throw> {
        let status = self.0.status.borrow().clone();
        match status {
            LazyStatus::Resolved(ty) => Ok(ty),
            LazyStatus::Rejected(reason) => Err(Throw::Error(reason)),
            LazyStatus::Pending(promise) => Err(Throw::Suspend(promise)),
            LazyStatus::Uninitialized => {
                let promise = (self.0.loader)();
                *self.0.status.borrow_mut() = LazyStatus::Pending(promise.clone());

                let weak: Weak<LazyDef> = Rc::downgrade(&self.0);
                promise.then(move |state| {
                    let Some(def) = weak.upgrade() else { return };
                    let next = match state {
                        PromiseState::Fulfilled(value) => match value.downcast_ref::<ElementType>() {
                            Some(ty) => LazyStatus::Resolved(ty.clone()),
                            None => LazyStatus::Rejected(Value::from(
                                "lazy loader did not resolve to a component",
                            )),
                        },
                        PromiseState::Rejected(reason) => LazyStatus::Rejected(reason.clone()),
                        PromiseState::Pending => return,
                    };
                    *def.status.borrow_mut() = next;
                });

                // The loader may have settled synchronously.
                match self.0.status.borrow().clone() {
                    LazyStatus::Resolved(ty) => Ok(ty),
                    LazyStatus::Rejected(reason) => Err(Throw::Error(reason)),
                    _ => Err(Throw::Suspend(promise)),
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Context
// ----------------------------------------------------------------------------

/// Unique identifier for a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

pub struct ContextDef {
    id: ContextId,
    default: Value,
    current: RefCell<Value>,
}

/// A value made available to a subtree by a provider.
#[derive(Clone)]
pub struct Context(Rc<ContextDef>);

/// Create a context whose consumers see `default` outside any provider.
pub fn create_context(default: impl Into<Value>) -> Context {
    let default = default.into();
    Context(Rc::new(ContextDef {
        id: ContextId::new(),
        current: RefCell::new(default.clone()),
        default,
    }))
}

impl Context {
    pub fn id(&self) -> ContextId {
        self.0.id
    }

    pub fn default_value(&self) -> Value {
        self.0.default.clone()
    }

    /// The value visible at the current point of the build pass.
    pub(crate) fn current(&self) -> Value {
        self.0.current.borrow().clone()
    }

    /// Replace the current value, returning the previous one.
    pub(crate) fn replace_current(&self, value: Value) -> Value {
        std::mem::replace(&mut *self.0.current.borrow_mut(), value)
    }

    pub fn provider(&self, value: impl Into<Value>) -> ElementBuilder {
        Element::new(ElementType::Provider(self.clone())).prop("value", value)
    }

    /// A consumer rendering `render(current value)`.
    pub fn consumer<F>(&self, render: F) -> ElementBuilder
    where
        F: Fn(&Value) -> Child + 'static,
    {
        let render: Rc<dyn Fn(&Value) -> Child> = Rc::new(render);
        Element::new(ElementType::Consumer(self.clone()))
            .prop("render", Value::object(ConsumerRender(render)))
    }

    pub(crate) fn ptr_eq(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

pub(crate) struct ConsumerRender(pub(crate) Rc<dyn Fn(&Value) -> Child>);

// ----------------------------------------------------------------------------
// Element types
// ----------------------------------------------------------------------------

/// The kind of thing an element renders.
#[derive(Clone)]
pub enum ElementType {
    Host(Rc<str>),
    Function(FunctionType),
    Class(ClassType),
    Fragment,
    Provider(Context),
    Consumer(Context),
    ForwardRef(ForwardRefType),
    Memo(MemoType),
    Lazy(LazyType),
    Suspense,
}

impl ElementType {
    /// Type identity: host tags by name, everything else by definition.
    pub fn same_as(&self, other: &ElementType) -> bool {
        match (self, other) {
            (ElementType::Host(a), ElementType::Host(b)) => a == b,
            (ElementType::Function(a), ElementType::Function(b)) => Rc::ptr_eq(&a.0, &b.0),
            (ElementType::Class(a), ElementType::Class(b)) => Rc::ptr_eq(&a.0, &b.0),
            (ElementType::Fragment, ElementType::Fragment) => true,
            (ElementType::Provider(a), ElementType::Provider(b)) => a.ptr_eq(b),
            (ElementType::Consumer(a), ElementType::Consumer(b)) => a.ptr_eq(b),
            (ElementType::ForwardRef(a), ElementType::ForwardRef(b)) => Rc::ptr_eq(&a.0, &b.0),
            (ElementType::Memo(a), ElementType::Memo(b)) => Rc::ptr_eq(&a.0, &b.0),
            (ElementType::Lazy(a), ElementType::Lazy(b)) => a.ptr_eq(b),
            (ElementType::Suspense, ElementType::Suspense) => true,
            _ => false,
        }
    }

    /// Human readable name for diagnostics.
    pub fn name(&self) -> String {
        match self {
            ElementType::Host(tag) => tag.to_string(),
            ElementType::Function(f) => f.name().to_string(),
            ElementType::Class(c) => c.name().to_string(),
            ElementType::Fragment => "Fragment".to_string(),
            ElementType::Provider(_) => "Context.Provider".to_string(),
            ElementType::Consumer(_) => "Context.Consumer".to_string(),
            ElementType::ForwardRef(f) => format!("ForwardRef({})", f.name()),
            ElementType::Memo(m) => format!("Memo({})", m.inner().name()),
            ElementType::Lazy(_) => "Lazy".to_string(),
            ElementType::Suspense => "Suspense".to_string(),
        }
    }
}

impl fmt::Debug for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

// ----------------------------------------------------------------------------
// Elements
// ----------------------------------------------------------------------------

/// An immutable element description.
#[derive(Clone)]
pub struct Element {
    pub(crate) element_type: ElementType,
    pub(crate) key: Option<Key>,
    pub(crate) props: Rc<Props>,
    pub(crate) ref_: Option<Ref>,
}

impl Element {
    pub fn new(element_type: ElementType) -> ElementBuilder {
        ElementBuilder {
            element_type,
            key: None,
            props: Props::new(),
            ref_: None,
        }
    }

    pub fn element_type(&self) -> &ElementType {
        &self.element_type
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn props(&self) -> &Rc<Props> {
        &self.props
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("type", &self.element_type)
            .field("key", &self.key)
            .field("props", &self.props)
            .finish()
    }
}

/// Host element shorthand: `h("div")`.
pub fn h(tag: &str) -> ElementBuilder {
    Element::new(ElementType::Host(Rc::from(tag)))
}

pub fn fragment() -> ElementBuilder {
    Element::new(ElementType::Fragment)
}

/// A Suspense boundary showing `fallback` while a descendant is pending.
pub fn suspense(fallback: impl Into<Child>) -> ElementBuilder {
    let fallback: Child = fallback.into();
    Element::new(ElementType::Suspense).prop("fallback", Value::object(fallback))
}

/// Incrementally builds an [`Element`].
pub struct ElementBuilder {
    element_type: ElementType,
    key: Option<Key>,
    props: Props,
    ref_: Option<Ref>,
}

impl ElementBuilder {
    pub fn key(mut self, key: impl fmt::Display) -> Self {
        self.key = Some(Rc::from(key.to_string()));
        self
    }

    pub fn prop(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.props.set(name, value);
        self
    }

    /// Append a child.
    pub fn child(mut self, child: impl Into<Child>) -> Self {
        let child = child.into();
        self.props.children = match std::mem::take(&mut self.props.children) {
            Child::Empty => child,
            Child::List(items) => {
                let mut items = items.to_vec();
                items.push(child);
                Child::List(items.into())
            }
            single => Child::List(vec![single, child].into()),
        };
        self
    }

    /// Replace the children with a list.
    pub fn children<I, C>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Child>,
    {
        let items: Vec<Child> = children.into_iter().map(Into::into).collect();
        self.props.children = Child::List(items.into());
        self
    }

    pub fn ref_(mut self, ref_: impl Into<Ref>) -> Self {
        self.ref_ = Some(ref_.into());
        self
    }

    pub fn build(self) -> Element {
        Element {
            element_type: self.element_type,
            key: self.key,
            props: Rc::new(self.props),
            ref_: self.ref_,
        }
    }
}

impl From<ElementBuilder> for Element {
    fn from(builder: ElementBuilder) -> Self {
        builder.build()
    }
}

// ----------------------------------------------------------------------------
// Portals
// ----------------------------------------------------------------------------

/// Children rendered into a host node outside the parent's host subtree.
#[derive(Clone)]
pub struct Portal {
    pub(crate) container: HostNodeId,
    pub(crate) key: Option<Key>,
    pub(crate) props: Rc<Props>,
}

pub fn create_portal(children: impl Into<Child>, container: HostNodeId, key: Option<&str>) -> Child {
    Child::Portal(Portal {
        container,
        key: key.map(Rc::from),
        props: Rc::new(Props::with_children(children.into())),
    })
}
