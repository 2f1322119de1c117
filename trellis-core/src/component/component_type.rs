//! Component Types
//!
//! A [`ComponentType`] is the per-type registration table: its name, its
//! declared attributes and events, its static options (scope forking,
//! update throttling, transparency) and the constructor that produces the
//! [`Component`] behind each instance.
//!
//! Types are defined once, with [`ComponentType::builder`], and shared by
//! every descriptor that refers to them. Two composite types are the same
//! type only if they are the same registration; host element types are
//! equal when their tags are.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use indexmap::IndexMap;

use super::attribute::{event_handler, AttrKind, Attribute};
use super::descriptor::{Node, CHILDREN};
use super::value::Props;
use crate::error::Result;
use crate::instance::{Instance, Scope, TreeKind};
use crate::reactive::{Cell, ObjectId, Runtime};
use crate::scheduler::UpdateMode;

/// Error type returned by constructors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type Constructor = Arc<dyn Fn(&Init<'_>) -> Result<Box<dyn Component>, BoxError> + Send + Sync>;

/// Behaviour behind an instance.
///
/// Every hook receives the instance it belongs to. Hooks run without any
/// runtime lock held, so they may read and write cells freely.
pub trait Component: Send + Sync {
    /// Called once after construction, before the first render.
    fn init(&self, _this: &Instance) {}

    /// Produce the instance's output. Reads made here are tracked; when
    /// any of them changes the instance re-renders.
    fn render(&self, this: &Instance) -> Node {
        this.render_children(CHILDREN, &[]).unwrap_or_default()
    }

    /// Called with the incoming properties and context before they are
    /// applied.
    fn will_update(&self, _this: &Instance, _next_props: &Props, _next_context: &Props) {}

    /// Called after an update has re-rendered the instance.
    fn did_update(&self, _this: &Instance) {}

    /// Called once the instance and its initial subtree exist.
    fn did_mount(&self, _this: &Instance) {}

    /// Called at the start of disposal.
    fn will_unmount(&self, _this: &Instance) {}

    /// Context values propagated to the instance's children.
    fn child_context(&self, _this: &Instance) -> Props {
        Props::new()
    }

    /// Called after a virtual subtree below (or at) this instance was
    /// reconciled. Returning true stops the upward walk.
    fn child_changed(&self, _this: &Instance) -> bool {
        false
    }
}

/// What a constructor gets to work with.
pub struct Init<'a> {
    pub(crate) runtime: &'a Runtime,
    pub(crate) owner: ObjectId,
    pub(crate) props: &'a Props,
    pub(crate) scope: &'a Scope,
}

impl<'a> Init<'a> {
    pub fn runtime(&self) -> &'a Runtime {
        self.runtime
    }

    /// Id of the instance being constructed.
    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    /// Initial properties, defaults applied.
    pub fn props(&self) -> &'a Props {
        self.props
    }

    /// The scope the instance will use.
    pub fn scope(&self) -> &'a Scope {
        self.scope
    }

    /// Create a cell owned by the instance; it is released on disposal.
    pub fn cell<T>(&self, key: &str, value: T) -> Result<Cell<T>>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        Cell::keyed(self.runtime, self.owner, key, value)
    }
}

enum TypeKind {
    Composite(Constructor),
    Element(Arc<str>),
    Text,
}

struct TypeInner {
    name: Arc<str>,
    kind: TypeKind,
    attributes: IndexMap<Arc<str>, Attribute>,
    aliases: IndexMap<Arc<str>, Arc<str>>,
    events: Vec<Arc<str>>,
    fork: Option<bool>,
    throttle_updates: bool,
    transparent: bool,
}

/// A registered component type. Clones share the registration.
#[derive(Clone)]
pub struct ComponentType {
    inner: Arc<TypeInner>,
}

impl ComponentType {
    pub fn builder(name: &str) -> ComponentTypeBuilder {
        ComponentTypeBuilder {
            name: Arc::from(name),
            attributes: Vec::new(),
            events: Vec::new(),
            fork: None,
            throttle_updates: true,
            transparent: false,
        }
    }

    /// Host element type for `tag`. Only valid in concrete trees.
    pub fn element(tag: &str) -> Self {
        Self::host(Arc::from(tag), TypeKind::Element(Arc::from(tag)))
    }

    /// Host text type. Only valid in concrete trees.
    pub fn text() -> Self {
        Self::host(Arc::from("#text"), TypeKind::Text)
    }

    fn host(name: Arc<str>, kind: TypeKind) -> Self {
        Self {
            inner: Arc::new(TypeInner {
                name,
                kind,
                attributes: IndexMap::new(),
                aliases: IndexMap::new(),
                events: Vec::new(),
                fork: None,
                throttle_updates: true,
                transparent: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.inner.kind {
            TypeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.inner.kind, TypeKind::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.inner.kind, TypeKind::Text)
    }

    /// Host types render to the host engine directly.
    pub fn is_host(&self) -> bool {
        !matches!(self.inner.kind, TypeKind::Composite(_))
    }

    /// Whether instances in a concrete tree fork their scope.
    pub fn forks(&self) -> bool {
        self.forks_in(TreeKind::Concrete)
    }

    /// Whether instances in `tree` fork their scope. Unless set with
    /// [`ComponentTypeBuilder::fork`], virtual instances fork and concrete
    /// ones share their parent's scope.
    pub fn forks_in(&self, tree: TreeKind) -> bool {
        self.inner.fork.unwrap_or(tree == TreeKind::Virtual)
    }

    pub fn throttles_updates(&self) -> bool {
        self.inner.throttle_updates
    }

    pub fn update_mode(&self) -> UpdateMode {
        UpdateMode::from_throttle(self.inner.throttle_updates)
    }

    pub fn is_transparent(&self) -> bool {
        self.inner.transparent
    }

    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.inner.events.iter().map(|e| &**e)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.inner.attributes.values()
    }

    /// Look up a declared attribute by name or alias.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.inner.attributes.get(self.resolve_attribute(name))
    }

    /// Map an alias to the attribute it stands for. Other names are
    /// returned unchanged.
    pub fn resolve_attribute<'a>(&'a self, name: &'a str) -> &'a str {
        self.inner.aliases.get(name).map_or(name, |n| &**n)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.inner.attributes.contains_key(name) || self.inner.aliases.contains_key(name)
    }

    /// Fill in declared defaults and check declared kinds.
    pub(crate) fn resolve_props(&self, mut props: Props) -> Props {
        for attr in self.inner.attributes.values() {
            let current = props.get(attr.name()).cloned();
            match (current, attr.default_value()) {
                (None, Some(default)) => {
                    props.insert(attr.name(), default.clone());
                }
                (Some(value), _) if !attr.value_kind().accepts(&value) => {
                    tracing::warn!(
                        component = %self.inner.name,
                        attribute = attr.name(),
                        expected = ?attr.value_kind(),
                        found = value.kind_name(),
                        "attribute value does not match its declared kind"
                    );
                }
                _ => {}
            }
        }
        props
    }

    /// Run the constructor, turning errors and panics into a reason.
    pub(crate) fn instantiate(&self, init: &Init<'_>) -> std::result::Result<Box<dyn Component>, String> {
        match &self.inner.kind {
            TypeKind::Element(_) => Ok(Box::new(HostElement)),
            TypeKind::Text => Ok(Box::new(HostText)),
            TypeKind::Composite(ctor) => {
                match panic::catch_unwind(AssertUnwindSafe(|| ctor(init))) {
                    Ok(Ok(component)) => Ok(component),
                    Ok(Err(err)) => Err(err.to_string()),
                    Err(payload) => Err(panic_message(payload.as_ref())),
                }
            }
        }
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "component panicked".to_string()
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        match (&self.inner.kind, &other.inner.kind) {
            (TypeKind::Element(a), TypeKind::Element(b)) => a == b,
            (TypeKind::Text, TypeKind::Text) => true,
            _ => Arc::ptr_eq(&self.inner, &other.inner),
        }
    }
}

impl Eq for ComponentType {}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentType")
            .field("name", &self.inner.name)
            .field("fork", &self.inner.fork)
            .field("throttle_updates", &self.inner.throttle_updates)
            .field("transparent", &self.inner.transparent)
            .finish()
    }
}

/// Registers a component type's attributes, events and options.
pub struct ComponentTypeBuilder {
    name: Arc<str>,
    attributes: Vec<Attribute>,
    events: Vec<Arc<str>>,
    fork: Option<bool>,
    throttle_updates: bool,
    transparent: bool,
}

impl ComponentTypeBuilder {
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Declare a custom event. Its handler is the `on<Event>` attribute.
    pub fn event(mut self, event: &str) -> Self {
        self.events.push(Arc::from(event));
        self
    }

    pub fn events<'e>(mut self, events: impl IntoIterator<Item = &'e str>) -> Self {
        self.events.extend(events.into_iter().map(Arc::from));
        self
    }

    /// Give every instance its own scope, forked from the parent's.
    pub fn fork(mut self, fork: bool) -> Self {
        self.fork = Some(fork);
        self
    }

    /// Coalesce rapid re-renders (the default). Turn off for components
    /// whose output must track every change, such as text inputs.
    pub fn throttle_updates(mut self, throttle: bool) -> Self {
        self.throttle_updates = throttle;
        self
    }

    /// In virtual trees, splice this instance's children into its
    /// parent's `children()` view instead of listing the instance itself.
    pub fn transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    /// Finish with a fallible constructor.
    pub fn build<C, E, F>(self, ctor: F) -> ComponentType
    where
        C: Component + 'static,
        E: Into<BoxError>,
        F: Fn(&Init<'_>) -> std::result::Result<C, E> + Send + Sync + 'static,
    {
        let ctor: Constructor = Arc::new(move |init: &Init<'_>| -> Result<Box<dyn Component>, BoxError> {
            ctor(init)
                .map(|c| Box::new(c) as Box<dyn Component>)
                .map_err(Into::into)
        });
        self.finish(TypeKind::Composite(ctor))
    }

    /// Finish with a constructor that cannot fail.
    pub fn build_with<C, F>(self, ctor: F) -> ComponentType
    where
        C: Component + 'static,
        F: Fn(&Init<'_>) -> C + Send + Sync + 'static,
    {
        self.build(move |init| Ok::<_, BoxError>(ctor(init)))
    }

    /// Finish with `C::default()` as the constructor.
    pub fn build_default<C>(self) -> ComponentType
    where
        C: Component + Default + 'static,
    {
        self.build_with(|_| C::default())
    }

    fn finish(self, kind: TypeKind) -> ComponentType {
        let mut attributes = IndexMap::new();
        let mut aliases = IndexMap::new();

        let handlers = self
            .events
            .iter()
            .map(|e| Attribute::new(&event_handler(e)).kind(AttrKind::Callback));
        for attr in self.attributes.into_iter().chain(handlers) {
            if let Some(alias) = attr.alias_name() {
                aliases.insert(Arc::from(alias), Arc::from(attr.name()));
            }
            attributes.insert(Arc::from(attr.name()), attr);
        }

        ComponentType {
            inner: Arc::new(TypeInner {
                name: self.name,
                kind,
                attributes,
                aliases,
                events: self.events,
                fork: self.fork,
                throttle_updates: self.throttle_updates,
                transparent: self.transparent,
            }),
        }
    }
}

/// Host element: renders its `children` slot.
struct HostElement;

impl Component for HostElement {}

/// Host text: a leaf.
struct HostText;

impl Component for HostText {
    fn render(&self, _this: &Instance) -> Node {
        Node::Empty
    }
}

/// Stand-in for an instance whose construction failed.
pub(crate) struct Placeholder;

impl Component for Placeholder {
    fn render(&self, _this: &Instance) -> Node {
        Node::Empty
    }
}
