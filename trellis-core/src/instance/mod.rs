//! Live Instances
//!
//! An [`Instance`] is a live object matching a descriptor: a component, its
//! current properties and context, its children, and the computations it
//! owns. This module holds the instance handle and its public surface; the
//! lifecycle manager, reconciler, virtual-tree support and snapshots live in
//! the submodules.
//!
//! # Ownership
//!
//! - A parent holds its children strongly; children link back weakly.
//! - Each instance owns one render computation, plus any watches created
//!   through [`Instance::watch`] or [`Instance::link_virtual`].
//! - Disposing an instance disposes its computations and children, releases
//!   its cells and forked scope, then runs its cleanups.

mod capability;
mod lifecycle;
mod reconcile;
mod scope;
mod snapshot;
mod virtual_tree;

pub use capability::{Disposable, Disposer, Emitter, EventEmitter, ListenerId};
pub use reconcile::reconcile;
pub use scope::Scope;
pub use snapshot::InstanceSnapshot;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::component::{
    change_handler, event_handler, Callback, Component, ComponentType, Key, Node, Props, Value,
};
use crate::error::{Diagnostic, Error, Result};
use crate::reactive::{ledger, Computation, ObjectId, Path, Runtime};

/// Which tree an instance belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeKind {
    /// Painted by the host rendering engine.
    Concrete,
    /// Non-visual hierarchy reconciled by the same rules.
    Virtual,
}

/// Ambient values handed from a parent to its children.
#[derive(Clone, Default)]
pub(crate) struct Context {
    pub(crate) scope: Option<Scope>,
    pub(crate) values: Props,
}

impl Context {
    /// Shallow comparison: same scope object, shallowly equal values.
    fn matches(&self, other: &Context) -> bool {
        let same_scope = match (&self.scope, &other.scope) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            (None, None) => true,
            _ => false,
        };
        same_scope && self.values.shallow_eq(&other.values)
    }
}

/// Cell path of an instance's reconciled children list.
const CHILDREN_LIST: &str = "children";

pub(crate) struct InstanceInner {
    id: ObjectId,
    runtime: Runtime,
    ty: ComponentType,
    tree: TreeKind,
    key: Option<Key>,
    component: Box<dyn Component>,
    placeholder: bool,
    scope: Scope,
    owns_scope: bool,
    parent: Option<Weak<InstanceInner>>,
    props: RwLock<Props>,
    context: RwLock<Context>,
    children: RwLock<Vec<Instance>>,
    render: Computation,
    watches: Mutex<Vec<Computation>>,
    disposer: Disposer,
    emitter: Emitter,
    mounted: AtomicBool,
}

/// Handle to a live instance. Clones refer to the same instance.
#[derive(Clone)]
pub struct Instance {
    inner: Arc<InstanceInner>,
}

impl Instance {
    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    pub fn ty(&self) -> &ComponentType {
        &self.inner.ty
    }

    pub fn type_name(&self) -> &str {
        self.inner.ty.name()
    }

    pub fn key(&self) -> Option<&str> {
        self.inner.key.as_deref()
    }

    pub fn tree(&self) -> TreeKind {
        self.inner.tree
    }

    pub fn is_virtual(&self) -> bool {
        self.inner.tree == TreeKind::Virtual
    }

    /// Whether construction failed and a placeholder stands in.
    pub fn is_placeholder(&self) -> bool {
        self.inner.placeholder
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::SeqCst)
    }

    /// Current properties. Not tracked.
    pub fn props(&self) -> Props {
        self.inner.props.read().clone()
    }

    /// Read a property, recording a dependency on `props.<name>`.
    pub fn prop(&self, name: &str) -> Option<Value> {
        ledger::record_event(&self.inner.runtime, self.inner.id, &Path::join("props", name));
        self.inner.props.read().get(name).cloned()
    }

    /// Read a declared attribute (or alias), falling back to its default.
    pub fn attr(&self, name: &str) -> Value {
        let name = self.inner.ty.resolve_attribute(name);
        self.prop(name)
            .or_else(|| {
                self.inner
                    .ty
                    .attribute(name)
                    .and_then(|attr| attr.default_value().cloned())
            })
            .unwrap_or_default()
    }

    /// Write a two-way bound attribute through its `on<Name>Change`
    /// callback. Without one the write is dropped and reported.
    pub fn set_attr(&self, name: &str, value: impl Into<Value>) {
        let name = self.inner.ty.resolve_attribute(name);
        let handler = change_handler(name);
        let callback = self
            .inner
            .props
            .read()
            .get(&handler)
            .and_then(Value::as_callback)
            .cloned();

        match callback {
            Some(callback) => callback.call(&[value.into()]),
            None => self.inner.runtime.report(Diagnostic::MissingBindingTarget {
                component: self.type_name().to_string(),
                attribute: name.to_string(),
                handler,
            }),
        }
    }

    /// Read a context value, recording a dependency on `context.<key>`.
    pub fn context_value(&self, key: &str) -> Option<Value> {
        ledger::record_event(&self.inner.runtime, self.inner.id, &Path::join("context", key));
        self.inner.context.read().values.get(key).cloned()
    }

    /// Context values received from the parent. Not tracked.
    pub fn context(&self) -> Props {
        self.inner.context.read().values.clone()
    }

    /// The scope this instance reads and writes: its own fork, or the one
    /// shared with its parent.
    pub fn scope(&self) -> Scope {
        self.inner.scope.clone()
    }

    pub fn owns_scope(&self) -> bool {
        self.inner.owns_scope
    }

    pub fn parent(&self) -> Option<Instance> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Instance { inner })
    }

    /// The reconciled children, recording a dependency on them.
    ///
    /// In a virtual tree, transparent children are replaced by their own
    /// children.
    pub fn children(&self) -> Vec<Instance> {
        ledger::record_event(&self.inner.runtime, self.inner.id, &Path::segment(CHILDREN_LIST));
        let items = self.inner.children.read().clone();
        if !self.is_virtual() || !items.iter().any(|item| item.ty().is_transparent()) {
            return items;
        }

        let mut spliced = Vec::with_capacity(items.len());
        for item in items {
            if item.ty().is_transparent() {
                spliced.extend(item.children());
            } else {
                spliced.push(item);
            }
        }
        spliced
    }

    pub fn has_children(&self) -> bool {
        !self.children().is_empty()
    }

    /// Render a children slot, recording a dependency on `props.<name>`.
    ///
    /// `:` in `name` is read as `_`. A slot holding a render function is
    /// applied to `args`; an empty slot renders nothing.
    pub fn render_children(&self, name: &str, args: &[Value]) -> Result<Node> {
        let name = name.replace(':', "_");
        match self.prop(&name) {
            None | Some(Value::Null) => Ok(Node::Empty),
            Some(Value::Nodes(nodes)) => Ok(Node::List(nodes.to_vec())),
            Some(Value::Render(render)) => Ok(render.call(args)),
            Some(Value::Str(text)) => Ok(Node::Text(text)),
            Some(other) => Err(Error::invalid(
                "render_children",
                format!("slot `{name}` holds a {} value, not children", other.kind_name()),
            )),
        }
    }

    /// Properties that are not declared attributes of this type, with
    /// `prefix` stripped from names that start with it.
    pub fn undeclared_attributes(&self, prefix: &str) -> Props {
        ledger::record_event(&self.inner.runtime, self.inner.id, &Path::segment("props"));
        let props = self.inner.props.read();
        let undeclared: Props = props
            .iter()
            .filter(|(name, _)| !self.inner.ty.is_declared(name))
            .map(|(name, value)| {
                let name = match name.strip_prefix(prefix) {
                    Some(stripped) if !prefix.is_empty() => stripped,
                    _ => name,
                };
                (name, value.clone())
            })
            .collect();
        undeclared
    }

    /// Run `callback(new, old)` whenever the tracked result of `getter`
    /// changes. The callback itself is not tracked.
    ///
    /// The watch is disposed with the instance.
    pub fn watch<T, G, C>(&self, getter: G, callback: C) -> Result<Computation>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
        G: Fn() -> T + Send + Sync + 'static,
        C: Fn(&T, &T) + Send + Sync + 'static,
    {
        if self.is_disposed() {
            return Err(Error::invalid(
                "watch",
                format!("`{}` is disposed", self.type_name()),
            ));
        }

        let runtime = self.inner.runtime.clone();
        let previous: Mutex<Option<T>> = Mutex::new(None);
        let watch = Computation::owned(
            &self.inner.runtime,
            self.inner.id,
            format!("{} watch", self.type_name()),
            self.inner.ty.update_mode(),
            move || {
                let value = getter();
                let old = previous.lock().replace(value.clone());
                if let Some(old) = old {
                    if old != value {
                        runtime.untracked(|| callback(&value, &old));
                    }
                }
            },
        );

        self.inner.watches.lock().push(watch.clone());
        watch.start();
        Ok(watch)
    }

    /// Mark the render computation dirty and hand it to the scheduler.
    pub fn force_update(&self) {
        self.inner.render.invalidate();
    }

    /// Completed renders, the initial one included.
    pub fn render_count(&self) -> u64 {
        self.inner.render.run_count()
    }

    /// Register a cleanup to run when the instance is disposed.
    pub fn on_dispose(&self, cleanup: impl FnOnce() + Send + 'static) {
        self.inner.disposer.on_dispose(cleanup);
    }

    fn render_pass(&self) {
        let node = self.inner.component.render(self);
        self.inner.runtime.untracked(|| self.reconcile_children(node));
    }

    fn reconcile_children(&self, node: Node) {
        let existing = self.inner.children.read().clone();
        if let Err(err) = reconcile(&existing, node, self) {
            tracing::error!(component = self.type_name(), %err, "cannot reconcile children");
        }
    }

    /// Make `next` the child list. Former children missing from it are
    /// disposed.
    fn adopt_children(&self, next: Vec<Instance>) {
        let previous = std::mem::replace(&mut *self.inner.children.write(), next.clone());
        let changed = next.len() != previous.len() || next.iter().zip(&previous).any(|(a, b)| a != b);
        for orphan in previous.iter().filter(|p| !p.is_disposed() && !next.contains(p)) {
            orphan.dispose();
        }

        if changed {
            ledger::record_change(&self.inner.runtime, self.inner.id, &Path::segment(CHILDREN_LIST));
        }
        if self.is_virtual() {
            self.notify_child_changed();
        }
    }

    fn context_for_children(&self) -> Context {
        let values = self
            .inner
            .runtime
            .untracked(|| self.inner.component.child_context(self));
        Context {
            scope: Some(self.inner.scope.clone()),
            values,
        }
    }

    fn props_equal(&self, props: &Props) -> bool {
        self.inner.props.read().shallow_eq(props)
    }

    fn context_matches(&self, context: &Context) -> bool {
        self.inner.context.read().matches(context)
    }
}

impl EventEmitter for Instance {
    fn on(&self, event: &str, listener: Callback) -> ListenerId {
        self.inner.emitter.on(event, listener)
    }

    fn off(&self, listener: ListenerId) -> bool {
        self.inner.emitter.off(listener)
    }

    /// Invoke the `on<Event>` handler property, then the listeners.
    fn trigger(&self, event: &str, args: &[Value]) {
        if event.is_empty() {
            return;
        }

        let handler_name = event_handler(event);
        let handler = self.inner.props.read().get(&handler_name).cloned();
        match handler {
            Some(Value::Callback(callback)) => callback.call(args),
            None | Some(Value::Null) => {}
            Some(other) => tracing::warn!(
                component = self.type_name(),
                handler = %handler_name,
                found = other.kind_name(),
                "ignoring non-callback event handler"
            ),
        }

        self.inner.emitter.trigger(event, args);
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Instance {}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.inner.id)
            .field("type", &self.type_name())
            .field("key", &self.key())
            .field("tree", &self.inner.tree)
            .field("placeholder", &self.inner.placeholder)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Attribute, Descriptor};
    use std::sync::atomic::AtomicUsize;

    struct Plain;
    impl Component for Plain {}

    fn field_type() -> ComponentType {
        ComponentType::builder("Field")
            .fork(true)
            .attribute(Attribute::new("value").default("").alias("text"))
            .attribute(Attribute::new("label"))
            .events(["commit"])
            .build_with(|_| Plain)
    }

    #[test]
    fn attr_resolves_aliases_and_defaults() {
        let rt = Runtime::default();
        let ty = field_type();
        let field = rt.mount(Descriptor::new(&ty).prop("label", "Name")).unwrap();

        assert_eq!(field.attr("value"), Value::from(""));
        assert_eq!(field.attr("text"), Value::from(""));
        assert_eq!(field.attr("label"), Value::from("Name"));
        assert_eq!(field.attr("unknown"), Value::Null);
    }

    #[test]
    fn set_attr_calls_the_change_handler() {
        let rt = Runtime::default();
        let written = Arc::new(Mutex::new(Vec::new()));
        let handler = {
            let written = written.clone();
            Callback::new(move |args| written.lock().push(args[0].clone()))
        };
        let field = rt
            .mount(Descriptor::new(&field_type()).prop("onValueChange", handler))
            .unwrap();

        field.set_attr("text", "Dave");
        assert_eq!(*written.lock(), vec![Value::from("Dave")]);
        assert!(rt.diagnostics().is_empty());
    }

    #[test]
    fn set_attr_without_handler_is_reported() {
        let rt = Runtime::default();
        let field = rt.mount(Descriptor::new(&field_type())).unwrap();

        field.set_attr("value", "Dave");
        assert_eq!(field.attr("value"), Value::from(""));
        assert_eq!(
            rt.diagnostics(),
            vec![Diagnostic::MissingBindingTarget {
                component: "Field".into(),
                attribute: "value".into(),
                handler: "onValueChange".into(),
            }]
        );
    }

    #[test]
    fn undeclared_attributes_strip_the_prefix() {
        let rt = Runtime::default();
        let field = rt
            .mount(
                Descriptor::new(&field_type())
                    .prop("label", "Name")
                    .prop("input-id", "name")
                    .prop("style", "bold"),
            )
            .unwrap();

        let rest = field.undeclared_attributes("input-");
        assert_eq!(rest.keys().collect::<Vec<_>>(), ["id", "style"]);
        assert_eq!(rest.get("id"), Some(&Value::from("name")));
    }

    #[test]
    fn trigger_runs_handler_then_listeners() {
        let rt = Runtime::default();
        let order = Arc::new(Mutex::new(Vec::new()));
        let handler = {
            let order = order.clone();
            Callback::new(move |_| order.lock().push("prop"))
        };
        let field = rt
            .mount(Descriptor::new(&field_type()).prop("onCommit", handler))
            .unwrap();
        {
            let order = order.clone();
            field.on("commit", Callback::new(move |_| order.lock().push("listener")));
        }

        field.trigger("commit", &[]);
        field.trigger("", &[]);
        assert_eq!(*order.lock(), ["prop", "listener"]);
    }

    #[test]
    fn non_callback_handler_is_ignored() {
        let rt = Runtime::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let field = rt
            .mount(Descriptor::new(&field_type()).prop("onCommit", "not a function"))
            .unwrap();
        {
            let calls = calls.clone();
            field.on(
                "commit",
                Callback::new(move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        field.trigger("commit", &[]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn render_children_rejects_non_children_values() {
        let rt = Runtime::default();
        let field = rt
            .mount(Descriptor::new(&field_type()).prop("footer", 3))
            .unwrap();

        assert!(matches!(
            field.render_children("footer", &[]),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(field.render_children("header", &[]), Ok(Node::Empty)));
    }

    #[test]
    fn watch_fires_on_change_only() {
        let rt = Runtime::default();
        let field = rt.mount(Descriptor::new(&field_type())).unwrap();
        let count = crate::reactive::Cell::new(&rt, 1);
        let seen = Arc::new(Mutex::new(Vec::new()));

        {
            let (count, seen) = (count.clone(), seen.clone());
            field
                .watch(move || count.get() % 2, move |new, old| seen.lock().push((*new, *old)))
                .unwrap();
        }

        count.set(3);
        count.set(4);
        rt.drain_pending_updates();
        assert_eq!(*seen.lock(), vec![(0, 1)]);

        field.dispose();
        count.set(5);
        rt.drain_pending_updates();
        assert_eq!(seen.lock().len(), 1);
        assert!(field.watch(|| 0, |_, _| {}).is_err());
    }
}
