//! Instance Lifecycle
//!
//! Construction, property injection and disposal of instances.
//!
//! # Create
//!
//! 1. Fill in declared defaults and pick the scope (own fork, or the
//!    parent's).
//! 2. Construct the component and call `init`. Any failure, including a
//!    panic in either or a host type inside a virtual tree, is reported as
//!    an instantiation diagnostic and a placeholder stands in for the
//!    requested type. A panicking `init` disposes what it set up first.
//! 3. Create the render computation and run it, which reconciles the
//!    initial subtree.
//! 4. Call `did_mount`.
//!
//! # Update
//!
//! The render computation is held while new properties and context are
//! applied, so the changes recorded for them only mark it dirty. It then
//! re-renders once, followed by `did_update`.
//!
//! # Dispose
//!
//! `will_unmount`, then the owned computations, then the children, then the
//! owned cells and scope, then the cleanups. Idempotent.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::capability::{Disposable, Disposer, Emitter};
use super::{Context, Instance, InstanceInner, Scope, TreeKind};
use crate::component::{
    panic_message, Component, ComponentType, Descriptor, Init, Key, Node, Placeholder, Props, Value,
};
use crate::error::{Diagnostic, Error, Result};
use crate::reactive::{ledger, Computation, ObjectId, Path, Runtime};

pub(crate) fn create(
    runtime: &Runtime,
    descriptor: Descriptor,
    parent: Option<&Instance>,
    context: Context,
    tree: TreeKind,
) -> Instance {
    let (ty, props, key) = descriptor.into_parts();
    let parts = Parts {
        runtime,
        props: ty.resolve_props(props),
        ty,
        key,
        parent,
        context,
        tree,
    };
    let id = ObjectId::new();
    let (scope, owns_scope) = parts.scope();

    let constructed = if tree == TreeKind::Virtual && parts.ty.is_host() {
        Err(format!(
            "host type `{}` cannot be used in a virtual tree; every component below a virtual root must itself be virtual",
            parts.ty.name()
        ))
    } else {
        let init = Init {
            runtime,
            owner: id,
            props: &parts.props,
            scope: &scope,
        };
        runtime.untracked(|| parts.ty.instantiate(&init))
    };

    let mut instance = match constructed {
        Ok(component) => parts.assemble(id, component, false, scope, owns_scope),
        Err(reason) => parts.placeholder(id, reason, scope, owns_scope),
    };

    if !instance.is_placeholder() {
        let initialized = runtime.untracked(|| {
            panic::catch_unwind(AssertUnwindSafe(|| instance.inner.component.init(&instance)))
        });
        if let Err(payload) = initialized {
            instance.dispose();
            let (scope, owns_scope) = parts.scope();
            let reason = panic_message(payload.as_ref());
            instance = parts.placeholder(ObjectId::new(), reason, scope, owns_scope);
        }
    }

    instance.inner.render.start();
    if !instance.is_disposed() {
        instance.inner.mounted.store(true, Ordering::SeqCst);
        runtime.untracked(|| instance.inner.component.did_mount(&instance));
    }

    tracing::trace!(
        id = %instance.id(),
        component = instance.type_name(),
        placeholder = instance.is_placeholder(),
        "instance created"
    );
    instance
}

/// Everything but the component needed to build an instance.
struct Parts<'a> {
    runtime: &'a Runtime,
    ty: ComponentType,
    props: Props,
    key: Option<Key>,
    parent: Option<&'a Instance>,
    context: Context,
    tree: TreeKind,
}

impl Parts<'_> {
    /// The instance's own fork, or its parent's scope.
    fn scope(&self) -> (Scope, bool) {
        match (self.ty.forks_in(self.tree), &self.context.scope) {
            (true, Some(scope)) => (scope.fork(), true),
            (true, None) => (Scope::root(self.runtime), true),
            (false, Some(scope)) => (scope.clone(), false),
            (false, None) => {
                if self.tree == TreeKind::Concrete && self.runtime.config().warn_unforked_root {
                    tracing::warn!(
                        component = self.ty.name(),
                        "top-level instance created without a forked scope; register its type with fork(true)"
                    );
                }
                (Scope::root(self.runtime), true)
            }
        }
    }

    /// Report `reason` and build a placeholder standing in for the type.
    fn placeholder(&self, id: ObjectId, reason: String, scope: Scope, owns_scope: bool) -> Instance {
        self.runtime.report(Diagnostic::Instantiation {
            type_name: self.ty.name().to_string(),
            reason,
        });
        self.assemble(id, Box::new(Placeholder), true, scope, owns_scope)
    }

    fn assemble(
        &self,
        id: ObjectId,
        component: Box<dyn Component>,
        placeholder: bool,
        scope: Scope,
        owns_scope: bool,
    ) -> Instance {
        let runtime = self.runtime;
        let ty = self.ty.clone();
        let inner = Arc::new_cyclic(|weak| {
            let weak = weak.clone();
            let render = Computation::owned(runtime, id, ty.name(), ty.update_mode(), move || {
                if let Some(inner) = weak.upgrade() {
                    Instance { inner }.render_pass();
                }
            });

            InstanceInner {
                id,
                runtime: runtime.clone(),
                ty,
                tree: self.tree,
                key: self.key.clone(),
                component,
                placeholder,
                scope,
                owns_scope,
                parent: self.parent.map(|p| Arc::downgrade(&p.inner)),
                props: RwLock::new(self.props.clone()),
                context: RwLock::new(self.context.clone()),
                children: RwLock::new(Vec::new()),
                render,
                watches: Mutex::new(Vec::new()),
                disposer: Disposer::default(),
                emitter: Emitter::default(),
                mounted: AtomicBool::new(false),
            }
        });
        Instance { inner }
    }
}

impl Instance {
    /// Apply new properties and context, then re-render.
    pub(crate) fn update(&self, props: Props, context: Context) {
        let render = &self.inner.render;
        {
            let _hold = render.hold();
            self.inner
                .runtime
                .untracked(|| self.inner.component.will_update(self, &props, &context.values));

            let changed_props = self.inner.props.read().changed_keys(&props);
            *self.inner.props.write() = props;

            let changed_context = self.inner.context.read().values.changed_keys(&context.values);
            *self.inner.context.write() = context;

            for name in &changed_props {
                ledger::record_change(&self.inner.runtime, self.inner.id, &Path::join("props", name));
            }
            for name in &changed_context {
                ledger::record_change(&self.inner.runtime, self.inner.id, &Path::join("context", name));
            }
        }

        self.inner.runtime.inner().scheduler.run_until_stable(render);
        self.inner
            .runtime
            .untracked(|| self.inner.component.did_update(self));
    }

    /// Replace the `children` slot, updating the instance if it changed.
    pub(crate) fn update_slot(&self, slot: &str, value: Value) {
        if self.inner.props.read().get(slot) == Some(&value) {
            return;
        }
        let mut props = self.props();
        props.insert(slot, value);
        let props = self.inner.ty.resolve_props(props);
        let context = self.inner.context.read().clone();
        self.update(props, context);
    }
}

impl Disposable for Instance {
    fn dispose(&self) {
        if !self.inner.disposer.begin() {
            return;
        }

        if self.inner.mounted.swap(false, Ordering::SeqCst) {
            self.inner
                .runtime
                .untracked(|| self.inner.component.will_unmount(self));
        }

        self.inner.render.dispose();
        let watches = std::mem::take(&mut *self.inner.watches.lock());
        for watch in &watches {
            watch.dispose();
        }

        let children = std::mem::take(&mut *self.inner.children.write());
        for child in &children {
            child.dispose();
        }

        self.inner.runtime.forget_owner(self.inner.id);
        if self.inner.owns_scope {
            self.inner.runtime.forget_owner(self.inner.scope.id());
        }
        self.inner.emitter.clear();
        self.inner.disposer.run_cleanups();

        tracing::trace!(id = %self.inner.id, component = self.type_name(), "instance disposed");
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposer.is_disposed()
    }
}

impl Runtime {
    /// Mount a concrete root. `node` must flatten to exactly one
    /// non-text descriptor.
    pub fn mount(&self, node: impl Into<Node>) -> Result<Instance> {
        mount_root(self, node.into(), TreeKind::Concrete, "mount")
    }

    /// Mount a standalone virtual root. `node` must flatten to exactly one
    /// non-text descriptor.
    pub fn mount_virtual(&self, node: impl Into<Node>) -> Result<Instance> {
        mount_root(self, node.into(), TreeKind::Virtual, "mount_virtual")
    }
}

fn mount_root(
    runtime: &Runtime,
    node: Node,
    tree: TreeKind,
    operation: &'static str,
) -> Result<Instance> {
    let mut descriptors = node.flatten();
    if descriptors.len() != 1 {
        return Err(Error::invalid(
            operation,
            format!("expected a single root descriptor, found {}", descriptors.len()),
        ));
    }
    let Some(descriptor) = descriptors.pop() else {
        return Err(Error::invalid(operation, "expected a single root descriptor"));
    };
    if descriptor.ty().is_text() {
        return Err(Error::invalid(operation, "the root cannot be a text node"));
    }

    Ok(runtime.untracked(|| create(runtime, descriptor, None, Context::default(), tree)))
}
