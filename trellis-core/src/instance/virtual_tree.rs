//! Virtual Trees
//!
//! A virtual tree is a non-visual hierarchy reconciled by the same rules as
//! the concrete one. It is either mounted on its own
//! ([`Runtime::mount_virtual`](crate::Runtime::mount_virtual)) or linked to a
//! children slot of a concrete instance, in which case a watch on that slot
//! feeds every change into the virtual root.
//!
//! Whenever a virtual subtree is reconciled, the instances from the
//! reconciled one upward are offered [`Component::child_changed`] until one
//! of them claims the change.
//!
//! [`Component::child_changed`]: crate::component::Component::child_changed

use std::sync::Arc;

use super::capability::Disposable;
use super::{lifecycle, Instance, TreeKind};
use crate::component::{ComponentType, Descriptor, CHILDREN};
use crate::error::{Error, Result};
use crate::reactive::Computation;

impl Instance {
    /// Mount a virtual root of type `ty` whose `children` follow this
    /// instance's `slot`.
    ///
    /// The root's parent is this instance, and it is disposed with it.
    pub fn link_virtual(&self, ty: &ComponentType, slot: &str) -> Result<Instance> {
        if self.is_disposed() {
            return Err(Error::invalid(
                "link_virtual",
                format!("`{}` is disposed", self.type_name()),
            ));
        }
        if self.is_virtual() {
            return Err(Error::invalid(
                "link_virtual",
                format!("`{}` is already part of a virtual tree", self.type_name()),
            ));
        }

        let slot = slot.replace(':', "_");
        let runtime = self.inner.runtime.clone();
        let initial = self.inner.props.read().get(&slot).cloned().unwrap_or_default();
        let descriptor = Descriptor::new(ty).prop(CHILDREN, initial);
        let context = self.context_for_children();
        let root = runtime.untracked(|| {
            lifecycle::create(&runtime, descriptor, Some(self), context, TreeKind::Virtual)
        });

        let host = Arc::downgrade(&self.inner);
        let linked = Arc::downgrade(&root.inner);
        let link = Computation::owned(
            &runtime,
            self.inner.id,
            format!("{} link", ty.name()),
            ty.update_mode(),
            move || {
                let (Some(host), Some(root)) = (host.upgrade(), linked.upgrade()) else {
                    return;
                };
                let host = Instance { inner: host };
                let root = Instance { inner: root };
                let value = host.prop(&slot).unwrap_or_default();
                host.inner
                    .runtime
                    .untracked(|| root.update_slot(CHILDREN, value));
            },
        );
        self.inner.watches.lock().push(link.clone());
        link.start();

        {
            let root = root.clone();
            self.on_dispose(move || root.dispose());
        }

        tracing::debug!(
            host = self.type_name(),
            root = root.type_name(),
            "linked virtual tree"
        );
        Ok(root)
    }

    /// Offer a finished reconciliation to this instance and its ancestors,
    /// stopping at the first one that claims it.
    pub(crate) fn notify_child_changed(&self) {
        let mut current = Some(self.clone());
        while let Some(instance) = current {
            let claimed = self
                .inner
                .runtime
                .untracked(|| instance.inner.component.child_changed(&instance));
            if claimed {
                return;
            }
            current = instance.parent();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Attribute, Component, Node};
    use crate::reactive::{Cell, Runtime};
    use parking_lot::Mutex;

    struct Item;
    impl Component for Item {
        fn render(&self, _this: &Instance) -> Node {
            Node::Empty
        }
    }

    #[derive(Default)]
    struct List {
        changes: Arc<Mutex<usize>>,
    }
    impl Component for List {
        fn child_changed(&self, _this: &Instance) -> bool {
            *self.changes.lock() += 1;
            true
        }
    }

    struct View {
        list: ComponentType,
        root: Arc<Mutex<Option<Instance>>>,
    }
    impl Component for View {
        fn init(&self, this: &Instance) {
            *self.root.lock() = this.link_virtual(&self.list, "items").ok();
        }
    }

    struct Parent {
        show: Cell<bool>,
        view: ComponentType,
        item: ComponentType,
    }
    impl Component for Parent {
        fn render(&self, _this: &Instance) -> Node {
            let mut items = vec![Node::from(Descriptor::new(&self.item).prop("name", "A"))];
            if self.show.get() {
                items.push(Node::from(Descriptor::new(&self.item).prop("name", "B")));
            }
            Descriptor::new(&self.view).slot("items", items).into()
        }
    }

    fn item_type() -> ComponentType {
        ComponentType::builder("Item")
            .attribute(Attribute::new("name"))
            .build_with(|_| Item)
    }

    fn names(instances: &[Instance]) -> Vec<String> {
        instances
            .iter()
            .map(|i| i.props().get("name").and_then(|v| v.as_str()).unwrap_or("").to_string())
            .collect()
    }

    #[test]
    fn linked_root_follows_the_slot() {
        let rt = Runtime::default();
        let changes = Arc::new(Mutex::new(0));
        let list = {
            let changes = changes.clone();
            ComponentType::builder("List").build_with(move |_| List {
                changes: changes.clone(),
            })
        };
        let root_slot = Arc::new(Mutex::new(None));
        let view = {
            let (list, root) = (list.clone(), root_slot.clone());
            ComponentType::builder("View").build_with(move |_| View {
                list: list.clone(),
                root: root.clone(),
            })
        };
        let show = Cell::new(&rt, true);
        let parent = {
            let (show, view, item) = (show.clone(), view.clone(), item_type());
            ComponentType::builder("Parent").fork(true).build_with(move |_| Parent {
                show: show.clone(),
                view: view.clone(),
                item: item.clone(),
            })
        };

        let app = rt.mount(Descriptor::new(&parent)).unwrap();
        let root = root_slot.lock().clone().unwrap();
        let host = app.children()[0].clone();

        assert!(root.is_virtual());
        assert_eq!(root.parent().as_ref(), Some(&host));
        assert_eq!(names(&root.children()), ["A", "B"]);
        assert!(*changes.lock() > 0);

        let first = root.children()[0].clone();
        show.set(false);
        assert_eq!(names(&root.children()), ["A"]);
        assert_eq!(root.children()[0], first);

        app.dispose();
        assert!(host.is_disposed());
        assert!(root.is_disposed());
        assert!(first.is_disposed());
    }

    #[test]
    fn transparent_children_are_spliced() {
        let rt = Runtime::default();
        let item = item_type();
        let group = ComponentType::builder("Group")
            .transparent(true)
            .build_with(|_| List::default());
        let list = ComponentType::builder("List").build_with(|_| List::default());

        let root = rt
            .mount_virtual(
                Descriptor::new(&list).children([
                    Node::from(Descriptor::new(&item).prop("name", "A")),
                    Node::from(
                        Descriptor::new(&group)
                            .child(Descriptor::new(&item).prop("name", "B"))
                            .child(Descriptor::new(&item).prop("name", "C")),
                    ),
                ]),
            )
            .unwrap();

        assert_eq!(names(&root.children()), ["A", "B", "C"]);
        assert!(root.has_children());
    }

    #[test]
    fn virtual_children_fork_their_scope() {
        let rt = Runtime::default();
        let item = item_type();
        let pinned = ComponentType::builder("Pinned").fork(false).build_with(|_| Item);
        let list = ComponentType::builder("List").build_with(|_| List::default());
        let root = rt
            .mount_virtual(
                Descriptor::new(&list)
                    .child(Descriptor::new(&item).prop("name", "A"))
                    .child(Descriptor::new(&pinned)),
            )
            .unwrap();

        let children = root.children();
        assert!(children[0].owns_scope());
        assert!(children[0].scope().parent().is_some_and(|p| p.ptr_eq(&root.scope())));
        assert!(!children[1].owns_scope());
        assert!(children[1].scope().ptr_eq(&root.scope()));
    }

    #[test]
    fn host_types_become_placeholders_in_virtual_trees() {
        let rt = Runtime::default();
        let list = ComponentType::builder("List").build_with(|_| List::default());
        let root = rt
            .mount_virtual(Descriptor::new(&list).child(Descriptor::element("div")))
            .unwrap();

        let children = root.children();
        assert_eq!(children.len(), 1);
        assert!(children[0].is_placeholder());
        assert_eq!(rt.diagnostics().len(), 1);
    }

    #[test]
    fn linking_requires_a_live_concrete_instance() {
        let rt = Runtime::default();
        let list = ComponentType::builder("List").build_with(|_| List::default());

        let virtual_root = rt.mount_virtual(Descriptor::new(&list)).unwrap();
        assert!(matches!(
            virtual_root.link_virtual(&list, "items"),
            Err(Error::InvalidArgument { .. })
        ));

        let host = rt.mount(Descriptor::element("div")).unwrap();
        host.dispose();
        assert!(matches!(
            host.link_virtual(&list, "items"),
            Err(Error::InvalidArgument { .. })
        ));
    }
}
