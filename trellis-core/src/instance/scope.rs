//! Scope
//!
//! A scope is a hierarchical key-value context passed from parent to child
//! instances without threading it through properties.
//!
//! - Instances of a forking type own a fresh scope forked from their
//!   parent's. Writes land in the fork and stay invisible above it.
//! - Other instances share their parent's scope by reference, so their
//!   writes are visible to the whole subtree below the nearest fork.
//!
//! Reads are tracked at every level they visit, so a later write at any of
//! those levels (including a fork that shadows an ancestor's value) dirties
//! the reader.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::component::Value;
use crate::reactive::{ledger, ObjectId, Path, Runtime};

struct ScopeInner {
    id: ObjectId,
    runtime: Runtime,
    parent: Option<Scope>,
    values: RwLock<IndexMap<Arc<str>, Value>>,
}

/// A level of ambient context. Clones refer to the same level.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    /// A scope with no parent.
    pub fn root(runtime: &Runtime) -> Self {
        Self::build(runtime.clone(), None)
    }

    /// A child scope whose writes stay local.
    pub fn fork(&self) -> Self {
        Self::build(self.inner.runtime.clone(), Some(self.clone()))
    }

    fn build(runtime: Runtime, parent: Option<Scope>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: ObjectId::new(),
                runtime,
                parent,
                values: RwLock::new(IndexMap::new()),
            }),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    pub fn parent(&self) -> Option<&Scope> {
        self.inner.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    /// Look `key` up here, then in each ancestor.
    pub fn get(&self, key: &str) -> Option<Value> {
        let path = Path::segment(key);
        let mut level = Some(self);
        while let Some(scope) = level {
            ledger::record_event(&scope.inner.runtime, scope.inner.id, &path);
            if let Some(value) = scope.inner.values.read().get(key) {
                return Some(value.clone());
            }
            level = scope.inner.parent.as_ref();
        }
        None
    }

    /// Whether `key` is set at this level.
    pub fn contains_local(&self, key: &str) -> bool {
        self.inner.values.read().contains_key(key)
    }

    /// Write `key` at this level. Returns whether the value changed.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let changed = {
            let mut values = self.inner.values.write();
            if values.get(key) == Some(&value) {
                false
            } else {
                values.insert(Arc::from(key), value);
                true
            }
        };
        if changed {
            ledger::record_change(&self.inner.runtime, self.inner.id, &Path::segment(key));
        }
        changed
    }

    /// Remove `key` from this level, uncovering any ancestor value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = self.inner.values.write().shift_remove(key);
        if removed.is_some() {
            ledger::record_change(&self.inner.runtime, self.inner.id, &Path::segment(key));
        }
        removed
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("keys", &self.inner.values.read().keys().collect::<Vec<_>>())
            .field("parent", &self.inner.parent.as_ref().map(Scope::id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Computation;
    use crate::scheduler::UpdateMode;

    #[test]
    fn fork_reads_through_to_ancestors() {
        let rt = Runtime::default();
        let root = Scope::root(&rt);
        root.set("theme", "dark");

        let child = root.fork();
        assert_eq!(child.get("theme"), Some(Value::from("dark")));
        assert_eq!(child.get("missing"), None);
    }

    #[test]
    fn writes_in_a_fork_stay_below_it() {
        let rt = Runtime::default();
        let root = Scope::root(&rt);
        root.set("theme", "dark");
        let child = root.fork();

        child.set("theme", "light");
        assert_eq!(child.get("theme"), Some(Value::from("light")));
        assert_eq!(root.get("theme"), Some(Value::from("dark")));

        child.remove("theme");
        assert_eq!(child.get("theme"), Some(Value::from("dark")));
    }

    #[test]
    fn shadowing_write_dirties_readers() {
        let rt = Runtime::default();
        let root = Scope::root(&rt);
        root.set("theme", "dark");
        let child = root.fork();

        let computation = {
            let child = child.clone();
            Computation::new(&rt, "reader", UpdateMode::Immediate, move || {
                child.get("theme");
            })
        };
        computation.start();

        child.set("theme", "light");
        assert_eq!(computation.run_count(), 2);

        root.set("theme", "blue");
        assert_eq!(computation.run_count(), 2, "child value shadows the root");

        assert!(!child.set("theme", "light"));
        assert_eq!(computation.run_count(), 2);
    }
}
