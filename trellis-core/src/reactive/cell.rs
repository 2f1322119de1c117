//! Cell Implementation
//!
//! A [`Cell`] is an addressable piece of mutable state: a value plus the
//! `(owner, path)` address the ledger uses to track it.
//!
//! # How Cells Work
//!
//! 1. `get()` records a read through the ledger, so the active computation
//!    (if any) picks up a dependency on this cell.
//!
//! 2. `set()` compares the new value with the current one. Only a different
//!    value is stored and reported as a change; writing an equal value never
//!    dirties anyone.
//!
//! 3. Clones share the value and the address.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::id::ObjectId;
use super::ledger::{self, CellKey, Path};
use super::runtime::Runtime;
use crate::error::Result;

/// A tracked value of type `T`.
///
/// # Example
///
/// ```rust
/// use trellis_core::{Cell, Runtime};
///
/// let rt = Runtime::default();
/// let name = Cell::new(&rt, String::from("Bob"));
///
/// assert!(name.set("Dave".to_string()));
/// assert!(!name.set("Dave".to_string())); // equal value: no change
/// assert_eq!(name.get(), "Dave");
/// ```
pub struct Cell<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    runtime: Runtime,
    key: CellKey,
    value: Arc<RwLock<T>>,
}

impl<T> Cell<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a cell with its own owner, addressed as `value`.
    pub fn new(runtime: &Runtime, value: T) -> Self {
        Self::at(runtime, CellKey::new(ObjectId::new(), Path::segment("value")), value)
    }

    /// Create a cell addressed as `key` on an existing owner.
    ///
    /// Cells owned by an instance are released with it.
    pub fn keyed(runtime: &Runtime, owner: ObjectId, key: &str, value: T) -> Result<Self> {
        Ok(Self::at(runtime, CellKey::new(owner, Path::parse(key)?), value))
    }

    fn at(runtime: &Runtime, key: CellKey, value: T) -> Self {
        Self {
            runtime: runtime.clone(),
            key,
            value: Arc::new(RwLock::new(value)),
        }
    }

    /// The cell's address.
    pub fn key(&self) -> &CellKey {
        &self.key
    }

    /// Read the value, recording a dependency for the active computation.
    pub fn get(&self) -> T {
        ledger::record_event(&self.runtime, self.key.owner, &self.key.path);
        self.value.read().clone()
    }

    /// Borrow the value for the duration of `f`, recording a dependency.
    ///
    /// `f` must not write this cell.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        ledger::record_event(&self.runtime, self.key.owner, &self.key.path);
        f(&self.value.read())
    }

    /// Read the value without recording a dependency.
    pub fn get_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// Store `value` and notify dependents if it differs from the current
    /// value. Returns whether a change was recorded.
    pub fn set(&self, value: T) -> bool {
        let changed = {
            let mut guard = self.value.write();
            if *guard == value {
                false
            } else {
                *guard = value;
                true
            }
        };

        if changed {
            ledger::record_change(&self.runtime, self.key.owner, &self.key.path);
        }
        changed
    }

    /// Replace the value with `f(current)`.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let next = {
            let guard = self.value.read();
            f(&guard)
        };
        self.set(next)
    }
}

impl<T> Clone for Cell<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            key: self.key.clone(),
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> Debug for Cell<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("key", &self.key.to_string())
            .field("value", &*self.value.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_set() {
        let rt = Runtime::default();
        let cell = Cell::new(&rt, 0);
        assert_eq!(cell.get(), 0);

        assert!(cell.set(42));
        assert_eq!(cell.get(), 42);
    }

    #[test]
    fn equal_write_is_not_a_change() {
        let rt = Runtime::default();
        let cell = Cell::new(&rt, "Bob".to_string());
        assert!(!cell.set("Bob".to_string()));
    }

    #[test]
    fn update_uses_current_value() {
        let rt = Runtime::default();
        let cell = Cell::new(&rt, 10);
        cell.update(|v| v + 5);
        assert_eq!(cell.get_untracked(), 15);
    }

    #[test]
    fn clone_shares_state() {
        let rt = Runtime::default();
        let a = Cell::new(&rt, 0);
        let b = a.clone();

        a.set(7);
        assert_eq!(b.get(), 7);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn keyed_cells_share_an_owner() {
        let rt = Runtime::default();
        let owner = ObjectId::new();
        let first = Cell::keyed(&rt, owner, "first", 1).unwrap();
        let last = Cell::keyed(&rt, owner, "last", 2).unwrap();

        assert_eq!(first.key().owner, last.key().owner);
        assert_ne!(first.key(), last.key());
        assert!(Cell::keyed(&rt, owner, "a..b", 0).is_err());
    }
}
