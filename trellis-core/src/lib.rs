//! Trellis Core
//!
//! This crate provides the engine that sits between "data changed" and
//! "which component instances need re-evaluation". It implements:
//!
//! - Fine-grained dependency tracking over `(owner, path)` cells
//! - Throttled or immediate re-rendering with a loop guard
//! - Keyed reconciliation of typed descriptors against live instances
//! - Virtual (non-visual) trees reconciled by the same rules
//!
//! Painting the reconciled tree is the host renderer's job; it reads
//! instances directly or through [`Instance::snapshot`].
//!
//! # Architecture
//!
//! - `reactive`: cells, computations, the ledger and the runtime
//! - `scheduler`: when dirty computations re-run
//! - `component`: component types, descriptors and property values
//! - `instance`: live instances, scopes, the reconciler and virtual trees
//!
//! # Example
//!
//! ```rust
//! use trellis_core::{Cell, Component, ComponentType, Descriptor, Instance, Node, Runtime};
//!
//! struct Greeting {
//!     name: Cell<String>,
//! }
//!
//! impl Component for Greeting {
//!     fn render(&self, _this: &Instance) -> Node {
//!         Descriptor::element("div")
//!             .child(format!("Hello, {}", self.name.get()))
//!             .into()
//!     }
//! }
//!
//! let rt = Runtime::default();
//! let name = Cell::new(&rt, "Bob".to_string());
//! let greeting = {
//!     let name = name.clone();
//!     ComponentType::builder("Greeting")
//!         .fork(true)
//!         .build_with(move |_| Greeting { name: name.clone() })
//! };
//!
//! let root = rt.mount(Descriptor::new(&greeting)).unwrap();
//! name.set("Dave".to_string());
//! assert_eq!(root.render_count(), 2);
//! ```

pub mod component;
pub mod config;
pub mod error;
pub mod instance;
pub mod reactive;
pub mod scheduler;

pub use component::{
    Attribute, AttrKind, Callback, Component, ComponentType, Descriptor, Init, Key, Node, Props,
    RenderFn, Value,
};
pub use config::RuntimeConfig;
pub use error::{Diagnostic, Error, Result};
pub use instance::{
    reconcile, Disposable, EventEmitter, Instance, InstanceSnapshot, ListenerId, Scope, TreeKind,
};
pub use reactive::{record_change, record_event, Cell, Computation, ObjectId, Path, Runtime};
pub use scheduler::UpdateMode;
