//! Reactive Primitives
//!
//! This module implements the dependency-tracking binder: cells,
//! computations, the ledger, and the runtime that ties them together.
//!
//! # Concepts
//!
//! ## Cells
//!
//! A [`Cell`] is a tracked piece of mutable state, addressed by an owner and
//! a dotted path. Reading it inside a computation records a dependency;
//! writing a different value notifies every computation that read it.
//!
//! ## Computations
//!
//! A [`Computation`] is a re-runnable unit of work, typically an instance's
//! render function or a watch. Its dependency set is rebuilt on every run,
//! so it only reacts to the cells it actually read last time.
//!
//! ## Ledger
//!
//! [`record_event`] and [`record_change`] are the two primitives everything
//! else uses to talk to the tracker about `(owner, path)` pairs.
//!
//! # Implementation Notes
//!
//! The runtime keeps an explicit stack of active computations. Reads are
//! attributed to the top of the stack; reads outside any computation are
//! not tracked. Notification marks computations dirty synchronously and
//! leaves the decision of when to re-run to the update scheduler.

mod cell;
mod computation;
mod context;
mod id;
pub mod ledger;
mod runtime;
mod tracker;

pub use cell::Cell;
pub use computation::Computation;
pub use id::{ComputationId, ObjectId};
pub use ledger::{record_change, record_event, CellKey, Path};
pub use runtime::Runtime;

pub(crate) use computation::ComputationInner;
