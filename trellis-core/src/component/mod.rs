//! Typed Descriptor Protocol
//!
//! This module defines what render functions produce and what the
//! reconciler consumes:
//!
//! - [`ComponentType`]: a registered type with its attributes, events and
//!   static options, plus the constructor for its [`Component`].
//! - [`Descriptor`] and [`Node`]: immutable "what should exist" values.
//! - [`Value`] and [`Props`]: property values and bags, compared shallowly.
//! - [`Attribute`]: declarative registration of a typed property with an
//!   optional default and alias.

mod attribute;
mod component_type;
mod descriptor;
mod value;

pub use attribute::{change_handler, event_handler, AttrKind, Attribute};
pub use component_type::{BoxError, Component, ComponentType, ComponentTypeBuilder, Init};
pub use descriptor::{Descriptor, Key, Node, CHILDREN};
pub use value::{Callback, Props, RenderFn, Value};

pub(crate) use component_type::{panic_message, Placeholder};
