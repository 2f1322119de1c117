//! Attribute Registration
//!
//! Attributes are the declared, typed properties of a component type. They
//! are registered on the [`ComponentTypeBuilder`] when the type is defined
//! and queried by the lifecycle manager to fill in defaults, validate
//! values and resolve aliases.
//!
//! [`ComponentTypeBuilder`]: super::ComponentTypeBuilder

use std::sync::Arc;

use super::value::Value;

/// Expected kind of an attribute's value.
///
/// A mismatch is only a warning; the value is passed through unchanged.
/// `Null` is accepted by every kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttrKind {
    #[default]
    Any,
    Bool,
    Int,
    Float,
    Str,
    List,
    Nodes,
    Callback,
    Render,
}

impl AttrKind {
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::Any, _)
                | (_, Value::Null)
                | (Self::Bool, Value::Bool(_))
                | (Self::Int, Value::Int(_))
                | (Self::Float, Value::Float(_) | Value::Int(_))
                | (Self::Str, Value::Str(_))
                | (Self::List, Value::List(_))
                | (Self::Nodes, Value::Nodes(_))
                | (Self::Callback, Value::Callback(_))
                | (Self::Render, Value::Render(_) | Value::Nodes(_))
        )
    }
}

/// A declared attribute.
#[derive(Debug, Clone)]
pub struct Attribute {
    name: Arc<str>,
    default: Option<Value>,
    kind: AttrKind,
    alias: Option<Arc<str>>,
}

impl Attribute {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            default: None,
            kind: AttrKind::Any,
            alias: None,
        }
    }

    /// Value used when a descriptor does not set the attribute.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn kind(mut self, kind: AttrKind) -> Self {
        self.kind = kind;
        self
    }

    /// Alternate name that reads and writes the same property.
    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(Arc::from(alias));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn value_kind(&self) -> AttrKind {
        self.kind
    }

    pub fn alias_name(&self) -> Option<&str> {
        self.alias.as_deref()
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Property holding the change callback of a two-way bound attribute:
/// `value` becomes `onValueChange`.
pub fn change_handler(attribute: &str) -> String {
    format!("on{}Change", capitalize(attribute))
}

/// Property holding the handler of a custom event: `select` becomes
/// `onSelect`.
pub fn event_handler(event: &str) -> String {
    format!("on{}", capitalize(event))
}
