//! Property Values
//!
//! [`Value`] is the dynamically typed value stored in property bags, scopes
//! and event arguments. [`Props`] is the insertion-ordered property bag.
//!
//! # Equality
//!
//! Equality is shallow. Scalars and strings compare by value; lists, node
//! lists, callbacks, render functions and opaque objects compare by `Arc`
//! identity. Rebuilding a list with the same contents is therefore a change,
//! while passing the same list through unchanged is not.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::descriptor::Node;

/// A callback property, such as an event handler.
#[derive(Clone)]
pub struct Callback(Arc<dyn Fn(&[Value]) + Send + Sync>);

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: &[Value]) {
        (self.0)(args)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback")
    }
}

/// A children slot that produces nodes from arguments.
#[derive(Clone)]
pub struct RenderFn(Arc<dyn Fn(&[Value]) -> Node + Send + Sync>);

impl RenderFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Node + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Node {
        (self.0)(args)
    }
}

impl PartialEq for RenderFn {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for RenderFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RenderFn")
    }
}

/// A property value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Arc<[Value]>),
    Nodes(Arc<[Node]>),
    Callback(Callback),
    Render(RenderFn),
    /// Opaque host object, compared by identity.
    Any(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Wrap an arbitrary object.
    pub fn any<T: Any + Send + Sync>(value: T) -> Self {
        Self::Any(Arc::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_nodes(&self) -> Option<&[Node]> {
        match self {
            Self::Nodes(nodes) => Some(nodes),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            Self::Callback(cb) => Some(cb),
            _ => None,
        }
    }

    /// Downcast an opaque value.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Any(any) => any.downcast_ref(),
            _ => None,
        }
    }

    /// Short name of the variant, used in log messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Nodes(_) => "nodes",
            Self::Callback(_) => "callback",
            Self::Render(_) => "render function",
            Self::Any(_) => "object",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b),
            (Self::Nodes(a), Self::Nodes(b)) => Arc::ptr_eq(a, b),
            (Self::Callback(a), Self::Callback(b)) => a == b,
            (Self::Render(a), Self::Render(b)) => a == b,
            (Self::Any(a), Self::Any(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Nodes(nodes) => write!(f, "Nodes(len={})", nodes.len()),
            Self::Callback(_) => f.write_str("Callback"),
            Self::Render(_) => f.write_str("Render"),
            Self::Any(_) => f.write_str("Any"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::Str(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Nodes(nodes) => {
                let mut seq = serializer.serialize_seq(Some(nodes.len()))?;
                for node in nodes.iter() {
                    seq.serialize_element(node)?;
                }
                seq.end()
            }
            Self::Callback(_) => serializer.serialize_str("<callback>"),
            Self::Render(_) => serializer.serialize_str("<render>"),
            Self::Any(_) => serializer.serialize_str("<object>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Arc::from(s))
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Self::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(Arc::from(items))
    }
}

impl From<Vec<Node>> for Value {
    fn from(nodes: Vec<Node>) -> Self {
        Self::Nodes(Arc::from(nodes))
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Self::Nodes(Arc::from(vec![node]))
    }
}

impl From<Callback> for Value {
    fn from(cb: Callback) -> Self {
        Self::Callback(cb)
    }
}

impl From<RenderFn> for Value {
    fn from(render: RenderFn) -> Self {
        Self::Render(render)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// An insertion-ordered property bag.
#[derive(Clone, Default)]
pub struct Props(IndexMap<Arc<str>, Value>);

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(Arc::from(name), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.shift_remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| &**k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (&**k, v))
    }

    /// Names whose values differ between the two bags, including names
    /// present in only one of them.
    pub fn changed_keys(&self, other: &Props) -> Vec<Arc<str>> {
        let mut changed: Vec<Arc<str>> = self
            .0
            .iter()
            .filter(|(k, v)| other.0.get(&***k) != Some(*v))
            .map(|(k, _)| Arc::clone(k))
            .collect();
        changed.extend(
            other
                .0
                .keys()
                .filter(|k| !self.0.contains_key(&***k))
                .cloned(),
        );
        changed
    }

    /// Shallow comparison: same names, and each value equal per [`Value`]'s
    /// equality. Order is ignored.
    pub fn shallow_eq(&self, other: &Props) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .all(|(k, v)| other.0.get(&**k).is_some_and(|o| o == v))
    }
}

impl PartialEq for Props {
    fn eq(&self, other: &Self) -> bool {
        self.shallow_eq(other)
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl Serialize for Props {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (Arc::from(k.as_ref()), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_compare_by_value() {
        assert_eq!(Value::from("Bob"), Value::from(String::from("Bob")));
        assert_eq!(Value::from(3), Value::Int(3));
        assert_ne!(Value::from(3), Value::Float(3.0));
        assert_ne!(Value::Null, Value::Bool(false));
    }

    #[test]
    fn containers_compare_by_identity() {
        let list = Value::from(vec![Value::from(1)]);
        assert_eq!(list, list.clone());
        assert_ne!(list, Value::from(vec![Value::from(1)]));

        let cb = Callback::new(|_| {});
        assert_eq!(Value::from(cb.clone()), Value::from(cb));
        assert_ne!(
            Value::from(Callback::new(|_| {})),
            Value::from(Callback::new(|_| {}))
        );
    }

    #[test]
    fn props_equality_ignores_order() {
        let a = Props::new().with("x", 1).with("y", "two");
        let b = Props::new().with("y", "two").with("x", 1);
        assert_eq!(a, b);
        assert_ne!(a, Props::new().with("x", 1));
        assert_ne!(a, Props::new().with("x", 1).with("y", "three"));
    }

    #[test]
    fn changed_keys_covers_both_sides() {
        let old = Props::new().with("keep", 1).with("edit", 1).with("gone", 1);
        let new = Props::new().with("keep", 1).with("edit", 2).with("added", 1);

        let mut changed: Vec<String> = old.changed_keys(&new).iter().map(|k| k.to_string()).collect();
        changed.sort();
        assert_eq!(changed, ["added", "edit", "gone"]);
    }

    #[test]
    fn opaque_values_downcast() {
        let value = Value::any(42u8);
        assert_eq!(value.downcast_ref::<u8>(), Some(&42));
        assert_eq!(value.downcast_ref::<u16>(), None);
    }

    #[test]
    fn props_serialize_in_order() {
        let props = Props::new()
            .with("name", "Bob")
            .with("age", 7)
            .with("onClick", Callback::new(|_| {}));
        let json = serde_json::to_string(&props).unwrap();
        assert_eq!(json, r#"{"name":"Bob","age":7,"onClick":"<callback>"}"#);
    }
}
