//! Descriptors
//!
//! A [`Descriptor`] describes what should exist: a component type, a
//! property bag and an optional key. Render functions produce fresh
//! descriptors on every run; the reconciler matches them against live
//! instances.
//!
//! [`Node`] is what a render function returns. It may nest lists and
//! contain empty entries, which is what conditional and looping constructs
//! naturally produce. [`Node::flatten`] turns it into the flat descriptor
//! list the reconciler works on.

use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::component_type::ComponentType;
use super::value::{Props, Value};

/// Explicit identity of a descriptor among its siblings.
pub type Key = Arc<str>;

/// Name of the default children slot.
pub const CHILDREN: &str = "children";

/// What should exist at one position of a component's output.
#[derive(Clone, Debug)]
pub struct Descriptor {
    ty: ComponentType,
    props: Props,
    key: Option<Key>,
}

impl Descriptor {
    pub fn new(ty: &ComponentType) -> Self {
        Self {
            ty: ty.clone(),
            props: Props::new(),
            key: None,
        }
    }

    /// A host element descriptor, `ComponentType::element(tag)`.
    pub fn element(tag: &str) -> Self {
        Self::new(&ComponentType::element(tag))
    }

    pub fn prop(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.props.insert(name, value);
        self
    }

    pub fn props(mut self, props: Props) -> Self {
        for (name, value) in props.iter() {
            self.props.insert(name, value.clone());
        }
        self
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Append a node to the `children` slot.
    pub fn child(self, node: impl Into<Node>) -> Self {
        self.children([node.into()])
    }

    /// Append nodes to the `children` slot.
    pub fn children(self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.slot(CHILDREN, nodes)
    }

    /// Append nodes to a named children slot.
    pub fn slot(mut self, name: &str, nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut all: Vec<Node> = self
            .props
            .get(name)
            .and_then(Value::as_nodes)
            .map(<[Node]>::to_vec)
            .unwrap_or_default();
        all.extend(nodes);
        self.props.insert(name, all);
        self
    }

    pub fn ty(&self) -> &ComponentType {
        &self.ty
    }

    pub fn get_props(&self) -> &Props {
        &self.props
    }

    pub fn get_key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub(crate) fn into_parts(self) -> (ComponentType, Props, Option<Key>) {
        (self.ty, self.props, self.key)
    }
}

impl Serialize for Descriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("type", self.ty.name())?;
        map.serialize_entry("key", &self.key.as_deref())?;
        map.serialize_entry("props", &self.props)?;
        map.end()
    }
}

/// Output of a render function.
#[derive(Clone, Debug, Default)]
pub enum Node {
    #[default]
    Empty,
    Element(Descriptor),
    Text(Arc<str>),
    List(Vec<Node>),
}

impl Node {
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Self::Text(text.into())
    }

    pub fn list(nodes: impl IntoIterator<Item = Node>) -> Self {
        Self::List(nodes.into_iter().collect())
    }

    /// Flatten into the descriptor list the reconciler diffs.
    ///
    /// Nested lists are inlined depth-first, empty entries and
    /// whitespace-only text are dropped, and remaining text becomes a
    /// descriptor of the built-in text type.
    pub fn flatten(self) -> Vec<Descriptor> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(self, out: &mut Vec<Descriptor>) {
        match self {
            Self::Empty => {}
            Self::Element(descriptor) => out.push(descriptor),
            Self::Text(text) => {
                if !text.trim().is_empty() {
                    out.push(Descriptor::new(&ComponentType::text()).prop("text", text));
                }
            }
            Self::List(nodes) => {
                for node in nodes {
                    node.flatten_into(out);
                }
            }
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Empty => serializer.serialize_unit(),
            Self::Element(descriptor) => descriptor.serialize(serializer),
            Self::Text(text) => serializer.serialize_str(text),
            Self::List(nodes) => {
                let mut seq = serializer.serialize_seq(Some(nodes.len()))?;
                for node in nodes {
                    seq.serialize_element(node)?;
                }
                seq.end()
            }
        }
    }
}

impl From<Descriptor> for Node {
    fn from(descriptor: Descriptor) -> Self {
        Self::Element(descriptor)
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Self::Text(Arc::from(text))
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Self::Text(Arc::from(text))
    }
}

impl From<Vec<Node>> for Node {
    fn from(nodes: Vec<Node>) -> Self {
        Self::List(nodes)
    }
}

impl<T: Into<Node>> From<Option<T>> for Node {
    fn from(node: Option<T>) -> Self {
        node.map_or(Self::Empty, Into::into)
    }
}

impl FromIterator<Node> for Node {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Self::List(iter.into_iter().collect())
    }
}
