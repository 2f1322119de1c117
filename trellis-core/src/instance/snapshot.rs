//! Serializable view of a reconciled tree, for host renderers and tests.

use serde::Serialize;

use super::Instance;
use crate::component::{Props, CHILDREN};

/// A point-in-time copy of an instance and its subtree.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceSnapshot {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Properties without the `children` slot, which is represented by
    /// `children` below.
    pub props: Props,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<InstanceSnapshot>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

impl Instance {
    /// Copy this instance and its subtree. Nothing is tracked.
    pub fn snapshot(&self) -> InstanceSnapshot {
        let mut props = self.props();
        props.remove(CHILDREN);
        let children = self.inner.children.read().clone();

        InstanceSnapshot {
            type_name: self.type_name().to_string(),
            key: self.key().map(str::to_string),
            props,
            children: children.iter().map(Instance::snapshot).collect(),
            placeholder: self.is_placeholder(),
        }
    }
}
