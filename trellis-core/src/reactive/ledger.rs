//! Change/Event Ledger
//!
//! The ledger is the glue between arbitrary `(object, key)` pairs and the
//! dependency tracker. It exposes exactly two primitives:
//!
//! - [`record_event`]: a read of `key` on `owner`.
//! - [`record_change`]: a write of `key` on `owner`.
//!
//! It keeps no state of its own. Keys are dotted [`Path`]s, so a change to
//! `props.name` does not disturb a computation that only read `props.title`,
//! while replacing the `props` bag as a whole reaches every `props.*` reader.

use std::fmt;
use std::sync::Arc;

use super::id::ObjectId;
use super::runtime::Runtime;
use crate::error::{Error, Result};

/// A dotted property path such as `props.name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path(Arc<str>);

impl Path {
    /// Parse a dotted path. Empty paths and empty segments are rejected.
    pub fn parse(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(Error::invalid("Path::parse", "path is empty"));
        }
        if path.split('.').any(str::is_empty) {
            return Err(Error::invalid(
                "Path::parse",
                format!("path `{path}` contains an empty segment"),
            ));
        }
        Ok(Self(Arc::from(path)))
    }

    /// Append a single segment. Dots inside `segment` are kept literally as
    /// further segments.
    pub fn child(&self, segment: &str) -> Self {
        Self(Arc::from(format!("{}.{}", self.0, segment)))
    }

    /// Build `prefix.segment` for internal keys that are known to be valid.
    pub(crate) fn join(prefix: &str, segment: &str) -> Self {
        Self(Arc::from(format!("{prefix}.{segment}")))
    }

    /// Build a single-segment path for internal keys.
    pub(crate) fn segment(segment: &str) -> Self {
        Self(Arc::from(segment))
    }

    /// The path as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `self` lies at or under `ancestor`.
    pub fn starts_with(&self, ancestor: &Path) -> bool {
        let (me, other) = (self.as_str(), ancestor.as_str());
        me == other
            || (me.len() > other.len()
                && me.starts_with(other)
                && me.as_bytes()[other.len()] == b'.')
    }

    /// Whether a write at one of the paths can affect a read at the other.
    ///
    /// Paths are related when they are equal or one is a prefix of the
    /// other on a segment boundary. Siblings (`props.a`, `props.b`) are not.
    pub fn is_related(&self, other: &Path) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of a cell: its owner plus a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub owner: ObjectId,
    pub path: Path,
}

impl CellKey {
    pub fn new(owner: ObjectId, path: Path) -> Self {
        Self { owner, path }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner, self.path)
    }
}

/// Record a read of `path` on `owner`.
///
/// Outside an active computation this does nothing.
pub fn record_event(runtime: &Runtime, owner: ObjectId, path: &Path) {
    runtime.record_read(CellKey::new(owner, path.clone()));
}

/// Record a write of `path` on `owner`.
///
/// Callers decide whether the value actually changed; the ledger assumes it
/// did and notifies every computation with a related read.
pub fn record_change(runtime: &Runtime, owner: ObjectId, path: &Path) {
    runtime.notify(owner, path);
}
