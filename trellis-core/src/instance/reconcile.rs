//! Instance Reconciler
//!
//! Diffs a freshly rendered node against the live instances of a parent.
//!
//! # Algorithm
//!
//! The node is flattened first (nested lists inlined, empty entries and
//! whitespace-only text dropped). Descriptors are then matched in order:
//!
//! - A keyed descriptor matches the existing instance with the same key,
//!   wherever it is. Otherwise descriptor `i` matches `existing[i]`, provided
//!   that instance is unkeyed too.
//! - No match: create a new instance.
//! - Match of another type: replace it with a new instance.
//! - Match with different properties or context: update it in place.
//! - Match with equal properties and context: reuse it untouched.
//!
//! Existing instances left unmatched are disposed. All disposal happens
//! after the pass has created and updated everything it keeps.

use std::collections::{HashMap, HashSet};

use super::capability::Disposable;
use super::lifecycle;
use super::Instance;
use crate::component::Node;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Stats {
    created: usize,
    replaced: usize,
    updated: usize,
    reused: usize,
    disposed: usize,
}

/// Reconcile `node` against `existing`, the current children of `parent`.
///
/// Returns the new ordered children, which also become `parent`'s child
/// list. Instances that did not survive are already disposed when this
/// returns.
pub fn reconcile(existing: &[Instance], node: impl Into<Node>, parent: &Instance) -> Result<Vec<Instance>> {
    if parent.is_disposed() {
        return Err(Error::invalid(
            "reconcile",
            format!("parent `{}` is disposed", parent.type_name()),
        ));
    }

    let descriptors = node.into().flatten();
    let runtime = parent.runtime().clone();
    let context = parent.context_for_children();
    let tree = parent.tree();

    let mut by_key: HashMap<&str, usize> = HashMap::new();
    for (j, item) in existing.iter().enumerate() {
        if let Some(key) = item.key() {
            by_key.entry(key).or_insert(j);
        }
    }

    let mut used = vec![false; existing.len()];
    let mut seen_keys: HashSet<String> = HashSet::new();
    let mut next = Vec::with_capacity(descriptors.len());
    let mut retired = Vec::new();
    let mut stats = Stats::default();

    for (i, descriptor) in descriptors.into_iter().enumerate() {
        let positional = |key: Option<&str>| {
            existing
                .get(i)
                .filter(|item| item.key() == key)
                .map(|_| i)
        };
        let candidate = match descriptor.get_key() {
            Some(key) if seen_keys.insert(key.to_string()) => by_key.get(key).copied(),
            Some(key) => {
                tracing::warn!(
                    parent = parent.type_name(),
                    key,
                    "duplicate key among siblings; matching it by position"
                );
                positional(Some(key))
            }
            None => positional(None),
        }
        .filter(|&j| !used[j] && !existing[j].is_disposed());

        let instance = match candidate {
            None => {
                stats.created += 1;
                lifecycle::create(&runtime, descriptor, Some(parent), context.clone(), tree)
            }
            Some(j) => {
                used[j] = true;
                let current = &existing[j];
                if current.ty() != descriptor.ty() {
                    stats.replaced += 1;
                    retired.push(current.clone());
                    lifecycle::create(&runtime, descriptor, Some(parent), context.clone(), tree)
                } else {
                    let (_, props, _) = descriptor.into_parts();
                    let props = current.ty().resolve_props(props);
                    if current.props_equal(&props) && current.context_matches(&context) {
                        stats.reused += 1;
                    } else {
                        stats.updated += 1;
                        current.update(props, context.clone());
                    }
                    current.clone()
                }
            }
        };
        next.push(instance);
    }

    retired.extend(
        existing
            .iter()
            .zip(&used)
            .filter(|(item, used)| !**used && !item.is_disposed())
            .map(|(item, _)| item.clone()),
    );
    for item in &retired {
        item.dispose();
    }
    stats.disposed = retired.len();

    tracing::trace!(
        parent = parent.type_name(),
        created = stats.created,
        replaced = stats.replaced,
        updated = stats.updated,
        reused = stats.reused,
        disposed = stats.disposed,
        "reconciled children"
    );
    parent.adopt_children(next.clone());
    Ok(next)
}
