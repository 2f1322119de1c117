//! Error types.
//!
//! Two families live here:
//!
//! - [`Error`] is returned from public entry points called with malformed
//!   arguments. It indicates a programming error at the call site and is
//!   never recovered by the core.
//! - [`Diagnostic`] describes a runtime condition the core recovered from
//!   locally (a placeholder was substituted, an update loop was frozen, a
//!   write was dropped). Diagnostics are logged and appended to the
//!   runtime's diagnostic log; they never halt reconciliation of siblings.

use thiserror::Error;

use crate::reactive::ObjectId;

/// Hard failures surfaced to the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// A public entry point received an argument it cannot work with.
    #[error("invalid argument to `{operation}`: {reason}")]
    InvalidArgument {
        /// The entry point that rejected the argument.
        operation: &'static str,
        /// Human-readable explanation.
        reason: String,
    },

    /// Runtime configuration could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            operation,
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Recovered errors, observable through [`Runtime::diagnostics`].
///
/// [`Runtime::diagnostics`]: crate::Runtime::diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    /// A descriptor's type could not be constructed; a placeholder instance
    /// was substituted.
    #[error("cannot instantiate `{type_name}`: {reason}")]
    Instantiation {
        /// Name of the type that failed.
        type_name: String,
        /// Why construction failed.
        reason: String,
    },

    /// A computation kept invalidating itself and was frozen with its last
    /// result.
    #[error("`{label}` did not stabilize after {runs} consecutive re-runs")]
    UnboundedUpdateLoop {
        /// Label of the offending computation (usually the instance type).
        label: String,
        /// Instance that owns the computation, if any.
        owner: Option<ObjectId>,
        /// Number of re-runs performed before giving up.
        runs: u32,
    },

    /// A two-way bound attribute was written without a change handler.
    #[error(
        "attribute `{attribute}` of `{component}` was modified, but no `{handler}` handler was bound"
    )]
    MissingBindingTarget {
        /// Component type name.
        component: String,
        /// The attribute that was written.
        attribute: String,
        /// The change handler property that was expected.
        handler: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_names_operation() {
        let err = Error::invalid("mount", "root must be an element");
        assert_eq!(
            err.to_string(),
            "invalid argument to `mount`: root must be an element"
        );
    }

    #[test]
    fn missing_binding_target_message() {
        let diag = Diagnostic::MissingBindingTarget {
            component: "Field".into(),
            attribute: "value".into(),
            handler: "onValueChange".into(),
        };
        assert!(diag.to_string().contains("no `onValueChange` handler"));
    }
}
