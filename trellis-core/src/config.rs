//! Runtime configuration.

use serde::Deserialize;

use crate::error::Result;

/// Number of consecutive re-runs after which a computation is considered
/// to be stuck in an update loop.
pub const DEFAULT_LOOP_LIMIT: u32 = 50;

/// Settings fixed for the lifetime of a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Consecutive re-runs allowed before the update-loop guard trips.
    pub loop_limit: u32,

    /// Log a warning when a root instance's type does not fork its scope.
    pub warn_unforked_root: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            loop_limit: DEFAULT_LOOP_LIMIT,
            warn_unforked_root: true,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
