//! Runtime Configuration
//!
//! Settings for the per-thread reactive runtime. The defaults match the
//! limits used by common signal libraries and rarely need changing.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default number of flush passes before the runtime gives up on a batch.
pub const DEFAULT_MAX_FLUSH_PASSES: usize = 100;

/// Configuration for the reactive runtime.
///
/// # Example
///
/// ```
/// use sharp_core::{Runtime, RuntimeConfig};
///
/// let config = RuntimeConfig::from_json_str(r#"{ "max_flush_passes": 8 }"#).unwrap();
/// Runtime::configure(config);
/// assert_eq!(Runtime::config().max_flush_passes, 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on effect flush passes within one batch.
    ///
    /// Effects that write signals queue another pass. An effect that keeps
    /// re-triggering itself would loop forever; past this bound the rest
    /// of the queue is dropped and an error is logged.
    pub max_flush_passes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_passes: DEFAULT_MAX_FLUSH_PASSES,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::Deserialize)
    }

    /// Builder-style setter for [`RuntimeConfig::max_flush_passes`].
    ///
    /// Clamped to at least one pass.
    pub fn with_max_flush_passes(mut self, passes: usize) -> Self {
        self.max_flush_passes = passes.max(1);
        self
    }
}
