//! Error types for sharp-core

use thiserror::Error;

use crate::reactive::SourceId;

/// Result type for sharp-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, distributing or mutating state
#[derive(Debug, Error)]
pub enum Error {
    /// A required instance was read from a scope with no matching provider
    #[error("{name}.use_sharp must be used within {name}.Provider")]
    MissingProvider {
        /// Name of the factory whose provider is missing
        name: String,
    },

    /// Arguments did not match what the callee expects
    ///
    /// Raised at the dynamic boundaries only: `create_from_json` and
    /// `Actions::call`. Statically typed calls are checked by the compiler.
    #[error("invalid arguments for `{target}`: {source}")]
    InvalidArguments {
        /// The initializer or action the arguments were meant for
        target: String,
        #[source]
        source: serde_json::Error,
    },

    /// The initializer produced something other than an object or array
    #[error("initial state for `{name}` must be an object or array, got {kind}")]
    InvalidInitialState {
        /// Name of the factory (or `"proxy"` for direct construction)
        name: String,
        /// JSON kind that was produced instead
        kind: &'static str,
    },

    /// No action with this name was attached to the factory
    #[error("`{name}` has no action named `{action}`")]
    UnknownAction {
        /// Name of the factory
        name: String,
        /// The requested action
        action: String,
    },

    /// A memo read itself while computing
    #[error("cycle detected: memo {0:?} was read during its own computation")]
    Cycle(SourceId),

    /// Array write past the end of the array
    #[error("index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Array length at the time of the write
        len: usize,
    },

    /// A JSON pointer did not resolve to a writable location
    #[error("path `{0}` does not resolve to a container")]
    InvalidPath(String),

    /// A proxy was written somewhere inside itself
    #[error("a proxy cannot be nested inside itself")]
    CyclicProxy,

    /// Converting a user value into state failed
    #[error("serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Converting state into a user type failed
    #[error("deserialization error: {0}")]
    Deserialize(#[source] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_arguments(target: impl Into<String>, source: serde_json::Error) -> Self {
        Error::InvalidArguments {
            target: target.into(),
            source,
        }
    }

    /// Whether this error is [`Error::MissingProvider`]
    pub fn is_missing_provider(&self) -> bool {
        matches!(self, Error::MissingProvider { .. })
    }
}
