//! Error types for the route policy engine.
//!
//! Only conditions that indicate bad input files or a defect in the compiler
//! are errors. Undefined references, unsupported vendor constructs and call
//! cycles are recoverable and are reported as `Diagnostic`s instead.

use thiserror::Error;

/// The unified error type for the route policy crates.
#[derive(Debug, Error)]
pub enum RplError {
    /// The IR handed to the engine is internally inconsistent, e.g. a
    /// `SetAttribute` whose expression does not produce a value of the
    /// field's type.
    ///
    /// This always signals a compiler bug, never bad user input.
    #[error("malformed policy IR in '{policy}': {reason}")]
    MalformedIr { policy: String, reason: String },

    /// A configuration document is missing, unreadable, or does not parse.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// A user policy tried to claim a name in the derived-policy namespace.
    #[error("policy name '{name}' is reserved for derived policies")]
    ReservedName { name: String },

    /// Two policies with the same name were registered in one configuration.
    #[error("policy '{name}' is defined more than once")]
    DuplicatePolicy { name: String },

    /// A caller asked to evaluate a policy that does not exist.
    #[error("unknown routing policy '{name}'")]
    UnknownPolicy { name: String },
}

/// Convenience alias used throughout the route policy crates.
pub type RplResult<T> = Result<T, RplError>;
