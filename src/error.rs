//! Error types.
//!
//! Contention is never an error: every lock in this crate blocks until it is
//! acquired. The failures reported here are all caller mistakes.

use thiserror::Error;

/// A class definition could not be finalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// Methods were declared thread-safe but never defined.
    #[error("class `{class}` declared thread-safe methods that were never defined: {}", .methods.join(", "))]
    PendingMethods {
        /// The class being built.
        class: &'static str,
        /// The undefined method names, sorted.
        methods: Vec<&'static str>,
    },
}

/// A method could not be invoked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MethodError {
    /// No method of that name is defined.
    #[error("undefined method `{method}` for class `{class}`")]
    Undefined {
        /// The class the method was looked up on.
        class: &'static str,
        /// The requested name.
        method: String,
    },
    /// The method exists with different argument or return types.
    #[error("method `{class}::{method}` takes {expected}, not {requested}")]
    SignatureMismatch {
        /// The class the method was looked up on.
        class: &'static str,
        /// The requested name.
        method: String,
        /// The defined signature.
        expected: String,
        /// The signature the caller asked for.
        requested: String,
    },
}

/// A request-scoped value was written outside any request scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// No request is current on the calling thread.
    #[error("no current request scope to store `{0}` in")]
    NoActiveScope(&'static str),
}
