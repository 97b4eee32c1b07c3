//! The storage contract the resolver depends on.

use std::fmt::Debug;

use crate::utm::ParameterSet;

/// Errors raised by a session backend.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A lock guarding session data was poisoned by a panicking writer.
    #[error("Session lock poisoned: {0}")]
    Poisoned(String),

    /// The backend could not serve the request.
    #[error("Session backend error: {0}")]
    Backend(String),
}

/// Key-value storage scoped to one visitor's session.
///
/// Implementations are responsible for consistency across concurrent
/// requests of the same visitor; callers treat each call as atomic.
pub trait SessionStore: Send + Sync + Debug {
    /// Read the set stored under `key`.
    fn get(&self, key: &str) -> Result<Option<ParameterSet>, SessionError>;

    /// Replace whatever is stored under `key`.
    fn set(&self, key: &str, parameters: ParameterSet) -> Result<(), SessionError>;

    /// Delete `key` entirely.
    fn forget(&self, key: &str) -> Result<(), SessionError>;
}
