//! Visitor session storage.
//!
//! The resolver only ever talks to a [`SessionStore`]. The server keeps one
//! [`VisitorSession`] per browser, handed out by a [`SessionRegistry`] and
//! addressed by a cookie.
//!
//! # Example
//!
//! ```rust
//! use utm_parameter::session::{SessionRegistry, SessionStore};
//! use utm_parameter::utm::ParameterSet;
//!
//! let registry = SessionRegistry::new();
//! let session = registry.create().unwrap();
//!
//! let params: ParameterSet = [("utm_source", "google")].into_iter().collect();
//! session.set("utm", params).unwrap();
//! assert!(session.get("utm").unwrap().is_some());
//! ```

mod store;
mod visitor;

pub use store::{SessionError, SessionStore};
pub use visitor::{DEFAULT_IDLE_TIMEOUT, SessionRegistry, VisitorSession};
