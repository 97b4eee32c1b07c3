//! UTM parameter capture.
//!
//! - [`UtmParameter`]: per-request resolver and accessors
//! - [`ParameterSet`]: the captured `utm_*` values
//! - [`Whitelist`]: which suffixes are recognized
//! - [`helpers`]: template helpers and directives
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use utm_parameter::session::SessionRegistry;
//! use utm_parameter::utm::{UtmParameter, UtmSettings};
//!
//! let session = SessionRegistry::new().create().unwrap();
//! let mut utm = UtmParameter::new(UtmSettings::default(), Arc::new(session));
//! utm.boot([("utm_source", "google"), ("page", "2")]).unwrap();
//!
//! assert_eq!(utm.get("source"), Some("google"));
//! assert!(utm.has("utm_source", Some("google")));
//! assert_eq!(utm.get("page"), None);
//! ```

pub mod helpers;
mod parameters;
mod resolver;
mod sanitize;

pub use helpers::UtmDirective;
pub use parameters::{
    DEFAULT_ALLOWED_SUFFIXES, ParameterSet, UTM_PREFIX, Whitelist, ensure_utm_prefix,
};
pub use resolver::{
    DEFAULT_SESSION_KEY, Resolution, UtmParameter, UtmSettings, extract_parameters, resolve,
};
pub use sanitize::escape_html;
