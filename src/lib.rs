//! UTM Parameter
//!
//! Captures marketing attribution (`utm_source`, `utm_medium`, ...) from
//! incoming requests, keeps it in the visitor's session, and exposes it to
//! handlers and templates.
//!
//! # Architecture
//!
//! - **Resolver**: decides between request and session values per request
//! - **Session**: per-visitor storage behind a narrow get/set/forget trait
//! - **Middleware**: Axum layer that runs the resolver for GET requests
//! - **Server**: demo routes exposing the captured parameters
//!
//! # Modules
//!
//! - [`utm`]: parameter sets, resolution, sanitization and template helpers
//! - [`session`]: session store contract and the in-memory registry
//! - [`middleware`]: request interception
//! - [`config`]: layered configuration

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod config;
pub mod middleware;
pub mod server;
pub mod session;
pub mod utm;

use crate::config::AppConfig;

use session::SessionRegistry;
use std::sync::Arc;
use utm::UtmSettings;

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Visitor sessions, addressed by cookie.
    pub sessions: SessionRegistry,
    /// Resolver settings derived from the tracking config.
    pub utm: Arc<UtmSettings>,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            utm: Arc::new(UtmSettings::from(&config.tracking)),
            config,
        }
    }
}
