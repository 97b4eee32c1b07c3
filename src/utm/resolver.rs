//! Request/session resolution and the accessor surface.

use std::sync::Arc;

use tracing::{debug, info};

use super::parameters::{ParameterSet, Whitelist, ensure_utm_prefix};
use super::sanitize::escape_html;
use crate::config::TrackingConfig;
use crate::session::{SessionError, SessionStore};

/// Session key used when none is configured.
pub const DEFAULT_SESSION_KEY: &str = "utm";

/// Resolver settings: where the set lives and how new values are treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtmSettings {
    /// Session key the set is stored under.
    pub session_key: String,
    /// Let later requests overwrite keys already in the session.
    pub override_parameters: bool,
    pub whitelist: Whitelist,
}

impl Default for UtmSettings {
    fn default() -> Self {
        Self {
            session_key: DEFAULT_SESSION_KEY.to_string(),
            override_parameters: false,
            whitelist: Whitelist::default(),
        }
    }
}

impl From<&TrackingConfig> for UtmSettings {
    fn from(config: &TrackingConfig) -> Self {
        let session_key = if config.session_key.trim().is_empty() {
            DEFAULT_SESSION_KEY.to_string()
        } else {
            config.session_key.clone()
        };
        Self {
            session_key,
            override_parameters: config.override_utm_parameters,
            whitelist: Whitelist::new(&config.allowed_utm_parameters),
        }
    }
}

/// Outcome of resolving a request against the stored set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing was stored yet; the request's parameters become the set.
    Captured(ParameterSet),
    /// Override is on; the request's parameters were laid over the stored set.
    Merged(ParameterSet),
    /// The stored set stays as it is. No write happens.
    Kept(Option<ParameterSet>),
}

impl Resolution {
    /// The set to write back to the session, if any.
    #[must_use]
    pub fn to_store(&self) -> Option<&ParameterSet> {
        match self {
            Self::Captured(set) | Self::Merged(set) => Some(set),
            Self::Kept(_) => None,
        }
    }

    /// The set the request should see.
    #[must_use]
    pub fn into_effective(self) -> Option<ParameterSet> {
        match self {
            Self::Captured(set) | Self::Merged(set) => Some(set),
            Self::Kept(set) => set,
        }
    }
}

/// Keep whitelisted `utm_*` pairs and escape their values.
pub fn extract_parameters<I, K, V>(request_params: I, whitelist: &Whitelist) -> ParameterSet
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    request_params
        .into_iter()
        .filter(|(key, _)| whitelist.allows(key.as_ref()))
        .map(|(key, value)| (key.as_ref().to_string(), escape_html(value.as_ref())))
        .collect()
}

/// Decide which set wins for this request.
///
/// A request without qualifying parameters never touches the stored set, so
/// internal navigation after a campaign landing keeps its attribution.
pub fn resolve<I, K, V>(
    request_params: I,
    session_params: Option<ParameterSet>,
    override_policy: bool,
    whitelist: &Whitelist,
) -> Resolution
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let current = extract_parameters(request_params, whitelist);
    if current.is_empty() {
        return Resolution::Kept(session_params);
    }

    match session_params {
        Some(stored) if !stored.is_empty() => {
            if override_policy {
                Resolution::Merged(stored.merged_with(&current))
            } else {
                Resolution::Kept(Some(stored))
            }
        }
        _ => Resolution::Captured(current),
    }
}

/// UTM parameters of the current visitor.
///
/// Owns its settings and a handle to the visitor's session; one instance
/// serves one request.
#[derive(Debug, Clone)]
pub struct UtmParameter {
    parameters: Option<ParameterSet>,
    settings: UtmSettings,
    store: Arc<dyn SessionStore>,
}

impl UtmParameter {
    pub fn new(settings: UtmSettings, store: Arc<dyn SessionStore>) -> Self {
        Self {
            parameters: None,
            settings,
            store,
        }
    }

    /// Seed the in-memory set without consulting the session.
    #[must_use]
    pub fn with_parameters(mut self, parameters: ParameterSet) -> Self {
        self.parameters = Some(parameters);
        self
    }

    #[must_use]
    pub fn settings(&self) -> &UtmSettings {
        &self.settings
    }

    /// Resolve the request's query pairs against the session.
    pub fn boot<I, K, V>(&mut self, request_params: I) -> Result<&mut Self, SessionError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.parameters = self.use_request_or_session(request_params)?;
        Ok(self)
    }

    /// Pick up whatever the session holds, without resolving a request.
    pub fn load(&mut self) -> Result<&mut Self, SessionError> {
        self.parameters = self.store.get(&self.settings.session_key)?;
        Ok(self)
    }

    /// Resolve and persist, returning the effective set.
    pub fn use_request_or_session<I, K, V>(
        &self,
        request_params: I,
    ) -> Result<Option<ParameterSet>, SessionError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let key = &self.settings.session_key;
        let stored = self.store.get(key)?;
        let resolution = resolve(
            request_params,
            stored,
            self.settings.override_parameters,
            &self.settings.whitelist,
        );

        match &resolution {
            Resolution::Captured(set) => info!(
                name: "utm.parameters.captured",
                session_key = %key,
                count = set.len(),
                "UTM parameters captured"
            ),
            Resolution::Merged(set) => info!(
                name: "utm.parameters.merged",
                session_key = %key,
                count = set.len(),
                "UTM parameters merged into session"
            ),
            Resolution::Kept(_) => debug!(session_key = %key, "Keeping stored UTM parameters"),
        }

        if let Some(set) = resolution.to_store() {
            self.store.set(key, set.clone())?;
        }
        Ok(resolution.into_effective())
    }

    /// All parameters, empty when nothing is stored.
    #[must_use]
    pub fn all(&self) -> ParameterSet {
        self.parameters.clone().unwrap_or_default()
    }

    /// The current set, `None` once cleared.
    #[must_use]
    pub fn parameters(&self) -> Option<&ParameterSet> {
        self.parameters.as_ref()
    }

    /// Value for `key`; `source` and `utm_source` are the same lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.parameters.as_ref()?.get(&ensure_utm_prefix(key))
    }

    /// Key exists and, if `value` is given, equals it exactly.
    #[must_use]
    pub fn has(&self, key: &str, value: Option<&str>) -> bool {
        match (self.get(key), value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(stored), Some(expected)) => stored == expected,
        }
    }

    #[must_use]
    pub fn has_not(&self, key: &str, value: Option<&str>) -> bool {
        !self.has(key, value)
    }

    /// Key exists and its value contains `value`.
    #[must_use]
    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.get(key).is_some_and(|stored| stored.contains(value))
    }

    #[must_use]
    pub fn contains_not(&self, key: &str, value: &str) -> bool {
        !self.contains(key, value)
    }

    /// `contains` for dynamically typed values. Anything but a string is false.
    #[must_use]
    pub fn contains_value(&self, key: &str, value: &serde_json::Value) -> bool {
        value.as_str().is_some_and(|value| self.contains(key, value))
    }

    /// Remove the set from the session and forget it locally.
    pub fn clear(&mut self) -> Result<bool, SessionError> {
        self.store.forget(&self.settings.session_key)?;
        self.parameters = None;
        info!(
            name: "utm.parameters.cleared",
            session_key = %self.settings.session_key,
            "UTM parameters cleared"
        );
        Ok(true)
    }
}
