//! Visitor sessions and their in-memory registry.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::store::{SessionError, SessionStore};
use crate::utm::ParameterSet;

/// Default idle timeout (30 minutes).
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

fn poisoned<T>(err: PoisonError<T>) -> SessionError {
    SessionError::Poisoned(err.to_string())
}

/// A single visitor's browsing session.
///
/// Cloning is cheap and every clone points at the same data.
#[derive(Debug)]
pub struct VisitorSession {
    inner: Arc<VisitorInner>,
}

#[derive(Debug)]
struct VisitorInner {
    /// Unique session identifier, sent to the browser as a cookie.
    id: String,
    /// Stored values, addressed by session key.
    data: RwLock<HashMap<String, ParameterSet>>,
    created_at: DateTime<Utc>,
    last_activity: RwLock<DateTime<Utc>>,
}

impl Clone for VisitorSession {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl VisitorSession {
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            inner: Arc::new(VisitorInner {
                id,
                data: RwLock::new(HashMap::new()),
                created_at: now,
                last_activity: RwLock::new(now),
            }),
        }
    }

    /// Get the session ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Update the last activity timestamp.
    pub fn touch(&self) {
        let mut guard = self
            .inner
            .last_activity
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Utc::now();
    }

    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        *self
            .inner
            .last_activity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Check whether the session has been idle longer than `timeout`.
    #[must_use]
    pub fn is_expired_with_timeout(&self, timeout: Duration) -> bool {
        // Negative durations (clock skew) count as fresh.
        (Utc::now() - self.last_activity())
            .to_std()
            .is_ok_and(|idle| idle > timeout)
    }

    #[must_use]
    pub fn age(&self) -> Duration {
        (Utc::now() - self.inner.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

impl SessionStore for VisitorSession {
    fn get(&self, key: &str) -> Result<Option<ParameterSet>, SessionError> {
        let guard = self.inner.data.read().map_err(poisoned)?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, parameters: ParameterSet) -> Result<(), SessionError> {
        let mut guard = self.inner.data.write().map_err(poisoned)?;
        guard.insert(key.to_string(), parameters);
        drop(guard);
        self.touch();
        Ok(())
    }

    fn forget(&self, key: &str) -> Result<(), SessionError> {
        let mut guard = self.inner.data.write().map_err(poisoned)?;
        guard.remove(key);
        drop(guard);
        self.touch();
        Ok(())
    }
}

/// Thread-safe registry of visitor sessions.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Debug)]
struct RegistryInner {
    sessions: RwLock<HashMap<String, VisitorSession>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Create a session with a fresh UUID.
    pub fn create(&self) -> Result<VisitorSession, SessionError> {
        self.create_with_id(Uuid::new_v4().to_string())
    }

    /// Create (or replace) a session with a specific ID.
    pub fn create_with_id(&self, id: impl Into<String>) -> Result<VisitorSession, SessionError> {
        let id = id.into();
        let session = VisitorSession::new(id.clone());
        let mut guard = self.inner.sessions.write().map_err(poisoned)?;
        guard.insert(id, session.clone());
        Ok(session)
    }

    pub fn get(&self, id: &str) -> Result<Option<VisitorSession>, SessionError> {
        let guard = self.inner.sessions.read().map_err(poisoned)?;
        Ok(guard.get(id).cloned())
    }

    pub fn get_or_create(&self, id: &str) -> Result<VisitorSession, SessionError> {
        if let Some(session) = self.get(id)? {
            return Ok(session);
        }
        self.create_with_id(id)
    }

    pub fn remove(&self, id: &str) -> Result<Option<VisitorSession>, SessionError> {
        let mut guard = self.inner.sessions.write().map_err(poisoned)?;
        Ok(guard.remove(id))
    }

    pub fn len(&self) -> Result<usize, SessionError> {
        Ok(self.inner.sessions.read().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, SessionError> {
        Ok(self.len()? == 0)
    }

    /// Drop sessions idle longer than `timeout`, returning how many went.
    pub fn cleanup_expired_with_timeout(&self, timeout: Duration) -> Result<usize, SessionError> {
        let mut guard = self.inner.sessions.write().map_err(poisoned)?;
        let before = guard.len();
        guard.retain(|_, session| !session.is_expired_with_timeout(timeout));
        Ok(before - guard.len())
    }

    pub fn cleanup_expired(&self) -> Result<usize, SessionError> {
        self.cleanup_expired_with_timeout(DEFAULT_IDLE_TIMEOUT)
    }

    pub fn list_ids(&self) -> Result<Vec<String>, SessionError> {
        Ok(self
            .inner
            .sessions
            .read()
            .map_err(poisoned)?
            .keys()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParameterSet {
        [("utm_source", "google")].into_iter().collect()
    }

    #[test]
    fn test_session_get_set_forget() {
        let session = VisitorSession::new("visitor-1".to_string());
        assert_eq!(session.id(), "visitor-1");
        assert!(session.get("utm").unwrap().is_none());

        session.set("utm", sample()).unwrap();
        assert_eq!(session.get("utm").unwrap(), Some(sample()));

        session.forget("utm").unwrap();
        assert!(session.get("utm").unwrap().is_none());
    }

    #[test]
    fn test_clones_share_data() {
        let session = VisitorSession::new("visitor-2".to_string());
        let other = session.clone();
        other.set("utm", sample()).unwrap();
        assert_eq!(session.get("utm").unwrap(), Some(sample()));
    }

    #[test]
    fn test_registry_lifecycle() {
        let registry = SessionRegistry::new();
        assert!(registry.is_empty().unwrap());

        let session = registry.create().unwrap();
        assert_eq!(registry.len().unwrap(), 1);

        let retrieved = registry.get(session.id()).unwrap().unwrap();
        assert_eq!(retrieved.id(), session.id());

        let same = registry.get_or_create(session.id()).unwrap();
        assert_eq!(same.id(), session.id());
        assert_eq!(registry.len().unwrap(), 1);

        registry.remove(session.id()).unwrap();
        assert!(registry.is_empty().unwrap());
    }

    #[test]
    fn test_get_or_create_uses_given_id() {
        let registry = SessionRegistry::new();
        let session = registry.get_or_create("known-id").unwrap();
        assert_eq!(session.id(), "known-id");
        assert_eq!(registry.list_ids().unwrap(), vec!["known-id".to_string()]);
    }

    #[test]
    fn test_cleanup_expired() {
        let registry = SessionRegistry::new();
        registry.create().unwrap();
        registry.create().unwrap();

        assert_eq!(registry.cleanup_expired().unwrap(), 0);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(
            registry
                .cleanup_expired_with_timeout(Duration::from_millis(5))
                .unwrap(),
            2
        );
        assert!(registry.is_empty().unwrap());
    }
}
