//! # Sessions
//!
//! In-memory server-side sessions identified by a cookie. The CSRF token
//! of a client lives in its session under [`CSRF_SESSION_KEY`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Cookie carrying the session id
pub const SESSION_COOKIE: &str = "strata_session";

/// Session key holding the CSRF token
pub const CSRF_SESSION_KEY: &str = "csrf_token";

/// Handle to one client's session data
///
/// Clones share the same data, so writes made by a handler are visible to
/// the next request carrying the same cookie.
#[derive(Clone, Default)]
pub struct Session {
    id: String,
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl Session {
    /// Fresh session with a random id
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            data: Arc::default(),
        }
    }

    /// Session id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Stored value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Whether `key` is stored
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Store a value
    pub fn set(&self, key: &str, value: impl Into<String>) {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.into());
    }

    /// Remove a value, returning it
    pub fn remove(&self, key: &str) -> Option<String> {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    /// Drop every stored value
    pub fn clear(&self) {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// CSRF token of this session, generated on first use
    #[must_use]
    pub fn csrf_token(&self) -> String {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.entry(CSRF_SESSION_KEY.to_string())
            .or_insert_with(|| Uuid::new_v4().simple().to_string())
            .clone()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}

struct Entry {
    session: Session,
    last_accessed: Instant,
}

/// Process-wide session registry with idle expiry
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Entry>>>,
    max_age: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(2 * 60 * 60))
    }
}

impl SessionStore {
    /// Store whose sessions expire after `max_age` of inactivity
    #[must_use]
    pub fn new(max_age: Duration) -> Self {
        Self {
            sessions: Arc::default(),
            max_age,
        }
    }

    /// Idle lifetime of a session
    #[must_use]
    pub const fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Session for `id`, or a new one when the id is unknown or expired
    ///
    /// The flag is `true` when a new session was created and the client
    /// needs a fresh cookie.
    pub fn ensure(&self, id: Option<&str>) -> (Session, bool) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        if let Some(id) = id.filter(|id| !id.is_empty()) {
            match sessions.get_mut(id) {
                Some(entry) if now.duration_since(entry.last_accessed) <= self.max_age => {
                    entry.last_accessed = now;
                    return (entry.session.clone(), false);
                }
                Some(_) => {
                    sessions.remove(id);
                }
                None => {}
            }
        }

        let session = Session::new();
        sessions.insert(
            session.id.clone(),
            Entry {
                session: session.clone(),
                last_accessed: now,
            },
        );
        (session, true)
    }

    /// Forget a session
    pub fn destroy(&self, id: &str) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    /// Drop expired sessions
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, entry| now.duration_since(entry.last_accessed) <= self.max_age);
    }

    /// Number of live sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no session is live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `Set-Cookie` value for `session`
    #[must_use]
    pub fn cookie(&self, session: &Session) -> String {
        format!(
            "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            session.id,
            self.max_age.as_secs()
        )
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.len())
            .field("max_age", &self.max_age)
            .finish()
    }
}

/// Session id from a `Cookie` header
#[must_use]
pub fn session_id_from_cookie(header: Option<&str>) -> Option<String> {
    header?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}
