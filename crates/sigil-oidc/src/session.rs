//! Resource-owner session and grant state.
//!
//! Sessions are owned by an external collaborator (the authentication
//! UI and its store); the core only reads them to decide whether
//! authentication and consent can be skipped, and serializes transitions
//! per session because prompt and consent decisions are sequential for a
//! single resource owner.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

/// An authenticated resource-owner session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque session identifier.
    pub id: String,

    /// Authenticated subject.
    pub subject: String,

    /// When the resource owner last authenticated.
    pub authenticated_at: DateTime<Utc>,

    /// Clients the resource owner has granted, with the granted scopes.
    pub consents: HashMap<String, HashSet<String>>,
}

impl Session {
    /// Creates a session authenticated now.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            subject: subject.into(),
            authenticated_at: Utc::now(),
            consents: HashMap::new(),
        }
    }

    /// Returns the authentication age in seconds.
    #[must_use]
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.authenticated_at).num_seconds()
    }

    /// Records a consent grant for a client.
    pub fn record_consent(&mut self, client_id: impl Into<String>, scopes: &[String]) {
        self.consents
            .entry(client_id.into())
            .or_default()
            .extend(scopes.iter().cloned());
    }

    /// Returns whether every requested scope was previously granted to
    /// the client.
    #[must_use]
    pub fn has_consent(&self, client_id: &str, scopes: &[String]) -> bool {
        self.consents
            .get(client_id)
            .is_some_and(|granted| scopes.iter().all(|s| granted.contains(s)))
    }
}

/// Read/write access to the session store.
pub trait SessionStore: Send + Sync {
    /// Looks up a session by identifier.
    fn get_session(&self, session_id: &str) -> Option<Session>;

    /// Persists a session, replacing any previous state.
    fn put_session(&self, session: Session);
}

/// In-memory session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_session(&self, session_id: &str) -> Option<Session> {
        self.sessions.lock().get(session_id).cloned()
    }

    fn put_session(&self, session: Session) {
        self.sessions.lock().insert(session.id.clone(), session);
    }
}

/// Per-session transition locks.
///
/// Transitions for one session are serialized; distinct sessions proceed
/// in parallel. Locks are created on first use and shared by id.
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for a session id.
    #[must_use]
    pub fn for_session(&self, session_id: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .lock()
                .entry(session_id.to_string())
                .or_default(),
        )
    }
}
