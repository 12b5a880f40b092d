//! In-memory session table.
//!
//! A session remembers one successful password authentication: the user id
//! and the passphrase-derived symmetric key, so subsequent requests can
//! re-unlock the user without re-running the KDF. Sessions die after
//! `idle_timeout` of inactivity or `life_timeout` since creation, whichever
//! comes first. All operations run under one lock.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::RngCore;

use kstor_crypto::SecretKey;

const SESSION_ID_BYTES: usize = 16;

struct Session {
    user_id: i64,
    secret_key: SecretKey,
    created_at: Instant,
    updated_at: Instant,
}

impl Session {
    fn expired(&self, now: Instant, idle: Duration, life: Duration) -> bool {
        now.duration_since(self.created_at) > life || now.duration_since(self.updated_at) > idle
    }
}

pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    idle_timeout: Duration,
    life_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration, life_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
            life_timeout,
        }
    }

    /// Register a fresh session and return its id (random, URL-safe).
    pub fn create(&self, user_id: i64, secret_key: SecretKey) -> String {
        let id = new_session_id();
        let now = Instant::now();
        self.sessions.lock().insert(
            id.clone(),
            Session {
                user_id,
                secret_key,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// Look up a live session, refreshing its idle timer. Expired sessions
    /// are dropped on the spot and behave as absent.
    pub fn fetch(&self, id: &str) -> Option<(i64, SecretKey)> {
        let mut sessions = self.sessions.lock();
        let now = Instant::now();
        match sessions.get_mut(id) {
            Some(session) if session.expired(now, self.idle_timeout, self.life_timeout) => {
                sessions.remove(id);
                None
            }
            Some(session) => {
                session.updated_at = now;
                Some((session.user_id, session.secret_key.clone()))
            }
            None => None,
        }
    }

    pub fn discard(&self, id: &str) {
        self.sessions.lock().remove(id);
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn new_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    kstor_crypto::armor::armor(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kstor_crypto::derive_key;

    fn key() -> SecretKey {
        derive_key("pw", None).unwrap()
    }

    #[test]
    fn create_fetch_discard() {
        let store = SessionStore::new(Duration::from_secs(60), Duration::from_secs(600));
        let id = store.create(7, key());
        let (user_id, _) = store.fetch(&id).expect("session is live");
        assert_eq!(user_id, 7);

        store.discard(&id);
        assert!(store.fetch(&id).is_none());
    }

    #[test]
    fn idle_timeout_expires_sessions() {
        let store = SessionStore::new(Duration::ZERO, Duration::from_secs(600));
        let id = store.create(7, key());
        std::thread::sleep(Duration::from_millis(10));
        assert!(store.fetch(&id).is_none());
        // And the entry is gone, not just hidden.
        assert!(store.is_empty());
    }

    #[test]
    fn life_timeout_expires_even_active_sessions() {
        let store = SessionStore::new(Duration::from_secs(600), Duration::ZERO);
        let id = store.create(7, key());
        std::thread::sleep(Duration::from_millis(10));
        assert!(store.fetch(&id).is_none());
    }

    #[test]
    fn ids_are_unique_and_url_safe() {
        let store = SessionStore::new(Duration::from_secs(60), Duration::from_secs(600));
        let a = store.create(1, key());
        let b = store.create(1, key());
        assert_ne!(a, b);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
