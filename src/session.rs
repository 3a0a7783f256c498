// Session state
// Current primes and keys per session, behind an injectable store

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{RsaError, RsaResult};
use crate::rsa::{PrimePair, RsaKeyPair};

pub type SessionId = String;

/// Session used when a request names none
pub const DEFAULT_SESSION: &str = "default";

/// At most one prime pair and one key pair
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub primes: Option<Arc<PrimePair>>,
    pub keys: Option<Arc<RsaKeyPair>>,
}

/// Storage for session state. Each mutation is atomic with respect to
/// concurrent readers of the same session. Only the default session and
/// ids returned by `create` are known; any other id is `SessionNotFound`.
pub trait SessionStore: Send + Sync {
    /// Register a fresh, empty session
    fn create(&self) -> SessionId;

    /// Current state of a session
    fn snapshot(&self, id: &str) -> RsaResult<SessionState>;

    /// Store new primes; any previously derived keys are dropped
    fn replace_primes(&self, id: &str, primes: PrimePair) -> RsaResult<Arc<PrimePair>>;

    /// Store keys derived from `source`, provided those primes are still current
    fn replace_keys(&self, id: &str, keys: RsaKeyPair, source: &Arc<PrimePair>) -> RsaResult<Arc<RsaKeyPair>>;

    /// Drop primes and keys, keeping the session
    fn clear(&self, id: &str) -> RsaResult<()>;

    /// Forget a created session entirely. The default session cannot be removed.
    fn remove(&self, id: &str) -> RsaResult<()>;

    fn session_count(&self) -> usize;
}

/// In-memory store keyed by session id
pub struct InMemorySessionStore {
    sessions: DashMap<SessionId, Arc<RwLock<SessionState>>>,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        let sessions = DashMap::new();
        sessions.insert(DEFAULT_SESSION.to_string(), Arc::default());
        Self { sessions }
    }

    fn session(&self, id: &str) -> RsaResult<Arc<RwLock<SessionState>>> {
        self.sessions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RsaError::SessionNotFound(format!("no session with id {:?}", id)))
    }

    fn write(lock: &RwLock<SessionState>) -> RsaResult<RwLockWriteGuard<'_, SessionState>> {
        lock.write()
            .map_err(|_| RsaError::Internal("session lock poisoned".to_string()))
    }

    fn read(lock: &RwLock<SessionState>) -> RsaResult<RwLockReadGuard<'_, SessionState>> {
        lock.read()
            .map_err(|_| RsaError::Internal("session lock poisoned".to_string()))
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self) -> SessionId {
        let id = Uuid::new_v4().to_string();
        self.sessions.insert(id.clone(), Arc::default());
        log::info!("Session created: {}", id);
        id
    }

    fn snapshot(&self, id: &str) -> RsaResult<SessionState> {
        let lock = self.session(id)?;
        let state = Self::read(&lock)?;
        Ok(state.clone())
    }

    fn replace_primes(&self, id: &str, primes: PrimePair) -> RsaResult<Arc<PrimePair>> {
        let lock = self.session(id)?;
        let mut state = Self::write(&lock)?;
        let primes = Arc::new(primes);
        state.primes = Some(Arc::clone(&primes));
        if state.keys.take().is_some() {
            log::debug!("Session {}: new primes invalidated the previous keys", id);
        }
        Ok(primes)
    }

    fn replace_keys(&self, id: &str, keys: RsaKeyPair, source: &Arc<PrimePair>) -> RsaResult<Arc<RsaKeyPair>> {
        let lock = self.session(id)?;
        let mut state = Self::write(&lock)?;
        match &state.primes {
            Some(current) if Arc::ptr_eq(current, source) => {
                let keys = Arc::new(keys);
                state.keys = Some(Arc::clone(&keys));
                Ok(keys)
            }
            Some(_) => Err(RsaError::MissingPrerequisite(
                "primes were replaced while keys were being derived".to_string(),
            )),
            None => Err(RsaError::MissingPrerequisite(
                "primes were cleared while keys were being derived".to_string(),
            )),
        }
    }

    fn clear(&self, id: &str) -> RsaResult<()> {
        let lock = self.session(id)?;
        let mut state = Self::write(&lock)?;
        *state = SessionState::default();
        log::info!("Session {} cleared", id);
        Ok(())
    }

    fn remove(&self, id: &str) -> RsaResult<()> {
        if id == DEFAULT_SESSION {
            return Err(RsaError::InvalidParameter("the default session cannot be removed".to_string()));
        }
        match self.sessions.remove(id) {
            Some(_) => {
                log::info!("Session {} removed", id);
                Ok(())
            }
            None => Err(RsaError::SessionNotFound(format!("no session with id {:?}", id))),
        }
    }

    fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rsa::bigint::from_u64;
    use crate::rsa::{derive_from_pair, ExponentChoice, LargePrime};
    use std::time::Duration;

    fn prime(value: u64) -> LargePrime {
        LargePrime {
            value: from_u64(value),
            bit_length: 6,
            rounds: 10,
            generation_time: Duration::from_millis(1),
        }
    }

    fn textbook_pair() -> PrimePair {
        PrimePair {
            p: prime(61),
            q: prime(53),
            bit_length: 6,
            miller_rabin_rounds: 10,
            generation_time: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_default_session_starts_empty() {
        let store = InMemorySessionStore::new();
        let state = store.snapshot(DEFAULT_SESSION).unwrap();
        assert!(state.primes.is_none());
        assert!(state.keys.is_none());
        assert_eq!(store.session_count(), 1);
    }

    #[test]
    fn test_unknown_session_rejected() {
        let store = InMemorySessionStore::new();
        for _ in 0..50 {
            let err = store.replace_primes("nobody", textbook_pair()).unwrap_err();
            assert_eq!(err.kind(), "session_not_found");
            assert_eq!(store.clear("nobody").unwrap_err().kind(), "session_not_found");
        }
        assert_eq!(store.snapshot("nobody").unwrap_err().kind(), "session_not_found");
        assert_eq!(store.session_count(), 1);
    }

    #[test]
    fn test_remove_session() {
        let store = InMemorySessionStore::new();
        let id = store.create();
        store.replace_primes(&id, textbook_pair()).unwrap();
        assert_eq!(store.session_count(), 2);

        store.remove(&id).unwrap();
        assert_eq!(store.session_count(), 1);
        assert_eq!(store.snapshot(&id).unwrap_err().kind(), "session_not_found");
        assert_eq!(store.remove(&id).unwrap_err().kind(), "session_not_found");
        assert_eq!(store.remove(DEFAULT_SESSION).unwrap_err().kind(), "invalid_parameter");
    }

    #[test]
    fn test_new_primes_invalidate_keys() {
        let store = InMemorySessionStore::new();
        let primes = store.replace_primes(DEFAULT_SESSION, textbook_pair()).unwrap();
        let keys = derive_from_pair(&primes, &ExponentChoice::Fixed(from_u64(17))).unwrap();
        store.replace_keys(DEFAULT_SESSION, keys, &primes).unwrap();
        assert!(store.snapshot(DEFAULT_SESSION).unwrap().keys.is_some());

        store.replace_primes(DEFAULT_SESSION, textbook_pair()).unwrap();
        let state = store.snapshot(DEFAULT_SESSION).unwrap();
        assert!(state.primes.is_some());
        assert!(state.keys.is_none());
    }

    #[test]
    fn test_stale_keys_rejected() {
        let store = InMemorySessionStore::new();
        let old = store.replace_primes(DEFAULT_SESSION, textbook_pair()).unwrap();
        let keys = derive_from_pair(&old, &ExponentChoice::Fixed(from_u64(17))).unwrap();
        store.replace_primes(DEFAULT_SESSION, textbook_pair()).unwrap();

        let err = store.replace_keys(DEFAULT_SESSION, keys, &old).unwrap_err();
        assert_eq!(err.kind(), "missing_prerequisite");
        assert!(store.snapshot(DEFAULT_SESSION).unwrap().keys.is_none());
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = InMemorySessionStore::new();
        let a = store.create();
        let b = store.create();
        assert_ne!(a, b);

        store.replace_primes(&a, textbook_pair()).unwrap();
        assert!(store.snapshot(&a).unwrap().primes.is_some());
        assert!(store.snapshot(&b).unwrap().primes.is_none());

        store.clear(&a).unwrap();
        assert!(store.snapshot(&a).unwrap().primes.is_none());
        assert_eq!(store.session_count(), 3);
    }
}
