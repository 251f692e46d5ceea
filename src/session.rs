//! Cookie-carrying sessions and their per-identity lifecycle.

use crate::cache::CacheStore;
use crate::error::{FetchError, Result};
use cookie_store::{serde::json, CookieStore, RawCookie};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use url::Url;

/// Cookie state attached to a named identity.
#[derive(Debug, Clone)]
pub struct Session {
    identity: String,
    cookies: CookieStore,
}

impl Session {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            cookies: CookieStore::default(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// `Cookie` header value for a request to `url`, if any cookie applies.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        let header = self
            .cookies
            .get_request_values(url)
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        (!header.is_empty()).then_some(header)
    }

    /// Absorb `Set-Cookie` header values received from `url`.
    pub fn store_set_cookies<'a>(&mut self, values: impl Iterator<Item = &'a str>, url: &Url) {
        let cookies = values.filter_map(|value| RawCookie::parse(value.to_owned()).ok());
        self.cookies.store_response_cookies(cookies, url);
    }

    pub fn cookie_count(&self) -> usize {
        self.cookies.iter_unexpired().count()
    }

    /// Serialize the cookie jar, including session-only cookies.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Vec::new();
        json::save_incl_expired_and_nonpersistent(&self.cookies, &mut writer)
            .map_err(|e| FetchError::Cache(format!("Failed to serialize session: {}", e)))?;
        Ok(writer)
    }

    pub fn from_bytes(identity: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let cookies = json::load_all(bytes)
            .map_err(|e| FetchError::Cache(format!("Failed to restore session: {}", e)))?;
        Ok(Self {
            identity: identity.into(),
            cookies,
        })
    }
}

/// Exclusive handle on a session for the duration of one orchestration.
pub type SessionLease = tokio::sync::OwnedMutexGuard<Session>;

type Slot = Arc<tokio::sync::Mutex<Session>>;

/// Owns every live session and serializes access per identity.
///
/// Sessions are restored from the cache on first use and written back after
/// each accepted unblock and on [`SessionManager::flush`].
#[derive(Debug)]
pub struct SessionManager {
    cache: Arc<CacheStore>,
    ttl_secs: u64,
    slots: Mutex<HashMap<String, Slot>>,
}

impl SessionManager {
    pub fn new(cache: Arc<CacheStore>, ttl_secs: u64) -> Self {
        Self {
            cache,
            ttl_secs,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache_key(identity: &str) -> String {
        format!("session/{}", identity)
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cache I/O for a new identity happens outside the map lock. If two
    /// callers race, the first inserted slot wins.
    fn slot(&self, identity: &str) -> Slot {
        if let Some(slot) = self.lock_slots().get(identity) {
            return slot.clone();
        }

        let restored = Arc::new(tokio::sync::Mutex::new(self.restore(identity)));
        self.lock_slots()
            .entry(identity.to_string())
            .or_insert(restored)
            .clone()
    }

    fn restore(&self, identity: &str) -> Session {
        let Some(bytes) = self.cache.get(&Self::cache_key(identity)) else {
            tracing::debug!("No cached session for {}, starting fresh", identity);
            return Session::new(identity);
        };
        match Session::from_bytes(identity, &bytes) {
            Ok(session) => {
                tracing::debug!(
                    "Restored session {} with {} cookies",
                    identity,
                    session.cookie_count()
                );
                session
            }
            Err(e) => {
                tracing::warn!("Discarding cached session {}: {}", identity, e);
                Session::new(identity)
            }
        }
    }

    /// Wait for exclusive access to the session for `identity`.
    pub async fn lease(&self, identity: &str) -> SessionLease {
        self.slot(identity).lock_owned().await
    }

    /// Write `session` to the cache.
    pub fn persist(&self, session: &Session) -> Result<()> {
        let bytes = session.to_bytes()?;
        self.cache
            .set(&Self::cache_key(session.identity()), &bytes, self.ttl_secs)?;
        tracing::debug!("Persisted session {}", session.identity());
        Ok(())
    }

    /// Persist every session not currently leased. Returns how many were written.
    pub fn flush(&self) -> usize {
        let slots: Vec<_> = self.lock_slots().values().cloned().collect();

        let mut written = 0;
        for slot in slots {
            let Ok(session) = slot.try_lock() else {
                continue;
            };
            match self.persist(&session) {
                Ok(()) => written += 1,
                Err(e) => tracing::warn!("Failed to flush session {}: {}", session.identity(), e),
            }
        }
        written
    }
}
