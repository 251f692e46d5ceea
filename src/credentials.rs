//! Per-keyword credential bundles and history sessions.

use crate::cache::CacheStore;
use crate::error::Result;
use crate::models::CredentialBundle;
use crate::session::Session;
use std::sync::Arc;

/// Lifetime of cached bundles and history sessions, in seconds.
pub const CREDENTIAL_TTL_SECS: u64 = 36000;

/// Keyword-indexed view over the cache store.
///
/// A bundle is written as a single entry, so readers see either every field
/// from one `put` or nothing.
#[derive(Debug, Clone)]
pub struct CredentialCache {
    cache: Arc<CacheStore>,
}

impl CredentialCache {
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self { cache }
    }

    fn bundle_key(keyword: &str) -> String {
        format!("credentials/{}", keyword)
    }

    fn history_key(keyword: &str) -> String {
        format!("history-session/{}", keyword)
    }

    pub fn put(&self, keyword: &str, bundle: &CredentialBundle) -> Result<()> {
        self.cache
            .set_json(&Self::bundle_key(keyword), bundle, CREDENTIAL_TTL_SECS)?;
        tracing::debug!("Cached credential bundle for {}", keyword);
        Ok(())
    }

    pub fn fetch(&self, keyword: &str) -> Option<CredentialBundle> {
        let bundle = self.cache.get_json(&Self::bundle_key(keyword));
        if bundle.is_none() {
            tracing::debug!("No cached credential bundle for {}", keyword);
        }
        bundle
    }

    pub fn put_history_session(&self, keyword: &str, session: &Session) -> Result<()> {
        self.cache
            .set(&Self::history_key(keyword), &session.to_bytes()?, CREDENTIAL_TTL_SECS)
    }

    pub fn history_session(&self, keyword: &str) -> Option<Session> {
        let bytes = self.cache.get(&Self::history_key(keyword))?;
        Session::from_bytes(session_identity(keyword), &bytes)
            .map_err(|e| tracing::debug!("Discarding history session for {}: {}", keyword, e))
            .ok()
    }
}

fn session_identity(keyword: &str) -> String {
    format!("history:{}", keyword)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;
    use url::Url;

    fn bundle(tag: &str) -> CredentialBundle {
        CredentialBundle {
            uin: format!("{}-uin", tag),
            key: format!("{}-key", tag),
            biz: format!("{}-biz", tag),
            pass_ticket: format!("{}-ticket", tag),
            msgid: format!("{}-msgid", tag),
        }
    }

    #[test]
    fn test_put_then_fetch() {
        let creds = CredentialCache::new(Arc::new(CacheStore::in_memory()));
        assert_eq!(creds.fetch("kw"), None);

        assert_ok!(creds.put("kw", &bundle("a")));
        assert_eq!(creds.fetch("kw"), Some(bundle("a")));
    }

    #[test]
    fn test_overwrite_never_mixes_fields() {
        let creds = CredentialCache::new(Arc::new(CacheStore::in_memory()));
        assert_ok!(creds.put("kw", &bundle("old")));
        assert_ok!(creds.put("kw", &bundle("new")));
        assert_eq!(creds.fetch("kw"), Some(bundle("new")));
    }

    #[test]
    fn test_empty_fields_are_preserved() {
        let creds = CredentialCache::new(Arc::new(CacheStore::in_memory()));
        let sparse = CredentialBundle {
            uin: "1".into(),
            ..Default::default()
        };
        assert_ok!(creds.put("kw", &sparse));
        assert_eq!(creds.fetch("kw"), Some(sparse));
    }

    #[test]
    fn test_concurrent_keywords_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let creds = CredentialCache::new(Arc::new(CacheStore::open(dir.path()).unwrap()));

        let handles: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|kw| {
                let creds = creds.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        creds.put(kw, &bundle(kw)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(creds.fetch("a"), Some(bundle("a")));
        assert_eq!(creds.fetch("b"), Some(bundle("b")));
    }

    #[test]
    fn test_history_session_round_trip() {
        let creds = CredentialCache::new(Arc::new(CacheStore::in_memory()));
        assert!(creds.history_session("kw").is_none());

        let origin = Url::parse("http://mp.weixin.qq.com/profile_ext").unwrap();
        let mut session = Session::new("default");
        session.store_set_cookies(["wxuin=42; path=/"].into_iter(), &origin);
        assert_ok!(creds.put_history_session("kw", &session));

        let restored = creds.history_session("kw").unwrap();
        assert_eq!(restored.cookie_header(&origin).as_deref(), Some("wxuin=42"));
    }
}
