//! Remote JWK set resolution and caching.
//!
//! The engine never performs network I/O itself: fetching a key set is a
//! capability injected by the caller. The cache in front of it is
//! read-mostly with refresh-on-miss, and concurrent misses for the same
//! URI converge on a single in-flight fetch instead of storming the
//! remote endpoint. Waiting on someone else's fetch is bounded; on
//! timeout the caller gets [`JoseError::KeyNotFound`] rather than a hung
//! authorization transaction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{JoseError, JoseResult};
use crate::jwk::{JsonWebKey, JsonWebKeySet};

/// Capability to fetch a remote JWK set document.
///
/// Implementations own their transport and its timeout; the cache only
/// bounds how long it will wait for a fetch started by another caller.
pub trait JwksFetcher: Send + Sync {
    /// Fetches the key set published at `uri`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be retrieved or parsed.
    fn fetch(&self, uri: &str) -> JoseResult<JsonWebKeySet>;
}

impl<F> JwksFetcher for F
where
    F: Fn(&str) -> JoseResult<JsonWebKeySet> + Send + Sync,
{
    fn fetch(&self, uri: &str) -> JoseResult<JsonWebKeySet> {
        self(uri)
    }
}

#[derive(Default)]
struct Entry {
    set: Option<Arc<JsonWebKeySet>>,
    fetched_at: Option<Instant>,
    in_flight: bool,
}

/// Caching resolver for remote JWK sets, keyed by URI.
pub struct JwksCache {
    fetcher: Box<dyn JwksFetcher>,
    ttl: Duration,
    wait_timeout: Duration,
    state: Mutex<HashMap<String, Entry>>,
    fetch_done: Condvar,
}

impl JwksCache {
    /// Creates a cache over the given fetch capability.
    ///
    /// `ttl` bounds how long a fetched set is served without refresh;
    /// `wait_timeout` bounds how long a caller waits on a fetch started
    /// by another caller before giving up with `KeyNotFound`.
    #[must_use]
    pub fn new(fetcher: impl JwksFetcher + 'static, ttl: Duration, wait_timeout: Duration) -> Self {
        Self {
            fetcher: Box::new(fetcher),
            ttl,
            wait_timeout,
            state: Mutex::new(HashMap::new()),
            fetch_done: Condvar::new(),
        }
    }

    /// Resolves a key by `kid` from the key set at `uri`.
    ///
    /// A miss against the cached set triggers exactly one refresh before
    /// surfacing [`JoseError::KeyNotFound`].
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if the key is absent after a refresh or the
    /// refresh could not complete in time; propagates fetch errors.
    pub fn key(&self, uri: &str, kid: &str) -> JoseResult<JsonWebKey> {
        if let Some(set) = self.cached(uri) {
            if let Some(key) = set.find_key(kid) {
                return Ok(key.clone());
            }
        }

        let set = self.refresh(uri)?;
        set.find_key(kid)
            .cloned()
            .ok_or_else(|| JoseError::KeyNotFound(kid.to_string()))
    }

    /// Returns the key set at `uri`, fetching it if not cached.
    ///
    /// # Errors
    ///
    /// Propagates fetch errors; times out to `KeyNotFound`.
    pub fn key_set(&self, uri: &str) -> JoseResult<Arc<JsonWebKeySet>> {
        if let Some(set) = self.cached(uri) {
            return Ok(set);
        }
        self.refresh(uri)
    }

    /// Returns the cached set if present and fresh.
    fn cached(&self, uri: &str) -> Option<Arc<JsonWebKeySet>> {
        let state = self.state.lock();
        let entry = state.get(uri)?;
        let fetched_at = entry.fetched_at?;
        if fetched_at.elapsed() < self.ttl {
            entry.set.clone()
        } else {
            None
        }
    }

    /// Fetches the set at `uri`, coalescing concurrent refreshes.
    fn refresh(&self, uri: &str) -> JoseResult<Arc<JsonWebKeySet>> {
        let mut state = self.state.lock();
        loop {
            let entry = state.entry(uri.to_string()).or_default();
            if !entry.in_flight {
                entry.in_flight = true;
                break;
            }

            // Someone else is fetching this URI; wait for their result
            if self
                .fetch_done
                .wait_for(&mut state, self.wait_timeout)
                .timed_out()
            {
                return Err(JoseError::KeyNotFound(format!(
                    "timed out waiting for key set {uri}"
                )));
            }

            let entry = state.entry(uri.to_string()).or_default();
            if !entry.in_flight {
                return entry
                    .set
                    .clone()
                    .ok_or_else(|| JoseError::KeyNotFound(format!("key set {uri} unavailable")));
            }
        }
        drop(state);

        tracing::debug!(uri, "refreshing remote JWK set");
        let fetched = self.fetcher.fetch(uri);

        let mut state = self.state.lock();
        let entry = state.entry(uri.to_string()).or_default();
        entry.in_flight = false;

        let result = match fetched {
            Ok(set) => {
                let set = Arc::new(set);
                entry.set = Some(Arc::clone(&set));
                entry.fetched_at = Some(Instant::now());
                Ok(set)
            }
            Err(e) => {
                tracing::warn!(uri, error = %e, "JWK set fetch failed");
                Err(e)
            }
        };
        drop(state);
        self.fetch_done.notify_all();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{EllipticCurve, SignatureAlgorithm};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn set_with(kid: &str) -> JsonWebKeySet {
        JsonWebKeySet::with_keys(vec![JsonWebKey::ec_public(
            kid,
            SignatureAlgorithm::Es256,
            EllipticCurve::P256,
            &[1; 32],
            &[2; 32],
        )])
    }

    #[test]
    fn hit_after_first_fetch_does_not_refetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = JwksCache::new(
            move |_uri: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(set_with("k1"))
            },
            Duration::from_secs(60),
            Duration::from_secs(1),
        );

        assert!(cache.key("https://rp.example.com/jwks", "k1").is_ok());
        assert!(cache.key("https://rp.example.com/jwks", "k1").is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn miss_refreshes_once_then_key_not_found() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = JwksCache::new(
            move |_uri: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(set_with("k1"))
            },
            Duration::from_secs(60),
            Duration::from_secs(1),
        );

        // Prime the cache, then ask for a kid that will never appear
        assert!(cache.key("https://rp.example.com/jwks", "k1").is_ok());
        let result = cache.key("https://rp.example.com/jwks", "k2");
        assert!(matches!(result, Err(JoseError::KeyNotFound(_))));
        // One priming fetch plus exactly one miss-triggered refresh
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_misses_converge_on_one_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = Arc::new(JwksCache::new(
            move |_uri: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(50));
                Ok(set_with("k1"))
            },
            Duration::from_secs(60),
            Duration::from_secs(5),
        ));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.key("https://rp.example.com/jwks", "k1"))
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn waiting_on_a_stuck_fetch_times_out_to_key_not_found() {
        let cache = Arc::new(JwksCache::new(
            move |_uri: &str| {
                std::thread::sleep(Duration::from_millis(500));
                Ok(set_with("k1"))
            },
            Duration::from_secs(60),
            Duration::from_millis(50),
        ));

        let slow = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || cache.key("https://rp.example.com/jwks", "k1"))
        };
        // Give the first caller time to start its fetch
        std::thread::sleep(Duration::from_millis(20));

        let result = cache.key("https://rp.example.com/jwks", "k1");
        assert!(matches!(result, Err(JoseError::KeyNotFound(_))));

        assert!(slow.join().unwrap().is_ok());
    }

    #[test]
    fn fetch_error_propagates() {
        let cache = JwksCache::new(
            move |uri: &str| Err(JoseError::KeyNotFound(uri.to_string())),
            Duration::from_secs(60),
            Duration::from_secs(1),
        );

        assert!(cache.key_set("https://rp.example.com/jwks").is_err());
    }
}
