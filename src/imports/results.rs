//! Short-lived, single-owner holding area for generated result reports.
//!
//! Each report is stored under a random 32-character hex id, can be
//! downloaded once by the admin who ran the import, and disappears after the
//! TTL whether or not it was fetched.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::http::StatusCode;
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::accounts::repo_types::AdminId;
use crate::auth::password::random_hex;

const RESULT_ID_BYTES: usize = 16;

/// Opaque, unguessable identifier of a stored report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ResultId(String);

impl ResultId {
    /// Accepts only the exact shape this cache hands out.
    pub fn parse(s: &str) -> Option<Self> {
        lazy_static! {
            static ref RESULT_ID_RE: Regex = Regex::new(r"^[a-f0-9]{32}$").unwrap();
        }
        RESULT_ID_RE.is_match(s).then(|| Self(s.to_string()))
    }

    fn generate() -> Result<Self, rand::Error> {
        Ok(Self(random_hex(RESULT_ID_BYTES)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResultCacheError {
    #[error("Results not found or expired")]
    NotFound,
    #[error("You do not have permission to access this result")]
    Forbidden,
    #[error("entropy source unavailable: {0}")]
    Entropy(#[from] rand::Error),
}

impl ResultCacheError {
    pub fn status(&self) -> StatusCode {
        match self {
            ResultCacheError::NotFound => StatusCode::NOT_FOUND,
            ResultCacheError::Forbidden => StatusCode::FORBIDDEN,
            ResultCacheError::Entropy(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

struct CachedReport {
    bytes: Bytes,
    owner: AdminId,
    created_at: OffsetDateTime,
}

pub struct ResultCache {
    entries: Mutex<HashMap<ResultId, CachedReport>>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ResultId, CachedReport>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn store(&self, report: Bytes, owner: AdminId) -> Result<ResultId, ResultCacheError> {
        self.store_at(report, owner, OffsetDateTime::now_utc())
    }

    pub fn store_at(
        &self,
        report: Bytes,
        owner: AdminId,
        now: OffsetDateTime,
    ) -> Result<ResultId, ResultCacheError> {
        let mut entries = self.lock();
        evict_expired(&mut entries, now, self.ttl);

        let id = loop {
            let id = ResultId::generate()?;
            if !entries.contains_key(&id) {
                break id;
            }
        };
        entries.insert(
            id.clone(),
            CachedReport {
                bytes: report,
                owner,
                created_at: now,
            },
        );
        debug!(result_id = %id, owner, "import results stored");
        Ok(id)
    }

    pub fn redeem(&self, id: &ResultId, requester: AdminId) -> Result<Bytes, ResultCacheError> {
        self.redeem_at(id, requester, OffsetDateTime::now_utc())
    }

    /// Hands the report to its owner and deletes it in the same critical
    /// section. A non-owner is refused and the entry stays.
    pub fn redeem_at(
        &self,
        id: &ResultId,
        requester: AdminId,
        now: OffsetDateTime,
    ) -> Result<Bytes, ResultCacheError> {
        let mut entries = self.lock();
        evict_expired(&mut entries, now, self.ttl);

        let entry = entries.get(id).ok_or(ResultCacheError::NotFound)?;
        if entry.owner != requester {
            return Err(ResultCacheError::Forbidden);
        }
        let entry = entries.remove(id).ok_or(ResultCacheError::NotFound)?;
        debug!(result_id = %id, owner = requester, "import results redeemed");
        Ok(entry.bytes)
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(OffsetDateTime::now_utc())
    }

    pub fn sweep_at(&self, now: OffsetDateTime) -> usize {
        evict_expired(&mut self.lock(), now, self.ttl)
    }

    /// Drops every pending report, returning how many there were.
    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let dropped = entries.len();
        entries.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn spawn_sweeper(self: &Arc<Self>, every: std::time::Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            loop {
                tick.tick().await;
                let removed = cache.sweep();
                if removed > 0 {
                    debug!(removed, "expired import results swept");
                }
            }
        })
    }
}

fn evict_expired(
    entries: &mut HashMap<ResultId, CachedReport>,
    now: OffsetDateTime,
    ttl: Duration,
) -> usize {
    let before = entries.len();
    entries.retain(|_, e| now - e.created_at <= ttl);
    before - entries.len()
}

#[cfg(test)]
mod tests {
    use std::thread;

    use time::macros::datetime;

    use super::*;

    const T0: OffsetDateTime = datetime!(2026-01-01 12:00 UTC);
    const OWNER: AdminId = 7;
    const OTHER: AdminId = 8;

    fn cache() -> ResultCache {
        ResultCache::new(Duration::hours(1))
    }

    #[test]
    fn ids_have_fixed_hex_shape() {
        let cache = cache();
        let id = cache.store_at(Bytes::from_static(b"x"), OWNER, T0).unwrap();
        assert_eq!(id.as_str().len(), 32);
        assert_eq!(ResultId::parse(id.as_str()), Some(id));
    }

    #[test]
    fn parse_rejects_other_shapes() {
        assert!(ResultId::parse("abc").is_none());
        assert!(ResultId::parse(&"A".repeat(32)).is_none());
        assert!(ResultId::parse(&"g".repeat(32)).is_none());
        assert!(ResultId::parse(&"a".repeat(33)).is_none());
        assert!(ResultId::parse("../../etc/passwd").is_none());
        assert!(ResultId::parse(&"0".repeat(32)).is_some());
    }

    #[test]
    fn redeem_is_exactly_once() {
        let cache = cache();
        let id = cache.store_at(Bytes::from_static(b"report"), OWNER, T0).unwrap();
        let bytes = cache.redeem_at(&id, OWNER, T0).unwrap();
        assert_eq!(&bytes[..], b"report");
        assert!(matches!(cache.redeem_at(&id, OWNER, T0), Err(ResultCacheError::NotFound)));
        assert!(cache.is_empty());
    }

    #[test]
    fn non_owner_is_refused_and_entry_survives() {
        let cache = cache();
        let id = cache.store_at(Bytes::from_static(b"report"), OWNER, T0).unwrap();
        assert!(matches!(cache.redeem_at(&id, OTHER, T0), Err(ResultCacheError::Forbidden)));
        assert_eq!(cache.len(), 1);
        assert!(cache.redeem_at(&id, OWNER, T0).is_ok());
    }

    #[test]
    fn unknown_id_is_not_found() {
        let cache = cache();
        let id = ResultId::parse(&"ab".repeat(16)).unwrap();
        assert!(matches!(cache.redeem_at(&id, OWNER, T0), Err(ResultCacheError::NotFound)));
    }

    #[test]
    fn expiry_boundary() {
        let epsilon = Duration::seconds(1);
        let cache = cache();
        let kept = cache.store_at(Bytes::from_static(b"a"), OWNER, T0).unwrap();
        assert!(cache.redeem_at(&kept, OWNER, T0 + cache.ttl() - epsilon).is_ok());

        let expired = cache.store_at(Bytes::from_static(b"b"), OWNER, T0).unwrap();
        assert!(matches!(
            cache.redeem_at(&expired, OWNER, T0 + cache.ttl() + epsilon),
            Err(ResultCacheError::NotFound)
        ));
    }

    #[test]
    fn expired_entries_look_like_missing_ones_even_to_strangers() {
        let cache = cache();
        let id = cache.store_at(Bytes::from_static(b"a"), OWNER, T0).unwrap();
        let late = T0 + Duration::hours(2);
        assert!(matches!(cache.redeem_at(&id, OTHER, late), Err(ResultCacheError::NotFound)));
    }

    #[test]
    fn sweep_removes_only_stale_entries() {
        let cache = cache();
        cache.store_at(Bytes::from_static(b"old"), OWNER, T0).unwrap();
        let fresh = cache
            .store_at(Bytes::from_static(b"new"), OWNER, T0 + Duration::minutes(50))
            .unwrap();
        assert_eq!(cache.sweep_at(T0 + Duration::minutes(61)), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.redeem_at(&fresh, OWNER, T0 + Duration::minutes(61)).is_ok());
    }

    #[test]
    fn store_sweeps_opportunistically() {
        let cache = cache();
        cache.store_at(Bytes::from_static(b"old"), OWNER, T0).unwrap();
        cache.store_at(Bytes::from_static(b"new"), OWNER, T0 + Duration::hours(3)).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_redeem_succeeds_once() {
        let cache = Arc::new(cache());
        let id = cache.store(Bytes::from_static(b"report"), OWNER).unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let id = id.clone();
                thread::spawn(move || cache.redeem(&id, OWNER).is_ok())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn clear_drops_everything() {
        let cache = cache();
        cache.store_at(Bytes::from_static(b"a"), OWNER, T0).unwrap();
        cache.store_at(Bytes::from_static(b"b"), OTHER, T0).unwrap();
        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
    }
}
