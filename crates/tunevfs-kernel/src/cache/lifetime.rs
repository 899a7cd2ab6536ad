use chrono::{DateTime, TimeDelta, Utc};

/// Freshness of one cache key.
///
/// Loaded with [`CacheStore::lifetime`](super::CacheStore::lifetime) and
/// advanced only through [`CacheTx::update_lifetime`](super::CacheTx::update_lifetime),
/// so a refresh that never commits never marks the key fresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifetime {
    key: String,
    ttl: TimeDelta,
    last_refreshed: Option<DateTime<Utc>>,
}

impl Lifetime {
    pub fn new(key: impl Into<String>, ttl: TimeDelta, last_refreshed: Option<DateTime<Utc>>) -> Self {
        Self {
            key: key.into(),
            ttl,
            last_refreshed,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed
    }

    /// Never-refreshed keys are always expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.last_refreshed {
            Some(stamp) => now - stamp > self.ttl,
            None => true,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub(super) fn set_refreshed(&mut self, at: DateTime<Utc>) {
        self.last_refreshed = Some(at);
    }
}
