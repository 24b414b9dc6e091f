//! Response cache.
//!
//! Bounded LRU keyed by `(name, type, class)`. Entries live for the
//! smallest TTL in the response, clamped to the configured bounds; hits are
//! returned with every TTL reduced by the time spent in the cache.

use compact_str::CompactString;
use hickory_proto::op::Message;
use hickory_proto::rr::Record;
use lru::LruCache;
use sans_application::ports::ResponseCache;
use sans_domain::config::CacheConfig;
use sans_domain::Query;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::trace;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub domain: CompactString,
    pub record_type: u16,
    pub class: u16,
}

impl CacheKey {
    #[inline]
    pub fn from_query(query: &Query) -> Self {
        Self {
            domain: CompactString::from(query.name.as_ref()),
            record_type: query.record_type.to_u16(),
            class: query.class,
        }
    }
}

struct CachedResponse {
    message: Message,
    stored_at: Instant,
    ttl: u32,
}

impl CachedResponse {
    fn remaining(&self, now: Instant) -> Option<u32> {
        let elapsed = now.saturating_duration_since(self.stored_at).as_secs();
        let elapsed = u32::try_from(elapsed).unwrap_or(u32::MAX);
        (elapsed < self.ttl).then(|| self.ttl - elapsed)
    }
}

pub struct LruResponseCache {
    entries: Mutex<LruCache<CacheKey, CachedResponse>>,
    min_ttl: u32,
    max_ttl: u32,
}

impl LruResponseCache {
    pub fn new(max_entries: usize, min_ttl: u32, max_ttl: u32) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            min_ttl,
            max_ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.min_ttl, config.max_ttl)
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, CachedResponse>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Smallest TTL among the answers, or among the authority records for
    /// negative answers. `None` when the response carries no records.
    fn response_ttl(message: &Message) -> Option<u32> {
        let min = |records: &[Record]| records.iter().map(Record::ttl).min();
        min(message.answers()).or_else(|| min(message.name_servers()))
    }

    fn clamp_ttl(&self, ttl: Option<u32>) -> u32 {
        match ttl {
            Some(ttl) => ttl.clamp(self.min_ttl, self.max_ttl.max(self.min_ttl)),
            None => self.min_ttl,
        }
    }

    fn age(mut message: Message, elapsed: u32) -> Message {
        let age_all = |records: Vec<Record>| -> Vec<Record> {
            records
                .into_iter()
                .map(|mut r| {
                    let ttl = r.ttl().saturating_sub(elapsed);
                    r.set_ttl(ttl);
                    r
                })
                .collect()
        };
        let answers = age_all(message.take_answers());
        let authority = age_all(message.take_name_servers());
        let additionals = age_all(message.take_additionals());
        message.add_answers(answers);
        message.add_name_servers(authority);
        message.add_additionals(additionals);
        message
    }
}

impl ResponseCache for LruResponseCache {
    fn get(&self, query: &Query) -> Option<Message> {
        let key = CacheKey::from_query(query);
        let now = Instant::now();
        let mut entries = self.lock();

        let entry = entries.get(&key)?;
        let Some(remaining) = entry.remaining(now) else {
            entries.pop(&key);
            trace!(domain = %query.name, "Cache entry expired");
            return None;
        };
        let elapsed = entry.ttl - remaining;
        let message = entry.message.clone();
        drop(entries);

        Some(Self::age(message, elapsed))
    }

    fn insert(&self, query: &Query, response: &Message) {
        let ttl = self.clamp_ttl(Self::response_ttl(response));
        if ttl == 0 {
            return;
        }
        trace!(domain = %query.name, ttl, "Caching response");
        self.lock().put(
            CacheKey::from_query(query),
            CachedResponse {
                message: response.clone(),
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

