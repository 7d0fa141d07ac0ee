use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{location_label, PairRows, RecordSource};
use crate::location::StateCode;
use crate::logging::{log, obj, v_str, Domain, Level};

type PairKey = (u64, Option<StateCode>);

#[derive(Debug, Clone)]
struct CachedPair {
    pair: PairRows,
    fetched_at: Instant,
}

impl CachedPair {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Keeps successful pair fetches for `ttl`. Failures are never cached, so
/// a pair that failed is retried on the next search.
pub struct CachedSource<S> {
    inner: S,
    ttl: Duration,
    cache: Mutex<HashMap<PairKey, CachedPair>>,
}

impl<S: RecordSource> CachedSource<S> {
    pub fn new(inner: S, ttl_secs: u64) -> Self {
        Self {
            inner,
            ttl: Duration::from_secs(ttl_secs),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn lookup(&self, key: &PairKey) -> Option<PairRows> {
        let cache = self.cache.lock().ok()?;
        cache
            .get(key)
            .filter(|c| c.is_fresh(self.ttl))
            .map(|c| c.pair.clone())
    }

    fn store(&self, key: PairKey, pair: &PairRows) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.retain(|_, c| c.is_fresh(self.ttl));
            cache.insert(
                key,
                CachedPair {
                    pair: pair.clone(),
                    fetched_at: Instant::now(),
                },
            );
        }
    }
}

#[async_trait]
impl<S: RecordSource> RecordSource for CachedSource<S> {
    async fn fetch_pair(&self, item: u64, state: Option<StateCode>) -> Result<PairRows> {
        let key = (item, state);
        if let Some(pair) = self.lookup(&key) {
            log(
                Level::Debug,
                Domain::Fetch,
                "cache_hit",
                obj(&[
                    ("item", json!(item)),
                    ("location", v_str(&location_label(state))),
                    ("rows", json!(pair.rows.len())),
                ]),
            );
            return Ok(pair);
        }
        let pair = self.inner.fetch_pair(item, state).await?;
        self.store(key, &pair);
        Ok(pair)
    }
}
