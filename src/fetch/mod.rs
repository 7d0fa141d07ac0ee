//! Record fetcher: one paged upstream walk per (item code, state) pair.
//!
//! A failing pair contributes no records and a warning; the remaining
//! pairs still load. Results are concatenated in pair order, filtered to
//! the requested result-date range and keyed for the engine.

use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde_json::json;

use crate::error::XrayError;
use crate::location::StateCode;
use crate::logging::{log, log_pair_failure, obj, Domain, Level, ProfileScope};
use crate::query::SearchQuery;
use crate::record::{PurchaseRecord, RawRecord, RecordKey, Rejection};

pub mod cache;
pub mod client;
pub mod retry;

pub use cache::CachedSource;
pub use client::ComprasClient;

/// Rows of one (item, state) pair plus how much of the upstream walk they cover.
#[derive(Debug, Clone, Default)]
pub struct PairRows {
    pub rows: Vec<RawRecord>,
    pub pages_loaded: u32,
    pub pages_reported: u32,
}

impl PairRows {
    /// Rows from a walk that reached the last reported page.
    pub fn complete(rows: Vec<RawRecord>) -> Self {
        Self { rows, pages_loaded: 1, pages_reported: 1 }
    }

    pub fn is_truncated(&self) -> bool {
        self.pages_reported > self.pages_loaded
    }
}

#[async_trait]
pub trait RecordSource: Send + Sync {
    /// All rows for one item code, optionally restricted to one state.
    async fn fetch_pair(&self, item: u64, state: Option<StateCode>) -> Result<PairRows>;
}

pub fn location_label(state: Option<StateCode>) -> String {
    state.map(|s| s.as_str().to_string()).unwrap_or_else(|| "ALL".to_string())
}

#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub records: Vec<PurchaseRecord>,
    /// `UpstreamFailure` per failed pair, `TruncatedPages` per pair cut at
    /// the page cap.
    pub warnings: Vec<XrayError>,
    /// Rows dropped for a missing/unparsable date or an invalid price.
    pub rejected: usize,
    pub out_of_range: usize,
}

impl FetchOutcome {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// (item, state) pairs in request order: items as given, states sorted.
pub fn request_pairs(query: &SearchQuery) -> Vec<(u64, Option<StateCode>)> {
    let locations = query.locations.request_locations();
    let mut pairs = Vec::with_capacity(query.item_codes.len() * locations.len());
    for item in &query.item_codes {
        for state in &locations {
            if !pairs.contains(&(*item, *state)) {
                pairs.push((*item, *state));
            }
        }
    }
    pairs
}

pub async fn fetch_records(
    source: &dyn RecordSource,
    query: &SearchQuery,
    concurrency: usize,
) -> FetchOutcome {
    let _scope = ProfileScope::new("fetch_records");
    let pairs = request_pairs(query);

    let results: Vec<_> = stream::iter(pairs)
        .map(|(item, state)| async move { (item, state, source.fetch_pair(item, state).await) })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut outcome = FetchOutcome::default();
    let mut next_key = 0u32;
    for (item, state, result) in results {
        let pair = match result {
            Ok(pair) => pair,
            Err(err) => {
                let location = location_label(state);
                log_pair_failure(item, &location, &format!("{:#}", err));
                outcome.warnings.push(XrayError::UpstreamFailure {
                    item,
                    location,
                    reason: format!("{:#}", err),
                });
                continue;
            }
        };
        if pair.is_truncated() {
            let location = location_label(state);
            log(
                Level::Warn,
                Domain::Fetch,
                "pair_truncated",
                obj(&[
                    ("item", json!(item)),
                    ("location", json!(location)),
                    ("pages_loaded", json!(pair.pages_loaded)),
                    ("pages_reported", json!(pair.pages_reported)),
                ]),
            );
            outcome.warnings.push(XrayError::TruncatedPages {
                item,
                location,
                loaded: pair.pages_loaded,
                reported: pair.pages_reported,
            });
        }
        for raw in &pair.rows {
            match PurchaseRecord::from_raw(RecordKey(next_key), raw) {
                Ok(rec) if query.range.contains(rec.result_date) => {
                    outcome.records.push(rec);
                    next_key += 1;
                }
                Ok(_) => outcome.out_of_range += 1,
                Err(Rejection::MissingDate | Rejection::BadDate(_) | Rejection::BadPrice) => {
                    outcome.rejected += 1
                }
            }
        }
    }

    log(
        Level::Info,
        Domain::Fetch,
        "fetch_complete",
        obj(&[
            ("records", json!(outcome.records.len())),
            ("warnings", json!(outcome.warnings.len())),
            ("rejected", json!(outcome.rejected)),
            ("out_of_range", json!(outcome.out_of_range)),
        ]),
    );
    outcome
}
