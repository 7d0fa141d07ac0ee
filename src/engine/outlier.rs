//! Iterative one-sigma trimming over the working set.

use serde::Serialize;
use std::sync::Arc;

use super::ledger::{Ledger, LedgerEntry, OutlierStatus};
use super::stats::{self, PriceSummary, Retention};
use crate::error::{Result, XrayError};
use crate::logging::log_trim;
use crate::record::{PurchaseRecord, RecordKey};

/// `[lower, upper]` band of one pass. Prices equal to a bound are kept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub mean: f64,
    pub std_dev: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    /// `mean ± std_dev`, with the lower bound clamped at zero.
    pub fn one_sigma(prices: &[f64]) -> Option<Self> {
        let mean = stats::mean(prices)?;
        let std_dev = stats::sample_std(prices)?;
        Some(Self {
            mean,
            std_dev,
            lower: (mean - std_dev).max(0.0),
            upper: mean + std_dev,
        })
    }

    pub fn classify(&self, price: f64) -> OutlierStatus {
        if price < self.lower {
            OutlierStatus::Below
        } else if price > self.upper {
            OutlierStatus::Above
        } else {
            OutlierStatus::Within
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exclusion {
    pub key: RecordKey,
    pub status: OutlierStatus,
    pub unit_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TrimOutcome {
    /// Fewer than two records in the working set; nothing changed.
    Skipped { working: usize },
    Applied {
        iteration: u32,
        bounds: Bounds,
        kept: usize,
        excluded: Vec<Exclusion>,
    },
}

impl TrimOutcome {
    /// A pass ran but every record stayed inside the band.
    pub fn is_fixed_point(&self) -> bool {
        matches!(self, TrimOutcome::Applied { excluded, .. } if excluded.is_empty())
    }
}

/// Owns the baseline, the history ledger and the iteration counter.
///
/// The working set is not stored separately: it is every baseline record
/// whose ledger status is still `Within`.
#[derive(Debug, Clone)]
pub struct OutlierEngine {
    baseline: Arc<[PurchaseRecord]>,
    ledger: Ledger,
    iteration: u32,
}

impl OutlierEngine {
    pub fn initialize(records: Vec<PurchaseRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(XrayError::EmptyDataset);
        }
        let ledger = Ledger::fresh(records.iter().map(|r| r.key));
        debug_assert_eq!(ledger.len(), records.len(), "record keys must be unique");
        Ok(Self {
            baseline: records.into(),
            ledger,
            iteration: 0,
        })
    }

    /// Back to iteration 0 over the same baseline.
    pub fn reset(&mut self) {
        self.ledger = Ledger::fresh(self.baseline.iter().map(|r| r.key));
        self.iteration = 0;
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn baseline(&self) -> &[PurchaseRecord] {
        &self.baseline
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn working_set(&self) -> impl Iterator<Item = &PurchaseRecord> + '_ {
        self.baseline.iter().filter(|r| self.ledger.is_within(r.key))
    }

    pub fn working_len(&self) -> usize {
        self.ledger.within_count()
    }

    pub fn can_trim(&self) -> bool {
        self.working_len() >= 2
    }

    /// Every baseline record paired with its ledger entry, in load order.
    pub fn history(&self) -> impl Iterator<Item = (&PurchaseRecord, LedgerEntry)> + '_ {
        self.baseline
            .iter()
            .map(|r| (r, self.ledger.get(r.key).unwrap_or(LedgerEntry::WITHIN)))
    }

    /// One trimming pass over the working set.
    pub fn trim(&mut self) -> TrimOutcome {
        let working: Vec<(RecordKey, f64)> = self
            .working_set()
            .map(|r| (r.key, r.unit_price))
            .collect();
        if working.len() < 2 {
            return TrimOutcome::Skipped { working: working.len() };
        }
        let prices: Vec<f64> = working.iter().map(|(_, p)| *p).collect();
        let Some(bounds) = Bounds::one_sigma(&prices) else {
            return TrimOutcome::Skipped { working: working.len() };
        };

        self.iteration += 1;
        let iteration = self.iteration;

        let mut next = self.ledger.clone();
        let mut excluded = Vec::new();
        for (key, price) in working.iter().copied() {
            let status = bounds.classify(price);
            if status.is_excluded() && next.exclude(key, status, iteration) {
                excluded.push(Exclusion { key, status, unit_price: price });
            }
        }
        self.ledger = next;

        let kept = working.len() - excluded.len();
        log_trim(
            iteration,
            bounds.mean,
            bounds.std_dev,
            bounds.lower,
            bounds.upper,
            kept,
            excluded.len(),
        );
        TrimOutcome::Applied {
            iteration,
            bounds,
            kept,
            excluded,
        }
    }

    pub fn baseline_summary(&self) -> Result<PriceSummary> {
        let prices: Vec<f64> = self.baseline.iter().map(|r| r.unit_price).collect();
        stats::summary(&prices)
    }

    pub fn working_summary(&self) -> Result<PriceSummary> {
        let prices: Vec<f64> = self.working_set().map(|r| r.unit_price).collect();
        stats::summary(&prices)
    }

    pub fn retention(&self) -> Result<Retention> {
        stats::retention(self.working_len(), self.baseline.len())
    }

    /// Hex SHA-256 over keys, statuses and the iteration counter.
    pub fn state_hash(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut h = Sha256::new();
        h.update(self.iteration.to_le_bytes());
        for (key, entry) in self.ledger.iter() {
            h.update(key.0.to_le_bytes());
            h.update([entry.status as u8]);
            h.update(entry.iteration.to_le_bytes());
        }
        hex::encode(h.finalize())
    }
}
