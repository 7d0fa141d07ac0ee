use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::record::RecordKey;

/// Outlier classification relative to the bounds of the pass that
/// excluded the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutlierStatus {
    Within,
    Below,
    Above,
}

impl OutlierStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutlierStatus::Within => "Within",
            OutlierStatus::Below => "Below",
            OutlierStatus::Above => "Above",
        }
    }

    pub fn is_excluded(&self) -> bool {
        !matches!(self, OutlierStatus::Within)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub status: OutlierStatus,
    /// Pass that excluded the record; 0 while it is still `Within`.
    pub iteration: u32,
}

impl LedgerEntry {
    pub const WITHIN: LedgerEntry = LedgerEntry {
        status: OutlierStatus::Within,
        iteration: 0,
    };
}

/// Full-history ledger keyed by record identity.
///
/// Statuses only ever move away from `Within`; [`Ledger::exclude`] refuses
/// to touch an entry that has already been excluded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    entries: BTreeMap<RecordKey, LedgerEntry>,
}

impl Ledger {
    pub fn fresh(keys: impl IntoIterator<Item = RecordKey>) -> Self {
        Self {
            entries: keys.into_iter().map(|k| (k, LedgerEntry::WITHIN)).collect(),
        }
    }

    pub fn get(&self, key: RecordKey) -> Option<LedgerEntry> {
        self.entries.get(&key).copied()
    }

    pub fn status(&self, key: RecordKey) -> Option<OutlierStatus> {
        self.get(key).map(|e| e.status)
    }

    pub fn is_within(&self, key: RecordKey) -> bool {
        matches!(self.status(key), Some(OutlierStatus::Within))
    }

    /// Returns false (and changes nothing) unless the record is still
    /// `Within` and `status` is an exclusion.
    pub fn exclude(&mut self, key: RecordKey, status: OutlierStatus, iteration: u32) -> bool {
        if !status.is_excluded() {
            return false;
        }
        match self.entries.get_mut(&key) {
            Some(entry) if entry.status == OutlierStatus::Within => {
                entry.status = status;
                entry.iteration = iteration;
                true
            }
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordKey, LedgerEntry)> + '_ {
        self.entries.iter().map(|(k, e)| (*k, *e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn within_count(&self) -> usize {
        self.entries.values().filter(|e| !e.status.is_excluded()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusion_is_sticky() {
        let mut ledger = Ledger::fresh([RecordKey(1), RecordKey(2)]);
        assert!(ledger.exclude(RecordKey(1), OutlierStatus::Above, 1));
        assert!(!ledger.exclude(RecordKey(1), OutlierStatus::Below, 2));
        assert_eq!(
            ledger.get(RecordKey(1)),
            Some(LedgerEntry { status: OutlierStatus::Above, iteration: 1 })
        );
        assert_eq!(ledger.within_count(), 1);
    }

    #[test]
    fn cannot_exclude_as_within_or_unknown_key() {
        let mut ledger = Ledger::fresh([RecordKey(1)]);
        assert!(!ledger.exclude(RecordKey(1), OutlierStatus::Within, 1));
        assert!(!ledger.exclude(RecordKey(9), OutlierStatus::Below, 1));
        assert_eq!(ledger.get(RecordKey(1)), Some(LedgerEntry::WITHIN));
    }
}
