//! Outlier iteration engine.
//!
//! ```text
//! baseline (immutable) ──► ledger (key → status, iteration)
//!                               │
//!                               ▼
//!                 working set = baseline ∩ {status == Within}
//!                               │
//!                         trim() │ mean ± σ over the working set
//!                               ▼
//!                 new ledger (exclusions are never reverted)
//! ```

pub mod ledger;
pub mod outlier;
pub mod stats;

pub use ledger::{Ledger, LedgerEntry, OutlierStatus};
pub use outlier::{Bounds, Exclusion, OutlierEngine, TrimOutcome};
pub use stats::{PriceSummary, Retention};
