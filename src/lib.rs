//! Strata - snapshot-driven portfolio ledger with strategy-relative reports
//!
//! Holdings are reconstructed from an append-only ledger of quantity/cost
//! deltas and dated price observations. Snapshots cache portfolio totals at
//! chosen dates, and reports compare the portfolio (or the part of it covered
//! by a versioned target-allocation strategy) across snapshots.

pub mod config;
pub mod db;
pub mod error;
pub mod holdings;
pub mod reports;
pub mod snapshots;
pub mod strategy;
pub mod utils;
