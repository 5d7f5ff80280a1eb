//! # Budget Analytics
//!
//! Canonicalizes loosely formatted quarterly department financials and derives
//! allocation and risk analytics from a history of scored periods.
//!
//! ## Core Concepts
//!
//! - **Canonical Row**: one quarter's budget, spend and revenue for Marketing, R&D and Ops,
//!   read from any spreadsheet whose headers map onto the nine canonical fields
//! - **Validation Gate**: missing canonical fields are reported, never raised, by ingestion;
//!   the upload workflow turns them into a blocking error
//! - **Period Result**: the scored outcome of one period (expected profit, variance,
//!   allocation policy and an optional explain payload) as returned by the optimizer
//! - **History**: period results in processing order; every analytic is recomputed from it
//! - **Local Fallback**: a self-contained scorer used when the remote batch endpoint fails
//!
//! ## Example
//!
//! ```rust,ignore
//! use budget_analytics::*;
//!
//! let csv = "Year,Quarter,Budget,Marketing Spend,RnD Spend,Ops Spend,Marketing Revenue,RnD Revenue,Ops Revenue\n\
//!            2024,Q1,1000000000,200000000,300000000,150000000,400000000,500000000,250000000\n";
//!
//! let table = ingest_csv(csv).unwrap();
//! assert!(table.missing.is_empty());
//!
//! let history = LocalFallback::score_all(&table.rows);
//! let snapshot = analyze_history(&history);
//! println!("Latest ROI: {:.1}%", snapshot.aggregates.latest_roi);
//!
//! let export = history_to_csv(&history).unwrap();
//! ```

pub mod analytics;
pub mod coerce;
pub mod error;
pub mod export;
pub mod headers;
pub mod ingestion;
pub mod schema;
pub mod service;
pub mod store;
pub mod validation;
pub mod workflow;

#[cfg(feature = "remote")]
pub mod client;

pub use analytics::{
    allocation_gaps, allocation_pct, efficiency_scores, efficiency_targets, period_return, roi,
    AllocationPoint, AnalyticsSnapshot, BucketDistribution, DepartmentComparison, GrowthPoint,
    HistogramBin, HistoryAggregates, HistoryAnalytics, PerDepartment, RiskBucket, RiskThresholds,
    RoiPoint,
};
pub use coerce::{
    coerce_currency, coerce_currency_checked, coerce_quarter, coerce_quarter_checked, coerce_year,
    Coerced, CoercionOrigin, RawValue,
};
pub use error::{BudgetAnalyticsError, Result};
pub use export::{
    canonical_rows_to_csv, export_file_name, history_to_csv, original_upload_file_name,
    write_canonical_rows, write_history, EXPORT_HEADERS,
};
pub use headers::{canonical_field, canonicalize_header, normalize_header};
pub use ingestion::*;
pub use schema::*;
pub use service::*;
pub use store::*;
pub use validation::{validate_headers, ValidationReport};
pub use workflow::*;

#[cfg(feature = "remote")]
pub use client::ScoringClient;

use log::debug;

/// Runs the ingestion pipeline over in-memory CSV text.
pub fn ingest_csv(text: &str) -> Result<CanonicalTable> {
    CanonicalTableBuilder::from_text(text)
}

/// Runs the ingestion pipeline over a CSV file on disk.
pub fn ingest_csv_file(path: impl AsRef<std::path::Path>) -> Result<CanonicalTable> {
    let path = path.as_ref();
    debug!("Reading table from {}", path.display());
    let file = std::fs::File::open(path)?;
    CanonicalTableBuilder::from_reader(std::io::BufReader::new(file))
}

pub fn analyze_history(history: &[PeriodResult]) -> AnalyticsSnapshot {
    AnalyticsSnapshot::compute(history)
}
