//! Upload and manual-run flows that tie ingestion, scoring and the store together.
//!
//! Scoring itself happens outside this module: callers hand in whatever the
//! remote service returned (or the error it failed with), which keeps these
//! steps synchronous. Uploads must be processed one at a time.

use crate::error::{BudgetAnalyticsError, Result};
use crate::export::canonical_rows_to_csv;
use crate::ingestion::{CanonicalTable, CanonicalTableBuilder};
use crate::schema::{CanonicalRow, PeriodResult};
use crate::service::{BestChoiceRequest, BestChoiceResponse, LocalFallback};
use crate::store::{FormState, HistoryStore, SnapshotStorage, UpsertOutcome};
use log::{debug, info, warn};

/// An ingested upload that passed the validation gate.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedUpload {
    pub csv_text: String,
    pub table: CanonicalTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSource {
    Remote,
    LocalFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub source: ScoreSource,
    pub appended: usize,
    pub replaced: usize,
    /// Error text from the remote batch when the fallback was used.
    pub remote_error: Option<String>,
}

pub struct UploadWorkflow;

impl UploadWorkflow {
    /// Ingests the text and blocks when required columns are missing.
    pub fn prepare(csv_text: &str) -> Result<PreparedUpload> {
        let table = CanonicalTableBuilder::from_text(csv_text)?;
        if !table.is_complete() {
            let report = table.validation();
            return Err(BudgetAnalyticsError::MissingColumns {
                missing: report.missing_names(),
                detected: report.headers,
            });
        }
        Ok(PreparedUpload {
            csv_text: csv_text.to_string(),
            table,
        })
    }

    /// Records the scored periods for a prepared upload. A failed remote batch
    /// falls back to local scoring of every canonical row instead of aborting.
    pub fn complete<S: SnapshotStorage>(
        store: &mut HistoryStore<S>,
        prepared: PreparedUpload,
        remote: Result<Vec<PeriodResult>>,
    ) -> Result<UploadSummary> {
        let PreparedUpload { csv_text, table } = prepared;

        store.set_csv_text(Some(csv_text))?;
        if let Some(first) = table.rows.first() {
            store.update_form(|form| form.prefill_from(first))?;
        }

        let (source, items, remote_error) = match remote {
            Ok(items) => (ScoreSource::Remote, items, None),
            Err(e) => {
                warn!("Batch scoring failed, using local fallback: {}", e);
                (
                    ScoreSource::LocalFallback,
                    LocalFallback::score_all(&table.rows),
                    Some(e.to_string()),
                )
            }
        };

        let mut summary = UploadSummary {
            source,
            appended: 0,
            replaced: 0,
            remote_error,
        };
        for item in items {
            match store.upsert(item)? {
                UpsertOutcome::Appended => summary.appended += 1,
                UpsertOutcome::Replaced(_) => summary.replaced += 1,
            }
        }

        info!(
            "Recorded upload via {:?}: {} appended, {} replaced",
            summary.source, summary.appended, summary.replaced
        );
        Ok(summary)
    }
}

/// Records the service's answer for the current manual-entry form.
pub fn record_manual_result<S: SnapshotStorage>(
    store: &mut HistoryStore<S>,
    form: &FormState,
    response: BestChoiceResponse,
) -> Result<UpsertOutcome> {
    let item = response.into_period_result(form.period_label())?;
    store.upsert(item)
}

/// What recomputing one edited row did to the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecomputeOutcome {
    pub period_label: String,
    /// `false` when no history entry carries the row's label; nothing is appended then.
    pub replaced: bool,
}

fn row_at(rows: &[CanonicalRow], index: usize) -> Result<&CanonicalRow> {
    rows.get(index).ok_or(BudgetAnalyticsError::RowOutOfRange {
        index,
        rows: rows.len(),
    })
}

/// Request to send to the scoring service for an edited table row.
pub fn recompute_request(rows: &[CanonicalRow], index: usize) -> Result<BestChoiceRequest> {
    row_at(rows, index).map(BestChoiceRequest::from)
}

/// Applies the service's answer for `rows[index]` after the user edited the table.
///
/// Only an existing period with the row's label is replaced. The edited rows
/// are written back as the stored CSV text under `headers` either way.
pub fn recompute_row<S: SnapshotStorage>(
    store: &mut HistoryStore<S>,
    headers: &[String],
    rows: &[CanonicalRow],
    index: usize,
    response: BestChoiceResponse,
) -> Result<RecomputeOutcome> {
    let row = row_at(rows, index)?;
    let period_label = row.period_label();
    let item = response.into_period_result(period_label.clone())?;
    let csv_text = canonical_rows_to_csv(headers, rows)?;

    let replaced = store.replace_by_label(item)?;
    if !replaced {
        debug!("No history entry for {}, recompute left history unchanged", period_label);
    }
    store.set_csv_text(Some(csv_text))?;

    Ok(RecomputeOutcome {
        period_label,
        replaced,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Quarter;
    use crate::store::MemoryStorage;

    const CSV: &str = "Year,Qtr,Budget (IDR),Marketing Cost,R&D Spend,Operations Cost,Marketing Rev,R&D Revenue,Ops Income\n\
2024,1,1000,100,200,300,400,500,600\n\
2024,2,1000,100,100,100,200,200,200\n";

    #[test]
    fn test_prepare_blocks_on_missing_columns() {
        let err = UploadWorkflow::prepare("Year,Quarter,Notes\n2024,Q1,x\n").unwrap_err();
        match &err {
            BudgetAnalyticsError::MissingColumns { missing, detected } => {
                assert_eq!(missing[0], "budget");
                assert_eq!(detected, &vec!["year", "quarter", "notes"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let message = err.to_string();
        assert!(message.starts_with("Missing required columns: budget, marketing_spend"));
        assert!(message.ends_with("Detected headers: year, quarter, notes"));
    }

    #[test]
    fn test_remote_failure_uses_fallback() {
        let mut store = HistoryStore::open(MemoryStorage::default());
        let prepared = UploadWorkflow::prepare(CSV).unwrap();
        let summary = UploadWorkflow::complete(
            &mut store,
            prepared,
            Err(BudgetAnalyticsError::ServiceError("connection refused".into())),
        )
        .unwrap();

        assert_eq!(summary.source, ScoreSource::LocalFallback);
        assert_eq!(summary.appended, 2);
        assert!(summary.remote_error.unwrap().contains("connection refused"));
        assert_eq!(store.history()[0].period_label, "2024 Q1");
        assert_eq!(store.history()[0].expected_profit, 900.0);
        assert_eq!(store.form().quarter, Quarter::Q1);
        assert_eq!(store.form().ops_revenue, 600.0);
        assert_eq!(store.csv_text(), Some(CSV));
    }

    #[test]
    fn test_reupload_replaces_by_label() {
        let mut store = HistoryStore::open(MemoryStorage::default());
        let prepared = UploadWorkflow::prepare(CSV).unwrap();
        let remote = Ok(LocalFallback::score_all(&prepared.table.rows));
        UploadWorkflow::complete(&mut store, prepared.clone(), remote).unwrap();

        let summary = UploadWorkflow::complete(
            &mut store,
            prepared,
            Err(BudgetAnalyticsError::ServiceError("timeout".into())),
        )
        .unwrap();
        assert_eq!(summary.replaced, 2);
        assert_eq!(store.history().len(), 2);
    }

    #[test]
    fn test_manual_run_recorded_under_form_label() {
        let mut store = HistoryStore::open(MemoryStorage::default());
        let form = FormState {
            year: 2025,
            quarter: Quarter::Q4,
            ..FormState::default()
        };
        let response = BestChoiceResponse {
            policy: vec![1.0, 2.0, 3.0],
            value: 1.0,
            expected_profit: 2.0,
            variance: 3.0,
            explain: None,
        };
        let outcome = record_manual_result(&mut store, &form, response).unwrap();
        assert_eq!(outcome, UpsertOutcome::Appended);
        assert_eq!(store.history()[0].period_label, "2025 Q4");
    }

    fn response(profit: f64) -> BestChoiceResponse {
        BestChoiceResponse {
            policy: vec![10.0, 20.0, 30.0],
            value: profit,
            expected_profit: profit,
            variance: 1.0,
            explain: None,
        }
    }

    #[test]
    fn test_recompute_replaces_matching_period_and_rewrites_csv() {
        let mut store = HistoryStore::open(MemoryStorage::default());
        let prepared = UploadWorkflow::prepare(CSV).unwrap();
        let headers = prepared.table.headers.clone();
        let mut rows = prepared.table.rows.clone();
        let fallback = Err(BudgetAnalyticsError::ServiceError("down".into()));
        UploadWorkflow::complete(&mut store, prepared, fallback).unwrap();

        rows[1].budget = 5000.0;
        let request = recompute_request(&rows, 1).unwrap();
        assert_eq!(request.budget, 5000.0);

        let outcome = recompute_row(&mut store, &headers, &rows, 1, response(42.0)).unwrap();
        assert_eq!(
            outcome,
            RecomputeOutcome {
                period_label: "2024 Q2".to_string(),
                replaced: true
            }
        );
        assert_eq!(store.history().len(), 2);
        assert_eq!(store.history()[1].expected_profit, 42.0);
        assert_eq!(store.history()[1].policy, [10.0, 20.0, 30.0]);

        let stored = store.csv_text().unwrap();
        assert!(stored.starts_with("year,quarter,budget,marketing_spend"));
        let reparsed = CanonicalTableBuilder::from_text(stored).unwrap();
        assert_eq!(reparsed.rows, rows);
    }

    #[test]
    fn test_recompute_never_appends() {
        let mut store = HistoryStore::open(MemoryStorage::default());
        let rows = vec![CanonicalRow {
            year: 2030,
            quarter: Quarter::Q3,
            ..CanonicalRow::default()
        }];
        let headers = vec!["year".to_string(), "quarter".to_string()];

        let outcome = recompute_row(&mut store, &headers, &rows, 0, response(1.0)).unwrap();
        assert!(!outcome.replaced);
        assert!(store.history().is_empty());
        assert_eq!(store.csv_text(), Some("year,quarter\n2030,Q3\n"));
    }

    #[test]
    fn test_recompute_rejects_bad_index_and_policy() {
        let mut store = HistoryStore::open(MemoryStorage::default());
        let rows = vec![CanonicalRow::default()];
        let headers = vec!["year".to_string()];

        let err = recompute_row(&mut store, &headers, &rows, 3, response(1.0)).unwrap_err();
        assert!(matches!(err, BudgetAnalyticsError::RowOutOfRange { index: 3, rows: 1 }));

        let mut bad = response(1.0);
        bad.policy.pop();
        let err = recompute_row(&mut store, &headers, &rows, 0, bad).unwrap_err();
        assert!(matches!(err, BudgetAnalyticsError::InvalidPolicy(2)));
        assert_eq!(store.csv_text(), None);
    }
}
