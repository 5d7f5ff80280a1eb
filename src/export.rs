use crate::error::{BudgetAnalyticsError, Result};
use crate::schema::{CanonicalField, CanonicalRow, PeriodResult};
use chrono::NaiveDate;
use std::io::Write;

/// Column order of the history export. Consumers match on this exact text.
pub const EXPORT_HEADERS: [&str; 11] = [
    "period",
    "expected_profit",
    "variance",
    "value",
    "policy_mkt",
    "policy_rnd",
    "policy_ops",
    "budget",
    "avg_revenue",
    "total_spend",
    "net_profit",
];

fn optional_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn export_row(item: &PeriodResult) -> [String; 11] {
    [
        item.period_label.clone(),
        item.expected_profit.to_string(),
        item.variance.to_string(),
        item.value.to_string(),
        item.policy[0].to_string(),
        item.policy[1].to_string(),
        item.policy[2].to_string(),
        optional_cell(item.budget()),
        optional_cell(item.avg_revenue()),
        optional_cell(item.total_spend()),
        item.net_profit().to_string(),
    ]
}

/// Writes the header row and one row per period, in history order,
/// each terminated by `\n`.
pub fn write_history<W: Write>(writer: W, history: &[PeriodResult]) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    csv_writer.write_record(EXPORT_HEADERS)?;
    for item in history {
        csv_writer.write_record(export_row(item))?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn history_to_csv(history: &[PeriodResult]) -> Result<String> {
    let mut buffer = Vec::new();
    write_history(&mut buffer, history)?;
    String::from_utf8(buffer).map_err(|e| {
        BudgetAnalyticsError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

fn canonical_cell(row: &CanonicalRow, header: &str) -> String {
    let Some(field) = CanonicalField::from_name(header) else {
        return String::new();
    };
    match field {
        CanonicalField::Year => row.year.to_string(),
        CanonicalField::Quarter => row.quarter.to_string(),
        CanonicalField::Budget => row.budget.to_string(),
        CanonicalField::MarketingSpend => row.marketing_spend.to_string(),
        CanonicalField::RndSpend => row.rnd_spend.to_string(),
        CanonicalField::OpsSpend => row.ops_spend.to_string(),
        CanonicalField::MarketingRevenue => row.marketing_revenue.to_string(),
        CanonicalField::RndRevenue => row.rnd_revenue.to_string(),
        CanonicalField::OpsRevenue => row.ops_revenue.to_string(),
    }
}

/// Writes edited rows back under the table's canonicalized headers. Columns
/// that map to no canonical field come out empty.
pub fn write_canonical_rows<W: Write>(
    writer: W,
    headers: &[String],
    rows: &[CanonicalRow],
) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    csv_writer.write_record(headers)?;
    for row in rows {
        csv_writer.write_record(headers.iter().map(|h| canonical_cell(row, h)))?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn canonical_rows_to_csv(headers: &[String], rows: &[CanonicalRow]) -> Result<String> {
    let mut buffer = Vec::new();
    write_canonical_rows(&mut buffer, headers, rows)?;
    String::from_utf8(buffer).map_err(|e| {
        BudgetAnalyticsError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

/// Download name for a history export made on `date`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("history_export_{}.csv", date.format("%Y-%m-%d"))
}

/// Download name for re-exporting the originally uploaded CSV.
pub fn original_upload_file_name(date: NaiveDate) -> String {
    format!("original_upload_{}.csv", date.format("%Y-%m-%d"))
}
