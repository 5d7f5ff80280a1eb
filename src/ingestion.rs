use crate::coerce::{coerce_currency_checked, coerce_quarter_checked, coerce_year_checked, RawValue};
use crate::error::Result;
use crate::headers::{canonical_field, canonicalize_header};
use crate::schema::{CanonicalField, CanonicalRow};
use crate::validation::{validate_headers, ValidationReport};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

/// One input record: raw header paired with its cell, in column order.
/// Blank cells are kept so a later duplicate column still overrides an earlier one.
pub type RawRecord = Vec<(String, RawValue)>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub records: Vec<RawRecord>,
}

/// Result of ingesting one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTable {
    pub rows: Vec<CanonicalRow>,
    /// Canonicalized header list, in input column order.
    pub headers: Vec<String>,
    /// Required fields no header mapped to.
    pub missing: Vec<CanonicalField>,
    /// Cells that were absent or unreadable and fell back to a default.
    pub defaulted_cells: usize,
}

impl CanonicalTable {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn validation(&self) -> ValidationReport {
        ValidationReport {
            missing: self.missing.clone(),
            headers: self.headers.clone(),
        }
    }
}

/// Single ingestion pipeline shared by file and in-memory inputs.
pub struct CanonicalTableBuilder;

impl CanonicalTableBuilder {
    pub fn from_reader<R: Read>(reader: R) -> Result<CanonicalTable> {
        let table = read_raw_table(reader)?;
        Ok(Self::build(&table))
    }

    pub fn from_text(text: &str) -> Result<CanonicalTable> {
        Self::from_reader(text.as_bytes())
    }

    pub fn build(table: &RawTable) -> CanonicalTable {
        let headers: Vec<String> = table.headers.iter().map(|h| canonicalize_header(h)).collect();
        let report = validate_headers(&headers);

        let mut defaulted_cells = 0;
        let rows: Vec<CanonicalRow> = table
            .records
            .iter()
            .filter(|record| has_content(record))
            .map(|record| {
                let (row, defaulted) = record_to_canonical(record);
                defaulted_cells += defaulted;
                row
            })
            .collect();

        info!(
            "Ingested {} rows from {} columns ({} required fields missing)",
            rows.len(),
            headers.len(),
            report.missing.len()
        );
        if defaulted_cells > 0 {
            debug!("{} cells defaulted during coercion", defaulted_cells);
        }

        CanonicalTable {
            rows,
            headers: report.headers,
            missing: report.missing,
            defaulted_cells,
        }
    }
}

fn read_raw_table<R: Read>(reader: R) -> Result<RawTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();

    let mut records = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        let raw: RawRecord = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| (header.clone(), RawValue::from(cell)))
            .collect();
        records.push(raw);
    }

    Ok(RawTable { headers, records })
}

/// A record with no non-blank cell is a zero-key record and yields no row.
fn has_content(record: &RawRecord) -> bool {
    record.iter().any(|(_, value)| !value.is_blank())
}

/// Re-keys a record under canonical names and coerces the nine fields.
/// Returns the row and the number of defaulted cells.
fn record_to_canonical(record: &RawRecord) -> (CanonicalRow, usize) {
    let mut canonical: BTreeMap<CanonicalField, &RawValue> = BTreeMap::new();
    for (header, value) in record {
        if let Some(field) = canonical_field(header) {
            canonical.insert(field, value);
        }
    }

    let mut defaulted = 0;
    let mut currency = |field: CanonicalField| {
        let coerced = coerce_currency_checked(canonical.get(&field).copied());
        if coerced.is_defaulted() {
            defaulted += 1;
        }
        coerced.value
    };

    let budget = currency(CanonicalField::Budget);
    let marketing_spend = currency(CanonicalField::MarketingSpend);
    let rnd_spend = currency(CanonicalField::RndSpend);
    let ops_spend = currency(CanonicalField::OpsSpend);
    let marketing_revenue = currency(CanonicalField::MarketingRevenue);
    let rnd_revenue = currency(CanonicalField::RndRevenue);
    let ops_revenue = currency(CanonicalField::OpsRevenue);

    let year = coerce_year_checked(canonical.get(&CanonicalField::Year).copied());
    let quarter = coerce_quarter_checked(canonical.get(&CanonicalField::Quarter).copied());
    defaulted += usize::from(year.is_defaulted()) + usize::from(quarter.is_defaulted());

    let row = CanonicalRow {
        year: year.value,
        quarter: quarter.value,
        budget,
        marketing_spend,
        rnd_spend,
        ops_spend,
        marketing_revenue,
        rnd_revenue,
        ops_revenue,
    };

    (row, defaulted)
}
