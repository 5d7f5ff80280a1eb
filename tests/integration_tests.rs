use budget_analytics::*;
use std::fs;

const HEADER: &str = "Year,Quarter,Budget,Marketing Spend,RnD Spend,Ops Spend,Marketing Revenue,RnD Revenue,Ops Revenue";

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "budget_analytics_{}_{}_{}",
        name,
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ))
}

fn scored(label: &str, profit: f64, risk: [f64; 3]) -> PeriodResult {
    PeriodResult {
        period_label: label.to_string(),
        expected_profit: profit,
        variance: profit.abs() * 0.1,
        value: profit,
        policy: [300.0, 300.0, 400.0],
        explain: Some(Explain {
            budget: Some(1000.0),
            total_spend: Some(600.0),
            avg_revenue: Some(600.0 + profit),
            expected: DepartmentFigures::new(400.0, 300.0, 200.0),
            risk: DepartmentFigures::new(risk[0], risk[1], risk[2]),
            ..Explain::default()
        }),
    }
}

#[test]
fn test_reference_row_canonicalizes() {
    let text = format!(
        "{}\n2024,Q1,1000000000,200000000,300000000,150000000,400000000,500000000,250000000",
        HEADER
    );
    let table = ingest_csv(&text).unwrap();

    assert!(table.missing.is_empty());
    assert_eq!(
        table.rows,
        vec![CanonicalRow {
            year: 2024,
            quarter: Quarter::Q1,
            budget: 1e9,
            marketing_spend: 2e8,
            rnd_spend: 3e8,
            ops_spend: 1.5e8,
            marketing_revenue: 4e8,
            rnd_revenue: 5e8,
            ops_revenue: 2.5e8,
        }]
    );
}

#[test]
fn test_messy_spreadsheet_export() {
    let text = "\u{feff}\"Year\",\"Qtr\",\"Total Budget (IDR)\",\"Marketing Expense\",\"R&D Cost\",\"Operations Expense\",\"Marketing Sales\",\"R&D Rev\",\"Ops Rev\",\"Comment\"\n\
2023,4,\"Rp 1,000,000\",\"250,000\",\"Rp 300,000\",100000,\"500,000\",n/a,\"200,000\",late close\n\
\n\
2024,q1,900000,200000,200000,200000,400000,400000,400000,\n";
    let table = ingest_csv(text).unwrap();

    assert!(table.missing.is_empty(), "missing: {:?}", table.missing);
    assert_eq!(table.headers.last().map(String::as_str), Some("comment"));
    assert_eq!(table.rows.len(), 2);

    let q4 = &table.rows[0];
    assert_eq!(q4.quarter, Quarter::Q4);
    assert_eq!(q4.budget, 1_000_000.0);
    assert_eq!(q4.rnd_spend, 300_000.0);
    // "n/a" is silently read as zero.
    assert_eq!(q4.rnd_revenue, 0.0);
    assert_eq!(table.defaulted_cells, 1);

    assert_eq!(table.rows[1].quarter, Quarter::Q1);
}

#[test]
fn test_file_and_text_ingestion_match() {
    let text = format!("{}\n2024,2,10,1,2,3,4,5,6\n2024,3,10,1,2,3,4,5,6\n", HEADER);
    let path = temp_path("ingest.csv");
    fs::write(&path, &text).unwrap();

    let from_file = ingest_csv_file(&path).unwrap();
    let from_text = ingest_csv(&text).unwrap();
    assert_eq!(from_file, from_text);

    let _ = fs::remove_file(&path);
}

#[test]
fn test_canonicalization_is_idempotent() {
    for header in [
        "Marketing Cost",
        "R&D Revenue",
        "Qtr",
        "\u{feff}'Budget (Rp)'",
        "Ops  //  Sales",
        "unknown & strange (col)",
        "",
    ] {
        let once = canonicalize_header(header);
        assert_eq!(canonicalize_header(&once), once);
    }
    assert_eq!(canonicalize_header("Marketing Cost"), "marketing_spend");
    assert_eq!(canonicalize_header("R&D Revenue"), "rnd_revenue");
    assert_eq!(canonicalize_header("Qtr"), "quarter");
}

#[test]
fn test_quarter_and_currency_contracts() {
    assert_eq!(coerce_quarter(Some(&RawValue::from("7"))), Quarter::Q4);
    assert_eq!(coerce_quarter(Some(&RawValue::from("0"))), Quarter::Q1);
    assert_eq!(coerce_quarter(Some(&RawValue::from("q3"))), Quarter::Q3);
    assert_eq!(coerce_currency(Some(&RawValue::from("1.500.000"))), 1.5);
}

#[test]
fn test_validation_reports_budget_gap() {
    let report = validate_headers(&[
        "year",
        "quarter",
        "marketing_spend",
        "rnd_spend",
        "ops_spend",
        "marketing_revenue",
        "rnd_revenue",
        "ops_revenue",
    ]);
    assert_eq!(report.missing_names(), vec!["budget"]);
}

#[test]
fn test_upload_with_fallback_then_analytics() {
    let text = format!(
        "{}\n2024,Q1,1000,200,300,100,400,500,200\n2024,Q2,1000,200,300,100,500,500,300\n2024,Q3,1000,200,300,100,700,600,300\n",
        HEADER
    );
    let mut store = HistoryStore::open(MemoryStorage::default());
    let prepared = UploadWorkflow::prepare(&text).unwrap();
    let summary = UploadWorkflow::complete(
        &mut store,
        prepared,
        Err(BudgetAnalyticsError::ServiceError("HTTP 502".to_string())),
    )
    .unwrap();
    assert_eq!(summary.source, ScoreSource::LocalFallback);
    assert_eq!(summary.appended, 3);

    let snapshot = analyze_history(store.history());
    assert_eq!(snapshot.aggregates.periods, 3);
    assert_eq!(snapshot.aggregates.total_budget, 3000.0);
    // Profits 500, 700, 1000.
    assert_eq!(snapshot.aggregates.cumulative_net_profit, 2200.0);
    assert!((snapshot.aggregates.shift_pct - 100.0).abs() < 1e-9);
    assert!((snapshot.aggregates.latest_roi - 160.0).abs() < 1e-9);
    assert_eq!(
        snapshot.profit_histogram.iter().map(|b| b.count).sum::<usize>(),
        3
    );
    for (_, gap) in snapshot.allocation_gaps.iter() {
        assert!(*gap >= 0.0);
    }
    // Fallback policy mirrors spend: 200 / 600.
    assert!((snapshot.allocation_pct.marketing - 100.0 / 3.0).abs() < 1e-9);
    // Ops risk is 0.15 * revenue: 30, 45, 45.
    let ops = snapshot.bucket_distribution.ops;
    assert!((ops.low - 100.0 / 3.0).abs() < 1e-9);
    assert!((ops.high - 200.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_identical_risk_buckets_all_low() {
    let history: Vec<PeriodResult> = (1..=4)
        .map(|q| scored(&format!("2024 Q{}", q), 100.0 * q as f64, [12.5, 3.0 * q as f64, 0.0]))
        .collect();
    let snapshot = analyze_history(&history);
    assert_eq!(
        snapshot.bucket_distribution.marketing,
        BucketDistribution {
            low: 100.0,
            medium: 0.0,
            high: 0.0
        }
    );
    assert_eq!(snapshot.bucket_distribution.ops.low, 100.0);
    assert!(snapshot.bucket_distribution.rnd.high > 0.0);
}

#[test]
fn test_histogram_keeps_maximum() {
    let profits = [-200.0, -10.0, 0.0, 33.3, 400.0, 999.0, 1000.0];
    let history: Vec<PeriodResult> = profits
        .iter()
        .enumerate()
        .map(|(i, p)| scored(&format!("P{}", i), *p, [1.0, 1.0, 1.0]))
        .collect();
    let bins = HistoryAnalytics::new(&history).profit_histogram();
    assert_eq!(bins.len(), 10);
    assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), history.len());
    assert_eq!(bins[0].lower, -200.0);
    assert_eq!(bins[9].count, 2);
}

#[test]
fn test_empty_history_never_fails() {
    let snapshot = analyze_history(&[]);
    assert_eq!(snapshot.aggregates.average_net_profit, 0.0);
    assert_eq!(snapshot.aggregates.latest_roi, 0.0);
    assert_eq!(snapshot.aggregates.shift_pct, 0.0);
    assert_eq!(snapshot.aggregates.highest_risk_department, None);
    assert!(snapshot.profit_histogram.is_empty());
    assert_eq!(history_to_csv(&[]).unwrap().lines().count(), 1);
}

#[test]
fn test_export_round_trip_headers() {
    let history = vec![scored("2024 Q1", 250.0, [1.0, 2.0, 3.0])];
    let text = history_to_csv(&history).unwrap();

    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    assert_eq!(headers, EXPORT_HEADERS.to_vec());

    let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 1);
    assert_eq!(&records[0][0], "2024 Q1");
    assert_eq!(&records[0][7], "1000");
    assert_eq!(&records[0][10], "250");
}

#[test]
fn test_store_persists_across_sessions() -> anyhow::Result<()> {
    let path = temp_path("store.json");

    {
        let mut store = HistoryStore::open(JsonFileStorage::new(&path));
        store.append(scored("2024 Q1", 10.0, [1.0, 1.0, 1.0]))?;
        store.append(scored("2024 Q2", 20.0, [1.0, 1.0, 1.0]))?;
        store.replace_by_label(scored("2024 Q1", 15.0, [2.0, 2.0, 2.0]))?;
        store.set_form(FormState {
            year: 2025,
            ..FormState::default()
        })?;
    }

    let store = HistoryStore::open(JsonFileStorage::new(&path));
    assert_eq!(store.history().len(), 2);
    assert_eq!(store.history()[0].expected_profit, 15.0);
    assert_eq!(store.form().year, 2025);

    let persisted: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    assert_eq!(persisted["history"][0]["periodLabel"], "2024 Q1");

    fs::remove_file(&path)?;
    Ok(())
}

#[test]
fn test_download_file_names_from_crate_root() {
    let date = chrono::NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
    assert_eq!(export_file_name(date), "history_export_2025-01-31.csv");
    assert_eq!(original_upload_file_name(date), "original_upload_2025-01-31.csv");
}
