//! Boundary with the remote optimization service.
//!
//! The service itself is not part of this crate. This module holds the wire
//! shapes it exchanges, the conversion of its responses into [`PeriodResult`]s
//! (rejecting malformed policies), and the local fallback scorer used when the
//! batch endpoint cannot be reached.

use crate::error::{BudgetAnalyticsError, Result};
use crate::schema::{CanonicalRow, DepartmentFigures, Explain, PeriodResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
pub const BASE_URL_ENV: &str = "BUDGET_API_BASE_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl ServiceConfig {
    /// Default config with the base URL taken from `BUDGET_API_BASE_URL` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                config.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        config
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Request body for scoring a single period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BestChoiceRequest {
    #[serde(rename = "Marketing_Revenue")]
    pub marketing_revenue: f64,
    #[serde(rename = "RnD_Revenue")]
    pub rnd_revenue: f64,
    #[serde(rename = "Ops_Revenue")]
    pub ops_revenue: f64,
    #[serde(rename = "Marketing_Spend")]
    pub marketing_spend: f64,
    #[serde(rename = "RnD_Spend")]
    pub rnd_spend: f64,
    #[serde(rename = "Ops_Spend")]
    pub ops_spend: f64,
    #[serde(rename = "Budget")]
    pub budget: f64,
}

impl From<&CanonicalRow> for BestChoiceRequest {
    fn from(row: &CanonicalRow) -> Self {
        Self {
            marketing_revenue: row.marketing_revenue,
            rnd_revenue: row.rnd_revenue,
            ops_revenue: row.ops_revenue,
            marketing_spend: row.marketing_spend,
            rnd_spend: row.rnd_spend,
            ops_spend: row.ops_spend,
            budget: row.budget,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BestChoiceResponse {
    pub policy: Vec<f64>,
    pub value: f64,
    pub expected_profit: f64,
    pub variance: f64,
    #[serde(default)]
    pub explain: Option<Explain>,
}

impl BestChoiceResponse {
    pub fn into_period_result(self, period_label: impl Into<String>) -> Result<PeriodResult> {
        Ok(PeriodResult {
            period_label: period_label.into(),
            expected_profit: self.expected_profit,
            variance: self.variance,
            value: self.value,
            policy: policy_from_vec(&self.policy)?,
            explain: self.explain,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BatchItem {
    pub period_label: String,
    pub expected_profit: f64,
    pub variance: f64,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    pub policy: Vec<f64>,
    pub value: f64,
    #[serde(default)]
    pub explain: Option<Explain>,
}

impl TryFrom<BatchItem> for PeriodResult {
    type Error = BudgetAnalyticsError;

    fn try_from(item: BatchItem) -> Result<Self> {
        Ok(PeriodResult {
            policy: policy_from_vec(&item.policy)?,
            period_label: item.period_label,
            expected_profit: item.expected_profit,
            variance: item.variance,
            value: item.value,
            explain: item.explain,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct BatchUploadResponse {
    pub items: Vec<BatchItem>,
}

impl BatchUploadResponse {
    pub fn into_period_results(self) -> Result<Vec<PeriodResult>> {
        self.items.into_iter().map(PeriodResult::try_from).collect()
    }
}

fn policy_from_vec(policy: &[f64]) -> Result<[f64; 3]> {
    match policy {
        [marketing, rnd, ops] => Ok([*marketing, *rnd, *ops]),
        other => Err(BudgetAnalyticsError::InvalidPolicy(other.len())),
    }
}

/// Fraction of department revenue used as its risk figure by the fallback scorer.
pub const FALLBACK_RISK_FRACTION: f64 = 0.15;
/// Fraction of |expected profit| used as variance by the fallback scorer.
pub const FALLBACK_VARIANCE_FRACTION: f64 = 0.1;

/// Self-contained substitute for the remote optimizer. Keeps spend as the
/// allocation and scores each period from its own revenue and spend.
pub struct LocalFallback;

impl LocalFallback {
    pub fn score(row: &CanonicalRow) -> PeriodResult {
        let total_spend = row.total_spend();
        let avg_revenue = row.total_revenue();
        let expected_profit = avg_revenue - total_spend;
        let budget = if row.budget != 0.0 { row.budget } else { total_spend };

        PeriodResult {
            period_label: row.period_label(),
            expected_profit,
            variance: expected_profit.abs() * FALLBACK_VARIANCE_FRACTION,
            value: expected_profit,
            policy: [row.marketing_spend, row.rnd_spend, row.ops_spend],
            explain: Some(Explain {
                budget: Some(budget),
                total_spend: Some(total_spend),
                avg_revenue: Some(avg_revenue),
                expected: DepartmentFigures::new(
                    row.marketing_revenue,
                    row.rnd_revenue,
                    row.ops_revenue,
                ),
                risk: DepartmentFigures::new(
                    row.marketing_revenue * FALLBACK_RISK_FRACTION,
                    row.rnd_revenue * FALLBACK_RISK_FRACTION,
                    row.ops_revenue * FALLBACK_RISK_FRACTION,
                ),
                ..Explain::default()
            }),
        }
    }

    pub fn score_all(rows: &[CanonicalRow]) -> Vec<PeriodResult> {
        rows.iter().map(Self::score).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Department, Quarter};

    fn row() -> CanonicalRow {
        CanonicalRow {
            year: 2024,
            quarter: Quarter::Q2,
            budget: 1000.0,
            marketing_spend: 200.0,
            rnd_spend: 300.0,
            ops_spend: 100.0,
            marketing_revenue: 400.0,
            rnd_revenue: 500.0,
            ops_revenue: 200.0,
        }
    }

    #[test]
    fn test_request_uses_service_field_names() {
        let json = serde_json::to_value(BestChoiceRequest::from(&row())).unwrap();
        assert_eq!(json["Marketing_Revenue"], 400.0);
        assert_eq!(json["RnD_Spend"], 300.0);
        assert_eq!(json["Budget"], 1000.0);
    }

    #[test]
    fn test_fallback_scoring() {
        let result = LocalFallback::score(&row());
        assert_eq!(result.period_label, "2024 Q2");
        assert_eq!(result.expected_profit, 500.0);
        assert_eq!(result.variance, 50.0);
        assert_eq!(result.value, 500.0);
        assert_eq!(result.policy, [200.0, 300.0, 100.0]);
        assert_eq!(result.budget(), Some(1000.0));
        assert_eq!(result.total_spend(), Some(600.0));
        assert_eq!(result.avg_revenue(), Some(1100.0));
        assert_eq!(result.risk(Department::RnD), 75.0);
        assert_eq!(result.net_profit(), 500.0);
    }

    #[test]
    fn test_fallback_budget_falls_back_to_spend() {
        let mut r = row();
        r.budget = 0.0;
        r.marketing_revenue = 0.0;
        let result = LocalFallback::score(&r);
        assert_eq!(result.budget(), Some(600.0));
        assert_eq!(result.expected_profit, 100.0);
        assert_eq!(result.variance, 10.0);
    }

    #[test]
    fn test_batch_response_conversion() {
        let json = r#"{"items":[{"period_label":"2024 Q1","expected_profit":10.0,"variance":1.0,
            "metrics":{},"policy":[1.0,2.0,3.0],"value":4.0,
            "explain":{"budget":9.0,"net_profit":8.0,"expected":{"Ops_Revenue":2.0},"risk_weight":0.3}}]}"#;
        let response: BatchUploadResponse = serde_json::from_str(json).unwrap();
        let results = response.into_period_results().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].policy, [1.0, 2.0, 3.0]);
        assert_eq!(results[0].net_profit(), 8.0);
    }

    #[test]
    fn test_malformed_policy_rejected() {
        let response = BestChoiceResponse {
            policy: vec![1.0, 2.0],
            value: 0.0,
            expected_profit: 0.0,
            variance: 0.0,
            explain: None,
        };
        let err = response.into_period_result("2024 Q1").unwrap_err();
        assert!(matches!(err, BudgetAnalyticsError::InvalidPolicy(2)));
    }

    #[test]
    fn test_endpoint_joining() {
        let config = ServiceConfig {
            base_url: "http://example.test/api/".to_string(),
            timeout_secs: 5,
        };
        assert_eq!(
            config.endpoint("/ingestion/upload"),
            "http://example.test/api/ingestion/upload"
        );
    }
}
