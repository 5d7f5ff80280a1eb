//! Derived statistics over a scored history.
//!
//! Everything here is a pure function of the history slice: nothing is cached,
//! and an empty history yields defined defaults (zeros, `Low`, no bins) rather
//! than errors. Insertion order matters: the last period drives the "latest"
//! figures and the first/last pair drives the profit shift.

use crate::schema::{Department, PeriodResult};
use serde::{Deserialize, Serialize};

/// Weight of the risk penalty in the efficiency score.
pub const RISK_WEIGHT: f64 = 0.3;
/// Half-width of the Medium band, in standard deviations.
pub const BAND_HALF_WIDTH: f64 = 0.5;
pub const HISTOGRAM_BINS: usize = 10;

/// One value per department, in policy order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerDepartment<T> {
    pub marketing: T,
    pub rnd: T,
    pub ops: T,
}

impl<T> PerDepartment<T> {
    pub fn from_fn(mut f: impl FnMut(Department) -> T) -> Self {
        Self {
            marketing: f(Department::Marketing),
            rnd: f(Department::RnD),
            ops: f(Department::Ops),
        }
    }

    pub fn get(&self, department: Department) -> &T {
        match department {
            Department::Marketing => &self.marketing,
            Department::RnD => &self.rnd,
            Department::Ops => &self.ops,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> PerDepartment<U> {
        PerDepartment {
            marketing: f(&self.marketing),
            rnd: f(&self.rnd),
            ops: f(&self.ops),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Department, &T)> {
        Department::ALL.into_iter().map(move |d| (d, self.get(d)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskBucket {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub mean: f64,
    pub std_dev: f64,
    pub low: f64,
    pub high: f64,
}

impl RiskThresholds {
    pub fn from_values(values: &[f64]) -> Self {
        let (mean, std_dev) = mean_and_population_std(values);
        Self {
            mean,
            std_dev,
            low: mean - BAND_HALF_WIDTH * std_dev,
            high: mean + BAND_HALF_WIDTH * std_dev,
        }
    }

    /// `Low` is checked first, so a zero-width band classifies the mean as `Low`.
    pub fn classify(&self, value: f64) -> RiskBucket {
        if value <= self.low {
            RiskBucket::Low
        } else if value >= self.high {
            RiskBucket::High
        } else {
            RiskBucket::Medium
        }
    }
}

/// Share of periods per bucket, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BucketDistribution {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiPoint {
    pub period_label: String,
    pub roi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPoint {
    pub period_label: String,
    pub pct: PerDepartment<f64>,
}

/// Amount invested (policy total) against the profit it was expected to return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthPoint {
    pub period_label: String,
    pub invested: f64,
    pub growth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    /// Inclusive lower edge.
    pub lower: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DepartmentComparison {
    pub expected: f64,
    pub risk: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoryAggregates {
    pub periods: usize,
    pub total_budget: f64,
    pub cumulative_net_profit: f64,
    pub average_net_profit: f64,
    pub latest_roi: f64,
    pub average_roi: f64,
    pub shift_pct: f64,
    pub highest_risk_department: Option<Department>,
}

/// Allocation share of each department in percent. A zero policy total
/// divides by 1 instead.
pub fn allocation_pct(result: &PeriodResult) -> PerDepartment<f64> {
    let total: f64 = result.policy.iter().sum();
    let denominator = if total == 0.0 { 1.0 } else { total };
    PerDepartment::from_fn(|d| result.policy[d.index()] / denominator * 100.0)
}

/// `expected_revenue - 0.3 * risk` per department.
pub fn efficiency_scores(result: &PeriodResult) -> PerDepartment<f64> {
    PerDepartment::from_fn(|d| result.expected(d) - RISK_WEIGHT * result.risk(d))
}

/// Efficiency rescaled to 0..=100 so that a department at the cross-department
/// mean lands on 80.
pub fn efficiency_targets(result: &PeriodResult) -> PerDepartment<f64> {
    let scores = efficiency_scores(result);
    let mean = (scores.marketing + scores.rnd + scores.ops) / 3.0;
    let mean = if mean == 0.0 || !mean.is_finite() { 1.0 } else { mean };
    scores.map(|score| (score / mean * 60.0 + 20.0).clamp(0.0, 100.0))
}

/// Shortfall of allocation below the efficiency target; never negative.
pub fn allocation_gaps(result: &PeriodResult) -> PerDepartment<f64> {
    let pct = allocation_pct(result);
    let targets = efficiency_targets(result);
    PerDepartment::from_fn(|d| (targets.get(d) - pct.get(d)).max(0.0))
}

/// `avg_revenue / budget * 100`, with a missing or zero budget read as 1.
pub fn roi(result: &PeriodResult) -> f64 {
    let budget = result
        .budget()
        .filter(|b| *b != 0.0 && b.is_finite())
        .unwrap_or(1.0);
    let revenue = result.avg_revenue().filter(|r| r.is_finite()).unwrap_or(0.0);
    revenue / budget * 100.0
}

/// Gross return of a period as a ratio: `(expected_profit + total_spend) / budget`.
/// A missing, zero or non-finite budget gives 0.
pub fn period_return(result: &PeriodResult) -> f64 {
    match result.budget() {
        Some(budget) if budget.is_finite() && budget != 0.0 => {
            (result.expected_profit + result.total_spend().unwrap_or(0.0)) / budget
        }
        _ => 0.0,
    }
}

fn mean_and_population_std(values: &[f64]) -> (f64, f64) {
    let Some(&first) = values.first() else {
        return (0.0, 0.0);
    };
    // Identical values get an exact mean and zero spread, so they all land in `Low`.
    if values.iter().all(|v| *v == first) {
        return (first, 0.0);
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Analytics over an ordered history.
pub struct HistoryAnalytics<'a> {
    history: &'a [PeriodResult],
}

impl<'a> HistoryAnalytics<'a> {
    pub fn new(history: &'a [PeriodResult]) -> Self {
        Self { history }
    }

    pub fn latest(&self) -> Option<&'a PeriodResult> {
        self.history.last()
    }

    fn risk_values(&self, department: Department) -> Vec<f64> {
        self.history.iter().map(|h| h.risk(department)).collect()
    }

    pub fn risk_thresholds(&self) -> PerDepartment<RiskThresholds> {
        PerDepartment::from_fn(|d| RiskThresholds::from_values(&self.risk_values(d)))
    }

    /// Bucket of every period, per department, in history order.
    pub fn risk_buckets(&self) -> PerDepartment<Vec<RiskBucket>> {
        let thresholds = self.risk_thresholds();
        PerDepartment::from_fn(|d| {
            let t = thresholds.get(d);
            self.history.iter().map(|h| t.classify(h.risk(d))).collect()
        })
    }

    pub fn bucket_distribution(&self) -> PerDepartment<BucketDistribution> {
        let total = self.history.len();
        self.risk_buckets().map(|buckets| {
            let share = |bucket: RiskBucket| {
                if total == 0 {
                    return 0.0;
                }
                let count = buckets.iter().filter(|b| **b == bucket).count();
                count as f64 / total as f64 * 100.0
            };
            BucketDistribution {
                low: share(RiskBucket::Low),
                medium: share(RiskBucket::Medium),
                high: share(RiskBucket::High),
            }
        })
    }

    pub fn roi_series(&self) -> Vec<RoiPoint> {
        self.history
            .iter()
            .map(|h| RoiPoint {
                period_label: h.period_label.clone(),
                roi: roi(h),
            })
            .collect()
    }

    pub fn allocation_series(&self) -> Vec<AllocationPoint> {
        self.history
            .iter()
            .map(|h| AllocationPoint {
                period_label: h.period_label.clone(),
                pct: allocation_pct(h),
            })
            .collect()
    }

    pub fn growth_series(&self) -> Vec<GrowthPoint> {
        self.history
            .iter()
            .map(|h| GrowthPoint {
                period_label: h.period_label.clone(),
                invested: h.policy.iter().sum(),
                growth: h.expected_profit,
            })
            .collect()
    }

    pub fn mean_risk(&self) -> PerDepartment<f64> {
        PerDepartment::from_fn(|d| mean(self.history.iter().map(|h| h.risk(d))))
    }

    /// Department with the largest mean risk; earlier departments win ties.
    pub fn highest_risk_department(&self) -> Option<Department> {
        if self.history.is_empty() {
            return None;
        }
        let means = self.mean_risk();
        means
            .iter()
            .fold(None, |best: Option<(Department, f64)>, (d, &m)| match best {
                Some((_, bm)) if bm >= m => best,
                _ => Some((d, m)),
            })
            .map(|(d, _)| d)
    }

    /// Relative change of expected profit from the first to the last period, in percent.
    pub fn shift_pct(&self) -> f64 {
        match (self.history.first(), self.history.last()) {
            (Some(first), Some(last)) if self.history.len() >= 2 && first.expected_profit != 0.0 => {
                (last.expected_profit - first.expected_profit) / first.expected_profit.abs() * 100.0
            }
            _ => 0.0,
        }
    }

    pub fn aggregates(&self) -> HistoryAggregates {
        let periods = self.history.len();
        let total_budget = self.history.iter().map(|h| h.budget().unwrap_or(0.0)).sum();
        let cumulative_net_profit: f64 = self.history.iter().map(|h| h.expected_profit).sum();
        let average_net_profit = if periods == 0 {
            0.0
        } else {
            cumulative_net_profit / periods as f64
        };
        let rois = self.roi_series();

        HistoryAggregates {
            periods,
            total_budget,
            cumulative_net_profit,
            average_net_profit,
            latest_roi: rois.last().map_or(0.0, |p| p.roi),
            average_roi: mean(rois.iter().map(|p| p.roi)),
            shift_pct: self.shift_pct(),
            highest_risk_department: self.highest_risk_department(),
        }
    }

    /// Ten equal-width bins over `[min(0, min profit), max(1, max profit)]`.
    /// Each bin is `[lower, lower + step)` except the last, which also holds the
    /// maximum, so the counts always sum to the number of periods.
    pub fn profit_histogram(&self) -> Vec<HistogramBin> {
        if self.history.is_empty() {
            return Vec::new();
        }

        let profits: Vec<f64> = self.history.iter().map(|h| h.expected_profit).collect();
        let lo = profits.iter().copied().fold(0.0_f64, f64::min);
        let hi = profits.iter().copied().fold(1.0_f64, f64::max);
        let step = (hi - lo) / HISTOGRAM_BINS as f64;

        (0..HISTOGRAM_BINS)
            .map(|i| {
                let lower = lo + i as f64 * step;
                let last = i + 1 == HISTOGRAM_BINS;
                let upper = if last { hi } else { lo + (i + 1) as f64 * step };
                let count = profits
                    .iter()
                    .filter(|&&p| p >= lower && (p < upper || (last && p <= upper)))
                    .count();
                HistogramBin { lower, count }
            })
            .collect()
    }
}

/// Every derived value for one history.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub latest_period: Option<String>,
    pub latest_return: f64,
    pub allocation_pct: PerDepartment<f64>,
    pub efficiency: PerDepartment<f64>,
    pub efficiency_targets: PerDepartment<f64>,
    pub allocation_gaps: PerDepartment<f64>,
    pub department_comparison: PerDepartment<DepartmentComparison>,
    pub risk_thresholds: PerDepartment<RiskThresholds>,
    pub bucket_distribution: PerDepartment<BucketDistribution>,
    pub roi_series: Vec<RoiPoint>,
    pub allocation_series: Vec<AllocationPoint>,
    pub growth_series: Vec<GrowthPoint>,
    pub aggregates: HistoryAggregates,
    pub profit_histogram: Vec<HistogramBin>,
}

impl AnalyticsSnapshot {
    pub fn compute(history: &[PeriodResult]) -> Self {
        let analytics = HistoryAnalytics::new(history);
        let latest = analytics.latest();

        let zeros = PerDepartment::default();
        Self {
            latest_period: latest.map(|h| h.period_label.clone()),
            latest_return: latest.map_or(0.0, period_return),
            allocation_pct: latest.map_or(zeros, allocation_pct),
            efficiency: latest.map_or(zeros, efficiency_scores),
            efficiency_targets: latest.map_or(zeros, efficiency_targets),
            allocation_gaps: latest.map_or(zeros, allocation_gaps),
            department_comparison: latest.map_or_else(PerDepartment::default, |h| {
                PerDepartment::from_fn(|d| DepartmentComparison {
                    expected: h.expected(d),
                    risk: h.risk(d),
                })
            }),
            risk_thresholds: analytics.risk_thresholds(),
            bucket_distribution: analytics.bucket_distribution(),
            roi_series: analytics.roi_series(),
            allocation_series: analytics.allocation_series(),
            growth_series: analytics.growth_series(),
            aggregates: analytics.aggregates(),
            profit_histogram: analytics.profit_histogram(),
        }
    }
}
