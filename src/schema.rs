use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The nine fields every ingested table must provide after header mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Year,
    Quarter,
    Budget,
    MarketingSpend,
    RndSpend,
    OpsSpend,
    MarketingRevenue,
    RndRevenue,
    OpsRevenue,
}

impl CanonicalField {
    /// Required schema, in the order deficiencies are reported.
    pub const ALL: [CanonicalField; 9] = [
        CanonicalField::Year,
        CanonicalField::Quarter,
        CanonicalField::Budget,
        CanonicalField::MarketingSpend,
        CanonicalField::RndSpend,
        CanonicalField::OpsSpend,
        CanonicalField::MarketingRevenue,
        CanonicalField::RndRevenue,
        CanonicalField::OpsRevenue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalField::Year => "year",
            CanonicalField::Quarter => "quarter",
            CanonicalField::Budget => "budget",
            CanonicalField::MarketingSpend => "marketing_spend",
            CanonicalField::RndSpend => "rnd_spend",
            CanonicalField::OpsSpend => "ops_spend",
            CanonicalField::MarketingRevenue => "marketing_revenue",
            CanonicalField::RndRevenue => "rnd_revenue",
            CanonicalField::OpsRevenue => "ops_revenue",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Quarter {
    #[default]
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    /// Maps 1..=4 to a quarter, clamping anything outside the range.
    pub fn from_number(n: i64) -> Self {
        match n.clamp(1, 4) {
            1 => Quarter::Q1,
            2 => Quarter::Q2,
            3 => Quarter::Q3,
            _ => Quarter::Q4,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Quarter::Q1 => 1,
            Quarter::Q2 => 2,
            Quarter::Q3 => 3,
            Quarter::Q4 => 4,
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.number())
    }
}

/// One period's raw financial facts after ingestion.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CanonicalRow {
    pub year: i32,
    pub quarter: Quarter,
    pub budget: f64,
    pub marketing_spend: f64,
    pub rnd_spend: f64,
    pub ops_spend: f64,
    pub marketing_revenue: f64,
    pub rnd_revenue: f64,
    pub ops_revenue: f64,
}

impl CanonicalRow {
    pub fn period_label(&self) -> String {
        format!("{} {}", self.year, self.quarter)
    }

    pub fn total_spend(&self) -> f64 {
        self.marketing_spend + self.rnd_spend + self.ops_spend
    }

    pub fn total_revenue(&self) -> f64 {
        self.marketing_revenue + self.rnd_revenue + self.ops_revenue
    }

    pub fn revenue(&self, department: Department) -> f64 {
        match department {
            Department::Marketing => self.marketing_revenue,
            Department::RnD => self.rnd_revenue,
            Department::Ops => self.ops_revenue,
        }
    }

    pub fn spend(&self, department: Department) -> f64 {
        match department {
            Department::Marketing => self.marketing_spend,
            Department::RnD => self.rnd_spend,
            Department::Ops => self.ops_spend,
        }
    }
}

/// Departments in policy order: Marketing, R&D, Ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Department {
    Marketing,
    RnD,
    Ops,
}

impl Department {
    pub const ALL: [Department; 3] = [Department::Marketing, Department::RnD, Department::Ops];

    pub fn index(self) -> usize {
        match self {
            Department::Marketing => 0,
            Department::RnD => 1,
            Department::Ops => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Department::Marketing => "Marketing",
            Department::RnD => "R&D",
            Department::Ops => "Ops",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-department figures keyed the way the scoring service names them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct DepartmentFigures {
    #[serde(rename = "Marketing_Revenue", default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Figure for the Marketing department")]
    pub marketing: Option<f64>,

    #[serde(rename = "RnD_Revenue", default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Figure for the R&D department")]
    pub rnd: Option<f64>,

    #[serde(rename = "Ops_Revenue", default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Figure for the Operations department")]
    pub ops: Option<f64>,
}

impl DepartmentFigures {
    pub fn new(marketing: f64, rnd: f64, ops: f64) -> Self {
        Self {
            marketing: Some(marketing),
            rnd: Some(rnd),
            ops: Some(ops),
        }
    }

    /// Absent figures read as 0.
    pub fn get(&self, department: Department) -> f64 {
        let value = match department {
            Department::Marketing => self.marketing,
            Department::RnD => self.rnd,
            Department::Ops => self.ops,
        };
        value.filter(|v| v.is_finite()).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct AllocationShares {
    #[serde(default)]
    pub marketing: Option<f64>,
    #[serde(default)]
    pub rnd: Option<f64>,
    #[serde(default)]
    pub ops: Option<f64>,
}

/// Auxiliary detail returned by the scoring service alongside a period's result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Explain {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Budget available for the period")]
    pub budget: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Sum of the three department spends")]
    pub total_spend: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Expected combined revenue across departments")]
    pub avg_revenue: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Net profit for the period; export falls back to expected_profit when absent")]
    pub net_profit: Option<f64>,

    #[serde(default)]
    #[schemars(description = "Expected revenue per department")]
    pub expected: DepartmentFigures,

    #[serde(default)]
    #[schemars(description = "Revenue volatility (standard deviation) per department")]
    pub risk: DepartmentFigures,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_weight: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation_pct: Option<AllocationShares>,
}

impl Explain {
    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(Explain);
        serde_json::to_string_pretty(&schema)
    }
}

/// One scored period. `period_label` is unique within a history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodResult {
    #[serde(rename = "periodLabel", alias = "period_label")]
    pub period_label: String,
    pub expected_profit: f64,
    pub variance: f64,
    pub value: f64,
    /// Marketing, R&D and Ops allocation amounts.
    pub policy: [f64; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain: Option<Explain>,
}

impl PeriodResult {
    pub fn budget(&self) -> Option<f64> {
        self.explain.as_ref().and_then(|e| e.budget)
    }

    pub fn avg_revenue(&self) -> Option<f64> {
        self.explain.as_ref().and_then(|e| e.avg_revenue)
    }

    pub fn total_spend(&self) -> Option<f64> {
        self.explain.as_ref().and_then(|e| e.total_spend)
    }

    pub fn net_profit(&self) -> f64 {
        self.explain
            .as_ref()
            .and_then(|e| e.net_profit)
            .unwrap_or(self.expected_profit)
    }

    pub fn expected(&self, department: Department) -> f64 {
        self.explain
            .as_ref()
            .map(|e| e.expected.get(department))
            .unwrap_or(0.0)
    }

    pub fn risk(&self, department: Department) -> f64 {
        self.explain
            .as_ref()
            .map(|e| e.risk.get(department))
            .unwrap_or(0.0)
    }
}
