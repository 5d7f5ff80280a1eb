use crate::schema::CanonicalField;
use serde::{Deserialize, Serialize};

/// Outcome of checking canonicalized headers against the required schema.
///
/// Advisory only: callers decide whether a non-empty `missing` list blocks
/// further processing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Required fields absent from the headers, in schema order.
    pub missing: Vec<CanonicalField>,
    /// The canonicalized headers that were checked.
    pub headers: Vec<String>,
}

impl ValidationReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn missing_names(&self) -> Vec<String> {
        self.missing.iter().map(|f| f.as_str().to_string()).collect()
    }
}

pub fn validate_headers<S: AsRef<str>>(canonical_headers: &[S]) -> ValidationReport {
    let headers: Vec<String> = canonical_headers
        .iter()
        .map(|h| h.as_ref().to_string())
        .collect();

    let missing = CanonicalField::ALL
        .into_iter()
        .filter(|field| !headers.iter().any(|h| h == field.as_str()))
        .collect();

    ValidationReport { missing, headers }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_budget_detected() {
        let headers = [
            "year",
            "quarter",
            "marketing_spend",
            "rnd_spend",
            "ops_spend",
            "marketing_revenue",
            "rnd_revenue",
            "ops_revenue",
        ];
        let report = validate_headers(&headers);
        assert_eq!(report.missing, vec![CanonicalField::Budget]);
        assert_eq!(report.missing_names(), vec!["budget".to_string()]);
        assert!(!report.is_complete());
        assert_eq!(report.headers.len(), 8);
    }

    #[test]
    fn test_complete_with_extra_columns() {
        let mut headers: Vec<String> = CanonicalField::ALL
            .iter()
            .map(|f| f.as_str().to_string())
            .collect();
        headers.insert(0, "notes".to_string());
        headers.reverse();
        let report = validate_headers(&headers);
        assert!(report.is_complete());
        assert_eq!(report.headers, headers);
    }

    #[test]
    fn test_empty_headers_miss_everything_in_schema_order() {
        let report = validate_headers::<&str>(&[]);
        assert_eq!(report.missing, CanonicalField::ALL.to_vec());
    }
}
