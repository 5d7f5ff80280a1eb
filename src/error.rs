use thiserror::Error;

#[derive(Error, Debug)]
pub enum BudgetAnalyticsError {
    #[error("Missing required columns: {}. Detected headers: {}", missing.join(", "), detected.join(", "))]
    MissingColumns {
        missing: Vec<String>,
        detected: Vec<String>,
    },

    #[error("Invalid allocation policy: expected 3 department amounts, got {0}")]
    InvalidPolicy(usize),

    #[error("Row {index} is out of range for a table of {rows} rows")]
    RowOutOfRange { index: usize, rows: usize },

    #[error("Scoring service error: {0}")]
    ServiceError(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "remote")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, BudgetAnalyticsError>;
