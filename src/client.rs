use crate::error::{BudgetAnalyticsError, Result};
use crate::schema::PeriodResult;
use crate::service::{BatchUploadResponse, BestChoiceRequest, BestChoiceResponse, ServiceConfig};
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use std::time::Duration;

/// HTTP client for the remote optimization service.
#[derive(Clone)]
pub struct ScoringClient {
    client: Client,
    config: ServiceConfig,
}

impl ScoringClient {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ServiceConfig::from_env())
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Scores one period. The label is attached locally; the service does not echo it.
    pub async fn best_choice(
        &self,
        request: &BestChoiceRequest,
        period_label: &str,
    ) -> Result<PeriodResult> {
        let url = self.config.endpoint("/optimization/best-choice");
        debug!("Requesting best choice for {} from {}", period_label, url);

        let res = self.client.post(&url).json(request).send().await?;
        let body: BestChoiceResponse = Self::check(res).await?.json().await?;
        body.into_period_result(period_label)
    }

    /// Uploads the raw CSV text for batch scoring of every row.
    pub async fn upload_batch(&self, file_name: &str, csv_text: &str) -> Result<Vec<PeriodResult>> {
        let url = self.config.endpoint("/ingestion/upload");
        debug!("Uploading {} ({} bytes) to {}", file_name, csv_text.len(), url);

        let part = Part::text(csv_text.to_string())
            .file_name(file_name.to_string())
            .mime_str("text/csv")?;
        let form = Form::new().part("file", part);

        let res = self.client.post(&url).multipart(form).send().await?;
        let body: BatchUploadResponse = Self::check(res).await?.json().await?;
        body.into_period_results()
    }

    /// Turns a non-success response into its raw body text.
    async fn check(res: Response) -> Result<Response> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let text = res.text().await?;
        let message = if text.trim().is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            text
        };
        Err(BudgetAnalyticsError::ServiceError(message))
    }
}
