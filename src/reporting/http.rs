//! HTTP progress reporter

use crate::reporting::{ProgressReport, ProgressReporter, ReportError};
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::debug;

/// Posts progress reports as JSON to a REST endpoint
pub struct HttpProgressReporter {
    client: Client,
    endpoint: String,
}

impl HttpProgressReporter {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ReportError> {
        let endpoint = endpoint.into();
        if !is_http_url(&endpoint) {
            return Err(ReportError::InvalidEndpoint(endpoint));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReportError::Transport(e.to_string()))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ProgressReporter for HttpProgressReporter {
    fn record_progress(&self, report: &ProgressReport) -> Result<(), ReportError> {
        debug!(endpoint = %self.endpoint, challenge = %report.challenge_id, "posting progress");

        let response = self
            .client
            .post(&self.endpoint)
            .json(report)
            .send()
            .map_err(|e| ReportError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ReportError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}

pub(crate) fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty())
}
