//! HTTP client for the external project-data source.
//!
//! Every request is raced against the caller's abort signal and wrapped
//! in the bounded retry policy: transport errors and 5xx/429 responses
//! are retried with exponential backoff, anything else fails
//! immediately, and exhaustion surfaces as a hard source error.

use std::time::Duration;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;

use super::{AbortSignal, ProjectSource, RawBudget, RawTimeEntry, RawWorkItem, RetryPolicy};
use crate::errors::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpProjectSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl HttpProjectSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_json<T: DeserializeOwned>(&self, path: &str, abort: &AbortSignal) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        let mut last_err: Option<Error> = None;

        for attempt in 1..=self.retry.max_attempts {
            if attempt > 1 {
                let delay = self.retry.delay_for_attempt(attempt - 1);
                log::debug!("retrying {url} in {delay:?} (attempt {attempt})");
                tokio::select! {
                    _ = abort.cancelled() => {
                        return Err(Error::Aborted(format!("fetch of {path} aborted")));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let send = async {
                let mut request = self.client.get(&url);
                if let Some(key) = &self.api_key {
                    request = request.basic_auth("apikey", Some(key));
                }
                request.send().await
            };
            let response = tokio::select! {
                _ = abort.cancelled() => {
                    return Err(Error::Aborted(format!("fetch of {path} aborted")));
                }
                response = send => response,
            };

            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.json::<T>().await?);
                    }
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    let err = Error::source_failure(
                        format!("{url} returned {status}"),
                        Some(status.as_u16()),
                        retryable,
                    );
                    if !retryable {
                        return Err(err);
                    }
                    log::warn!("{url} returned {status}; will retry");
                    last_err = Some(err);
                }
                Err(e) => {
                    if !(e.is_timeout() || e.is_connect() || e.is_request()) {
                        return Err(e.into());
                    }
                    log::warn!("transport error fetching {url}: {e}; will retry");
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            Error::source_failure(format!("{url}: retries exhausted"), None, false)
        }))
    }
}

#[async_trait::async_trait]
impl ProjectSource for HttpProjectSource {
    async fn list_work_items(
        &self,
        project_id: u64,
        abort: &AbortSignal,
    ) -> Result<Vec<RawWorkItem>> {
        self.fetch_json(&format!("projects/{project_id}/work_items"), abort)
            .await
    }

    async fn list_time_entries(
        &self,
        project_id: u64,
        range: Option<(NaiveDate, NaiveDate)>,
        abort: &AbortSignal,
    ) -> Result<Vec<RawTimeEntry>> {
        let path = match range {
            Some((from, to)) => {
                format!("projects/{project_id}/time_entries?from={from}&to={to}")
            }
            None => format!("projects/{project_id}/time_entries"),
        };
        self.fetch_json(&path, abort).await
    }

    async fn list_budgets(&self, project_id: u64, abort: &AbortSignal) -> Result<Vec<RawBudget>> {
        self.fetch_json(&format!("projects/{project_id}/budgets"), abort)
            .await
    }
}
