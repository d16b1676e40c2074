//! HTTP client for the master-server list endpoint.

use std::time::Duration;

use anyhow::{bail, Context, Result};

const MASTER_LIST_PATH: &str = "/retrieve.do?action=list&name=none";

pub struct MasterListClient {
    http: reqwest::Client,
    base_url: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl MasterListClient {
    pub fn new(
        base_url: String,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("cubewatch-directory"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create master list client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_max_attempts: retry_max_attempts.max(1),
            retry_base_delay_ms: retry_base_delay_ms.max(1),
        })
    }

    /// Fetches the raw newline-delimited master list.
    pub async fn fetch_raw_list(&self) -> Result<String> {
        let url = format!("{}{}", self.base_url, MASTER_LIST_PATH);
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = self
                .http
                .get(&url)
                .header(
                    "x-cubewatch-retry-attempt",
                    attempt.saturating_sub(1).to_string(),
                )
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .text()
                            .await
                            .context("failed to read master list body");
                    }
                    if attempt < self.retry_max_attempts && is_retryable_status(status.as_u16()) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt)).await;
                        continue;
                    }
                    bail!(
                        "master list fetch failed with status {}",
                        status.as_u16()
                    );
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt)).await;
                        continue;
                    }
                    return Err(error).context("master list request failed");
                }
            }
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

fn retry_delay(base_delay_ms: u64, attempt: usize) -> Duration {
    let exponent = attempt.saturating_sub(1).min(6) as u32;
    let scale = 2_u64.pow(exponent);
    Duration::from_millis(base_delay_ms.max(1).saturating_mul(scale))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use httpmock::prelude::*;

    use super::{retry_delay, MasterListClient};

    #[test]
    fn unit_retry_delay_backs_off_exponentially() {
        assert_eq!(retry_delay(100, 1), Duration::from_millis(100));
        assert_eq!(retry_delay(100, 2), Duration::from_millis(200));
        assert_eq!(retry_delay(100, 4), Duration::from_millis(800));
    }

    #[tokio::test]
    async fn functional_fetch_raw_list_returns_body() {
        let server = MockServer::start();
        let list = server.mock(|when, then| {
            when.method(GET)
                .path("/retrieve.do")
                .query_param("action", "list");
            then.status(200).body("addserver 198.51.100.7 28763\n");
        });

        let client = MasterListClient::new(server.base_url(), 2_000, 3, 1).expect("client");
        let raw = client.fetch_raw_list().await.expect("fetch");
        assert!(raw.contains("addserver"));
        list.assert();
    }

    #[tokio::test]
    async fn functional_fetch_raw_list_retries_server_errors() {
        let server = MockServer::start();
        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/retrieve.do")
                .header("x-cubewatch-retry-attempt", "0");
            then.status(503);
        });
        let second = server.mock(|when, then| {
            when.method(GET)
                .path("/retrieve.do")
                .header("x-cubewatch-retry-attempt", "1");
            then.status(200).body("addserver 198.51.100.7 28763\n");
        });

        let client = MasterListClient::new(server.base_url(), 2_000, 3, 1).expect("client");
        let raw = client.fetch_raw_list().await.expect("fetch");
        assert!(raw.starts_with("addserver"));
        first.assert();
        second.assert();
    }

    #[tokio::test]
    async fn regression_fetch_raw_list_reports_terminal_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/retrieve.do");
            then.status(403);
        });

        let client = MasterListClient::new(server.base_url(), 2_000, 3, 1).expect("client");
        let error = client.fetch_raw_list().await.expect_err("must fail");
        assert!(error.to_string().contains("403"));
    }
}
