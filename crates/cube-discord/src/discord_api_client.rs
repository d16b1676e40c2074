//! Discord REST client used by the status runtime to publish messages.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::messenger::{DiscordApiError, MessagePayload, StatusMessenger};

#[derive(Debug, Clone, Deserialize)]
/// Identity returned by the `users/@me` readiness check.
pub struct BotIdentity {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DiscordMessageResponse {
    id: String,
}

pub struct DiscordApiClient {
    http: reqwest::Client,
    api_base: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl DiscordApiClient {
    pub fn new(
        api_base: String,
        bot_token: String,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("cubewatch-status-bot"),
        );
        let mut auth = reqwest::header::HeaderValue::from_str(&format!(
            "Bot {}",
            bot_token.trim()
        ))
        .context("discord token contains invalid header characters")?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create discord api client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            retry_max_attempts: retry_max_attempts.max(1),
            retry_base_delay_ms: retry_base_delay_ms.max(1),
        })
    }

    pub async fn resolve_bot_identity(&self) -> Result<BotIdentity, DiscordApiError> {
        let operation = "users/@me";
        let response = self
            .execute(
                operation,
                || self.http.get(format!("{}/users/@me", self.api_base)),
                false,
            )
            .await?;
        response
            .json::<BotIdentity>()
            .await
            .map_err(|source| DiscordApiError::Decode { operation, source })
    }

    pub async fn create_message(
        &self,
        channel_id: &str,
        payload: &MessagePayload,
    ) -> Result<String, DiscordApiError> {
        let operation = "create message";
        let url = format!("{}/channels/{}/messages", self.api_base, channel_id);
        let response = self
            .execute(operation, || self.http.post(&url).json(payload), false)
            .await?;
        let message = response
            .json::<DiscordMessageResponse>()
            .await
            .map_err(|source| DiscordApiError::Decode { operation, source })?;
        Ok(message.id)
    }

    pub async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        payload: &MessagePayload,
    ) -> Result<(), DiscordApiError> {
        let url = format!(
            "{}/channels/{}/messages/{}",
            self.api_base, channel_id, message_id
        );
        self.execute("edit message", || self.http.patch(&url).json(payload), true)
            .await?;
        Ok(())
    }

    pub async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<bool, DiscordApiError> {
        let url = format!(
            "{}/channels/{}/messages/{}",
            self.api_base, channel_id, message_id
        );
        match self
            .execute("fetch message", || self.http.get(&url), true)
            .await
        {
            Ok(_) => Ok(true),
            Err(DiscordApiError::NotFound) => Ok(false),
            Err(error) => Err(error),
        }
    }

    async fn execute<F>(
        &self,
        operation: &'static str,
        mut builder: F,
        not_found_is_missing: bool,
    ) -> Result<reqwest::Response, DiscordApiError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = builder()
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
                        return Ok(response);
                    }
                    if not_found_is_missing && status.as_u16() == 404 {
                        return Err(DiscordApiError::NotFound);
                    }
                    let retry_after = parse_retry_after(response.headers());
                    if attempt < self.retry_max_attempts && is_retryable_status(status.as_u16()) {
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }
                    let body = response.text().await.unwrap_or_default();
                    return Err(DiscordApiError::Status {
                        operation,
                        status: status.as_u16(),
                        body: truncate_for_error(&body, 320),
                    });
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(DiscordApiError::Transport {
                        operation,
                        source: error,
                    });
                }
            }
        }
    }
}

#[async_trait]
impl StatusMessenger for DiscordApiClient {
    async fn ready(&self) -> Result<(), DiscordApiError> {
        let identity = self.resolve_bot_identity().await?;
        tracing::info!(
            "discord identity confirmed: {} ({})",
            identity.username,
            identity.id
        );
        Ok(())
    }

    async fn send(
        &self,
        channel_id: &str,
        payload: &MessagePayload,
    ) -> Result<String, DiscordApiError> {
        self.create_message(channel_id, payload).await
    }

    async fn edit(
        &self,
        channel_id: &str,
        message_id: &str,
        payload: &MessagePayload,
    ) -> Result<(), DiscordApiError> {
        self.edit_message(channel_id, message_id, payload).await
    }

    async fn message_exists(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<bool, DiscordApiError> {
        self.fetch_message(channel_id, message_id).await
    }
}

/// Discord reports Retry-After in seconds, possibly fractional.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .map(Duration::from_secs_f64)
}

fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after: Option<Duration>) -> Duration {
    if let Some(retry_after) = retry_after {
        return retry_after;
    }
    let exponent = attempt.saturating_sub(1).min(6) as u32;
    let scale = 2_u64.pow(exponent);
    Duration::from_millis(base_delay_ms.max(1).saturating_mul(scale))
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

fn truncate_for_error(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated = value.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}
