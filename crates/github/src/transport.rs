use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::warn;

use crate::backoff::double;
use crate::error::{FatalCause, Outcome, RetryableCause, TransportFatal};
use crate::model::{parse_rate_limit, parse_retry_after, RateLimitSnapshot};

const GRAPHQL_RETRY_TYPES: [&str; 2] = ["RATE_LIMITED", "ABUSE_DETECTED"];
const GRAPHQL_RETRY_SUBSTRINGS: [&str; 3] = ["timeout", "try again", "temporary"];

pub struct TransportConfig {
    pub graphql_url: String,
    pub token: String,
    pub user_agent: String,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub request_timeout: Duration,
}

/// Executes one GraphQL operation against the provider, retrying
/// transient failures with exponential backoff. The only
/// error this type's public method can return is `TransportFatal`.
pub struct GraphqlClient {
    http: Client,
    config: TransportConfig,
}

impl GraphqlClient {
    pub fn new(config: TransportConfig) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { http, config })
    }

    pub async fn execute(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<(Value, Option<RateLimitSnapshot>), TransportFatal> {
        let mut backoff = self.config.initial_backoff;
        let mut last_retryable = String::new();

        for attempt in 0..self.config.max_retries {
            match self.attempt_once(query, variables.clone()).await {
                Ok(result) => return Ok(result),
                Err(Outcome::Fatal(cause)) => return Err(TransportFatal::new(cause)),
                Err(Outcome::Retry(cause)) => {
                    last_retryable = cause.to_string();
                    if attempt + 1 == self.config.max_retries {
                        return Err(TransportFatal::new(FatalCause::RetriesExhausted {
                            last_retryable,
                        }));
                    }

                    let sleep_for = match &cause {
                        RetryableCause::SecondaryRateLimit(retry_after) => backoff
                            .max(*retry_after)
                            .min(self.config.max_backoff),
                        RetryableCause::GraphQLRetry(Some(retry_after)) => {
                            (*retry_after).min(self.config.max_backoff)
                        }
                        _ => backoff,
                    };

                    warn!(
                        attempt,
                        cause = %cause,
                        wait_ms = sleep_for.as_millis(),
                        "retrying graphql request"
                    );
                    sleep(sleep_for).await;
                    backoff = double(backoff, self.config.max_backoff);
                }
            }
        }

        unreachable!("loop always returns on the final attempt")
    }

    async fn attempt_once(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<(Value, Option<RateLimitSnapshot>), Outcome> {
        let payload = json!({ "query": query, "variables": variables });

        let mut request = self
            .http
            .post(&self.config.graphql_url)
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, &self.config.user_agent)
            .json(&payload);

        if !self.config.token.is_empty() {
            request = request.header(AUTHORIZATION, format!("bearer {}", self.config.token));
        }

        let response = request
            .send()
            .await
            .map_err(|err| Outcome::Retry(RetryableCause::Network(err.to_string())))?;

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| Outcome::Retry(RetryableCause::Network(err.to_string())))?;

        if matches!(status.as_u16(), 502 | 503 | 504) {
            return Err(Outcome::Retry(RetryableCause::Transient5xx(
                status.as_u16(),
            )));
        }

        if status.as_u16() == 403 {
            let message = serde_json::from_slice::<Value>(&bytes)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned));

            if let Some(message) = &message {
                if message.to_lowercase().contains("rate limit") {
                    let retry_after = parse_retry_after(&headers).unwrap_or(Duration::ZERO);
                    return Err(Outcome::Retry(RetryableCause::SecondaryRateLimit(
                        retry_after,
                    )));
                }
            }

            return Err(Outcome::Fatal(FatalCause::Http4xx {
                status: 403,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            }));
        }

        if !status.is_success() {
            return Err(Outcome::Fatal(FatalCause::Http4xx {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            }));
        }

        let value: Value = serde_json::from_slice(&bytes).map_err(|err| {
            Outcome::Fatal(FatalCause::Http4xx {
                status: status.as_u16(),
                body: format!("invalid json body: {err}"),
            })
        })?;

        if let Some(errors) = value.get("errors").and_then(Value::as_array) {
            let mut retryable = false;
            let mut retry_after_override = None;
            let mut messages = Vec::with_capacity(errors.len());

            for error in errors {
                let err_type = error.get("type").and_then(Value::as_str).unwrap_or("");
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                let message_lower = message.to_lowercase();

                if GRAPHQL_RETRY_TYPES.contains(&err_type)
                    || GRAPHQL_RETRY_SUBSTRINGS
                        .iter()
                        .any(|needle| message_lower.contains(needle))
                {
                    retryable = true;
                }

                if let Some(seconds) = error.get("retryAfter").and_then(Value::as_u64) {
                    retry_after_override = Some(Duration::from_secs(seconds));
                }

                messages.push(message);
            }

            if retryable {
                return Err(Outcome::Retry(RetryableCause::GraphQLRetry(
                    retry_after_override,
                )));
            }

            return Err(Outcome::Fatal(FatalCause::GraphQLError { errors: messages }));
        }

        let data = value
            .get("data")
            .cloned()
            .ok_or(Outcome::Fatal(FatalCause::MissingData))?;
        let rate_limit = parse_rate_limit(&data);
        Ok((data, rate_limit))
    }
}
