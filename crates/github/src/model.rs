use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Point-in-time reading of the provider's rate-limit budget, carried
/// alongside every GraphQL response under `data.rateLimit`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub cost: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Extracts `data.rateLimit` from a successful GraphQL response body,
/// if the query asked for it.
pub fn parse_rate_limit(data: &Value) -> Option<RateLimitSnapshot> {
    let rate_limit = data.get("rateLimit")?;
    let cost = rate_limit.get("cost")?.as_u64()? as u32;
    let remaining = rate_limit.get("remaining")?.as_u64()? as u32;
    let reset_at = rate_limit.get("resetAt")?.as_str()?;
    let reset_at = DateTime::parse_from_rfc3339(reset_at)
        .ok()?
        .with_timezone(&Utc);
    Some(RateLimitSnapshot {
        cost,
        remaining,
        reset_at,
    })
}

/// Parses a `Retry-After` header in either integer-seconds or HTTP-date
/// form, returning the delta to now floored at zero.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = httpdate::parse_http_date(value).ok()?;
    let now = std::time::SystemTime::now();
    Some(date.duration_since(now).unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_rate_limit_from_response_body() {
        let data = json!({
            "rateLimit": {"cost": 5, "remaining": 4995, "resetAt": "2024-01-01T00:00:00Z"}
        });
        let snapshot = parse_rate_limit(&data).expect("snapshot");
        assert_eq!(snapshot.cost, 5);
        assert_eq!(snapshot.remaining, 4995);
    }

    #[test]
    fn missing_rate_limit_is_none() {
        assert!(parse_rate_limit(&json!({"search": {}})).is_none());
    }

    #[test]
    fn parses_integer_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "30".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(30)));
    }
}
