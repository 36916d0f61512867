use std::time::Duration;

/// Doubles `current` up to `max`, with no jitter: the provider's
/// secondary rate limit is a hard wait, not a contention point worth
/// smearing.
pub fn double(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}
