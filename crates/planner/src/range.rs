use chrono::{DateTime, Duration, Utc};

/// Half-open `[start, end)` interval over the creation-time axis.
/// `start` must be strictly before `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(start < end, "TimeRange requires start < end");
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// True when the range can still be halved into two intervals of
    /// at least `minimum_grain` each.
    pub fn can_split(&self, minimum_grain: Duration) -> bool {
        self.duration() >= minimum_grain * 2
    }

    /// Splits into two contiguous, non-overlapping halves whose union
    /// is the original range; the older half is returned first.
    pub fn split(&self) -> (TimeRange, TimeRange) {
        let nanos = self
            .duration()
            .num_nanoseconds()
            .expect("range duration fits in i64 nanoseconds");
        let midpoint = self.start + Duration::nanoseconds(nanos / 2);

        (
            TimeRange::new(self.start, midpoint),
            TimeRange::new(midpoint, self.end),
        )
    }

    /// Renders the GitHub search qualifier for this range.
    pub fn to_search_query(&self) -> String {
        format!(
            "created:>={} created:<{} is:public sort:created-asc",
            self.start.format("%Y-%m-%dT%H:%M:%SZ"),
            self.end.format("%Y-%m-%dT%H:%M:%SZ"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn split_is_contiguous_and_exact() {
        let range = TimeRange::new(dt("2024-01-01T00:00:00Z"), dt("2024-01-05T00:00:00Z"));
        let (older, newer) = range.split();
        assert_eq!(older.start, range.start);
        assert_eq!(older.end, newer.start);
        assert_eq!(newer.end, range.end);

        let delta = (older.duration() - newer.duration()).num_nanoseconds().unwrap().abs();
        assert!(delta <= 1_000_000_000, "halves differ by at most one grain");
    }

    #[test]
    fn cannot_split_below_two_grains() {
        let range = TimeRange::new(dt("2024-01-01T00:00:00Z"), dt("2024-01-01T00:00:01.5Z"));
        assert!(!range.can_split(Duration::seconds(1)));
    }

    #[test]
    fn search_query_formats_bounds_as_utc_z() {
        let range = TimeRange::new(dt("2024-01-01T00:00:00Z"), dt("2024-01-02T00:00:00Z"));
        assert_eq!(
            range.to_search_query(),
            "created:>=2024-01-01T00:00:00Z created:<2024-01-02T00:00:00Z is:public sort:created-asc"
        );
    }
}
