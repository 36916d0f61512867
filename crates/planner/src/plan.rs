use crate::range::TimeRange;

/// Immutable unit of crawl work: a time window plus how many results
/// to draw from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePlan {
    pub range: TimeRange,
    pub requested_results: u64,
    pub available_results: u64,
}
