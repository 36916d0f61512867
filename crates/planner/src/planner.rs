use chrono::Duration;
use github::{GraphqlClient, RateCoordinator, TransportFatal, REPOSITORY_COUNT_QUERY};
use serde_json::{json, Value};
use tracing::warn;

use crate::plan::RangePlan;
use crate::range::TimeRange;

const DEFAULT_MINIMUM_GRAIN: Duration = Duration::seconds(1);

/// Subdivides a single requested target into a disjoint list of
/// `RangePlan`s, none exceeding `search_limit` available results.
pub struct RangePlanner<'a> {
    client: &'a GraphqlClient,
    rate_coordinator: &'a RateCoordinator,
    search_limit: u64,
    minimum_grain: Duration,
}

impl<'a> RangePlanner<'a> {
    pub fn new(client: &'a GraphqlClient, rate_coordinator: &'a RateCoordinator, search_limit: u64) -> Self {
        Self {
            client,
            rate_coordinator,
            search_limit,
            minimum_grain: DEFAULT_MINIMUM_GRAIN,
        }
    }

    pub async fn plan(
        &self,
        initial_range: TimeRange,
        target: u64,
    ) -> Result<Vec<RangePlan>, TransportFatal> {
        let mut stack = vec![(initial_range, None::<u64>)];
        let mut remaining = target;
        let mut plans = Vec::new();

        while let Some((range, known_count)) = stack.pop() {
            if remaining == 0 {
                break;
            }

            let count = match known_count {
                Some(count) => count,
                None => self.count_repositories(&range).await?,
            };

            if count == 0 {
                continue;
            }

            if count > self.search_limit {
                if !range.can_split(self.minimum_grain) {
                    warn!(
                        start = %range.start,
                        end = %range.end,
                        count,
                        "range unsplittable below minimum grain; clamping to search limit"
                    );
                    plans.push(self.emit(range, count.min(self.search_limit), &mut remaining));
                    continue;
                }

                let (older, newer) = range.split();
                let older_count = self.count_repositories(&older).await?;
                let newer_count = self.count_repositories(&newer).await?;

                if older_count + newer_count < count.min(self.search_limit) {
                    warn!(
                        start = %range.start,
                        end = %range.end,
                        count,
                        older_count,
                        newer_count,
                        "anti-anomaly guard triggered; treating parent range as terminal"
                    );
                    plans.push(self.emit(range, count.min(self.search_limit), &mut remaining));
                    continue;
                }

                // older pops first
                stack.push((newer, Some(newer_count)));
                stack.push((older, Some(older_count)));
                continue;
            }

            plans.push(self.emit(range, count, &mut remaining));
        }

        Ok(plans)
    }

    fn emit(&self, range: TimeRange, available: u64, remaining: &mut u64) -> RangePlan {
        let requested = available.min(*remaining);
        *remaining -= requested;
        RangePlan {
            range,
            requested_results: requested,
            available_results: available,
        }
    }

    async fn count_repositories(&self, range: &TimeRange) -> Result<u64, TransportFatal> {
        self.rate_coordinator.acquire().await;

        let variables = json!({ "query": range.to_search_query() });
        let result = self.client.execute(REPOSITORY_COUNT_QUERY, variables).await;

        match result {
            Ok((data, rate_limit)) => {
                if let Some(snapshot) = rate_limit {
                    self.rate_coordinator.record(snapshot).await;
                }
                Ok(extract_count(&data))
            }
            Err(err) => {
                self.rate_coordinator.reset().await;
                Err(err)
            }
        }
    }
}

fn extract_count(data: &Value) -> u64 {
    data.get("search")
        .and_then(|search| search.get("repositoryCount"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}
