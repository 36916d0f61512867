use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use db::RepoRepository;
use github::{GraphqlClient, RateCoordinator, REPOSITORY_SEARCH_QUERY};
use planner::{RangePlan, RangePlanner, TimeRange};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::record::RepositoryRecord;
use crate::seen::SeenSet;
use crate::writer::{Writer, WriterMessage};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_concurrency: usize,
    pub page_size: u32,
    pub batch_size: usize,
    pub search_limit: u64,
    pub range_start: DateTime<Utc>,
    pub target_repository_count: u64,
}

#[derive(Debug, Clone)]
pub struct CrawlResult {
    pub repositories_written: usize,
    pub rate_limit_remaining: Option<u32>,
    pub finished_at: DateTime<Utc>,
}

/// Orchestrates planning, concurrent fan-out over plans, paged fetch
/// per plan, deduplication, and handoff to the writer.
pub struct CrawlEngine {
    client: Arc<GraphqlClient>,
    rate_coordinator: Arc<RateCoordinator>,
    db: Arc<dyn RepoRepository>,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl CrawlEngine {
    pub fn new(
        client: Arc<GraphqlClient>,
        rate_coordinator: Arc<RateCoordinator>,
        db: Arc<dyn RepoRepository>,
        config: EngineConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            rate_coordinator,
            db,
            config,
            cancel,
        }
    }

    #[instrument(skip(self))]
    pub async fn crawl(&self) -> Result<CrawlResult> {
        let initial_range = TimeRange::new(self.config.range_start, Utc::now());
        let planner = RangePlanner::new(
            &self.client,
            &self.rate_coordinator,
            self.config.search_limit,
        );
        let plans = planner
            .plan(initial_range, self.config.target_repository_count)
            .await
            .map_err(|err| anyhow::anyhow!(err.to_string()))
            .context("planning crawl ranges")?;

        info!(plan_count = plans.len(), "planned crawl ranges");

        let (tx, rx) = mpsc::channel(2 * self.config.batch_size.max(1));
        let writer = Writer::new(self.db.clone(), self.config.batch_size);
        let writer_cancel = self.cancel.clone();
        let writer_handle = tokio::spawn(async move { writer.run(rx, writer_cancel).await });

        let seen = Arc::new(SeenSet::new());
        let gate = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut producers = JoinSet::new();

        for plan in plans {
            producers.spawn(run_producer(
                plan,
                self.client.clone(),
                self.rate_coordinator.clone(),
                seen.clone(),
                gate.clone(),
                tx.clone(),
                self.cancel.clone(),
                self.config.page_size,
            ));
        }

        while let Some(joined) = producers.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "producer task panicked");
            }
        }

        let _ = tx.send(WriterMessage::EndOfStream).await;
        drop(tx);

        let repositories_written = writer_handle
            .await
            .context("writer task panicked")?
            .context("writer failed")?;

        Ok(CrawlResult {
            repositories_written,
            rate_limit_remaining: self.rate_coordinator.remaining().await,
            finished_at: Utc::now(),
        })
    }
}

/// One producer per plan: pages through `REPOSITORY_SEARCH_QUERY`
/// until the plan's requested count is reached or the provider runs
/// out of pages. Transport failures terminate only this producer.
#[allow(clippy::too_many_arguments)]
#[instrument(
    skip(plan, client, rate_coordinator, seen, gate, tx, cancel),
    fields(start = %plan.range.start, end = %plan.range.end)
)]
async fn run_producer(
    plan: RangePlan,
    client: Arc<GraphqlClient>,
    rate_coordinator: Arc<RateCoordinator>,
    seen: Arc<SeenSet>,
    gate: Arc<Semaphore>,
    tx: mpsc::Sender<WriterMessage>,
    cancel: CancellationToken,
    page_size_cap: u32,
) {
    let mut remaining = plan.requested_results;
    let mut cursor: Option<String> = None;

    while remaining > 0 {
        if cancel.is_cancelled() {
            break;
        }

        let page_size = page_size_cap.min(remaining.min(u32::MAX as u64) as u32).max(1);

        rate_coordinator.acquire().await;
        let permit = match gate.acquire().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let variables = json!({
            "query": plan.range.to_search_query(),
            "first": page_size,
            "after": cursor,
        });

        let response = client.execute(REPOSITORY_SEARCH_QUERY, variables).await;
        drop(permit);

        let (data, rate_limit) = match response {
            Ok(result) => result,
            Err(err) => {
                rate_coordinator.reset().await;
                warn!(
                    start = %plan.range.start,
                    end = %plan.range.end,
                    error = %err,
                    "producer stopped after transport failure"
                );
                return;
            }
        };

        if let Some(snapshot) = rate_limit {
            rate_coordinator.record(snapshot).await;
        }

        let search = data.get("search");
        let nodes: Vec<Value> = search
            .and_then(|s| s.get("nodes"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        if nodes.is_empty() {
            break;
        }

        let fetched_at = Utc::now();
        let mut exhausted = false;
        for node in &nodes {
            let record = match RepositoryRecord::from_node(node, fetched_at) {
                Ok(record) => record,
                Err(err) => {
                    warn!(error = %err, "skipping malformed repository node");
                    continue;
                }
            };

            if !seen.insert_if_absent(&record.node_id).await {
                continue;
            }

            remaining = remaining.saturating_sub(1);
            if tx.send(WriterMessage::Record(record.into())).await.is_err() {
                return;
            }

            if remaining == 0 {
                exhausted = true;
                break;
            }
        }

        if exhausted {
            break;
        }

        let page_info = search.and_then(|s| s.get("pageInfo"));
        let has_next = page_info
            .and_then(|p| p.get("hasNextPage"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if !has_next {
            break;
        }

        cursor = page_info
            .and_then(|p| p.get("endCursor"))
            .and_then(Value::as_str)
            .map(str::to_owned);
    }
}
