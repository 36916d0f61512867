use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use common::{config::AppConfig, logging};
use crawler::{CrawlEngine, EngineConfig};
use db::pg::PgDatabase;
use db::Repositories;
use github::transport::{GraphqlClient, TransportConfig};
use github::RateCoordinator;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging("info");
    let config = AppConfig::load()?;

    let database = PgDatabase::connect(
        &config.database.dsn,
        config.database.statement_timeout_secs,
    )
    .await?;

    let client = GraphqlClient::new(TransportConfig {
        graphql_url: config.github.graphql_url.clone(),
        token: config.github.token.clone(),
        user_agent: "github-crawl/0.1".into(),
        max_retries: config.github.max_retries,
        initial_backoff: Duration::from_secs(config.github.initial_backoff_secs),
        max_backoff: Duration::from_secs(config.github.max_backoff_secs),
        request_timeout: Duration::from_secs(config.github.request_timeout_secs),
    })?;

    let engine_config = EngineConfig {
        max_concurrency: config.github.max_concurrency,
        page_size: config.github.page_size.min(100),
        batch_size: config.database.batch_size,
        search_limit: config.crawl.search_result_limit as u64,
        range_start: config.crawl.range_start,
        target_repository_count: config.crawl.target_repository_count as u64,
    };

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, cancelling crawl");
            shutdown.cancel();
        }
    });

    let engine = CrawlEngine::new(
        Arc::new(client),
        Arc::new(RateCoordinator::new()),
        database.repos_arc(),
        engine_config,
        cancel,
    );

    let result = engine.crawl().await?;
    info!(
        repositories_written = result.repositories_written,
        rate_limit_remaining = ?result.rate_limit_remaining,
        finished_at = %result.finished_at,
        "crawl complete"
    );

    Ok(())
}
