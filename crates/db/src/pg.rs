use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::time::{sleep, Duration};
use tracing::{instrument, warn};

use crate::errors::{DbError, Result};
use crate::models::{RepositoryRow, SnapshotRow};
use crate::repositories::{RepoRepository, Repositories};

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(DbError::Migration)
}

#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
    repo_repo: Arc<PgRepoRepository>,
}

impl PgDatabase {
    /// Opens a pool, retrying the initial connection with exponential
    /// backoff, then runs pending migrations. `statement_timeout_secs`
    /// is applied to every connection in the pool so a stuck query
    /// aborts instead of holding a connection indefinitely.
    pub async fn connect(database_url: &str, statement_timeout_secs: u64) -> Result<Self> {
        const MAX_ATTEMPTS: u32 = 5;
        const BASE_DELAY_MS: u64 = 500;

        let statement_timeout_ms = statement_timeout_secs * 1000;

        let mut attempts = 0;
        loop {
            let result = PgPoolOptions::new()
                .max_connections(10)
                .after_connect(move |conn, _meta| {
                    Box::pin(async move {
                        sqlx::query(&format!(
                            "SET statement_timeout = {statement_timeout_ms}"
                        ))
                        .execute(conn)
                        .await?;
                        Ok(())
                    })
                })
                .connect(database_url)
                .await;

            match result {
                Ok(pool) => {
                    run_migrations(&pool).await?;
                    return Ok(Self::from_pool(pool));
                }
                Err(err) => {
                    attempts += 1;
                    if attempts >= MAX_ATTEMPTS {
                        return Err(DbError::Query(err));
                    }

                    let exp = (attempts - 1).min(5);
                    let backoff = Duration::from_millis(BASE_DELAY_MS * (1u64 << exp));
                    warn!(
                        attempts,
                        error = %err,
                        wait_ms = backoff.as_millis(),
                        "database connection failed; retrying"
                    );
                    sleep(backoff).await;
                }
            }
        }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        let repo_repo = Arc::new(PgRepoRepository { pool: pool.clone() });
        Self { pool, repo_repo }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn repos_arc(&self) -> Arc<dyn RepoRepository> {
        self.repo_repo.clone()
    }
}

impl Repositories for PgDatabase {
    fn repos(&self) -> &dyn RepoRepository {
        &*self.repo_repo
    }
}

#[derive(Clone)]
struct PgRepoRepository {
    pool: PgPool,
}

#[async_trait]
impl RepoRepository for PgRepoRepository {
    #[instrument(skip(self, records), fields(batch_size = records.len()))]
    async fn write_batch(&self, records: &[RepositoryRow]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(DbError::Query)?;

        for repo in records {
            sqlx::query(
                r#"
                INSERT INTO github_repositories (
                    node_id, database_id, owner_login, owner_type, name, full_name,
                    description, primary_language, stargazer_count, fork_count,
                    open_issue_count, watcher_count, is_private, is_fork, is_archived,
                    created_at, updated_at, pushed_at, fetched_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
                ON CONFLICT (node_id) DO UPDATE
                    SET database_id = EXCLUDED.database_id,
                        owner_login = EXCLUDED.owner_login,
                        owner_type = EXCLUDED.owner_type,
                        name = EXCLUDED.name,
                        full_name = EXCLUDED.full_name,
                        description = EXCLUDED.description,
                        primary_language = EXCLUDED.primary_language,
                        stargazer_count = EXCLUDED.stargazer_count,
                        fork_count = EXCLUDED.fork_count,
                        open_issue_count = EXCLUDED.open_issue_count,
                        watcher_count = EXCLUDED.watcher_count,
                        is_private = EXCLUDED.is_private,
                        is_fork = EXCLUDED.is_fork,
                        is_archived = EXCLUDED.is_archived,
                        created_at = EXCLUDED.created_at,
                        updated_at = EXCLUDED.updated_at,
                        pushed_at = EXCLUDED.pushed_at,
                        fetched_at = EXCLUDED.fetched_at
                "#,
            )
            .bind(&repo.node_id)
            .bind(repo.database_id)
            .bind(&repo.owner_login)
            .bind(&repo.owner_type)
            .bind(&repo.name)
            .bind(&repo.full_name)
            .bind(&repo.description)
            .bind(&repo.primary_language)
            .bind(repo.stargazer_count)
            .bind(repo.fork_count)
            .bind(repo.open_issue_count)
            .bind(repo.watcher_count)
            .bind(repo.is_private)
            .bind(repo.is_fork)
            .bind(repo.is_archived)
            .bind(repo.created_at)
            .bind(repo.updated_at)
            .bind(repo.pushed_at)
            .bind(repo.fetched_at)
            .execute(&mut *tx)
            .await
            .map_err(DbError::Query)?;

            let snapshot: SnapshotRow = repo.into();
            sqlx::query(
                r#"
                INSERT INTO github_repository_snapshots (
                    repository_node_id, fetched_at, stargazer_count, fork_count,
                    open_issue_count, watcher_count
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (repository_node_id, fetched_at) DO NOTHING
                "#,
            )
            .bind(&snapshot.repository_node_id)
            .bind(snapshot.fetched_at)
            .bind(snapshot.stargazer_count)
            .bind(snapshot.fork_count)
            .bind(snapshot.open_issue_count)
            .bind(snapshot.watcher_count)
            .execute(&mut *tx)
            .await
            .map_err(DbError::Query)?;
        }

        tx.commit().await.map_err(DbError::Query)?;
        Ok(records.len())
    }

    async fn get_by_node_id(&self, node_id: &str) -> Result<Option<RepositoryRow>> {
        sqlx::query_as::<_, RepositoryRow>(
            r#"
            SELECT node_id, database_id, owner_login, owner_type, name, full_name,
                   description, primary_language, stargazer_count, fork_count,
                   open_issue_count, watcher_count, is_private, is_fork, is_archived,
                   created_at, updated_at, pushed_at, fetched_at
            FROM github_repositories
            WHERE node_id = $1
            "#,
        )
        .bind(node_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    async fn stream_ordered_by_stars(&self, limit: i64, offset: i64) -> Result<Vec<RepositoryRow>> {
        sqlx::query_as::<_, RepositoryRow>(
            r#"
            SELECT node_id, database_id, owner_login, owner_type, name, full_name,
                   description, primary_language, stargazer_count, fork_count,
                   open_issue_count, watcher_count, is_private, is_fork, is_archived,
                   created_at, updated_at, pushed_at, fetched_at
            FROM github_repositories
            ORDER BY stargazer_count DESC, node_id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    async fn count(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM github_repositories")
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::Query)
    }
}
