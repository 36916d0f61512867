use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Current-state row for `github_repositories`, one per repository.
///
/// Mirrors the normalized projection of a GraphQL repository node;
/// every mutable column is overwritten on conflict by the writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RepositoryRow {
    pub node_id: String,
    pub database_id: Option<i64>,
    pub owner_login: String,
    pub owner_type: String,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub primary_language: Option<String>,
    pub stargazer_count: i64,
    pub fork_count: i64,
    pub open_issue_count: i64,
    pub watcher_count: i64,
    pub is_private: bool,
    pub is_fork: bool,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

/// Append-only counter history row for `github_repository_snapshots`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SnapshotRow {
    pub repository_node_id: String,
    pub fetched_at: DateTime<Utc>,
    pub stargazer_count: i64,
    pub fork_count: i64,
    pub open_issue_count: i64,
    pub watcher_count: i64,
}

impl From<&RepositoryRow> for SnapshotRow {
    fn from(repo: &RepositoryRow) -> Self {
        Self {
            repository_node_id: repo.node_id.clone(),
            fetched_at: repo.fetched_at,
            stargazer_count: repo.stargazer_count,
            fork_count: repo.fork_count,
            open_issue_count: repo.open_issue_count,
            watcher_count: repo.watcher_count,
        }
    }
}
