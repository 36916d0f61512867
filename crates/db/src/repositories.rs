use async_trait::async_trait;

use crate::errors::Result;
use crate::models::RepositoryRow;

/// Sole mutator of repository state: each batch is upserted
/// into the current-state table and mirrored into the snapshot table
/// inside one transaction.
#[async_trait]
pub trait RepoRepository: Send + Sync {
    async fn write_batch(&self, records: &[RepositoryRow]) -> Result<usize>;

    async fn get_by_node_id(&self, node_id: &str) -> Result<Option<RepositoryRow>>;

    /// Supplemental read path: page through stored repositories ordered
    /// by stargazer count, for downstream consumers that need a ranked
    /// export without re-crawling.
    async fn stream_ordered_by_stars(&self, limit: i64, offset: i64) -> Result<Vec<RepositoryRow>>;

    async fn count(&self) -> Result<i64>;
}

pub trait Repositories: Send + Sync {
    fn repos(&self) -> &dyn RepoRepository;
}
