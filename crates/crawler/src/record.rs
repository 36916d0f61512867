use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use db::RepositoryRow;
use serde_json::Value;

/// Canonical projection of a GraphQL repository node. The
/// crawl engine builds one of these per search result; the writer
/// converts it to a `db::RepositoryRow` for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryRecord {
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

impl RepositoryRecord {
    /// Parses one `search.nodes[]` entry from `REPOSITORY_SEARCH_QUERY`
    /// into the canonical record, stamping `fetched_at`.
    pub fn from_node(node: &Value, fetched_at: DateTime<Utc>) -> Result<Self> {
        let node_id = field_str(node, "id")?;
        let owner = node.get("owner").context("node missing owner")?;

        Ok(Self {
            node_id,
            database_id: node.get("databaseId").and_then(Value::as_i64),
            owner_login: field_str(owner, "login")?,
            owner_type: owner
                .get("__typename")
                .and_then(Value::as_str)
                .unwrap_or("User")
                .to_string(),
            name: field_str(node, "name")?,
            full_name: field_str(node, "nameWithOwner")?,
            description: node.get("description").and_then(Value::as_str).map(str::to_owned),
            primary_language: node
                .get("primaryLanguage")
                .and_then(|lang| lang.get("name"))
                .and_then(Value::as_str)
                .map(str::to_owned),
            stargazer_count: field_i64(node, "stargazerCount").unwrap_or(0),
            fork_count: field_i64(node, "forkCount").unwrap_or(0),
            open_issue_count: node
                .get("issues")
                .and_then(|issues| issues.get("totalCount"))
                .and_then(Value::as_i64)
                .unwrap_or(0),
            watcher_count: node
                .get("watchers")
                .and_then(|watchers| watchers.get("totalCount"))
                .and_then(Value::as_i64)
                .unwrap_or(0),
            is_private: node.get("isPrivate").and_then(Value::as_bool).unwrap_or(false),
            is_fork: node.get("isFork").and_then(Value::as_bool).unwrap_or(false),
            is_archived: node.get("isArchived").and_then(Value::as_bool).unwrap_or(false),
            created_at: field_datetime(node, "createdAt")?,
            updated_at: field_datetime(node, "updatedAt")?,
            pushed_at: node
                .get("pushedAt")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            fetched_at,
        })
    }
}

impl From<RepositoryRecord> for RepositoryRow {
    fn from(record: RepositoryRecord) -> Self {
        RepositoryRow {
            node_id: record.node_id,
            database_id: record.database_id,
            owner_login: record.owner_login,
            owner_type: record.owner_type,
            name: record.name,
            full_name: record.full_name,
            description: record.description,
            primary_language: record.primary_language,
            stargazer_count: record.stargazer_count,
            fork_count: record.fork_count,
            open_issue_count: record.open_issue_count,
            watcher_count: record.watcher_count,
            is_private: record.is_private,
            is_fork: record.is_fork,
            is_archived: record.is_archived,
            created_at: record.created_at,
            updated_at: record.updated_at,
            pushed_at: record.pushed_at,
            fetched_at: record.fetched_at,
        }
    }
}

fn field_str(value: &Value, key: &str) -> Result<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| anyhow!("node missing required field '{key}'"))
}

fn field_i64(value: &Value, key: &str) -> Option<i64> {
    value.get(key).and_then(Value::as_i64)
}

fn field_datetime(value: &Value, key: &str) -> Result<DateTime<Utc>> {
    let raw = field_str(value, key)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid timestamp in field '{key}': {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_node() -> Value {
        json!({
            "id": "R_1",
            "databaseId": 1,
            "name": "example",
            "nameWithOwner": "owner/example",
            "description": "a repo",
            "stargazerCount": 10,
            "forkCount": 2,
            "isPrivate": false,
            "isFork": false,
            "isArchived": false,
            "createdAt": "2020-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z",
            "pushedAt": "2024-01-01T00:00:00Z",
            "owner": {"login": "owner", "__typename": "User"},
            "watchers": {"totalCount": 3},
            "issues": {"totalCount": 1},
            "primaryLanguage": {"name": "Rust"}
        })
    }

    #[test]
    fn parses_node_into_record() {
        let record = RepositoryRecord::from_node(&sample_node(), Utc::now()).unwrap();
        assert_eq!(record.node_id, "R_1");
        assert_eq!(record.owner_login, "owner");
        assert_eq!(record.full_name, "owner/example");
        assert_eq!(record.primary_language.as_deref(), Some("Rust"));
        assert_eq!(record.watcher_count, 3);
        assert_eq!(record.open_issue_count, 1);
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let mut node = sample_node();
        node.as_object_mut().unwrap().remove("nameWithOwner");
        assert!(RepositoryRecord::from_node(&node, Utc::now()).is_err());
    }

    #[test]
    fn converts_into_db_row() {
        let record = RepositoryRecord::from_node(&sample_node(), Utc::now()).unwrap();
        let row: RepositoryRow = record.clone().into();
        assert_eq!(row.node_id, record.node_id);
        assert_eq!(row.stargazer_count, record.stargazer_count);
    }
}
