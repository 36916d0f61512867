/// Returns only the count of matches plus the rate-limit side channel;
/// used by the range planner to size candidate intervals.
pub const REPOSITORY_COUNT_QUERY: &str = r#"
query RepositoryCount($query: String!) {
  search(query: $query, type: REPOSITORY) {
    repositoryCount
  }
  rateLimit {
    cost
    remaining
    resetAt
  }
}
"#;

/// Paginated repository search used by crawl producers. Field set
/// mirrors the canonical `RepositoryRecord` projection.
pub const REPOSITORY_SEARCH_QUERY: &str = r#"
query RepositorySearch($query: String!, $first: Int!, $after: String) {
  search(query: $query, type: REPOSITORY, first: $first, after: $after) {
    repositoryCount
    pageInfo {
      hasNextPage
      endCursor
    }
    nodes {
      ... on Repository {
        id
        databaseId
        name
        nameWithOwner
        description
        stargazerCount
        forkCount
        isPrivate
        isFork
        isArchived
        createdAt
        updatedAt
        pushedAt
        owner {
          login
          __typename
        }
        watchers {
          totalCount
        }
        issues(states: OPEN) {
          totalCount
        }
        primaryLanguage {
          name
        }
      }
    }
  }
  rateLimit {
    cost
    remaining
    resetAt
  }
}
"#;
