use std::collections::HashSet;

use tokio::sync::Mutex;

/// Process-wide dedup index over `node_id`, cleared implicitly when
/// the crawl ends. Guarded for concurrent insert-if-absent.
#[derive(Default)]
pub struct SeenSet {
    inner: Mutex<HashSet<String>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `node_id` was newly inserted, `false` if it
    /// was already present.
    pub async fn insert_if_absent(&self, node_id: &str) -> bool {
        self.inner.lock().await.insert(node_id.to_string())
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_insert_of_same_id_is_rejected() {
        let seen = SeenSet::new();
        assert!(seen.insert_if_absent("a").await);
        assert!(!seen.insert_if_absent("a").await);
        assert!(seen.insert_if_absent("b").await);
        assert_eq!(seen.len().await, 2);
    }
}
