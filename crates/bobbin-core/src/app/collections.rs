//! Scored sets and string hashes, one document per key.

use std::collections::{HashMap, HashSet};

use crate::adapter::{Documents, RetryPolicy};
use crate::domain::errors::require_non_empty;
use crate::domain::{HashRecord, Result, SetMember, SetRecord, StorageError};

#[derive(Clone)]
pub struct CollectionStore {
    docs: Documents,
    retry: RetryPolicy,
}

impl CollectionStore {
    pub fn new(docs: Documents, retry: RetryPolicy) -> Self {
        Self { docs, retry }
    }

    /// Distinct member values; empty when the set does not exist.
    pub async fn get_all_items_from_set(&self, key: &str) -> Result<HashSet<String>> {
        require_non_empty(key, "key")?;
        let set = self.docs.get::<SetRecord>(key).await?;
        Ok(set.map(|set| set.doc.values()).unwrap_or_default())
    }

    /// Value with the lowest score in `[from_score, to_score]`.
    pub async fn get_first_by_lowest_score_from_set(
        &self,
        key: &str,
        from_score: f64,
        to_score: f64,
    ) -> Result<Option<String>> {
        require_non_empty(key, "key")?;
        if from_score.is_nan() || to_score.is_nan() {
            return Err(StorageError::invalid_argument("scores must be numbers"));
        }
        if from_score > to_score {
            return Err(StorageError::invalid_argument(format!(
                "from_score {from_score} is greater than to_score {to_score}"
            )));
        }

        let Some(set) = self.docs.get::<SetRecord>(key).await? else {
            return Ok(None);
        };
        Ok(set
            .doc
            .first_by_lowest_score(from_score, to_score)
            .map(str::to_string))
    }

    /// Add `value` to the set, or move it to `score` if already present.
    pub async fn add_to_set(&self, key: &str, value: &str, score: f64) -> Result<()> {
        require_non_empty(key, "key")?;
        if score.is_nan() {
            return Err(StorageError::invalid_argument("score must be a number"));
        }

        self.docs
            .upsert_with::<SetRecord, _, _>(
                key,
                &self.retry,
                || SetRecord::new(key, Vec::new()),
                |set| match set.members.iter_mut().find(|m| m.value == value) {
                    Some(member) => member.score = score,
                    None => set.members.push(SetMember::new(value, score)),
                },
            )
            .await?;
        Ok(())
    }

    /// Merge `pairs` into the hash, creating it when absent.
    pub async fn set_range_in_hash<I, K, V>(&self, key: &str, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        require_non_empty(key, "key")?;
        let pairs: Vec<(String, String)> =
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        if pairs.iter().any(|(name, _)| name.is_empty()) {
            return Err(StorageError::invalid_argument("hash field names must not be empty"));
        }

        self.docs
            .upsert_with::<HashRecord, _, _>(
                key,
                &self.retry,
                || HashRecord::new(key),
                |hash| hash.merge(pairs.iter().cloned()),
            )
            .await?;
        Ok(())
    }

    /// `None` when the hash does not exist.
    pub async fn get_all_entries_from_hash(
        &self,
        key: &str,
    ) -> Result<Option<HashMap<String, String>>> {
        require_non_empty(key, "key")?;
        Ok(self.docs.get::<HashRecord>(key).await?.map(|hash| hash.doc.fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryDocumentStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn collections() -> CollectionStore {
        let store = Arc::new(InMemoryDocumentStore::new());
        let docs = Documents::new(store, 1000, Duration::from_secs(60));
        CollectionStore::new(docs, RetryPolicy::conflicts())
    }

    #[tokio::test]
    async fn absent_set_reads_as_empty() {
        let collections = collections();

        assert!(collections.get_all_items_from_set("missing").await.unwrap().is_empty());
        assert_eq!(
            collections.get_first_by_lowest_score_from_set("missing", 0.0, 1.0).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn add_to_set_moves_existing_member() {
        let collections = collections();
        collections.add_to_set("schedule", "job-1", 30.0).await.unwrap();
        collections.add_to_set("schedule", "job-2", 20.0).await.unwrap();
        collections.add_to_set("schedule", "job-1", 10.0).await.unwrap();

        let items = collections.get_all_items_from_set("schedule").await.unwrap();
        let first = collections
            .get_first_by_lowest_score_from_set("schedule", 0.0, 100.0)
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(first.as_deref(), Some("job-1"));
    }

    #[tokio::test]
    async fn inverted_range_is_rejected() {
        let collections = collections();

        let result = collections.get_first_by_lowest_score_from_set("key", 5.0, 1.0).await;

        assert!(matches!(result, Err(StorageError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn absent_hash_is_none() {
        let collections = collections();

        assert_eq!(collections.get_all_entries_from_hash("missing").await.unwrap(), None);
    }
}
