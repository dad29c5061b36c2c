use super::{validate_key, ObjectStore, StoreError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// In-memory bucket for tests.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), bytes.into());
        self
    }

    pub fn len(&self) -> usize {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored object.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        validate_key(key)?;
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        validate_key(key)?;
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        Ok(self
            .objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_basic_operations() {
        let store = MemoryObjectStore::new().with_object("input/activities.csv", "a,b\n");

        assert!(store.exists("input/activities.csv").await.unwrap());
        assert_eq!(
            store.get_string("input/activities.csv").await.unwrap(),
            "a,b\n"
        );

        store
            .copy("input/activities.csv", "backup/activities.csv")
            .await
            .unwrap();
        assert_eq!(store.list("backup/").await.unwrap().len(), 1);

        store.delete("input/activities.csv").await.unwrap();
        assert!(matches!(
            store.get("input/activities.csv").await,
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(store.len(), 1);
    }
}
