use super::{validate_key, ObjectStore, StoreError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Bucket emulation on the local filesystem: each key is a file under `root`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |p, seg| p.join(seg)))
    }

    fn io_err(key: &str) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
        move |source| StoreError::Io {
            key: key.to_string(),
            source,
        }
    }

    /// Deepest directory that can hold keys starting with `prefix`.
    fn list_root(&self, prefix: &str) -> Result<PathBuf, StoreError> {
        let dir = match prefix.rfind('/') {
            Some(at) => &prefix[..at],
            None => return Ok(self.root.clone()),
        };
        if dir.split('/').any(|seg| seg == "." || seg == "..") {
            return Err(StoreError::InvalidKey {
                key: prefix.to_string(),
                reason: "relative path segment in prefix".to_string(),
            });
        }
        Ok(dir
            .split('/')
            .filter(|seg| !seg.is_empty())
            .fold(self.root.clone(), |p, seg| p.join(seg)))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;
        Some(parts.join("/"))
    }
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(".tmp-"))
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(Self::io_err(key)(e)),
        }
    }

    /// Writes to a hidden sibling and renames it into place so readers
    /// never observe a partially written object.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let parent = path.parent().unwrap_or(&self.root).to_path_buf();
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(Self::io_err(key))?;

        let tmp = parent.join(format!(".tmp-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(Self::io_err(key))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Self::io_err(key)(e));
        }

        debug!(key, bytes = bytes.len(), "Stored object");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err(key)(e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let start = self.list_root(prefix)?;
        match tokio::fs::metadata(&start).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(Vec::new()),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io_err(prefix)(e)),
        }

        let mut keys = Vec::new();
        let mut pending = vec![start];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(Self::io_err(prefix)(e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(Self::io_err(prefix))?
            {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(Self::io_err(prefix))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if !is_temp_file(&path) {
                    if let Some(key) = self.key_for(&path) {
                        if key.starts_with(prefix) {
                            keys.push(key);
                        }
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(Self::io_err(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_roundtrip_creates_directories() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path());

        store
            .put("mapping-runs/r1/SUCCEEDED/0.json", b"{}".to_vec())
            .await
            .unwrap();

        assert!(dir
            .path()
            .join("mapping-runs/r1/SUCCEEDED/0.json")
            .is_file());
        assert_eq!(
            store.get("mapping-runs/r1/SUCCEEDED/0.json").await.unwrap(),
            b"{}"
        );
    }

    #[tokio::test]
    async fn test_put_overwrites_and_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path());

        store.put("output/a.csv", b"one".to_vec()).await.unwrap();
        store.put("output/a.csv", b"two".to_vec()).await.unwrap();

        assert_eq!(store.get_string("output/a.csv").await.unwrap(), "two");
        let names: Vec<_> = std::fs::read_dir(dir.path().join("output"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path());

        let err = store.get("nope.json").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(!store.exists("nope.json").await.unwrap());
        store.delete("nope.json").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_filters_by_prefix_and_sorts() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path());

        for key in [
            "successful-mappings/SUCCEEDED_2.json",
            "successful-mappings/SUCCEEDED_10.json",
            "output/matched_factors.csv",
        ] {
            store.put(key, Vec::new()).await.unwrap();
        }

        let keys = store.list("successful-mappings/").await.unwrap();
        assert_eq!(
            keys,
            vec![
                "successful-mappings/SUCCEEDED_10.json",
                "successful-mappings/SUCCEEDED_2.json",
            ]
        );
        assert_eq!(store.list("").await.unwrap().len(), 3);
    }

    #[test]
    fn test_list_root_is_deepest_prefix_directory() {
        let store = LocalObjectStore::new("/bucket");

        assert_eq!(store.list_root("").unwrap(), PathBuf::from("/bucket"));
        assert_eq!(store.list_root("mapping").unwrap(), PathBuf::from("/bucket"));
        assert_eq!(
            store.list_root("successful-mappings/").unwrap(),
            PathBuf::from("/bucket/successful-mappings")
        );
        assert_eq!(
            store.list_root("mapping-runs/r1/SUCC").unwrap(),
            PathBuf::from("/bucket/mapping-runs/r1")
        );
        assert!(matches!(
            store.list_root("../outside/").unwrap_err(),
            StoreError::InvalidKey { .. }
        ));
    }

    #[tokio::test]
    async fn test_list_skips_directories_outside_prefix() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path());

        for key in [
            "mapping-runs/r1/SUCCEEDED/0.json",
            "mapping-runs/r1/FAILED/1.json",
            "mapping-runs/r2/SUCCEEDED/0.json",
            "successful-mappings/SUCCEEDED_0.json",
        ] {
            store.put(key, Vec::new()).await.unwrap();
        }
        std::fs::write(dir.path().join("mapping-runs").join("r3"), b"").unwrap();

        assert_eq!(
            store.list("mapping-runs/r1/SUCC").await.unwrap(),
            vec!["mapping-runs/r1/SUCCEEDED/0.json"]
        );
        assert_eq!(
            store.list("successful-mappings/").await.unwrap(),
            vec!["successful-mappings/SUCCEEDED_0.json"]
        );
        assert!(store.list("absent/dir/").await.unwrap().is_empty());
        assert!(store.list("mapping-runs/r3/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path());

        let err = store.put("../escape", Vec::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey { .. }));
    }

    #[tokio::test]
    async fn test_list_on_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path().join("absent"));
        assert!(store.list("").await.unwrap().is_empty());
    }
}
