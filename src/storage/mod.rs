//! Object storage abstraction
//!
//! Keys are `/`-separated, bucket-relative paths such as
//! `mapping-runs/<run_id>/manifest.json`. The mapper, reconciler and merge
//! job only touch storage through [`ObjectStore`], so tests run against
//! [`MemoryObjectStore`] and deployments against [`LocalObjectStore`].

mod local;
mod memory;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Object not found: {key}")]
    NotFound { key: String },

    #[error("Invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Writes the object, replacing any previous content under `key`.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// All keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn copy(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let bytes = self.get(from).await?;
        self.put(to, bytes).await
    }

    async fn get_string(&self, key: &str) -> Result<String, StoreError> {
        let bytes = self.get(key).await?;
        String::from_utf8(bytes).map_err(|e| StoreError::Io {
            key: key.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })
    }
}

/// Rejects keys that could escape the bucket root or address a directory.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let invalid = |reason: &str| StoreError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(invalid("empty key"));
    }
    if key.starts_with('/') || key.ends_with('/') {
        return Err(invalid("leading or trailing '/'"));
    }
    if key.contains('\\') {
        return Err(invalid("backslash separator"));
    }
    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(invalid("empty or relative path segment"));
    }
    Ok(())
}

/// Joins key segments with `/`.
pub fn join_key(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        nested = { "mapping-runs/abc/manifest.json", true },
        flat = { "manifest.json", true },
        empty = { "", false },
        absolute = { "/etc/passwd", false },
        parent = { "output/../secret", false },
        dot = { "./input.csv", false },
        double_slash = { "output//x.csv", false },
        trailing = { "output/", false },
    )]
    fn validates_keys(key: &str, ok: bool) {
        assert_eq!(validate_key(key).is_ok(), ok);
    }

    #[test]
    fn join_key_trims_separators() {
        assert_eq!(
            join_key(&["mapping-runs/", "/run-1", "SUCCEEDED", "3.json"]),
            "mapping-runs/run-1/SUCCEEDED/3.json"
        );
    }
}
