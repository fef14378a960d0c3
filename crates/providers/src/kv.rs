//! Key-value store backends.
//!
//! `FileKvStore` keeps one file per key under a root directory, writing
//! through a temp file and a rename so readers never see a torn value.
//! Failures are logged and swallowed: persistence is best-effort by
//! contract. `MemoryKvStore` backs tests and ephemeral sessions.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use causerie_core::store::KvStore;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// One file per key under a root directory.
pub struct FileKvStore {
    root: PathBuf,
}

impl FileKvStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// `~/.causerie/store`, or a path relative to the working directory
    /// when no home directory is known.
    pub fn default_root() -> PathBuf {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".causerie")
            .join("store")
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_key(key)))
    }
}

/// Keys become file names; anything outside `[A-Za-z0-9_-]` is mapped
/// to `_` so a hostile key cannot escape the root.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl KvStore for FileKvStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> Option<String> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Some(value),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(key, error = %e, "kv read failed");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) {
        if let Err(e) = tokio::fs::create_dir_all(&self.root).await {
            warn!(key, error = %e, "kv root creation failed");
            return;
        }

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        if let Err(e) = tokio::fs::write(&tmp, value).await {
            warn!(key, error = %e, "kv write failed");
            return;
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            warn!(key, error = %e, "kv rename failed");
            let _ = tokio::fs::remove_file(&tmp).await;
            return;
        }
        debug!(key, bytes = value.len(), "kv value persisted");
    }

    async fn remove(&self, key: &str) {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(key, error = %e, "kv remove failed"),
        }
    }
}

/// In-process store for tests and `--ephemeral` sessions.
#[derive(Default)]
pub struct MemoryKvStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.values.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
    }

    async fn remove(&self, key: &str) {
        self.values.write().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_roundtrips_a_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::new(dir.path().to_path_buf());

        store.set("history", r#"[{"role":"user"}]"#).await;
        assert_eq!(
            store.get("history").await.as_deref(),
            Some(r#"[{"role":"user"}]"#)
        );

        store.remove("history").await;
        assert!(store.get("history").await.is_none());
    }

    #[tokio::test]
    async fn file_store_overwrites_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::new(dir.path().to_path_buf());

        store.set("clé", "ancien").await;
        store.set("clé", "nouveau").await;
        assert_eq!(store.get("clé").await.as_deref(), Some("nouveau"));

        // No temp file left behind.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn hostile_keys_stay_inside_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::new(dir.path().to_path_buf());

        store.set("../../etc/passwd", "non").await;
        assert_eq!(store.get("../../etc/passwd").await.as_deref(), Some("non"));
        // The value landed inside the root, under a sanitized name.
        assert!(dir.path().join("______etc_passwd.json").exists());
    }

    #[tokio::test]
    async fn missing_key_is_none_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::new(dir.path().to_path_buf());
        assert!(store.get("jamais-écrit").await.is_none());
        // Removing an absent key is a quiet no-op.
        store.remove("jamais-écrit").await;
    }

    #[tokio::test]
    async fn memory_store_roundtrips() {
        let store = MemoryKvStore::new();
        store.set("a", "1").await;
        assert_eq!(store.get("a").await.as_deref(), Some("1"));
        store.remove("a").await;
        assert!(store.get("a").await.is_none());
    }
}
