//! Write-temp-then-rename persistence for every locally-owned JSON document
//! (UDI snapshots, dead-stream map, regex config, changelog, progress file).

use crate::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

/// Serialize `value` as pretty JSON and atomically replace `path`.
///
/// Writes to a sibling `<path>.tmp` first, then renames over `path` so a
/// reader never observes a partially-written file.
pub async fn write_json_atomic<T: Serialize + Sync>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let body = serde_json::to_vec_pretty(value)?;
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, &body).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// Read and deserialize `path`, returning `None` if it does not exist.
///
/// A corrupt file is logged and treated as absent (caller falls back to
/// defaults) rather than failing startup, per the error-handling design.
pub async fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match tokio::fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(?path, %err, "corrupt JSON config, using defaults");
                T::default()
            }
        },
        Err(_) => T::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Doc {
        value: u32,
    }

    #[tokio::test]
    async fn round_trips_through_atomic_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.json");
        let doc = Doc { value: 7 };

        write_json_atomic(&path, &doc).await.unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let loaded: Doc = read_json_or_default(&path).await;
        assert_eq!(loaded, doc);
    }

    #[tokio::test]
    async fn missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let loaded: Doc = read_json_or_default(&path).await;
        assert_eq!(loaded, Doc::default());
    }

    #[tokio::test]
    async fn corrupt_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.json");
        tokio::fs::write(&path, b"not json").await.unwrap();
        let loaded: Doc = read_json_or_default(&path).await;
        assert_eq!(loaded, Doc::default());
    }
}
