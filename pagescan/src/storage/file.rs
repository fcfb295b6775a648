//! Record store backed by a directory of JSON files.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::RecordStore;
use crate::errors::StoreError;

/// Writes each key to `<dir>/<key>.json`.
///
/// Values are written to a temporary sibling first and renamed into place,
/// so a reader sees either the previous record or the new one.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `dir`. The directory is created on the
    /// first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file a key is written to.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn store(&self, key: &str, serialized: &str) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let target = self.path_for(key);
        let staging = target.with_extension("json.tmp");
        tokio::fs::write(&staging, serialized).await?;
        tokio::fs::rename(&staging, &target).await?;

        debug!(path = %target.display(), bytes = serialized.len(), "Stored record");
        Ok(())
    }
}
