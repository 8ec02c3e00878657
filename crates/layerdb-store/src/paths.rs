//! Storage root layout
//!
//! ```text
//! <models>/manifests/<host>/<namespace>/<model>/<tag>
//! <models>/blobs/sha256-<hex>
//! ```

use crate::digest::SHA256_PREFIX;
use layerdb_core::{LayerdbError, LayerdbResult, StorageConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

const HEX_LEN: usize = 64;

/// Resolves manifest and blob locations under one models directory
#[derive(Debug, Clone)]
pub struct StorePaths {
    models_path: PathBuf,
}

impl StorePaths {
    pub fn new(models_path: impl Into<PathBuf>) -> Self {
        Self {
            models_path: models_path.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.models_path.clone())
    }

    /// The models directory itself
    pub fn models_path(&self) -> &Path {
        &self.models_path
    }

    /// Root of the manifest tree, created if missing
    pub fn manifests_dir(&self) -> LayerdbResult<PathBuf> {
        let dir = self.models_path.join("manifests");
        ensure_dir(&dir)?;
        Ok(dir)
    }

    /// Directory holding layer blobs, created if missing
    pub fn blobs_dir(&self) -> LayerdbResult<PathBuf> {
        let dir = self.models_path.join("blobs");
        ensure_dir(&dir)?;
        Ok(dir)
    }

    /// File backing the blob with the given digest.
    ///
    /// Every spelling [`canonical_digest`] accepts maps to the same file.
    pub fn blob_path(&self, digest: &str) -> LayerdbResult<PathBuf> {
        let canonical = canonical_digest(digest)?;
        let hex = &canonical[SHA256_PREFIX.len()..];
        Ok(self.blobs_dir()?.join(format!("sha256-{}", hex)))
    }
}

/// The one spelling of a digest that identifies a blob: `sha256:` followed by
/// lowercase hex.
///
/// Accepts `sha256:<hex>` and the on-disk spelling `sha256-<hex>`, in either
/// hex case.
pub fn canonical_digest(digest: &str) -> LayerdbResult<String> {
    let hex = digest
        .strip_prefix("sha256:")
        .or_else(|| digest.strip_prefix("sha256-"))
        .filter(|hex| hex.len() == HEX_LEN && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .ok_or_else(|| LayerdbError::InvalidDigest(digest.to_string()))?;

    Ok(format!("{}{}", SHA256_PREFIX, hex.to_ascii_lowercase()))
}

fn ensure_dir(dir: &Path) -> LayerdbResult<()> {
    if !dir.is_dir() {
        create_dir_all(dir)?;
        debug!(path = %dir.display(), "Created store directory");
    }
    Ok(())
}

/// `mkdir -p` with mode 0o755 on Unix
pub(crate) fn create_dir_all(dir: &Path) -> std::io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(dir)
}
