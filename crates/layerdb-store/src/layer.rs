//! Content-addressed layer blobs

use crate::digest::DigestReader;
use crate::paths::{canonical_digest, StorePaths};
use layerdb_core::LayerdbResult;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, Write};
use tracing::{debug, info};

/// Reference to one blob, as it appears in a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Layer {
    pub media_type: String,
    /// `sha256:<hex>`; empty when the layer has no blob behind it
    pub digest: String,
    pub size: i64,
}

impl Layer {
    pub fn new(media_type: impl Into<String>, digest: impl Into<String>, size: i64) -> Self {
        Self {
            media_type: media_type.into(),
            digest: digest.into(),
            size,
        }
    }

    /// Whether the layer refers to a physical blob
    pub fn has_blob(&self) -> bool {
        !self.digest.is_empty()
    }
}

/// Outcome of re-hashing one layer's blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LayerStatus {
    /// Blob bytes hash to the recorded digest
    Ok,
    /// The layer has no digest, so there is nothing to check
    Empty,
    /// No blob file for the digest
    Missing,
    /// Blob exists but hashes to something else
    Mismatch { actual: String },
}

/// Verification result for one layer
#[derive(Debug, Clone, Serialize)]
pub struct LayerCheck {
    pub layer: Layer,
    /// Bytes actually on disk, when the blob exists
    pub blob_size: Option<u64>,
    #[serde(flatten)]
    pub status: LayerStatus,
}

/// The blob directory of a store
#[derive(Debug, Clone)]
pub struct BlobStore {
    paths: StorePaths,
}

impl BlobStore {
    pub fn new(paths: StorePaths) -> Self {
        Self { paths }
    }

    /// Whether a blob for this digest is on disk
    pub fn exists(&self, digest: &str) -> LayerdbResult<bool> {
        Ok(self.paths.blob_path(digest)?.is_file())
    }

    /// Store `bytes` as a blob and return the layer describing it.
    ///
    /// Blobs are immutable, so an existing blob with the same digest is left
    /// untouched.
    pub fn write_blob(&self, media_type: &str, bytes: &[u8]) -> LayerdbResult<Layer> {
        let digest = crate::digest::sha256_digest(bytes);
        let path = self.paths.blob_path(&digest)?;

        if !path.is_file() {
            let dir = self.paths.blobs_dir()?;
            let mut tmp = tempfile::Builder::new().prefix(".blob-").tempfile_in(&dir)?;
            tmp.write_all(bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            debug!(digest = %digest, size = bytes.len(), "Wrote blob");
        }

        Ok(Layer::new(media_type, digest, bytes.len() as i64))
    }

    /// Delete the blob behind a digest.
    ///
    /// Returns `Ok(false)` when the blob was already gone, so repeated cleanup
    /// is safe to re-run.
    pub fn remove(&self, digest: &str) -> LayerdbResult<bool> {
        let path = self.paths.blob_path(digest)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(digest = digest, "Removed blob");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(digest = digest, "layer does not exist");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Re-hash the blob behind a layer and compare it with the recorded digest
    pub fn verify(&self, layer: &Layer) -> LayerdbResult<LayerCheck> {
        if !layer.has_blob() {
            return Ok(LayerCheck {
                layer: layer.clone(),
                blob_size: None,
                status: LayerStatus::Empty,
            });
        }

        let path = self.paths.blob_path(&layer.digest)?;
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(LayerCheck {
                    layer: layer.clone(),
                    blob_size: None,
                    status: LayerStatus::Missing,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut reader = DigestReader::new(BufReader::new(file));
        let blob_size = reader.drain()?;
        let actual = reader.finalize();

        let status = if actual == canonical_digest(&layer.digest)? {
            LayerStatus::Ok
        } else {
            LayerStatus::Mismatch { actual }
        };

        Ok(LayerCheck {
            layer: layer.clone(),
            blob_size: Some(blob_size),
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layerdb_core::LayerdbError;

    fn store() -> (tempfile::TempDir, BlobStore) {
        let tmp = tempfile::tempdir().unwrap();
        let blobs = BlobStore::new(StorePaths::new(tmp.path()));
        (tmp, blobs)
    }

    #[test]
    fn test_layer_json_shape() {
        let layer = Layer::new("application/vnd.ollama.image.model", "sha256:ab", 42);
        let json = serde_json::to_value(&layer).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "mediaType": "application/vnd.ollama.image.model",
                "digest": "sha256:ab",
                "size": 42
            })
        );
    }

    #[test]
    fn test_write_blob_is_content_addressed() {
        let (_tmp, blobs) = store();
        let a = blobs.write_blob("text/plain", b"hello").unwrap();
        let b = blobs.write_blob("text/plain", b"hello").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.size, 5);
        assert!(blobs.exists(&a.digest).unwrap());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (_tmp, blobs) = store();
        let layer = blobs.write_blob("text/plain", b"weights").unwrap();

        assert!(blobs.remove(&layer.digest).unwrap());
        assert!(!blobs.exists(&layer.digest).unwrap());
        assert!(!blobs.remove(&layer.digest).unwrap());
    }

    #[test]
    fn test_remove_rejects_bad_digest() {
        let (_tmp, blobs) = store();
        assert!(matches!(
            blobs.remove("sha256:nope"),
            Err(LayerdbError::InvalidDigest(_))
        ));
    }

    #[test]
    fn test_verify() {
        let (tmp, blobs) = store();
        let good = blobs.write_blob("text/plain", b"good bytes").unwrap();
        assert_eq!(blobs.verify(&good).unwrap().status, LayerStatus::Ok);

        let tampered = blobs.write_blob("text/plain", b"original").unwrap();
        let path = StorePaths::new(tmp.path()).blob_path(&tampered.digest).unwrap();
        std::fs::write(&path, b"tampered").unwrap();
        let check = blobs.verify(&tampered).unwrap();
        assert!(matches!(check.status, LayerStatus::Mismatch { .. }));
        assert_eq!(check.blob_size, Some(8));

        blobs.remove(&good.digest).unwrap();
        assert_eq!(blobs.verify(&good).unwrap().status, LayerStatus::Missing);

        let empty = Layer::default();
        assert_eq!(blobs.verify(&empty).unwrap().status, LayerStatus::Empty);
    }
}
