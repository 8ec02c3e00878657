//! Manifests: the named description of one model package
//!
//! A manifest is a small JSON document naming a config layer and an ordered
//! list of content layers. Each stored manifest lives at the path its
//! [`ModelName`] resolves to under the manifests root. The digest of a parsed
//! manifest is the SHA-256 of the exact file bytes, not of the decoded value.

use crate::digest::DigestReader;
use crate::layer::{BlobStore, Layer, LayerCheck};
use crate::paths::{canonical_digest, create_dir_all, StorePaths};
use crate::prune::prune_empty_dirs;
use crate::scan::ScanPolicy;
use layerdb_core::{LayerdbError, LayerdbResult, ModelName, StorageConfig};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// Schema version written into every new manifest
pub const SCHEMA_VERSION: i64 = 2;
/// Media type written into every new manifest
pub const MANIFEST_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// A parsed or freshly built manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub schema_version: i64,
    #[serde(default)]
    pub media_type: String,
    pub config: Layer,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub layers: Vec<Layer>,

    #[serde(skip)]
    path: PathBuf,
    #[serde(skip)]
    modified: Option<SystemTime>,
    #[serde(skip)]
    file_len: u64,
    #[serde(skip)]
    digest: String,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Layer>, D::Error> {
    Ok(Option::<Vec<Layer>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Manifest {
    /// A manifest in the current format; not yet bound to a file
    pub fn new(config: Layer, layers: Vec<Layer>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            media_type: MANIFEST_MEDIA_TYPE.to_string(),
            config,
            layers,
            ..Default::default()
        }
    }

    /// File the manifest was read from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `sha256:<hex>` of the file bytes at read time
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Modification time of the file at read time
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    /// Length of the file at read time
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Content layers followed by the config layer
    pub fn all_layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().chain(std::iter::once(&self.config))
    }

    /// Total declared size of the config and content layers.
    ///
    /// Sizes come from the file as written, so the sum saturates at
    /// `i64::MAX` instead of overflowing.
    pub fn size(&self) -> i64 {
        let size = self
            .all_layers()
            .fold(0i64, |total, layer| total.saturating_add(layer.size));
        debug!(path = %self.path.display(), size = size, "Calculated manifest size");
        size
    }
}

/// How one of a manifest's blobs is shared with the rest of the store
#[derive(Debug, Clone, Serialize)]
pub struct LayerReference {
    pub digest: String,
    pub size: i64,
    /// Whether the blob is currently on disk
    pub exists: bool,
    /// Other manifests that reference the same digest
    pub shared_with: Vec<ModelName>,
}

impl LayerReference {
    /// Whether removing the owning manifest's layers would delete this blob
    pub fn would_delete(&self) -> bool {
        self.exists && self.shared_with.is_empty()
    }
}

/// Manifest storage rooted at one models directory
#[derive(Debug, Clone)]
pub struct ManifestStore {
    paths: StorePaths,
    blobs: BlobStore,
}

impl ManifestStore {
    pub fn new(paths: StorePaths) -> Self {
        let blobs = BlobStore::new(paths.clone());
        Self { paths, blobs }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(StorePaths::from_config(config))
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Read the manifest stored for `name`.
    ///
    /// A missing file is reported as [`LayerdbError::ManifestNotFound`], a
    /// malformed one as [`LayerdbError::Decode`].
    pub fn parse(&self, name: &ModelName) -> LayerdbResult<Manifest> {
        debug!(name = %name, "Parsing manifest");
        if !name.is_fully_qualified() {
            return Err(LayerdbError::Unqualified(name.to_string()));
        }

        let path = self.paths.manifests_dir()?.join(name.filepath());

        let file = File::open(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                LayerdbError::ManifestNotFound {
                    name: name.to_string(),
                    source: e,
                }
            } else {
                LayerdbError::Io(e)
            }
        })?;
        let metadata = file.metadata()?;

        // Decode one document; anything after it is hashed but not parsed
        let mut reader = BufReader::new(DigestReader::new(file));
        let mut manifest = {
            let mut de = serde_json::Deserializer::from_reader(&mut reader);
            Manifest::deserialize(&mut de)
        }
        .map_err(|e| {
            if e.is_io() {
                LayerdbError::Io(e.into())
            } else {
                LayerdbError::Decode {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;

        // Hash whatever the decoder left unread so the digest covers the file
        let mut tee = reader.into_inner();
        tee.drain()?;

        manifest.path = path;
        manifest.modified = metadata.modified().ok();
        manifest.file_len = tee.bytes_read();
        manifest.digest = tee.finalize();
        debug!(name = %name, digest = %manifest.digest, "Parsed manifest");

        Ok(manifest)
    }

    /// Write a fresh manifest for `name`, replacing any existing one.
    ///
    /// The document is written to a temporary file next to the target and
    /// renamed into place, so readers see either the old or the new manifest.
    pub fn write(&self, name: &ModelName, config: Layer, layers: Vec<Layer>) -> LayerdbResult<()> {
        if !name.is_fully_qualified() {
            return Err(LayerdbError::Unqualified(name.to_string()));
        }
        if !name.is_valid() {
            return Err(LayerdbError::InvalidName(name.to_string()));
        }

        let dir = self
            .paths
            .manifests_dir()?
            .join(&name.host)
            .join(&name.namespace)
            .join(&name.model);
        let path = dir.join(&name.tag);
        create_dir_all(&dir)?;

        let manifest = Manifest::new(config, layers);

        let mut tmp = tempfile::Builder::new()
            .prefix(".manifest-")
            .tempfile_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, &manifest)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o644))?;
        }

        tmp.persist(&path).map_err(|e| e.error)?;
        info!(name = %name, path = %path.display(), "Wrote manifest");

        Ok(())
    }

    /// Store the manifest of `src` under `dst` as well, sharing its blobs.
    pub fn copy(&self, src: &ModelName, dst: &ModelName) -> LayerdbResult<Manifest> {
        let manifest = self.parse(src)?;
        self.write(dst, manifest.config, manifest.layers)?;
        self.parse(dst)
    }

    /// Delete the manifest file and prune directories it leaves empty.
    pub fn remove(&self, manifest: &Manifest) -> LayerdbResult<()> {
        std::fs::remove_file(&manifest.path)?;
        info!(path = %manifest.path.display(), "Removed manifest");

        prune_empty_dirs(&self.paths.manifests_dir()?)?;
        Ok(())
    }

    /// Delete the blobs of every layer of `manifest` that no other stored
    /// manifest references.
    ///
    /// Blobs that are already gone count as removed, so cleanup can be re-run
    /// after a partial failure. Any other error stops the iteration.
    pub fn remove_layers(&self, manifest: &Manifest) -> LayerdbResult<()> {
        let referenced = self.referenced_elsewhere(manifest)?;

        for layer in manifest.all_layers() {
            if !layer.has_blob() {
                continue;
            }
            if let Some(owners) = referenced.get(&canonical_digest(&layer.digest)?) {
                info!(
                    digest = %layer.digest,
                    owners = owners.len(),
                    "Keeping layer still referenced by other manifests"
                );
                continue;
            }
            self.blobs.remove(&layer.digest)?;
        }

        debug!(path = %manifest.path.display(), "Removed manifest layers");
        Ok(())
    }

    /// Report, without deleting anything, which of `manifest`'s blobs are
    /// shared with other manifests.
    pub fn layer_references(&self, manifest: &Manifest) -> LayerdbResult<Vec<LayerReference>> {
        let mut referenced = self.referenced_elsewhere(manifest)?;
        let mut seen = HashSet::new();
        let mut references = Vec::new();

        for layer in manifest.all_layers() {
            if !layer.has_blob() {
                continue;
            }
            let digest = canonical_digest(&layer.digest)?;
            if !seen.insert(digest.clone()) {
                continue;
            }
            references.push(LayerReference {
                exists: self.blobs.exists(&digest)?,
                shared_with: referenced.remove(&digest).unwrap_or_default(),
                digest,
                size: layer.size,
            });
        }

        Ok(references)
    }

    /// Re-hash every blob the manifest references.
    pub fn verify(&self, manifest: &Manifest) -> LayerdbResult<Vec<LayerCheck>> {
        std::iter::once(&manifest.config)
            .chain(manifest.layers.iter())
            .map(|layer| self.blobs.verify(layer))
            .collect()
    }

    /// Canonical digests referenced by stored manifests other than
    /// `manifest`, with their owners. Corrupt manifests and malformed digests
    /// are skipped so they cannot block cleanup.
    fn referenced_elsewhere(
        &self,
        manifest: &Manifest,
    ) -> LayerdbResult<BTreeMap<String, Vec<ModelName>>> {
        let mut referenced: BTreeMap<String, Vec<ModelName>> = BTreeMap::new();

        for (name, other) in self.list_all(ScanPolicy::BestEffort)? {
            if other.path == manifest.path {
                continue;
            }
            for layer in other.all_layers().filter(|layer| layer.has_blob()) {
                let Ok(digest) = canonical_digest(&layer.digest) else {
                    debug!(name = %name, digest = %layer.digest, "Skipping malformed digest");
                    continue;
                };
                let owners = referenced.entry(digest).or_default();
                if !owners.contains(&name) {
                    owners.push(name.clone());
                }
            }
        }

        Ok(referenced)
    }
}
