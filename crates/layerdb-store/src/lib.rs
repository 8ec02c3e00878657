//! layerdb-store: Model package storage
//!
//! This crate provides the on-disk store for model packages:
//! - Manifest parsing, writing and removal
//! - Content digests computed while reading
//! - Layer blobs with reference-checked deletion
//! - Registry scans with strict or best-effort failure handling

pub mod digest;
pub mod layer;
pub mod manifest;
pub mod paths;
pub mod prune;
pub mod scan;

pub use digest::DigestReader;
pub use layer::{BlobStore, Layer, LayerCheck, LayerStatus};
pub use manifest::{LayerReference, Manifest, ManifestStore};
pub use paths::{canonical_digest, StorePaths};
pub use prune::prune_empty_dirs;
pub use scan::ScanPolicy;
