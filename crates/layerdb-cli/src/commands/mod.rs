//! CLI commands implementation

use anyhow::Result;
use chrono::{DateTime, Utc};
use layerdb_core::ModelName;
use layerdb_store::{LayerStatus, Manifest, ManifestStore, ScanPolicy};

/// List stored models
pub fn list(store: &ManifestStore, strict: bool) -> Result<()> {
    let policy = if strict {
        ScanPolicy::Strict
    } else {
        ScanPolicy::BestEffort
    };
    let manifests = store.list_all(policy)?;

    if manifests.is_empty() {
        println!("No models found");
        return Ok(());
    }

    println!(
        "{:<50} {:<14} {:>10} {:<20}",
        "NAME", "ID", "SIZE", "MODIFIED"
    );
    println!("{}", "-".repeat(97));
    for (name, manifest) in &manifests {
        println!(
            "{:<50} {:<14} {:>10} {:<20}",
            name.to_string(),
            short_digest(manifest.digest()),
            format_size(manifest.size()),
            format_modified(manifest),
        );
    }

    Ok(())
}

/// Show a model's manifest
pub fn show(store: &ManifestStore, model: &str) -> Result<()> {
    let name = ModelName::parse_qualified(model)?;
    let manifest = store.parse(&name)?;

    println!("Model: {}", name);
    println!("  Digest: {}", manifest.digest());
    println!("  Path: {}", manifest.path().display());
    println!("  Modified: {}", format_modified(&manifest));
    println!("  Schema: {} ({})", manifest.schema_version, manifest.media_type);
    println!("  Size: {}", format_size(manifest.size()));
    println!("\nConfig:");
    println!(
        "  {} {} {}",
        manifest.config.media_type,
        manifest.config.digest,
        format_size(manifest.config.size)
    );
    if !manifest.layers.is_empty() {
        println!("\nLayers:");
        for layer in &manifest.layers {
            println!(
                "  {} {} {}",
                layer.media_type,
                layer.digest,
                format_size(layer.size)
            );
        }
    }

    Ok(())
}

/// Print the total size of a model's layers
pub fn size(store: &ManifestStore, model: &str) -> Result<()> {
    let name = ModelName::parse_qualified(model)?;
    let manifest = store.parse(&name)?;
    println!("{}", manifest.size());
    Ok(())
}

/// Remove a model and, unless asked not to, the blobs no other model uses
pub fn rm(store: &ManifestStore, model: &str, keep_layers: bool) -> Result<()> {
    let name = ModelName::parse_qualified(model)?;
    let manifest = store.parse(&name)?;

    store.remove(&manifest)?;
    if !keep_layers {
        store.remove_layers(&manifest)?;
    }

    println!("Deleted '{}'", name);
    Ok(())
}

/// Show which layers of a model are shared
pub fn refs(store: &ManifestStore, model: &str) -> Result<()> {
    let name = ModelName::parse_qualified(model)?;
    let manifest = store.parse(&name)?;
    let references = store.layer_references(&manifest)?;

    println!("{:<14} {:>10} {:<8} {}", "LAYER", "SIZE", "ON DISK", "SHARED WITH");
    println!("{}", "-".repeat(60));
    for reference in references {
        let shared = if reference.shared_with.is_empty() {
            "-".to_string()
        } else {
            reference
                .shared_with
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!(
            "{:<14} {:>10} {:<8} {}",
            short_digest(&reference.digest),
            format_size(reference.size),
            if reference.exists { "yes" } else { "no" },
            shared
        );
    }

    Ok(())
}

/// Re-hash a model's layer blobs; fails if any blob is missing or altered
pub fn verify(store: &ManifestStore, model: &str) -> Result<()> {
    let name = ModelName::parse_qualified(model)?;
    let manifest = store.parse(&name)?;

    let mut failures = 0;
    for check in store.verify(&manifest)? {
        let status = match &check.status {
            LayerStatus::Ok => "ok".to_string(),
            LayerStatus::Empty => continue,
            LayerStatus::Missing => {
                failures += 1;
                "missing".to_string()
            }
            LayerStatus::Mismatch { actual } => {
                failures += 1;
                format!("mismatch (got {})", actual)
            }
        };
        println!("{} {}", short_digest(&check.layer.digest), status);
    }

    if failures > 0 {
        anyhow::bail!("{} of {}'s layers failed verification", failures, name);
    }
    println!("All layers of '{}' verified", name);
    Ok(())
}

/// Store a model under another name
pub fn cp(store: &ManifestStore, source: &str, destination: &str) -> Result<()> {
    let src = ModelName::parse_qualified(source)?;
    let dst = ModelName::parse_qualified(destination)?;
    store.copy(&src, &dst)?;
    println!("Copied '{}' to '{}'", src, dst);
    Ok(())
}

/// First 12 hex characters of a digest
fn short_digest(digest: &str) -> String {
    let hex = digest
        .split_once([':', '-'])
        .map_or(digest, |(_, hex)| hex);
    hex.chars().take(12).collect()
}

fn format_size(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value.abs() >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn format_modified(manifest: &Manifest) -> String {
    manifest
        .modified()
        .map(|t| DateTime::<Utc>::from(t).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}
