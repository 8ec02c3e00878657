//! Removal of empty directories left behind by deleted manifests

use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

/// Remove every directory under `root` that is empty once its own
/// subdirectories have been pruned. `root` itself is kept and symlinks are
/// never followed.
pub fn prune_empty_dirs(root: &Path) -> io::Result<()> {
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            prune_dir(&entry.path())?;
        }
    }
    Ok(())
}

fn prune_dir(dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            prune_dir(&entry.path())?;
        }
    }

    if fs::read_dir(dir)?.next().is_none() {
        fs::remove_dir(dir)?;
        debug!(path = %dir.display(), "Pruned empty directory");
    }
    Ok(())
}
