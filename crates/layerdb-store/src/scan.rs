//! Registry scans over every stored manifest

use crate::manifest::{Manifest, ManifestStore};
use layerdb_core::{LayerdbError, LayerdbResult, ModelName};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Manifest files sit exactly this many directories below the root
const NAME_DEPTH: usize = 4;

/// What a scan does when one candidate cannot be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanPolicy {
    /// Abort the whole scan on the first bad candidate
    Strict,
    /// Log and skip bad candidates, return everything that loaded
    #[default]
    BestEffort,
}

impl From<bool> for ScanPolicy {
    /// `true` means "continue on error"
    fn from(continue_on_error: bool) -> Self {
        if continue_on_error {
            ScanPolicy::BestEffort
        } else {
            ScanPolicy::Strict
        }
    }
}

impl ScanPolicy {
    fn reject(self, reason: &'static str, candidate: String, err: LayerdbError) -> LayerdbResult<()> {
        match self {
            ScanPolicy::Strict => Err(LayerdbError::Scan {
                context: candidate,
                source: Box::new(err),
            }),
            ScanPolicy::BestEffort => {
                warn!(candidate = %candidate, error = %err, "{}", reason);
                Ok(())
            }
        }
    }
}

impl ManifestStore {
    /// Load every manifest under the manifests root, keyed by name.
    pub fn list_all(&self, policy: ScanPolicy) -> LayerdbResult<BTreeMap<ModelName, Manifest>> {
        let root = self.paths().manifests_dir()?;
        let candidates = manifest_candidates(&root, policy)?;
        debug!(
            root = %root.display(),
            candidates = candidates.len(),
            "Scanning manifests"
        );

        let mut manifests = BTreeMap::new();
        for candidate in candidates {
            match fs::metadata(&candidate) {
                Ok(metadata) if metadata.is_dir() => continue,
                Ok(_) => {}
                // Removed since the directory was listed
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    let context = candidate.display().to_string();
                    policy.reject("unreadable candidate", context, e.into())?;
                    continue;
                }
            }

            let rel = match candidate.strip_prefix(&root) {
                Ok(rel) => rel,
                Err(e) => {
                    let err = LayerdbError::InvalidName(format!("{}: {}", candidate.display(), e));
                    policy.reject("bad filepath", candidate.display().to_string(), err)?;
                    continue;
                }
            };

            let name = ModelName::from_filepath(rel);
            if !name.is_valid() {
                let err = LayerdbError::InvalidName(rel.display().to_string());
                policy.reject("bad manifest name", rel.display().to_string(), err)?;
                continue;
            }

            match self.parse(&name) {
                Ok(manifest) => {
                    manifests.insert(name, manifest);
                }
                Err(err) => policy.reject("bad manifest", name.to_string(), err)?,
            }
        }

        info!(count = manifests.len(), "Listed manifests");
        Ok(manifests)
    }
}

/// Entries exactly four levels below `root`, sorted. Dot-prefixed leaves are
/// in-flight temporary files and are left out.
///
/// The root must be readable. Below it, unreadable directories are subject to
/// `policy` and vanished ones are skipped.
fn manifest_candidates(root: &Path, policy: ScanPolicy) -> LayerdbResult<Vec<PathBuf>> {
    let mut level = vec![root.to_path_buf()];

    for depth in 1..=NAME_DEPTH {
        let mut next = Vec::new();
        for dir in &level {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) if depth == 1 => return Err(e.into()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    let context = dir.display().to_string();
                    policy.reject("unreadable directory", context, e.into())?;
                    continue;
                }
            };
            for entry in entries {
                let path = match entry {
                    Ok(entry) => entry.path(),
                    Err(e) => {
                        let context = dir.display().to_string();
                        policy.reject("unreadable directory", context, e.into())?;
                        break;
                    }
                };
                if depth < NAME_DEPTH {
                    if path.is_dir() {
                        next.push(path);
                    }
                } else if !is_hidden(&path) {
                    next.push(path);
                }
            }
        }
        level = next;
    }

    level.sort();
    Ok(level)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or(false, |name| name.starts_with('.'))
}
