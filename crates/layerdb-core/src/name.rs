//! Qualified model names and their on-disk paths
//!
//! A model package is addressed by four parts, `host/namespace/model:tag`.
//! Stored manifests live at `<manifests root>/<host>/<namespace>/<model>/<tag>`,
//! so every part must be a single path segment.

use crate::{LayerdbError, LayerdbResult};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Host used when a name does not carry one
pub const DEFAULT_HOST: &str = "registry.local";
/// Namespace used when a name does not carry one
pub const DEFAULT_NAMESPACE: &str = "library";
/// Tag used when a name does not carry one
pub const DEFAULT_TAG: &str = "latest";

const MAX_HOST_LEN: usize = 350;
const MAX_PART_LEN: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartKind {
    Host,
    Namespace,
    Model,
    Tag,
}

/// A hierarchical model package name
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelName {
    pub host: String,
    pub namespace: String,
    pub model: String,
    pub tag: String,
}

impl ModelName {
    /// Build a name from its four parts, without validation
    pub fn new(
        host: impl Into<String>,
        namespace: impl Into<String>,
        model: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            namespace: namespace.into(),
            model: model.into(),
            tag: tag.into(),
        }
    }

    /// Parse `[host/][namespace/]model[:tag][@digest]`, filling the missing
    /// parts from the defaults. A trailing digest is accepted and dropped.
    ///
    /// The result is not validated; see [`ModelName::is_valid`].
    pub fn parse(s: &str) -> Self {
        let s = s.rsplit_once('@').map_or(s, |(name, _digest)| name);

        // A colon only introduces a tag after the last slash, so that
        // `host:port/namespace/model` keeps its port.
        let (rest, tag) = match s.rsplit_once(':') {
            Some((rest, tag)) if !tag.contains('/') => (rest, tag),
            _ => (s, ""),
        };

        let mut parts = rest.rsplitn(3, '/');
        let model = parts.next().unwrap_or_default();
        let namespace = parts.next().unwrap_or_default();
        let host = parts.next().unwrap_or_default();

        let or_default = |part: &str, default: &str| {
            if part.is_empty() {
                default.to_string()
            } else {
                part.to_string()
            }
        };

        Self {
            host: or_default(host, DEFAULT_HOST),
            namespace: or_default(namespace, DEFAULT_NAMESPACE),
            model: model.to_string(),
            tag: or_default(tag, DEFAULT_TAG),
        }
    }

    /// Parse a name a storage operation can use, rejecting unqualified or
    /// malformed input.
    pub fn parse_qualified(s: &str) -> LayerdbResult<Self> {
        let name = Self::parse(s);
        if !name.is_fully_qualified() {
            return Err(LayerdbError::Unqualified(s.to_string()));
        }
        if !name.is_valid() {
            return Err(LayerdbError::InvalidName(s.to_string()));
        }
        Ok(name)
    }

    /// All four parts are present
    pub fn is_fully_qualified(&self) -> bool {
        !self.host.is_empty()
            && !self.namespace.is_empty()
            && !self.model.is_empty()
            && !self.tag.is_empty()
    }

    /// Fully qualified and every part is made of allowed characters
    pub fn is_valid(&self) -> bool {
        self.is_fully_qualified()
            && is_valid_part(PartKind::Host, &self.host)
            && is_valid_part(PartKind::Namespace, &self.namespace)
            && is_valid_part(PartKind::Model, &self.model)
            && is_valid_part(PartKind::Tag, &self.tag)
    }

    /// Path of the manifest relative to the manifests root.
    ///
    /// Only meaningful for fully qualified names.
    pub fn filepath(&self) -> PathBuf {
        PathBuf::from(&self.host)
            .join(&self.namespace)
            .join(&self.model)
            .join(&self.tag)
    }

    /// Reconstruct a name from a path relative to the manifests root.
    ///
    /// Returns the empty (unqualified) name unless the path has exactly four
    /// plain segments.
    pub fn from_filepath(rel: &Path) -> Self {
        let mut parts = Vec::with_capacity(4);
        for component in rel.components() {
            match component {
                Component::Normal(part) => match part.to_str() {
                    Some(part) => parts.push(part),
                    None => return Self::default(),
                },
                _ => return Self::default(),
            }
        }

        match parts.as_slice() {
            [host, namespace, model, tag] => {
                let name = Self::new(*host, *namespace, *model, *tag);
                if name.is_fully_qualified() {
                    name
                } else {
                    Self::default()
                }
            }
            _ => Self::default(),
        }
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}:{}", self.host, self.namespace, self.model, self.tag)
    }
}

impl Serialize for ModelName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn is_valid_part(kind: PartKind, s: &str) -> bool {
    let max = match kind {
        PartKind::Host => MAX_HOST_LEN,
        _ => MAX_PART_LEN,
    };
    if s.is_empty() || s.len() > max {
        return false;
    }

    s.chars().enumerate().all(|(i, c)| {
        if c.is_ascii_alphanumeric() || c == '_' {
            return true;
        }
        if i == 0 {
            return false;
        }
        match c {
            '-' => true,
            '.' => kind != PartKind::Namespace,
            ':' => kind == PartKind::Host,
            _ => false,
        }
    })
}
