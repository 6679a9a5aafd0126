//!
//! Content paths a name record can point at.
//!

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Namespace assumed when a bare content identifier is given.
pub const DEFAULT_NAMESPACE: &str = "ipfs";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("path {0:?} is missing a namespace or root")]
    MissingRoot(String),
    #[error("invalid namespace {namespace:?} in path {path:?}")]
    InvalidNamespace { namespace: String, path: String },
    #[error("invalid content identifier {root:?} in path {path:?}")]
    InvalidRoot { root: String, path: String },
    #[error("path {0:?} must not contain '..' segments")]
    ParentSegment(String),
}

/// A validated, canonical reference to content: `/<namespace>/<root>[/<sub>...]`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentPath(String);

impl ContentPath {
    /// Parse and canonicalise a path.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(PathError::Empty);
        }

        if !input.starts_with('/') {
            if !is_content_id(input) {
                return Err(PathError::MissingRoot(input.to_string()));
            }
            return Ok(Self(format!("/{DEFAULT_NAMESPACE}/{input}")));
        }

        let mut segments = Vec::new();
        for segment in input.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err(PathError::ParentSegment(input.to_string())),
                s => segments.push(s),
            }
        }

        let (namespace, root) = match segments.as_slice() {
            [namespace, root, ..] => (*namespace, *root),
            _ => return Err(PathError::MissingRoot(input.to_string())),
        };

        if !is_namespace(namespace) {
            return Err(PathError::InvalidNamespace {
                namespace: namespace.to_string(),
                path: input.to_string(),
            });
        }

        if matches!(namespace, "ipfs" | "ipld") && !is_content_id(root) {
            return Err(PathError::InvalidRoot {
                root: root.to_string(),
                path: input.to_string(),
            });
        }

        Ok(Self(format!("/{}", segments.join("/"))))
    }

    /// First segment, e.g. `ipfs`.
    pub fn namespace(&self) -> &str {
        self.segments().next().unwrap_or_default()
    }

    /// Second segment, e.g. the CID of an `/ipfs/` path.
    pub fn root(&self) -> &str {
        self.segments().nth(1).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Segments of the canonical path, namespace first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }
}

fn is_namespace(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !s.starts_with('-')
}

/// Content identifiers are multibase text, so plain ASCII alphanumerics.
fn is_content_id(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

impl FromStr for ContentPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentPath> for String {
    fn from(value: ContentPath) -> Self {
        value.0
    }
}

impl fmt::Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContentPath").field(&self.0).finish()
    }
}
