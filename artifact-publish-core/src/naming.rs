//! Artifact naming derived from a git ref.
//!
//! Branch builds get the commit id appended since many runs share a branch; tags are unique
//! per release and keep a short name. Names are not sanitised for any particular store.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamingError {
    #[error("invalid ref {git_ref:?}: {reason}")]
    InvalidRef { git_ref: String, reason: String },

    #[error("{0} must not be empty")]
    EmptyComponent(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Branch,
    Tag,
}

/// A parsed `refs/<kind>/<name>` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefDescriptor {
    pub kind: RefKind,
    /// Everything after the kind segment, so `refs/heads/feature/foo` has name `feature/foo`.
    pub name: String,
}

impl RefDescriptor {
    pub fn parse(git_ref: &str) -> Result<Self, NamingError> {
        let invalid = |reason: &str| NamingError::InvalidRef {
            git_ref: git_ref.to_string(),
            reason: reason.to_string(),
        };

        let segments: Vec<&str> = git_ref.split('/').collect();
        if segments.len() < 3 {
            return Err(invalid("expected refs/<heads|tags>/<name>"));
        }
        if segments[0] != "refs" {
            return Err(invalid("must start with refs/"));
        }
        let kind = match segments[1] {
            "heads" => RefKind::Branch,
            "tags" => RefKind::Tag,
            other => return Err(invalid(&format!("unsupported ref kind {other:?}"))),
        };
        let name = segments[2..].join("/");
        if name.is_empty() {
            return Err(invalid("empty ref name"));
        }
        Ok(RefDescriptor { kind, name })
    }
}

impl FromStr for RefDescriptor {
    type Err = NamingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RefDescriptor::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactName(String);

impl ArtifactName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArtifactName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Builds `{repo}-{ref name}` for tags and `{repo}-{ref name}-{sha}` for branches.
pub fn build_name(
    repo_short_name: &str,
    commit_sha: &str,
    git_ref: &str,
) -> Result<ArtifactName, NamingError> {
    if repo_short_name.is_empty() {
        return Err(NamingError::EmptyComponent("repository name"));
    }
    if commit_sha.is_empty() {
        return Err(NamingError::EmptyComponent("commit sha"));
    }
    let descriptor = RefDescriptor::parse(git_ref)?;
    let name = match descriptor.kind {
        RefKind::Branch => format!("{}-{}-{}", repo_short_name, descriptor.name, commit_sha),
        RefKind::Tag => format!("{}-{}", repo_short_name, descriptor.name),
    };
    debug!(artifact_name = %name, kind = ?descriptor.kind, "Derived artifact name");
    Ok(ArtifactName(name))
}
