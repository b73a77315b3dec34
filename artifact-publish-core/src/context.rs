use std::env;

use thiserror::Error;
use tracing::{error, info};

use crate::naming::{build_name, ArtifactName, NamingError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {var} has unexpected value {value:?}")]
    Malformed { var: &'static str, value: String },
}

/// Immutable CI run context used to name the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiContext {
    pub commit_sha: String,
    /// `refs/heads/<branch>` or `refs/tags/<tag>`.
    pub git_ref: String,
    pub repo_short_name: String,
}

impl CiContext {
    pub fn new(
        commit_sha: impl Into<String>,
        git_ref: impl Into<String>,
        repo_short_name: impl Into<String>,
    ) -> Self {
        Self {
            commit_sha: commit_sha.into(),
            git_ref: git_ref.into(),
            repo_short_name: repo_short_name.into(),
        }
    }

    /// Reads `GITHUB_SHA`, `GITHUB_REF` and `GITHUB_REPOSITORY` (`owner/repo`).
    pub fn from_env() -> Result<Self, ContextError> {
        let commit_sha = require("GITHUB_SHA")?;
        let git_ref = require("GITHUB_REF")?;
        let repository = require("GITHUB_REPOSITORY")?;
        let repo_short_name = match repository.rsplit_once('/') {
            Some((_, repo)) if !repo.is_empty() => repo.to_string(),
            None => repository.clone(),
            Some(_) => {
                error!(value = %repository, "GITHUB_REPOSITORY has no repository part");
                return Err(ContextError::Malformed {
                    var: "GITHUB_REPOSITORY",
                    value: repository,
                });
            }
        };
        let ctx = CiContext {
            commit_sha,
            git_ref,
            repo_short_name,
        };
        info!(
            sha = %ctx.commit_sha,
            git_ref = %ctx.git_ref,
            repo = %ctx.repo_short_name,
            "Loaded CI context from environment"
        );
        Ok(ctx)
    }

    pub fn artifact_name(&self) -> Result<ArtifactName, NamingError> {
        build_name(&self.repo_short_name, &self.commit_sha, &self.git_ref)
    }
}

fn require(var: &'static str) -> Result<String, ContextError> {
    match env::var(var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => {
            error!(var, "Required CI environment variable missing");
            Err(ContextError::Missing(var))
        }
    }
}
