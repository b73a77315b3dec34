#![allow(unused)]

//! # contract: the collaborator interfaces of the publish pipeline
//!
//! The pipeline talks to three external systems, each behind a trait so the orchestration
//! in [`crate::publish`] can run against real clients or scripted mocks:
//!
//! - [`BuildInvoker`] runs the build tool into a local output directory and reports its
//!   exit code.
//! - [`ArtifactStore`] uploads a named bundle of files and reports which files failed.
//! - [`StepReporter`] sets step outputs and marks the step as failed.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall` (`MockBuildInvoker`, `MockArtifactStore`,
//!   `MockStepReporter`), exported outside this crate behind the `test-export-mocks`
//!   feature.
//!
//! ## Adding New Stores
//! - Implement [`ArtifactStore`] for the destination.
//! - Report per-file failures in [`UploadResponse::failed_items`]; reserve
//!   [`UploadError::Transport`] for failures that prevent any upload at all.
//! - Honour [`UploadOptions::continue_on_error`]: when it is `false`, stop at the first
//!   failed file and report every file not yet uploaded as failed.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mockall::{automock, predicate::*};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::walker::FileSet;

/// Options passed through to the artifact store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadOptions {
    /// Compression level 0..=9; `None` leaves the choice to the store.
    pub compression_level: Option<u32>,
    /// Keep uploading after a file fails. Off by default: any failure is fatal.
    pub continue_on_error: bool,
}

/// A file that reached the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedItem {
    /// Path relative to the upload root.
    pub path: PathBuf,
    /// Bytes read from disk (before any compression).
    pub size: u64,
}

/// What an [`ArtifactStore`] reports back after an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadResponse {
    pub artifact_name: String,
    pub uploaded_items: Vec<UploadedItem>,
    /// Full paths of files that could not be uploaded.
    pub failed_items: Vec<PathBuf>,
    /// Total uploaded bytes.
    pub size: u64,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Maven failed with error: {code}")]
    Failed { code: i32 },
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("artifact upload failed: {0}")]
    Transport(String),

    #[error("Error uploading artifact, failed files: {}", join_paths(.failed))]
    PartialFailure { failed: Vec<PathBuf> },
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Runs the external build tool.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BuildInvoker: Send + Sync {
    /// Runs the build so that its deployable output lands in `output_dir`, passing
    /// `extra_options` through verbatim. Returns the process exit code.
    async fn run(&self, output_dir: &Path, extra_options: &[String]) -> Result<i32, BuildError>;
}

/// Uploads a named bundle of files to an artifact store.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upload every file in `files` under `name`. Item paths inside the bundle are relative
    /// to `root_dir`.
    async fn upload_artifact(
        &self,
        name: &str,
        files: &FileSet,
        root_dir: &Path,
        options: &UploadOptions,
    ) -> Result<UploadResponse, UploadError>;
}

/// Reports the outcome of the step to the surrounding CI runner.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait StepReporter: Send + Sync {
    fn set_output(&self, name: &str, value: &str) -> std::io::Result<()>;

    fn set_failed(&self, message: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_options_default_to_strict() {
        let opts = UploadOptions::default();
        assert!(!opts.continue_on_error);
        assert_eq!(opts.compression_level, None);
    }

    #[test]
    fn partial_failure_lists_every_file() {
        let err = UploadError::PartialFailure {
            failed: vec![PathBuf::from("/out/a.jar"), PathBuf::from("/out/b.pom")],
        };
        assert_eq!(
            err.to_string(),
            "Error uploading artifact, failed files: /out/a.jar, /out/b.pom"
        );
    }

    #[test]
    fn build_failure_mentions_status() {
        assert_eq!(
            BuildError::Failed { code: 2 }.to_string(),
            "Maven failed with error: 2"
        );
    }
}
