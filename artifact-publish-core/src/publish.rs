//! High-level pipeline: build → collect → name → upload → report.
//!
//! This module coordinates one publish run against the collaborator traits in
//! [`crate::contract`]:
//!   - Prepares a fresh, empty per-commit output directory
//!   - Runs the [`BuildInvoker`] so the build deploys into that directory
//!   - Walks the directory with [`crate::walker::collect_files`]
//!   - Uploads every file through the [`ArtifactStore`] under the name derived from the
//!     [`CiContext`]
//!
//! # Error Handling
//! Every step is fail-fast and nothing is retried. A failed build means nothing is walked or
//! uploaded; a failed walk means nothing is uploaded; a single failed file fails the whole
//! run with every failed path named. There is no partial success.
//!
//! The artifact name is derived before the build starts, so a misconfigured ref fails the
//! run without spending a build on it.
//!
//! # Navigation
//! - Main entrypoint: [`publish`]
//! - Step outcome reporting: [`report_outcome`]

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info};

use crate::context::CiContext;
use crate::contract::{
    ArtifactStore, BuildError, BuildInvoker, StepReporter, UploadError, UploadOptions,
};
use crate::naming::NamingError;
use crate::walker::{collect_files, WalkError};

/// Step output carrying the local directory the artifact was collected from.
pub const ROOT_DIR_OUTPUT: &str = "artifact-root-dir";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to prepare output directory {}: {source}", path.display())]
    Prepare {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Walk(#[from] WalkError),

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("failed to report step output: {0}")]
    Report(#[source] io::Error),
}

/// Everything one run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub context: CiContext,
    /// Parent of the per-commit output directory.
    pub work_dir: PathBuf,
    /// Extra build options, one per entry, passed through verbatim.
    pub extra_options: Vec<String>,
    pub upload: UploadOptions,
}

impl PublishRequest {
    pub fn output_dir(&self) -> PathBuf {
        output_dir_for(&self.work_dir, &self.context.commit_sha)
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub artifact_name: String,
    pub root_dir: PathBuf,
    pub file_count: usize,
    pub size: u64,
}

/// `<work_dir>/artifacts-maven-<sha>`
pub fn output_dir_for(work_dir: &Path, commit_sha: &str) -> PathBuf {
    work_dir.join(format!("artifacts-maven-{commit_sha}"))
}

async fn prepare_output_dir(dir: &Path) -> Result<(), PublishError> {
    let prepare = |source: io::Error| {
        error!(error = ?source, path = %dir.display(), "Failed to prepare output directory");
        PublishError::Prepare {
            path: dir.to_path_buf(),
            source,
        }
    };
    if tokio::fs::try_exists(dir).await.map_err(prepare)? {
        tokio::fs::remove_dir_all(dir).await.map_err(prepare)?;
        info!(path = %dir.display(), "Removed stale output directory");
    }
    tokio::fs::create_dir_all(dir).await.map_err(prepare)?;
    Ok(())
}

pub async fn publish<B, S>(
    request: &PublishRequest,
    invoker: &B,
    store: &S,
) -> Result<PublishReport, PublishError>
where
    B: BuildInvoker + ?Sized,
    S: ArtifactStore + ?Sized,
{
    let artifact_name = request.context.artifact_name().map_err(|e| {
        error!(error = %e, git_ref = %request.context.git_ref, "Cannot derive artifact name");
        e
    })?;
    let output_dir = request.output_dir();
    info!(artifact = %artifact_name, output_dir = %output_dir.display(), "Starting publish");

    prepare_output_dir(&output_dir).await?;

    let code = invoker.run(&output_dir, &request.extra_options).await?;
    if code != 0 {
        error!(code, "Build failed, nothing will be uploaded");
        return Err(BuildError::Failed { code }.into());
    }
    info!("Build succeeded");

    let walk_root = output_dir.clone();
    let files = tokio::task::spawn_blocking(move || collect_files(&walk_root))
        .await
        .map_err(|e| PublishError::Task(e.to_string()))??;
    info!(count = files.len(), "Uploading results as artifact");

    let response = store
        .upload_artifact(artifact_name.as_str(), &files, &output_dir, &request.upload)
        .await
        .map_err(|e| {
            error!(error = %e, artifact = %artifact_name, "Artifact upload failed");
            e
        })?;

    if !response.failed_items.is_empty() {
        error!(
            failed = ?response.failed_items,
            artifact = %artifact_name,
            "Some files failed to upload"
        );
        return Err(UploadError::PartialFailure {
            failed: response.failed_items,
        }
        .into());
    }
    info!(
        artifact = %artifact_name,
        files = files.len(),
        size = response.size,
        "Finished uploading artifact"
    );

    Ok(PublishReport {
        artifact_name: artifact_name.into_string(),
        root_dir: output_dir,
        file_count: files.len(),
        size: response.size,
    })
}

/// Publishes the run's outcome: the root dir output on success, a failure message otherwise.
///
/// Nothing is output on failure. An output that cannot be written turns success into failure.
pub fn report_outcome<R>(
    outcome: Result<PublishReport, PublishError>,
    reporter: &R,
) -> Result<PublishReport, PublishError>
where
    R: StepReporter + ?Sized,
{
    match outcome {
        Ok(report) => {
            let root = report.root_dir.display().to_string();
            if let Err(e) = reporter.set_output(ROOT_DIR_OUTPUT, &root) {
                let err = PublishError::Report(e);
                reporter.set_failed(&err.to_string());
                return Err(err);
            }
            Ok(report)
        }
        Err(e) => {
            reporter.set_failed(&e.to_string());
            Err(e)
        }
    }
}
