#![doc = "ArtifactStore implementation for the GitHub Actions workflow-run artifact service."]
//
//! # Actions artifact client (CLI <-> Core)
//!
//! This module wires the [`ArtifactStore`] trait from `artifact-publish-core` to the artifact
//! container service a GitHub Actions runner exposes to its job steps.
//!
//! ## Protocol
//! 1. `POST {runtime}_apis/pipelines/workflows/{run}/artifacts` creates a file container for
//!    the artifact and returns its `fileContainerResourceUrl`.
//! 2. Every file is `PUT` to `{container}?itemPath={artifact}/{relative path}` in chunks of
//!    [`CHUNK_SIZE`] bytes, gzip-encoded when a compression level is set and that makes the
//!    payload smaller. At most [`UPLOAD_CONCURRENCY`] files are in flight at once.
//! 3. `PATCH {runtime}_apis/pipelines/workflows/{run}/artifacts?artifactName=...` records the
//!    total size and makes the artifact visible. This only happens when every file uploaded.
//!
//! ## Client Usage
//! - Construct [`ActionsArtifactClient`] with [`ActionsArtifactClient::new_from_env`]
//!   (`ACTIONS_RUNTIME_URL`, `ACTIONS_RUNTIME_TOKEN`, `GITHUB_RUN_ID`).
//! - No retries are made; a failed file is reported back in the upload response.

use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures::stream::{self, StreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_ENCODING, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use artifact_publish_core::contract::{
    ArtifactStore, UploadError, UploadOptions, UploadResponse, UploadedItem,
};
use artifact_publish_core::walker::FileSet;

pub const API_VERSION: &str = "6.0-preview";
/// Files uploaded in parallel.
pub const UPLOAD_CONCURRENCY: usize = 2;
/// Largest single PUT body.
pub const CHUNK_SIZE: usize = 8 * 1024 * 1024;

#[derive(Serialize)]
struct CreateArtifactRequest<'a> {
    #[serde(rename = "Type")]
    kind: &'a str,
    #[serde(rename = "Name")]
    name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateArtifactResponse {
    file_container_resource_url: String,
}

#[derive(Serialize)]
struct FinalizeArtifactRequest {
    #[serde(rename = "Size")]
    size: u64,
}

pub struct ActionsArtifactClient {
    http: reqwest::Client,
    runtime_url: String,
    token: String,
    run_id: String,
}

impl ActionsArtifactClient {
    pub fn new(
        runtime_url: impl Into<String>,
        token: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        let mut runtime_url = runtime_url.into();
        if !runtime_url.ends_with('/') {
            runtime_url.push('/');
        }
        Self {
            http: reqwest::Client::new(),
            runtime_url,
            token: token.into(),
            run_id: run_id.into(),
        }
    }

    pub fn new_from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        match (
            env::var("ACTIONS_RUNTIME_URL"),
            env::var("ACTIONS_RUNTIME_TOKEN"),
            env::var("GITHUB_RUN_ID"),
        ) {
            (Ok(url), Ok(token), Ok(run_id)) => {
                tracing::info!(
                    runtime_url = %url,
                    run_id = %run_id,
                    token_set = !token.is_empty(),
                    "Initialized ActionsArtifactClient from environment"
                );
                Ok(Self::new(url, token, run_id))
            }
            (Err(e), _, _) => {
                tracing::error!(error = ?e, "ACTIONS_RUNTIME_URL missing in environment");
                Err(format!("ACTIONS_RUNTIME_URL: {e}").into())
            }
            (_, Err(e), _) => {
                tracing::error!(error = ?e, "ACTIONS_RUNTIME_TOKEN missing in environment");
                Err(format!("ACTIONS_RUNTIME_TOKEN: {e}").into())
            }
            (_, _, Err(e)) => {
                tracing::error!(error = ?e, "GITHUB_RUN_ID missing in environment");
                Err(format!("GITHUB_RUN_ID: {e}").into())
            }
        }
    }

    /// `{runtime}_apis/pipelines/workflows/{run}/artifacts?api-version=...`
    pub fn artifact_url(&self) -> String {
        format!(
            "{}_apis/pipelines/workflows/{}/artifacts?api-version={}",
            self.runtime_url, self.run_id, API_VERSION
        )
    }

    fn accept(&self) -> String {
        format!("application/json;api-version={API_VERSION}")
    }

    async fn create_container(&self, name: &str) -> Result<String, UploadError> {
        tracing::info!(artifact = name, "Creating artifact file container");
        let resp = self
            .http
            .post(self.artifact_url())
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, self.accept())
            .json(&CreateArtifactRequest {
                kind: "actions_storage",
                name,
            })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, artifact = name, "Failed to reach artifact service");
                UploadError::Transport(format!("create container: {e}"))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Artifact service refused container");
            return Err(UploadError::Transport(format!(
                "create container returned {status}: {body}"
            )));
        }
        let created: CreateArtifactResponse = resp
            .json()
            .await
            .map_err(|e| UploadError::Transport(format!("create container response: {e}")))?;
        tracing::info!(
            container = %created.file_container_resource_url,
            "Created artifact file container"
        );
        Ok(created.file_container_resource_url)
    }

    async fn upload_file(
        &self,
        container_url: &str,
        item_path: &str,
        file: &Path,
        compression_level: Option<u32>,
    ) -> Result<u64, String> {
        let content = tokio::fs::read(file).await.map_err(|e| e.to_string())?;
        let original_len = content.len() as u64;
        let (payload, gzipped) = encode_payload(content, compression_level)?;

        let mut url = Url::parse(container_url).map_err(|e| e.to_string())?;
        url.query_pairs_mut().append_pair("itemPath", item_path);

        let total = payload.len();
        let chunks: Vec<&[u8]> = if payload.is_empty() {
            vec![&payload[..]]
        } else {
            payload.chunks(CHUNK_SIZE).collect()
        };
        let mut start = 0usize;
        for chunk in chunks {
            let mut req = self
                .http
                .put(url.clone())
                .header(AUTHORIZATION, format!("Bearer {}", self.token))
                .header(ACCEPT, self.accept())
                .header(CONTENT_TYPE, "application/octet-stream");
            if let Some(range) = content_range(start, chunk.len(), total) {
                req = req.header(CONTENT_RANGE, range);
            }
            if gzipped {
                req = req
                    .header(CONTENT_ENCODING, "gzip")
                    .header("x-tfs-filelength", original_len.to_string());
            }
            let resp = req.body(chunk.to_vec()).send().await.map_err(|e| e.to_string())?;
            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(format!("{status}: {body}"));
            }
            start += chunk.len();
        }
        tracing::debug!(item = item_path, size = original_len, gzipped, "Uploaded file");
        Ok(original_len)
    }

    async fn upload_item(
        &self,
        container_url: &str,
        name: &str,
        file: &Path,
        root_dir: &Path,
        compression_level: Option<u32>,
    ) -> Result<UploadedItem, String> {
        let rel = file
            .strip_prefix(root_dir)
            .map_err(|_| format!("outside upload root {}", root_dir.display()))?;
        let size = self
            .upload_file(container_url, &item_path(name, rel), file, compression_level)
            .await?;
        Ok(UploadedItem {
            path: rel.to_path_buf(),
            size,
        })
    }

    async fn finalize(&self, name: &str, size: u64) -> Result<(), UploadError> {
        let mut url = Url::parse(&self.artifact_url())
            .map_err(|e| UploadError::Transport(format!("artifact url: {e}")))?;
        url.query_pairs_mut().append_pair("artifactName", name);

        let resp = self
            .http
            .patch(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, self.accept())
            .json(&FinalizeArtifactRequest { size })
            .send()
            .await
            .map_err(|e| UploadError::Transport(format!("finalize artifact: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Failed to finalize artifact");
            return Err(UploadError::Transport(format!(
                "finalize artifact returned {status}: {body}"
            )));
        }
        tracing::info!(artifact = name, size, "Finalized artifact");
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for ActionsArtifactClient {
    async fn upload_artifact(
        &self,
        name: &str,
        files: &FileSet,
        root_dir: &Path,
        options: &UploadOptions,
    ) -> Result<UploadResponse, UploadError> {
        let container_url = self.create_container(name).await?;
        let abort = AtomicBool::new(false);

        let paths: Vec<PathBuf> = files.iter().map(Path::to_path_buf).collect();
        let container_url = container_url.as_str();
        let abort = &abort;

        let results: Vec<(PathBuf, Result<UploadedItem, String>)> = stream::iter(paths)
            .map(|file: PathBuf| async move {
                if abort.load(Ordering::SeqCst) {
                    let skipped = String::from("skipped after earlier failure");
                    return (file, Err(skipped));
                }
                let result = self
                    .upload_item(container_url, name, &file, root_dir, options.compression_level)
                    .await;
                if let Err(e) = &result {
                    tracing::error!(error = %e, file = %file.display(), "File upload failed");
                    if !options.continue_on_error {
                        abort.store(true, Ordering::SeqCst);
                    }
                }
                (file, result)
            })
            .buffer_unordered(UPLOAD_CONCURRENCY)
            .collect()
            .await;

        let mut response = UploadResponse {
            artifact_name: name.to_string(),
            ..Default::default()
        };
        for (file, result) in results {
            match result {
                Ok(item) => {
                    response.size += item.size;
                    response.uploaded_items.push(item);
                }
                Err(_) => response.failed_items.push(file),
            }
        }
        response.failed_items.sort();

        if response.failed_items.is_empty() {
            self.finalize(name, response.size).await?;
        } else {
            tracing::error!(
                failed = response.failed_items.len(),
                artifact = name,
                "Not finalizing artifact with failed files"
            );
        }
        Ok(response)
    }
}

/// `{artifact}/{relative path}` with `/` separators regardless of platform.
pub fn item_path(artifact_name: &str, rel: &Path) -> String {
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("{}/{}", artifact_name, parts.join("/"))
}

/// `bytes {start}-{end}/{total}`; `None` for an empty body.
pub fn content_range(start: usize, len: usize, total: usize) -> Option<String> {
    if len == 0 {
        return None;
    }
    Some(format!("bytes {}-{}/{}", start, start + len - 1, total))
}

/// Gzips `content` when a non-zero level is set and the result is smaller.
pub fn encode_payload(
    content: Vec<u8>,
    compression_level: Option<u32>,
) -> Result<(Vec<u8>, bool), String> {
    match compression_level {
        Some(level) if level > 0 && !content.is_empty() => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level.min(9)));
            encoder.write_all(&content).map_err(|e| e.to_string())?;
            let gz = encoder.finish().map_err(|e| e.to_string())?;
            if gz.len() < content.len() {
                Ok((gz, true))
            } else {
                Ok((content, false))
            }
        }
        _ => Ok((content, false)),
    }
}
