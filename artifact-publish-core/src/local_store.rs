//! Filesystem-backed [`ArtifactStore`]: each artifact becomes a directory under a store root.
//!
//! Layout for an artifact named `proj-main-abc123`:
//!
//! ```text
//! <store_dir>/proj-main-abc123/<relative path>[.gz]
//! <store_dir>/proj-main-abc123.manifest.json
//! ```
//!
//! The manifest lists every stored file with its size and SHA-256 digest of the original
//! content. Files are gzip-compressed (and get a `.gz` suffix) only when a compression level
//! is set.
//!
//! Storing an artifact replaces any earlier bundle of the same name. The manifest is written
//! only when every file was stored; otherwise the partial bundle is removed again.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info};

use crate::contract::{ArtifactStore, UploadError, UploadOptions, UploadResponse, UploadedItem};
use crate::walker::FileSet;

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    artifact_name: &'a str,
    files: Vec<ManifestEntry>,
}

#[derive(Debug, Serialize)]
struct ManifestEntry {
    path: PathBuf,
    size: u64,
    sha256: String,
    compressed: bool,
}

pub struct LocalArtifactStore {
    store_dir: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
        }
    }

    pub fn bundle_dir(&self, name: &str) -> PathBuf {
        self.store_dir.join(name)
    }

    pub fn manifest_path(&self, name: &str) -> PathBuf {
        self.store_dir.join(format!("{name}.manifest.json"))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn upload_artifact(
        &self,
        name: &str,
        files: &FileSet,
        root_dir: &Path,
        options: &UploadOptions,
    ) -> Result<UploadResponse, UploadError> {
        let name = name.to_string();
        let bundle_dir = self.bundle_dir(&name);
        let manifest_path = self.manifest_path(&name);
        let files: Vec<PathBuf> = files.iter().map(Path::to_path_buf).collect();
        let root_dir = root_dir.to_path_buf();
        let options = options.clone();

        info!(
            artifact = %name,
            store = %self.store_dir.display(),
            files = files.len(),
            "Storing artifact in local store"
        );

        tokio::task::spawn_blocking(move || {
            store_bundle(&name, &bundle_dir, &manifest_path, &files, &root_dir, &options)
        })
        .await
        .map_err(|e| UploadError::Transport(format!("local store task failed: {e}")))?
    }
}

fn store_bundle(
    name: &str,
    bundle_dir: &Path,
    manifest_path: &Path,
    files: &[PathBuf],
    root_dir: &Path,
    options: &UploadOptions,
) -> Result<UploadResponse, UploadError> {
    clear_previous(bundle_dir, manifest_path)?;
    fs::create_dir_all(bundle_dir).map_err(|e| {
        error!(error = ?e, path = %bundle_dir.display(), "Failed to create bundle directory");
        UploadError::Transport(format!("failed to create {}: {e}", bundle_dir.display()))
    })?;

    let mut response = UploadResponse {
        artifact_name: name.to_string(),
        ..Default::default()
    };
    let mut entries = Vec::new();

    for (idx, file) in files.iter().enumerate() {
        match store_file(file, root_dir, bundle_dir, options.compression_level) {
            Ok(entry) => {
                debug!(file = %entry.path.display(), size = entry.size, "Stored file");
                response.size += entry.size;
                response.uploaded_items.push(UploadedItem {
                    path: entry.path.clone(),
                    size: entry.size,
                });
                entries.push(entry);
            }
            Err(e) => {
                error!(error = %e, file = %file.display(), "Failed to store file");
                response.failed_items.push(file.clone());
                if !options.continue_on_error {
                    response.failed_items.extend(files[idx + 1..].iter().cloned());
                    break;
                }
            }
        }
    }

    if !response.failed_items.is_empty() {
        error!(
            artifact = %name,
            failed = response.failed_items.len(),
            "Discarding partial bundle"
        );
        clear_previous(bundle_dir, manifest_path)?;
        return Ok(response);
    }

    let manifest = Manifest {
        artifact_name: name,
        files: entries,
    };
    let json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| UploadError::Transport(format!("failed to encode manifest: {e}")))?;
    fs::write(manifest_path, json).map_err(|e| {
        error!(error = ?e, path = %manifest_path.display(), "Failed to write manifest");
        UploadError::Transport(format!(
            "failed to write manifest {}: {e}",
            manifest_path.display()
        ))
    })?;

    info!(
        artifact = %name,
        uploaded = response.uploaded_items.len(),
        failed = response.failed_items.len(),
        size = response.size,
        "Local store finished"
    );
    Ok(response)
}

/// Removes the bundle directory and manifest of an earlier store under the same name.
fn clear_previous(bundle_dir: &Path, manifest_path: &Path) -> Result<(), UploadError> {
    let remove_failed = |path: &Path, e: std::io::Error| {
        error!(error = ?e, path = %path.display(), "Failed to remove previous bundle");
        UploadError::Transport(format!("failed to remove {}: {e}", path.display()))
    };
    if bundle_dir.exists() {
        fs::remove_dir_all(bundle_dir).map_err(|e| remove_failed(bundle_dir, e))?;
        info!(path = %bundle_dir.display(), "Removed previous bundle");
    }
    if manifest_path.exists() {
        fs::remove_file(manifest_path).map_err(|e| remove_failed(manifest_path, e))?;
    }
    Ok(())
}

fn store_file(
    file: &Path,
    root_dir: &Path,
    bundle_dir: &Path,
    compression_level: Option<u32>,
) -> Result<ManifestEntry, String> {
    let rel = file
        .strip_prefix(root_dir)
        .map_err(|_| format!("{} is outside {}", file.display(), root_dir.display()))?;
    let content = fs::read(file).map_err(|e| e.to_string())?;
    let sha256 = format!("{:x}", Sha256::digest(&content));

    let mut dest = bundle_dir.join(rel);
    if compression_level.is_some() {
        let mut with_gz = dest.into_os_string();
        with_gz.push(".gz");
        dest = PathBuf::from(with_gz);
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }

    match compression_level {
        Some(level) => {
            let out = fs::File::create(&dest).map_err(|e| e.to_string())?;
            let mut encoder = GzEncoder::new(out, Compression::new(level.min(9)));
            encoder.write_all(&content).map_err(|e| e.to_string())?;
            encoder.finish().map_err(|e| e.to_string())?;
        }
        None => fs::write(&dest, &content).map_err(|e| e.to_string())?,
    }

    Ok(ManifestEntry {
        path: rel.to_path_buf(),
        size: content.len() as u64,
        sha256,
        compressed: compression_level.is_some(),
    })
}
