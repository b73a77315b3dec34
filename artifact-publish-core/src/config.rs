use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::build::BuildConfig;
use crate::contract::UploadOptions;

/// Where the artifact bundle goes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// The workflow-run artifact service of the CI runner.
    #[default]
    Actions,
    /// A directory on the local filesystem.
    Local { dir: PathBuf },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub build: BuildConfig,
    pub upload: UploadOptions,
    pub store: StoreConfig,
}

impl PublishConfig {
    pub fn trace_loaded(&self) {
        info!(
            executable = %self.build.executable,
            options = self.build.options.len(),
            continue_on_error = self.upload.continue_on_error,
            compression_level = ?self.upload.compression_level,
            store = ?self.store,
            "Loaded PublishConfig"
        );
        debug!(?self, "PublishConfig loaded (full debug)");
    }
}
