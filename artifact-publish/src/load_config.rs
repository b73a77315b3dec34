/// `load_config` module: loads the optional YAML configuration file into a [`PublishConfig`].
///
/// This module is the only place where user-supplied YAML is parsed and validated.
///
/// # Responsibilities
/// - Parse the config file into the strongly-typed core config (missing sections take their
///   defaults: `mvn`, strict uploads, the Actions artifact store)
/// - Reject values the core would otherwise have to clamp (compression levels above 9)
/// - Produce clear diagnostics naming the file on any failure
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use artifact_publish_core::config::PublishConfig;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const MAX_COMPRESSION_LEVEL: u32 = 9;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PublishConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: PublishConfig = if config_content.trim().is_empty() {
        PublishConfig::default()
    } else {
        match serde_yaml::from_str(&config_content) {
            Ok(conf) => {
                info!(config_path = ?path_ref, "Parsed config YAML successfully");
                conf
            }
            Err(e) => {
                error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
                return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
            }
        }
    };

    validate(&config)?;
    config.trace_loaded();
    Ok(config)
}

pub fn validate(config: &PublishConfig) -> Result<()> {
    if let Some(level) = config.upload.compression_level {
        if level > MAX_COMPRESSION_LEVEL {
            error!(level, "compression_level out of range");
            anyhow::bail!(
                "upload.compression_level must be between 0 and {MAX_COMPRESSION_LEVEL}, got {level}"
            );
        }
    }
    if config.build.executable.trim().is_empty() {
        anyhow::bail!("build.executable must not be empty");
    }
    Ok(())
}
