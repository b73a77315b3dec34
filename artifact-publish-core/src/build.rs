use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::contract::{BuildError, BuildInvoker};

/// Build configuration - which executable to run and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub executable: String,
    /// Parent directory for the per-commit output directory. Defaults to the system temp dir.
    pub work_dir: Option<PathBuf>,
    /// Working directory of the build process (the Maven project root).
    pub project_dir: Option<PathBuf>,
    /// Options placed before any options given on the command line.
    pub options: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            executable: "mvn".to_string(),
            work_dir: None,
            project_dir: None,
            options: Vec::new(),
        }
    }
}

/// Splits a free-form, possibly multi-line option input into one option per line.
///
/// Lines are trimmed and blank ones dropped; nothing is split on inner whitespace, so
/// `-Dmsg="a b"` survives intact.
pub fn parse_option_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// `local::default::file://<dir>`, the alternate deployment repository Maven deploys into.
pub fn local_repository_url(output_dir: &Path) -> String {
    format!("local::default::file://{}", output_dir.display())
}

/// Full argument list for `mvn deploy` into `output_dir`.
pub fn maven_args(output_dir: &Path, extra_options: &[String]) -> Vec<String> {
    let repo = local_repository_url(output_dir);
    let mut args = vec!["-B".to_string()];
    args.extend(
        extra_options
            .iter()
            .filter(|o| !o.trim().is_empty())
            .cloned(),
    );
    args.push("-DskipTests".to_string());
    args.push(format!("-DaltDeploymentRepository={repo}"));
    args.push(format!("-DaltReleaseDeploymentRepository={repo}"));
    args.push("deploy".to_string());
    args
}

/// Runs `mvn deploy` with the output redirected to a local file repository.
pub struct MavenInvoker {
    config: BuildConfig,
}

impl MavenInvoker {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BuildInvoker for MavenInvoker {
    async fn run(&self, output_dir: &Path, extra_options: &[String]) -> Result<i32, BuildError> {
        let program = &self.config.executable;
        let mut options = self.config.options.clone();
        options.extend(extra_options.iter().cloned());
        let args = maven_args(output_dir, &options);

        info!(program = %program, args = ?args, "Running maven deploy");

        let mut command = Command::new(program);
        command.args(&args);
        if let Some(dir) = &self.config.project_dir {
            command.current_dir(dir);
        }

        let status = command.status().await.map_err(|e| {
            error!(error = ?e, program = %program, "Failed to launch build process");
            BuildError::Spawn {
                program: program.clone(),
                source: e,
            }
        })?;

        match status.code() {
            Some(code) => {
                info!(code, "Build process exited");
                Ok(code)
            }
            None => {
                warn!(status = ?status, "Build process terminated by signal");
                Ok(-1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_list_drops_blank_lines_and_keeps_quotes() {
        let raw = "\n  -Pci  \n\n-Dmsg=\"a b\"\n   \n";
        assert_eq!(parse_option_list(raw), vec!["-Pci", "-Dmsg=\"a b\""]);
    }

    #[test]
    fn empty_option_input_is_empty_list() {
        assert!(parse_option_list("").is_empty());
        assert!(parse_option_list(" \n\t\n").is_empty());
    }

    #[test]
    fn maven_args_point_both_deployment_repos_at_output_dir() {
        let args = maven_args(Path::new("/tmp/out"), &["-Pci".to_string()]);
        assert_eq!(
            args,
            vec![
                "-B",
                "-Pci",
                "-DskipTests",
                "-DaltDeploymentRepository=local::default::file:///tmp/out",
                "-DaltReleaseDeploymentRepository=local::default::file:///tmp/out",
                "deploy",
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reports_exit_code_of_the_executable() {
        let invoker = MavenInvoker::new(BuildConfig {
            executable: "false".to_string(),
            ..Default::default()
        });
        let code = invoker.run(Path::new("/tmp"), &[]).await.unwrap();
        assert_ne!(code, 0);
    }

    #[tokio::test]
    async fn missing_executable_is_a_spawn_error() {
        let invoker = MavenInvoker::new(BuildConfig {
            executable: "definitely-not-a-build-tool-xyz".to_string(),
            ..Default::default()
        });
        let err = invoker.run(Path::new("/tmp"), &[]).await.unwrap_err();
        assert!(matches!(err, BuildError::Spawn { .. }));
    }
}
