//! Step outcome reporting through GitHub Actions workflow commands.
//!
//! Outputs go to the `$GITHUB_OUTPUT` file when the runner provides one, otherwise to the
//! legacy `::set-output` command on stdout. Failures are printed as `::error::` annotations.

use std::env;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

use artifact_publish_core::contract::StepReporter;

pub struct GithubStepReporter {
    output_file: Option<PathBuf>,
}

impl GithubStepReporter {
    pub fn new(output_file: Option<PathBuf>) -> Self {
        Self { output_file }
    }

    pub fn from_env() -> Self {
        let output_file = env::var_os("GITHUB_OUTPUT")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::new(output_file)
    }
}

impl StepReporter for GithubStepReporter {
    fn set_output(&self, name: &str, value: &str) -> io::Result<()> {
        match &self.output_file {
            Some(path) => {
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                file.write_all(output_file_entry(name, value).as_bytes())?;
                tracing::info!(name, value, path = %path.display(), "Set step output");
            }
            None => {
                println!("::set-output name={}::{}", name, escape_data(value));
                tracing::info!(name, value, "Set step output via workflow command");
            }
        }
        Ok(())
    }

    fn set_failed(&self, message: &str) {
        tracing::error!(message, "Step failed");
        println!("::error::{}", escape_data(message));
    }
}

/// `name=value`, or a heredoc block for values spanning lines.
pub fn output_file_entry(name: &str, value: &str) -> String {
    if value.contains('\n') || value.contains('\r') {
        let delimiter = format!("ghadelimiter_{}", uuid::Uuid::new_v4());
        format!("{name}<<{delimiter}\n{value}\n{delimiter}\n")
    } else {
        format!("{name}={value}\n")
    }
}

/// Escapes a workflow command payload.
pub fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
