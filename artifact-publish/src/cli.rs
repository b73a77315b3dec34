///
/// This module implements the CLI interface for artifact-publish: command parsing, merging
/// flags over the config file, choosing the artifact store and reporting the step outcome.
///
/// All core logic (walking, naming, the publish pipeline) lives in the
/// [`artifact-publish-core`] crate. This module is strictly CLI glue.
///
/// ## How To Use
/// - In a workflow step: `artifact-publish publish`, with `maven-options` passed through the
///   `INPUT_MAVEN-OPTIONS` variable the runner sets for action inputs.
/// - Locally: `artifact-publish publish --store-dir ./artifacts` writes the bundle to disk
///   instead of the Actions artifact service.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`artifact-publish-core`]: ../../artifact-publish-core/
use crate::load_config::load_config;
use crate::outcome::GithubStepReporter;
use crate::upload::ActionsArtifactClient;
use anyhow::Result;
use artifact_publish_core::build::{parse_option_list, MavenInvoker};
use artifact_publish_core::config::{PublishConfig, StoreConfig};
use artifact_publish_core::context::CiContext;
use artifact_publish_core::contract::{ArtifactStore, StepReporter};
use artifact_publish_core::local_store::LocalArtifactStore;
use artifact_publish_core::naming::build_name;
use artifact_publish_core::publish::{publish, report_outcome, PublishReport, PublishRequest};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// CLI for artifact-publish: build with Maven and publish the output as a workflow artifact.
#[derive(Parser)]
#[clap(
    name = "artifact-publish",
    version,
    about = "Run a Maven deploy into a local directory and upload the result as a workflow-run artifact"
)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[clap(long, global = true, default_value = "info", env = "ARTIFACT_PUBLISH_LOG_LEVEL")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[clap(long, global = true)]
    pub log_json: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build, collect the output files and upload them as one artifact
    Publish(PublishArgs),

    /// Print the artifact name for a repository, commit and ref
    Name {
        #[clap(long)]
        repo: String,
        #[clap(long)]
        sha: String,
        /// refs/heads/<branch> or refs/tags/<tag>
        #[clap(long)]
        git_ref: String,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct PublishArgs {
    /// Path to the YAML config file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Extra Maven options, one per line; blank lines are ignored
    #[clap(long, env = "INPUT_MAVEN-OPTIONS")]
    pub maven_options: Option<String>,

    /// Parent directory for the build output directory
    #[clap(long)]
    pub work_dir: Option<PathBuf>,

    /// Store the artifact in this directory instead of the Actions artifact service
    #[clap(long)]
    pub store_dir: Option<PathBuf>,

    /// Compression level for uploaded files (0-9)
    #[clap(long, value_parser = clap::value_parser!(u32).range(0..=9))]
    pub compression_level: Option<u32>,

    /// Keep uploading remaining files after one fails (the step still fails)
    #[clap(long)]
    pub continue_on_error: bool,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Publish(args) => {
            let reporter = GithubStepReporter::from_env();
            let report = publish_command(&args, &reporter).await?;
            tracing::info!(command = "publish", ?report, "Publish complete");
            Ok(())
        }
        Commands::Name { repo, sha, git_ref } => {
            let name = build_name(&repo, &sha, &git_ref)?;
            println!("{name}");
            Ok(())
        }
    }
}

/// Runs one publish and reports the outcome through `reporter`.
pub async fn publish_command<R>(args: &PublishArgs, reporter: &R) -> Result<PublishReport>
where
    R: StepReporter + ?Sized,
{
    let (config, request, store) = match prepare(args) {
        Ok(prepared) => prepared,
        Err(e) => {
            tracing::error!(error = %e, "Publish setup failed");
            reporter.set_failed(&format!("{e:#}"));
            return Err(e);
        }
    };

    let invoker = MavenInvoker::new(config.build.clone());
    let outcome = publish(&request, &invoker, store.as_ref()).await;
    Ok(report_outcome(outcome, reporter)?)
}

type Prepared = (PublishConfig, PublishRequest, Box<dyn ArtifactStore>);

fn prepare(args: &PublishArgs) -> Result<Prepared> {
    let config = resolve_config(args)?;
    let context = CiContext::from_env()?;
    let request = PublishRequest {
        context,
        work_dir: config
            .build
            .work_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir),
        extra_options: parse_option_list(args.maven_options.as_deref().unwrap_or("")),
        upload: config.upload.clone(),
    };
    let store = make_store(&config.store)?;
    Ok((config, request, store))
}

/// Loads the config file (if any) and applies command-line overrides.
pub fn resolve_config(args: &PublishArgs) -> Result<PublishConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => PublishConfig::default(),
    };
    if let Some(level) = args.compression_level {
        config.upload.compression_level = Some(level);
    }
    if args.continue_on_error {
        config.upload.continue_on_error = true;
    }
    if let Some(dir) = &args.work_dir {
        config.build.work_dir = Some(dir.clone());
    }
    if let Some(dir) = &args.store_dir {
        config.store = StoreConfig::Local { dir: dir.clone() };
    }
    Ok(config)
}

fn make_store(store: &StoreConfig) -> Result<Box<dyn ArtifactStore>> {
    match store {
        StoreConfig::Actions => {
            let client = ActionsArtifactClient::new_from_env()
                .map_err(|e| anyhow::anyhow!("Failed to construct artifact client: {e}"))?;
            Ok(Box::new(client))
        }
        StoreConfig::Local { dir } => {
            tracing::info!(dir = %dir.display(), "Using local artifact store");
            Ok(Box::new(LocalArtifactStore::new(dir.clone())))
        }
    }
}
