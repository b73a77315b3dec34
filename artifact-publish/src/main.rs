use anyhow::Result;
use artifact_publish::cli::{run, Cli};
use artifact_publish::logging::{init_logging, parse_level, LoggingConfig};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(LoggingConfig {
        level: parse_level(&cli.log_level),
        use_json: cli.log_json,
    });
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    let result = run(cli).await;
    match &result {
        Ok(_) => tracing::info!("CLI completed successfully"),
        Err(e) => tracing::error!(error = %e, "CLI exited with error"),
    }
    result
}
