use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing::{error, info};

use sli_core::config::{self, Config};
use sli_core::{EvaluationReport, GetSliRequest};
use sli_provider::{FsResourceStore, GetSliHandler, HandlerError, SecretDirCredentials};
use sli_search::SplunkBackend;

/// Evaluate one get-sli request against Splunk and print the report.
#[derive(Parser, Debug)]
#[command(name = "sli-worker", about = "Retrieve SLI values from Splunk for one evaluation request")]
struct Args {
    /// Request JSON file, or `-` for stdin
    #[arg(long, default_value = "-")]
    request: String,

    /// Pretty-print the report
    #[arg(long)]
    pretty: bool,

    /// Root of the layered SLI configuration (overrides SLI_RESOURCE_DIR)
    #[arg(long)]
    resource_dir: Option<PathBuf>,

    /// Directory of mounted credential secrets (overrides SLI_SECRETS_DIR)
    #[arg(long)]
    secrets_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    config::load_dotenv();
    let args = Args::parse();

    let mut config = Config::from_env();
    if let Some(dir) = args.resource_dir {
        config.resources.resource_dir = dir;
    }
    if let Some(dir) = args.secrets_dir {
        config.resources.secrets_dir = dir;
    }
    config.log_summary();

    let payload = read_request(&args.request).await?;
    let request: GetSliRequest = serde_json::from_str(&payload).context("failed to decode get-sli request")?;

    let store = Arc::new(FsResourceStore::new(
        config.resources.resource_dir.clone(),
        config.resources.resource_uri.clone(),
    ));
    let credentials = Arc::new(SecretDirCredentials::new(config.resources.secrets_dir.clone()));
    let backend = Arc::new(SplunkBackend::new(&config.splunk).context("failed to build Splunk client")?);
    let handler = GetSliHandler::from_config(&config, store, credentials, backend);

    let (report, outcome) = match handler.handle(&request).await {
        Ok(report) => (report, Ok(())),
        Err(HandlerError::Config { project, source }) => {
            error!(project = %project, error = %source, "Evaluation aborted");
            let message = format!("unable to retrieve custom queries for project {project}: {source}");
            (
                EvaluationReport::errored(&request, message.clone()),
                Err(anyhow::anyhow!(message)),
            )
        }
        Err(e) => return Err(e.into()),
    };

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");

    info!(result = %report.result, status = %report.status, "Report written");
    outcome
}

async fn read_request(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("failed to read request from stdin")?;
        Ok(buf)
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("failed to read request file {source}"))
    }
}
