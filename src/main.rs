//! CLI entry point for the emoji porter.

use std::fs;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use porter_core::{
    Credentials, FailureKind, Inventory, InventoryItem, PipelineError, SessionSettings, Stage,
    Workspace, WorkspaceAccess, WorkspaceError, list_missing, transfer_item,
};
use tracing::{debug, error, info, warn};
use url::Url;

mod app_config;
mod cli;

use app_config::FileConfig;
use cli::{Cli, Command, DestinationArgs, ListArgs, SourceArgs, TransferArgs};

/// Process exit outcome, mapped onto the exit code contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    Success,
    NotFound,
    Unauthorized,
    Failure,
}

impl ProcessExit {
    fn from_kind(kind: FailureKind) -> Self {
        match kind {
            FailureKind::NotFound => Self::NotFound,
            FailureKind::Unauthorized => Self::Unauthorized,
            FailureKind::ScrapeFailure
            | FailureKind::NetworkFailure
            | FailureKind::UpstreamRejected => Self::Failure,
        }
    }

    fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::NotFound => 2,
            Self::Unauthorized => 3,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    let config = match app_config::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            init_tracing(&cli, &FileConfig::default());
            error!("{err:#}");
            return ExitCode::from(ProcessExit::Failure.code());
        }
    };
    init_tracing(&cli, &config);
    debug!(?config, "Configuration loaded");

    let exit = match run(cli, &config).await {
        Ok(exit) => exit,
        Err(err) => {
            error!("{err:#}");
            if failed_stage(&err).is_some_and(Stage::is_authentication) {
                info!("Check the workspace URL and the member email and password");
            }
            exit_for_error(&err)
        }
    };
    ExitCode::from(exit.code())
}

/// Priority: `RUST_LOG` > quiet flag > verbose flag > config verbosity > info.
fn init_tracing(cli: &Cli, config: &FileConfig) {
    let default_level = resolve_default_log_level(cli, config);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_default_log_level(cli: &Cli, config: &FileConfig) -> &'static str {
    if cli.quiet {
        return "error";
    }
    match cli.verbose {
        0 => config.verbosity.map_or("info", |verbosity| verbosity.filter()),
        1 => "debug",
        _ => "trace",
    }
}

fn failed_stage(err: &anyhow::Error) -> Option<Stage> {
    if let Some(workspace_err) = err.downcast_ref::<WorkspaceError>() {
        return Some(workspace_err.stage());
    }
    err.downcast_ref::<PipelineError>().map(PipelineError::stage)
}

fn exit_for_error(err: &anyhow::Error) -> ProcessExit {
    if let Some(workspace_err) = err.downcast_ref::<WorkspaceError>() {
        return ProcessExit::from_kind(workspace_err.kind());
    }
    if let Some(pipeline_err) = err.downcast_ref::<PipelineError>() {
        return ProcessExit::from_kind(pipeline_err.kind());
    }
    ProcessExit::Failure
}

async fn run(cli: Cli, config: &FileConfig) -> Result<ProcessExit> {
    let mut settings = config.session_settings();
    if let Some(api_base_url) = cli.api_base_url {
        settings.api_base_url = api_base_url;
    }

    match cli.command {
        Command::List(args) => run_list(args, &settings).await,
        Command::Transfer(args) => run_transfer(args, &settings).await,
        Command::Port(args) => run_port(args, &settings).await,
    }
}

async fn run_list(args: ListArgs, settings: &SessionSettings) -> Result<ProcessExit> {
    let source = source_workspace(args.source)?;
    let destination = destination_workspace(args.destination)?;

    let missing = list_missing(&source, &destination, settings).await?;
    info!(missing = missing.len(), "Listing complete");
    println!("{}", serde_json::to_string_pretty(&missing)?);
    Ok(ProcessExit::Success)
}

async fn run_transfer(args: TransferArgs, settings: &SessionSettings) -> Result<ProcessExit> {
    let destination = destination_workspace(args.destination)?;
    let item = InventoryItem::new(args.name, args.image_url.as_str());

    let outcome = transfer_item(&destination, item, settings).await?;
    info!(emoji = %outcome.name, status = outcome.status, "Transfer complete");
    Ok(ProcessExit::Success)
}

async fn run_port(args: ListArgs, settings: &SessionSettings) -> Result<ProcessExit> {
    let source = source_workspace(args.source)?;
    let destination = destination_workspace(args.destination)?;

    let missing = list_missing(&source, &destination, settings).await?;
    if missing.is_empty() {
        info!("Destination already has every source emoji");
        return Ok(ProcessExit::Success);
    }
    port_missing(&destination, missing, settings).await
}

/// Uploads each missing item in turn; one failure does not stop the rest.
async fn port_missing(
    destination: &Workspace,
    missing: Inventory,
    settings: &SessionSettings,
) -> Result<ProcessExit> {
    let total = missing.len();
    let progress = ProgressBar::new(u64::try_from(total).unwrap_or(u64::MAX));
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{pos}/{len}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    progress.enable_steady_tick(Duration::from_millis(100));

    let mut completed = 0_usize;
    let mut last_failure: Option<FailureKind> = None;
    for item in missing.items() {
        progress.set_message(format!("Uploading {}", item.name));
        let name = item.name.clone();
        match transfer_item(destination, item, settings).await {
            Ok(_) => completed += 1,
            Err(err) => {
                warn!(emoji = %name, kind = %err.kind(), error = %err, "Emoji transfer failed");
                last_failure = Some(err.kind());
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    info!(
        completed,
        failed = total - completed,
        total,
        "Port complete"
    );
    Ok(last_failure.map_or(ProcessExit::Success, ProcessExit::from_kind))
}

fn source_workspace(args: SourceArgs) -> Result<Workspace> {
    let url = validate_workspace_url(args.from_url)?;
    let access = if let Some(token) = args.from_token {
        WorkspaceAccess::Token(token)
    } else if let Some(path) = args.from_export {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read export file '{}'", path.display()))?;
        WorkspaceAccess::Export(raw)
    } else if let (Some(email), Some(password)) = (args.from_email, args.from_password) {
        WorkspaceAccess::Credentials {
            credentials: Credentials::new(email, password),
            token: None,
        }
    } else {
        bail!("Source workspace needs one of --from-token, --from-export or --from-email");
    };
    Ok(Workspace::new(url, access))
}

fn destination_workspace(args: DestinationArgs) -> Result<Workspace> {
    let url = validate_workspace_url(args.to_url)?;
    Ok(Workspace::new(
        url,
        WorkspaceAccess::Credentials {
            credentials: Credentials::new(args.to_email, args.to_password),
            token: args.to_token,
        },
    ))
}

fn validate_workspace_url(url: Url) -> Result<Url> {
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        bail!("Workspace URL must be an http(s) URL with a host: {url}");
    }
    Ok(url)
}
