//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use url::Url;

/// Copy custom emoji between two team workspaces.
///
/// Porter logs in to the workspaces as a member, lists both emoji
/// collections, and re-uploads what the destination is missing.
#[derive(Parser, Debug)]
#[command(name = "porter")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a config file (defaults to ~/.config/emoji-porter/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the upstream web API base URL
    #[arg(long, global = true)]
    pub api_base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Porter subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List source emoji the destination does not have
    List(ListArgs),
    /// Upload a single emoji into the destination
    Transfer(TransferArgs),
    /// List missing emoji, then upload each one
    Port(ListArgs),
}

/// How to reach the source workspace.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Source workspace URL (e.g. https://team.slack.com/)
    #[arg(long)]
    pub from_url: Url,

    /// API access token for the source workspace
    #[arg(long, conflicts_with_all = ["from_export", "from_email"])]
    pub from_token: Option<String>,

    /// File holding a saved emoji listing response for the source workspace
    #[arg(long, conflicts_with = "from_email")]
    pub from_export: Option<PathBuf>,

    /// Member email for the source workspace
    #[arg(long, requires = "from_password")]
    pub from_email: Option<String>,

    /// Member password for the source workspace
    #[arg(long, requires = "from_email")]
    pub from_password: Option<String>,
}

/// How to reach the destination workspace.
#[derive(Args, Debug)]
pub struct DestinationArgs {
    /// Destination workspace URL (e.g. https://other.slack.com/)
    #[arg(long)]
    pub to_url: Url,

    /// Member email for the destination workspace
    #[arg(long)]
    pub to_email: String,

    /// Member password for the destination workspace
    #[arg(long)]
    pub to_password: String,

    /// API access token for the destination workspace (skips token provisioning)
    #[arg(long)]
    pub to_token: Option<String>,
}

/// Arguments for `list` and `port`.
#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub destination: DestinationArgs,
}

/// Arguments for `transfer`.
#[derive(Args, Debug)]
pub struct TransferArgs {
    #[command(flatten)]
    pub destination: DestinationArgs,

    /// Emoji name to upload under
    #[arg(long)]
    pub name: String,

    /// URL of the emoji image
    #[arg(long)]
    pub image_url: Url,
}
