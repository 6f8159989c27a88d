//! Emoji Porter Core Library
//!
//! This library copies custom emoji from one team workspace to another by
//! replaying the upstream service's own browser workflows: it logs in as a
//! member, scrapes the anti-forgery state each page hands out, lists both
//! workspaces' emoji, and re-uploads whatever the destination is missing.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`session`] - Per-run session context (cookie jar, scraped fields)
//! - [`auth`] - Login and access-token provisioning
//! - [`inventory`] - Emoji listing, alias normalization and diffing
//! - [`transfer`] - Upload-form scraping and streamed single-emoji upload
//! - [`pipeline`] - Concurrent listing join and per-item transfer pipelines
//! - [`scrape`] - Regex-based HTML field extraction
//! - [`error`] - Failure taxonomy shared by every stage
//!
//! Each stage takes the [`SessionContext`] by value and returns it, filled in,
//! or a [`PipelineError`] naming the stage and endpoint that failed.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod error;
pub mod inventory;
pub mod pipeline;
pub mod scrape;
pub mod session;
pub mod transfer;
mod user_agent;

// Re-export commonly used types
pub use auth::{authenticate, provision_token};
pub use error::{FailureKind, PipelineError, Stage};
pub use inventory::{Inventory, InventoryItem, diff, fetch_inventory};
pub use pipeline::{
    WorkspaceError, WorkspaceRole, inventory_pipeline, list_missing, transfer_item,
};
pub use session::{Credentials, SessionContext, SessionSettings, Workspace, WorkspaceAccess};
pub use transfer::{TransferOutcome, TransferRequest, prepare_upload, transfer_one};
