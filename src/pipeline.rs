//! End-to-end pipelines composed from the individual stages.
//!
//! [`list_missing`] runs one inventory pipeline per workspace concurrently and
//! diffs the results. [`transfer_item`] runs one login-and-upload pipeline for
//! a single emoji. Every run builds its own [`SessionContext`]; nothing is
//! pooled or shared between runs.

use std::fmt;

use thiserror::Error;
use tracing::{Instrument, info, info_span, instrument};

use crate::auth::{authenticate, provision_token};
use crate::error::{FailureKind, PipelineError, Stage};
use crate::inventory::{Inventory, InventoryItem, diff, fetch_inventory};
use crate::session::{SessionContext, SessionSettings, Workspace, WorkspaceAccess};
use crate::transfer::{TransferOutcome, TransferRequest, prepare_upload, transfer_one};

/// Which side of a port a workspace is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkspaceRole {
    /// The workspace emoji are copied from.
    Source,
    /// The workspace emoji are copied to.
    Destination,
}

impl WorkspaceRole {
    /// Stable label used in logs and messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Destination => "destination",
        }
    }
}

impl fmt::Display for WorkspaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage failure attributed to the workspace pipeline that produced it.
#[derive(Debug, Error)]
#[error("{role} workspace: {error}")]
pub struct WorkspaceError {
    /// The pipeline that failed first.
    pub role: WorkspaceRole,
    /// The unchanged stage failure.
    #[source]
    pub error: PipelineError,
}

impl WorkspaceError {
    /// Failure classification of the underlying stage error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        self.error.kind()
    }

    /// Endpoint URL of the underlying stage error.
    #[must_use]
    pub fn url(&self) -> &str {
        self.error.url()
    }

    /// Stage of the underlying stage error.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.error.stage()
    }
}

/// Fetches one workspace's inventory according to its access mode.
///
/// - `Export`: the pasted document is parsed, no network
/// - `Token`: the listing is called directly, no login
/// - `Credentials`: login, token provisioning (unless a token was supplied),
///   then the listing
///
/// # Errors
///
/// Returns the first stage failure unchanged.
pub async fn inventory_pipeline(
    workspace: &Workspace,
    settings: &SessionSettings,
) -> Result<Inventory, PipelineError> {
    match &workspace.access {
        WorkspaceAccess::Export(raw) => Inventory::from_export(raw),
        WorkspaceAccess::Token(_) => {
            let ctx = SessionContext::for_workspace(workspace, settings)?;
            let (_, inventory) = fetch_inventory(ctx).await?;
            Ok(inventory)
        }
        WorkspaceAccess::Credentials { .. } => {
            let ctx = SessionContext::for_workspace(workspace, settings)?;
            let ctx = authenticate(ctx).await?;
            let ctx = provision_token(ctx).await?;
            let (_, inventory) = fetch_inventory(ctx).await?;
            Ok(inventory)
        }
    }
}

async fn attributed_inventory(
    role: WorkspaceRole,
    workspace: &Workspace,
    settings: &SessionSettings,
) -> Result<Inventory, WorkspaceError> {
    let span = info_span!("inventory_pipeline", role = %role, url = %workspace.url);
    inventory_pipeline(workspace, settings)
        .instrument(span)
        .await
        .map_err(|error| WorkspaceError { role, error })
}

/// Lists the source emoji that the destination does not have yet.
///
/// Both inventory pipelines run concurrently. If either fails, the other is
/// cancelled and the first failure is returned with the role of the pipeline
/// that produced it.
///
/// # Errors
///
/// Returns [`WorkspaceError`] wrapping the first stage failure.
#[instrument(skip_all, fields(source = %source.url, destination = %destination.url))]
pub async fn list_missing(
    source: &Workspace,
    destination: &Workspace,
    settings: &SessionSettings,
) -> Result<Inventory, WorkspaceError> {
    let (source_inventory, destination_inventory) = tokio::try_join!(
        attributed_inventory(WorkspaceRole::Source, source, settings),
        attributed_inventory(WorkspaceRole::Destination, destination, settings),
    )?;

    let missing = diff(&source_inventory, &destination_inventory);
    info!(
        source_items = source_inventory.len(),
        destination_items = destination_inventory.len(),
        missing = missing.len(),
        "Computed missing emoji"
    );
    Ok(missing)
}

/// Copies one emoji into the destination with a fresh login.
///
/// # Errors
///
/// Returns the first stage failure unchanged. A destination without
/// credentials fails with a precondition error before any request.
#[instrument(skip_all, fields(destination = %destination.url, emoji = %item.name))]
pub async fn transfer_item(
    destination: &Workspace,
    item: InventoryItem,
    settings: &SessionSettings,
) -> Result<TransferOutcome, PipelineError> {
    let ctx = SessionContext::for_workspace(destination, settings)?;
    let ctx = authenticate(ctx).await?;
    let ctx = prepare_upload(ctx).await?;
    transfer_one(TransferRequest::new(ctx, item)).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use url::Url;

    use super::*;

    fn export_workspace(raw: &str) -> Workspace {
        Workspace::new(
            Url::parse("https://export.slack.com/").unwrap(),
            WorkspaceAccess::Export(raw.to_string()),
        )
    }

    #[tokio::test]
    async fn test_list_missing_from_two_exports() {
        let source = export_workspace(
            r#"{"ok":true,"emoji":{":dog:":"u1",":cat:":"u2",":x:":"alias:cat"}}"#,
        );
        let destination = export_workspace(r#"{"ok":true,"emoji":{":cat:":"u2"}}"#);

        let missing = list_missing(&source, &destination, &SessionSettings::default())
            .await
            .unwrap();
        assert_eq!(missing, Inventory::from_entries([(":dog:", "u1")]));
    }

    #[tokio::test]
    async fn test_list_missing_attributes_failure_to_role() {
        let source = export_workspace(r#"{"ok":true,"emoji":{}}"#);
        let destination = export_workspace(r#"{"ok":false,"error":"not_authed"}"#);

        let error = list_missing(&source, &destination, &SessionSettings::default())
            .await
            .unwrap_err();
        assert_eq!(error.role, WorkspaceRole::Destination);
        assert_eq!(error.kind(), FailureKind::UpstreamRejected);
        assert_eq!(error.stage(), Stage::Inventory);
        assert!(error.to_string().starts_with("destination workspace:"));
    }

    #[test]
    fn test_transfer_item_without_credentials_fails_before_any_request() {
        let destination = Workspace::new(
            Url::parse("https://unreachable.invalid/").unwrap(),
            WorkspaceAccess::Token("xoxs-1-2-3-4".to_string()),
        );
        let error = tokio_test::block_on(transfer_item(
            &destination,
            InventoryItem::new("dog", "https://unreachable.invalid/dog.png"),
            &SessionSettings::default(),
        ))
        .unwrap_err();
        assert!(matches!(error, PipelineError::MissingPrecondition { .. }));
        assert_eq!(error.stage(), Stage::LoginPage);
    }
}
