//! Emoji inventories: fetching, normalizing and diffing.
//!
//! An [`Inventory`] maps emoji names to image URLs. Alias entries (values of
//! the form `alias:<other>`) are references to other entries rather than
//! images of their own, so they are dropped on the way in and never reach
//! callers.

mod diff;

pub use diff::diff;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{PipelineError, Stage};
use crate::session::SessionContext;

/// Prefix marking an entry as an alias of another emoji.
pub const ALIAS_PREFIX: &str = "alias:";

/// Web API method that lists a workspace's custom emoji.
pub const INVENTORY_METHOD: &str = "emoji.list";

/// Pseudo-URL reported for failures while reading a pasted export.
pub const EXPORT_URL: &str = "export:";

/// One transferable emoji.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Emoji name, unique within a workspace.
    pub name: String,
    /// URL of the emoji image.
    pub source_url: String,
}

impl InventoryItem {
    /// Creates an item.
    pub fn new(name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_url: source_url.into(),
        }
    }
}

/// A workspace's emoji, keyed by name, without aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Inventory {
    items: BTreeMap<String, String>,
}

/// Wire shape of the inventory-listing response.
#[derive(Debug, Deserialize)]
struct InventoryResponse {
    #[serde(default)]
    ok: bool,
    emoji: Option<BTreeMap<String, String>>,
    error: Option<String>,
}

impl Inventory {
    /// Builds an inventory from raw `name -> value` entries, dropping aliases.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let items = entries
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .filter(|(_, value)| !is_alias(value))
            .collect();
        Self { items }
    }

    /// Parses a pasted inventory-listing response document.
    ///
    /// The document must carry `ok: true` and an `emoji` mapping, exactly as
    /// a live listing would.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UpstreamRejected`] for anything else.
    pub fn from_export(raw: &str) -> Result<Self, PipelineError> {
        parse_response(raw, EXPORT_URL)
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the inventory holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether an item with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    /// Image URL of the named item.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.items.get(name).map(String::as_str)
    }

    /// Iterates `(name, source_url)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items
            .iter()
            .map(|(name, url)| (name.as_str(), url.as_str()))
    }

    /// The items as owned [`InventoryItem`]s, in name order.
    #[must_use]
    pub fn items(&self) -> Vec<InventoryItem> {
        self.iter()
            .map(|(name, url)| InventoryItem::new(name, url))
            .collect()
    }

    pub(crate) fn remove(&mut self, name: &str) {
        self.items.remove(name);
    }
}

/// Whether an inventory value denotes an alias rather than an image.
#[must_use]
pub fn is_alias(value: &str) -> bool {
    value.starts_with(ALIAS_PREFIX)
}

fn parse_response(raw: &str, url: &str) -> Result<Inventory, PipelineError> {
    let response: InventoryResponse = serde_json::from_str(raw).map_err(|e| {
        PipelineError::rejected(Stage::Inventory, url, format!("unparseable response: {e}"))
    })?;

    if !response.ok {
        let reason = response
            .error
            .map_or_else(|| "ok flag not set".to_string(), |error| format!("upstream error '{error}'"));
        return Err(PipelineError::rejected(Stage::Inventory, url, reason));
    }

    let emoji = response
        .emoji
        .ok_or_else(|| PipelineError::rejected(Stage::Inventory, url, "missing emoji mapping"))?;
    Ok(Inventory::from_entries(emoji))
}

/// An error status always fails the listing, even when the body claims
/// success; the upstream `error` string is kept when the body carries one.
fn rejected_status(body: &str, url: String, status: u16) -> PipelineError {
    let upstream = serde_json::from_str::<InventoryResponse>(body)
        .ok()
        .and_then(|response| response.error);
    let reason = match upstream {
        Some(error) => format!("HTTP {status}, upstream error '{error}'"),
        None => format!("HTTP {status}"),
    };
    PipelineError::rejected(Stage::Inventory, url, reason)
}

/// Lists the workspace's emoji with the context's access token.
///
/// The context is handed back alongside the inventory so later stages can
/// keep using the session.
///
/// # Errors
///
/// - [`PipelineError::MissingPrecondition`] without an access token
/// - [`PipelineError::UpstreamRejected`] unless the response parses and reports success
/// - [`PipelineError::Network`] on transport failures
#[instrument(skip(ctx), fields(correlation_id = %ctx.correlation_id(), url = %ctx.endpoint()))]
pub async fn fetch_inventory(
    ctx: SessionContext,
) -> Result<(SessionContext, Inventory), PipelineError> {
    let url = ctx.api_url(INVENTORY_METHOD);
    let token = ctx.access_token.as_deref().ok_or_else(|| {
        PipelineError::missing_precondition(Stage::Inventory, &url, "access token")
    })?;

    debug!(url = %url, "Fetching emoji inventory");
    let response = ctx
        .client()
        .post(&url)
        .form(&[("token", token)])
        .send()
        .await
        .map_err(|e| PipelineError::network(Stage::Inventory, &url, e))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| PipelineError::network(Stage::Inventory, &url, e))?;

    if !status.is_success() {
        return Err(rejected_status(&body, url, status.as_u16()));
    }
    let inventory = parse_response(&body, &url)?;

    info!(items = inventory.len(), "Fetched emoji inventory");
    Ok((ctx, inventory))
}
