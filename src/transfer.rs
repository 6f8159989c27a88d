//! Uploading one emoji into a destination workspace.
//!
//! The destination's upload form is scraped once for its crumb
//! ([`prepare_upload`]); [`transfer_one`] then replays the form submission,
//! piping the image from its source URL straight into the multipart body.

use futures_util::TryStreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use tracing::{debug, info, instrument, trace};
use url::Url;

use crate::error::{PipelineError, Stage};
use crate::inventory::InventoryItem;
use crate::scrape::form_inputs;
use crate::session::SessionContext;

/// Page hosting the emoji upload form.
pub const UPLOAD_FORM_PATH: &str = "/admin/emoji";

/// Id of the upload form on [`UPLOAD_FORM_PATH`].
pub const UPLOAD_FORM_ID: &str = "addemoji";

/// Endpoint the upload form posts to.
pub const UPLOAD_PATH: &str = "/customize/emoji";

/// One upload attempt: an authenticated destination and the item to copy.
///
/// Built once and consumed by [`transfer_one`]; it is never retried.
#[derive(Debug)]
pub struct TransferRequest {
    destination: SessionContext,
    item: InventoryItem,
}

impl TransferRequest {
    /// Pairs a prepared destination context with the item to upload.
    #[must_use]
    pub fn new(destination: SessionContext, item: InventoryItem) -> Self {
        Self { destination, item }
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Name the emoji was uploaded under.
    pub name: String,
    /// Status code of the upload response.
    pub status: u16,
}

/// Scrapes the upload crumb from the destination's upload form.
///
/// # Errors
///
/// - [`PipelineError::MissingPrecondition`] without session cookies
/// - [`PipelineError::Scrape`] if the form or its crumb is missing
/// - [`PipelineError::UpstreamRejected`] for an error status
/// - [`PipelineError::Network`] on transport failures
#[instrument(skip(ctx), fields(correlation_id = %ctx.correlation_id(), url = %ctx.endpoint()))]
pub async fn prepare_upload(mut ctx: SessionContext) -> Result<SessionContext, PipelineError> {
    let url = ctx.workspace_url(UPLOAD_FORM_PATH);
    ctx.require_session_cookies(Stage::UploadForm, &url)?;

    debug!(url = %url, "Fetching upload form");
    let response = ctx
        .client()
        .get(&url)
        .send()
        .await
        .map_err(|e| PipelineError::network(Stage::UploadForm, &url, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::http_status(
            Stage::UploadForm,
            url,
            status.as_u16(),
        ));
    }
    let html = response
        .text()
        .await
        .map_err(|e| PipelineError::network(Stage::UploadForm, &url, e))?;

    let crumb = form_inputs(&html, UPLOAD_FORM_ID)
        .and_then(|mut inputs| inputs.remove("crumb"))
        .filter(|crumb| !crumb.is_empty())
        .ok_or_else(|| PipelineError::scrape(Stage::UploadForm, &url, "upload form crumb"))?;

    ctx.upload_crumb = Some(crumb);
    Ok(ctx)
}

/// Uploads one emoji, streaming its image from the source URL.
///
/// Whether the name already exists at the destination is not checked here;
/// callers diff the inventories first.
///
/// # Errors
///
/// - [`PipelineError::MissingPrecondition`] without session cookies or an
///   upload crumb; no request is issued in that case
/// - [`PipelineError::UpstreamRejected`] if the image fetch or the upload
///   answers an error status, or the upload response body is empty
/// - [`PipelineError::Network`] on transport failures
#[instrument(
    skip(request),
    fields(
        correlation_id = %request.destination.correlation_id(),
        url = %request.destination.endpoint(),
        emoji = %request.item.name,
    )
)]
pub async fn transfer_one(request: TransferRequest) -> Result<TransferOutcome, PipelineError> {
    let TransferRequest { destination, item } = request;
    let upload_url = destination.workspace_url(UPLOAD_PATH);

    let crumb = destination.upload_crumb.clone().ok_or_else(|| {
        PipelineError::missing_precondition(Stage::Upload, &upload_url, "upload crumb")
    })?;
    destination.require_session_cookies(Stage::Upload, &upload_url)?;

    let image_part = open_image_stream(&destination, &item).await?;
    let form = Form::new()
        .text("add", "1")
        .text("crumb", crumb)
        .text("name", item.name.clone())
        .text("mode", "data")
        .part("img", image_part);

    debug!(url = %upload_url, "Uploading emoji");
    let response = destination
        .client()
        .post(&upload_url)
        .multipart(form)
        .send()
        .await
        .map_err(|e| PipelineError::network(Stage::Upload, &upload_url, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::http_status(
            Stage::Upload,
            upload_url,
            status.as_u16(),
        ));
    }
    let body = response
        .text()
        .await
        .map_err(|e| PipelineError::network(Stage::Upload, &upload_url, e))?;
    if body.trim().is_empty() {
        return Err(PipelineError::rejected(
            Stage::Upload,
            upload_url,
            "empty response body",
        ));
    }

    info!(emoji = %item.name, "Emoji uploaded");
    Ok(TransferOutcome {
        name: item.name,
        status: status.as_u16(),
    })
}

/// Starts the image download and wraps its body stream as a multipart part.
///
/// The fetch goes through a cookie-less client: the image lives on the
/// source side and must never see the destination's session.
async fn open_image_stream(
    destination: &SessionContext,
    item: &InventoryItem,
) -> Result<Part, PipelineError> {
    let source_url = item.source_url.as_str();
    let client = destination.detached_client(source_url)?;

    debug!(url = %source_url, "Fetching emoji image");
    let response = client
        .get(source_url)
        .send()
        .await
        .map_err(|e| PipelineError::network(Stage::ImageFetch, source_url, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::http_status(
            Stage::ImageFetch,
            source_url,
            status.as_u16(),
        ));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let file_name = image_file_name(source_url, &item.name);

    let chunks = response
        .bytes_stream()
        .inspect_ok(|chunk| trace!(bytes = chunk.len(), "Image chunk forwarded"));
    let body = reqwest::Body::wrap_stream(chunks);
    let part = Part::stream(body).file_name(file_name);
    match content_type {
        Some(content_type) => part.mime_str(&content_type).map_err(|_| {
            PipelineError::rejected(
                Stage::ImageFetch,
                source_url,
                format!("invalid content type '{content_type}'"),
            )
        }),
        None => Ok(part),
    }
}

/// File name for the uploaded part: the last URL path segment, or the emoji
/// name when the URL has none.
fn image_file_name(source_url: &str, emoji_name: &str) -> String {
    Url::parse(source_url)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|segment| !segment.is_empty())
        .unwrap_or_else(|| emoji_name.trim_matches(':').to_string())
}
