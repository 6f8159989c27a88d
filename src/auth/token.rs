use tracing::{debug, info, instrument};

use crate::error::{PipelineError, Stage};
use crate::scrape::{find_access_token, find_crumb};
use crate::session::SessionContext;

/// Developer page that lists the member's access token when one exists.
pub const TOKEN_PAGE_PATH: &str = "/customize/legacy-tokens";

/// Endpoint that mints a token for the member when none exists yet.
pub const TOKEN_ISSUE_PATH: &str = "/api/legacy-tokens.issue";

/// Obtains an API access token for an authenticated session.
///
/// Does nothing when the context already holds a token. Otherwise the token
/// page is scraped for an embedded token; when none is shown, a new one is
/// requested with the page's crumb and the workspace id scraped at login.
///
/// # Errors
///
/// - [`PipelineError::MissingPrecondition`] without session cookies
/// - [`PipelineError::Scrape`] if neither an embedded token nor a usable
///   generation response is found, or the crumb or workspace id is missing
/// - [`PipelineError::UpstreamRejected`] if the token page answers an error status
/// - [`PipelineError::Network`] on transport failures
#[instrument(skip(ctx), fields(correlation_id = %ctx.correlation_id(), url = %ctx.endpoint()))]
pub async fn provision_token(mut ctx: SessionContext) -> Result<SessionContext, PipelineError> {
    if ctx.has_access_token() {
        debug!("Access token supplied by caller; skipping provisioning");
        return Ok(ctx);
    }

    let page_url = ctx.workspace_url(TOKEN_PAGE_PATH);
    ctx.require_session_cookies(Stage::TokenPage, &page_url)?;

    debug!(url = %page_url, "Fetching token page");
    let response = ctx
        .client()
        .get(&page_url)
        .send()
        .await
        .map_err(|e| PipelineError::network(Stage::TokenPage, &page_url, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::http_status(
            Stage::TokenPage,
            page_url,
            status.as_u16(),
        ));
    }
    let page = response
        .text()
        .await
        .map_err(|e| PipelineError::network(Stage::TokenPage, &page_url, e))?;

    if let Some(token) = find_access_token(&page) {
        info!("Found existing access token on token page");
        ctx.access_token = Some(token.to_string());
        return Ok(ctx);
    }

    let crumb = find_crumb(&page)
        .ok_or_else(|| PipelineError::scrape(Stage::TokenPage, &page_url, "token page crumb"))?;
    let token = issue_token(&ctx, &crumb).await?;
    info!("Issued new access token");
    ctx.access_token = Some(token);
    Ok(ctx)
}

async fn issue_token(ctx: &SessionContext, crumb: &str) -> Result<String, PipelineError> {
    let issue_url = ctx.workspace_url(TOKEN_ISSUE_PATH);
    let workspace_id = ctx.workspace_id().ok_or_else(|| {
        PipelineError::missing_precondition(Stage::TokenIssue, &issue_url, "workspace id")
    })?;

    debug!(url = %issue_url, workspace_id = %workspace_id, "Requesting token generation");
    let response = ctx
        .client()
        .post(&issue_url)
        .form(&[
            ("team_id", workspace_id),
            ("crumb", crumb),
            ("reissue_token", "false"),
        ])
        .send()
        .await
        .map_err(|e| PipelineError::network(Stage::TokenIssue, &issue_url, e))?;
    let body = response
        .text()
        .await
        .map_err(|e| PipelineError::network(Stage::TokenIssue, &issue_url, e))?;

    // Nothing about this endpoint's answer is documented beyond containing the token.
    find_access_token(&body)
        .map(str::to_string)
        .ok_or_else(|| PipelineError::scrape(Stage::TokenIssue, issue_url, "issued access token"))
}
