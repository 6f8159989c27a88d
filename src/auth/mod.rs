//! Workspace login and access-token provisioning.
//!
//! [`authenticate`] replays the browser sign-in form against a workspace and
//! leaves the resulting session cookies in the context's jar.
//! [`provision_token`] then obtains an API access token for that session when
//! the caller did not supply one.

mod token;

pub use token::{TOKEN_ISSUE_PATH, TOKEN_PAGE_PATH, provision_token};

use tracing::{debug, info, instrument, warn};

use crate::error::{PipelineError, Stage};
use crate::scrape::{find_workspace_id, form_inputs};
use crate::session::{LoginForm, SessionContext};

/// Id of the sign-in form on the workspace login page.
pub const SIGNIN_FORM_ID: &str = "signin_form";

/// Logs in to the workspace as the context's member.
///
/// The login page is fetched without cookies, its hidden sign-in fields are
/// scraped, and the credentials are submitted with them. The session counts
/// as established only if the submission left at least one new cookie for
/// the workspace in the jar.
///
/// # Errors
///
/// - [`PipelineError::NotFound`] if the login page returns 404
/// - [`PipelineError::Scrape`] if the sign-in form or one of its fields is missing
/// - [`PipelineError::Unauthorized`] if no session cookie was issued
/// - [`PipelineError::Network`] on transport failures
/// - [`PipelineError::MissingPrecondition`] if the context carries no credentials
#[instrument(skip(ctx), fields(correlation_id = %ctx.correlation_id(), url = %ctx.endpoint()))]
pub async fn authenticate(ctx: SessionContext) -> Result<SessionContext, PipelineError> {
    let ctx = fetch_login_page(ctx).await?;
    submit_login(ctx).await
}

async fn fetch_login_page(mut ctx: SessionContext) -> Result<SessionContext, PipelineError> {
    let url = ctx.endpoint().to_string();
    if ctx.credentials().is_none() {
        return Err(PipelineError::missing_precondition(
            Stage::LoginPage,
            url,
            "login credentials",
        ));
    }

    debug!(url = %url, "Fetching login page");
    let response = ctx
        .client()
        .get(&url)
        .send()
        .await
        .map_err(|e| PipelineError::network(Stage::LoginPage, &url, e))?;

    let status = response.status();
    if status.as_u16() == 404 {
        return Err(PipelineError::not_found(Stage::LoginPage, url));
    }
    if !status.is_success() {
        return Err(PipelineError::http_status(
            Stage::LoginPage,
            url,
            status.as_u16(),
        ));
    }

    let html = response
        .text()
        .await
        .map_err(|e| PipelineError::network(Stage::LoginPage, &url, e))?;

    let mut inputs = form_inputs(&html, SIGNIN_FORM_ID)
        .ok_or_else(|| PipelineError::scrape(Stage::LoginPage, &url, "sign-in form"))?;
    let signin = inputs
        .remove("signin")
        .ok_or_else(|| PipelineError::scrape(Stage::LoginPage, &url, "sign-in field 'signin'"))?;
    let redir = inputs
        .remove("redir")
        .ok_or_else(|| PipelineError::scrape(Stage::LoginPage, &url, "sign-in field 'redir'"))?;
    let crumb = inputs
        .remove("crumb")
        .ok_or_else(|| PipelineError::scrape(Stage::LoginPage, &url, "sign-in field 'crumb'"))?;

    ctx.login_form = Some(LoginForm {
        signin,
        redir,
        crumb,
    });
    if let Some(workspace_id) = find_workspace_id(&html) {
        debug!(workspace_id = %workspace_id, "Workspace id found on login page");
        ctx.workspace_id = Some(workspace_id);
    }

    Ok(ctx)
}

async fn submit_login(mut ctx: SessionContext) -> Result<SessionContext, PipelineError> {
    let url = ctx.endpoint().to_string();
    // The form fields are single-use; drop them from the context before sending.
    let form = ctx.login_form.take().ok_or_else(|| {
        PipelineError::missing_precondition(Stage::LoginSubmit, &url, "sign-in form fields")
    })?;
    let credentials = ctx.credentials().cloned().ok_or_else(|| {
        PipelineError::missing_precondition(Stage::LoginSubmit, &url, "login credentials")
    })?;

    let cookies_before = ctx.cookie_snapshot();
    let body = [
        ("signin", form.signin.as_str()),
        ("redir", form.redir.as_str()),
        ("crumb", form.crumb.as_str()),
        ("remember", "on"),
        ("email", credentials.email()),
        ("password", credentials.password()),
    ];

    debug!(url = %url, "Submitting login form");
    let response = ctx
        .client()
        .post(&url)
        .form(&body)
        .send()
        .await
        .map_err(|e| PipelineError::network(Stage::LoginSubmit, &url, e))?;

    // The upstream answers 200 for bad passwords too; only new cookies tell.
    let cookies_after = ctx.cookie_snapshot();
    if cookies_after.is_subset(&cookies_before) {
        warn!(
            url = %url,
            status = response.status().as_u16(),
            "Login submission did not establish a session"
        );
        return Err(PipelineError::unauthorized(Stage::LoginSubmit, url));
    }

    if ctx.workspace_id.is_none()
        && let Ok(landing) = response.text().await
        && let Some(workspace_id) = find_workspace_id(&landing)
    {
        debug!(workspace_id = %workspace_id, "Workspace id found on landing page");
        ctx.workspace_id = Some(workspace_id);
    }

    info!(
        url = %url,
        cookies = cookies_after.len(),
        "Workspace session established"
    );
    Ok(ctx)
}
