//! Per-run session state threaded through the pipeline stages.
//!
//! A [`SessionContext`] is created for exactly one pipeline run against one
//! workspace. It owns its cookie jar and the HTTP client bound to that jar,
//! and it is moved from stage to stage: each stage takes it by value, fills in
//! the fields it produces, and hands it on. It is deliberately not `Clone`.

mod http_client;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::cookie::{CookieStore, Jar};
use url::Url;

use crate::error::{PipelineError, Stage};

pub(crate) use http_client::build_session_client;

/// Default base URL of the upstream web API.
pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";

/// Settings applied to every session the pipelines create.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Base URL of the upstream web API (inventory listing lives here).
    pub api_base_url: String,
    /// Connect timeout imposed by the caller, if any.
    pub connect_timeout: Option<Duration>,
    /// Whole-request timeout imposed by the caller, if any.
    pub request_timeout: Option<Duration>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            connect_timeout: None,
            request_timeout: None,
        }
    }
}

/// Login credentials for a human workspace member.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    /// Creates a credential pair.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// The login email.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// How the caller reaches a workspace.
#[derive(Clone, PartialEq, Eq)]
pub enum WorkspaceAccess {
    /// Log in as a member; `token` skips provisioning when already known.
    Credentials {
        /// Member credentials.
        credentials: Credentials,
        /// A usable API access token, if the caller already holds one.
        token: Option<String>,
    },
    /// Call the API directly with an access token; no login.
    Token(String),
    /// A pasted inventory-listing response document; no network at all.
    Export(String),
}

impl fmt::Debug for WorkspaceAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credentials { credentials, token } => f
                .debug_struct("Credentials")
                .field("credentials", credentials)
                .field("token", &token.as_ref().map(|_| "<redacted>"))
                .finish(),
            Self::Token(_) => f.write_str("Token(<redacted>)"),
            Self::Export(raw) => write!(f, "Export({} bytes)", raw.len()),
        }
    }
}

/// A workspace the caller wants to read from or write to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// Root URL of the workspace, e.g. `https://team.slack.com/`.
    pub url: Url,
    /// How to reach it.
    pub access: WorkspaceAccess,
}

impl Workspace {
    /// Creates a workspace description.
    #[must_use]
    pub fn new(url: Url, access: WorkspaceAccess) -> Self {
        Self { url, access }
    }
}

/// Hidden fields scraped from the login form, consumed by the submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoginForm {
    pub(crate) signin: String,
    pub(crate) redir: String,
    pub(crate) crumb: String,
}

/// Mutable state owned by one pipeline run.
pub struct SessionContext {
    endpoint: Url,
    credentials: Option<Credentials>,
    cookie_jar: Arc<Jar>,
    client: Client,
    settings: SessionSettings,
    correlation_id: String,
    pub(crate) login_form: Option<LoginForm>,
    pub(crate) workspace_id: Option<String>,
    pub(crate) access_token: Option<String>,
    pub(crate) upload_crumb: Option<String>,
}

impl SessionContext {
    /// Creates a fresh context with an empty cookie jar.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ClientSetup`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: Url,
        credentials: Option<Credentials>,
        settings: &SessionSettings,
    ) -> Result<Self, PipelineError> {
        let cookie_jar = Arc::new(Jar::default());
        let client = build_session_client(endpoint.as_str(), Some(cookie_jar.clone()), settings)?;
        Ok(Self {
            endpoint,
            credentials,
            cookie_jar,
            client,
            settings: settings.clone(),
            correlation_id: new_correlation_id(),
            login_form: None,
            workspace_id: None,
            access_token: None,
            upload_crumb: None,
        })
    }

    /// Creates a context for a workspace description.
    ///
    /// A token supplied through the access mode is installed up front so the
    /// token provisioning stage becomes a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ClientSetup`] if the HTTP client cannot be built.
    pub fn for_workspace(
        workspace: &Workspace,
        settings: &SessionSettings,
    ) -> Result<Self, PipelineError> {
        let (credentials, token) = match &workspace.access {
            WorkspaceAccess::Credentials { credentials, token } => {
                (Some(credentials.clone()), token.clone())
            }
            WorkspaceAccess::Token(token) => (None, Some(token.clone())),
            WorkspaceAccess::Export(_) => (None, None),
        };
        let mut context = Self::new(workspace.url.clone(), credentials, settings)?;
        context.access_token = token.filter(|token| !token.trim().is_empty());
        Ok(context)
    }

    /// Root URL of the workspace.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Correlation id attached to every log line of this run.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Workspace id scraped during authentication, if any.
    #[must_use]
    pub fn workspace_id(&self) -> Option<&str> {
        self.workspace_id.as_deref()
    }

    /// Whether an API access token is available.
    #[must_use]
    pub fn has_access_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// Whether the upload crumb has been scraped.
    #[must_use]
    pub fn has_upload_crumb(&self) -> bool {
        self.upload_crumb.is_some()
    }

    /// Whether the cookie jar holds any cookie for the workspace URL.
    #[must_use]
    pub fn has_session_cookies(&self) -> bool {
        !self.cookie_snapshot().is_empty()
    }

    pub(crate) fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    /// Absolute URL for a path on the workspace.
    pub(crate) fn workspace_url(&self, path: &str) -> String {
        join_url(&self.endpoint, path)
    }

    /// Absolute URL for a method on the web API.
    pub(crate) fn api_url(&self, method: &str) -> String {
        format!(
            "{}/{}",
            self.settings.api_base_url.trim_end_matches('/'),
            method.trim_start_matches('/')
        )
    }

    /// Builds a client with no cookie store, for requests that must not
    /// carry this workspace's session (e.g. image fetches from a CDN).
    pub(crate) fn detached_client(&self, label: &str) -> Result<Client, PipelineError> {
        build_session_client(label, None, &self.settings)
    }

    /// The cookie pairs currently scoped to the workspace URL.
    pub(crate) fn cookie_snapshot(&self) -> BTreeSet<String> {
        self.cookie_jar
            .cookies(&self.endpoint)
            .and_then(|header| header.to_str().ok().map(str::to_string))
            .map(|header| {
                header
                    .split(';')
                    .map(str::trim)
                    .filter(|pair| !pair.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fails with a precondition error unless session cookies are present.
    pub(crate) fn require_session_cookies(
        &self,
        stage: Stage,
        url: &str,
    ) -> Result<(), PipelineError> {
        if self.has_session_cookies() {
            Ok(())
        } else {
            Err(PipelineError::missing_precondition(
                stage,
                url,
                "session cookies",
            ))
        }
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("endpoint", &self.endpoint.as_str())
            .field("correlation_id", &self.correlation_id)
            .field("workspace_id", &self.workspace_id)
            .field("has_login_form", &self.login_form.is_some())
            .field("has_access_token", &self.access_token.is_some())
            .field("has_upload_crumb", &self.upload_crumb.is_some())
            .finish_non_exhaustive()
    }
}

/// Joins a path onto a base URL, falling back to string concatenation for
/// bases that cannot carry a path.
pub(crate) fn join_url(base: &Url, path: &str) -> String {
    base.join(path).map_or_else(
        |_| format!("{}{}", base.as_str().trim_end_matches('/'), path),
        String::from,
    )
}

/// Generates a short random id for correlating log lines of one run.
#[must_use]
pub fn new_correlation_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn workspace_url() -> Url {
        Url::parse("https://team.slack.com/").unwrap()
    }

    #[test]
    fn test_new_context_has_no_cookies_or_tokens() {
        let ctx = SessionContext::new(workspace_url(), None, &SessionSettings::default()).unwrap();
        assert!(!ctx.has_session_cookies());
        assert!(!ctx.has_access_token());
        assert!(!ctx.has_upload_crumb());
        assert_eq!(ctx.correlation_id().len(), 16);
    }

    #[test]
    fn test_workspace_and_api_urls() {
        let settings = SessionSettings {
            api_base_url: "https://slack.com/api/".to_string(),
            ..SessionSettings::default()
        };
        let ctx = SessionContext::new(workspace_url(), None, &settings).unwrap();
        assert_eq!(
            ctx.workspace_url("/admin/emoji"),
            "https://team.slack.com/admin/emoji"
        );
        assert_eq!(ctx.api_url("emoji.list"), "https://slack.com/api/emoji.list");
    }

    #[test]
    fn test_for_workspace_installs_supplied_token() {
        let workspace = Workspace::new(
            workspace_url(),
            WorkspaceAccess::Credentials {
                credentials: Credentials::new("a@b.c", "pw"),
                token: Some("xoxs-1-2-3-4".to_string()),
            },
        );
        let ctx = SessionContext::for_workspace(&workspace, &SessionSettings::default()).unwrap();
        assert!(ctx.has_access_token());
        assert_eq!(ctx.credentials().unwrap().email(), "a@b.c");
    }

    #[test]
    fn test_for_workspace_ignores_blank_token() {
        let workspace = Workspace::new(workspace_url(), WorkspaceAccess::Token("  ".to_string()));
        let ctx = SessionContext::for_workspace(&workspace, &SessionSettings::default()).unwrap();
        assert!(!ctx.has_access_token());
    }

    #[test]
    fn test_cookie_snapshot_reads_jar_for_endpoint_only() {
        let ctx = SessionContext::new(workspace_url(), None, &SessionSettings::default()).unwrap();
        ctx.cookie_jar
            .add_cookie_str("d=abc; Path=/", &workspace_url());
        ctx.cookie_jar.add_cookie_str(
            "other=1; Path=/",
            &Url::parse("https://another.slack.com/").unwrap(),
        );
        let snapshot = ctx.cookie_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains("d=abc"));
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let access = WorkspaceAccess::Credentials {
            credentials: Credentials::new("a@b.c", "hunter2"),
            token: Some("xoxs-secret".to_string()),
        };
        let rendered = format!("{access:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("xoxs-secret"));
    }

    #[test]
    fn test_require_session_cookies_fails_without_cookies() {
        let ctx = SessionContext::new(workspace_url(), None, &SessionSettings::default()).unwrap();
        let error = ctx
            .require_session_cookies(Stage::UploadForm, "https://team.slack.com/admin/emoji")
            .unwrap_err();
        assert!(matches!(error, PipelineError::MissingPrecondition { .. }));
    }
}
