//! Error types for the porting pipelines.
//!
//! Every failure carries the stage that produced it and the endpoint URL
//! involved, so callers can map failures to responses without inspecting
//! message text.

use std::fmt;

use thiserror::Error;

/// Coarse failure classification exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Workspace unreachable or nonexistent.
    NotFound,
    /// Credentials rejected.
    Unauthorized,
    /// Expected markup or field absent (upstream contract drift).
    ScrapeFailure,
    /// Transport-level error.
    NetworkFailure,
    /// Well-formed request refused by upstream business logic.
    UpstreamRejected,
}

impl FailureKind {
    /// HTTP-equivalent status for this failure kind.
    ///
    /// Only `NotFound` and `Unauthorized` are surfaced distinctly; everything
    /// else is a generic internal failure.
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Unauthorized => 401,
            Self::ScrapeFailure | Self::NetworkFailure | Self::UpstreamRejected => 500,
        }
    }

    /// Stable label used in logs and CLI output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not-found",
            Self::Unauthorized => "unauthorized",
            Self::ScrapeFailure => "scrape-failure",
            Self::NetworkFailure => "network-failure",
            Self::UpstreamRejected => "upstream-rejected",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pipeline stage in which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Construction of the HTTP client bound to a session.
    Setup,
    /// Unauthenticated fetch of the workspace login page.
    LoginPage,
    /// Credential form submission.
    LoginSubmit,
    /// Fetch of the developer page that may embed an access token.
    TokenPage,
    /// Token-generation request.
    TokenIssue,
    /// Inventory listing call (or parsing of a pasted export).
    Inventory,
    /// Fetch of the upload form for its crumb.
    UploadForm,
    /// Fetch of the source image.
    ImageFetch,
    /// Multipart upload to the destination.
    Upload,
}

impl Stage {
    /// Stable label used in logs and error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::LoginPage => "login-page",
            Self::LoginSubmit => "login-submit",
            Self::TokenPage => "token-page",
            Self::TokenIssue => "token-issue",
            Self::Inventory => "inventory",
            Self::UploadForm => "upload-form",
            Self::ImageFetch => "image-fetch",
            Self::Upload => "upload",
        }
    }

    /// Whether this stage belongs to the login sequence.
    #[must_use]
    pub fn is_authentication(self) -> bool {
        matches!(self, Self::LoginPage | Self::LoginSubmit)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by a single pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The workspace page does not exist.
    #[error("[{stage}] workspace not found at {url}")]
    NotFound {
        /// Stage that failed.
        stage: Stage,
        /// The URL that returned a missing-page status.
        url: String,
    },

    /// The login submission did not establish a session.
    #[error("[{stage}] credentials rejected by {url}")]
    Unauthorized {
        /// Stage that failed.
        stage: Stage,
        /// The login URL.
        url: String,
    },

    /// A field expected in the upstream markup or response is missing.
    #[error("[{stage}] could not find {what} at {url}")]
    Scrape {
        /// Stage that failed.
        stage: Stage,
        /// The page that was scraped.
        url: String,
        /// What was being looked for.
        what: &'static str,
    },

    /// A stage was invoked without the session state it depends on.
    ///
    /// No request is issued when this is returned.
    #[error("[{stage}] {field} is not available for {url}")]
    MissingPrecondition {
        /// Stage that refused to run.
        stage: Stage,
        /// The endpoint the stage would have called.
        url: String,
        /// The missing piece of session state.
        field: &'static str,
    },

    /// Transport-level error (DNS, connection refused, TLS, timeout, broken body).
    #[error("[{stage}] network error at {url}: {source}")]
    Network {
        /// Stage that failed.
        stage: Stage,
        /// The URL being requested.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client for a session could not be built.
    #[error("[{stage}] HTTP client construction failed for {url}: {reason}")]
    ClientSetup {
        /// Stage that failed.
        stage: Stage,
        /// The workspace the client was built for.
        url: String,
        /// Why construction failed.
        reason: String,
    },

    /// The upstream answered, but refused the request.
    #[error("[{stage}] {url} rejected the request: {reason}")]
    UpstreamRejected {
        /// Stage that failed.
        stage: Stage,
        /// The URL that rejected the request.
        url: String,
        /// Human-readable reason (status code or upstream error string).
        reason: String,
    },
}

impl PipelineError {
    /// Creates a not-found error.
    pub fn not_found(stage: Stage, url: impl Into<String>) -> Self {
        Self::NotFound {
            stage,
            url: url.into(),
        }
    }

    /// Creates an unauthorized error.
    pub fn unauthorized(stage: Stage, url: impl Into<String>) -> Self {
        Self::Unauthorized {
            stage,
            url: url.into(),
        }
    }

    /// Creates a scrape failure for a missing field.
    pub fn scrape(stage: Stage, url: impl Into<String>, what: &'static str) -> Self {
        Self::Scrape {
            stage,
            url: url.into(),
            what,
        }
    }

    /// Creates a precondition failure for missing session state.
    pub fn missing_precondition(stage: Stage, url: impl Into<String>, field: &'static str) -> Self {
        Self::MissingPrecondition {
            stage,
            url: url.into(),
            field,
        }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(stage: Stage, url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            stage,
            url: url.into(),
            source,
        }
    }

    /// Creates a client construction error.
    pub fn client_setup(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ClientSetup {
            stage: Stage::Setup,
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an upstream rejection.
    pub fn rejected(stage: Stage, url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UpstreamRejected {
            stage,
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an upstream rejection for an unexpected HTTP status.
    pub fn http_status(stage: Stage, url: impl Into<String>, status: u16) -> Self {
        Self::rejected(stage, url, format!("HTTP {status}"))
    }

    /// The failure classification of this error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::Unauthorized { .. } => FailureKind::Unauthorized,
            Self::Scrape { .. } | Self::MissingPrecondition { .. } => FailureKind::ScrapeFailure,
            Self::Network { .. } | Self::ClientSetup { .. } => FailureKind::NetworkFailure,
            Self::UpstreamRejected { .. } => FailureKind::UpstreamRejected,
        }
    }

    /// The stage that produced this error.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::NotFound { stage, .. }
            | Self::Unauthorized { stage, .. }
            | Self::Scrape { stage, .. }
            | Self::MissingPrecondition { stage, .. }
            | Self::Network { stage, .. }
            | Self::ClientSetup { stage, .. }
            | Self::UpstreamRejected { stage, .. } => *stage,
        }
    }

    /// The endpoint URL involved in the failure.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::NotFound { url, .. }
            | Self::Unauthorized { url, .. }
            | Self::Scrape { url, .. }
            | Self::MissingPrecondition { url, .. }
            | Self::Network { url, .. }
            | Self::ClientSetup { url, .. }
            | Self::UpstreamRejected { url, .. } => url,
        }
    }
}

// No `From<reqwest::Error>`: every variant needs the stage and URL, which the
// source error does not carry. Use the constructor helpers instead.
