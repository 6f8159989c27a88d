//! Shared HTTP client construction policy for pipeline sessions.
//!
//! Every session gets its own client bound to its own cookie jar, so cookies
//! scraped for one workspace can never ride along on a request built for
//! another. Image fetches use a client with no cookie store at all.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use reqwest::Client;
use reqwest::cookie::Jar;
use reqwest::{ClientBuilder, Proxy};
use tracing::warn;

use crate::error::PipelineError;
use crate::user_agent;

use super::SessionSettings;

/// Builds a client for a session, optionally bound to a cookie jar.
///
/// `label` is the URL the client is built for; it is used only for error
/// messages and logging.
///
/// # Errors
///
/// Returns [`PipelineError::ClientSetup`] when client construction fails.
pub(crate) fn build_session_client(
    label: &str,
    cookie_jar: Option<Arc<Jar>>,
    settings: &SessionSettings,
) -> Result<Client, PipelineError> {
    let initial = try_build_client(cookie_jar.clone(), settings, false);
    match initial {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed environments panic when querying system proxy
            // settings; the fallback keeps env-proxy support without the lookup.
            warn!(
                url = label,
                "Session client hit system proxy panic; using env-proxy fallback builder"
            );
            match try_build_client(cookie_jar, settings, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(PipelineError::client_setup(
                    label,
                    "client builder panicked while initializing networking",
                )),
                Err(BuildClientFailure::Build(error)) => {
                    Err(PipelineError::client_setup(label, error.to_string()))
                }
            }
        }
        Err(BuildClientFailure::Build(error)) => {
            Err(PipelineError::client_setup(label, error.to_string()))
        }
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    cookie_jar: Option<Arc<Jar>>,
    settings: &SessionSettings,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(cookie_jar, settings);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(cookie_jar: Option<Arc<Jar>>, settings: &SessionSettings) -> ClientBuilder {
    let mut builder = Client::builder()
        .user_agent(user_agent::default_user_agent())
        .gzip(true);

    // No timeouts unless the caller configured them.
    if let Some(connect_timeout) = settings.connect_timeout {
        builder = builder.connect_timeout(connect_timeout);
    }
    if let Some(request_timeout) = settings.request_timeout {
        builder = builder.timeout(request_timeout);
    }

    if let Some(jar) = cookie_jar {
        builder = builder.cookie_provider(jar);
    }

    builder
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    match scheme {
        "https" => find_first_proxy_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]),
        "http" => find_first_proxy_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]),
        _ => None,
    }
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_build_session_client_without_jar() {
        let client = build_session_client("https://team.slack.com/", None, &SessionSettings::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_build_session_client_with_jar_and_timeouts() {
        let settings = SessionSettings {
            connect_timeout: Some(Duration::from_secs(5)),
            request_timeout: Some(Duration::from_secs(30)),
            ..SessionSettings::default()
        };
        let jar = Arc::new(Jar::default());
        let client = build_session_client("https://team.slack.com/", Some(jar), &settings);
        assert!(client.is_ok());
    }

    #[test]
    fn test_env_proxy_for_unknown_scheme_is_none() {
        assert_eq!(env_proxy_for_scheme("ftp"), None);
    }
}
