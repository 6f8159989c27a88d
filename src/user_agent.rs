//! Shared User-Agent string for every client the pipelines build.
//!
//! The upstream login and upload pages are served to browsers; a browser-like
//! product token keeps those pages rendering the same markup the scrapers
//! expect, while the suffix still identifies the tool.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/emoji-porter";

/// Browser product token prefixed to the tool identifier.
const BROWSER_PRODUCT: &str = "Mozilla/5.0 (compatible)";

/// Default User-Agent for workspace, API and image requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("{BROWSER_PRODUCT} emoji-porter/{version} (+{PROJECT_UA_URL})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_version_and_project_url() {
        let ua = default_user_agent();
        assert!(ua.contains(PROJECT_UA_URL), "UA must contain project URL: {ua}");
        assert!(
            ua.contains(&format!("emoji-porter/{}", env!("CARGO_PKG_VERSION"))),
            "UA must contain crate version: {ua}"
        );
    }

    #[test]
    fn test_user_agent_starts_with_browser_product() {
        assert!(default_user_agent().starts_with("Mozilla/5.0"));
    }
}
