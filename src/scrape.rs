//! Regex-based extraction of scraped state from upstream HTML.
//!
//! The upstream pages are not a stable contract. Every helper here returns
//! `Option` and leaves it to the calling stage to turn absence into a
//! classified scrape failure.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// Compiles a static regex pattern, panicking with context if invalid.
///
/// Only used for compile-time-constant patterns, so the panic is a
/// programming error rather than a runtime condition.
fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

static FORM_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<form\b[^>]*>"));
static FORM_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?i)</form\s*>"));
static INPUT_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<input\b[^>]*>"));
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`/]+))"#)
});
static ACCESS_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"\bxoxs-[A-Za-z0-9]+-[A-Za-z0-9]+-[A-Za-z0-9]+-[A-Za-z0-9]+\b")
});
static SCRIPT_CRUMB_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?i)["']?\bcrumb["']?\s*[:=]\s*["']([^"']+)["']"#)
});
static SCRIPT_TEAM_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?i)["']?\bteam_id["']?\s*[:=]\s*["'](T[A-Z0-9]+)["']"#)
});

/// Parses the attributes of a single tag into a lowercase-keyed map.
fn tag_attributes(tag: &str) -> HashMap<String, String> {
    ATTR_RE
        .captures_iter(tag)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            Some((name, decode_entities(value)))
        })
        .collect()
}

/// Decodes the handful of entities that show up in attribute values.
fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Returns the inner markup of the first `<form>` whose `id` is `form_id`.
#[must_use]
pub fn form_body<'a>(html: &'a str, form_id: &str) -> Option<&'a str> {
    FORM_OPEN_RE.find_iter(html).find_map(|open| {
        let attrs = tag_attributes(open.as_str());
        if attrs.get("id").map(String::as_str) != Some(form_id) {
            return None;
        }
        let rest = &html[open.end()..];
        let end = FORM_CLOSE_RE.find(rest).map_or(rest.len(), |close| close.start());
        Some(&rest[..end])
    })
}

/// Collects `name -> value` for every named `<input>` in `html`.
///
/// Inputs without a `value` attribute map to the empty string. The first
/// occurrence of a name wins.
#[must_use]
pub fn input_values(html: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for tag in INPUT_TAG_RE.find_iter(html) {
        let mut attrs = tag_attributes(tag.as_str());
        let Some(name) = attrs.remove("name") else {
            continue;
        };
        let value = attrs.remove("value").unwrap_or_default();
        values.entry(name).or_insert(value);
    }
    values
}

/// Collects the named inputs of the form with id `form_id`.
#[must_use]
pub fn form_inputs(html: &str, form_id: &str) -> Option<HashMap<String, String>> {
    form_body(html, form_id).map(input_values)
}

/// Finds the first access token embedded anywhere in `text`.
#[must_use]
pub fn find_access_token(text: &str) -> Option<&str> {
    ACCESS_TOKEN_RE.find(text).map(|m| m.as_str())
}

/// Finds an anti-forgery crumb: a hidden `crumb` input first, then a
/// script-embedded `crumb: "..."` assignment.
#[must_use]
pub fn find_crumb(html: &str) -> Option<String> {
    if let Some(crumb) = input_values(html)
        .remove("crumb")
        .filter(|value| !value.is_empty())
    {
        return Some(crumb);
    }
    SCRIPT_CRUMB_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| decode_entities(m.as_str()))
}

/// Finds the workspace id, from a `team_id` input or a script assignment.
#[must_use]
pub fn find_workspace_id(html: &str) -> Option<String> {
    if let Some(team_id) = input_values(html)
        .remove("team_id")
        .filter(|value| !value.is_empty())
    {
        return Some(team_id);
    }
    SCRIPT_TEAM_ID_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
