//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use porter_core::SessionSettings;

/// `key = value` file configuration for porter defaults.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    /// Base URL of the upstream web API.
    pub api_base_url: Option<String>,
    /// Connect timeout applied to every request, in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Whole-request timeout applied to every request, in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(api_base_url) = &self.api_base_url
            && !(api_base_url.starts_with("https://") || api_base_url.starts_with("http://"))
        {
            bail!(
                "Invalid config value for `api_base_url`: {api_base_url}. Expected an http(s) URL"
            );
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("request_timeout_secs", self.request_timeout_secs)?;
        Ok(())
    }

    /// Session settings with this file's values applied over the defaults.
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        let defaults = SessionSettings::default();
        SessionSettings {
            api_base_url: self
                .api_base_url
                .clone()
                .unwrap_or(defaults.api_base_url),
            connect_timeout: self.connect_timeout_secs.map(Duration::from_secs),
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
        }
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Log filter used when neither `RUST_LOG` nor CLI flags decide.
    #[must_use]
    pub fn filter(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/emoji-porter/config.toml`
/// 2. `$HOME/.config/emoji-porter/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("emoji-porter")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("emoji-porter")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from an explicit path, or from the default path if present.
///
/// An explicit path must exist; a missing default file yields the defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<FileConfig> {
    if let Some(path) = explicit {
        return load_file_config(path);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => load_file_config(&path),
        _ => Ok(FileConfig::default()),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();

        match key {
            "api_base_url" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `api_base_url` value on line {}", line_index + 1)
                })?;
                cfg.api_base_url = Some(parsed);
            }
            "connect_timeout_secs" => {
                let parsed = parse_seconds(value).with_context(|| {
                    format!(
                        "Invalid `connect_timeout_secs` value on line {}",
                        line_index + 1
                    )
                })?;
                cfg.connect_timeout_secs = Some(parsed);
            }
            "request_timeout_secs" => {
                let parsed = parse_seconds(value).with_context(|| {
                    format!(
                        "Invalid `request_timeout_secs` value on line {}",
                        line_index + 1
                    )
                })?;
                cfg.request_timeout_secs = Some(parsed);
            }
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `verbosity` value on line {}", line_index + 1)
                })?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!(
                        "Invalid `verbosity` value '{}' on line {}",
                        parsed,
                        line_index + 1
                    )
                })?);
            }
            unknown => {
                bail!(
                    "Unknown configuration key: '{}' on line {}",
                    unknown,
                    line_index + 1
                );
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_seconds(raw_value: &str) -> Result<u64> {
    raw_value
        .parse::<u64>()
        .with_context(|| format!("Expected a whole number of seconds, got '{raw_value}'"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_all_fields() {
        let cfg = parse_config_str(
            r#"
api_base_url = "https://slack.example.com/api" # staging
connect_timeout_secs = 10
request_timeout_secs = 120
verbosity = "verbose"
"#,
        )
        .expect("full config should parse");
        assert_eq!(
            cfg.api_base_url.as_deref(),
            Some("https://slack.example.com/api")
        );
        assert_eq!(cfg.connect_timeout_secs, Some(10));
        assert_eq!(cfg.request_timeout_secs, Some(120));
        assert_eq!(cfg.verbosity, Some(VerbositySetting::Verbose));
    }

    #[test]
    fn test_empty_config_leaves_defaults_and_no_timeouts() {
        let settings = parse_config_str("").expect("empty config").session_settings();
        assert_eq!(settings.api_base_url, porter_core::session::DEFAULT_API_BASE_URL);
        assert!(settings.connect_timeout.is_none());
        assert!(settings.request_timeout.is_none());
    }

    #[test]
    fn test_session_settings_apply_timeouts() {
        let settings = parse_config_str("request_timeout_secs = 45")
            .expect("timeout config should parse")
            .session_settings();
        assert_eq!(settings.request_timeout, Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_parse_config_rejects_invalid_timeout_value() {
        let err = parse_config_str("connect_timeout_secs = 0")
            .expect_err("invalid timeout expected");
        assert!(err.to_string().contains("connect_timeout_secs"));
    }

    #[test]
    fn test_parse_config_rejects_negative_and_fractional_timeouts() {
        for raw in ["request_timeout_secs = -5", "connect_timeout_secs = 1.5"] {
            let err = parse_config_str(raw).expect_err("non-integer timeout expected to fail");
            assert!(format!("{err:#}").contains("whole number of seconds"), "{err:#}");
        }
    }

    #[test]
    fn test_parse_config_rejects_non_http_api_base() {
        let err = parse_config_str(r#"api_base_url = "ftp://slack.com/api""#)
            .expect_err("non-http base expected to fail");
        assert!(err.to_string().contains("api_base_url"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_string() {
        let err = parse_config_str("api_base_url = https://slack.com/api")
            .expect_err("unquoted string expected to fail");
        assert!(format!("{err:#}").contains("double-quoted"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("concurrency = 4").expect_err("unknown key error expected");
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("verbosity").expect_err("syntax error expected");
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_load_config_explicit_missing_file_fails() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let err = load_config(Some(&dir.path().join("absent.toml")))
            .expect_err("missing explicit config must fail");
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_config_explicit_file() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "verbosity = \"quiet\"\n").expect("write config");
        let cfg = load_config(Some(&path)).expect("config should load");
        assert_eq!(cfg.verbosity, Some(VerbositySetting::Quiet));
    }
}
