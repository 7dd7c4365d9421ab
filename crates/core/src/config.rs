use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub const DEFAULT_COMMAND_DIR_NAME: &str = "Command";
pub const DEFAULT_RESCAN_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_RESCAN_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_LANGUAGES: &str = "python=py,pyw;ruby=rb;javascript=js";

// ── Language setups ───────────────────────────────────────────

/// A configured command-definition language and the file extensions it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSetup {
    pub name: String,
    /// Extensions without the leading dot, as written in the config.
    pub extensions: Vec<String>,
}

impl LanguageSetup {
    /// Parse a `name=ext,ext;name=ext` list.
    ///
    /// Leading dots on extensions are accepted and stripped. Empty segments
    /// between `;` separators are ignored.
    pub fn parse_list(list: &str) -> Result<Vec<LanguageSetup>> {
        let mut setups = Vec::new();
        for part in list.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, exts) = part
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidLanguage(part.to_string()))?;
            let name = name.trim();
            let extensions: Vec<String> = exts
                .split(',')
                .map(|e| e.trim().trim_start_matches('.').to_string())
                .filter(|e| !e.is_empty())
                .collect();
            if name.is_empty() || extensions.is_empty() {
                return Err(ConfigError::InvalidLanguage(part.to_string()));
            }
            setups.push(LanguageSetup {
                name: name.to_string(),
                extensions,
            });
        }
        Ok(setups)
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    /// Application base directory; commands live under `{base_dir}/{command_dir_name}`.
    pub base_dir: PathBuf,
    pub command_dir_name: String,
    pub rescan_interval: Duration,
    /// Quiet window for filesystem-triggered rescans.
    pub rescan_debounce: Duration,
    pub languages: Vec<LanguageSetup>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: String::new(),
            base_dir: PathBuf::from("."),
            command_dir_name: DEFAULT_COMMAND_DIR_NAME.to_string(),
            rescan_interval: Duration::from_secs(DEFAULT_RESCAN_INTERVAL_SECS),
            rescan_debounce: Duration::from_millis(DEFAULT_RESCAN_DEBOUNCE_MS),
            languages: LanguageSetup::parse_list(DEFAULT_LANGUAGES).unwrap_or_default(),
        }
    }
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `DYNACMD_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("DYNACMD_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();

        let languages_raw = profiled_env_or(p, "COMMAND_LANGUAGES", DEFAULT_LANGUAGES);
        let languages = match LanguageSetup::parse_list(&languages_raw) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(error = %e, "invalid COMMAND_LANGUAGES, using defaults");
                LanguageSetup::parse_list(DEFAULT_LANGUAGES).unwrap_or_default()
            }
        };

        Self {
            profile: p.to_string(),
            base_dir: PathBuf::from(profiled_env_or(p, "BASE_DIR", ".")),
            command_dir_name: profiled_env_or(p, "COMMAND_DIR_NAME", DEFAULT_COMMAND_DIR_NAME),
            rescan_interval: Duration::from_secs(profiled_env_u64(
                p,
                "RESCAN_INTERVAL_SECS",
                DEFAULT_RESCAN_INTERVAL_SECS,
            )),
            rescan_debounce: Duration::from_millis(profiled_env_u64(
                p,
                "RESCAN_DEBOUNCE_MS",
                DEFAULT_RESCAN_DEBOUNCE_MS,
            )),
            languages,
        }
    }

    /// Shared command directory: `{base_dir}/{command_dir_name}`.
    pub fn command_dir(&self) -> PathBuf {
        self.base_dir.join(&self.command_dir_name)
    }

    /// Every extension across all configured languages, in config order.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.languages
            .iter()
            .flat_map(|l| l.extensions.iter().map(String::as_str))
    }

    pub fn validate(&self) -> Result<()> {
        if self.rescan_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.extensions().next().is_none() {
            let names: Vec<&str> = self.languages.iter().map(|l| l.name.as_str()).collect();
            return Err(ConfigError::NoExtensions(names.join(",")));
        }
        Ok(())
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  commands:    dir={}", self.command_dir().display());
        tracing::info!(
            "  rescan:      interval={}s, debounce={}ms",
            self.rescan_interval.as_secs(),
            self.rescan_debounce.as_millis()
        );
        for lang in &self.languages {
            tracing::info!("  language:    {} ({})", lang.name, lang.extensions.join(", "));
        }
    }

    /// Return a JSON view of the effective configuration.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "command_dir": self.command_dir(),
            "rescan_interval_secs": self.rescan_interval.as_secs(),
            "rescan_debounce_ms": self.rescan_debounce.as_millis() as u64,
            "languages": self.languages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_languages_strips_dots_and_whitespace() {
        let langs = LanguageSetup::parse_list(" python = .py, pyw ; ruby=rb;").unwrap();
        assert_eq!(langs.len(), 2);
        assert_eq!(langs[0].name, "python");
        assert_eq!(langs[0].extensions, vec!["py", "pyw"]);
        assert_eq!(langs[1].extensions, vec!["rb"]);
    }

    #[test]
    fn parse_languages_rejects_missing_extensions() {
        assert!(matches!(
            LanguageSetup::parse_list("python="),
            Err(ConfigError::InvalidLanguage(_))
        ));
        assert!(matches!(
            LanguageSetup::parse_list("python"),
            Err(ConfigError::InvalidLanguage(_))
        ));
    }

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.rescan_interval, Duration::from_secs(300));
        assert_eq!(config.command_dir(), PathBuf::from("./Command"));
        assert!(config.extensions().any(|e| e == "py"));
    }

    #[test]
    fn validate_rejects_zero_interval_and_empty_languages() {
        let mut config = Config::default();
        config.rescan_interval = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroInterval)));

        let mut config = Config::default();
        config.languages.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoExtensions(_))));
    }

    #[test]
    fn summary_reports_profile_label() {
        let config = Config::default();
        let summary = config.summary();
        assert_eq!(summary["profile"], "default");
        assert_eq!(summary["rescan_interval_secs"], 300);
    }
}
