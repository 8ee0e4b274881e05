//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$EML2HTML_CONFIG` (environment variable)
//! 2. `~/.config/eml2html/config.toml` (Linux/macOS)
//!    `%APPDATA%\eml2html\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Command-line flags override whatever the file says.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Output directory settings.
    pub output: OutputConfig,
    /// Remote fetching settings.
    pub fetch: FetchConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Output directory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Storage dir of downloaded media.
    pub media_dir: PathBuf,
    /// Storage dir of extracted attachments.
    pub attachment_dir: PathBuf,
}

/// Remote fetching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Download remote media by default.
    pub download_remote: bool,
    /// Policy for unresolved remote references: "keep" or "remove".
    pub unresolved_remote: String,
    /// User-Agent header sent with remote fetches.
    pub user_agent: Option<String>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from("media"),
            attachment_dir: PathBuf::from("attachments"),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            download_remote: false,
            unresolved_remote: "keep".to_string(),
            user_agent: None,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    // 1. Environment variable override
    if let Ok(env_path) = std::env::var("EML2HTML_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    // 2. Standard config directory
    dirs::config_dir().map(|d| d.join("eml2html").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eml2html")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("eml2html.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.output.media_dir, PathBuf::from("media"));
        assert_eq!(cfg.output.attachment_dir, PathBuf::from("attachments"));
        assert!(!cfg.fetch.download_remote);
        assert_eq!(cfg.fetch.unresolved_remote, "keep");
        assert!(cfg.fetch.user_agent.is_none());
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.general.log_level, cfg.general.log_level);
        assert_eq!(parsed.output.media_dir, cfg.output.media_dir);
        assert_eq!(parsed.fetch.download_remote, cfg.fetch.download_remote);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[output]
media_dir = "images"

[fetch]
download_remote = true
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.output.media_dir, PathBuf::from("images"));
        assert!(cfg.fetch.download_remote);
        // Other fields use defaults
        assert_eq!(cfg.output.attachment_dir, PathBuf::from("attachments"));
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.fetch.unresolved_remote, "keep");
    }
}
