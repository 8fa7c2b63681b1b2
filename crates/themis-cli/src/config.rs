//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use themis_engine::ReducerConfig;
use themis_wire::DEFAULT_BACKEND_URL;

/// Configuration for themis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend base URL override. Unset means the default local backend.
    pub backend_url: Option<String>,
    /// Show sub-agent activity. When false, only the assistant text is tracked.
    pub subagents: bool,
    /// Tool calls slower than this are flagged
    pub tool_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: None,
            subagents: true,
            tool_timeout_secs: 20,
        }
    }
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("themis")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("THEMIS_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`. Missing or unreadable files give defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }
        Self::default().save()
    }

    /// Set or clear the backend URL override. Empty input clears it.
    pub fn set_backend_url(&mut self, url: &str) {
        self.backend_url = normalize_backend_url(url);
    }

    /// Backend URL to use: the flag, then the saved override, then the default
    pub fn resolve_backend_url(&self, flag: Option<&str>) -> String {
        flag.and_then(normalize_backend_url)
            .or_else(|| self.backend_url.as_deref().and_then(normalize_backend_url))
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
    }

    pub fn reducer_config(&self) -> ReducerConfig {
        ReducerConfig {
            subagents: self.subagents,
            tool_timeout: Duration::from_secs(self.tool_timeout_secs),
        }
    }
}

/// Strip whitespace and trailing slashes. `None` if nothing is left.
pub fn normalize_backend_url(url: &str) -> Option<String> {
    let url = url.trim().trim_end_matches('/');
    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# themis configuration file
# Place at ~/.config/themis/config.toml (Linux/Mac) or %APPDATA%\themis\config.toml (Windows)
# or point THEMIS_CONFIG_PATH at a file of your choice.

# Backend base URL (default: http://localhost:8000)
# backend_url = "https://research.example.com"

# Show sub-agent activity and tool calls (true by default)
# Set to false for plain chat
subagents = true

# Tool calls that take longer than this many seconds are flagged
tool_timeout_secs = 20
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_backend_url() {
        assert_eq!(
            normalize_backend_url(" http://host:9000/// "),
            Some("http://host:9000".into())
        );
        assert_eq!(normalize_backend_url(""), None);
        assert_eq!(normalize_backend_url("  / "), None);
    }

    #[test]
    fn test_resolution_order() {
        let mut cfg = Config::default();
        assert_eq!(cfg.resolve_backend_url(None), DEFAULT_BACKEND_URL);

        cfg.set_backend_url("https://saved.example.com/");
        assert_eq!(cfg.resolve_backend_url(None), "https://saved.example.com");
        assert_eq!(
            cfg.resolve_backend_url(Some("http://flag:1/")),
            "http://flag:1"
        );
        // An empty flag does not shadow the saved value
        assert_eq!(cfg.resolve_backend_url(Some("")), "https://saved.example.com");

        cfg.set_backend_url("");
        assert_eq!(cfg.backend_url, None);
        assert_eq!(cfg.resolve_backend_url(None), DEFAULT_BACKEND_URL);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.set_backend_url("http://10.0.0.5:8000/");
        cfg.subagents = false;
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.backend_url.as_deref(), Some("http://10.0.0.5:8000"));
    }

    #[test]
    fn test_missing_and_malformed_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        assert_eq!(Config::load_from(&path), Config::default());

        fs::write(&path, "backend_url = [not toml").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "tool_timeout_secs = 5\n").unwrap();

        let cfg = Config::load_from(&path);
        assert!(cfg.subagents);
        assert_eq!(cfg.reducer_config().tool_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_example_config_parses() {
        let cfg: Config = toml::from_str(example_config()).unwrap();
        assert_eq!(cfg, Config::default());
    }
}
