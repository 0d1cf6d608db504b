use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chart::ChartStyle;

const CONFIG_FILE: &str = "config.toml";
const APP_DIR: &str = "study_stats";
const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const API_URL_ENV: &str = "STUDY_API_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Decode(#[from] toml::de::Error),
    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("invalid [chart] section in {path}: {reason}")]
    InvalidChart { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub chart: ChartStyle,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            chart: ChartStyle::default(),
        }
    }
}

impl Config {
    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Config::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config: Config = toml::from_str(&raw)?;
        if let Some(reason) = config.chart.problem() {
            return Err(ConfigError::InvalidChart {
                path: path.to_path_buf(),
                reason,
            });
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_api_url_override(mut self, api_url: Option<String>) -> Self {
        if let Some(api_url) = api_url {
            if !api_url.trim().is_empty() {
                self.api_url = api_url;
            }
        }
        self
    }

    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub fn resolve_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    cli_path.unwrap_or_else(|| config_dir().join(CONFIG_FILE))
}

fn config_dir() -> PathBuf {
    if let Some(path) = env::var_os("STUDY_STATS_CONFIG_DIR") {
        return PathBuf::from(path);
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(path) = env::var_os("APPDATA") {
            return PathBuf::from(path).join(APP_DIR);
        }
    }

    if let Some(path) = env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(path).join(APP_DIR);
    }

    if let Some(path) = env::var_os("HOME") {
        return PathBuf::from(path).join(".config").join(APP_DIR);
    }

    PathBuf::from(".study_stats")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{Config, ConfigError};

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = Config::load(&dir.path().join("config.toml")).expect("load should succeed");
        assert_eq!(config, Config::default());
        assert_eq!(config.chart.max_width, 210.0);
        assert_eq!(config.chart.min_width, 50.0);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "api_url = \"https://study.example.com/\"\n\n[chart]\nmin_width = 30.0\n",
        )
        .expect("write config");

        let config = Config::load(&path).expect("load should succeed");
        assert_eq!(config.base_url(), "https://study.example.com");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.chart.min_width, 30.0);
        assert_eq!(config.chart.max_width, 210.0);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.request_timeout_secs = 5;
        config.save(&path).expect("save should succeed");
        assert_eq!(Config::load(&path).expect("load should succeed"), config);
    }

    #[test]
    fn env_override_replaces_api_url_unless_blank() {
        let config = Config::default().with_api_url_override(Some("http://10.0.0.2:3000".to_string()));
        assert_eq!(config.api_url, "http://10.0.0.2:3000");

        let config = Config::default().with_api_url_override(Some("  ".to_string()));
        assert_eq!(config.api_url, "http://localhost:3000");
    }

    #[test]
    fn rejects_malformed_toml() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_url = [").expect("write config");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn rejects_inverted_chart_widths() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[chart]\nmin_width = 300.0\n").expect("write config");

        let err = Config::load(&path).expect_err("inverted widths should be rejected");
        assert!(matches!(err, ConfigError::InvalidChart { .. }), "{err:?}");
        assert!(err.to_string().contains("min_width (300) is larger than max_width (210)"));
    }

    #[test]
    fn rejects_non_finite_chart_widths() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[chart]\nmax_width = nan\n").expect("write config");

        let err = Config::load(&path).expect_err("nan width should be rejected");
        assert!(matches!(err, ConfigError::InvalidChart { .. }), "{err:?}");
    }
}
