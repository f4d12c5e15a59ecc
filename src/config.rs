use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub watcher: WatcherConfig,
    pub reviews: ReviewsConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Milliseconds between artifact count polls (default: 2000)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewsConfig {
    /// Maximum rows scanned when counting pending reviews (default: 100)
    #[serde(default = "default_scan_limit")]
    pub scan_limit: u32,
    /// How many recent completion events are remembered for dedupe (default: 256)
    #[serde(default = "default_dedupe_window")]
    pub dedupe_window: usize,
}

fn default_scan_limit() -> u32 {
    100
}

fn default_dedupe_window() -> usize {
    256
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    pub enabled: bool,
    /// Also write every alert to the log
    pub log_alerts: bool,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_alerts: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding sessions.json and logs/
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Write logs to a file under the state directory instead of stderr
    #[serde(default)]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
        }
    }
}

impl Config {
    /// Path to the project config file
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".continuum/config.toml")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so the engine works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let project_config = Self::project_config_path();
        if project_config.exists() {
            builder = builder.add_source(config::File::from(project_config));
        }

        // User config in ~/.config/continuum/ (optional global overrides)
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("continuum").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment variables with CONTINUUM_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("CONTINUUM")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to .continuum/config.toml
    pub fn save(&self) -> Result<()> {
        let config_path = Self::project_config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        std::fs::write(&config_path, toml_str).context("Failed to write config file")?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.watcher.poll_interval_ms == 0 {
            bail!("watcher.poll_interval_ms must be greater than zero");
        }
        // A capped count renders as "{limit - 1}+", which needs a limit of 2 or more
        if self.reviews.scan_limit < 2 {
            bail!("reviews.scan_limit must be at least 2");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.watcher.poll_interval_ms)
    }

    pub fn state_path(&self) -> PathBuf {
        PathBuf::from(&self.paths.state)
    }

    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join("logs")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watcher: WatcherConfig {
                poll_interval_ms: default_poll_interval_ms(),
            },
            reviews: ReviewsConfig {
                scan_limit: default_scan_limit(),
                dedupe_window: default_dedupe_window(),
            },
            alerts: AlertsConfig::default(),
            paths: PathsConfig {
                state: ".continuum".to_string(),
            },
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.reviews.scan_limit, 100);
        assert!(config.alerts.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_logs_path_under_state() {
        let mut config = Config::default();
        config.paths.state = "/tmp/continuum-state".to_string();
        assert_eq!(config.logs_path(), PathBuf::from("/tmp/continuum-state/logs"));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.watcher.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.reviews.scan_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_scan_limit_of_one() {
        let mut config = Config::default();
        config.reviews.scan_limit = 1;
        assert!(config.validate().is_err());

        config.reviews.scan_limit = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_explicit_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[watcher]\npoll_interval_ms = 500\n\n[reviews]\nscan_limit = 50\n",
        )
        .unwrap();

        let config = Config::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.watcher.poll_interval_ms, 500);
        assert_eq!(config.reviews.scan_limit, 50);
        // Untouched sections keep their defaults
        assert_eq!(config.reviews.dedupe_window, 256);
        assert_eq!(config.paths.state, ".continuum");
    }

    #[test]
    fn test_toml_roundtrip_of_defaults() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.watcher.poll_interval_ms, config.watcher.poll_interval_ms);
        assert_eq!(parsed.logging.level, "info");
    }
}
