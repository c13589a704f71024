// ABOUTME: Configuration management for the taskflow application
// ABOUTME: Handles loading and merging configuration from files and environment variables

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::{BatchConfig, EngineConfig, DEFAULT_EMAIL_DELAY};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(with = "humantime_serde", default = "default_email_delay")]
    pub email_delay: Duration,

    #[serde(with = "humantime_serde", default)]
    pub task_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

fn default_email_delay() -> Duration {
    DEFAULT_EMAIL_DELAY
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            email_delay: default_email_delay(),
            task_timeout: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file path or default locations
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) if !p.exists() => {
                bail!("Configuration file not found: {}", p.display())
            }
            Some(p) => Some(p),
            None => Self::find_config_file(),
        };

        let mut config = match config_path {
            Some(ref path) => {
                let contents = std::fs::read_to_string(path)?;
                serde_yaml::from_str(&contents)?
            }
            None => Config::default(),
        };

        config.merge_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Engine settings derived from this configuration
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            batch: self.batch.clone(),
            task_timeout: self.engine.task_timeout,
        }
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let local = [
            "taskflow.yaml",
            "taskflow.yml",
            ".taskflow.yaml",
            ".taskflow.yml",
        ];

        if let Some(path) = local.iter().map(PathBuf::from).find(|p| p.exists()) {
            return Some(path);
        }

        dirs::home_dir()
            .map(|home| home.join(".taskflow").join("config.yaml"))
            .filter(|p| p.exists())
    }

    /// Merge environment variables into configuration
    fn merge_env(&mut self) -> Result<()> {
        if let Ok(level) = std::env::var("TASKFLOW_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("TASKFLOW_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Ok(size) = std::env::var("TASKFLOW_BATCH_SIZE") {
            self.batch.size = size.parse()?;
        }
        if let Ok(timeout) = std::env::var("TASKFLOW_BATCH_TIMEOUT_MS") {
            self.batch.timeout = Duration::from_millis(timeout.parse()?);
        }
        if let Ok(delay) = std::env::var("TASKFLOW_EMAIL_DELAY_MS") {
            self.engine.email_delay = Duration::from_millis(delay.parse()?);
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.batch.size == 0 {
            bail!("batch.size must be at least 1");
        }
        match self.logging.format.as_str() {
            "pretty" | "compact" | "json" => Ok(()),
            other => bail!(
                "Unknown logging format '{}'. Expected pretty, compact or json",
                other
            ),
        }
    }
}
