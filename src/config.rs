use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::provider::Platform;

pub const CONFIG_FILE: &str = ".forge-bridge.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid FORGE_BRIDGE_PLATFORM: {0}")]
    Platform(String),
}

/// Top-level configuration loaded from .forge-bridge.toml.
///
/// Every field is optional; an empty or missing file talks to gitlab.com
/// anonymously.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_platform")]
    pub platform: Platform,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub gitlab: PlatformConfig,

    #[serde(default)]
    pub github: PlatformConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            timeout_secs: default_timeout_secs(),
            gitlab: PlatformConfig::default(),
            github: PlatformConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformConfig {
    /// API root; the public instance when unset
    pub base_url: Option<String>,
    /// If None, falls back to GITLAB_TOKEN / GITHUB_TOKEN.
    pub token: Option<String>,
}

fn default_platform() -> Platform {
    Platform::GitLab
}

fn default_timeout_secs() -> u64 {
    30
}

fn token_env_var(platform: Platform) -> &'static str {
    match platform {
        Platform::GitLab => "GITLAB_TOKEN",
        Platform::GitHub => "GITHUB_TOKEN",
    }
}

impl Config {
    /// Load configuration from .forge-bridge.toml in the current directory,
    /// falling back to defaults when the file doesn't exist, then apply
    /// environment overrides.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(CONFIG_FILE);
        let mut config = if path.exists() {
            Self::load_from(path)?
        } else {
            Config::default()
        };

        if let Ok(platform) = std::env::var("FORGE_BRIDGE_PLATFORM") {
            config.platform = platform.parse().map_err(ConfigError::Platform)?;
        }

        for platform in [Platform::GitLab, Platform::GitHub] {
            let section = config.section_mut(platform);
            if section.token.is_none() {
                section.token = std::env::var(token_env_var(platform)).ok();
            }
        }

        Ok(config)
    }

    /// Load from a specific path without environment overrides.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    fn section(&self, platform: Platform) -> &PlatformConfig {
        match platform {
            Platform::GitLab => &self.gitlab,
            Platform::GitHub => &self.github,
        }
    }

    fn section_mut(&mut self, platform: Platform) -> &mut PlatformConfig {
        match platform {
            Platform::GitLab => &mut self.gitlab,
            Platform::GitHub => &mut self.github,
        }
    }

    /// Token for a platform: config file value first, then its env var.
    /// Blank values count as absent.
    pub fn token(&self, platform: Platform) -> Option<String> {
        self.section(platform)
            .token
            .clone()
            .or_else(|| std::env::var(token_env_var(platform)).ok())
            .filter(|t| !t.trim().is_empty())
    }

    pub fn base_url(&self, platform: Platform) -> String {
        self.section(platform).base_url.clone().unwrap_or_else(|| {
            match platform {
                Platform::GitLab => crate::gitlab::DEFAULT_BASE_URL,
                Platform::GitHub => crate::github::DEFAULT_BASE_URL,
            }
            .to_string()
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
