//! Configuration file support for awsmgr.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (AWSMGR_*)
//! 3. Local config file (./awsmgr.toml)
//! 4. Global config file (~/.config/awsmgr/config.toml)

use awsmgr::WaitPolicy;
use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Local configuration file name.
pub const LOCAL_CONFIG_FILE: &str = "awsmgr.toml";

/// SDK client settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AwsConfig {
    /// Region used when neither `--region` nor the environment sets one.
    pub region: Option<String>,
    /// Named credentials profile.
    pub profile: Option<String>,
    /// Endpoint override (e.g. a local emulator).
    pub endpoint_url: Option<String>,
}

/// Object storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct S3Config {
    /// Default location for new buckets.
    pub bucket_region: Option<String>,
    /// Use path-style addressing.
    #[serde(default)]
    pub force_path_style: bool,
    /// Seconds between existence checks after a bucket delete.
    pub wait_delay_secs: Option<u64>,
    /// Existence checks before giving up on a bucket delete.
    pub wait_max_attempts: Option<u32>,
}

impl S3Config {
    /// Waiter policy with unset fields at their defaults.
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::new(
            self.wait_delay_secs
                .map_or(WaitPolicy::DEFAULT_DELAY, Duration::from_secs),
            self.wait_max_attempts
                .unwrap_or(WaitPolicy::DEFAULT_MAX_ATTEMPTS),
        )
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// SDK client settings.
    #[serde(default)]
    pub aws: AwsConfig,
    /// Object storage settings.
    #[serde(default)]
    pub s3: S3Config,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Load local config (overrides global)
        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {} (invalid TOML): {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "awsmgr").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        // AWS client settings
        if other.aws.region.is_some() {
            self.aws.region = other.aws.region;
        }
        if other.aws.profile.is_some() {
            self.aws.profile = other.aws.profile;
        }
        if other.aws.endpoint_url.is_some() {
            self.aws.endpoint_url = other.aws.endpoint_url;
        }

        // S3 settings
        if other.s3.bucket_region.is_some() {
            self.s3.bucket_region = other.s3.bucket_region;
        }
        if other.s3.force_path_style {
            self.s3.force_path_style = true;
        }
        if other.s3.wait_delay_secs.is_some() {
            self.s3.wait_delay_secs = other.s3.wait_delay_secs;
        }
        if other.s3.wait_max_attempts.is_some() {
            self.s3.wait_max_attempts = other.s3.wait_max_attempts;
        }
    }
}
