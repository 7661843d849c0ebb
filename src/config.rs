use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::ConfigError;
use crate::media::SourceType;
use crate::segmenter::ffmpeg::DEFAULT_FFMPEG;
use crate::segmenter::writer::DEFAULT_CONTAINER;

/// Bytes per configured storage gigabyte.
pub const GIGABYTE: u64 = 1 << 30;

// ---------- Storage ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    pub path: String,
    pub size_gb: u64,
    pub segment_seconds: u32,
}

impl StorageConfig {
    pub fn budget_bytes(&self) -> u64 {
        self.size_gb.saturating_mul(GIGABYTE)
    }
}

// ---------- Source ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    #[serde(rename = "type")]
    pub source_type: SourceType,
}

// ---------- Retention ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetentionConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl RetentionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

// ---------- Muxer ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MuxerConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_container")]
    pub container: String,
}

impl Default for MuxerConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            container: default_container(),
        }
    }
}

fn default_ffmpeg() -> String {
    DEFAULT_FFMPEG.to_string()
}

fn default_container() -> String {
    DEFAULT_CONTAINER.to_string()
}

// ---------- Root ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub muxer: MuxerConfig,
}

impl Config {
    pub fn from_toml(txt: &str) -> Result<Self, ConfigError> {
        let cfg: Config =
            toml::from_str(txt).map_err(|e| ConfigError::with_context("parsing config", e))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.path.trim().is_empty() {
            return Err(ConfigError::message("storage.path must not be empty"));
        }
        if self.storage.size_gb == 0 {
            return Err(ConfigError::message("storage.size_gb must be greater than zero"));
        }
        if self.storage.segment_seconds == 0 {
            return Err(ConfigError::message(
                "storage.segment_seconds must be greater than zero",
            ));
        }
        if self.retention.interval_secs == 0 {
            return Err(ConfigError::message(
                "retention.interval_secs must be greater than zero",
            ));
        }
        if self.muxer.container.trim().is_empty() {
            return Err(ConfigError::message("muxer.container must not be empty"));
        }
        Ok(())
    }
}

// ---------- Loader ----------
pub fn load(path: &str) -> anyhow::Result<Config> {
    let txt = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    Ok(Config::from_toml(&txt)?)
}
