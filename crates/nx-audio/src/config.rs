use serde::{Deserialize, Serialize};

use crate::error::AudioOutError;
use crate::{SAMPLE_BUFFER_SIZE, SAMPLE_RATE};

pub const DEFAULT_LATENCY_MS: u32 = 64;

/// Driver settings handed down by the frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioOutConfig {
    /// Requested device. The service exposes a single output, so this is informational.
    pub device: Option<String>,
    /// Requested sample rate. The negotiated rate is always [`SAMPLE_RATE`].
    pub rate: u32,
    /// Audio buffered before a partially filled buffer is submitted.
    pub latency_ms: u32,
    /// Start in blocking mode.
    pub block_frames: bool,
}

impl Default for AudioOutConfig {
    fn default() -> Self {
        Self {
            device: None,
            rate: SAMPLE_RATE,
            latency_ms: DEFAULT_LATENCY_MS,
            block_frames: true,
        }
    }
}

impl AudioOutConfig {
    /// Build a config from `NX_AUDIO_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AudioOutConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Some(device) = lookup("NX_AUDIO_DEVICE") {
            let device = device.trim();
            if !device.is_empty() {
                cfg.device = Some(device.to_owned());
            }
        }
        if let Some(raw) = lookup("NX_AUDIO_RATE") {
            cfg.rate = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv("NX_AUDIO_RATE"))?;
        }
        if let Some(raw) = lookup("NX_AUDIO_LATENCY_MS") {
            cfg.latency_ms = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv("NX_AUDIO_LATENCY_MS"))?;
        }
        if let Some(raw) = lookup("NX_AUDIO_BLOCK") {
            cfg.block_frames = match raw.trim() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(ConfigError::InvalidEnv("NX_AUDIO_BLOCK")),
            };
        }

        Ok(cfg)
    }

    /// Bytes buffered before a write submits the checked-out buffer.
    ///
    /// The latency budget is applied directly as a byte count against the fixed 48 kHz rate.
    pub fn flush_threshold(&self) -> usize {
        flush_threshold(self.latency_ms)
    }

    pub fn validate(&self) -> Result<(), AudioOutError> {
        if self.latency_ms == 0 {
            return Err(AudioOutError::InvalidConfig("latency_ms must be non-zero"));
        }
        if self.flush_threshold() >= SAMPLE_BUFFER_SIZE {
            return Err(AudioOutError::InvalidConfig(
                "latency_ms exceeds what one output buffer can hold",
            ));
        }
        Ok(())
    }
}

pub(crate) fn flush_threshold(latency_ms: u32) -> usize {
    (u64::from(SAMPLE_RATE) * u64::from(latency_ms) / 1000) as usize
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidEnv(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEnv(var) => write!(f, "invalid value for env var {var}"),
        }
    }
}

impl std::error::Error for ConfigError {}
