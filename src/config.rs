//! Run configuration.
//!
//! Loaded from a TOML file; every key is optional and falls back to the default
//! below. Command-line flags are applied on top by the binary.
//!
//! ```toml
//! device_name_prefix = "fuzzy device"
//! max_capabilities = 64
//! abs_min = 0
//! abs_max = 100
//! max_frames = 200
//! max_events_per_frame = 12
//! value_bound = 50
//! iteration_delay_us = 500
//! # iterations = 10
//! # seed = 1234
//! log_priority = "debug"
//! descriptor_format = "evemu"
//! backend = "loopback"
//! ```

use crate::backends::{BackendKind, LogPriority};
use crate::capability::{AbsRange, CapabilityLimits, DEFAULT_MAX_CAPABILITIES};
use crate::descriptor::DescriptorFormat;
use crate::stream::{StreamLimits, DEFAULT_MAX_EVENTS_PER_FRAME, DEFAULT_MAX_FRAMES};
use crate::value::DEFAULT_VALUE_BOUND;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings for a fuzzing run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FuzzConfig {
    /// Devices are named `"<prefix> <iteration>"`.
    pub device_name_prefix: String,
    pub max_capabilities: u32,
    pub abs_min: i32,
    pub abs_max: i32,
    pub max_frames: u32,
    pub max_events_per_frame: u32,
    pub value_bound: i32,
    /// Pause between iterations, in microseconds.
    pub iteration_delay_us: u64,
    /// Stop after this many iterations; run until cancelled when absent.
    pub iterations: Option<u64>,
    /// Rng seed; a random one is drawn (and logged) when absent.
    pub seed: Option<u64>,
    pub log_priority: LogPriority,
    pub descriptor_format: DescriptorFormat,
    pub backend: BackendKind,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        let abs = AbsRange::default();
        Self {
            device_name_prefix: "fuzzy device".to_string(),
            max_capabilities: DEFAULT_MAX_CAPABILITIES,
            abs_min: abs.minimum,
            abs_max: abs.maximum,
            max_frames: DEFAULT_MAX_FRAMES,
            max_events_per_frame: DEFAULT_MAX_EVENTS_PER_FRAME,
            value_bound: DEFAULT_VALUE_BOUND,
            iteration_delay_us: 500,
            iterations: None,
            seed: None,
            log_priority: LogPriority::Debug,
            descriptor_format: DescriptorFormat::Evemu,
            backend: BackendKind::Loopback,
        }
    }
}

impl FuzzConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.device_name_prefix.trim().is_empty() {
            return invalid("device_name_prefix must not be empty");
        }
        if self.max_capabilities == 0 {
            return invalid("max_capabilities must be at least 1");
        }
        if self.max_frames == 0 {
            return invalid("max_frames must be at least 1");
        }
        if self.max_events_per_frame == 0 {
            return invalid("max_events_per_frame must be at least 1");
        }
        if self.value_bound <= 0 {
            return invalid("value_bound must be positive");
        }
        if self.abs_min >= self.abs_max {
            return Err(ConfigError::Invalid(format!(
                "abs_min ({}) must be below abs_max ({})",
                self.abs_min, self.abs_max
            )));
        }
        Ok(())
    }

    pub fn capability_limits(&self) -> CapabilityLimits {
        CapabilityLimits {
            max_capabilities: self.max_capabilities,
            abs_range: AbsRange {
                minimum: self.abs_min,
                maximum: self.abs_max,
            },
        }
    }

    pub fn stream_limits(&self) -> StreamLimits {
        StreamLimits {
            max_frames: self.max_frames,
            max_events_per_frame: self.max_events_per_frame,
            value_bound: self.value_bound,
        }
    }

    pub fn iteration_delay(&self) -> Duration {
        Duration::from_micros(self.iteration_delay_us)
    }

    /// Display name of the device for `iteration`.
    pub fn device_name(&self, iteration: u64) -> String {
        format!("{} {iteration}", self.device_name_prefix)
    }
}
