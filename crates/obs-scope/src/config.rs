//! Scope configuration

use crate::error::ConfigError;
use obs_overlay::OverlayKeys;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

/// Main scope configuration
///
/// ```toml
/// [keys]
/// region = "OBS_REGION"
///
/// [engine]
/// max_in_flight = 16
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Variable names the overlay writes
    #[serde(default)]
    pub keys: OverlayKeys,

    /// Bundled engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl ScopeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With overlay key names
    #[inline]
    #[must_use]
    pub fn with_keys(mut self, keys: OverlayKeys) -> Self {
        self.keys = keys;
        self
    }

    /// With engine settings
    #[inline]
    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// - `ConfigError::Parse` if the document is not valid TOML for this shape
    /// - `ConfigError::EmptyKey`, `ConfigError::ZeroCapacity` or
    ///   `ConfigError::CapacityTooLarge` from [`Self::validate`]
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express
    ///
    /// # Errors
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(field) = self.keys.first_empty() {
            return Err(ConfigError::EmptyKey(field));
        }
        if self.engine.max_in_flight == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.engine.max_in_flight > Semaphore::MAX_PERMITS {
            return Err(ConfigError::CapacityTooLarge {
                max: Semaphore::MAX_PERMITS,
            });
        }
        Ok(())
    }
}

/// Settings for [`crate::TokioEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum nested blocks running at once (default: 64)
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

fn default_max_in_flight() -> usize {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl EngineConfig {
    /// With in-flight limit
    #[inline]
    #[must_use]
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max;
        self
    }
}
