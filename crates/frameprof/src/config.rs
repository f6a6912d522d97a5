//! Tunable engine constants, collected into one value supplied at
//! construction rather than hardwired (§10).

use thiserror::Error;

/// Engine version string embedded into every [`crate::store::Recording`].
const DEFAULT_ENGINE_VERSION: &str = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"));

/// Validation failure for an [`EngineConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("alpha must be in (0, 1), got {0}")]
    InvalidAlpha(String),
    #[error("outlier_capacity must be non-zero")]
    ZeroOutlierCapacity,
    #[error("pool_size must be non-zero")]
    ZeroPoolSize,
    #[error("retention_capacity must be non-zero")]
    ZeroRetentionCapacity,
}

/// Tunable constants for an [`crate::engine::Engine`] instance.
///
/// Constructed with sensible defaults matching every numeric default named
/// in the component design (§4); tests typically override `outlier_capacity`
/// or `pool_size` to exercise small-scale fixtures cheaply.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Relative error for the log-binned histogram tier.
    pub alpha: f64,
    /// `TopK` capacity, i.e. how many exact outliers a tracker retains.
    pub outlier_capacity: usize,
    /// Bin vectors preallocated at engine start.
    pub pool_size: usize,
    /// Upper bound, in milliseconds, used to size bin vectors without
    /// resizing; observations beyond this clamp into the last bin.
    pub max_observed_ms: f64,
    /// Maximum number of recordings the persisted store retains.
    pub retention_capacity: usize,
    /// Embedded into every snapshot and recording for off-line provenance.
    pub engine_version: &'static str,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            outlier_capacity: 10,
            pool_size: 100,
            max_observed_ms: 100.0,
            retention_capacity: 50,
            engine_version: DEFAULT_ENGINE_VERSION,
        }
    }
}

impl EngineConfig {
    /// Validates this configuration, returning it unchanged on success.
    ///
    /// Configuration is host input, and host input is validated at the
    /// boundary rather than allowed to panic deep inside the engine.
    pub fn validated(self) -> Result<Self, ConfigError> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ConfigError::InvalidAlpha(self.alpha.to_string()));
        }
        if self.outlier_capacity == 0 {
            return Err(ConfigError::ZeroOutlierCapacity);
        }
        if self.pool_size == 0 {
            return Err(ConfigError::ZeroPoolSize);
        }
        if self.retention_capacity == 0 {
            return Err(ConfigError::ZeroRetentionCapacity);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(EngineConfig::default().validated().is_ok());
    }

    #[test]
    fn rejects_out_of_range_alpha() {
        let bad = EngineConfig {
            alpha: 0.0,
            ..EngineConfig::default()
        };
        assert!(matches!(bad.validated(), Err(ConfigError::InvalidAlpha(_))));

        let bad = EngineConfig {
            alpha: 1.0,
            ..EngineConfig::default()
        };
        assert!(matches!(bad.validated(), Err(ConfigError::InvalidAlpha(_))));
    }

    #[test]
    fn rejects_zero_capacities() {
        assert_eq!(
            EngineConfig { outlier_capacity: 0, ..EngineConfig::default() }.validated(),
            Err(ConfigError::ZeroOutlierCapacity)
        );
        assert_eq!(
            EngineConfig { pool_size: 0, ..EngineConfig::default() }.validated(),
            Err(ConfigError::ZeroPoolSize)
        );
        assert_eq!(
            EngineConfig { retention_capacity: 0, ..EngineConfig::default() }.validated(),
            Err(ConfigError::ZeroRetentionCapacity)
        );
    }
}
