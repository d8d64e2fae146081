#![forbid(unsafe_code)]

//! Registry configuration.
//!
//! With the `policy-config` feature, a [`RegistryConfig`] can be loaded from a
//! TOML or JSON policy document. Missing fields take their defaults.
//!
//! ```toml
//! max_cycles = 20
//! warn_on_scheduled_error = false
//! ```

use crate::error::ConfigError;

/// Tunables for a [`Registry`](crate::Registry).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "policy-config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "policy-config", serde(default))]
pub struct RegistryConfig {
    /// A pass fails with a feedback-loop error when its cycle counter reaches
    /// this value.
    pub max_cycles: usize,
    /// Log a warning when a scheduled pass fails and its error is parked.
    pub warn_on_scheduled_error: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_cycles: 10,
            warn_on_scheduled_error: true,
        }
    }
}

impl RegistryConfig {
    #[must_use]
    pub fn with_max_cycles(mut self, max_cycles: usize) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    #[must_use]
    pub fn with_warn_on_scheduled_error(mut self, enabled: bool) -> Self {
        self.warn_on_scheduled_error = enabled;
        self
    }

    /// Reject limits that would fail every pass.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cycles < 2 {
            return Err(ConfigError::InvalidMaxCycles);
        }
        Ok(())
    }

    #[cfg(feature = "policy-config")]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "policy-config")]
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.max_cycles, 10);
        assert!(config.warn_on_scheduled_error);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builders_and_validation() {
        let config = RegistryConfig::default()
            .with_max_cycles(3)
            .with_warn_on_scheduled_error(false);
        assert_eq!(config.max_cycles, 3);
        assert!(!config.warn_on_scheduled_error);
        assert_eq!(
            RegistryConfig::default().with_max_cycles(1).validate(),
            Err(ConfigError::InvalidMaxCycles)
        );
    }

    #[cfg(feature = "policy-config")]
    #[test]
    fn loads_policy_documents() {
        let config = RegistryConfig::from_toml_str("max_cycles = 20").expect("toml");
        assert_eq!(config.max_cycles, 20);
        assert!(config.warn_on_scheduled_error);

        let config =
            RegistryConfig::from_json_str(r#"{"warn_on_scheduled_error": false}"#).expect("json");
        assert_eq!(config.max_cycles, 10);
        assert!(!config.warn_on_scheduled_error);

        assert_eq!(
            RegistryConfig::from_toml_str("max_cycles = 0"),
            Err(ConfigError::InvalidMaxCycles)
        );
        assert!(matches!(
            RegistryConfig::from_json_str("{"),
            Err(ConfigError::Parse { .. })
        ));
    }
}
