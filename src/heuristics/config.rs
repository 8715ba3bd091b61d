//! Heuristics configuration.

use super::rule::{MAX_PRIORITY, MIN_PRIORITY};
use crate::error::ConfigError;

/// Configuration for the [`HeuristicsEngine`](super::HeuristicsEngine).
///
/// # Examples
///
/// ```
/// use u_plansearch::heuristics::HeuristicsConfig;
///
/// let config = HeuristicsConfig::default()
///     .with_prefer_low_priority(false)
///     .with_default_token_priority(500.0)
///     .with_seed(7);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeuristicsConfig {
    /// Lower priority values are better when set.
    pub prefer_low_priority: bool,

    /// Priority of a threat no rule matches.
    pub default_threat_priority: f64,

    /// Priority of an open condition no rule matches.
    pub default_token_priority: f64,

    /// Priority of a variable no rule matches.
    pub default_variable_priority: f64,

    /// Seed for random value ordering. `None` draws one at construction.
    pub seed: Option<u64>,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            prefer_low_priority: true,
            default_threat_priority: 10_000.0,
            default_token_priority: 20_000.0,
            default_variable_priority: 30_000.0,
            seed: None,
        }
    }
}

impl HeuristicsConfig {
    pub fn with_prefer_low_priority(mut self, prefer_low: bool) -> Self {
        self.prefer_low_priority = prefer_low;
        self
    }

    pub fn with_default_threat_priority(mut self, p: f64) -> Self {
        self.default_threat_priority = p;
        self
    }

    pub fn with_default_token_priority(mut self, p: f64) -> Self {
        self.default_token_priority = p;
        self
    }

    pub fn with_default_variable_priority(mut self, p: f64) -> Self {
        self.default_variable_priority = p;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// The priority no flaw can improve on.
    pub fn best_possible(&self) -> f64 {
        if self.prefer_low_priority {
            MIN_PRIORITY
        } else {
            MAX_PRIORITY
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let defaults = [
            ("default_threat_priority", self.default_threat_priority),
            ("default_token_priority", self.default_token_priority),
            ("default_variable_priority", self.default_variable_priority),
        ];
        for (field, p) in defaults {
            if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&p) {
                return Err(ConfigError::new(
                    field,
                    format!("must be in [{MIN_PRIORITY}, {MAX_PRIORITY}], got {p}"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HeuristicsConfig::default();
        assert!(config.prefer_low_priority);
        assert!(config.default_threat_priority < config.default_token_priority);
        assert!(config.default_token_priority < config.default_variable_priority);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_best_possible_follows_preference() {
        assert_eq!(HeuristicsConfig::default().best_possible(), MIN_PRIORITY);
        let high = HeuristicsConfig::default().with_prefer_low_priority(false);
        assert_eq!(high.best_possible(), MAX_PRIORITY);
    }

    #[test]
    fn test_validate_out_of_range() {
        let config = HeuristicsConfig::default().with_default_variable_priority(1e9);
        let err = config.validate().unwrap_err();
        assert_eq!(err.field, "default_variable_priority");

        let nan = HeuristicsConfig::default().with_default_token_priority(f64::NAN);
        assert!(nan.validate().is_err());
    }
}
