//! Decision and solver configuration.

use crate::error::ConfigError;

/// How near-equal flaw priorities are separated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TieBreak {
    /// Higher identity key wins. No choice counting.
    #[default]
    HigherKey,
    /// Fewer available choices wins; equal counts fall back to the key.
    FewerChoices,
}

/// Configuration for the [`DecisionManager`](super::DecisionManager).
///
/// Two priorities whose difference is at most `epsilon` are treated as
/// equal. A flaw from a later strategy replaces the current best only
/// when it is better by more than `epsilon`.
///
/// # Examples
///
/// ```
/// use u_plansearch::search::{DecisionConfig, TieBreak};
///
/// let config = DecisionConfig::default()
///     .with_epsilon(1e-9)
///     .with_tie_break(TieBreak::FewerChoices)
///     .with_max_value_choices(16);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecisionConfig {
    /// Priority tolerance.
    pub epsilon: f64,

    /// Tie-break for priorities within `epsilon`.
    pub tie_break: TieBreak,

    /// Largest domain enumerated value by value. Larger numeric domains
    /// offer only their finite bounds.
    pub max_value_choices: usize,

    /// Leave numeric variables with an infinite base bound out of the flaw
    /// sets. Such a variable has no value to try.
    pub skip_unbounded: bool,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            tie_break: TieBreak::default(),
            max_value_choices: 64,
            skip_unbounded: true,
        }
    }
}

impl DecisionConfig {
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_max_value_choices(mut self, n: usize) -> Self {
        self.max_value_choices = n;
        self
    }

    pub fn with_skip_unbounded(mut self, skip: bool) -> Self {
        self.skip_unbounded = skip;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(ConfigError::new(
                "epsilon",
                format!("must be finite and non-negative, got {}", self.epsilon),
            ));
        }
        if self.max_value_choices < 2 {
            return Err(ConfigError::new(
                "max_value_choices",
                format!("must be at least 2, got {}", self.max_value_choices),
            ));
        }
        Ok(())
    }
}

/// Budgets for the [`Solver`](super::Solver). Each limit is checked
/// between decisions; 0 means no limit.
///
/// # Examples
///
/// ```
/// use u_plansearch::search::SolverConfig;
///
/// let config = SolverConfig::default()
///     .with_max_steps(10_000)
///     .with_timeout_ms(500);
/// assert_eq!(config.max_depth, 0);
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolverConfig {
    /// Maximum number of decisions opened. 0 = no limit.
    pub max_steps: usize,

    /// Maximum depth of the decision stack. 0 = no limit.
    pub max_depth: usize,

    /// Wall-clock budget in milliseconds. 0 = no limit.
    pub timeout_ms: u64,
}

impl SolverConfig {
    pub fn with_max_steps(mut self, n: usize) -> Self {
        self.max_steps = n;
        self
    }

    pub fn with_max_depth(mut self, n: usize) -> Self {
        self.max_depth = n;
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DecisionConfig::default();
        assert!((config.epsilon - 1e-6).abs() < 1e-15);
        assert_eq!(config.tie_break, TieBreak::HigherKey);
        assert!(config.validate().is_ok());

        let solver = SolverConfig::default();
        assert_eq!((solver.max_steps, solver.max_depth, solver.timeout_ms), (0, 0, 0));
    }

    #[test]
    fn test_validate_bad_epsilon() {
        assert!(DecisionConfig::default().with_epsilon(-1.0).validate().is_err());
        assert!(DecisionConfig::default().with_epsilon(f64::NAN).validate().is_err());
        assert!(DecisionConfig::default().with_epsilon(0.0).validate().is_ok());
    }

    #[test]
    fn test_validate_value_choices() {
        let err = DecisionConfig::default()
            .with_max_value_choices(1)
            .validate()
            .unwrap_err();
        assert_eq!(err.field, "max_value_choices");
    }
}
