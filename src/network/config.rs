//! Constraint engine configuration.

/// Configuration for the [`ConstraintEngine`](super::ConstraintEngine).
///
/// # Examples
///
/// ```
/// use u_plansearch::network::EngineConfig;
///
/// let config = EngineConfig::default().with_tolerate_violations(true);
/// assert!(config.tolerate_violations);
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// When set, a rule that would empty a domain is suspended and charged
    /// its penalty instead of failing propagation.
    pub tolerate_violations: bool,
}

impl EngineConfig {
    pub fn with_tolerate_violations(mut self, tolerate: bool) -> Self {
        self.tolerate_violations = tolerate;
        self
    }
}
