//! Temporal relations between a token and its master.

use crate::error::HeuristicError;
use std::fmt;
use std::str::FromStr;

const INF: f64 = f64::INFINITY;

/// Relation of a slave token to its master.
///
/// `None` means "no master". `Any`, `DontCare`, and `Other` only appear
/// as guard values in heuristic rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Relation {
    None,
    Any,
    DontCare,
    Other,
    /// Slave ends no later than the master starts.
    Before,
    /// Slave starts no earlier than the master ends.
    After,
    /// Slave ends exactly when the master starts.
    Meets,
    /// Slave starts exactly when the master ends.
    MetBy,
    Equals,
    /// Slave spans the master.
    Contains,
    /// Master spans the slave.
    ContainedBy,
}

/// Endpoints a relation constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Timepoint {
    MasterStart,
    MasterEnd,
    SlaveStart,
    SlaveEnd,
}

impl Relation {
    /// The relations a token can actually hold to its master.
    pub const ACTUAL: [Relation; 8] = [
        Relation::None,
        Relation::Before,
        Relation::After,
        Relation::Meets,
        Relation::MetBy,
        Relation::Equals,
        Relation::Contains,
        Relation::ContainedBy,
    ];

    /// The values a heuristic master guard may carry.
    pub const GUARDS: [Relation; 6] = [
        Relation::Any,
        Relation::DontCare,
        Relation::None,
        Relation::Other,
        Relation::Before,
        Relation::After,
    ];

    /// Distance edges `min <= y - x <= max` that realise the relation.
    pub(crate) fn edges(self) -> &'static [(Timepoint, Timepoint, f64, f64)] {
        use Timepoint::*;
        match self {
            Relation::Before => &[(SlaveEnd, MasterStart, 0.0, INF)],
            Relation::After => &[(MasterEnd, SlaveStart, 0.0, INF)],
            Relation::Meets => &[(SlaveEnd, MasterStart, 0.0, 0.0)],
            Relation::MetBy => &[(MasterEnd, SlaveStart, 0.0, 0.0)],
            Relation::Equals => &[
                (MasterStart, SlaveStart, 0.0, 0.0),
                (MasterEnd, SlaveEnd, 0.0, 0.0),
            ],
            Relation::Contains => &[
                (SlaveStart, MasterStart, 0.0, INF),
                (MasterEnd, SlaveEnd, 0.0, INF),
            ],
            Relation::ContainedBy => &[
                (MasterStart, SlaveStart, 0.0, INF),
                (SlaveEnd, MasterEnd, 0.0, INF),
            ],
            Relation::None | Relation::Any | Relation::DontCare | Relation::Other => &[],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Relation::None => "none",
            Relation::Any => "any",
            Relation::DontCare => "dont_care",
            Relation::Other => "other",
            Relation::Before => "before",
            Relation::After => "after",
            Relation::Meets => "meets",
            Relation::MetBy => "met_by",
            Relation::Equals => "equals",
            Relation::Contains => "contains",
            Relation::ContainedBy => "contained_by",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = HeuristicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let r = match s.to_ascii_lowercase().as_str() {
            "none" => Relation::None,
            "any" => Relation::Any,
            "dont_care" | "dontcare" => Relation::DontCare,
            "other" => Relation::Other,
            "before" => Relation::Before,
            "after" => Relation::After,
            "meets" => Relation::Meets,
            "met_by" | "metby" => Relation::MetBy,
            "equals" => Relation::Equals,
            "contains" => Relation::Contains,
            "contained_by" | "containedby" => Relation::ContainedBy,
            _ => return Err(HeuristicError::UnsupportedOrder(s.to_string())),
        };
        Ok(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip_names() {
        for r in Relation::ACTUAL.iter().chain(Relation::GUARDS.iter()) {
            assert_eq!(r.as_str().parse::<Relation>().unwrap(), *r);
        }
        assert!("sideways".parse::<Relation>().is_err());
    }

    #[test]
    fn test_guard_only_relations_have_no_edges() {
        for r in [Relation::None, Relation::Any, Relation::DontCare, Relation::Other] {
            assert!(r.edges().is_empty());
        }
        assert_eq!(Relation::Equals.edges().len(), 2);
    }
}
