//! Resource profile aggregates.
//!
//! A profile sums the usage of every contributing token over the part of
//! its extent that is guaranteed by the current bounds (its compulsory
//! part `[ub(start), lb(end))`). If the sum exceeds the capacity at any
//! instant the profile is violated, and the engine turns that into an
//! ordinary propagation failure by emptying one contributing variable.

use super::variable::VarId;
use crate::arena::Id;
use crate::domain::Domain;
use crate::plan::TokenId;

/// Handle of a [`ResourceProfile`] in the engine.
pub type ProfileId = Id<ResourceProfile>;

/// One token's claim on a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub token: TokenId,
    pub start: VarId,
    pub end: VarId,
    pub usage: f64,
}

/// Capacity aggregate re-validated once per propagation pass when dirty.
#[derive(Debug, Clone)]
pub struct ResourceProfile {
    name: String,
    capacity: f64,
    pub(crate) contributions: Vec<Contribution>,
    pub(crate) dirty: bool,
}

impl ResourceProfile {
    pub fn new(name: impl Into<String>, capacity: f64) -> Self {
        Self {
            name: name.into(),
            capacity,
            contributions: Vec::new(),
            dirty: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn contributions(&self) -> &[Contribution] {
        &self.contributions
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn involves(&self, token: TokenId) -> bool {
        self.contributions.iter().any(|c| c.token == token)
    }

    /// Sweeps compulsory parts. Returns the start variable of the
    /// contribution that first pushes usage over capacity.
    pub fn find_violation<'a, F>(&self, domain_of: F) -> Option<VarId>
    where
        F: Fn(VarId) -> Option<&'a Domain>,
    {
        // (time, delta, contribution index); releases sort before claims.
        let mut sweep: Vec<(f64, f64, usize)> = Vec::new();
        for (i, c) in self.contributions.iter().enumerate() {
            let (Some(start), Some(end)) = (domain_of(c.start), domain_of(c.end)) else {
                continue;
            };
            let (from, to) = (start.ub(), end.lb());
            if from < to {
                sweep.push((from, c.usage, i));
                sweep.push((to, -c.usage, i));
            }
        }
        sweep.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let mut level = 0.0;
        for (_, delta, i) in sweep {
            level += delta;
            if delta > 0.0 && level > self.capacity + 1e-9 {
                return Some(self.contributions[i].start);
            }
        }
        None
    }
}
