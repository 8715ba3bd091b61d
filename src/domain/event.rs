//! Domain change notifications.

use super::types::Domain;

/// What happened to a variable's domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainEvent {
    UpperBoundDecreased,
    LowerBoundIncreased,
    BoundsRestricted,
    ValueRemoved,
    /// Derived domain narrowed to one value by propagation.
    RestrictToSingleton,
    /// Specified domain narrowed to one value by an explicit `specify`.
    SetToSingleton,
    Reset,
    Relaxed,
    Closed,
    Emptied,
}

impl DomainEvent {
    /// Classifies the change from `old` to `new`. `None` when unchanged.
    pub fn between(old: &Domain, new: &Domain) -> Option<Self> {
        if old == new {
            return None;
        }
        if new.is_empty() {
            return Some(DomainEvent::Emptied);
        }
        if !new.is_subset_of(old) {
            return Some(DomainEvent::Relaxed);
        }
        if new.is_singleton() && !old.is_singleton() {
            return Some(DomainEvent::RestrictToSingleton);
        }
        match (old.bounds(), new.bounds()) {
            (Some((olb, oub)), Some((nlb, nub))) if old.kind().is_numeric() => {
                match (nlb > olb, nub < oub) {
                    (true, true) => Some(DomainEvent::BoundsRestricted),
                    (true, false) => Some(DomainEvent::LowerBoundIncreased),
                    (false, true) => Some(DomainEvent::UpperBoundDecreased),
                    (false, false) => Some(DomainEvent::ValueRemoved),
                }
            }
            _ => Some(DomainEvent::ValueRemoved),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Value;

    #[test]
    fn test_classification() {
        let old = Domain::int_interval(0.0, 10.0);
        assert_eq!(DomainEvent::between(&old, &old), None);
        assert_eq!(
            DomainEvent::between(&old, &Domain::int_interval(2.0, 10.0)),
            Some(DomainEvent::LowerBoundIncreased)
        );
        assert_eq!(
            DomainEvent::between(&old, &Domain::int_interval(0.0, 3.0)),
            Some(DomainEvent::UpperBoundDecreased)
        );
        assert_eq!(
            DomainEvent::between(&old, &Domain::int_interval(1.0, 3.0)),
            Some(DomainEvent::BoundsRestricted)
        );
        assert_eq!(
            DomainEvent::between(&old, &Domain::int_interval(4.0, 4.0)),
            Some(DomainEvent::RestrictToSingleton)
        );
        assert_eq!(
            DomainEvent::between(&Domain::int_interval(4.0, 4.0), &old),
            Some(DomainEvent::Relaxed)
        );
        assert_eq!(
            DomainEvent::between(&old, &Domain::empty_of(old.kind())),
            Some(DomainEvent::Emptied)
        );
    }

    #[test]
    fn test_value_removed_from_set() {
        let old = Domain::symbols(["a", "b", "c"]);
        let mut new = old.clone();
        new.remove(&Value::symbol("b"));
        assert_eq!(
            DomainEvent::between(&old, &new),
            Some(DomainEvent::ValueRemoved)
        );
    }
}
