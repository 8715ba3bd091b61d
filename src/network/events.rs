//! Plan and variable notifications.
//!
//! Low-level entities never hold pointers to the managers that watch them.
//! Instead the engine owns an [`EventBus`] with named subscribers; every
//! change is published as a [`PlanEvent`] and each subscriber drains its
//! own queue when it is ready to react.

use super::constraint::ConstraintId;
use super::variable::VarId;
use crate::domain::DomainEvent;
use crate::plan::{ObjectId, TokenId};

/// A change in the plan or the constraint network.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanEvent {
    VariableAdded(VarId),
    VariableRemoved(VarId),
    VariableChanged { var: VarId, change: DomainEvent },
    ConstraintAdded {
        constraint: ConstraintId,
        guards: Vec<VarId>,
    },
    ConstraintRemoved {
        constraint: ConstraintId,
        guards: Vec<VarId>,
    },
    TokenAdded(TokenId),
    TokenRemoved(TokenId),
    TokenActivated(TokenId),
    TokenDeactivated(TokenId),
    TokenMerged { token: TokenId, target: TokenId },
    TokenSplit(TokenId),
    TokenRejected(TokenId),
    TokenReinstated(TokenId),
    OrderingAdded {
        object: ObjectId,
        predecessor: TokenId,
        successor: TokenId,
    },
    OrderingRemoved {
        object: ObjectId,
        predecessor: TokenId,
        successor: TokenId,
    },
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

#[derive(Debug, Clone)]
struct Subscriber {
    name: String,
    queue: Vec<PlanEvent>,
}

/// Fan-out of events to named subscriber queues.
///
/// Unsubscribed slots stay vacant so outstanding ids never alias a later
/// subscriber.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Vec<Option<Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber. Only events published afterwards reach it.
    pub fn subscribe(&mut self, name: impl Into<String>) -> SubscriberId {
        self.subscribers.push(Some(Subscriber {
            name: name.into(),
            queue: Vec::new(),
        }));
        SubscriberId(self.subscribers.len() - 1)
    }

    /// Removes a subscriber and its pending queue. Returns whether `id` was
    /// still subscribed.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.subscribers
            .get_mut(id.0)
            .and_then(Option::take)
            .is_some()
    }

    /// Delivers an event to every subscriber. Dropped when nobody listens.
    pub fn publish(&mut self, event: PlanEvent) {
        let mut live = self.subscribers.iter_mut().flatten().peekable();
        while let Some(sub) = live.next() {
            if live.peek().is_some() {
                sub.queue.push(event.clone());
            } else {
                sub.queue.push(event);
                break;
            }
        }
    }

    /// Takes every pending event for `id`, oldest first.
    pub fn drain(&mut self, id: SubscriberId) -> Vec<PlanEvent> {
        self.subscribers
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .map(|s| std::mem::take(&mut s.queue))
            .unwrap_or_default()
    }

    pub fn pending(&self, id: SubscriberId) -> usize {
        self.subscribers
            .get(id.0)
            .and_then(Option::as_ref)
            .map_or(0, |s| s.queue.len())
    }

    pub fn subscriber_names(&self) -> Vec<&str> {
        self.subscribers
            .iter()
            .flatten()
            .map(|s| s.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::network::Variable;

    #[test]
    fn test_fan_out_and_drain() {
        let mut vars: Arena<Variable> = Arena::new();
        let v = vars.insert(Variable::new(
            "x".into(),
            crate::domain::Domain::boolean(),
            true,
            crate::network::Owner::Global,
        ));

        let mut bus = EventBus::new();
        bus.publish(PlanEvent::VariableAdded(v));
        let a = bus.subscribe("a");
        let b = bus.subscribe("b");
        bus.publish(PlanEvent::VariableRemoved(v));

        assert_eq!(bus.pending(a), 1);
        assert_eq!(bus.drain(a), vec![PlanEvent::VariableRemoved(v)]);
        assert_eq!(bus.pending(a), 0);
        assert_eq!(bus.drain(b).len(), 1);
        assert_eq!(bus.subscriber_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_unsubscribed_queue_stops_growing() {
        let mut vars: Arena<Variable> = Arena::new();
        let v = vars.insert(Variable::new(
            "x".into(),
            crate::domain::Domain::boolean(),
            true,
            crate::network::Owner::Global,
        ));
        let mut bus = EventBus::new();
        let a = bus.subscribe("a");
        let b = bus.subscribe("b");
        assert!(bus.unsubscribe(a));
        assert!(!bus.unsubscribe(a));

        let c = bus.subscribe("c");
        assert_ne!(a, c);
        for _ in 0..1000 {
            bus.publish(PlanEvent::VariableChanged {
                var: v,
                change: DomainEvent::Relaxed,
            });
        }
        assert_eq!(bus.pending(a), 0);
        assert!(bus.drain(a).is_empty());
        assert_eq!(bus.pending(b), 1000);
        assert_eq!(bus.pending(c), 1000);
        assert_eq!(bus.subscriber_names(), vec!["b", "c"]);
    }
}
