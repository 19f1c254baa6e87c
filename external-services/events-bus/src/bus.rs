use crate::error::{EventBusError, Result};
use crate::event::Event;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};
use uuid::Uuid;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type Handler = Arc<dyn Fn(&Event) -> std::result::Result<(), HandlerError> + Send + Sync>;

struct Subscription {
    pattern: SubjectPattern,
    /// Registration order, so delivery order is stable
    seq: u64,
    handler: Handler,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SubjectPattern {
    All,
    Prefix(String),
    Exact(String),
}

impl SubjectPattern {
    fn parse(pattern: &str) -> Result<Self> {
        if pattern == "*" {
            return Ok(SubjectPattern::All);
        }
        if pattern.is_empty() {
            return Err(EventBusError::InvalidPattern(pattern.to_string()));
        }
        match pattern.strip_suffix(".*") {
            Some(prefix) if !prefix.is_empty() && !prefix.contains('*') => {
                Ok(SubjectPattern::Prefix(format!("{}.", prefix)))
            }
            Some(_) => Err(EventBusError::InvalidPattern(pattern.to_string())),
            None if pattern.contains('*') => Err(EventBusError::InvalidPattern(pattern.to_string())),
            None => Ok(SubjectPattern::Exact(pattern.to_string())),
        }
    }

    fn matches(&self, subject: &str) -> bool {
        match self {
            SubjectPattern::All => true,
            SubjectPattern::Prefix(prefix) => subject.starts_with(prefix.as_str()),
            SubjectPattern::Exact(exact) => subject == exact,
        }
    }
}

/// Synchronous publish/subscribe bus
pub struct EventBus {
    subscriptions: DashMap<Uuid, Subscription>,
    next_seq: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscriptions: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Register `handler` for every event whose subject matches `pattern`
    pub fn subscribe<F>(&self, pattern: &str, handler: F) -> Result<Uuid>
    where
        F: Fn(&Event) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
    {
        let pattern = SubjectPattern::parse(pattern)?;
        let id = Uuid::new_v4();
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.subscriptions.insert(id, Subscription {
            pattern,
            seq,
            handler: Arc::new(handler),
        });
        Ok(id)
    }

    pub fn unsubscribe(&self, subscription_id: Uuid) -> Result<()> {
        self.subscriptions
            .remove(&subscription_id)
            .map(|_| ())
            .ok_or(EventBusError::SubscriptionNotFound(subscription_id))
    }

    /// Deliver `event` to every matching subscriber and return how many
    /// handlers ran. A failing handler is logged and does not stop delivery
    /// to the others.
    pub fn publish(&self, event: Event) -> usize {
        // Collect first so no map shard is locked while handlers run
        let mut targets: Vec<(u64, Uuid, Handler)> = self.subscriptions
            .iter()
            .filter(|entry| entry.value().pattern.matches(&event.event_type))
            .map(|entry| (entry.value().seq, *entry.key(), entry.value().handler.clone()))
            .collect();
        targets.sort_by_key(|(seq, _, _)| *seq);

        debug!(event_type = %event.event_type, subscribers = targets.len(), "Publishing event");

        for (_, subscription_id, handler) in &targets {
            if let Err(e) = handler(&event) {
                warn!(
                    event_type = %event.event_type,
                    event_id = %event.id,
                    subscription_id = %subscription_id,
                    "Event handler failed: {}",
                    e
                );
            }
        }

        targets.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Collects the subjects a handler saw
    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Recorder {
        fn handler(&self) -> impl Fn(&Event) -> std::result::Result<(), HandlerError> + Send + Sync + 'static {
            let seen = self.0.clone();
            move |event: &Event| {
                seen.lock().map_err(|e| e.to_string())?.push(event.event_type.clone());
                Ok(())
            }
        }

        fn seen(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    fn event(subject: &str) -> Event {
        Event::new(subject, Uuid::new_v4(), json!({}))
    }

    #[test]
    fn test_pattern_matching() {
        let bus = EventBus::new();
        let claims = Recorder::default();
        let everything = Recorder::default();
        let exact = Recorder::default();

        bus.subscribe("claim.*", claims.handler()).unwrap();
        bus.subscribe("*", everything.handler()).unwrap();
        bus.subscribe("batch.status_changed", exact.handler()).unwrap();

        assert_eq!(bus.publish(event("claim.status_changed")), 2);
        assert_eq!(bus.publish(event("batch.status_changed")), 2);
        assert_eq!(bus.publish(event("claimant.updated")), 1);

        assert_eq!(claims.seen(), vec!["claim.status_changed"]);
        assert_eq!(exact.seen(), vec!["batch.status_changed"]);
        assert_eq!(everything.seen().len(), 3);
    }

    #[test]
    fn test_invalid_patterns_are_rejected() {
        let bus = EventBus::new();
        for pattern in ["", ".*", "claim.*.x", "cl*im"] {
            let result = bus.subscribe(pattern, |_| Ok(()));
            assert!(matches!(result, Err(EventBusError::InvalidPattern(_))), "{pattern}");
        }
    }

    #[test]
    fn test_failing_handler_does_not_block_others() {
        let bus = EventBus::new();
        let recorder = Recorder::default();
        bus.subscribe("claim.*", |_| Err("mailer offline".into())).unwrap();
        bus.subscribe("claim.*", recorder.handler()).unwrap();

        assert_eq!(bus.publish(event("claim.status_changed")), 2);
        assert_eq!(recorder.seen().len(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let id = bus.subscribe("*", |_| Ok(())).unwrap();
        assert_eq!(bus.subscriber_count(), 1);
        bus.unsubscribe(id).unwrap();
        assert_eq!(bus.publish(event("claim.status_changed")), 0);
        assert!(matches!(bus.unsubscribe(id), Err(EventBusError::SubscriptionNotFound(_))));
    }
}
