use misty_types::EventType;
use std::collections::BTreeSet;
use std::fmt;

/// The event types currently subscribed on one connection.
///
/// Membership only: subscribing twice on the wire still records the type once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    types: BTreeSet<EventType>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, event_type: EventType) -> bool {
        self.types.insert(event_type)
    }

    pub fn remove(&mut self, event_type: EventType) -> bool {
        self.types.remove(&event_type)
    }

    pub fn contains(&self, event_type: EventType) -> bool {
        self.types.contains(&event_type)
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = EventType> + '_ {
        self.types.iter().copied()
    }
}

impl fmt::Display for SubscriptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.types.iter().map(EventType::as_str).collect();
        write!(f, "[{}]", names.join(", "))
    }
}
