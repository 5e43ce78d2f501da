//! # Party Events
//!
//! Every event that a party process hands to the presence layer.

use party_types::{PartyId, Presence};
use serde::{Deserialize, Serialize};

pub use party_types::Recipients;

/// Outbound events published by party processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PartyEvent {
    /// Deliver `data` tagged with `op_code` to party members.
    Broadcast {
        party_id: PartyId,
        op_code: i64,
        data: Option<Vec<u8>>,
        recipients: Recipients,
        /// Identity the message appears to originate from (`None` = server).
        sender: Option<Presence>,
        reliable: bool,
    },

    /// Forcibly disconnect the given connections from the party.
    Kicked {
        party_id: PartyId,
        presences: Vec<Presence>,
    },

    /// The party's discovery label changed.
    LabelUpdated { party_id: PartyId, label: String },

    /// The party process is gone and will accept nothing further.
    PartyClosed { party_id: PartyId, reason: String },
}

impl PartyEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::Broadcast { .. } => EventTopic::Messages,
            Self::Kicked { .. } => EventTopic::Membership,
            Self::LabelUpdated { .. } => EventTopic::Discovery,
            Self::PartyClosed { .. } => EventTopic::Lifecycle,
        }
    }

    /// The party that emitted this event.
    #[must_use]
    pub fn party_id(&self) -> &PartyId {
        match self {
            Self::Broadcast { party_id, .. }
            | Self::Kicked { party_id, .. }
            | Self::LabelUpdated { party_id, .. }
            | Self::PartyClosed { party_id, .. } => party_id,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Member-facing broadcasts.
    Messages,
    /// Forced disconnects.
    Membership,
    /// Label publication for listing.
    Discovery,
    /// Party closure.
    Lifecycle,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Restrict to one party. `None` means every party.
    pub party: Option<PartyId>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            party: None,
        }
    }

    /// Create a filter for every event of one party.
    #[must_use]
    pub fn for_party(party: PartyId) -> Self {
        Self {
            topics: Vec::new(),
            party: Some(party),
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &PartyEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let party_match = self
            .party
            .as_ref()
            .map_or(true, |party| party == event.party_id());

        topic_match && party_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_event(party_id: PartyId) -> PartyEvent {
        PartyEvent::LabelUpdated {
            party_id,
            label: "{}".to_string(),
        }
    }

    #[test]
    fn test_event_topic_mapping() {
        let party_id = PartyId::generate("n1");
        assert_eq!(label_event(party_id.clone()).topic(), EventTopic::Discovery);

        let closed = PartyEvent::PartyClosed {
            party_id,
            reason: "empty".into(),
        };
        assert_eq!(closed.topic(), EventTopic::Lifecycle);
    }

    #[test]
    fn test_filter_all() {
        assert!(EventFilter::all().matches(&label_event(PartyId::generate("n1"))));
    }

    #[test]
    fn test_filter_by_topic() {
        let filter = EventFilter::topics(vec![EventTopic::Membership]);
        let party_id = PartyId::generate("n1");

        assert!(!filter.matches(&label_event(party_id.clone())));
        assert!(filter.matches(&PartyEvent::Kicked {
            party_id,
            presences: Vec::new(),
        }));
    }

    #[test]
    fn test_filter_by_party() {
        let mine = PartyId::generate("n1");
        let other = PartyId::generate("n1");
        let filter = EventFilter::for_party(mine.clone());

        assert!(filter.matches(&label_event(mine)));
        assert!(!filter.matches(&label_event(other)));
    }
}
