//! # Party Bus - Outbound Event Bus
//!
//! Carries everything a party process emits towards the presence layer:
//! member broadcasts, forced disconnects, label updates and closures.
//!
//! ```text
//! ┌──────────────┐   publish()   ┌──────────────┐  subscribe()  ┌────────────────┐
//! │ Party actor  │ ────────────→ │  Event Bus   │ ────────────→ │ Presence layer │
//! │ (one / party)│               │ (broadcast)  │               │ Registry index │
//! └──────────────┘               └──────────────┘               └────────────────┘
//! ```
//!
//! Parties never talk to each other through the bus; every event is tagged
//! with the party it came from and subscribers filter on it.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{EventFilter, EventTopic, PartyEvent, Recipients};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 1000);
    }
}
