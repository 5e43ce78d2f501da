//! Adapters Layer
//!
//! - `actor`: runs a party on its own task behind a channel handle
//! - `bus_dispatcher`: `MatchDispatcher` over the party event bus
//! - `in_memory`: single-process social graph and notification service

pub mod actor;
pub mod bus_dispatcher;
pub mod in_memory;

pub use actor::{
    spawn_party, PartyExit, PartyHandle, PartyRequest, PartySnapshot, DEFAULT_INBOX_CAPACITY,
};
pub use bus_dispatcher::BusDispatcher;
pub use in_memory::{InMemoryNotificationService, InMemorySocialGraph};
