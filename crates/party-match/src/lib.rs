//! # Party Match - Authoritative Party State Machine
//!
//! Owns one party for its whole lifetime: who is in it, who leads it, who
//! may join, and what members may do once inside.
//!
//! ## Architecture
//!
//! Hexagonal, like the rest of the workspace:
//! - **Domain Layer:** membership ledger, invitation registry, social gate,
//!   admission rules, command decoding. Pure, no I/O.
//! - **Ports Layer:** `PartyApi` inbound; dispatcher, presence, notifier,
//!   social graph, clock and hooks outbound.
//! - **Service Layer:** `PartyMatch`, wiring the domain to the ports.
//! - **Adapters Layer:** the per-party actor, a bus-backed dispatcher and
//!   in-memory collaborators.
//!
//! ## Lifecycle
//!
//! ```text
//! create ──→ start ──→ join_attempt ──→ join ──→ tick(messages)* ──→ leave
//!                         │                                          │
//!                   Admit/Deny/Pending                     last member left
//!                                                                    ↓
//!                                                                  end
//! ```
//!
//! A party nobody joins within `initial_join_ticks` ends by itself, and
//! leadership passes to the earliest-joined member when the leader leaves.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

/// Recording mocks of every outbound port.
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapters::{
    spawn_party, BusDispatcher, InMemoryNotificationService, InMemorySocialGraph, PartyExit,
    PartyHandle, PartyRequest, PartySnapshot, DEFAULT_INBOX_CAPACITY,
};
pub use domain::{
    AdmissionVerdict, BlockReason, DenyReason, MembershipLedger, PartyCommand, PartyConfig,
    PartyLabel, PendingReason,
};
pub use error::{CommandError, ConfigError, DependencyError, PartyError};
pub use ports::{
    BlockedPage, Broadcast, ExitReason, JoinAttemptOverride, MatchDispatcher, MemberMessage,
    NoopHooks, Notification, NotificationService, PartyApi, PartyHooks, PartyStatus,
    PresenceDirectory, SocialGraph, SystemTimeSource, TimeSource, Timestamp,
};
pub use service::{PartyDeps, PartyMatch};
