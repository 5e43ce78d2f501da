//! Ports Layer
//!
//! - Driving Port (inbound): `PartyApi`, called by the party actor
//! - Driven Ports (outbound): collaborators the party depends on

pub mod inbound;
pub mod outbound;

pub use inbound::{ExitReason, MemberMessage, PartyApi, PartyStatus};
pub use outbound::{
    BlockedPage, Broadcast, JoinAttemptOverride, MatchDispatcher, NoopHooks,
    Notification, NotificationService, PartyHooks, PresenceDirectory, SocialGraph,
    SystemTimeSource, TimeSource, Timestamp, PARTY_NOTIFICATION_CODE, SUBJECT_EXPIRED_INVITATION,
    SUBJECT_INVITATION, SUBJECT_REJECTED_INVITATION,
};
