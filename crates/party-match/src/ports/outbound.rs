//! Outbound Ports (Driven Ports)
//!
//! Everything a party needs from the world around it: the presence layer
//! that delivers its broadcasts, the session directory, notifications, the
//! social graph, a clock and the embedding application's hooks.

use async_trait::async_trait;
use party_types::{JoinMetadata, OpCode, PartyId, Presence, Recipients, UserId};
use serde::Serialize;

use crate::domain::{PartyConfig, PartyLabel};
use crate::error::DependencyError;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Notification code used for every party notification.
pub const PARTY_NOTIFICATION_CODE: i32 = 1;

pub const SUBJECT_INVITATION: &str = "Party invitation";
pub const SUBJECT_EXPIRED_INVITATION: &str = "Party expired invitation";
pub const SUBJECT_REJECTED_INVITATION: &str = "Party reject invitation";

/// A message from the party to some of its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    pub op_code: OpCode,
    pub data: Option<Vec<u8>>,
    pub recipients: Recipients,
    /// Identity the message appears to come from. `None` is the server.
    pub sender: Option<Presence>,
    pub reliable: bool,
}

impl Broadcast {
    pub fn to_all(op_code: OpCode, data: Option<Vec<u8>>) -> Self {
        Self {
            op_code,
            data,
            recipients: Recipients::All,
            sender: None,
            reliable: true,
        }
    }

    pub fn to(recipient: Presence, op_code: OpCode, data: Option<Vec<u8>>) -> Self {
        Self {
            recipients: Recipients::one(recipient),
            ..Self::to_all(op_code, data)
        }
    }

    /// Sets the originating identity.
    pub fn sent_by(mut self, sender: Presence) -> Self {
        self.sender = Some(sender);
        self
    }
}

/// Presence layer of a single party.
#[async_trait]
pub trait MatchDispatcher: Send + Sync {
    async fn broadcast(&self, message: Broadcast) -> Result<(), DependencyError>;

    /// Forcibly disconnect connections from the party.
    async fn kick(&self, presences: Vec<Presence>) -> Result<(), DependencyError>;

    /// Publish the party's discovery label.
    async fn update_label(&self, label: String) -> Result<(), DependencyError>;
}

/// Session directory shared by all parties.
#[async_trait]
pub trait PresenceDirectory: Send + Sync {
    /// Live sessions of `user_id` anywhere on the server.
    async fn count_online(&self, user_id: &UserId) -> Result<usize, DependencyError>;

    /// Asks the presence layer to join a connection the leader approved.
    /// The party later sees the join as a regular confirmed join.
    async fn admit(&self, party_id: &PartyId, presence: Presence) -> Result<(), DependencyError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub recipient: UserId,
    pub subject: String,
    pub content: serde_json::Value,
    pub code: i32,
    pub sender: Option<UserId>,
    pub persistent: bool,
}

impl Notification {
    /// A non-persistent party notification without a sender.
    pub fn party(recipient: UserId, subject: &str, content: serde_json::Value) -> Self {
        Self {
            recipient,
            subject: subject.to_string(),
            content,
            code: PARTY_NOTIFICATION_CODE,
            sender: None,
            persistent: false,
        }
    }

    pub fn with_sender(mut self, sender: UserId) -> Self {
        self.sender = Some(sender);
        self
    }
}

/// Best-effort user notifications.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), DependencyError>;

    async fn send_all(&self, notifications: Vec<Notification>) -> Result<(), DependencyError>;
}

/// One page of a user's block list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockedPage {
    pub users: Vec<UserId>,
    /// Cursor of the next page, `None` on the last one.
    pub cursor: Option<String>,
}

/// Friend/block store.
#[async_trait]
pub trait SocialGraph: Send + Sync {
    async fn list_blocked(
        &self,
        user_id: &UserId,
        limit: usize,
        cursor: Option<String>,
    ) -> Result<BlockedPage, DependencyError>;
}

/// Time source abstraction, for deterministic invitation expiry in tests.
pub trait TimeSource: Send + Sync {
    /// Returns the current timestamp in milliseconds.
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        let since_epoch = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp::try_from(since_epoch.as_millis()).unwrap_or(Timestamp::MAX)
    }
}

/// Outcome forced by the join-attempt hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinAttemptOverride {
    Admit,
    /// Keep the request pending, replying with this message.
    Reject(String),
}

/// Callbacks into the embedding application. All methods default to no-ops
/// and run synchronously inside the party's task, so they must not block.
pub trait PartyHooks: Send + Sync {
    /// Filters client join metadata before it is staged for the label.
    fn filter_join_metadata(&self, metadata: JoinMetadata) -> JoinMetadata {
        metadata
    }

    fn on_init(&self, _party_id: &PartyId, _config: &PartyConfig, _label: &PartyLabel) {}

    /// Called once a join request has been sent to the leader. Returning
    /// `Some` replaces the pending verdict.
    fn on_join_attempt(
        &self,
        _party_id: &PartyId,
        _presence: &Presence,
        _metadata: &JoinMetadata,
    ) -> Option<JoinAttemptOverride> {
        None
    }

    fn on_leave(&self, _party_id: &PartyId, _user_id: &UserId) {}

    fn on_kick(&self, _party_id: &PartyId, _user_id: &UserId) {}

    /// Called exactly once, whichever way the party ends.
    fn on_end(&self, _party_id: &PartyId, _config: &PartyConfig, _label: &PartyLabel) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl PartyHooks for NoopHooks {}

#[cfg(test)]
mod tests {
    use super::*;
    use party_types::SessionId;

    #[test]
    fn test_system_time_is_millis() {
        // Any date after 2001 has a 13 digit millisecond timestamp.
        assert!(SystemTimeSource.now() > 1_000_000_000_000);
    }

    #[test]
    fn test_broadcast_builders() {
        let leader = Presence::new(UserId::from("u1"), SessionId::new("s1"), "u1");
        let joiner = Presence::new(UserId::from("u2"), SessionId::new("s2"), "u2");
        let msg = Broadcast::to(leader.clone(), OpCode::JoinRequest, None).sent_by(joiner.clone());

        assert_eq!(msg.recipients, Recipients::one(leader));
        assert_eq!(msg.sender, Some(joiner));
        assert!(msg.reliable);
    }

    #[test]
    fn test_default_hooks_pass_metadata_through() {
        let mut md = JoinMetadata::new();
        md.insert("k".into(), "v".into());
        assert_eq!(NoopHooks.filter_join_metadata(md.clone()), md);
    }
}
