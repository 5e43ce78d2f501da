//! # Core Entities
//!
//! Identity types for users, sessions, parties and the connections that
//! bind them together.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::TypesError;

/// String-keyed metadata supplied by a client when it attempts to join.
pub type JoinMetadata = BTreeMap<String, String>;

/// Metadata key carrying the client build/compatibility tag.
pub const VERSION_METADATA_KEY: &str = "version";

/// Opaque, stable identifier of a user account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a user id, rejecting the empty string.
    pub fn new(id: impl Into<String>) -> Result<Self, TypesError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypesError::EmptyUserId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Identifier of one authenticated client session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random session id.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a party: a uuid plus the name of the node hosting it.
///
/// The textual form is `<uuid>.<node>`, which is what clients see.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartyId {
    id: Uuid,
    node: String,
}

impl PartyId {
    /// Allocates a new party id on the given node.
    pub fn generate(node: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            node: node.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn node(&self) -> &str {
        &self.node
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.id, self.node)
    }
}

impl FromStr for PartyId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, node) = s
            .split_once('.')
            .ok_or_else(|| TypesError::MalformedPartyId(s.to_string()))?;
        let id = Uuid::parse_str(id).map_err(|e| TypesError::InvalidPartyUuid(e.to_string()))?;
        Ok(Self {
            id,
            node: node.to_string(),
        })
    }
}

impl TryFrom<String> for PartyId {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PartyId> for String {
    fn from(value: PartyId) -> Self {
        value.to_string()
    }
}

/// A live connection of a user: who they are and which session they use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Presence {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub username: String,
}

impl Presence {
    pub fn new(user_id: UserId, session_id: SessionId, username: impl Into<String>) -> Self {
        Self {
            user_id,
            session_id,
            username: username.into(),
        }
    }

    /// True when both presences are the same connection.
    pub fn same_connection(&self, other: &Presence) -> bool {
        self.user_id == other.user_id && self.session_id == other.session_id
    }
}

/// Who receives a broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipients {
    /// Every current member of the party.
    All,
    /// Only the listed connections.
    Only(Vec<Presence>),
}

impl Recipients {
    pub fn one(presence: Presence) -> Self {
        Self::Only(vec![presence])
    }

    /// True when `presence` would receive a broadcast sent to these recipients.
    pub fn includes(&self, presence: &Presence) -> bool {
        match self {
            Self::All => true,
            Self::Only(list) => list.iter().any(|p| p.same_connection(presence)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_party_id_round_trips_through_text() {
        let id = PartyId::generate("node-a");
        let parsed: PartyId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.node(), "node-a");
    }

    #[test]
    fn test_party_id_requires_node_component() {
        let err = "6f1d1f38-1a4a-4c3c-9a55-2f7f3d4f0e11"
            .parse::<PartyId>()
            .unwrap_err();
        assert!(matches!(err, TypesError::MalformedPartyId(_)));
    }

    #[test]
    fn test_party_id_rejects_bad_uuid() {
        let err = "not-a-uuid.node".parse::<PartyId>().unwrap_err();
        assert!(matches!(err, TypesError::InvalidPartyUuid(_)));
    }

    #[test]
    fn test_party_id_serializes_as_string() {
        let id = PartyId::generate("n1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }

    #[test]
    fn test_empty_user_id_rejected() {
        assert_eq!(UserId::new(""), Err(TypesError::EmptyUserId));
    }

    #[test]
    fn test_same_connection_compares_session() {
        let a = Presence::new(UserId::from("u1"), SessionId::new("s1"), "alice");
        let b = Presence::new(UserId::from("u1"), SessionId::new("s2"), "alice");
        assert!(a.same_connection(&a.clone()));
        assert!(!a.same_connection(&b));
    }

    #[test]
    fn test_recipients_includes() {
        let a = Presence::new(UserId::from("u1"), SessionId::new("s1"), "alice");
        let b = Presence::new(UserId::from("u2"), SessionId::new("s2"), "bob");
        assert!(Recipients::All.includes(&a));
        assert!(Recipients::one(a.clone()).includes(&a));
        assert!(!Recipients::one(a).includes(&b));
    }
}
