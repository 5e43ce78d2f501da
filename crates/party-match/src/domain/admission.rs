//! Admission verdicts
//!
//! A join attempt ends in exactly one verdict. Denials and pending verdicts
//! carry the reason shown to the joining client.

use party_types::{JoinMetadata, VERSION_METADATA_KEY};
use std::fmt;

use super::social_gate::BlockReason;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionVerdict {
    Admit,
    Deny(DenyReason),
    /// Not admitted now; the leader has been asked.
    Pending(PendingReason),
}

impl AdmissionVerdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admit)
    }

    /// Message returned to the client alongside a refusal. Empty on admit.
    pub fn reason(&self) -> String {
        match self {
            Self::Admit => String::new(),
            Self::Deny(reason) => reason.to_string(),
            Self::Pending(reason) => reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    AlreadyJoined,
    IncompatibleVersion,
    PartyFull,
    BlockedByParty,
    BlocksPartyMember,
    /// Nobody can approve the request.
    NoLeader,
    LeaderUnreachable,
}

impl From<BlockReason> for DenyReason {
    fn from(reason: BlockReason) -> Self {
        match reason {
            BlockReason::BlockedByParty => Self::BlockedByParty,
            BlockReason::BlocksPartyMember => Self::BlocksPartyMember,
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::AlreadyJoined => "Party already joined",
            Self::IncompatibleVersion => "Bad version",
            Self::PartyFull => "Party is full",
            Self::BlockedByParty => "Someone in this party blocked you",
            Self::BlocksPartyMember => "You have blocked someone in (or invited to) this party",
            Self::NoLeader => "Party has no leader",
            Self::LeaderUnreachable => "Failed sending join request to leader",
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingReason {
    JoinRequestSent,
    /// Custom message from the join-attempt hook.
    Hook(String),
}

impl fmt::Display for PendingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JoinRequestSent => f.write_str("Join request sent"),
            Self::Hook(msg) => f.write_str(msg),
        }
    }
}

/// A party with a fixed version only accepts joiners announcing the same one.
pub fn version_compatible(required: Option<&str>, metadata: &JoinMetadata) -> bool {
    match required {
        None => true,
        Some(required) => metadata
            .get(VERSION_METADATA_KEY)
            .map_or(false, |offered| offered == required),
    }
}

/// `max_size == 0` means unbounded.
pub fn is_full(max_size: usize, members: usize) -> bool {
    max_size > 0 && members >= max_size
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(version: Option<&str>) -> JoinMetadata {
        let mut md = JoinMetadata::new();
        if let Some(v) = version {
            md.insert(VERSION_METADATA_KEY.to_string(), v.to_string());
        }
        md
    }

    #[test]
    fn test_version_compatibility() {
        assert!(version_compatible(None, &meta(None)));
        assert!(version_compatible(Some("1.0"), &meta(Some("1.0"))));
        assert!(!version_compatible(Some("1.0"), &meta(Some("1.1"))));
        assert!(!version_compatible(Some("1.0"), &meta(None)));
    }

    #[test]
    fn test_capacity() {
        assert!(!is_full(0, 1_000));
        assert!(!is_full(2, 1));
        assert!(is_full(2, 2));
    }

    #[test]
    fn test_reason_messages() {
        assert_eq!(
            AdmissionVerdict::Deny(DenyReason::PartyFull).reason(),
            "Party is full"
        );
        assert_eq!(
            AdmissionVerdict::Pending(PendingReason::JoinRequestSent).reason(),
            "Join request sent"
        );
        assert!(AdmissionVerdict::Admit.reason().is_empty());
    }
}
