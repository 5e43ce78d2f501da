//! # Member Wire Protocol
//!
//! Every message a member sends to its party is tagged with an [`OpCode`]
//! and carries a JSON [`PartyMessage`] envelope. Bytes inside the envelope
//! are base64 encoded.
//!
//! ```text
//! client ──(op_code, {"id": 7, "data": "dTI="})──→ party
//! party  ──(19, {"id": 7, "response_code": 0})──→ client
//! ```

use serde::{Deserialize, Serialize};

/// Tags for messages flowing between members and the party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Server → client: the party is being terminated by the server.
    Terminate,
    /// Server → leader: a user requests to join the party.
    JoinRequest,
    ApproveForRejoin,
    ApproveJoinRequest,
    ClearInvitations,
    GetPartyData,
    GetPartyMemberData,
    GetPendingInvitedUsers,
    GetPendingJoinRequests,
    GetUsersApprovedForRejoin,
    IsMemberLeader,
    KickMember,
    PromoteMember,
    RejectInvitation,
    RemoveUserForRejoin,
    SendInvitation,
    UpdateParty,
    UpdatePartyData,
    UpdatePartyMemberData,
    /// Server → client: acknowledgement of a correlated command.
    PartyMessageResponse,
}

impl OpCode {
    const ALL: [OpCode; 20] = [
        OpCode::Terminate,
        OpCode::JoinRequest,
        OpCode::ApproveForRejoin,
        OpCode::ApproveJoinRequest,
        OpCode::ClearInvitations,
        OpCode::GetPartyData,
        OpCode::GetPartyMemberData,
        OpCode::GetPendingInvitedUsers,
        OpCode::GetPendingJoinRequests,
        OpCode::GetUsersApprovedForRejoin,
        OpCode::IsMemberLeader,
        OpCode::KickMember,
        OpCode::PromoteMember,
        OpCode::RejectInvitation,
        OpCode::RemoveUserForRejoin,
        OpCode::SendInvitation,
        OpCode::UpdateParty,
        OpCode::UpdatePartyData,
        OpCode::UpdatePartyMemberData,
        OpCode::PartyMessageResponse,
    ];

    /// Numeric value on the wire.
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Looks up an op code by its wire value.
    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }
}

/// Outcome codes carried by [`PartyMessageResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum ResponseCode {
    Success,
    NotPartyLeader,
    BadRequest,
    InternalError,
    UserOffline,
    PresenceError,
    InvitePending,
    NoInvitePending,
    UserBlocked,
}

impl ResponseCode {
    pub fn code(self) -> i64 {
        self as i64
    }
}

impl From<ResponseCode> for i64 {
    fn from(value: ResponseCode) -> Self {
        value.code()
    }
}

impl TryFrom<i64> for ResponseCode {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Success,
            1 => Self::NotPartyLeader,
            2 => Self::BadRequest,
            3 => Self::InternalError,
            4 => Self::UserOffline,
            5 => Self::PresenceError,
            6 => Self::InvitePending,
            7 => Self::NoInvitePending,
            8 => Self::UserBlocked,
            other => return Err(format!("unknown response code {other}")),
        })
    }
}

/// Envelope of every member → party message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyMessage {
    /// Correlation id. Only messages with an id are acknowledged.
    #[serde(default)]
    pub id: Option<i64>,
    /// Command payload, usually a user id.
    #[serde(default, with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl PartyMessage {
    pub fn new(id: Option<i64>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // A struct of an Option<i64> and a String cannot fail to serialize.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// Acknowledgement sent back for a correlated [`PartyMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyMessageResponse {
    pub id: i64,
    pub response_code: ResponseCode,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
