//! Member commands
//!
//! Decoding happens in two steps so authorization can run in between:
//! first the envelope and op code, then the payload.

use crate::error::CommandError;
use party_types::{OpCode, PartyMessage, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartyCommand {
    ApproveForRejoin(UserId),
    ApproveJoinRequest(UserId),
    ClearInvitations,
    GetPartyData,
    GetMemberData(UserId),
    GetPendingInvitedUsers,
    GetPendingJoinRequests,
    GetRejoinApprovedUsers,
    IsMemberLeader(UserId),
    KickMember(UserId),
    PromoteMember(UserId),
    RejectInvitation(UserId),
    RemoveRejoinApproval(UserId),
    SendInvitation(UserId),
    UpdatePartyConfig(String),
    UpdatePartyData(Vec<u8>),
    UpdateMemberData(Vec<u8>),
}

/// Parses the JSON envelope. On failure the correlation id is recovered
/// from the raw JSON where possible so the sender can still be answered.
pub fn parse_envelope(data: &[u8]) -> Result<PartyMessage, CommandError> {
    serde_json::from_slice::<PartyMessage>(data).map_err(|e| CommandError::MalformedEnvelope {
        id: recover_id(data),
        reason: e.to_string(),
    })
}

fn recover_id(data: &[u8]) -> Option<i64> {
    serde_json::from_slice::<serde_json::Value>(data)
        .ok()
        .and_then(|value| value.get("id").and_then(serde_json::Value::as_i64))
}

/// Maps a wire op code to a command a member may send. Server-only codes
/// are rejected like unknown ones.
pub fn client_op_code(code: i64) -> Result<OpCode, CommandError> {
    match OpCode::from_code(code) {
        Some(OpCode::Terminate | OpCode::JoinRequest | OpCode::PartyMessageResponse) | None => {
            Err(CommandError::UnsupportedOpCode(code))
        }
        Some(op) => Ok(op),
    }
}

pub fn is_leader_only(op: OpCode) -> bool {
    matches!(
        op,
        OpCode::ApproveForRejoin
            | OpCode::ApproveJoinRequest
            | OpCode::ClearInvitations
            | OpCode::KickMember
            | OpCode::PromoteMember
            | OpCode::RejectInvitation
            | OpCode::RemoveUserForRejoin
            | OpCode::SendInvitation
            | OpCode::UpdateParty
            | OpCode::UpdatePartyData
    )
}

impl PartyCommand {
    /// Decodes the payload of a client op code.
    pub fn decode(op: OpCode, payload: Vec<u8>, max_config_bytes: usize) -> Result<Self, CommandError> {
        let cmd = match op {
            OpCode::ApproveForRejoin => Self::ApproveForRejoin(target(payload)?),
            OpCode::ApproveJoinRequest => Self::ApproveJoinRequest(target(payload)?),
            OpCode::ClearInvitations => Self::ClearInvitations,
            OpCode::GetPartyData => Self::GetPartyData,
            OpCode::GetPartyMemberData => Self::GetMemberData(target(payload)?),
            OpCode::GetPendingInvitedUsers => Self::GetPendingInvitedUsers,
            OpCode::GetPendingJoinRequests => Self::GetPendingJoinRequests,
            OpCode::GetUsersApprovedForRejoin => Self::GetRejoinApprovedUsers,
            OpCode::IsMemberLeader => Self::IsMemberLeader(target(payload)?),
            OpCode::KickMember => Self::KickMember(target(payload)?),
            OpCode::PromoteMember => Self::PromoteMember(target(payload)?),
            OpCode::RejectInvitation => Self::RejectInvitation(target(payload)?),
            OpCode::RemoveUserForRejoin => Self::RemoveRejoinApproval(target(payload)?),
            OpCode::SendInvitation => Self::SendInvitation(target(payload)?),
            OpCode::UpdateParty => {
                if payload.len() > max_config_bytes {
                    return Err(CommandError::ConfigTooLarge {
                        max: max_config_bytes,
                    });
                }
                let config = String::from_utf8(payload).map_err(|e| {
                    CommandError::MalformedEnvelope {
                        id: None,
                        reason: e.to_string(),
                    }
                })?;
                Self::UpdatePartyConfig(config)
            }
            OpCode::UpdatePartyData => Self::UpdatePartyData(payload),
            OpCode::UpdatePartyMemberData => Self::UpdateMemberData(payload),
            OpCode::Terminate | OpCode::JoinRequest | OpCode::PartyMessageResponse => {
                return Err(CommandError::UnsupportedOpCode(op.code()))
            }
        };
        Ok(cmd)
    }
}

fn target(payload: Vec<u8>) -> Result<UserId, CommandError> {
    let id = String::from_utf8(payload).map_err(|_| CommandError::InvalidTarget)?;
    UserId::new(id).map_err(|_| CommandError::InvalidTarget)
}
