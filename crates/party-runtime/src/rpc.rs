//! # Party RPCs
//!
//! JSON request/response handlers callable by clients outside of a party.
//! Each handler validates its arguments and calls into [`PartyServer`].
//! Business outcomes come back as completion codes in the response body;
//! [`RpcError`] is reserved for requests that could not be served at all.

use party_match::ports::SUBJECT_REJECTED_INVITATION;
use party_match::{
    AdmissionVerdict, DenyReason, Notification, NotificationService, PartyError, PendingReason,
};
use party_types::{JoinMetadata, OpCode, PartyId, PartyMessage, Presence, SessionId, UserId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{RpcError, ServerError};
use crate::server::PartyServer;

/// Notification code of join request approvals and denials.
pub const JOIN_REQUEST_NOTIFICATION_CODE: i32 = 100;

pub const SUBJECT_JOIN_REQUEST_APPROVED: &str = "JoinRequestApproved";
pub const SUBJECT_JOIN_REQUEST_REJECTED: &str = "JoinRequestRejected";

/// RPC names accepted by [`PartyRpc::dispatch`].
pub mod methods {
    pub const CREATE_PARTY: &str = "CreateParty";
    pub const GET_ADVERTISED_PARTY: &str = "GetAdvertisedParty";
    pub const JOIN_PARTY: &str = "JoinParty";
    pub const LEAVE_PARTY: &str = "LeaveParty";
    pub const APPROVE_JOIN_REQUEST: &str = "ApproveJoinRequest";
    pub const REJECT_PARTY_INVITE: &str = "RejectPartyInvite";
}

/// Declares a completion code enum that travels as a bare integer.
macro_rules! completion_result {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident = $value:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(into = "i32", try_from = "i32")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> Self {
                match value {
                    $($name::$variant => $value),+
                }
            }
        }

        impl TryFrom<i32> for $name {
            type Error = String;

            fn try_from(value: i32) -> Result<Self, Self::Error> {
                match value {
                    $(v if v == $value => Ok($name::$variant),)+
                    other => Err(format!("unknown {} {}", stringify!($name), other)),
                }
            }
        }
    };
}

completion_result!(CreatePartyCompletion {
    Succeeded = 1,
    UnknownInternalFailure = 0,
    /// Bad party type or oversized configuration.
    FailedToCreateMucRoom = -96,
});

completion_result!(JoinPartyCompletion {
    Succeeded = 1,
    UnknownInternalFailure = 0,
    LoggedOut = -90,
    BadBuild = -99,
    NoSpace = -95,
    NotApproved = -94,
    RequesteeNotLeader = -92,
    NoResponse = -91,
    AlreadyInParty = -86,
    JoinInfoInvalid = -85,
    MessagingFailure = -83,
    GameSpecificReason = -82,
});

completion_result!(LeavePartyCompletion {
    Succeeded = 1,
    UnknownInternalFailure = 0,
    LoggedOut = -98,
    UnknownParty = -97,
    NotMember = -94,
    MessagingFailure = -93,
});

impl From<&AdmissionVerdict> for JoinPartyCompletion {
    fn from(verdict: &AdmissionVerdict) -> Self {
        match verdict {
            AdmissionVerdict::Admit => Self::Succeeded,
            AdmissionVerdict::Deny(reason) => match reason {
                DenyReason::AlreadyJoined => Self::AlreadyInParty,
                DenyReason::IncompatibleVersion => Self::BadBuild,
                DenyReason::PartyFull => Self::NoSpace,
                DenyReason::BlockedByParty | DenyReason::BlocksPartyMember => Self::NotApproved,
                DenyReason::NoLeader => Self::RequesteeNotLeader,
                DenyReason::LeaderUnreachable => Self::MessagingFailure,
            },
            AdmissionVerdict::Pending(PendingReason::JoinRequestSent) => Self::NoResponse,
            AdmissionVerdict::Pending(PendingReason::Hook(_)) => Self::GameSpecificReason,
        }
    }
}

/// Identity of the caller, as established by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcContext {
    pub user_id: UserId,
    pub session_id: SessionId,
}

impl RpcContext {
    pub fn new(user_id: UserId, session_id: SessionId) -> Self {
        Self {
            user_id,
            session_id,
        }
    }
}

impl From<&Presence> for RpcContext {
    fn from(presence: &Presence) -> Self {
        Self::new(presence.user_id.clone(), presence.session_id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePartyRequest {
    pub party_type_id: i64,
    #[serde(default)]
    pub party_configuration: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePartyResponse {
    pub party_id: String,
    pub create_party_completion_result: CreatePartyCompletion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAdvertisedPartyRequest {
    pub user_id: String,
    pub party_type_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAdvertisedPartyResponse {
    #[serde(default)]
    pub party_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPartyRequest {
    pub party_id: String,
    #[serde(default)]
    pub metadata: JoinMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPartyResponse {
    pub party_id: String,
    pub join_party_completion_result: JoinPartyCompletion,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeavePartyRequest {
    pub party_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeavePartyResponse {
    pub party_id: String,
    pub leave_party_completion_result: LeavePartyCompletion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveJoinRequestRequest {
    pub party_id: String,
    /// User whose join request is answered.
    pub recipient_id: String,
    pub is_approved: bool,
    /// Completion code reported to the requester on denial.
    #[serde(default)]
    pub denied_result_code: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectPartyInviteRequest {
    pub party_id: String,
}

/// Party RPC handlers.
pub struct PartyRpc {
    server: Arc<PartyServer>,
}

impl PartyRpc {
    pub fn new(server: Arc<PartyServer>) -> Self {
        Self { server }
    }

    /// Decodes `payload`, runs the named RPC and encodes its response.
    /// RPCs without a response body return an empty string.
    #[instrument(skip(self, payload), fields(user_id = %ctx.user_id))]
    pub async fn dispatch(
        &self,
        ctx: &RpcContext,
        method: &str,
        payload: &str,
    ) -> Result<String, RpcError> {
        match method {
            methods::CREATE_PARTY => encode(&self.create_party(ctx, decode(payload)?).await?),
            methods::GET_ADVERTISED_PARTY => {
                encode(&self.get_advertised_party(ctx, decode(payload)?).await?)
            }
            methods::JOIN_PARTY => encode(&self.join_party(ctx, decode(payload)?).await?),
            methods::LEAVE_PARTY => encode(&self.leave_party(ctx, decode(payload)?).await?),
            methods::APPROVE_JOIN_REQUEST => {
                self.approve_join_request(ctx, decode(payload)?).await?;
                Ok(String::new())
            }
            methods::REJECT_PARTY_INVITE => {
                self.reject_party_invite(ctx, decode(payload)?).await?;
                Ok(String::new())
            }
            other => Err(RpcError::UnknownMethod(other.to_string())),
        }
    }

    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    pub async fn create_party(
        &self,
        ctx: &RpcContext,
        req: CreatePartyRequest,
    ) -> Result<CreatePartyResponse, RpcError> {
        let result = self
            .server
            .create_party(&ctx.user_id, req.party_type_id, req.party_configuration)
            .await;

        let response = match result {
            Ok(party_id) => CreatePartyResponse {
                party_id: party_id.to_string(),
                create_party_completion_result: CreatePartyCompletion::Succeeded,
            },
            Err(ServerError::Party(
                e @ (PartyError::InvalidPartyType(_) | PartyError::ConfigTooLarge { .. }),
            )) => {
                debug!(error = %e, "Party creation refused");
                CreatePartyResponse {
                    party_id: String::new(),
                    create_party_completion_result: CreatePartyCompletion::FailedToCreateMucRoom,
                }
            }
            Err(e) => {
                warn!(error = %e, "Party creation failed");
                CreatePartyResponse {
                    party_id: String::new(),
                    create_party_completion_result: CreatePartyCompletion::UnknownInternalFailure,
                }
            }
        };
        Ok(response)
    }

    /// First party of the requested type the given user is in. An empty
    /// response means there is none.
    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    pub async fn get_advertised_party(
        &self,
        ctx: &RpcContext,
        req: GetAdvertisedPartyRequest,
    ) -> Result<GetAdvertisedPartyResponse, RpcError> {
        let Ok(user_id) = UserId::new(req.user_id) else {
            return Ok(GetAdvertisedPartyResponse::default());
        };
        Ok(GetAdvertisedPartyResponse {
            party_id: self
                .server
                .find_advertised(req.party_type_id, &user_id)
                .map(|id| id.to_string())
                .unwrap_or_default(),
        })
    }

    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    pub async fn join_party(
        &self,
        ctx: &RpcContext,
        req: JoinPartyRequest,
    ) -> Result<JoinPartyResponse, RpcError> {
        let respond = |result, reason: String| JoinPartyResponse {
            party_id: req.party_id.clone(),
            join_party_completion_result: result,
            reason,
        };

        let Some(presence) = self.caller(ctx) else {
            return Ok(respond(JoinPartyCompletion::LoggedOut, String::new()));
        };
        let Ok(party_id) = req.party_id.parse::<PartyId>() else {
            return Ok(respond(JoinPartyCompletion::JoinInfoInvalid, String::new()));
        };

        match self
            .server
            .join_party(&presence, &party_id, req.metadata.clone())
            .await
        {
            Ok(verdict) => Ok(respond(JoinPartyCompletion::from(&verdict), verdict.reason())),
            Err(ServerError::UnknownParty(_) | ServerError::Party(PartyError::Terminated(_))) => {
                Ok(respond(JoinPartyCompletion::JoinInfoInvalid, String::new()))
            }
            Err(ServerError::NotConnected) => {
                Ok(respond(JoinPartyCompletion::LoggedOut, String::new()))
            }
            Err(e) => {
                warn!(party_id = %party_id, error = %e, "Join failed");
                Ok(respond(JoinPartyCompletion::UnknownInternalFailure, String::new()))
            }
        }
    }

    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    pub async fn leave_party(
        &self,
        ctx: &RpcContext,
        req: LeavePartyRequest,
    ) -> Result<LeavePartyResponse, RpcError> {
        let party_id = parse_party_id(&req.party_id)?;
        let respond = |result| LeavePartyResponse {
            party_id: req.party_id.clone(),
            leave_party_completion_result: result,
        };

        let Some(presence) = self.caller(ctx) else {
            return Ok(respond(LeavePartyCompletion::LoggedOut));
        };

        let result = match self.server.leave_party(&presence, &party_id).await {
            Ok(()) => LeavePartyCompletion::Succeeded,
            Err(ServerError::UnknownParty(_)) => LeavePartyCompletion::UnknownParty,
            Err(ServerError::NotMember(_)) => LeavePartyCompletion::NotMember,
            Err(ServerError::NotConnected) => LeavePartyCompletion::LoggedOut,
            Err(ServerError::Party(e)) => {
                warn!(party_id = %party_id, error = %e, "Leave not delivered");
                LeavePartyCompletion::MessagingFailure
            }
        };
        Ok(respond(result))
    }

    /// Answers a pending join request on behalf of a party member.
    ///
    /// Approval goes through the party as an approve-join-request command
    /// sent by the caller, so the usual leader check applies.
    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    pub async fn approve_join_request(
        &self,
        ctx: &RpcContext,
        req: ApproveJoinRequestRequest,
    ) -> Result<(), RpcError> {
        let party_id = parse_party_id(&req.party_id)?;
        let recipient = UserId::new(req.recipient_id.clone())
            .map_err(|e| RpcError::InvalidRequest(e.to_string()))?;
        let presence = self.caller(ctx).ok_or(ServerError::NotConnected)?;
        if !self.server.sessions().is_tracked(&party_id, &presence) {
            return Err(RpcError::NotMember(req.party_id));
        }

        let (subject, result) = if req.is_approved {
            let envelope = PartyMessage::new(None, recipient.as_str().as_bytes().to_vec());
            self.server
                .send_message(
                    &presence,
                    &party_id,
                    OpCode::ApproveJoinRequest.code(),
                    envelope.to_bytes(),
                )
                .await?;
            (
                SUBJECT_JOIN_REQUEST_APPROVED,
                i32::from(JoinPartyCompletion::Succeeded),
            )
        } else {
            (SUBJECT_JOIN_REQUEST_REJECTED, req.denied_result_code)
        };

        let mut notification = Notification::party(
            recipient,
            subject,
            json!({
                "party_id": req.party_id,
                "join_party_completion_result": result,
            }),
        )
        .with_sender(ctx.user_id.clone());
        notification.code = JOIN_REQUEST_NOTIFICATION_CODE;

        self.server.notifier().send(notification).await?;
        Ok(())
    }

    /// Tells every member of the party that the caller declined its
    /// invitation.
    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    pub async fn reject_party_invite(
        &self,
        ctx: &RpcContext,
        req: RejectPartyInviteRequest,
    ) -> Result<(), RpcError> {
        let party_id = parse_party_id(&req.party_id)?;

        let mut members: Vec<UserId> = self
            .server
            .sessions()
            .members(&party_id)
            .into_iter()
            .map(|p| p.user_id)
            .collect();
        members.sort();
        members.dedup();

        let content = json!({
            "party_id": req.party_id,
            "member_id": ctx.user_id,
        });
        let notifications = members
            .into_iter()
            .map(|member| {
                Notification::party(member, SUBJECT_REJECTED_INVITATION, content.clone())
                    .with_sender(ctx.user_id.clone())
            })
            .collect::<Vec<_>>();

        if notifications.is_empty() {
            debug!(party_id = %party_id, "Rejected invitation of a party without members");
            return Ok(());
        }
        self.server.notifier().send_all(notifications).await?;
        Ok(())
    }

    fn caller(&self, ctx: &RpcContext) -> Option<Presence> {
        self.server
            .sessions()
            .presence(&ctx.session_id)
            .filter(|presence| presence.user_id == ctx.user_id)
    }
}

fn parse_party_id(raw: &str) -> Result<PartyId, RpcError> {
    raw.parse()
        .map_err(|_| RpcError::BadPartyId(raw.to_string()))
}

fn decode<T: DeserializeOwned>(payload: &str) -> Result<T, RpcError> {
    serde_json::from_str(payload).map_err(|e| RpcError::InvalidRequest(e.to_string()))
}

fn encode<T: Serialize>(response: &T) -> Result<String, RpcError> {
    serde_json::to_string(response).map_err(|e| RpcError::Marshal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_codes_travel_as_integers() {
        let response = CreatePartyResponse {
            party_id: String::new(),
            create_party_completion_result: CreatePartyCompletion::FailedToCreateMucRoom,
        };
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"party_id":"","create_party_completion_result":-96}"#
        );

        let parsed: LeavePartyResponse =
            serde_json::from_str(r#"{"party_id":"x","leave_party_completion_result":-94}"#).unwrap();
        assert_eq!(parsed.leave_party_completion_result, LeavePartyCompletion::NotMember);
    }

    #[test]
    fn test_unknown_completion_code_rejected() {
        let parsed = serde_json::from_str::<LeavePartyResponse>(
            r#"{"party_id":"x","leave_party_completion_result":42}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_verdict_mapping() {
        use AdmissionVerdict::*;
        let cases = [
            (Admit, JoinPartyCompletion::Succeeded),
            (Deny(DenyReason::AlreadyJoined), JoinPartyCompletion::AlreadyInParty),
            (Deny(DenyReason::IncompatibleVersion), JoinPartyCompletion::BadBuild),
            (Deny(DenyReason::PartyFull), JoinPartyCompletion::NoSpace),
            (Deny(DenyReason::BlockedByParty), JoinPartyCompletion::NotApproved),
            (Deny(DenyReason::NoLeader), JoinPartyCompletion::RequesteeNotLeader),
            (Deny(DenyReason::LeaderUnreachable), JoinPartyCompletion::MessagingFailure),
            (Pending(PendingReason::JoinRequestSent), JoinPartyCompletion::NoResponse),
            (
                Pending(PendingReason::Hook("wait".into())),
                JoinPartyCompletion::GameSpecificReason,
            ),
        ];
        for (verdict, expected) in cases {
            assert_eq!(JoinPartyCompletion::from(&verdict), expected, "{verdict:?}");
        }
    }

    #[test]
    fn test_join_metadata_is_optional() {
        let req: JoinPartyRequest = serde_json::from_str(r#"{"party_id":"p"}"#).unwrap();
        assert!(req.metadata.is_empty());
    }
}
