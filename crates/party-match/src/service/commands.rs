//! Member command protocol.

use party_types::{OpCode, Presence, ResponseCode, UserId};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::domain::{client_op_code, is_leader_only, parse_envelope, PartyCommand};
use crate::ports::{Broadcast, MemberMessage, Notification, SUBJECT_INVITATION};
use crate::service::PartyMatch;

impl PartyMatch {
    /// Runs one member message and acknowledges it if it carries an id.
    pub(crate) async fn handle_message(&mut self, message: MemberMessage) {
        let MemberMessage {
            sender,
            op_code,
            data,
        } = message;

        let envelope = match parse_envelope(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(
                    party_id = %self.party_id,
                    user_id = %sender.user_id,
                    op_code,
                    error = %e,
                    "Malformed party message"
                );
                if let Some(id) = e.recovered_id() {
                    self.respond(&sender, id, e.response_code()).await;
                }
                return;
            }
        };

        let code = self.execute(&sender, op_code, envelope.data).await;
        debug!(
            party_id = %self.party_id,
            user_id = %sender.user_id,
            op_code,
            response = ?code,
            "Party command handled"
        );

        if let Some(id) = envelope.id {
            self.respond(&sender, id, code).await;
        }
    }

    async fn execute(&mut self, sender: &Presence, op_code: i64, payload: Vec<u8>) -> ResponseCode {
        if !self.ledger.is_connected(sender) {
            return ResponseCode::PresenceError;
        }

        let op = match client_op_code(op_code) {
            Ok(op) => op,
            Err(e) => return e.response_code(),
        };

        if is_leader_only(op) && !self.ledger.is_leader(sender) {
            return ResponseCode::NotPartyLeader;
        }

        let command = match PartyCommand::decode(op, payload, self.config.max_config_bytes) {
            Ok(command) => command,
            Err(e) => {
                debug!(party_id = %self.party_id, op_code, error = %e, "Rejected command payload");
                return e.response_code();
            }
        };

        match command {
            PartyCommand::ApproveForRejoin(target) => self.approve_for_rejoin(target).await,
            PartyCommand::ApproveJoinRequest(target) => self.approve_join_request(&target).await,
            PartyCommand::ClearInvitations => {
                self.registry.clear_invitations();
                self.gate.invalidate();
                ResponseCode::Success
            }
            PartyCommand::GetPartyData => {
                let data = self.party_data.clone();
                self.reply(sender, OpCode::GetPartyData, data, None).await
            }
            PartyCommand::GetMemberData(target) => {
                let Some(member) = self.ledger.get(&target).cloned() else {
                    return ResponseCode::BadRequest;
                };
                let data = self.member_data.get(&target).cloned();
                self.reply(sender, OpCode::GetPartyMemberData, data, Some(member))
                    .await
            }
            PartyCommand::GetPendingInvitedUsers => {
                let users = self.registry.invited_users();
                self.reply_user_list(sender, OpCode::GetPendingInvitedUsers, &users)
                    .await
            }
            PartyCommand::GetPendingJoinRequests => {
                let users = self.registry.pending_join_requests();
                self.reply_user_list(sender, OpCode::GetPendingJoinRequests, &users)
                    .await
            }
            PartyCommand::GetRejoinApprovedUsers => {
                let users = self.registry.rejoin_users();
                self.reply_user_list(sender, OpCode::GetUsersApprovedForRejoin, &users)
                    .await
            }
            PartyCommand::IsMemberLeader(target) => {
                let answer = if self.ledger.is_leader_user(&target) {
                    "true"
                } else {
                    "false"
                };
                self.reply(
                    sender,
                    OpCode::IsMemberLeader,
                    Some(answer.as_bytes().to_vec()),
                    None,
                )
                .await
            }
            PartyCommand::KickMember(target) => self.kick_member(sender, &target).await,
            PartyCommand::PromoteMember(target) => self.promote_member(&target).await,
            PartyCommand::RejectInvitation(target) => {
                if !self.registry.remove_invitation(&target) {
                    return ResponseCode::NoInvitePending;
                }
                self.gate.invalidate();
                ResponseCode::Success
            }
            PartyCommand::RemoveRejoinApproval(target) => {
                self.registry.remove_rejoin(&target);
                self.gate.invalidate();
                ResponseCode::Success
            }
            PartyCommand::SendInvitation(target) => self.send_invitation(sender, target).await,
            PartyCommand::UpdatePartyConfig(config) => self.update_party_config(config).await,
            PartyCommand::UpdatePartyData(data) => {
                self.party_data = Some(data.clone());
                self.broadcast_or_internal_error(Broadcast::to_all(
                    OpCode::UpdatePartyData,
                    Some(data),
                ))
                .await
            }
            PartyCommand::UpdateMemberData(data) => {
                self.member_data
                    .insert(sender.user_id.clone(), data.clone());
                self.broadcast_or_internal_error(
                    Broadcast::to_all(OpCode::UpdatePartyMemberData, Some(data))
                        .sent_by(sender.clone()),
                )
                .await
            }
        }
    }

    async fn broadcast_or_internal_error(&self, message: Broadcast) -> ResponseCode {
        if self.broadcast(message).await {
            ResponseCode::Success
        } else {
            ResponseCode::InternalError
        }
    }

    /// Sends data back to the sender on the command's own op code.
    async fn reply(
        &self,
        to: &Presence,
        op_code: OpCode,
        data: Option<Vec<u8>>,
        from: Option<Presence>,
    ) -> ResponseCode {
        let mut message = Broadcast::to(to.clone(), op_code, data);
        message.sender = from;
        self.broadcast_or_internal_error(message).await
    }

    async fn reply_user_list(&self, to: &Presence, op_code: OpCode, users: &[UserId]) -> ResponseCode {
        match serde_json::to_vec(users) {
            Ok(data) => self.reply(to, op_code, Some(data), None).await,
            Err(e) => {
                warn!(party_id = %self.party_id, error = %e, "Cannot encode user list");
                ResponseCode::InternalError
            }
        }
    }

    async fn approve_for_rejoin(&mut self, target: UserId) -> ResponseCode {
        if self.check_unblocked(&target).await.is_err() {
            return ResponseCode::UserBlocked;
        }
        self.registry.approve_rejoin(target);
        self.gate.invalidate();
        ResponseCode::Success
    }

    async fn approve_join_request(&mut self, target: &UserId) -> ResponseCode {
        let Some(presence) = self.registry.take_join_request(target) else {
            return ResponseCode::Success;
        };

        // Staged metadata stays until the join completes.
        match self.deps.presence.admit(&self.party_id, presence).await {
            Ok(()) => {
                self.admitted.insert(target.clone());
                info!(party_id = %self.party_id, user_id = %target, "Join request approved");
                ResponseCode::Success
            }
            Err(e) => {
                warn!(party_id = %self.party_id, user_id = %target, error = %e, "Admitting approved user failed");
                ResponseCode::InternalError
            }
        }
    }

    async fn kick_member(&mut self, sender: &Presence, target: &UserId) -> ResponseCode {
        let Some(presence) = self.ledger.get(target).cloned() else {
            warn!(party_id = %self.party_id, user_id = %target, "Kick target is not a member");
            return ResponseCode::PresenceError;
        };
        if &sender.user_id == target {
            return ResponseCode::BadRequest;
        }

        let notice = Broadcast::to_all(OpCode::KickMember, None).sent_by(presence.clone());
        if !self.broadcast(notice).await {
            return ResponseCode::InternalError;
        }
        if let Err(e) = self.deps.dispatcher.kick(vec![presence]).await {
            warn!(party_id = %self.party_id, user_id = %target, error = %e, "Kick failed");
            return ResponseCode::InternalError;
        }

        self.ledger.remove(target, None);
        self.member_data.remove(target);
        self.registry.take_metadata(target);
        self.label.remove_member(target);
        self.gate.invalidate();
        info!(party_id = %self.party_id, user_id = %target, "Member kicked");

        self.deps.hooks.on_kick(&self.party_id, target);
        self.publish_label().await;
        ResponseCode::Success
    }

    async fn promote_member(&mut self, target: &UserId) -> ResponseCode {
        let Some(presence) = self.ledger.get(target).cloned() else {
            return ResponseCode::PresenceError;
        };

        self.ledger.set_leader(presence.clone());
        info!(party_id = %self.party_id, user_id = %target, "Member promoted");
        self.broadcast(Broadcast::to_all(OpCode::PromoteMember, None).sent_by(presence))
            .await;
        ResponseCode::Success
    }

    async fn send_invitation(&mut self, sender: &Presence, target: UserId) -> ResponseCode {
        if sender.user_id == target {
            return ResponseCode::BadRequest;
        }
        if self.registry.is_invited(&target) {
            return ResponseCode::InvitePending;
        }

        match self.deps.presence.count_online(&target).await {
            Ok(0) => return ResponseCode::UserOffline,
            Ok(_) => {}
            Err(e) => {
                warn!(party_id = %self.party_id, user_id = %target, error = %e, "Presence lookup failed");
                return ResponseCode::InternalError;
            }
        }

        if self.check_unblocked(&target).await.is_err() {
            return ResponseCode::UserBlocked;
        }

        let content = json!({
            "party_id": self.party_id.to_string(),
            "version": self.version.clone().unwrap_or_default(),
        });
        let invitation = Notification::party(target.clone(), SUBJECT_INVITATION, content)
            .with_sender(sender.user_id.clone());
        if let Err(e) = self.deps.notifier.send(invitation).await {
            warn!(party_id = %self.party_id, user_id = %target, error = %e, "Sending invitation failed");
            return ResponseCode::InternalError;
        }

        let expires_at = self.config.invitations_expire().then(|| {
            let ttl = u64::try_from(self.config.invite_duration.as_millis()).unwrap_or(u64::MAX);
            self.now().saturating_add(ttl)
        });
        self.registry.invite(target.clone(), expires_at);
        self.prefetch_blocked(&target).await;
        self.gate.invalidate();
        info!(party_id = %self.party_id, user_id = %target, "Invitation sent");
        ResponseCode::Success
    }

    async fn update_party_config(&mut self, config: String) -> ResponseCode {
        self.label.config = config.clone();
        self.publish_label().await;
        self.broadcast_or_internal_error(Broadcast::to_all(
            OpCode::UpdateParty,
            Some(config.into_bytes()),
        ))
        .await
    }
}
