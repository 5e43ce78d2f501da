//! Party lifecycle: admission, join, leave and termination.

use async_trait::async_trait;
use party_types::{JoinMetadata, OpCode, Presence, VERSION_METADATA_KEY};
use tracing::{debug, info, warn};

use crate::domain::{is_full, version_compatible, AdmissionVerdict, DenyReason, PartyLabel, PendingReason};
use crate::ports::{
    Broadcast, ExitReason, JoinAttemptOverride, MemberMessage, PartyApi, PartyStatus,
};
use crate::service::PartyMatch;

impl PartyMatch {
    async fn decide_admission(&mut self, presence: Presence, metadata: JoinMetadata) -> AdmissionVerdict {
        let user_id = presence.user_id.clone();

        // One connection per user, whichever device it comes from.
        if self.ledger.contains(&user_id) {
            return AdmissionVerdict::Deny(DenyReason::AlreadyJoined);
        }

        if self.creator.as_ref() == Some(&user_id) {
            self.creator = None;
            self.empty_ticks = 0;
            if let Some(version) = metadata.get(VERSION_METADATA_KEY) {
                self.version = Some(version.clone());
            }
            let filtered = self.deps.hooks.filter_join_metadata(metadata);
            self.registry.stage_metadata(user_id.clone(), filtered);
            self.ledger.set_leader(presence);
            self.prefetch_blocked(&user_id).await;
            self.gate.invalidate();
            self.admitted.insert(user_id);
            return AdmissionVerdict::Admit;
        }

        if !version_compatible(self.version.as_deref(), &metadata) {
            return AdmissionVerdict::Deny(DenyReason::IncompatibleVersion);
        }

        if is_full(self.config.max_size, self.occupied_slots(&user_id)) {
            return AdmissionVerdict::Deny(DenyReason::PartyFull);
        }

        let filtered = self.deps.hooks.filter_join_metadata(metadata.clone());
        self.registry.stage_metadata(user_id.clone(), filtered);

        if let Err(reason) = self.check_unblocked(&user_id).await {
            self.registry.take_metadata(&user_id);
            return AdmissionVerdict::Deny(reason.into());
        }

        if self.registry.take_rejoin(&user_id) {
            self.gate.invalidate();
            self.admitted.insert(user_id);
            return AdmissionVerdict::Admit;
        }

        self.sweep_expired_invitations().await;
        if self.registry.take_live_invitation(&user_id, self.now()) {
            self.gate.invalidate();
            self.admitted.insert(user_id);
            return AdmissionVerdict::Admit;
        }

        // Everyone else needs the leader's approval.
        let Some(leader) = self.ledger.leader().cloned() else {
            self.registry.take_metadata(&user_id);
            return AdmissionVerdict::Deny(DenyReason::NoLeader);
        };

        self.registry.add_join_request(presence.clone());
        let request = Broadcast::to(leader, OpCode::JoinRequest, None).sent_by(presence.clone());
        if !self.broadcast(request).await {
            self.registry.take_join_request(&user_id);
            self.registry.take_metadata(&user_id);
            return AdmissionVerdict::Deny(DenyReason::LeaderUnreachable);
        }

        match self
            .deps
            .hooks
            .on_join_attempt(&self.party_id, &presence, &metadata)
        {
            Some(JoinAttemptOverride::Admit) => {
                self.registry.take_join_request(&user_id);
                self.admitted.insert(user_id);
                AdmissionVerdict::Admit
            }
            Some(JoinAttemptOverride::Reject(msg)) => {
                AdmissionVerdict::Pending(PendingReason::Hook(msg))
            }
            None => AdmissionVerdict::Pending(PendingReason::JoinRequestSent),
        }
    }

    /// Promotes the earliest-joined remaining member after the leader left.
    async fn fail_over_leader(&mut self) {
        self.ledger.clear_leader();
        let Some(successor) = self.ledger.successor() else {
            return;
        };

        info!(
            party_id = %self.party_id,
            user_id = %successor.user_id,
            "Leader left, promoting successor"
        );
        self.ledger.set_leader(successor.clone());
        self.broadcast(Broadcast::to_all(OpCode::PromoteMember, None).sent_by(successor))
            .await;
    }
}

#[async_trait]
impl PartyApi for PartyMatch {
    async fn start(&mut self) {
        info!(
            party_id = %self.party_id,
            type_id = self.label.type_id,
            "Party started"
        );
        self.publish_label().await;
        self.deps
            .hooks
            .on_init(&self.party_id, &self.config, &self.label);
    }

    async fn join_attempt(&mut self, presence: Presence, metadata: JoinMetadata) -> AdmissionVerdict {
        let user_id = presence.user_id.clone();
        let verdict = self.decide_admission(presence, metadata).await;
        match &verdict {
            AdmissionVerdict::Admit => {
                debug!(party_id = %self.party_id, user_id = %user_id, "Join attempt admitted")
            }
            AdmissionVerdict::Deny(reason) => {
                debug!(party_id = %self.party_id, user_id = %user_id, %reason, "Join attempt denied")
            }
            AdmissionVerdict::Pending(reason) => {
                debug!(party_id = %self.party_id, user_id = %user_id, %reason, "Join attempt pending")
            }
        }
        verdict
    }

    async fn join(&mut self, presences: Vec<Presence>) {
        let mut joined = 0usize;
        for presence in presences {
            let user_id = presence.user_id.clone();
            if let Some(existing) = self.ledger.get(&user_id) {
                if !existing.same_connection(&presence) {
                    debug!(
                        party_id = %self.party_id,
                        user_id = %user_id,
                        "Ignoring join of a second connection"
                    );
                }
                continue;
            }

            self.admitted.remove(&user_id);
            if is_full(self.config.max_size, self.ledger.len()) {
                warn!(
                    party_id = %self.party_id,
                    user_id = %user_id,
                    "Refusing join beyond party capacity"
                );
                self.registry.take_metadata(&user_id);
                if let Err(e) = self.deps.dispatcher.kick(vec![presence]).await {
                    warn!(party_id = %self.party_id, user_id = %user_id, error = %e, "Kicking surplus connection failed");
                }
                continue;
            }

            self.ledger.insert(presence);
            let metadata = self.registry.take_metadata(&user_id);
            self.label.add_member(user_id.clone(), metadata);
            joined += 1;
            info!(party_id = %self.party_id, user_id = %user_id, members = self.ledger.len(), "Member joined");
        }

        if joined > 0 {
            self.ever_joined = true;
            self.gate.invalidate();
            self.publish_label().await;
        }
    }

    async fn leave(&mut self, presences: Vec<Presence>) -> PartyStatus {
        if self.ended.is_some() {
            return self.status();
        }

        let mut removed_any = false;
        for presence in presences {
            let user_id = presence.user_id.clone();
            self.admitted.remove(&user_id);
            if self
                .ledger
                .remove(&user_id, Some(&presence.session_id))
                .is_none()
            {
                // Kicked earlier, or a stale session of a user who is back.
                if !self.ledger.contains(&user_id) {
                    self.member_data.remove(&user_id);
                    self.label.remove_member(&user_id);
                }
                continue;
            }

            removed_any = true;
            self.member_data.remove(&user_id);
            self.registry.take_metadata(&user_id);
            self.label.remove_member(&user_id);
            self.gate.invalidate();
            info!(party_id = %self.party_id, user_id = %user_id, "Member left");

            if self.ledger.is_leader_user(&user_id) {
                self.fail_over_leader().await;
            }

            self.deps.hooks.on_leave(&self.party_id, &user_id);
        }

        if removed_any && self.ledger.is_empty() {
            return self.end(ExitReason::Empty);
        }

        self.publish_label().await;
        PartyStatus::Running
    }

    async fn tick(&mut self, messages: Vec<MemberMessage>) -> PartyStatus {
        if self.ended.is_some() {
            return self.status();
        }

        if let Some(reason) = self.check_initial_join_window() {
            return self.end(reason);
        }

        self.sweep_expired_invitations().await;

        for message in messages {
            self.handle_message(message).await;
        }

        PartyStatus::Running
    }

    async fn terminate(&mut self) -> PartyStatus {
        if self.ended.is_some() {
            return self.status();
        }

        self.broadcast(Broadcast::to_all(OpCode::Terminate, None))
            .await;
        self.end(ExitReason::Shutdown)
    }

    fn label(&self) -> &PartyLabel {
        &self.label
    }
}
