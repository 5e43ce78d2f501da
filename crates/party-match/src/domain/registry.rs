//! Invitation & rejoin registry
//!
//! Pending paths into a party other than the creator's:
//!
//! - invitations sent by the leader, optionally expiring;
//! - join requests waiting for the leader's decision;
//! - users pre-approved to rejoin without asking;
//! - join metadata staged between the admission verdict and the join.
//!
//! A user is in at most one of invitations, join requests and rejoin
//! approvals: recording one path clears the others.

use party_types::{JoinMetadata, Presence, UserId};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct InvitationRegistry {
    /// Expiry in clock milliseconds; `None` never expires.
    invitations: HashMap<UserId, Option<u64>>,
    join_requests: HashMap<UserId, Presence>,
    rejoin: HashSet<UserId>,
    staged_metadata: HashMap<UserId, JoinMetadata>,
}

impl InvitationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- invitations ----

    pub fn invite(&mut self, user_id: UserId, expires_at: Option<u64>) {
        self.join_requests.remove(&user_id);
        self.rejoin.remove(&user_id);
        self.invitations.insert(user_id, expires_at);
    }

    pub fn is_invited(&self, user_id: &UserId) -> bool {
        self.invitations.contains_key(user_id)
    }

    /// Consumes the user's invitation if it exists and has not expired.
    pub fn take_live_invitation(&mut self, user_id: &UserId, now_ms: u64) -> bool {
        match self.invitations.get(user_id) {
            Some(expiry) if !is_expired(*expiry, now_ms) => {
                self.invitations.remove(user_id);
                true
            }
            _ => false,
        }
    }

    pub fn remove_invitation(&mut self, user_id: &UserId) -> bool {
        self.invitations.remove(user_id).is_some()
    }

    pub fn clear_invitations(&mut self) {
        self.invitations.clear();
    }

    /// Removes and returns every invitation whose expiry lies strictly
    /// before `now_ms`, sorted by user id.
    pub fn sweep_expired(&mut self, now_ms: u64) -> Vec<UserId> {
        let mut expired: Vec<UserId> = self
            .invitations
            .iter()
            .filter(|(_, expiry)| is_expired(**expiry, now_ms))
            .map(|(user, _)| user.clone())
            .collect();
        expired.sort();
        for user in &expired {
            self.invitations.remove(user);
        }
        expired
    }

    pub fn invited_users(&self) -> Vec<UserId> {
        sorted(self.invitations.keys())
    }

    // ---- join requests ----

    pub fn add_join_request(&mut self, presence: Presence) {
        self.invitations.remove(&presence.user_id);
        self.rejoin.remove(&presence.user_id);
        self.join_requests.insert(presence.user_id.clone(), presence);
    }

    pub fn take_join_request(&mut self, user_id: &UserId) -> Option<Presence> {
        self.join_requests.remove(user_id)
    }

    pub fn has_join_request(&self, user_id: &UserId) -> bool {
        self.join_requests.contains_key(user_id)
    }

    pub fn pending_join_requests(&self) -> Vec<UserId> {
        sorted(self.join_requests.keys())
    }

    // ---- rejoin approvals ----

    pub fn approve_rejoin(&mut self, user_id: UserId) {
        self.join_requests.remove(&user_id);
        self.invitations.remove(&user_id);
        self.rejoin.insert(user_id);
    }

    /// Consumes the user's rejoin approval.
    pub fn take_rejoin(&mut self, user_id: &UserId) -> bool {
        self.rejoin.remove(user_id)
    }

    pub fn remove_rejoin(&mut self, user_id: &UserId) -> bool {
        self.rejoin.remove(user_id)
    }

    pub fn is_rejoin_approved(&self, user_id: &UserId) -> bool {
        self.rejoin.contains(user_id)
    }

    pub fn rejoin_users(&self) -> Vec<UserId> {
        sorted(self.rejoin.iter())
    }

    // ---- staged metadata ----

    pub fn stage_metadata(&mut self, user_id: UserId, metadata: JoinMetadata) {
        self.staged_metadata.insert(user_id, metadata);
    }

    pub fn take_metadata(&mut self, user_id: &UserId) -> JoinMetadata {
        self.staged_metadata.remove(user_id).unwrap_or_default()
    }

    /// Users whose block lists the social gate must consider, besides
    /// members.
    pub fn pending_relevant(&self) -> impl Iterator<Item = &UserId> {
        self.invitations.keys().chain(self.rejoin.iter())
    }
}

fn is_expired(expiry: Option<u64>, now_ms: u64) -> bool {
    expiry.map_or(false, |at| now_ms > at)
}

fn sorted<'a>(users: impl Iterator<Item = &'a UserId>) -> Vec<UserId> {
    let mut users: Vec<UserId> = users.cloned().collect();
    users.sort();
    users
}
