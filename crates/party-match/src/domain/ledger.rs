//! Membership ledger
//!
//! Holds the connected members of one party and who leads it. Members are
//! keyed by user id, so a user can hold at most one connection at a time.

use party_types::{Presence, SessionId, UserId};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Member {
    presence: Presence,
    /// Monotonic join order, used for leader succession.
    seq: u64,
}

#[derive(Debug, Default)]
pub struct MembershipLedger {
    members: HashMap<UserId, Member>,
    leader: Option<Presence>,
    next_seq: u64,
}

impl MembershipLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection. Returns `false`, leaving the ledger untouched, when
    /// the user already holds a connection.
    pub fn insert(&mut self, presence: Presence) -> bool {
        if self.members.contains_key(&presence.user_id) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.members
            .insert(presence.user_id.clone(), Member { presence, seq });
        true
    }

    /// Removes the user's connection. With `session` set, the connection is
    /// only removed if it is that session.
    ///
    /// Leadership is not reassigned here; see [`Self::successor`].
    pub fn remove(&mut self, user_id: &UserId, session: Option<&SessionId>) -> Option<Presence> {
        let matches = self
            .members
            .get(user_id)
            .map_or(false, |m| session.map_or(true, |s| &m.presence.session_id == s));
        if !matches {
            return None;
        }
        self.members.remove(user_id).map(|m| m.presence)
    }

    pub fn get(&self, user_id: &UserId) -> Option<&Presence> {
        self.members.get(user_id).map(|m| &m.presence)
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.members.contains_key(user_id)
    }

    /// True when this exact connection is a member.
    pub fn is_connected(&self, presence: &Presence) -> bool {
        self.get(&presence.user_id)
            .map_or(false, |p| p.same_connection(presence))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// All member connections in join order.
    pub fn presences(&self) -> Vec<Presence> {
        let mut members: Vec<&Member> = self.members.values().collect();
        members.sort_by_key(|m| m.seq);
        members.into_iter().map(|m| m.presence.clone()).collect()
    }

    pub fn user_ids(&self) -> impl Iterator<Item = &UserId> {
        self.members.keys()
    }

    pub fn leader(&self) -> Option<&Presence> {
        self.leader.as_ref()
    }

    pub fn set_leader(&mut self, presence: Presence) {
        self.leader = Some(presence);
    }

    pub fn clear_leader(&mut self) {
        self.leader = None;
    }

    /// Leadership is checked against the connection, not just the user.
    pub fn is_leader(&self, presence: &Presence) -> bool {
        self.leader
            .as_ref()
            .map_or(false, |leader| leader.same_connection(presence))
    }

    pub fn is_leader_user(&self, user_id: &UserId) -> bool {
        self.leader
            .as_ref()
            .map_or(false, |leader| &leader.user_id == user_id)
    }

    /// Earliest-joined member, the successor when the leader departs.
    pub fn successor(&self) -> Option<Presence> {
        self.members
            .values()
            .min_by_key(|m| m.seq)
            .map(|m| m.presence.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presence(user: &str, session: &str) -> Presence {
        Presence::new(UserId::from(user), SessionId::new(session), user)
    }

    #[test]
    fn test_one_connection_per_user() {
        let mut ledger = MembershipLedger::new();
        assert!(ledger.insert(presence("u1", "s1")));
        assert!(!ledger.insert(presence("u1", "s2")));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get(&UserId::from("u1")).unwrap().session_id, SessionId::new("s1"));
    }

    #[test]
    fn test_remove_checks_session() {
        let mut ledger = MembershipLedger::new();
        ledger.insert(presence("u1", "s1"));

        assert!(ledger
            .remove(&UserId::from("u1"), Some(&SessionId::new("other")))
            .is_none());
        assert!(ledger
            .remove(&UserId::from("u1"), Some(&SessionId::new("s1")))
            .is_some());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_successor_is_earliest_joined() {
        let mut ledger = MembershipLedger::new();
        ledger.insert(presence("u1", "s1"));
        ledger.insert(presence("u3", "s3"));
        ledger.insert(presence("u2", "s2"));
        ledger.set_leader(presence("u1", "s1"));

        ledger.remove(&UserId::from("u1"), None);
        assert_eq!(ledger.successor().unwrap().user_id, UserId::from("u3"));
    }

    #[test]
    fn test_leader_matches_connection() {
        let mut ledger = MembershipLedger::new();
        ledger.insert(presence("u1", "s1"));
        ledger.set_leader(presence("u1", "s1"));

        assert!(ledger.is_leader(&presence("u1", "s1")));
        assert!(!ledger.is_leader(&presence("u1", "s9")));
        assert!(ledger.is_leader_user(&UserId::from("u1")));
    }

    #[test]
    fn test_presences_in_join_order() {
        let mut ledger = MembershipLedger::new();
        for user in ["c", "a", "b"] {
            ledger.insert(presence(user, user));
        }
        let order: Vec<_> = ledger
            .presences()
            .into_iter()
            .map(|p| p.user_id.to_string())
            .collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }
}
