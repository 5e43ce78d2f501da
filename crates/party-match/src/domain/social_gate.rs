//! Social gate
//!
//! Decides whether a candidate may join (or be invited to) a party given
//! the block lists of everyone relevant to it: members, invitees and users
//! approved for rejoin.
//!
//! Two cache levels:
//!
//! - `blocked_lists`: each user's own block list, kept for the party's
//!   lifetime once fetched.
//! - `blocked_set`: the union of the block lists of the relevant users.
//!   Rebuilt on demand after [`SocialGate::invalidate`].
//!
//! Fetching lists is the caller's job. This type only stores and combines
//! them.

use party_types::UserId;
use std::collections::{HashMap, HashSet};

/// Why the gate refused a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// A relevant user has blocked the candidate.
    BlockedByParty,
    /// The candidate has blocked a relevant user.
    BlocksPartyMember,
}

#[derive(Debug, Default)]
pub struct SocialGate {
    blocked_lists: HashMap<UserId, HashSet<UserId>>,
    blocked_set: HashSet<UserId>,
    dirty: bool,
}

impl SocialGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the derived set stale. Call whenever the relevant users change.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn has_list(&self, user_id: &UserId) -> bool {
        self.blocked_lists.contains_key(user_id)
    }

    /// Records a fetched block list for `user_id`.
    pub fn store_list(&mut self, user_id: UserId, blocked: impl IntoIterator<Item = UserId>) {
        self.blocked_lists
            .insert(user_id, blocked.into_iter().collect());
    }

    /// Users among `relevant` whose list has not been fetched yet.
    pub fn missing<'a>(&self, relevant: impl IntoIterator<Item = &'a UserId>) -> Vec<UserId> {
        relevant
            .into_iter()
            .filter(|user| !self.blocked_lists.contains_key(*user))
            .cloned()
            .collect()
    }

    /// Rebuilds the derived set if it is stale. Users without a stored list
    /// contribute nothing.
    pub fn ensure_fresh(&mut self, relevant: &HashSet<UserId>) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        self.blocked_set = relevant
            .iter()
            .filter_map(|user| self.blocked_lists.get(user))
            .flat_map(|list| list.iter().cloned())
            .collect();
    }

    /// Checks `candidate` against the derived set and its own block list.
    /// The derived set must be fresh.
    pub fn check(&self, candidate: &UserId, relevant: &HashSet<UserId>) -> Result<(), BlockReason> {
        if self.blocked_set.contains(candidate) {
            return Err(BlockReason::BlockedByParty);
        }

        let blocks_relevant = self
            .blocked_lists
            .get(candidate)
            .map_or(false, |own| own.iter().any(|user| relevant.contains(user)));
        if blocks_relevant {
            return Err(BlockReason::BlocksPartyMember);
        }

        Ok(())
    }
}
