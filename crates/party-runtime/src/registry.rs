//! # Party Registry
//!
//! Handles of every running party plus the last label each one published.
//! The label index answers discovery queries without touching the party
//! tasks.

use parking_lot::RwLock;
use party_match::{PartyHandle, PartyLabel};
use party_types::{PartyId, UserId};
use std::collections::HashMap;
use tracing::{debug, warn};

struct PartyEntry {
    handle: PartyHandle,
    label: PartyLabel,
}

#[derive(Default)]
pub struct PartyRegistry {
    entries: RwLock<HashMap<PartyId, PartyEntry>>,
}

impl PartyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: PartyHandle, label: PartyLabel) {
        let party_id = handle.party_id().clone();
        debug!(party_id = %party_id, "Registering party");
        self.entries
            .write()
            .insert(party_id, PartyEntry { handle, label });
    }

    pub fn remove(&self, party_id: &PartyId) -> Option<PartyHandle> {
        self.entries.write().remove(party_id).map(|entry| entry.handle)
    }

    pub fn handle(&self, party_id: &PartyId) -> Option<PartyHandle> {
        self.entries
            .read()
            .get(party_id)
            .map(|entry| entry.handle.clone())
    }

    pub fn label(&self, party_id: &PartyId) -> Option<PartyLabel> {
        self.entries
            .read()
            .get(party_id)
            .map(|entry| entry.label.clone())
    }

    /// Replaces the indexed label of a registered party.
    ///
    /// Labels of unknown parties and unparseable labels are ignored.
    pub fn update_label(&self, party_id: &PartyId, json: &str) -> bool {
        let label = match PartyLabel::from_json(json) {
            Ok(label) => label,
            Err(e) => {
                warn!(party_id = %party_id, error = %e, "Ignoring unparseable label");
                return false;
            }
        };

        match self.entries.write().get_mut(party_id) {
            Some(entry) => {
                entry.label = label;
                true
            }
            None => false,
        }
    }

    /// First party of `type_id` that lists `user_id` as a member.
    pub fn find_advertised(&self, type_id: i64, user_id: &UserId) -> Option<PartyId> {
        self.entries
            .read()
            .iter()
            .find(|(_, entry)| entry.label.type_id == type_id && entry.label.has_member(user_id))
            .map(|(party_id, _)| party_id.clone())
    }

    pub fn party_ids(&self) -> Vec<PartyId> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn handles(&self) -> Vec<PartyHandle> {
        self.entries
            .read()
            .values()
            .map(|entry| entry.handle.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
