//! Discovery label
//!
//! The label is the only view of a party visible outside of it. It is
//! published as JSON with empty fields left out, and listing queries match
//! on `type_id` and `members`.

use party_types::{JoinMetadata, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn is_zero(value: &i64) -> bool {
    *value == 0
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyLabel {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub type_id: i64,

    /// Members in join order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<UserId>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<UserId, JoinMetadata>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub config: String,
}

impl PartyLabel {
    pub fn new(type_id: i64, config: impl Into<String>) -> Self {
        Self {
            type_id,
            config: config.into(),
            ..Default::default()
        }
    }

    /// Adds a member with its filtered join metadata. Re-adding a member
    /// only refreshes its metadata.
    pub fn add_member(&mut self, user_id: UserId, metadata: JoinMetadata) {
        if !self.members.contains(&user_id) {
            self.members.push(user_id.clone());
        }
        self.metadata.insert(user_id, metadata);
    }

    pub fn remove_member(&mut self, user_id: &UserId) {
        self.members.retain(|member| member != user_id);
        self.metadata.remove(user_id);
    }

    pub fn has_member(&self, user_id: &UserId) -> bool {
        self.members.contains(user_id)
    }

    /// Serialized form handed to the discovery index.
    pub fn to_json(&self) -> String {
        // String keys and values only; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
