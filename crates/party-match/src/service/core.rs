use party_types::{OpCode, PartyId, PartyMessageResponse, Presence, ResponseCode, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{InvitationRegistry, MembershipLedger, PartyConfig, PartyLabel, SocialGate};
use crate::error::PartyError;
use crate::ports::{
    Broadcast, ExitReason, MatchDispatcher, NotificationService, PartyHooks, PartyStatus,
    PresenceDirectory, SocialGraph, TimeSource, Timestamp,
};

/// Collaborators of a party.
#[derive(Clone)]
pub struct PartyDeps {
    pub dispatcher: Arc<dyn MatchDispatcher>,
    pub presence: Arc<dyn PresenceDirectory>,
    pub notifier: Arc<dyn NotificationService>,
    pub social: Arc<dyn SocialGraph>,
    pub clock: Arc<dyn TimeSource>,
    pub hooks: Arc<dyn PartyHooks>,
}

/// Authoritative state of one party, implementing [`crate::ports::PartyApi`].
///
/// # Example
///
/// ```rust,ignore
/// let mut party = PartyMatch::new(party_id, creator, 5, "std".into(), config, deps)?;
/// party.start().await;
/// let verdict = party.join_attempt(presence, metadata).await;
/// ```
pub struct PartyMatch {
    pub(crate) party_id: PartyId,
    pub(crate) config: PartyConfig,
    pub(crate) deps: PartyDeps,

    pub(crate) ledger: MembershipLedger,
    pub(crate) registry: InvitationRegistry,
    pub(crate) gate: SocialGate,
    pub(crate) label: PartyLabel,

    pub(crate) party_data: Option<Vec<u8>>,
    pub(crate) member_data: HashMap<UserId, Vec<u8>>,
    /// Admitted users whose join has not arrived yet. They hold a slot.
    pub(crate) admitted: HashSet<UserId>,

    /// Fixed by the first leader; joiners must match it.
    pub(crate) version: Option<String>,
    /// Cleared once the creator has been admitted.
    pub(crate) creator: Option<UserId>,
    pub(crate) empty_ticks: u32,
    pub(crate) ever_joined: bool,
    pub(crate) ended: Option<ExitReason>,
}

impl PartyMatch {
    /// Creates a party owned by `creator`.
    ///
    /// # Errors
    ///
    /// - `InvalidPartyType`: `type_id` is negative
    /// - `ConfigTooLarge`: `party_config` exceeds `config.max_config_bytes`
    /// - `InvalidConfig`: `config` fails validation
    pub fn new(
        party_id: PartyId,
        creator: UserId,
        type_id: i64,
        party_config: String,
        config: PartyConfig,
        deps: PartyDeps,
    ) -> Result<Self, PartyError> {
        config.validate()?;
        if type_id < 0 {
            return Err(PartyError::InvalidPartyType(type_id));
        }
        if party_config.len() > config.max_config_bytes {
            return Err(PartyError::ConfigTooLarge {
                size: party_config.len(),
                max: config.max_config_bytes,
            });
        }

        Ok(Self {
            party_id,
            config,
            deps,
            ledger: MembershipLedger::new(),
            registry: InvitationRegistry::new(),
            gate: SocialGate::new(),
            label: PartyLabel::new(type_id, party_config),
            party_data: None,
            member_data: HashMap::new(),
            admitted: HashSet::new(),
            version: None,
            creator: Some(creator),
            empty_ticks: 0,
            ever_joined: false,
            ended: None,
        })
    }

    pub fn party_id(&self) -> &PartyId {
        &self.party_id
    }

    pub fn config(&self) -> &PartyConfig {
        &self.config
    }

    pub fn leader(&self) -> Option<&Presence> {
        self.ledger.leader()
    }

    pub fn members(&self) -> Vec<Presence> {
        self.ledger.presences()
    }

    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.ledger.contains(user_id)
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn party_data(&self) -> Option<&[u8]> {
        self.party_data.as_deref()
    }

    pub fn member_data(&self, user_id: &UserId) -> Option<&[u8]> {
        self.member_data.get(user_id).map(Vec::as_slice)
    }

    pub fn invited_users(&self) -> Vec<UserId> {
        self.registry.invited_users()
    }

    pub fn pending_join_requests(&self) -> Vec<UserId> {
        self.registry.pending_join_requests()
    }

    pub fn rejoin_users(&self) -> Vec<UserId> {
        self.registry.rejoin_users()
    }

    pub fn status(&self) -> PartyStatus {
        match self.ended {
            Some(reason) => PartyStatus::Terminated(reason),
            None => PartyStatus::Running,
        }
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.deps.clock.now()
    }

    /// Members, invitees and rejoin-approved users.
    /// Slots taken by members and by admissions still in flight, not
    /// counting `candidate` itself.
    pub(crate) fn occupied_slots(&self, candidate: &UserId) -> usize {
        let in_flight = self
            .admitted
            .iter()
            .filter(|user| *user != candidate && !self.ledger.contains(user))
            .count();
        self.ledger.len() + in_flight
    }

    pub(crate) fn relevant_users(&self) -> HashSet<UserId> {
        self.ledger
            .user_ids()
            .chain(self.registry.pending_relevant())
            .cloned()
            .collect()
    }

    /// Sends a broadcast, logging failures. Returns whether it was accepted.
    pub(crate) async fn broadcast(&self, message: Broadcast) -> bool {
        let op_code = message.op_code;
        match self.deps.dispatcher.broadcast(message).await {
            Ok(()) => true,
            Err(e) => {
                warn!(party_id = %self.party_id, ?op_code, error = %e, "Broadcast failed");
                false
            }
        }
    }

    pub(crate) async fn publish_label(&self) {
        if let Err(e) = self.deps.dispatcher.update_label(self.label.to_json()).await {
            warn!(party_id = %self.party_id, error = %e, "Label update failed");
        }
    }

    /// Acknowledges a correlated command to its sender.
    pub(crate) async fn respond(&self, to: &Presence, id: i64, response_code: ResponseCode) {
        let response = PartyMessageResponse { id, response_code };
        let data = match serde_json::to_vec(&response) {
            Ok(data) => data,
            Err(e) => {
                warn!(party_id = %self.party_id, error = %e, "Cannot encode party message response");
                return;
            }
        };
        self.broadcast(Broadcast::to(
            to.clone(),
            OpCode::PartyMessageResponse,
            Some(data),
        ))
        .await;
    }

    /// Marks the party ended and runs the end hook, once.
    pub(crate) fn end(&mut self, reason: ExitReason) -> PartyStatus {
        if self.ended.is_none() {
            self.ended = Some(reason);
            info!(party_id = %self.party_id, reason = reason.as_str(), "Party ended");
            self.deps
                .hooks
                .on_end(&self.party_id, &self.config, &self.label);
        } else {
            debug!(party_id = %self.party_id, "Party already ended");
        }
        self.status()
    }
}
