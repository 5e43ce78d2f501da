//! # Party Server
//!
//! Composes the bus, the registries and the party actors into one running
//! server. Everything a client can do goes through here.

use party_bus::{EventFilter, EventPublisher, InMemoryEventBus, PartyEvent};
use party_match::{
    spawn_party, AdmissionVerdict, BusDispatcher, InMemoryNotificationService,
    InMemorySocialGraph, MemberMessage, NoopHooks, PartyApi, PartyDeps, PartyExit, PartyHooks,
    PartyMatch, SystemTimeSource, TimeSource,
};
use party_types::{JoinMetadata, PartyId, Presence, SessionId, UserId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::error::ServerError;
use crate::registry::PartyRegistry;
use crate::router::EventRouter;
use crate::sessions::{ClientConnection, SessionRegistry};

pub struct PartyServer {
    config: RuntimeConfig,
    bus: Arc<InMemoryEventBus>,
    parties: Arc<PartyRegistry>,
    sessions: Arc<SessionRegistry>,
    social: Arc<InMemorySocialGraph>,
    notifier: Arc<InMemoryNotificationService>,
    clock: Arc<dyn TimeSource>,
    hooks: Arc<dyn PartyHooks>,
    exits: mpsc::UnboundedSender<PartyExit>,
}

impl PartyServer {
    /// Starts a server with no-op hooks and the system clock.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: RuntimeConfig) -> Arc<Self> {
        Self::start_with(config, Arc::new(NoopHooks), Arc::new(SystemTimeSource))
    }

    pub fn start_with(
        config: RuntimeConfig,
        hooks: Arc<dyn PartyHooks>,
        clock: Arc<dyn TimeSource>,
    ) -> Arc<Self> {
        let bus = Arc::new(InMemoryEventBus::new());
        let parties = Arc::new(PartyRegistry::new());
        let sessions = Arc::new(SessionRegistry::new(parties.clone()));

        // Subscribe before any party exists so no event goes unrouted.
        let router = EventRouter::new(sessions.clone(), parties.clone());
        tokio::spawn(router.run(bus.subscribe(EventFilter::all())));

        let (exits, exit_rx) = mpsc::unbounded_channel();
        tokio::spawn(reap_exits(exit_rx, parties.clone(), bus.clone()));

        info!(node = %config.node, "Party server started");
        Arc::new(Self {
            config,
            bus,
            parties,
            sessions,
            social: Arc::new(InMemorySocialGraph::new()),
            notifier: Arc::new(InMemoryNotificationService::new()),
            clock,
            hooks,
            exits,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        &self.bus
    }

    pub fn parties(&self) -> &Arc<PartyRegistry> {
        &self.parties
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn social(&self) -> &Arc<InMemorySocialGraph> {
        &self.social
    }

    pub fn notifier(&self) -> &Arc<InMemoryNotificationService> {
        &self.notifier
    }

    pub fn connect(&self, user_id: UserId, username: impl Into<String>) -> ClientConnection {
        self.sessions.connect(user_id, username)
    }

    /// Closes a session and leaves every party it was in.
    pub async fn disconnect(&self, session_id: &SessionId) {
        let Some(presence) = self.sessions.presence(session_id) else {
            return;
        };
        for party_id in self.sessions.disconnect(session_id) {
            if let Some(handle) = self.parties.handle(&party_id) {
                if let Err(e) = handle.leave(vec![presence.clone()]).await {
                    debug!(party_id = %party_id, error = %e, "Party gone before disconnect leave");
                }
            }
        }
    }

    /// Creates and starts a party owned by `creator`.
    pub async fn create_party(
        &self,
        creator: &UserId,
        type_id: i64,
        party_config: String,
    ) -> Result<PartyId, ServerError> {
        let party_id = PartyId::generate(self.config.node.clone());
        let deps = PartyDeps {
            dispatcher: Arc::new(BusDispatcher::new(
                party_id.clone(),
                self.bus.clone() as Arc<dyn EventPublisher>,
            )),
            presence: self.sessions.clone(),
            notifier: self.notifier.clone(),
            social: self.social.clone(),
            clock: self.clock.clone(),
            hooks: self.hooks.clone(),
        };

        let party = PartyMatch::new(
            party_id.clone(),
            creator.clone(),
            type_id,
            party_config,
            self.config.party.clone(),
            deps,
        )?;
        let label = party.label().clone();

        let (handle, _task) = spawn_party(party, self.config.inbox_capacity, Some(self.exits.clone()));
        self.parties.insert(handle, label);

        info!(party_id = %party_id, user_id = %creator, type_id, "Party created");
        Ok(party_id)
    }

    /// Runs admission for `presence` and joins it on admit.
    pub async fn join_party(
        &self,
        presence: &Presence,
        party_id: &PartyId,
        metadata: JoinMetadata,
    ) -> Result<AdmissionVerdict, ServerError> {
        if !self.sessions.is_connected(presence) {
            return Err(ServerError::NotConnected);
        }
        let handle = self
            .parties
            .handle(party_id)
            .ok_or_else(|| ServerError::UnknownParty(party_id.clone()))?;

        let verdict = handle.join_attempt(presence.clone(), metadata).await?;
        if verdict.is_admitted() {
            self.sessions.track(party_id, presence.clone());
            if let Err(e) = handle.join(vec![presence.clone()]).await {
                self.sessions.untrack(party_id, presence);
                return Err(e.into());
            }
        } else {
            debug!(party_id = %party_id, user_id = %presence.user_id, reason = %verdict.reason(), "Join refused");
        }
        Ok(verdict)
    }

    pub async fn leave_party(&self, presence: &Presence, party_id: &PartyId) -> Result<(), ServerError> {
        let handle = self
            .parties
            .handle(party_id)
            .ok_or_else(|| ServerError::UnknownParty(party_id.clone()))?;
        if !self.sessions.untrack(party_id, presence) {
            return Err(ServerError::NotMember(party_id.clone()));
        }
        handle.leave(vec![presence.clone()]).await?;
        Ok(())
    }

    /// Forwards a member message; it is processed on the party's next tick.
    pub async fn send_message(
        &self,
        presence: &Presence,
        party_id: &PartyId,
        op_code: i64,
        data: impl Into<Vec<u8>>,
    ) -> Result<(), ServerError> {
        let handle = self
            .parties
            .handle(party_id)
            .ok_or_else(|| ServerError::UnknownParty(party_id.clone()))?;
        if !self.sessions.is_tracked(party_id, presence) {
            return Err(ServerError::NotMember(party_id.clone()));
        }
        handle
            .send_message(MemberMessage::new(presence.clone(), op_code, data))
            .await?;
        Ok(())
    }

    pub fn find_advertised(&self, type_id: i64, user_id: &UserId) -> Option<PartyId> {
        self.parties.find_advertised(type_id, user_id)
    }

    /// Terminates every running party.
    pub async fn shutdown(&self) {
        let handles = self.parties.handles();
        info!(parties = handles.len(), "Shutting down parties");
        for handle in handles {
            if let Err(e) = handle.terminate().await {
                debug!(party_id = %handle.party_id(), error = %e, "Party already gone");
            }
        }
    }
}

/// Unregisters parties as they stop and announces the closure on the bus.
async fn reap_exits(
    mut exits: mpsc::UnboundedReceiver<PartyExit>,
    parties: Arc<PartyRegistry>,
    bus: Arc<InMemoryEventBus>,
) {
    while let Some(exit) = exits.recv().await {
        if parties.remove(&exit.party_id).is_none() {
            warn!(party_id = %exit.party_id, "Exit of an unregistered party");
        }
        info!(party_id = %exit.party_id, reason = exit.reason.as_str(), "Party exited");
        bus.publish(PartyEvent::PartyClosed {
            party_id: exit.party_id,
            reason: exit.reason.as_str().to_string(),
        })
        .await;
    }
}
