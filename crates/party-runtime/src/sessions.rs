//! # Session Directory
//!
//! Live client sessions, their outboxes, and which parties each session is
//! streaming from. This is the presence layer parties talk to through
//! [`PresenceDirectory`].

use async_trait::async_trait;
use parking_lot::RwLock;
use party_match::{DependencyError, PartyError, PresenceDirectory};
use party_types::{PartyId, Presence, SessionId, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::registry::PartyRegistry;

/// Something delivered to a connected client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Message {
        party_id: PartyId,
        op_code: i64,
        data: Option<Vec<u8>>,
        /// `None` when the party itself is the sender.
        sender: Option<Presence>,
        reliable: bool,
    },
    Kicked {
        party_id: PartyId,
    },
    PartyClosed {
        party_id: PartyId,
        reason: String,
    },
}

/// The client end of a session.
#[derive(Debug)]
pub struct ClientConnection {
    pub presence: Presence,
    events: mpsc::UnboundedReceiver<ClientEvent>,
}

impl ClientConnection {
    /// Waits for the next event. `None` once the session is disconnected.
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ClientEvent> {
        self.events.try_recv().ok()
    }

    /// Everything received so far.
    pub fn drain(&mut self) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

struct Session {
    presence: Presence,
    outbox: mpsc::UnboundedSender<ClientEvent>,
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Session>>,
    /// Connections streaming from each party, in join order.
    streams: RwLock<HashMap<PartyId, Vec<Presence>>>,
    parties: Arc<PartyRegistry>,
}

impl SessionRegistry {
    pub fn new(parties: Arc<PartyRegistry>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            streams: RwLock::new(HashMap::new()),
            parties,
        }
    }

    /// Opens a new session for `user_id`.
    pub fn connect(&self, user_id: UserId, username: impl Into<String>) -> ClientConnection {
        let presence = Presence::new(user_id, SessionId::random(), username);
        let (outbox, events) = mpsc::unbounded_channel();

        info!(user_id = %presence.user_id, session_id = %presence.session_id, "Session connected");
        self.sessions.write().insert(
            presence.session_id.clone(),
            Session {
                presence: presence.clone(),
                outbox,
            },
        );

        ClientConnection { presence, events }
    }

    /// Closes a session. Returns the parties it was streaming from; the
    /// caller is expected to tell those parties the connection left.
    pub fn disconnect(&self, session_id: &SessionId) -> Vec<PartyId> {
        let Some(session) = self.sessions.write().remove(session_id) else {
            return Vec::new();
        };

        let mut left = Vec::new();
        for (party_id, members) in self.streams.write().iter_mut() {
            let before = members.len();
            members.retain(|p| !p.same_connection(&session.presence));
            if members.len() != before {
                left.push(party_id.clone());
            }
        }

        info!(
            user_id = %session.presence.user_id,
            session_id = %session_id,
            parties = left.len(),
            "Session disconnected"
        );
        left
    }

    pub fn presence(&self, session_id: &SessionId) -> Option<Presence> {
        self.sessions
            .read()
            .get(session_id)
            .map(|session| session.presence.clone())
    }

    pub fn is_connected(&self, presence: &Presence) -> bool {
        self.sessions
            .read()
            .get(&presence.session_id)
            .map_or(false, |session| session.presence.user_id == presence.user_id)
    }

    /// Starts streaming `party_id` to `presence`. False if it already was.
    pub fn track(&self, party_id: &PartyId, presence: Presence) -> bool {
        let mut streams = self.streams.write();
        let members = streams.entry(party_id.clone()).or_default();
        if members.iter().any(|p| p.same_connection(&presence)) {
            return false;
        }
        members.push(presence);
        true
    }

    /// Stops streaming `party_id` to `presence`. False if it was not.
    pub fn untrack(&self, party_id: &PartyId, presence: &Presence) -> bool {
        let mut streams = self.streams.write();
        let Some(members) = streams.get_mut(party_id) else {
            return false;
        };
        let before = members.len();
        members.retain(|p| !p.same_connection(presence));
        let removed = members.len() != before;
        if members.is_empty() {
            streams.remove(party_id);
        }
        removed
    }

    pub fn is_tracked(&self, party_id: &PartyId, presence: &Presence) -> bool {
        self.streams
            .read()
            .get(party_id)
            .map_or(false, |members| members.iter().any(|p| p.same_connection(presence)))
    }

    pub fn members(&self, party_id: &PartyId) -> Vec<Presence> {
        self.streams
            .read()
            .get(party_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Drops every stream of a closed party, returning who was streaming.
    pub fn forget_party(&self, party_id: &PartyId) -> Vec<Presence> {
        self.streams.write().remove(party_id).unwrap_or_default()
    }

    /// Live sessions of `user_id`.
    pub fn sessions_of(&self, user_id: &UserId) -> Vec<Presence> {
        self.sessions
            .read()
            .values()
            .filter(|session| &session.presence.user_id == user_id)
            .map(|session| session.presence.clone())
            .collect()
    }

    /// Pushes `event` to the session of `presence`. False if it is gone.
    pub fn deliver(&self, presence: &Presence, event: ClientEvent) -> bool {
        let sessions = self.sessions.read();
        match sessions.get(&presence.session_id) {
            Some(session) if session.presence.user_id == presence.user_id => {
                session.outbox.send(event).is_ok()
            }
            _ => false,
        }
    }
}

#[async_trait]
impl PresenceDirectory for SessionRegistry {
    async fn count_online(&self, user_id: &UserId) -> Result<usize, DependencyError> {
        Ok(self
            .sessions
            .read()
            .values()
            .filter(|session| &session.presence.user_id == user_id)
            .count())
    }

    async fn admit(&self, party_id: &PartyId, presence: Presence) -> Result<(), DependencyError> {
        if !self.is_connected(&presence) {
            return Err(DependencyError::NotFound(format!(
                "session {} of {}",
                presence.session_id, presence.user_id
            )));
        }
        let handle = self
            .parties
            .handle(party_id)
            .ok_or_else(|| DependencyError::NotFound(format!("party {party_id}")))?;

        let tracked = self.track(party_id, presence.clone());
        // Runs inside the party task: queue the join, never wait on it.
        if let Err(e) = handle.try_join(vec![presence.clone()]) {
            if tracked {
                self.untrack(party_id, &presence);
            }
            warn!(party_id = %party_id, user_id = %presence.user_id, error = %e, "Approved join not queued");
            return Err(match e {
                PartyError::MailboxFull(_) => DependencyError::Backpressure,
                other => DependencyError::Unavailable(other.to_string()),
            });
        }

        debug!(party_id = %party_id, user_id = %presence.user_id, "Approved join queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use party_match::test_utils::TestDeps;
    use party_match::{spawn_party, PartyApi, PartyMatch};

    fn directory() -> (Arc<PartyRegistry>, SessionRegistry) {
        let parties = Arc::new(PartyRegistry::new());
        let sessions = SessionRegistry::new(parties.clone());
        (parties, sessions)
    }

    #[tokio::test]
    async fn test_count_online_counts_sessions() {
        let (_, sessions) = directory();
        let u1 = UserId::from("u1");
        assert_eq!(sessions.count_online(&u1).await.unwrap(), 0);

        let a = sessions.connect(u1.clone(), "alice");
        let _b = sessions.connect(u1.clone(), "alice");
        assert_eq!(sessions.count_online(&u1).await.unwrap(), 2);

        sessions.disconnect(&a.presence.session_id);
        assert_eq!(sessions.count_online(&u1).await.unwrap(), 1);
    }

    #[test]
    fn test_track_is_per_connection() {
        let (_, sessions) = directory();
        let party_id = PartyId::generate("n1");
        let a = sessions.connect(UserId::from("u1"), "alice");

        assert!(sessions.track(&party_id, a.presence.clone()));
        assert!(!sessions.track(&party_id, a.presence.clone()));
        assert!(sessions.is_tracked(&party_id, &a.presence));

        assert!(sessions.untrack(&party_id, &a.presence));
        assert!(!sessions.untrack(&party_id, &a.presence));
        assert!(sessions.members(&party_id).is_empty());
    }

    #[test]
    fn test_disconnect_reports_streamed_parties() {
        let (_, sessions) = directory();
        let p1 = PartyId::generate("n1");
        let p2 = PartyId::generate("n1");
        let a = sessions.connect(UserId::from("u1"), "alice");
        let b = sessions.connect(UserId::from("u2"), "bob");
        sessions.track(&p1, a.presence.clone());
        sessions.track(&p2, b.presence.clone());

        assert_eq!(sessions.disconnect(&a.presence.session_id), vec![p1.clone()]);
        assert!(sessions.members(&p1).is_empty());
        assert_eq!(sessions.members(&p2), vec![b.presence.clone()]);
        assert!(sessions.disconnect(&a.presence.session_id).is_empty());
    }

    #[test]
    fn test_deliver_reaches_only_live_sessions() {
        let (_, sessions) = directory();
        let party_id = PartyId::generate("n1");
        let mut a = sessions.connect(UserId::from("u1"), "alice");
        let event = ClientEvent::Kicked {
            party_id: party_id.clone(),
        };

        assert!(sessions.deliver(&a.presence, event.clone()));
        assert_eq!(a.drain(), vec![event.clone()]);

        sessions.disconnect(&a.presence.session_id);
        assert!(!sessions.deliver(&a.presence, event));
    }

    #[tokio::test]
    async fn test_admit_requires_live_session_and_party() {
        let (parties, sessions) = directory();
        let party_id = PartyId::generate("n1");
        let a = sessions.connect(UserId::from("u1"), "alice");

        let err = sessions.admit(&party_id, a.presence.clone()).await.unwrap_err();
        assert!(matches!(err, DependencyError::NotFound(_)));

        let deps = TestDeps::default();
        let party = PartyMatch::new(
            party_id.clone(),
            UserId::from("u9"),
            1,
            String::new(),
            Default::default(),
            deps.party_deps(),
        )
        .unwrap();
        let label = party.label().clone();
        let (handle, _task) = spawn_party(party, 8, None);
        parties.insert(handle, label);

        sessions.admit(&party_id, a.presence.clone()).await.unwrap();
        assert!(sessions.is_tracked(&party_id, &a.presence));

        let gone = Presence::new(UserId::from("u2"), SessionId::new("gone"), "bob");
        let err = sessions.admit(&party_id, gone).await.unwrap_err();
        assert!(matches!(err, DependencyError::NotFound(_)));
    }
}
