//! # Event Router
//!
//! Consumes everything parties publish on the bus and applies it to the
//! session directory and the party registry.
//!
//! ```text
//! Broadcast    → client outboxes (All = every tracked connection)
//! Kicked       → untrack + notify the kicked connections
//! LabelUpdated → registry label index
//! PartyClosed  → drop streams + notify remaining connections
//! ```

use party_bus::{PartyEvent, Recipients, Subscription};
use std::sync::Arc;
use tracing::{debug, info};

use crate::registry::PartyRegistry;
use crate::sessions::{ClientEvent, SessionRegistry};

pub struct EventRouter {
    sessions: Arc<SessionRegistry>,
    parties: Arc<PartyRegistry>,
}

impl EventRouter {
    pub fn new(sessions: Arc<SessionRegistry>, parties: Arc<PartyRegistry>) -> Self {
        Self { sessions, parties }
    }

    /// Routes events until the bus goes away.
    pub async fn run(self, mut subscription: Subscription) {
        while let Some(event) = subscription.recv().await {
            self.route(event);
        }
        info!("Event bus closed, router stopping");
    }

    pub fn route(&self, event: PartyEvent) {
        match event {
            PartyEvent::Broadcast {
                party_id,
                op_code,
                data,
                recipients,
                sender,
                reliable,
            } => {
                let targets = match recipients {
                    Recipients::All => self.sessions.members(&party_id),
                    Recipients::Only(list) => list,
                };
                let mut delivered = 0usize;
                for target in &targets {
                    let event = ClientEvent::Message {
                        party_id: party_id.clone(),
                        op_code,
                        data: data.clone(),
                        sender: sender.clone(),
                        reliable,
                    };
                    if self.sessions.deliver(target, event) {
                        delivered += 1;
                    }
                }
                debug!(party_id = %party_id, op_code, targets = targets.len(), delivered, "Broadcast routed");
            }
            PartyEvent::Kicked {
                party_id,
                presences,
            } => {
                for presence in presences {
                    self.sessions.untrack(&party_id, &presence);
                    self.sessions.deliver(
                        &presence,
                        ClientEvent::Kicked {
                            party_id: party_id.clone(),
                        },
                    );
                    info!(party_id = %party_id, user_id = %presence.user_id, "Connection kicked from party");
                }
            }
            PartyEvent::LabelUpdated { party_id, label } => {
                if !self.parties.update_label(&party_id, &label) {
                    debug!(party_id = %party_id, "Label of unregistered party dropped");
                }
            }
            PartyEvent::PartyClosed { party_id, reason } => {
                for presence in self.sessions.forget_party(&party_id) {
                    self.sessions.deliver(
                        &presence,
                        ClientEvent::PartyClosed {
                            party_id: party_id.clone(),
                            reason: reason.clone(),
                        },
                    );
                }
                info!(party_id = %party_id, reason = %reason, "Party streams closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use party_types::{PartyId, UserId};

    fn router() -> (Arc<SessionRegistry>, EventRouter) {
        let parties = Arc::new(PartyRegistry::new());
        let sessions = Arc::new(SessionRegistry::new(parties.clone()));
        (sessions.clone(), EventRouter::new(sessions, parties))
    }

    #[test]
    fn test_broadcast_to_all_reaches_tracked_connections_only() {
        let (sessions, router) = router();
        let party_id = PartyId::generate("n1");
        let mut a = sessions.connect(UserId::from("u1"), "alice");
        let mut b = sessions.connect(UserId::from("u2"), "bob");
        sessions.track(&party_id, a.presence.clone());

        router.route(PartyEvent::Broadcast {
            party_id: party_id.clone(),
            op_code: 8,
            data: Some(b"hi".to_vec()),
            recipients: Recipients::All,
            sender: None,
            reliable: true,
        });

        assert_eq!(
            a.drain(),
            vec![ClientEvent::Message {
                party_id,
                op_code: 8,
                data: Some(b"hi".to_vec()),
                sender: None,
                reliable: true,
            }]
        );
        assert!(b.drain().is_empty());
    }

    #[test]
    fn test_targeted_broadcast_reaches_untracked_connection() {
        let (sessions, router) = router();
        let party_id = PartyId::generate("n1");
        let mut a = sessions.connect(UserId::from("u1"), "alice");

        router.route(PartyEvent::Broadcast {
            party_id,
            op_code: 1,
            data: None,
            recipients: Recipients::one(a.presence.clone()),
            sender: None,
            reliable: true,
        });

        assert_eq!(a.drain().len(), 1);
    }

    #[test]
    fn test_kick_untracks_and_notifies() {
        let (sessions, router) = router();
        let party_id = PartyId::generate("n1");
        let mut a = sessions.connect(UserId::from("u1"), "alice");
        sessions.track(&party_id, a.presence.clone());

        router.route(PartyEvent::Kicked {
            party_id: party_id.clone(),
            presences: vec![a.presence.clone()],
        });

        assert!(!sessions.is_tracked(&party_id, &a.presence));
        assert_eq!(a.drain(), vec![ClientEvent::Kicked { party_id }]);
    }

    #[test]
    fn test_close_notifies_and_forgets_streams() {
        let (sessions, router) = router();
        let party_id = PartyId::generate("n1");
        let mut a = sessions.connect(UserId::from("u1"), "alice");
        sessions.track(&party_id, a.presence.clone());

        router.route(PartyEvent::PartyClosed {
            party_id: party_id.clone(),
            reason: "shutdown".into(),
        });

        assert!(sessions.members(&party_id).is_empty());
        assert_eq!(
            a.drain(),
            vec![ClientEvent::PartyClosed {
                party_id,
                reason: "shutdown".into()
            }]
        );
    }
}
