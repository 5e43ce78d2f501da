//! Event bus dispatcher
//!
//! Implements `MatchDispatcher` for one party by publishing `PartyEvent`s
//! on the in-process bus. The presence layer subscribes and delivers.

use async_trait::async_trait;
use party_bus::{EventPublisher, PartyEvent};
use party_types::{PartyId, Presence};
use std::sync::Arc;
use tracing::trace;

use crate::error::DependencyError;
use crate::ports::{Broadcast, MatchDispatcher};

pub struct BusDispatcher {
    party_id: PartyId,
    bus: Arc<dyn EventPublisher>,
}

impl BusDispatcher {
    pub fn new(party_id: PartyId, bus: Arc<dyn EventPublisher>) -> Self {
        Self { party_id, bus }
    }

    /// Publishes an event. Nobody listening means nothing gets delivered,
    /// which is reported as an unavailable presence layer.
    async fn publish(&self, event: PartyEvent) -> Result<(), DependencyError> {
        let topic = event.topic();
        match self.bus.publish(event).await {
            0 => Err(DependencyError::Unavailable(
                "no presence layer subscribed".to_string(),
            )),
            receivers => {
                trace!(party_id = %self.party_id, ?topic, receivers, "Party event published");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl MatchDispatcher for BusDispatcher {
    async fn broadcast(&self, message: Broadcast) -> Result<(), DependencyError> {
        self.publish(PartyEvent::Broadcast {
            party_id: self.party_id.clone(),
            op_code: message.op_code.code(),
            data: message.data,
            recipients: message.recipients,
            sender: message.sender,
            reliable: message.reliable,
        })
        .await
    }

    async fn kick(&self, presences: Vec<Presence>) -> Result<(), DependencyError> {
        self.publish(PartyEvent::Kicked {
            party_id: self.party_id.clone(),
            presences,
        })
        .await
    }

    async fn update_label(&self, label: String) -> Result<(), DependencyError> {
        self.publish(PartyEvent::LabelUpdated {
            party_id: self.party_id.clone(),
            label,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use party_bus::{EventFilter, EventTopic, InMemoryEventBus};
    use party_types::{OpCode, Recipients, SessionId, UserId};

    #[tokio::test]
    async fn test_broadcast_becomes_party_event() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::Messages]));
        let party_id = PartyId::generate("n1");
        let dispatcher = BusDispatcher::new(party_id.clone(), bus.clone());

        let leader = Presence::new(UserId::from("u1"), SessionId::new("s1"), "u1");
        dispatcher
            .broadcast(Broadcast::to(leader.clone(), OpCode::JoinRequest, None))
            .await
            .unwrap();

        match sub.try_recv().unwrap() {
            Some(PartyEvent::Broadcast {
                party_id: id,
                op_code,
                recipients,
                ..
            }) => {
                assert_eq!(id, party_id);
                assert_eq!(op_code, OpCode::JoinRequest.code());
                assert_eq!(recipients, Recipients::one(leader));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_subscriber_is_unavailable() {
        let bus = Arc::new(InMemoryEventBus::new());
        let dispatcher = BusDispatcher::new(PartyId::generate("n1"), bus);

        let result = dispatcher.update_label("{}".into()).await;
        assert!(matches!(result, Err(DependencyError::Unavailable(_))));
    }
}
