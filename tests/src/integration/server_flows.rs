//! # Server Flows
//!
//! Clients connected to a running `PartyServer`, talking to parties through
//! the RPCs and member messages, observing only what their sessions
//! receive.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use party_match::ports::SUBJECT_INVITATION;
    use party_runtime::rpc::{CreatePartyRequest, JoinPartyCompletion, JoinPartyRequest};
    use party_runtime::{ClientConnection, ClientEvent, PartyRpc, PartyServer, RpcContext, RuntimeConfig};
    use party_types::{
        JoinMetadata, OpCode, PartyId, PartyMessage, PartyMessageResponse, ResponseCode, UserId,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct World {
        server: Arc<PartyServer>,
        rpc: PartyRpc,
    }

    impl World {
        fn start() -> Self {
            let server = PartyServer::start(RuntimeConfig::default());
            let rpc = PartyRpc::new(server.clone());
            Self { server, rpc }
        }

        fn connect(&self, user: &str) -> ClientConnection {
            self.server.connect(UserId::from(user), user)
        }

        async fn create(&self, owner: &ClientConnection) -> PartyId {
            let response = self
                .rpc
                .create_party(
                    &RpcContext::from(&owner.presence),
                    CreatePartyRequest {
                        party_type_id: 5,
                        party_configuration: "std".into(),
                    },
                )
                .await
                .unwrap();
            response.party_id.parse().unwrap()
        }

        async fn join(&self, who: &ClientConnection, party_id: &PartyId) -> JoinPartyCompletion {
            self.rpc
                .join_party(
                    &RpcContext::from(&who.presence),
                    JoinPartyRequest {
                        party_id: party_id.to_string(),
                        metadata: JoinMetadata::new(),
                    },
                )
                .await
                .unwrap()
                .join_party_completion_result
        }

        async fn command(&self, from: &ClientConnection, party_id: &PartyId, op: OpCode, data: &str) {
            let envelope = PartyMessage::new(Some(42), data.as_bytes().to_vec());
            self.server
                .send_message(&from.presence, party_id, op.code(), envelope.to_bytes())
                .await
                .unwrap();
            settle().await;
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1500)).await;
    }

    fn acks(events: &[ClientEvent]) -> Vec<PartyMessageResponse> {
        events
            .iter()
            .filter_map(|e| match e {
                ClientEvent::Message {
                    op_code,
                    data: Some(data),
                    ..
                } if *op_code == OpCode::PartyMessageResponse.code() => {
                    serde_json::from_slice(data).ok()
                }
                _ => None,
            })
            .collect()
    }

    // =============================================================================
    // SCENARIOS
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_invite_join_failover_and_end() {
        let world = World::start();
        let mut u1 = world.connect("u1");
        let mut u2 = world.connect("u2");

        let party_id = world.create(&u1).await;
        assert_eq!(world.join(&u1, &party_id).await, JoinPartyCompletion::Succeeded);

        world.command(&u1, &party_id, OpCode::SendInvitation, "u2").await;
        assert_eq!(
            acks(&u1.drain()),
            vec![PartyMessageResponse {
                id: 42,
                response_code: ResponseCode::Success
            }]
        );
        let inbox = world.server.notifier().inbox(&UserId::from("u2"));
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].subject, SUBJECT_INVITATION);

        assert_eq!(world.join(&u2, &party_id).await, JoinPartyCompletion::Succeeded);
        settle().await;
        u2.drain();

        // u1 leaves; u2 hears about its own promotion.
        world.server.leave_party(&u1.presence, &party_id).await.unwrap();
        settle().await;
        let promoted = u2.drain().into_iter().any(|e| {
            matches!(e, ClientEvent::Message { op_code, sender: Some(ref s), .. }
                if op_code == OpCode::PromoteMember.code() && s.user_id == UserId::from("u2"))
        });
        assert!(promoted);

        // Last member out ends the party.
        world.server.leave_party(&u2.presence, &party_id).await.unwrap();
        settle().await;
        assert!(world.server.parties().is_empty());
        assert!(world.server.find_advertised(5, &UserId::from("u2")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_session_cannot_join_again() {
        let world = World::start();
        let u1 = world.connect("u1");
        let u1_other = world.connect("u1");

        let party_id = world.create(&u1).await;
        world.join(&u1, &party_id).await;

        assert_eq!(
            world.join(&u1_other, &party_id).await,
            JoinPartyCompletion::AlreadyInParty
        );
        let snapshot = world
            .server
            .parties()
            .handle(&party_id)
            .unwrap()
            .snapshot()
            .await
            .unwrap();
        assert_eq!(snapshot.members, vec![u1.presence.clone()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_user_is_not_approved() {
        let world = World::start();
        let u1 = world.connect("u1");
        let u2 = world.connect("u2");
        world
            .server
            .social()
            .block(UserId::from("u1"), UserId::from("u2"));

        let party_id = world.create(&u1).await;
        world.join(&u1, &party_id).await;

        assert_eq!(world.join(&u2, &party_id).await, JoinPartyCompletion::NotApproved);
        let snapshot = world
            .server
            .parties()
            .handle(&party_id)
            .unwrap()
            .snapshot()
            .await
            .unwrap();
        assert!(snapshot.join_requests.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_member_cannot_use_leader_commands() {
        let world = World::start();
        let mut u1 = world.connect("u1");
        let mut u2 = world.connect("u2");

        let party_id = world.create(&u1).await;
        world.join(&u1, &party_id).await;
        world.command(&u1, &party_id, OpCode::SendInvitation, "u2").await;
        world.join(&u2, &party_id).await;
        settle().await;
        u1.drain();
        u2.drain();

        world.command(&u2, &party_id, OpCode::KickMember, "u1").await;

        assert_eq!(
            acks(&u2.drain()),
            vec![PartyMessageResponse {
                id: 42,
                response_code: ResponseCode::NotPartyLeader
            }]
        );
        // The ack goes to the sender only.
        assert!(acks(&u1.drain()).is_empty());

        let snapshot = world
            .server
            .parties()
            .handle(&party_id)
            .unwrap()
            .snapshot()
            .await
            .unwrap();
        assert!(snapshot.is_member(&UserId::from("u1")));
        assert_eq!(snapshot.leader.map(|p| p.user_id), Some(UserId::from("u1")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_kicked_member_stops_receiving_party_messages() {
        let world = World::start();
        let mut u1 = world.connect("u1");
        let mut u2 = world.connect("u2");

        let party_id = world.create(&u1).await;
        world.join(&u1, &party_id).await;
        world.command(&u1, &party_id, OpCode::SendInvitation, "u2").await;
        world.join(&u2, &party_id).await;
        settle().await;

        world.command(&u1, &party_id, OpCode::KickMember, "u2").await;
        assert!(u2
            .drain()
            .contains(&ClientEvent::Kicked {
                party_id: party_id.clone()
            }));
        assert!(!world.server.sessions().is_tracked(&party_id, &u2.presence));

        u1.drain();
        world
            .command(&u1, &party_id, OpCode::UpdatePartyData, "state")
            .await;
        assert!(u2.drain().is_empty());
        assert!(u1.drain().iter().any(|e| matches!(
            e,
            ClientEvent::Message { op_code, .. } if *op_code == OpCode::UpdatePartyData.code()
        )));
    }
}
