//! # Party Core over the Event Bus
//!
//! Runs party actors against the real bus through `BusDispatcher`, with
//! mock presence/social/clock collaborators, and checks what a presence
//! layer subscribed to the bus would observe.
//!
//! ## Flows Tested:
//!
//! 1. **Lifecycle scenario**: create → lead → invite → join → failover → end
//! 2. **Capacity**: a full party denies and records no join request
//! 3. **Kick**: kick notice broadcast, then a forced disconnect event
//! 4. **Discovery**: label updates carry type and members
//! 5. **Single connection**: random admission sequences never double-join

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use party_bus::{
        EventFilter, EventPublisher, EventTopic, InMemoryEventBus, PartyEvent, Subscription,
    };
    use party_match::test_utils::{presence, TestDeps};
    use party_match::{
        spawn_party, AdmissionVerdict, BusDispatcher, DenyReason, ExitReason, MemberMessage,
        PartyConfig, PartyDeps, PartyHandle, PartyLabel, PartyMatch,
    };
    use party_types::{
        JoinMetadata, OpCode, PartyId, PartyMessage, Presence, Recipients, SessionId, UserId,
    };
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tokio::task::JoinHandle;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Fixture {
        bus: Arc<InMemoryEventBus>,
        /// Stands in for the presence layer so publishes have a receiver.
        _sink: Subscription,
        deps: TestDeps,
        handle: PartyHandle,
        task: JoinHandle<ExitReason>,
    }

    fn spawn_on_bus(config: PartyConfig) -> Fixture {
        let bus = Arc::new(InMemoryEventBus::new());
        let deps = TestDeps::new();
        let party_id = PartyId::generate("n1");
        let party_deps = PartyDeps {
            dispatcher: Arc::new(BusDispatcher::new(
                party_id.clone(),
                bus.clone() as Arc<dyn EventPublisher>,
            )),
            ..deps.party_deps()
        };
        let party = PartyMatch::new(
            party_id,
            UserId::from("u1"),
            5,
            "std".into(),
            config,
            party_deps,
        )
        .unwrap();
        let (handle, task) = spawn_party(party, 64, None);
        Fixture {
            _sink: bus.subscribe(EventFilter::all()),
            bus,
            deps,
            handle,
            task,
        }
    }

    async fn admit(handle: &PartyHandle, who: &Presence) -> AdmissionVerdict {
        let verdict = handle
            .join_attempt(who.clone(), JoinMetadata::new())
            .await
            .unwrap();
        if verdict.is_admitted() {
            handle.join(vec![who.clone()]).await.unwrap();
        }
        verdict
    }

    async fn command(handle: &PartyHandle, from: &Presence, op: OpCode, data: &str) {
        let envelope = PartyMessage::new(Some(1), data.as_bytes().to_vec());
        handle
            .send_message(MemberMessage::new(from.clone(), op.code(), envelope.to_bytes()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
    }

    fn drain(sub: &mut Subscription) -> Vec<PartyEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = sub.try_recv() {
            events.push(event);
        }
        events
    }

    // =============================================================================
    // INTEGRATION TESTS
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_party_lifecycle_scenario() {
        let fx = spawn_on_bus(PartyConfig::default());
        let mut messages = fx.bus.subscribe(EventFilter::topics(vec![EventTopic::Messages]));
        let (u1, u2) = (presence("u1"), presence("u2"));

        // Creator joins and leads.
        assert_eq!(admit(&fx.handle, &u1).await, AdmissionVerdict::Admit);
        let snapshot = fx.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.leader.as_ref(), Some(&u1));

        // Leader invites u2, who joins through the invitation.
        fx.deps.presence.set_online("u2", 1);
        command(&fx.handle, &u1, OpCode::SendInvitation, "u2").await;
        assert_eq!(fx.deps.notifier.inbox(&UserId::from("u2")).len(), 1);
        assert_eq!(admit(&fx.handle, &u2).await, AdmissionVerdict::Admit);

        let snapshot = fx.handle.snapshot().await.unwrap();
        assert!(snapshot.invited.is_empty());
        assert_eq!(snapshot.members.len(), 2);

        // Leader leaves: u2 is promoted with one broadcast to everyone left.
        drain(&mut messages);
        fx.handle.leave(vec![u1.clone()]).await.unwrap();
        let snapshot = fx.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.leader.as_ref(), Some(&u2));

        let promotions: Vec<_> = drain(&mut messages)
            .into_iter()
            .filter(|e| {
                matches!(e, PartyEvent::Broadcast { op_code, recipients: Recipients::All, sender: Some(s), .. }
                    if *op_code == OpCode::PromoteMember.code() && s == &u2)
            })
            .collect();
        assert_eq!(promotions.len(), 1);

        // Last member leaves: the party ends.
        fx.handle.leave(vec![u2]).await.unwrap();
        assert_eq!(fx.task.await.unwrap(), ExitReason::Empty);
        assert!(fx.handle.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_party_denies_without_join_request() {
        let fx = spawn_on_bus(PartyConfig::default().with_max_size(2));
        let (u1, u2, u3) = (presence("u1"), presence("u2"), presence("u3"));

        admit(&fx.handle, &u1).await;
        fx.deps.presence.set_online("u2", 1);
        command(&fx.handle, &u1, OpCode::SendInvitation, "u2").await;
        admit(&fx.handle, &u2).await;

        let verdict = admit(&fx.handle, &u3).await;
        assert_eq!(verdict, AdmissionVerdict::Deny(DenyReason::PartyFull));
        assert_eq!(verdict.reason(), "Party is full");

        let snapshot = fx.handle.snapshot().await.unwrap();
        assert!(snapshot.join_requests.is_empty());
        assert!(!snapshot.is_member(&u3.user_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_kick_reaches_bus_as_notice_then_disconnect() {
        let fx = spawn_on_bus(PartyConfig::default());
        let mut events = fx.bus.subscribe(EventFilter::for_party(fx.handle.party_id().clone()));
        let (u1, u2) = (presence("u1"), presence("u2"));

        admit(&fx.handle, &u1).await;
        fx.deps.presence.set_online("u2", 1);
        command(&fx.handle, &u1, OpCode::SendInvitation, "u2").await;
        admit(&fx.handle, &u2).await;
        drain(&mut events);

        command(&fx.handle, &u1, OpCode::KickMember, "u2").await;

        let events = drain(&mut events);
        let notice = events.iter().position(|e| {
            matches!(e, PartyEvent::Broadcast { op_code, .. } if *op_code == OpCode::KickMember.code())
        });
        let kicked = events.iter().position(
            |e| matches!(e, PartyEvent::Kicked { presences, .. } if presences == &vec![u2.clone()]),
        );
        assert!(notice.unwrap() < kicked.unwrap());

        let snapshot = fx.handle.snapshot().await.unwrap();
        assert!(!snapshot.is_member(&u2.user_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_label_updates_track_membership() {
        let fx = spawn_on_bus(PartyConfig::default());
        let mut discovery = fx.bus.subscribe(EventFilter::topics(vec![EventTopic::Discovery]));

        admit(&fx.handle, &presence("u1")).await;
        fx.handle.snapshot().await.unwrap();

        let labels: Vec<PartyLabel> = drain(&mut discovery)
            .into_iter()
            .filter_map(|e| match e {
                PartyEvent::LabelUpdated { label, .. } => PartyLabel::from_json(&label).ok(),
                _ => None,
            })
            .collect();

        let last = labels.last().unwrap();
        assert_eq!(last.type_id, 5);
        assert_eq!(last.config, "std");
        assert_eq!(last.members, vec![UserId::from("u1")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_random_admissions_keep_one_connection_per_user() {
        let fx = spawn_on_bus(PartyConfig::default());
        let mut rng = StdRng::seed_from_u64(7);

        admit(&fx.handle, &presence("u1")).await;
        for user in ["u2", "u3", "u4"] {
            fx.deps.presence.set_online(user, 2);
        }

        for step in 0..60 {
            let user = ["u2", "u3", "u4"][rng.gen_range(0..3)];
            let session = SessionId::new(format!("{user}-s{}", rng.gen_range(0..2)));
            let who = Presence::new(UserId::from(user), session, user);

            match rng.gen_range(0..3) {
                0 => command(&fx.handle, &presence("u1"), OpCode::SendInvitation, user).await,
                1 => {
                    admit(&fx.handle, &who).await;
                }
                _ => fx.handle.leave(vec![who]).await.unwrap(),
            }

            let snapshot = fx.handle.snapshot().await.unwrap();
            let mut users: Vec<_> = snapshot.members.iter().map(|p| p.user_id.clone()).collect();
            let total = users.len();
            users.sort();
            users.dedup();
            assert_eq!(users.len(), total, "duplicate member at step {step}");
            assert_eq!(snapshot.label.members.len(), total);
        }
    }
}
