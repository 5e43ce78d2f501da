//! Test utilities for party processes.
//!
//! Recording and controllable implementations of every outbound port.
//! Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust
//! use party_match::test_utils::MockTimeSource;
//! use party_match::TimeSource;
//!
//! let clock = MockTimeSource::new(1_000);
//! clock.advance(500);
//! assert_eq!(clock.now(), 1_500);
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use party_types::{
    JoinMetadata, OpCode, PartyId, PartyMessageResponse, Presence, SessionId, UserId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::adapters::{InMemoryNotificationService, InMemorySocialGraph};
use crate::domain::{PartyConfig, PartyLabel};
use crate::error::DependencyError;
use crate::ports::{
    BlockedPage, Broadcast, JoinAttemptOverride, MatchDispatcher, Notification,
    NotificationService, PartyHooks, PresenceDirectory, SocialGraph, TimeSource, Timestamp,
};
use crate::service::PartyDeps;

/// Builds a presence whose session id is derived from the user id.
pub fn presence(user: &str) -> Presence {
    Presence::new(UserId::from(user), SessionId::new(format!("{user}-s1")), user)
}

/// Time source whose clock only moves when told to.
#[derive(Debug, Default)]
pub struct MockTimeSource {
    now: AtomicU64,
}

impl MockTimeSource {
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// Dispatcher that records everything and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    broadcasts: Mutex<Vec<Broadcast>>,
    kicks: Mutex<Vec<Vec<Presence>>>,
    labels: Mutex<Vec<String>>,
    fail_broadcasts: AtomicBool,
    fail_kicks: AtomicBool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_broadcasts(&self, fail: bool) {
        self.fail_broadcasts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_kicks(&self, fail: bool) {
        self.fail_kicks.store(fail, Ordering::SeqCst);
    }

    pub fn broadcasts(&self) -> Vec<Broadcast> {
        self.broadcasts.lock().clone()
    }

    /// Recorded broadcasts carrying `op_code`.
    pub fn sent(&self, op_code: OpCode) -> Vec<Broadcast> {
        self.broadcasts
            .lock()
            .iter()
            .filter(|b| b.op_code == op_code)
            .cloned()
            .collect()
    }

    /// Decoded acknowledgements, with the connection each went to.
    pub fn responses(&self) -> Vec<(Presence, PartyMessageResponse)> {
        self.sent(OpCode::PartyMessageResponse)
            .into_iter()
            .filter_map(|b| {
                let recipient = match b.recipients {
                    party_types::Recipients::Only(mut list) if list.len() == 1 => list.pop()?,
                    _ => return None,
                };
                let response = serde_json::from_slice(b.data.as_deref()?).ok()?;
                Some((recipient, response))
            })
            .collect()
    }

    /// The acknowledgement sent for correlation id `id`.
    pub fn response(&self, id: i64) -> Option<PartyMessageResponse> {
        self.responses()
            .into_iter()
            .map(|(_, r)| r)
            .rfind(|r| r.id == id)
    }

    pub fn kicks(&self) -> Vec<Vec<Presence>> {
        self.kicks.lock().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().clone()
    }

    pub fn last_label(&self) -> Option<PartyLabel> {
        self.labels
            .lock()
            .last()
            .and_then(|json| PartyLabel::from_json(json).ok())
    }

    pub fn clear(&self) {
        self.broadcasts.lock().clear();
        self.kicks.lock().clear();
        self.labels.lock().clear();
    }
}

#[async_trait]
impl MatchDispatcher for RecordingDispatcher {
    async fn broadcast(&self, message: Broadcast) -> Result<(), DependencyError> {
        if self.fail_broadcasts.load(Ordering::SeqCst) {
            return Err(DependencyError::Unavailable("broadcast".into()));
        }
        self.broadcasts.lock().push(message);
        Ok(())
    }

    async fn kick(&self, presences: Vec<Presence>) -> Result<(), DependencyError> {
        if self.fail_kicks.load(Ordering::SeqCst) {
            return Err(DependencyError::Unavailable("kick".into()));
        }
        self.kicks.lock().push(presences);
        Ok(())
    }

    async fn update_label(&self, label: String) -> Result<(), DependencyError> {
        self.labels.lock().push(label);
        Ok(())
    }
}

/// Session directory with scripted online counts.
#[derive(Debug, Default)]
pub struct MockPresenceDirectory {
    online: Mutex<HashMap<UserId, usize>>,
    admitted: Mutex<Vec<(PartyId, Presence)>>,
    fail: AtomicBool,
}

impl MockPresenceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&self, user_id: &str, sessions: usize) {
        self.online.lock().insert(UserId::from(user_id), sessions);
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn admitted(&self) -> Vec<(PartyId, Presence)> {
        self.admitted.lock().clone()
    }
}

#[async_trait]
impl PresenceDirectory for MockPresenceDirectory {
    async fn count_online(&self, user_id: &UserId) -> Result<usize, DependencyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DependencyError::Unavailable("presence".into()));
        }
        Ok(self.online.lock().get(user_id).copied().unwrap_or(0))
    }

    async fn admit(&self, party_id: &PartyId, presence: Presence) -> Result<(), DependencyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DependencyError::Unavailable("presence".into()));
        }
        self.admitted.lock().push((party_id.clone(), presence));
        Ok(())
    }
}

/// Hook calls seen by [`RecordingHooks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    Init,
    JoinAttempt(UserId),
    Leave(UserId),
    Kick(UserId),
    End,
}

/// Hooks that record every call and optionally force join outcomes.
#[derive(Debug, Default)]
pub struct RecordingHooks {
    events: Mutex<Vec<HookEvent>>,
    join_override: Mutex<Option<JoinAttemptOverride>>,
    /// Metadata keys dropped by `filter_join_metadata`.
    stripped_keys: Mutex<Vec<String>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_join_override(&self, outcome: Option<JoinAttemptOverride>) {
        *self.join_override.lock() = outcome;
    }

    pub fn strip_key(&self, key: &str) {
        self.stripped_keys.lock().push(key.to_string());
    }

    pub fn events(&self) -> Vec<HookEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &HookEvent) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }
}

impl PartyHooks for RecordingHooks {
    fn filter_join_metadata(&self, mut metadata: JoinMetadata) -> JoinMetadata {
        for key in self.stripped_keys.lock().iter() {
            metadata.remove(key);
        }
        metadata
    }

    fn on_init(&self, _party_id: &PartyId, _config: &PartyConfig, _label: &PartyLabel) {
        self.events.lock().push(HookEvent::Init);
    }

    fn on_join_attempt(
        &self,
        _party_id: &PartyId,
        presence: &Presence,
        _metadata: &JoinMetadata,
    ) -> Option<JoinAttemptOverride> {
        self.events
            .lock()
            .push(HookEvent::JoinAttempt(presence.user_id.clone()));
        self.join_override.lock().clone()
    }

    fn on_leave(&self, _party_id: &PartyId, user_id: &UserId) {
        self.events.lock().push(HookEvent::Leave(user_id.clone()));
    }

    fn on_kick(&self, _party_id: &PartyId, user_id: &UserId) {
        self.events.lock().push(HookEvent::Kick(user_id.clone()));
    }

    fn on_end(&self, _party_id: &PartyId, _config: &PartyConfig, _label: &PartyLabel) {
        self.events.lock().push(HookEvent::End);
    }
}

/// Social graph that is always down.
#[derive(Debug, Default)]
pub struct FailingSocialGraph;

#[async_trait]
impl SocialGraph for FailingSocialGraph {
    async fn list_blocked(
        &self,
        _user_id: &UserId,
        _limit: usize,
        _cursor: Option<String>,
    ) -> Result<BlockedPage, DependencyError> {
        Err(DependencyError::Unavailable("social graph".into()))
    }
}

/// Notification service that is always down.
#[derive(Debug, Default)]
pub struct FailingNotifier;

#[async_trait]
impl NotificationService for FailingNotifier {
    async fn send(&self, _notification: Notification) -> Result<(), DependencyError> {
        Err(DependencyError::Unavailable("notifications".into()))
    }

    async fn send_all(&self, _notifications: Vec<Notification>) -> Result<(), DependencyError> {
        Err(DependencyError::Unavailable("notifications".into()))
    }
}

/// Concrete handles on every collaborator of a party under test.
#[derive(Clone)]
pub struct TestDeps {
    pub dispatcher: Arc<RecordingDispatcher>,
    pub presence: Arc<MockPresenceDirectory>,
    pub notifier: Arc<InMemoryNotificationService>,
    pub social: Arc<InMemorySocialGraph>,
    pub clock: Arc<MockTimeSource>,
    pub hooks: Arc<RecordingHooks>,
}

impl TestDeps {
    pub fn new() -> Self {
        Self {
            dispatcher: Arc::new(RecordingDispatcher::new()),
            presence: Arc::new(MockPresenceDirectory::new()),
            notifier: Arc::new(InMemoryNotificationService::new()),
            social: Arc::new(InMemorySocialGraph::new()),
            clock: Arc::new(MockTimeSource::new(1_000_000)),
            hooks: Arc::new(RecordingHooks::new()),
        }
    }

    pub fn party_deps(&self) -> PartyDeps {
        PartyDeps {
            dispatcher: self.dispatcher.clone(),
            presence: self.presence.clone(),
            notifier: self.notifier.clone(),
            social: self.social.clone(),
            clock: self.clock.clone(),
            hooks: self.hooks.clone(),
        }
    }
}

impl Default for TestDeps {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_time_source_moves_on_request() {
        let clock = MockTimeSource::new(10);
        clock.advance(5);
        assert_eq!(clock.now(), 15);
        clock.set(3);
        assert_eq!(clock.now(), 3);
    }

    #[tokio::test]
    async fn test_recording_dispatcher_decodes_responses() {
        let dispatcher = RecordingDispatcher::new();
        let to = presence("u1");
        let data = serde_json::to_vec(&PartyMessageResponse {
            id: 4,
            response_code: party_types::ResponseCode::InvitePending,
        })
        .unwrap();
        dispatcher
            .broadcast(Broadcast::to(to.clone(), OpCode::PartyMessageResponse, Some(data)))
            .await
            .unwrap();

        let responses = dispatcher.responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].0, to);
        assert_eq!(
            dispatcher.response(4).map(|r| r.response_code),
            Some(party_types::ResponseCode::InvitePending)
        );
    }
}
