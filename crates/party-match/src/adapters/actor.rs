//! Party actor
//!
//! Runs one [`PartyMatch`] on its own tokio task. Lifecycle calls are
//! handled as they arrive; member messages are buffered and handed to the
//! party as one batch per tick.
//!
//! ```text
//! PartyHandle ──mpsc──→ [ inbox ] ──→ join_attempt / join / leave / snapshot
//!                                 └─→ buffer ──(interval tick)──→ tick(batch)
//! ```

use party_types::{JoinMetadata, PartyId, Presence, UserId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::domain::{AdmissionVerdict, PartyLabel};
use crate::error::PartyError;
use crate::ports::{ExitReason, MemberMessage, PartyApi, PartyStatus};
use crate::service::PartyMatch;

/// Default number of queued requests per party.
pub const DEFAULT_INBOX_CAPACITY: usize = 256;

/// Requests accepted by a party actor.
#[derive(Debug)]
pub enum PartyRequest {
    JoinAttempt {
        presence: Presence,
        metadata: JoinMetadata,
        reply: oneshot::Sender<AdmissionVerdict>,
    },
    Join(Vec<Presence>),
    Leave(Vec<Presence>),
    /// Buffered until the next tick.
    Message(MemberMessage),
    Terminate,
    Snapshot {
        reply: oneshot::Sender<PartySnapshot>,
    },
}

/// Point-in-time copy of a party's observable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartySnapshot {
    pub party_id: PartyId,
    pub label: PartyLabel,
    pub leader: Option<Presence>,
    pub members: Vec<Presence>,
    pub invited: Vec<UserId>,
    pub join_requests: Vec<UserId>,
    pub rejoin_approved: Vec<UserId>,
    pub party_data: Option<Vec<u8>>,
    pub version: Option<String>,
}

impl PartySnapshot {
    fn of(party: &PartyMatch) -> Self {
        Self {
            party_id: party.party_id().clone(),
            label: party.label().clone(),
            leader: party.leader().cloned(),
            members: party.members(),
            invited: party.invited_users(),
            join_requests: party.pending_join_requests(),
            rejoin_approved: party.rejoin_users(),
            party_data: party.party_data().map(<[u8]>::to_vec),
            version: party.version().map(str::to_string),
        }
    }

    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.members.iter().any(|p| &p.user_id == user_id)
    }
}

/// Sent once when a party actor stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyExit {
    pub party_id: PartyId,
    pub reason: ExitReason,
}

/// Cloneable address of a running party.
#[derive(Debug, Clone)]
pub struct PartyHandle {
    party_id: PartyId,
    sender: mpsc::Sender<PartyRequest>,
}

impl PartyHandle {
    pub fn party_id(&self) -> &PartyId {
        &self.party_id
    }

    /// True once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn terminated(&self) -> PartyError {
        PartyError::Terminated(self.party_id.to_string())
    }

    async fn send(&self, request: PartyRequest) -> Result<(), PartyError> {
        self.sender
            .send(request)
            .await
            .map_err(|_| self.terminated())
    }

    /// Queues without waiting. Safe to call from inside a party task.
    fn try_send(&self, request: PartyRequest) -> Result<(), PartyError> {
        self.sender.try_send(request).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PartyError::MailboxFull(self.party_id.to_string()),
            mpsc::error::TrySendError::Closed(_) => self.terminated(),
        })
    }

    pub async fn join_attempt(
        &self,
        presence: Presence,
        metadata: JoinMetadata,
    ) -> Result<AdmissionVerdict, PartyError> {
        let (reply, verdict) = oneshot::channel();
        self.send(PartyRequest::JoinAttempt {
            presence,
            metadata,
            reply,
        })
        .await?;
        verdict.await.map_err(|_| self.terminated())
    }

    pub async fn join(&self, presences: Vec<Presence>) -> Result<(), PartyError> {
        self.send(PartyRequest::Join(presences)).await
    }

    pub fn try_join(&self, presences: Vec<Presence>) -> Result<(), PartyError> {
        self.try_send(PartyRequest::Join(presences))
    }

    pub async fn leave(&self, presences: Vec<Presence>) -> Result<(), PartyError> {
        self.send(PartyRequest::Leave(presences)).await
    }

    pub fn try_leave(&self, presences: Vec<Presence>) -> Result<(), PartyError> {
        self.try_send(PartyRequest::Leave(presences))
    }

    pub async fn send_message(&self, message: MemberMessage) -> Result<(), PartyError> {
        self.send(PartyRequest::Message(message)).await
    }

    pub async fn terminate(&self) -> Result<(), PartyError> {
        self.send(PartyRequest::Terminate).await
    }

    pub async fn snapshot(&self) -> Result<PartySnapshot, PartyError> {
        let (reply, snapshot) = oneshot::channel();
        self.send(PartyRequest::Snapshot { reply }).await?;
        snapshot.await.map_err(|_| self.terminated())
    }
}

/// Spawns the actor for `party` on the current runtime.
///
/// The task ends when the party terminates or when every handle has been
/// dropped, in which case the party is terminated as on shutdown. `exits`
/// is told about the exit either way.
pub fn spawn_party(
    party: PartyMatch,
    inbox_capacity: usize,
    exits: Option<mpsc::UnboundedSender<PartyExit>>,
) -> (PartyHandle, JoinHandle<ExitReason>) {
    let party_id = party.party_id().clone();
    let (sender, inbox) = mpsc::channel(inbox_capacity.max(1));
    let span = info_span!("party", party_id = %party_id);

    let exit_party_id = party_id.clone();
    let task = tokio::spawn(
        async move {
            let reason = run(party, inbox).await;
            if let Some(exits) = exits {
                let exit = PartyExit {
                    party_id: exit_party_id,
                    reason,
                };
                if exits.send(exit).is_err() {
                    debug!("Party exit not observed");
                }
            }
            reason
        }
        .instrument(span),
    );

    (PartyHandle { party_id, sender }, task)
}

async fn run(mut party: PartyMatch, mut inbox: mpsc::Receiver<PartyRequest>) -> ExitReason {
    party.start().await;

    let mut ticker = interval(party.config().tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    let mut buffered: Vec<MemberMessage> = Vec::new();
    loop {
        let status = tokio::select! {
            request = inbox.recv() => match request {
                Some(request) => handle_request(&mut party, request, &mut buffered).await,
                None => {
                    info!("All party handles dropped, terminating");
                    party.terminate().await
                }
            },
            _ = ticker.tick() => {
                let batch = std::mem::take(&mut buffered);
                party.tick(batch).await
            }
        };

        if let PartyStatus::Terminated(reason) = status {
            if !buffered.is_empty() {
                debug!(dropped = buffered.len(), "Discarding messages of an ended party");
            }
            return reason;
        }
    }
}

async fn handle_request(
    party: &mut PartyMatch,
    request: PartyRequest,
    buffered: &mut Vec<MemberMessage>,
) -> PartyStatus {
    match request {
        PartyRequest::JoinAttempt {
            presence,
            metadata,
            reply,
        } => {
            let verdict = party.join_attempt(presence, metadata).await;
            if reply.send(verdict).is_err() {
                warn!("Join attempt caller went away before the verdict");
            }
            party.status()
        }
        PartyRequest::Join(presences) => {
            party.join(presences).await;
            party.status()
        }
        PartyRequest::Leave(presences) => party.leave(presences).await,
        PartyRequest::Message(message) => {
            buffered.push(message);
            party.status()
        }
        PartyRequest::Terminate => party.terminate().await,
        PartyRequest::Snapshot { reply } => {
            let _ = reply.send(PartySnapshot::of(party));
            party.status()
        }
    }
}
