//! # Inbound Port - PartyApi
//!
//! The calls the presence layer makes into one party. Lifecycle calls
//! arrive one at a time; member messages are collected and handed over once
//! per tick.

use async_trait::async_trait;
use party_types::{JoinMetadata, Presence};

use crate::domain::{AdmissionVerdict, PartyLabel};

/// One raw message sent by a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberMessage {
    pub sender: Presence,
    pub op_code: i64,
    /// JSON `PartyMessage` envelope.
    pub data: Vec<u8>,
}

impl MemberMessage {
    pub fn new(sender: Presence, op_code: i64, data: impl Into<Vec<u8>>) -> Self {
        Self {
            sender,
            op_code,
            data: data.into(),
        }
    }
}

/// Why a party stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The last member left.
    Empty,
    /// Nobody joined within the initial join window.
    NeverJoined,
    /// Terminated from outside, e.g. server shutdown.
    Shutdown,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::NeverJoined => "never_joined",
            Self::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyStatus {
    Running,
    Terminated(ExitReason),
}

impl PartyStatus {
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated(_))
    }
}

/// Primary API of a party.
///
/// Implementations are single-owner state machines; callers serialize all
/// calls, which is what the party actor does.
#[async_trait]
pub trait PartyApi: Send {
    /// Publishes the initial label and runs the init hook.
    async fn start(&mut self);

    /// Decides whether a connection may join. Called before the join.
    async fn join_attempt(&mut self, presence: Presence, metadata: JoinMetadata) -> AdmissionVerdict;

    /// Integrates connections that passed admission.
    async fn join(&mut self, presences: Vec<Presence>);

    async fn leave(&mut self, presences: Vec<Presence>) -> PartyStatus;

    /// Runs maintenance, then the batch of member messages in order.
    async fn tick(&mut self, messages: Vec<MemberMessage>) -> PartyStatus;

    /// Ends the party unconditionally, telling every member.
    async fn terminate(&mut self) -> PartyStatus;

    fn label(&self) -> &PartyLabel;
}
