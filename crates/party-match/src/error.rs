//! Error types for the party core

use party_types::ResponseCode;
use thiserror::Error;

/// Invalid party configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Tick rate must be between 1 and {max}, got {value}")]
    InvalidTickRate { value: u32, max: u32 },

    #[error("Initial join window must be at least one tick")]
    ZeroInitialJoinTicks,

    #[error("Blocked list page size must be positive")]
    ZeroPageSize,

    #[error("Blocked list page limit must be positive")]
    ZeroPageLimit,

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Failure reported by an external collaborator behind a port.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DependencyError {
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Party mailbox full")]
    Backpressure,
}

/// A member message that could not be turned into a command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The envelope was not valid. `id` is set when a correlation id could
    /// still be recovered from the raw payload.
    #[error("Malformed party message: {reason}")]
    MalformedEnvelope { id: Option<i64>, reason: String },

    #[error("Unsupported op code {0}")]
    UnsupportedOpCode(i64),

    #[error("Command target must be a non-empty UTF-8 user id")]
    InvalidTarget,

    #[error("Party configuration exceeds {max} bytes")]
    ConfigTooLarge { max: usize },
}

impl CommandError {
    /// Correlation id recovered from a malformed envelope, if any.
    pub fn recovered_id(&self) -> Option<i64> {
        match self {
            Self::MalformedEnvelope { id, .. } => *id,
            _ => None,
        }
    }

    /// Every command error is acknowledged as a bad request.
    pub fn response_code(&self) -> ResponseCode {
        ResponseCode::BadRequest
    }
}

/// Errors surfaced by party creation and the party actor handle.
#[derive(Debug, Error)]
pub enum PartyError {
    #[error("Invalid party type id: {0}")]
    InvalidPartyType(i64),

    #[error("Party configuration too large: {size} > {max}")]
    ConfigTooLarge { size: usize, max: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Party {0} has terminated")]
    Terminated(String),

    #[error("Party {0} mailbox is full")]
    MailboxFull(String),
}
