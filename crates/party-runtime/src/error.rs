//! Runtime error types

use party_match::{DependencyError, PartyError};
use party_types::PartyId;
use thiserror::Error;

/// Status codes carried by [`RpcError`], following the gRPC numbering the
/// RPC clients already understand.
pub mod codes {
    pub const INVALID_ARGUMENT: i32 = 3;
    pub const NOT_FOUND: i32 = 5;
    pub const UNIMPLEMENTED: i32 = 12;
    pub const INTERNAL: i32 = 13;
}

/// Errors of the server facade.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown party: {0}")]
    UnknownParty(PartyId),

    #[error("Session is not connected")]
    NotConnected,

    #[error("Not a member of party {0}")]
    NotMember(PartyId),

    #[error(transparent)]
    Party(#[from] PartyError),
}

/// Errors returned by the RPC surface instead of a response body.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("cannot unmarshal request: {0}")]
    InvalidRequest(String),

    #[error("cannot marshal response: {0}")]
    Marshal(String),

    #[error("bad party id: {0}")]
    BadPartyId(String),

    #[error("unknown rpc: {0}")]
    UnknownMethod(String),

    #[error("not a member of party {0}")]
    NotMember(String),

    #[error("notification failed: {0}")]
    Notification(#[from] DependencyError),

    #[error("party unavailable: {0}")]
    Server(#[from] ServerError),
}

impl RpcError {
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidRequest(_) | Self::Marshal(_) | Self::Notification(_) => codes::INTERNAL,
            Self::BadPartyId(_) | Self::NotMember(_) => codes::INVALID_ARGUMENT,
            Self::UnknownMethod(_) => codes::UNIMPLEMENTED,
            Self::Server(_) => codes::NOT_FOUND,
        }
    }
}

/// Logging could not be initialised.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    Filter(String),

    #[error("subscriber already installed: {0}")]
    Init(String),
}
