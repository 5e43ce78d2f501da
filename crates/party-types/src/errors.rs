//! # Error Types
//!
//! Errors produced while parsing shared types.

use thiserror::Error;

/// Errors raised by the shared type constructors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    /// Party ids are `<uuid>.<node>`.
    #[error("Malformed party id: {0}")]
    MalformedPartyId(String),

    /// The uuid component of a party id did not parse.
    #[error("Invalid party uuid: {0}")]
    InvalidPartyUuid(String),

    /// User ids must be non-empty.
    #[error("Empty user id")]
    EmptyUserId,
}
