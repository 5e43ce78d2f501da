//! # Party Types Crate
//!
//! Identities, presences and the wire envelope exchanged between party
//! members and the authoritative party process.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: op codes, response codes and the message
//!   envelope are defined once here and shared by the core, the bus and
//!   the runtime.
//! - **Session-scoped identity**: a `Presence` is a user *and* the session
//!   it connected from. Two presences of the same user are different
//!   connections.

pub mod entities;
pub mod errors;
pub mod wire;

pub use entities::*;
pub use errors::*;
pub use wire::*;

/// Maximum size in bytes of a party configuration string.
pub const MAX_PARTY_CONFIG_BYTES: usize = 1024;
