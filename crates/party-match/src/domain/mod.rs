//! Domain Layer - Pure party state
//!
//! RULES:
//! - No I/O operations
//! - No async code
//! - Collaborator results are passed in, never fetched here

pub mod admission;
pub mod command;
pub mod config;
pub mod label;
pub mod ledger;
pub mod registry;
pub mod social_gate;

pub use admission::{is_full, version_compatible, AdmissionVerdict, DenyReason, PendingReason};
pub use command::{client_op_code, is_leader_only, parse_envelope, PartyCommand};
pub use config::PartyConfig;
pub use label::PartyLabel;
pub use ledger::MembershipLedger;
pub use registry::InvitationRegistry;
pub use social_gate::{BlockReason, SocialGate};
