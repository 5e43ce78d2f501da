//! # Party Service
//!
//! `PartyMatch` owns one party's state and implements the `PartyApi`
//! driving port on top of the domain types, reaching external
//! collaborators only through the outbound ports.

mod commands;
mod core;
mod gate;
mod lifecycle;
mod maintenance;

pub use self::core::{PartyDeps, PartyMatch};
