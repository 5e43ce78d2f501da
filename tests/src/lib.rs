//! # Party Match Test Suite
//!
//! Flows spanning several crates.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── flows.rs          # party core + actor + event bus
//!     └── server_flows.rs   # clients against a running PartyServer
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p party-tests
//! cargo test -p party-tests integration::server_flows::
//! ```

#![allow(dead_code)]

pub mod integration;
