//! # Party Runtime
//!
//! Hosts parties on one node: the presence layer they publish to, the
//! registry that tracks them, and the RPCs clients call from outside a
//! party. The `party-server` binary wires it together.
//!
//! ```text
//!  RPC / client ──→ PartyServer ──→ PartyHandle ──mpsc──→ party actor
//!                        ↑                                    │
//!               SessionRegistry ←── EventRouter ←── bus ←─────┘
//!               PartyRegistry   ←── exit reaper ←── PartyExit
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod error;
pub mod registry;
pub mod router;
pub mod rpc;
pub mod server;
pub mod sessions;
pub mod telemetry;

pub use config::RuntimeConfig;
pub use error::{RpcError, ServerError, TelemetryError};
pub use registry::PartyRegistry;
pub use router::EventRouter;
pub use rpc::{PartyRpc, RpcContext};
pub use server::PartyServer;
pub use sessions::{ClientConnection, ClientEvent, SessionRegistry};
pub use telemetry::init_tracing;
