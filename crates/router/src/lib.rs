//! Routing and dispatch core of a switchyard cluster router
//!
//! This crate provides:
//! - Service registry with master election and hash buckets
//! - Player to owning node directory
//! - Relay router table with round-robin selection
//! - Forwarding strategies (target, player, player group, master, hash,
//!   broadcast) with relay fallback
//! - Flow accounting and a background flow reporter
//!
//! The router is transport-agnostic: frames are handed to any
//! `switchyard_connection::ConnectionSink`.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod flow;
mod forward;
pub mod header;
pub mod player;
pub mod relay;
pub mod router;
pub mod service;

pub use config::RouterConfig;
pub use error::{HeaderError, RelayFailure, RouteError, RouteErrorKind, RouteResult};
pub use flow::{FlowInfo, FlowReporter};
pub use header::{
    FORWARD_ROUTER, Hop, ROUTER_HEAD_SIZE, RouterHeader, RpcType, decode_player_ids,
    encode_player_ids,
};
pub use router::SocketRouter;
pub use service::{ServiceGroup, ServiceNode};
pub use switchyard_node_id::{NodeId, ServiceId};
