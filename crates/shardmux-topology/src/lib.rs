//! Shardmux Topology Manager
//!
//! Maintains a live view of a sharded cluster's redundant, interchangeable
//! router endpoints: it connects to a seed list, validates that each
//! endpoint really is a router, monitors health with periodic latency-
//! measured probes, demotes and re-admits endpoints across outages, replays
//! authentication consistently onto every joining endpoint and selects one
//! router per outgoing operation.
//!
//! # Architecture
//!
//! - [`Topology`]: the facade, exposing `connect`, `command`,
//!   `insert`/`update`/`remove`, `cursor`, `auth`/`logout`, `get_server`
//!   and `destroy`/`unref`
//! - [`TopologyState`]: the five-state lifecycle; illegal transitions are
//!   silent no-ops
//! - `ProxyPool`: the three disjoint membership sets (connecting,
//!   connected, disconnected) behind a single transfer surface
//! - Health monitor: a self-rescheduling task probing every connected
//!   router each `ha_interval`
//! - Selector: latency-bounded round-robin over the connected set
//! - [`DisconnectBuffer`]: FIFO queue tolerating transient full outages
//!
//! The endpoint connection object, wire protocol, credential algorithms
//! and cursor iteration are external collaborators behind the
//! `shardmux-core` traits.
//!
//! # Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use shardmux_core::{CommandOptions, Connector};
//! # use shardmux_topology::{Topology, TopologyConfig};
//! # async fn example(connector: Arc<dyn Connector>) -> shardmux_core::Result<()> {
//! let seeds = vec!["router-a:27017".to_string(), "router-b:27017".to_string()];
//! let (topology, _events) = Topology::new(seeds, connector, TopologyConfig::default());
//! topology.connect().await?;
//!
//! let reply = topology
//!     .command("db.$cmd", serde_json::json!({ "ping": 1 }), CommandOptions::default())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod config;
pub mod cursor;
pub mod events;
pub mod pool;
pub mod state;

mod auth;
mod connect;
mod monitor;
mod selector;
mod topology;

pub use buffer::{DisconnectBuffer, WriteKind};
pub use config::TopologyConfig;
pub use cursor::{CommandCursor, CursorFactory, CursorOptions, TopologyCursor};
pub use events::{ProxyKind, TopologyEvent};
pub use pool::{ProxyHandle, ProxySet};
pub use state::TopologyState;
pub use topology::Topology;
