//! Shardmux Shared Contracts
//!
//! This crate provides the types shared between the topology manager and
//! endpoint implementations of the shardmux sharded-cluster router driver:
//!
//! - **Endpoint seam**: the [`RouterEndpoint`] and [`Connector`] traits the
//!   topology consumes as capabilities
//! - **Identity probe**: the administrative handshake command and the
//!   [`IdentityDescriptor`] parsed from its reply
//! - **Authentication**: mechanism names and the replayable [`AuthAttempt`]
//!   record
//! - **Errors**: the [`RouterError`] taxonomy and `Result` alias
//!
//! The wire protocol, credential algorithms and cursor iteration are out of
//! scope here; they live behind the endpoint seam.

pub mod auth;
pub mod endpoint;
pub mod error;
pub mod identity;

pub use auth::{AuthAttempt, AuthMechanism};
pub use endpoint::{CommandOptions, Connector, RouterEndpoint, WriteOptions};
pub use error::{EndpointFailure, Result, RouterError};
pub use identity::{probe_command, IdentityDescriptor, ADMIN_NAMESPACE};
