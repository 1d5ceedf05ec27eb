use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::auth::AuthMechanism;
use crate::error::Result;
use crate::identity::IdentityDescriptor;

/// Options applied to a single command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Socket-level deadline for this command
    pub socket_timeout: Option<Duration>,
    /// Marks internal monitoring traffic (heartbeats) so endpoint
    /// implementations can keep it off the operation pipelines
    pub monitoring: bool,
}

/// Options applied to a single write operation.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Stop at the first failing document when true
    pub ordered: bool,
    /// Optional write-concern document forwarded to the endpoint
    pub write_concern: Option<Value>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            ordered: true,
            write_concern: None,
        }
    }
}

/// A single router endpoint connection.
///
/// This is the topology's view of the connection object: socket pooling,
/// message framing and the concrete auth handshakes all live behind this
/// trait. Implementations must be cheap to clone through an `Arc` and safe
/// to call from multiple tasks.
#[async_trait]
pub trait RouterEndpoint: Send + Sync {
    /// The endpoint's `host:port` address.
    fn address(&self) -> &str;

    /// Whether the underlying connection is currently usable.
    fn is_connected(&self) -> bool;

    /// Identity reported by the most recent handshake or probe, if any.
    fn last_identity(&self) -> Option<IdentityDescriptor>;

    async fn command(&self, ns: &str, cmd: Value, options: CommandOptions) -> Result<Value>;

    async fn insert(&self, ns: &str, ops: Vec<Value>, options: WriteOptions) -> Result<Value>;

    async fn update(&self, ns: &str, ops: Vec<Value>, options: WriteOptions) -> Result<Value>;

    async fn remove(&self, ns: &str, ops: Vec<Value>, options: WriteOptions) -> Result<Value>;

    async fn auth(&self, mechanism: AuthMechanism, db: &str, credentials: Value) -> Result<()>;

    async fn logout(&self, db: &str) -> Result<()>;

    /// Tears the connection down. Safe to call more than once.
    fn destroy(&self);

    /// Releases the connection's hold on the process without closing it.
    fn unref(&self);
}

/// Establishes endpoint connections for the topology.
///
/// A successful connect returns a live endpoint whose handshake already
/// completed; the topology validates router identity and replays recorded
/// auth attempts before admitting it.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, address: &str) -> Result<Arc<dyn RouterEndpoint>>;
}
