use serde_json::Value;
use shardmux_core::IdentityDescriptor;
use tokio::sync::mpsc;

/// Kind of cluster member an endpoint turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    /// A query router, eligible for the connected set
    Router,
    /// Something that answered but is not a router
    Unknown,
}

/// Lifecycle and monitoring signals emitted by the topology.
///
/// Events are delivered on an unbounded channel in the order the topology
/// produced them; dropping the receiver silently discards further events.
#[derive(Debug, Clone)]
pub enum TopologyEvent {
    // Monitoring signals
    TopologyOpening {
        topology_id: u32,
    },
    TopologyClosed {
        topology_id: u32,
    },
    ServerOpening {
        topology_id: u32,
        address: String,
    },
    ServerDescriptionChanged {
        topology_id: u32,
        address: String,
        identity: IdentityDescriptor,
    },
    ServerClosed {
        topology_id: u32,
        address: String,
    },
    HeartbeatStarted {
        connection_id: String,
    },
    HeartbeatSucceeded {
        connection_id: String,
        duration_ms: u64,
        reply: Value,
    },
    HeartbeatFailed {
        connection_id: String,
        duration_ms: u64,
        failure: String,
    },

    // Public lifecycle events
    Connect,
    Reconnect,
    FullSetup,
    All,
    Close,
    Joined {
        kind: ProxyKind,
        address: String,
    },
    Left {
        kind: ProxyKind,
        address: String,
    },
    Failed {
        address: String,
    },
    Error {
        message: String,
    },

    /// Selection diagnostic, emitted only when the `debug` option is set
    PickedServer {
        address: Option<String>,
    },
}

/// Fan-out side of the topology's event channel.
#[derive(Clone)]
pub(crate) struct EventBus {
    tx: mpsc::UnboundedSender<TopologyEvent>,
}

impl EventBus {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<TopologyEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emits an event. A dropped receiver is not an error.
    pub(crate) fn emit(&self, event: TopologyEvent) {
        let _ = self.tx.send(event);
    }
}
