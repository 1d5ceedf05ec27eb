use std::sync::Arc;

use serde_json::Value;

use crate::topology::Topology;

/// Options for cursor construction.
#[derive(Clone, Default)]
pub struct CursorOptions {
    /// Documents per batch requested from the router
    pub batch_size: Option<u32>,
    /// Per-call factory override; falls back to the topology's configured
    /// factory, then to the basic cursor
    pub cursor_factory: Option<Arc<dyn CursorFactory>>,
}

/// A cursor bound to a namespace, command and topology.
///
/// Result iteration is an external collaborator; the topology only hands
/// out the binding.
pub trait TopologyCursor: Send {
    fn namespace(&self) -> &str;
    fn command(&self) -> &Value;
}

/// Builds cursor objects for [`Topology::cursor`](crate::Topology::cursor).
pub trait CursorFactory: Send + Sync {
    fn make_cursor(
        &self,
        ns: &str,
        cmd: Value,
        options: CursorOptions,
        topology: Topology,
    ) -> Box<dyn TopologyCursor>;
}

/// Default cursor: carries the binding and nothing else.
pub struct CommandCursor {
    ns: String,
    cmd: Value,
    batch_size: Option<u32>,
    topology: Topology,
}

impl CommandCursor {
    pub fn batch_size(&self) -> Option<u32> {
        self.batch_size
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }
}

impl TopologyCursor for CommandCursor {
    fn namespace(&self) -> &str {
        &self.ns
    }

    fn command(&self) -> &Value {
        &self.cmd
    }
}

pub(crate) struct BasicCursorFactory;

impl CursorFactory for BasicCursorFactory {
    fn make_cursor(
        &self,
        ns: &str,
        cmd: Value,
        options: CursorOptions,
        topology: Topology,
    ) -> Box<dyn TopologyCursor> {
        Box::new(CommandCursor {
            ns: ns.to_string(),
            cmd,
            batch_size: options.batch_size,
            topology,
        })
    }
}
