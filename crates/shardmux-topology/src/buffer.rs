use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::Value;
use shardmux_core::{AuthMechanism, CommandOptions, Result, RouterError, WriteOptions};
use tokio::sync::oneshot;
use tracing::debug;

use crate::topology::Topology;

/// Kind of buffered write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
    Remove,
}

/// A pending operation descriptor, completed through a oneshot once the
/// buffer replays it.
pub(crate) enum PendingOp {
    Command {
        ns: String,
        cmd: Value,
        options: CommandOptions,
        done: oneshot::Sender<Result<Value>>,
    },
    Write {
        kind: WriteKind,
        ns: String,
        ops: Vec<Value>,
        options: WriteOptions,
        done: oneshot::Sender<Result<Value>>,
    },
    Auth {
        mechanism: AuthMechanism,
        db: String,
        credentials: Value,
        done: oneshot::Sender<Result<()>>,
    },
}

/// FIFO buffer for operations issued while no router is connected.
///
/// The health monitor flushes the buffer on the first tick after a router
/// becomes available; operations replay in their original enqueue order.
#[derive(Default)]
pub struct DisconnectBuffer {
    queue: Mutex<VecDeque<PendingOp>>,
}

impl DisconnectBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().expect("buffer lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn enqueue(&self, op: PendingOp) {
        self.queue.lock().expect("buffer lock poisoned").push_back(op);
    }

    fn drain(&self) -> Vec<PendingOp> {
        self.queue
            .lock()
            .expect("buffer lock poisoned")
            .drain(..)
            .collect()
    }

    /// Replays buffered operations against `topology`, oldest first.
    ///
    /// Dispatch goes through the topology's replay path, which never
    /// re-enters the buffering branches. When an operation finds no live
    /// router it is handed back; it and everything behind it return to the
    /// front of the queue, preserving order, and wait for a later flush.
    pub async fn execute(&self, topology: &Topology) {
        let ops = self.drain();
        if ops.is_empty() {
            return;
        }
        debug!(count = ops.len(), "replaying buffered operations");

        let mut ops = VecDeque::from(ops);
        while let Some(op) = ops.pop_front() {
            if let Some(stalled) = topology.replay_op(op).await {
                ops.push_front(stalled);
                self.requeue_front(ops);
                return;
            }
        }
    }

    /// Returns unfinished operations to the front of the queue, ahead of
    /// anything enqueued during the flush.
    fn requeue_front(&self, ops: VecDeque<PendingOp>) {
        let mut queue = self.queue.lock().expect("buffer lock poisoned");
        for op in ops.into_iter().rev() {
            queue.push_front(op);
        }
    }

    /// Fails every pending operation. Called when the topology is destroyed
    /// so buffered callers do not wait forever.
    pub(crate) fn reject_all(&self) {
        for op in self.drain() {
            match op {
                PendingOp::Command { done, .. } | PendingOp::Write { done, .. } => {
                    let _ = done.send(Err(RouterError::TopologyDestroyed));
                }
                PendingOp::Auth { done, .. } => {
                    let _ = done.send(Err(RouterError::TopologyDestroyed));
                }
            }
        }
    }
}
