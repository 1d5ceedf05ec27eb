use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use serde_json::Value;
use shardmux_core::{
    CommandOptions, Connector, IdentityDescriptor, Result, RouterEndpoint, RouterError,
    WriteOptions,
};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::buffer::{PendingOp, WriteKind};
use crate::config::TopologyConfig;
use crate::cursor::{BasicCursorFactory, CursorOptions, TopologyCursor};
use crate::events::{EventBus, TopologyEvent};
use crate::pool::{ProxyHandle, ProxyPool, ProxySet};
use crate::selector;
use crate::state::TopologyState;

static TOPOLOGY_ID: AtomicU32 = AtomicU32::new(1);

/// State owned exclusively by the topology aggregate. Every mutation of the
/// proxy sets, the auth log or the selection cursor happens under this lock.
pub(crate) struct Core {
    pub(crate) state: TopologyState,
    pub(crate) pool: ProxyPool,
    pub(crate) auth_contexts: Vec<shardmux_core::AuthAttempt>,
    pub(crate) selector_index: usize,
    pub(crate) monitor: Option<JoinHandle<()>>,
    pub(crate) last_identity: Option<IdentityDescriptor>,
}

pub(crate) struct Shared {
    pub(crate) id: u32,
    pub(crate) seeds: Vec<String>,
    pub(crate) config: TopologyConfig,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) events: EventBus,
    pub(crate) authenticating: AtomicBool,
    pub(crate) core: Mutex<Core>,
}

/// Sharded-cluster router topology.
///
/// Maintains a live view of a set of interchangeable router endpoints:
/// connects to the seed list, monitors health, demotes and re-admits
/// routers, replays authentication onto joining endpoints and selects one
/// router per operation. Cloning is cheap and shares the same topology.
#[derive(Clone)]
pub struct Topology {
    pub(crate) inner: Arc<Shared>,
}

impl Topology {
    /// Creates a topology over `seeds` using `connector` to establish
    /// endpoint connections.
    ///
    /// Returns the topology and the receiving end of its event channel.
    /// Nothing connects until [`connect`](Self::connect) is called.
    pub fn new(
        seeds: Vec<String>,
        connector: Arc<dyn Connector>,
        config: TopologyConfig,
    ) -> (Self, mpsc::UnboundedReceiver<TopologyEvent>) {
        let (events, events_rx) = EventBus::new();
        let topology = Self {
            inner: Arc::new(Shared {
                id: TOPOLOGY_ID.fetch_add(1, Ordering::SeqCst),
                seeds,
                config,
                connector,
                events,
                authenticating: AtomicBool::new(false),
                core: Mutex::new(Core {
                    state: TopologyState::Disconnected,
                    pool: ProxyPool::new(),
                    auth_contexts: Vec::new(),
                    selector_index: 0,
                    monitor: None,
                    last_identity: None,
                }),
            }),
        };
        (topology, events_rx)
    }

    /// Unique id of this topology instance, carried by monitoring events.
    pub fn id(&self) -> u32 {
        self.inner.id
    }

    /// Starts connecting to every seed address, staggered.
    ///
    /// Moves the topology to `Connecting`; the `Connect`/`FullSetup`/`All`
    /// events (or a fatal no-proxies error) follow once the last seed
    /// resolves. An empty seed list fails immediately.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut core = self.inner.core.lock().await;
            if core.state == TopologyState::Destroyed {
                return Err(RouterError::TopologyDestroyed);
            }
            if !core.state.transition(TopologyState::Connecting) {
                return Err(RouterError::TopologyDestroyed);
            }
            if self.inner.seeds.is_empty() {
                core.state.transition(TopologyState::Disconnected);
                self.inner.events.emit(TopologyEvent::Error {
                    message: RouterError::NoProxyFound.to_string(),
                });
                return Err(RouterError::NoProxyFound);
            }
            for seed in &self.inner.seeds {
                core.pool
                    .insert(ProxySet::Connecting, ProxyHandle::seed(seed.clone()));
            }
        }

        self.inner.events.emit(TopologyEvent::TopologyOpening {
            topology_id: self.inner.id,
        });
        info!(topology_id = self.inner.id, seeds = self.inner.seeds.len(), "topology connecting");

        for (index, seed) in self.inner.seeds.iter().enumerate() {
            let topology = self.clone();
            let address = seed.clone();
            tokio::spawn(async move {
                topology.initial_connect(address, index).await;
            });
        }
        Ok(())
    }

    /// Executes a command against a selected router.
    pub async fn command(&self, ns: &str, cmd: Value, options: CommandOptions) -> Result<Value> {
        let picked = {
            let mut core = self.inner.core.lock().await;
            if core.state == TopologyState::Destroyed {
                return Err(RouterError::TopologyDestroyed);
            }
            let threshold = self.inner.config.local_threshold;
            let split = &mut *core;
            let picked = selector::pick_proxy(&split.pool, &mut split.selector_index, threshold);

            // The enqueue must share the critical section with the
            // destroyed check: a destroy between them would reject the
            // buffer before this op lands in it, stranding the caller.
            let live = picked.as_ref().is_some_and(|p| p.is_connected());
            if !live {
                if let Some(buffer) = &self.inner.config.disconnect_buffer {
                    let (done, rx) = oneshot::channel();
                    buffer.enqueue(PendingOp::Command {
                        ns: ns.to_string(),
                        cmd,
                        options,
                        done,
                    });
                    debug!(ns, "command buffered while disconnected");
                    drop(core);
                    return match rx.await {
                        Ok(result) => result,
                        Err(_) => Err(RouterError::TopologyDestroyed),
                    };
                }
            }
            picked
        };

        let endpoint = picked
            .and_then(|p| p.endpoint().cloned())
            .ok_or(RouterError::NoProxyAvailable)?;
        endpoint.command(ns, cmd, options).await
    }

    pub async fn insert(&self, ns: &str, ops: Vec<Value>, options: WriteOptions) -> Result<Value> {
        self.write_operation(WriteKind::Insert, ns, ops, options).await
    }

    pub async fn update(&self, ns: &str, ops: Vec<Value>, options: WriteOptions) -> Result<Value> {
        self.write_operation(WriteKind::Update, ns, ops, options).await
    }

    pub async fn remove(&self, ns: &str, ops: Vec<Value>, options: WriteOptions) -> Result<Value> {
        self.write_operation(WriteKind::Remove, ns, ops, options).await
    }

    async fn write_operation(
        &self,
        kind: WriteKind,
        ns: &str,
        ops: Vec<Value>,
        options: WriteOptions,
    ) -> Result<Value> {
        let picked = {
            let mut core = self.inner.core.lock().await;
            if core.state == TopologyState::Destroyed {
                return Err(RouterError::TopologyDestroyed);
            }
            if core.pool.set(ProxySet::Connected).is_empty() {
                if let Some(buffer) = &self.inner.config.disconnect_buffer {
                    let (done, rx) = oneshot::channel();
                    buffer.enqueue(PendingOp::Write {
                        kind,
                        ns: ns.to_string(),
                        ops,
                        options,
                        done,
                    });
                    debug!(ns, ?kind, "write buffered while disconnected");
                    drop(core);
                    return match rx.await {
                        Ok(result) => result,
                        Err(_) => Err(RouterError::TopologyDestroyed),
                    };
                }
                return Err(RouterError::NoProxyAvailable);
            }
            let threshold = self.inner.config.local_threshold;
            let core = &mut *core;
            selector::pick_proxy(&core.pool, &mut core.selector_index, threshold)
        };

        let endpoint = picked
            .and_then(|p| p.endpoint().cloned())
            .ok_or(RouterError::NoProxyAvailable)?;
        match kind {
            WriteKind::Insert => endpoint.insert(ns, ops, options).await,
            WriteKind::Update => endpoint.update(ns, ops, options).await,
            WriteKind::Remove => endpoint.remove(ns, ops, options).await,
        }
    }

    /// Replays one buffered operation, dispatching it directly against a
    /// live endpoint.
    ///
    /// Never re-enters the buffering paths: when no live router is
    /// available the descriptor is handed back so the buffer can keep it
    /// queued for a later flush. A terminal topology fails the op instead.
    pub(crate) async fn replay_op(&self, op: PendingOp) -> Option<PendingOp> {
        match op {
            PendingOp::Command {
                ns,
                cmd,
                options,
                done,
            } => {
                let endpoint = {
                    let mut core = self.inner.core.lock().await;
                    if core.state == TopologyState::Destroyed {
                        let _ = done.send(Err(RouterError::TopologyDestroyed));
                        return None;
                    }
                    let threshold = self.inner.config.local_threshold;
                    let split = &mut *core;
                    selector::pick_proxy(&split.pool, &mut split.selector_index, threshold)
                        .filter(|p| p.is_connected())
                        .and_then(|p| p.endpoint().cloned())
                };
                let Some(endpoint) = endpoint else {
                    return Some(PendingOp::Command {
                        ns,
                        cmd,
                        options,
                        done,
                    });
                };
                let result = endpoint.command(&ns, cmd, options).await;
                let _ = done.send(result);
                None
            }
            PendingOp::Write {
                kind,
                ns,
                ops,
                options,
                done,
            } => {
                let endpoint = {
                    let mut core = self.inner.core.lock().await;
                    if core.state == TopologyState::Destroyed {
                        let _ = done.send(Err(RouterError::TopologyDestroyed));
                        return None;
                    }
                    let threshold = self.inner.config.local_threshold;
                    let split = &mut *core;
                    selector::pick_proxy(&split.pool, &mut split.selector_index, threshold)
                        .filter(|p| p.is_connected())
                        .and_then(|p| p.endpoint().cloned())
                };
                let Some(endpoint) = endpoint else {
                    return Some(PendingOp::Write {
                        kind,
                        ns,
                        ops,
                        options,
                        done,
                    });
                };
                let result = match kind {
                    WriteKind::Insert => endpoint.insert(&ns, ops, options).await,
                    WriteKind::Update => endpoint.update(&ns, ops, options).await,
                    WriteKind::Remove => endpoint.remove(&ns, ops, options).await,
                };
                let _ = done.send(result);
                None
            }
            PendingOp::Auth {
                mechanism,
                db,
                credentials,
                done,
            } => {
                if self.is_destroyed().await {
                    let _ = done.send(Err(RouterError::TopologyDestroyed));
                    return None;
                }
                if !self.is_connected().await
                    || self.inner.authenticating.load(Ordering::SeqCst)
                {
                    return Some(PendingOp::Auth {
                        mechanism,
                        db,
                        credentials,
                        done,
                    });
                }
                let result = self.apply_auth(mechanism, &db, credentials).await;
                let _ = done.send(result);
                None
            }
        }
    }

    /// Builds a cursor bound to `ns`, `cmd` and this topology.
    ///
    /// The per-call factory override wins over the configured factory;
    /// iteration is up to the cursor implementation.
    pub fn cursor(&self, ns: &str, cmd: Value, options: CursorOptions) -> Box<dyn TopologyCursor> {
        let factory = options
            .cursor_factory
            .clone()
            .or_else(|| self.inner.config.cursor_factory.clone())
            .unwrap_or_else(|| Arc::new(BasicCursorFactory));
        factory.make_cursor(ns, cmd, options, self.clone())
    }

    /// The handle selection would currently return, for diagnostics.
    pub async fn get_server(&self) -> Option<ProxyHandle> {
        let mut core = self.inner.core.lock().await;
        let threshold = self.inner.config.local_threshold;
        let core = &mut *core;
        let picked = selector::pick_proxy(&core.pool, &mut core.selector_index, threshold);
        if self.inner.config.debug {
            self.inner.events.emit(TopologyEvent::PickedServer {
                address: picked.as_ref().map(|p| p.address().to_string()),
            });
        }
        picked
    }

    /// The endpoint connection behind [`get_server`](Self::get_server).
    pub async fn get_connection(&self) -> Option<Arc<dyn RouterEndpoint>> {
        self.get_server().await.and_then(|p| p.endpoint().cloned())
    }

    pub async fn is_connected(&self) -> bool {
        let core = self.inner.core.lock().await;
        !core.pool.set(ProxySet::Connected).is_empty()
    }

    pub async fn is_destroyed(&self) -> bool {
        self.inner.core.lock().await.state == TopologyState::Destroyed
    }

    pub async fn state(&self) -> TopologyState {
        self.inner.core.lock().await.state
    }

    /// Identity reported by the most recently validated router.
    pub async fn last_identity(&self) -> Option<IdentityDescriptor> {
        self.inner.core.lock().await.last_identity.clone()
    }

    /// Addresses currently in the connected set.
    pub async fn connected_servers(&self) -> Vec<String> {
        self.inner.core.lock().await.pool.addresses(ProxySet::Connected)
    }

    /// Addresses currently in the disconnected set.
    pub async fn disconnected_servers(&self) -> Vec<String> {
        self.inner.core.lock().await.pool.addresses(ProxySet::Disconnected)
    }

    /// Destroys the topology: tears down every endpoint, cancels the health
    /// monitor, clears the auth log and fails any buffered operations.
    /// Terminal; later calls are no-ops.
    pub async fn destroy(&self) {
        {
            let mut core = self.inner.core.lock().await;
            if core.state == TopologyState::Destroyed {
                return;
            }
            core.state.transition(TopologyState::Destroyed);
            if let Some(monitor) = core.monitor.take() {
                monitor.abort();
            }
            core.auth_contexts.clear();

            let mut live = core.pool.addresses(ProxySet::Connected);
            live.extend(core.pool.addresses(ProxySet::Connecting));
            for address in live {
                if let Some(set) = core.pool.set_of(&address) {
                    if let Some(handle) = core.pool.get_mut(set, &address) {
                        if let Some(endpoint) = handle.endpoint() {
                            endpoint.destroy();
                        }
                    }
                    self.inner.events.emit(TopologyEvent::ServerClosed {
                        topology_id: self.inner.id,
                        address: address.clone(),
                    });
                    core.pool.transfer(set, ProxySet::Disconnected, &address);
                }
            }
        }

        self.inner.events.emit(TopologyEvent::TopologyClosed {
            topology_id: self.inner.id,
        });
        if let Some(buffer) = &self.inner.config.disconnect_buffer {
            buffer.reject_all();
        }
        info!(topology_id = self.inner.id, "topology destroyed");
    }

    /// Releases the topology's hold on the process: unrefs every live
    /// endpoint and cancels the health monitor. Only `destroy` may follow.
    pub async fn unref(&self) {
        let mut core = self.inner.core.lock().await;
        if !core.state.transition(TopologyState::Unreferenced) {
            return;
        }
        for set in [ProxySet::Connected, ProxySet::Connecting] {
            for handle in core.pool.set(set) {
                if let Some(endpoint) = handle.endpoint() {
                    endpoint.unref();
                }
            }
        }
        if let Some(monitor) = core.monitor.take() {
            monitor.abort();
        }
    }
}
