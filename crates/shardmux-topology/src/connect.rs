//! Connection orchestration: staggered seed connects, identity validation,
//! promotion into the connected set and the reconnection sweep the health
//! monitor runs over the disconnected set.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use shardmux_core::{AuthAttempt, RouterEndpoint};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::events::{ProxyKind, TopologyEvent};
use crate::pool::{ProxyHandle, ProxySet};
use crate::state::TopologyState;
use crate::topology::{Core, Topology};

/// Replays the recorded auth attempts against a freshly connected
/// endpoint, oldest first. Individual failures are logged and skipped so
/// one revoked credential cannot keep an endpoint out of the cluster view.
pub(crate) async fn replay_auth_contexts(
    endpoint: &Arc<dyn RouterEndpoint>,
    contexts: &[AuthAttempt],
) {
    for attempt in contexts {
        if let Err(error) = endpoint
            .auth(attempt.mechanism, &attempt.db, attempt.credentials.clone())
            .await
        {
            warn!(
                address = endpoint.address(),
                db = %attempt.db,
                %error,
                "auth context replay failed"
            );
        }
    }
}

impl Topology {
    /// Connects one seed address as part of the initial connect fan-out.
    pub(crate) async fn initial_connect(self, address: String, index: usize) {
        sleep(self.inner.config.connect_stagger * index as u32).await;
        {
            let core = self.inner.core.lock().await;
            if core.state.is_terminal() {
                return;
            }
        }

        self.inner.events.emit(TopologyEvent::ServerOpening {
            topology_id: self.inner.id,
            address: address.clone(),
        });

        let started = Instant::now();
        match self.inner.connector.connect(&address).await {
            Ok(endpoint) => {
                let contexts = self.inner.core.lock().await.auth_contexts.clone();
                replay_auth_contexts(&endpoint, &contexts).await;
                let connect_ms = started.elapsed().as_millis() as u64;

                let mut core = self.inner.core.lock().await;
                if core.state.is_terminal() {
                    endpoint.destroy();
                    return;
                }
                self.admit_endpoint(&mut core, &address, endpoint, connect_ms);
                self.finish_initial_connect(&mut core);
            }
            Err(error) => {
                warn!(%address, %error, "seed connect failed");
                let mut core = self.inner.core.lock().await;
                if core.state.is_terminal() {
                    return;
                }
                core.pool
                    .transfer(ProxySet::Connecting, ProxySet::Disconnected, &address);
                self.inner.events.emit(TopologyEvent::Left {
                    kind: ProxyKind::Router,
                    address: address.clone(),
                });
                self.inner.events.emit(TopologyEvent::Failed { address });
                self.finish_initial_connect(&mut core);
            }
        }
    }

    /// Validates and promotes a freshly connected endpoint, or discards it.
    ///
    /// The handle is expected in the `connecting` set; non-routers are
    /// dropped entirely and duplicates of an already-connected address are
    /// discarded.
    fn admit_endpoint(
        &self,
        core: &mut Core,
        address: &str,
        endpoint: Arc<dyn RouterEndpoint>,
        connect_ms: u64,
    ) {
        let identity = endpoint.last_identity().unwrap_or_default();

        if !identity.is_router {
            warn!(%address, "endpoint is not a router, discarding");
            core.pool.remove_from(ProxySet::Connecting, address);
            endpoint.destroy();
            self.inner.events.emit(TopologyEvent::Left {
                kind: ProxyKind::Unknown,
                address: address.to_string(),
            });
            self.inner.events.emit(TopologyEvent::Failed {
                address: address.to_string(),
            });
            return;
        }

        if core.pool.contains(ProxySet::Connected, address) {
            debug!(%address, "duplicate of a connected router, discarding");
            core.pool.remove_from(ProxySet::Connecting, address);
            endpoint.destroy();
            self.inner.events.emit(TopologyEvent::Failed {
                address: address.to_string(),
            });
            return;
        }

        let mut handle = core
            .pool
            .remove_from(ProxySet::Connecting, address)
            .unwrap_or_else(|| ProxyHandle::seed(address));
        handle.endpoint = Some(endpoint);
        handle.identity = Some(identity.clone());
        handle.last_heartbeat_latency_ms = connect_ms;
        core.pool.insert(ProxySet::Connected, handle);
        core.last_identity = Some(identity.clone());

        self.inner.events.emit(TopologyEvent::ServerDescriptionChanged {
            topology_id: self.inner.id,
            address: address.to_string(),
            identity,
        });
        self.inner.events.emit(TopologyEvent::Joined {
            kind: ProxyKind::Router,
            address: address.to_string(),
        });
        info!(%address, latency_ms = connect_ms, "router joined");
    }

    /// Runs once per resolved seed; acts when the connecting set drains.
    ///
    /// The monitor handle doubles as the started-once guard: the drain
    /// outcome is only derived by whichever seed empties the set first.
    fn finish_initial_connect(&self, core: &mut Core) {
        if !core.pool.set(ProxySet::Connecting).is_empty() || core.monitor.is_some() {
            return;
        }

        if !core.pool.set(ProxySet::Connected).is_empty() {
            if core.state.transition(TopologyState::Connected) {
                self.inner.events.emit(TopologyEvent::Connect);
                self.inner.events.emit(TopologyEvent::FullSetup);
                self.inner.events.emit(TopologyEvent::All);
                info!(
                    topology_id = self.inner.id,
                    routers = core.pool.set(ProxySet::Connected).len(),
                    "topology connected"
                );
            }
        } else if core.pool.set(ProxySet::Disconnected).is_empty() {
            warn!(topology_id = self.inner.id, "no routers found in seed list");
            self.inner.events.emit(TopologyEvent::Error {
                message: shardmux_core::RouterError::NoProxyFound.to_string(),
            });
            core.state.transition(TopologyState::Disconnected);
        }

        self.start_monitor(core);
    }

    /// Reconnection sweep over the disconnected set.
    ///
    /// Per-handle logic mirrors the initial connect (auth replay before
    /// acceptance, identity validation) but never drives topology-level
    /// state transitions; the monitor derives those after the sweep.
    pub(crate) async fn reconnect_proxies(&self) {
        let targets = {
            let core = self.inner.core.lock().await;
            if core.state.is_terminal() {
                return;
            }
            core.pool.addresses(ProxySet::Disconnected)
        };
        if targets.is_empty() {
            return;
        }
        debug!(count = targets.len(), "reconnection sweep");

        let attempts = targets.into_iter().enumerate().map(|(index, address)| {
            let topology = self.clone();
            async move {
                topology.reconnect_one(address, index).await;
            }
        });
        join_all(attempts).await;
    }

    async fn reconnect_one(&self, address: String, index: usize) {
        sleep(self.inner.config.connect_stagger * index as u32).await;
        {
            let core = self.inner.core.lock().await;
            if core.state.is_terminal() {
                return;
            }
        }

        self.inner.events.emit(TopologyEvent::ServerOpening {
            topology_id: self.inner.id,
            address: address.clone(),
        });

        let started = Instant::now();
        let endpoint = match self.inner.connector.connect(&address).await {
            Ok(endpoint) => endpoint,
            Err(error) => {
                debug!(%address, %error, "reconnect attempt failed");
                return;
            }
        };

        // An endpoint connecting mid-auth cannot see a consistent context
        // log; drop it and let the next sweep retry.
        if self.inner.authenticating.load(Ordering::SeqCst) {
            endpoint.destroy();
            return;
        }

        let contexts = self.inner.core.lock().await.auth_contexts.clone();
        replay_auth_contexts(&endpoint, &contexts).await;
        let connect_ms = started.elapsed().as_millis() as u64;

        let mut core = self.inner.core.lock().await;
        if core.state.is_terminal() {
            endpoint.destroy();
            return;
        }

        let identity = endpoint.last_identity().unwrap_or_default();
        if !identity.is_router {
            warn!(%address, "reconnected endpoint is not a router, discarding");
            core.pool.remove_from(ProxySet::Disconnected, &address);
            endpoint.destroy();
            self.inner.events.emit(TopologyEvent::Left {
                kind: ProxyKind::Unknown,
                address: address.clone(),
            });
            self.inner.events.emit(TopologyEvent::Failed { address });
            return;
        }

        if core.pool.contains(ProxySet::Connected, &address) {
            endpoint.destroy();
            return;
        }

        let Some(mut handle) = core.pool.remove_from(ProxySet::Disconnected, &address) else {
            endpoint.destroy();
            return;
        };
        handle.endpoint = Some(endpoint);
        handle.identity = Some(identity.clone());
        handle.last_heartbeat_latency_ms = connect_ms;
        core.pool.insert(ProxySet::Connected, handle);
        core.last_identity = Some(identity.clone());

        self.inner.events.emit(TopologyEvent::ServerDescriptionChanged {
            topology_id: self.inner.id,
            address: address.clone(),
            identity,
        });
        self.inner.events.emit(TopologyEvent::Joined {
            kind: ProxyKind::Router,
            address: address.clone(),
        });
        info!(%address, "router rejoined");
    }
}
