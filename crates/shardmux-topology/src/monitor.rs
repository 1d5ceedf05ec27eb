//! Health monitor: a self-rescheduling periodic task that flushes the
//! disconnect buffer, probes every connected router, demotes failures and
//! sweeps the disconnected set for reconnection.

use std::time::Instant;

use futures::future::join_all;
use shardmux_core::{probe_command, CommandOptions, IdentityDescriptor, RouterError, ADMIN_NAMESPACE};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::events::TopologyEvent;
use crate::pool::{ProxyHandle, ProxySet};
use crate::state::TopologyState;
use crate::topology::{Core, Topology};

impl Topology {
    /// Starts the monitor task if it is not already running. The stored
    /// join handle is aborted exactly once, on `destroy` or `unref`.
    pub(crate) fn start_monitor(&self, core: &mut Core) {
        if core.monitor.is_some() {
            return;
        }
        debug!(topology_id = self.inner.id, "starting health monitor");
        let topology = self.clone();
        core.monitor = Some(tokio::spawn(topology.monitor_loop()));
    }

    async fn monitor_loop(self) {
        loop {
            sleep(self.inner.config.ha_interval).await;

            let (state, connected) = {
                let core = self.inner.core.lock().await;
                if core.state.is_terminal() {
                    return;
                }
                (core.state, core.pool.snapshot(ProxySet::Connected))
            };

            if connected.is_empty() {
                // Still connecting with nothing reachable is a fatal
                // condition for waiting callers; afterwards it is a close.
                if state == TopologyState::Connecting {
                    self.inner.events.emit(TopologyEvent::Error {
                        message: RouterError::NoProxyAvailable.to_string(),
                    });
                } else {
                    self.inner.events.emit(TopologyEvent::Close);
                }

                self.reconnect_proxies().await;

                let mut core = self.inner.core.lock().await;
                if core.state.is_terminal() {
                    return;
                }
                let connected_now = !core.pool.set(ProxySet::Connected).is_empty();
                if state == TopologyState::Connecting && connected_now {
                    if core.state.transition(TopologyState::Connected) {
                        self.inner.events.emit(TopologyEvent::Connect);
                        self.inner.events.emit(TopologyEvent::FullSetup);
                        self.inner.events.emit(TopologyEvent::All);
                    }
                } else if connected_now {
                    self.inner.events.emit(TopologyEvent::Reconnect);
                } else {
                    self.inner.events.emit(TopologyEvent::Close);
                }
            } else {
                let probes = connected.into_iter().map(|handle| {
                    let topology = self.clone();
                    async move {
                        topology.probe_proxy(handle).await;
                    }
                });
                join_all(probes).await;

                {
                    let core = self.inner.core.lock().await;
                    if core.state.is_terminal() {
                        return;
                    }
                }
                self.reconnect_proxies().await;
            }

            // Flush only after demotion and the sweep, so replay selects
            // from fresh membership instead of a handle the probes are
            // about to take down.
            if let Some(buffer) = &self.inner.config.disconnect_buffer {
                let flush = {
                    let core = self.inner.core.lock().await;
                    if core.state.is_terminal() {
                        return;
                    }
                    !core.pool.set(ProxySet::Connected).is_empty()
                };
                if flush {
                    buffer.execute(&self).await;
                }
            }
        }
    }

    /// Issues one liveness probe against a connected handle.
    ///
    /// Success refreshes latency and identity; failure demotes the handle
    /// to the disconnected set. Results arriving after the topology turned
    /// terminal are discarded without touching the sets.
    async fn probe_proxy(&self, handle: ProxyHandle) {
        let Some(endpoint) = handle.endpoint().cloned() else {
            return;
        };
        let address = handle.address().to_string();

        self.inner.events.emit(TopologyEvent::HeartbeatStarted {
            connection_id: address.clone(),
        });

        let probe_timeout = self.inner.config.probe_timeout;
        let options = CommandOptions {
            socket_timeout: Some(probe_timeout),
            monitoring: true,
        };
        let started = Instant::now();
        let outcome = match timeout(
            probe_timeout,
            endpoint.command(ADMIN_NAMESPACE, probe_command(), options),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RouterError::Timeout(probe_timeout.as_millis() as u64)),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let mut core = self.inner.core.lock().await;
        if core.state.is_terminal() {
            return;
        }

        match outcome {
            Ok(reply) => {
                let identity = IdentityDescriptor::from_probe_reply(&reply);
                let mut identity_changed = false;
                if let Some(live) = core.pool.get_mut(ProxySet::Connected, &address) {
                    live.last_heartbeat_latency_ms = duration_ms;
                    identity_changed = live.identity.as_ref() != Some(&identity);
                    live.identity = Some(identity.clone());
                }
                core.last_identity = Some(identity.clone());
                if identity_changed {
                    self.inner.events.emit(TopologyEvent::ServerDescriptionChanged {
                        topology_id: self.inner.id,
                        address: address.clone(),
                        identity,
                    });
                }
                self.inner.events.emit(TopologyEvent::HeartbeatSucceeded {
                    connection_id: address,
                    duration_ms,
                    reply,
                });
            }
            Err(error) => {
                warn!(%address, %error, duration_ms, "heartbeat failed, demoting router");
                core.pool
                    .transfer(ProxySet::Connected, ProxySet::Disconnected, &address);
                self.inner.events.emit(TopologyEvent::HeartbeatFailed {
                    connection_id: address,
                    duration_ms,
                    failure: error.to_string(),
                });
            }
        }
    }
}
