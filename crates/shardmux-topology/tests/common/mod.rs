//! Shared scripted endpoint and connector for topology scenario tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use shardmux_core::{
    AuthMechanism, CommandOptions, Connector, IdentityDescriptor, Result, RouterEndpoint,
    RouterError, WriteOptions,
};
use shardmux_topology::{TopologyConfig, TopologyEvent};
use tokio::sync::mpsc::UnboundedReceiver;

/// Scripted endpoint. Records every call it receives and fails on demand.
pub struct MockEndpoint {
    address: String,
    identity: IdentityDescriptor,
    connected: AtomicBool,
    destroyed: AtomicBool,
    probe_fail: AtomicBool,
    auth_fail: AtomicBool,
    probe_delay: Mutex<Option<Duration>>,
    auth_delay: Mutex<Option<Duration>>,
    auth_log: Mutex<Vec<(AuthMechanism, String)>>,
    logout_log: Mutex<Vec<String>>,
    write_log: Mutex<Vec<(&'static str, String, Value)>>,
    command_log: Mutex<Vec<(String, Value)>>,
}

impl MockEndpoint {
    fn new(address: &str, identity: IdentityDescriptor) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_string(),
            identity,
            connected: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            probe_fail: AtomicBool::new(false),
            auth_fail: AtomicBool::new(false),
            probe_delay: Mutex::new(None),
            auth_delay: Mutex::new(None),
            auth_log: Mutex::new(Vec::new()),
            logout_log: Mutex::new(Vec::new()),
            write_log: Mutex::new(Vec::new()),
            command_log: Mutex::new(Vec::new()),
        })
    }

    pub fn router(address: &str) -> Arc<Self> {
        Self::new(address, IdentityDescriptor::router())
    }

    pub fn arbiter(address: &str) -> Arc<Self> {
        Self::new(
            address,
            IdentityDescriptor {
                is_router: true,
                arbiter_only: true,
            },
        )
    }

    pub fn non_router(address: &str) -> Arc<Self> {
        Self::new(address, IdentityDescriptor::default())
    }

    /// Flips the link-liveness flag without failing probes, modeling a
    /// dropped connection the monitor has not demoted yet.
    pub fn set_link_up(&self, up: bool) {
        self.connected.store(up, Ordering::SeqCst);
    }

    pub fn set_probe_fail(&self, fail: bool) {
        self.probe_fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_auth_fail(&self, fail: bool) {
        self.auth_fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_probe_delay(&self, delay: Duration) {
        *self.probe_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_auth_delay(&self, delay: Duration) {
        *self.auth_delay.lock().unwrap() = Some(delay);
    }

    pub fn was_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn auth_log(&self) -> Vec<(AuthMechanism, String)> {
        self.auth_log.lock().unwrap().clone()
    }

    pub fn logout_log(&self) -> Vec<String> {
        self.logout_log.lock().unwrap().clone()
    }

    pub fn write_log(&self) -> Vec<(&'static str, String, Value)> {
        self.write_log.lock().unwrap().clone()
    }

    pub fn command_log(&self) -> Vec<(String, Value)> {
        self.command_log.lock().unwrap().clone()
    }

    fn probe_reply(&self) -> Value {
        json!({
            "isRouter": self.identity.is_router,
            "arbiterOnly": self.identity.arbiter_only,
            "ok": 1,
        })
    }
}

#[async_trait]
impl RouterEndpoint for MockEndpoint {
    fn address(&self) -> &str {
        &self.address
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn last_identity(&self) -> Option<IdentityDescriptor> {
        Some(self.identity.clone())
    }

    async fn command(&self, ns: &str, cmd: Value, options: CommandOptions) -> Result<Value> {
        if options.monitoring {
            let delay = *self.probe_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.probe_fail.load(Ordering::SeqCst) {
                return Err(RouterError::Connection(format!(
                    "{}: probe refused",
                    self.address
                )));
            }
            return Ok(self.probe_reply());
        }
        self.command_log.lock().unwrap().push((ns.to_string(), cmd));
        Ok(json!({ "ok": 1 }))
    }

    async fn insert(&self, ns: &str, ops: Vec<Value>, _options: WriteOptions) -> Result<Value> {
        let first = ops.first().cloned().unwrap_or(Value::Null);
        self.write_log
            .lock()
            .unwrap()
            .push(("insert", ns.to_string(), first));
        Ok(json!({ "ok": 1, "n": ops.len() }))
    }

    async fn update(&self, ns: &str, ops: Vec<Value>, _options: WriteOptions) -> Result<Value> {
        let first = ops.first().cloned().unwrap_or(Value::Null);
        self.write_log
            .lock()
            .unwrap()
            .push(("update", ns.to_string(), first));
        Ok(json!({ "ok": 1, "n": ops.len() }))
    }

    async fn remove(&self, ns: &str, ops: Vec<Value>, _options: WriteOptions) -> Result<Value> {
        let first = ops.first().cloned().unwrap_or(Value::Null);
        self.write_log
            .lock()
            .unwrap()
            .push(("remove", ns.to_string(), first));
        Ok(json!({ "ok": 1, "n": ops.len() }))
    }

    async fn auth(&self, mechanism: AuthMechanism, db: &str, _credentials: Value) -> Result<()> {
        let delay = *self.auth_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.auth_log
            .lock()
            .unwrap()
            .push((mechanism, db.to_string()));
        if self.auth_fail.load(Ordering::SeqCst) {
            return Err(RouterError::Command(format!(
                "{}: auth rejected",
                self.address
            )));
        }
        Ok(())
    }

    async fn logout(&self, db: &str) -> Result<()> {
        self.logout_log.lock().unwrap().push(db.to_string());
        Ok(())
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }

    fn unref(&self) {}
}

/// Connector over a fixed map of scripted endpoints. Addresses can be
/// refused to simulate an unreachable host and allowed again later.
pub struct MockConnector {
    endpoints: Mutex<HashMap<String, Arc<MockEndpoint>>>,
    refused: Mutex<HashSet<String>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            endpoints: Mutex::new(HashMap::new()),
            refused: Mutex::new(HashSet::new()),
        })
    }

    pub fn register(&self, endpoint: Arc<MockEndpoint>) {
        self.endpoints
            .lock()
            .unwrap()
            .insert(endpoint.address.clone(), endpoint);
    }

    pub fn refuse(&self, address: &str) {
        self.refused.lock().unwrap().insert(address.to_string());
    }

    pub fn allow(&self, address: &str) {
        self.refused.lock().unwrap().remove(address);
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, address: &str) -> Result<Arc<dyn RouterEndpoint>> {
        if self.refused.lock().unwrap().contains(address) {
            return Err(RouterError::Connection(format!(
                "{address}: connection refused"
            )));
        }
        let endpoint = self
            .endpoints
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or_else(|| RouterError::Connection(format!("{address}: no route to host")))?;
        endpoint.destroyed.store(false, Ordering::SeqCst);
        endpoint.connected.store(true, Ordering::SeqCst);
        Ok(endpoint)
    }
}

/// Config with intervals shrunk so monitor-driven transitions happen within
/// a test's lifetime.
pub fn fast_config() -> TopologyConfig {
    TopologyConfig::default()
        .with_ha_interval(Duration::from_millis(25))
        .with_probe_timeout(Duration::from_millis(250))
        .with_connect_stagger(Duration::from_millis(1))
}

/// Receives events until `pred` matches one, failing after five seconds.
pub async fn wait_for_event<F>(
    rx: &mut UnboundedReceiver<TopologyEvent>,
    mut pred: F,
) -> TopologyEvent
where
    F: FnMut(&TopologyEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
