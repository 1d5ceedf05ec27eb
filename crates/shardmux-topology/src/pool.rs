use std::fmt;
use std::sync::Arc;

use shardmux_core::{IdentityDescriptor, RouterEndpoint};

/// A router endpoint's membership record in the topology.
///
/// A handle is a member of exactly one of the three proxy sets at all
/// times. Handles in the connecting or disconnected set may not carry a
/// live endpoint object yet.
#[derive(Clone)]
pub struct ProxyHandle {
    pub(crate) address: String,
    pub(crate) endpoint: Option<Arc<dyn RouterEndpoint>>,
    pub(crate) last_heartbeat_latency_ms: u64,
    pub(crate) identity: Option<IdentityDescriptor>,
}

impl ProxyHandle {
    /// A handle for a seed address that has not been connected yet.
    pub fn seed(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            endpoint: None,
            last_heartbeat_latency_ms: 0,
            identity: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn endpoint(&self) -> Option<&Arc<dyn RouterEndpoint>> {
        self.endpoint.as_ref()
    }

    pub fn latency_ms(&self) -> u64 {
        self.last_heartbeat_latency_ms
    }

    pub fn identity(&self) -> Option<&IdentityDescriptor> {
        self.identity.as_ref()
    }

    /// Whether the underlying endpoint reports itself live.
    pub fn is_connected(&self) -> bool {
        self.endpoint.as_ref().is_some_and(|e| e.is_connected())
    }
}

impl fmt::Debug for ProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyHandle")
            .field("address", &self.address)
            .field("connected", &self.endpoint.is_some())
            .field("last_heartbeat_latency_ms", &self.last_heartbeat_latency_ms)
            .field("identity", &self.identity)
            .finish()
    }
}

/// The three disjoint membership sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxySet {
    Connecting,
    Connected,
    Disconnected,
}

/// Owned aggregate of the three proxy sets.
///
/// All membership changes go through [`insert`](Self::insert),
/// [`transfer`](Self::transfer) and [`remove_from`](Self::remove_from),
/// which enforce the exactly-one-set invariant in one place.
#[derive(Debug, Default)]
pub struct ProxyPool {
    connecting: Vec<ProxyHandle>,
    connected: Vec<ProxyHandle>,
    disconnected: Vec<ProxyHandle>,
}

impl ProxyPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn list(&self, set: ProxySet) -> &Vec<ProxyHandle> {
        match set {
            ProxySet::Connecting => &self.connecting,
            ProxySet::Connected => &self.connected,
            ProxySet::Disconnected => &self.disconnected,
        }
    }

    fn list_mut(&mut self, set: ProxySet) -> &mut Vec<ProxyHandle> {
        match set {
            ProxySet::Connecting => &mut self.connecting,
            ProxySet::Connected => &mut self.connected,
            ProxySet::Disconnected => &mut self.disconnected,
        }
    }

    /// Inserts a handle into `set`, evicting any handle with the same
    /// address from every set first.
    pub fn insert(&mut self, set: ProxySet, handle: ProxyHandle) {
        let address = handle.address.clone();
        for s in [ProxySet::Connecting, ProxySet::Connected, ProxySet::Disconnected] {
            self.list_mut(s).retain(|h| h.address != address);
        }
        self.list_mut(set).push(handle);
    }

    /// Moves the handle for `address` from `from` to `to`.
    ///
    /// Returns `false` when `from` holds no such handle. Any stale entry
    /// already sitting in `to` under the same address is replaced.
    pub fn transfer(&mut self, from: ProxySet, to: ProxySet, address: &str) -> bool {
        let from_list = self.list_mut(from);
        let Some(pos) = from_list.iter().position(|h| h.address == address) else {
            return false;
        };
        let handle = from_list.remove(pos);
        let to_list = self.list_mut(to);
        to_list.retain(|h| h.address != address);
        to_list.push(handle);
        true
    }

    /// Removes and returns the handle for `address` from `set`, dropping
    /// its membership entirely.
    pub fn remove_from(&mut self, set: ProxySet, address: &str) -> Option<ProxyHandle> {
        let list = self.list_mut(set);
        let pos = list.iter().position(|h| h.address == address)?;
        Some(list.remove(pos))
    }

    pub fn get_mut(&mut self, set: ProxySet, address: &str) -> Option<&mut ProxyHandle> {
        self.list_mut(set).iter_mut().find(|h| h.address == address)
    }

    pub fn set(&self, set: ProxySet) -> &[ProxyHandle] {
        self.list(set)
    }

    pub fn snapshot(&self, set: ProxySet) -> Vec<ProxyHandle> {
        self.list(set).to_vec()
    }

    pub fn contains(&self, set: ProxySet, address: &str) -> bool {
        self.list(set).iter().any(|h| h.address == address)
    }

    pub fn addresses(&self, set: ProxySet) -> Vec<String> {
        self.list(set).iter().map(|h| h.address.clone()).collect()
    }

    /// The set currently holding `address`, if any.
    pub fn set_of(&self, address: &str) -> Option<ProxySet> {
        for s in [ProxySet::Connecting, ProxySet::Connected, ProxySet::Disconnected] {
            if self.contains(s, address) {
                return Some(s);
            }
        }
        None
    }
}
