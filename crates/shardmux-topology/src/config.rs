use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::buffer::DisconnectBuffer;
use crate::cursor::CursorFactory;

/// Topology configuration.
#[derive(Clone)]
pub struct TopologyConfig {
    /// Period of the health-monitor loop
    ///
    /// Default: 10 seconds
    pub ha_interval: Duration,
    /// Latency window above the fastest router within which a router is
    /// still eligible for selection
    ///
    /// Default: 15ms
    pub local_threshold: Duration,
    /// Deadline for a single liveness probe
    ///
    /// Default: 2 seconds
    pub probe_timeout: Duration,
    /// Delay step between consecutive endpoint connect attempts, avoiding
    /// a connection storm on constrained hosts
    ///
    /// Default: 1ms per seed index
    pub connect_stagger: Duration,
    /// Emit `PickedServer` diagnostics from selection
    pub debug: bool,
    /// Cursor factory applied when a call does not override it
    pub cursor_factory: Option<Arc<dyn CursorFactory>>,
    /// Buffer for operations issued while no router is connected
    pub disconnect_buffer: Option<Arc<DisconnectBuffer>>,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            ha_interval: Duration::from_millis(10_000),
            local_threshold: Duration::from_millis(15),
            probe_timeout: Duration::from_millis(2_000),
            connect_stagger: Duration::from_millis(1),
            debug: false,
            cursor_factory: None,
            disconnect_buffer: None,
        }
    }
}

impl TopologyConfig {
    pub fn with_ha_interval(mut self, interval: Duration) -> Self {
        self.ha_interval = interval;
        self
    }

    pub fn with_local_threshold(mut self, threshold: Duration) -> Self {
        self.local_threshold = threshold;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_connect_stagger(mut self, stagger: Duration) -> Self {
        self.connect_stagger = stagger;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_cursor_factory(mut self, factory: Arc<dyn CursorFactory>) -> Self {
        self.cursor_factory = Some(factory);
        self
    }

    pub fn with_disconnect_buffer(mut self, buffer: Arc<DisconnectBuffer>) -> Self {
        self.disconnect_buffer = Some(buffer);
        self
    }
}

impl fmt::Debug for TopologyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopologyConfig")
            .field("ha_interval", &self.ha_interval)
            .field("local_threshold", &self.local_threshold)
            .field("probe_timeout", &self.probe_timeout)
            .field("connect_stagger", &self.connect_stagger)
            .field("debug", &self.debug)
            .field("cursor_factory", &self.cursor_factory.is_some())
            .field("disconnect_buffer", &self.disconnect_buffer.is_some())
            .finish()
    }
}
