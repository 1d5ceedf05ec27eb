use std::time::Duration;

use crate::pool::{ProxyHandle, ProxyPool, ProxySet};

/// Latency-bounded round-robin selection over the connected set.
///
/// Routers whose last heartbeat latency is within `local_threshold` of the
/// fastest connected router are candidates; the round-robin cursor walks
/// the candidate list. When every candidate is filtered out (all stale or
/// dropped mid-heartbeat) the first connected handle is returned anyway,
/// tolerating transient staleness over failing the operation.
pub(crate) fn pick_proxy(
    pool: &ProxyPool,
    index: &mut usize,
    local_threshold: Duration,
) -> Option<ProxyHandle> {
    let connected = pool.set(ProxySet::Connected);
    let min_latency = connected.iter().map(|p| p.latency_ms()).min()?;
    let threshold_ms = local_threshold.as_millis() as u64;

    let candidates: Vec<&ProxyHandle> = connected
        .iter()
        .filter(|p| p.latency_ms() <= min_latency + threshold_ms && p.is_connected())
        .collect();

    if candidates.is_empty() {
        return connected.first().cloned();
    }

    let picked = candidates[*index % candidates.len()].clone();
    *index = (*index + 1) % candidates.len();
    Some(picked)
}
