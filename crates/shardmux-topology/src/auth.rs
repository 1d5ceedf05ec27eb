//! Auth coordinator: records an ordered log of credential handshakes,
//! fans them out to every connected router and replays the log onto
//! endpoints that join later. Auth and logout exclude each other through
//! a try-acquire guard; contention is reported, never queued.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use shardmux_core::{
    AuthAttempt, AuthMechanism, EndpointFailure, Result, RouterEndpoint, RouterError,
};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::buffer::PendingOp;
use crate::pool::ProxySet;
use crate::state::TopologyState;
use crate::topology::Topology;

impl Topology {
    /// Authenticates against every connected router.
    ///
    /// The attempt is recorded before the fan-out so endpoints joining
    /// mid-flight replay it in order. If any endpoint fails, the attempt is
    /// purged from the replay log and an aggregate
    /// [`AuthenticationFailed`](RouterError::AuthenticationFailed) error is
    /// returned. With no routers connected the attempt is recorded and the
    /// call succeeds (or is buffered, when a disconnect buffer exists).
    pub async fn auth(&self, mechanism: &str, db: &str, credentials: Value) -> Result<()> {
        let mechanism: AuthMechanism = mechanism.parse()?;

        if self.inner.authenticating.load(Ordering::SeqCst) {
            return Err(RouterError::OperationInProgress);
        }

        {
            let core = self.inner.core.lock().await;
            if core.state == TopologyState::Destroyed {
                return Err(RouterError::TopologyDestroyed);
            }
            // Enqueue in the same critical section as the destroyed check,
            // so a concurrent destroy either sees this op in the buffer or
            // has already failed the call above.
            if core.pool.set(ProxySet::Connected).is_empty() {
                if let Some(buffer) = &self.inner.config.disconnect_buffer {
                    let (done, rx) = oneshot::channel();
                    buffer.enqueue(PendingOp::Auth {
                        mechanism,
                        db: db.to_string(),
                        credentials,
                        done,
                    });
                    debug!(db, %mechanism, "auth buffered while disconnected");
                    drop(core);
                    return match rx.await {
                        Ok(result) => result,
                        Err(_) => Err(RouterError::TopologyDestroyed),
                    };
                }
            }
        }

        self.apply_auth(mechanism, db, credentials).await
    }

    /// The fan-out half of [`auth`](Self::auth): records the attempt and
    /// applies it to every connected non-arbiter router. Also the entry
    /// point for buffered-auth replay, which must not re-buffer.
    pub(crate) async fn apply_auth(
        &self,
        mechanism: AuthMechanism,
        db: &str,
        credentials: Value,
    ) -> Result<()> {
        self.inner
            .authenticating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| RouterError::OperationInProgress)?;

        let (attempt_index, targets) = {
            let mut core = self.inner.core.lock().await;
            core.auth_contexts.push(AuthAttempt::new(
                mechanism,
                db,
                credentials.clone(),
            ));
            let targets: Vec<(String, Arc<dyn RouterEndpoint>)> = core
                .pool
                .set(ProxySet::Connected)
                .iter()
                .filter(|p| !p.identity().is_some_and(|i| i.arbiter_only))
                .filter_map(|p| {
                    p.endpoint()
                        .cloned()
                        .map(|e| (p.address().to_string(), e))
                })
                .collect();
            (core.auth_contexts.len() - 1, targets)
        };

        if targets.is_empty() {
            // Nothing to authenticate right now; the recorded attempt will
            // replay onto routers as they join.
            self.inner.authenticating.store(false, Ordering::SeqCst);
            return Ok(());
        }

        let db_owned = db.to_string();
        let attempts = targets.into_iter().map(|(address, endpoint)| {
            let credentials = credentials.clone();
            let db = db_owned.clone();
            async move {
                endpoint
                    .auth(mechanism, &db, credentials)
                    .await
                    .map_err(|error| EndpointFailure {
                        address,
                        message: error.to_string(),
                    })
            }
        });
        let failures: Vec<EndpointFailure> = join_all(attempts)
            .await
            .into_iter()
            .filter_map(|r| r.err())
            .collect();

        let outcome = if failures.is_empty() {
            Ok(())
        } else {
            // A partially applied credential must not replay onto future
            // joins; purge it from the log.
            let mut core = self.inner.core.lock().await;
            if attempt_index < core.auth_contexts.len() {
                core.auth_contexts.remove(attempt_index);
            }
            warn!(db, failed = failures.len(), "authentication failed");
            Err(RouterError::AuthenticationFailed(failures))
        };

        self.inner.authenticating.store(false, Ordering::SeqCst);
        outcome
    }

    /// Logs `db` out on every connected router.
    ///
    /// Recorded auth attempts for `db` are dropped first so they are never
    /// replayed onto joining endpoints after the logout.
    pub async fn logout(&self, db: &str) -> Result<()> {
        self.inner
            .authenticating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| RouterError::OperationInProgress)?;

        let targets: Vec<(String, Arc<dyn RouterEndpoint>)> = {
            let mut core = self.inner.core.lock().await;
            core.auth_contexts.retain(|attempt| attempt.db != db);
            core.pool
                .set(ProxySet::Connected)
                .iter()
                .filter_map(|p| {
                    p.endpoint()
                        .cloned()
                        .map(|e| (p.address().to_string(), e))
                })
                .collect()
        };

        let db_owned = db.to_string();
        let attempts = targets.into_iter().map(|(address, endpoint)| {
            let db = db_owned.clone();
            async move {
                endpoint.logout(&db).await.map_err(|error| EndpointFailure {
                    address,
                    message: error.to_string(),
                })
            }
        });
        let failures: Vec<EndpointFailure> = join_all(attempts)
            .await
            .into_iter()
            .filter_map(|r| r.err())
            .collect();

        self.inner.authenticating.store(false, Ordering::SeqCst);

        if failures.is_empty() {
            Ok(())
        } else {
            warn!(db, failed = failures.len(), "logout failed");
            Err(RouterError::LogoutFailed {
                db: db.to_string(),
                failures,
            })
        }
    }

    /// Number of recorded auth attempts pending replay onto joining
    /// endpoints. Diagnostic.
    pub async fn auth_context_count(&self) -> usize {
        self.inner.core.lock().await.auth_contexts.len()
    }
}
