//! Periodic diff broadcaster (§4.5).
//!
//! A background `tokio::task`, ticking on `broadcast_interval`, that ships
//! newly committed operations to every registered connection. It never
//! retries a failed send: a dropped broadcast is caught on the client's
//! next interaction via the version-gap check in `client::session`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::protocol::ServerDiff;
use crate::server::registry::ConnectionRegistry;
use crate::server::versioner::Versioner;

/// Owns the periodic tick loop. Dropping a `Broadcaster` does not stop
/// the task; call [`Broadcaster::shutdown`] for a clean stop.
pub struct Broadcaster {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl Broadcaster {
    /// Spawn the broadcaster loop, ticking every `interval`.
    pub fn spawn(
        versioner: Arc<Versioner>,
        registry: Arc<ConnectionRegistry>,
        interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let latest = Arc::new(Mutex::new(0u64));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        run_tick(&versioner, &registry, &latest).await;
                    }
                }
            }
        });

        Self { handle, cancel }
    }

    /// Signal the loop to stop at the next tick boundary, without waiting
    /// for the task to actually exit. Safe to call through a shared `&self`
    /// (e.g. from behind an `Arc<Server>` with other live owners), since it
    /// only clones and fires the `CancellationToken`, never touches the
    /// `JoinHandle`.
    pub fn signal_shutdown(&self) {
        self.cancel.cancel();
    }

    /// Signal shutdown and wait for the task to exit. Requires owning the
    /// `Broadcaster` outright, which is only possible once nothing else
    /// holds a reference to the `Server` it was spawned from.
    pub async fn shutdown(self) {
        self.signal_shutdown();
        let _ = self.handle.await;
    }
}

async fn run_tick(
    versioner: &Versioner,
    registry: &ConnectionRegistry,
    latest: &Mutex<u64>,
) {
    let mut latest_broadcast_version = latest.lock().await;

    let ops = match versioner
        .get_operations_since(*latest_broadcast_version as i64)
        .await
    {
        Ok(ops) => ops,
        Err(err) => {
            // A client fell behind minVersion between our last tick and
            // this one; there is no one to notify here, each connection
            // discovers staleness on its own next request.
            debug!(%err, "broadcaster could not compute tick diff");
            return;
        }
    };

    if ops.is_empty() {
        return;
    }

    let diff = ServerDiff {
        version: *latest_broadcast_version,
        diff: ops,
    };
    let advance = diff.diff.len() as u64;

    registry.broadcast(&diff);
    *latest_broadcast_version += advance;
}
