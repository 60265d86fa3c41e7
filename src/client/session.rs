//! Client session (§4.6): one mutex-guarded record holding the replica,
//! the connection, the known server version, the in-flight-request guard,
//! and the offline operation buffer.

use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::operation::Operation;
use crate::protocol::ServerDiff;
use crate::server::ConnectionHandle;
use crate::state::State;
use crate::transport::ServerHandle;

struct Inner {
    state: State,
    conn: Option<ConnectionHandle>,
    version: i64,
    awaiting_response: bool,
    offline_ops: Vec<Operation>,
    listener: Option<JoinHandle<()>>,
}

/// A client's local replica plus everything needed to reconcile it
/// against the server: `modify`, the completion callback, the broadcast
/// handler, and the initialize/reinitialize procedure, all behind one
/// lock.
pub struct ClientSession<H: ServerHandle + 'static> {
    server: Arc<H>,
    block_count: usize,
    self_ref: Weak<Self>,
    inner: Mutex<Inner>,
}

impl<H: ServerHandle + 'static> ClientSession<H> {
    /// Construct an offline session (no server round trip yet). Call
    /// [`ClientSession::initialize`] to connect.
    pub fn new(server: Arc<H>, block_count: usize) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            server,
            block_count,
            self_ref: weak.clone(),
            inner: Mutex::new(Inner {
                state: State::new(Vec::new(), block_count),
                conn: None,
                version: 0,
                awaiting_response: false,
                offline_ops: Vec::new(),
                listener: None,
            }),
        })
    }

    /// Reconstruct the `Arc` that owns this session, for moving a
    /// reference into a spawned task.
    fn arc(&self) -> Arc<Self> {
        self.self_ref
            .upgrade()
            .expect("ClientSession is always held behind its own Arc")
    }

    /// A detached snapshot of the local replica.
    pub async fn snapshot(&self) -> Vec<i32> {
        self.inner.lock().await.state.copy().await
    }

    /// The client's last-known server version.
    pub async fn version(&self) -> i64 {
        self.inner.lock().await.version
    }

    /// Whether the session currently has a live connection.
    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.conn.is_some()
    }

    /// Locally-queued operations awaiting replay (non-empty only while
    /// offline).
    pub async fn offline_op_count(&self) -> usize {
        self.inner.lock().await.offline_ops.len()
    }

    /// Apply `op` locally. If connected, send it to the server
    /// optimistically; if offline, buffer it for replay on reconnect.
    pub async fn modify(&self, op: Operation) -> Result<()> {
        let mut guard = self.inner.lock().await;
        self.modify_locked(&mut guard, op).await
    }

    /// Core of `modify`, usable while the caller already holds the lock
    /// (`initialize`'s offline replay step does this to avoid re-locking).
    async fn modify_locked(&self, guard: &mut Inner, op: Operation) -> Result<()> {
        match guard.conn {
            None => {
                guard.state.perform(&op).await?;
                guard.offline_ops.push(op);
                Ok(())
            }
            Some(conn_snapshot) => {
                if guard.awaiting_response {
                    // Drop silently rather than queue a second in-flight op.
                    warn!("operation dropped: a response is already in flight");
                    return Ok(());
                }

                let v_snapshot = guard.version;
                guard.state.perform(&op).await?;
                guard.awaiting_response = true;

                let this = self.arc();
                let server = self.server.clone();
                let op_for_send = op.clone();
                tokio::spawn(async move {
                    let result = server.client_operation(v_snapshot, op_for_send.clone()).await;
                    this.complete(conn_snapshot, v_snapshot, op_for_send, result).await;
                });
                Ok(())
            }
        }
    }

    /// The completion callback for an in-flight `ClientOperation`.
    async fn complete(
        &self,
        conn_snapshot: ConnectionHandle,
        v_snapshot: i64,
        op: Operation,
        result: Result<crate::protocol::ServerOperationResponse>,
    ) {
        let mut guard = self.inner.lock().await;

        if guard.conn != Some(conn_snapshot) {
            debug!("dropping response: session was reinitialized mid-flight");
            return;
        }
        if guard.version != v_snapshot {
            debug!("dropping response: a broadcast already advanced past this op");
            guard.awaiting_response = false;
            return;
        }

        match result {
            Ok(response) => {
                let diff = response.diff.unwrap_or_default();
                let outcome = if !response.rollback {
                    guard.state.perform_many(&diff, 0).await
                } else {
                    guard.state.rollback_and_perform_many(&op, &diff).await
                };
                if let Err(err) = outcome {
                    error!(%err, "failed to reconcile operation response");
                } else if !response.rollback {
                    guard.version += diff.len() as i64 + 1;
                } else {
                    guard.version += diff.len() as i64;
                }
            }
            Err(err) => {
                warn!(%err, "server rejected operation");
            }
        }

        guard.awaiting_response = false;
    }

    /// Handler for an unsolicited `ServerDiff` push.
    async fn handle_server_diff(&self, msg: ServerDiff) {
        let mut guard = self.inner.lock().await;

        if guard.awaiting_response {
            debug!("dropping broadcast: in-flight response will supersede it");
            return;
        }

        let ServerDiff { version, mut diff } = msg;
        let mut base = version as i64;

        if guard.version >= base + diff.len() as i64 {
            debug!("already caught up with broadcast, dropping");
            return;
        }

        if base > guard.version {
            match self.server.ask_for_diff(guard.version).await {
                Ok(resp) => {
                    diff = resp.diff;
                    base = guard.version;
                }
                Err(err) => {
                    error!(%err, "failed to close broadcast gap via ask_for_diff");
                    return;
                }
            }
        }

        let offset = (guard.version - base).max(0) as usize;
        if offset > diff.len() {
            error!("broadcast offset beyond diff length; dropping to avoid panic");
            return;
        }

        if let Err(err) = guard.state.perform_many(&diff, offset).await {
            error!(%err, "failed to apply broadcast diff");
            return;
        }
        guard.version = base + diff.len() as i64;
    }

    /// Fetch the current snapshot, register with the server, and replay
    /// any buffered offline operations as a single batch.
    pub async fn initialize(&self) -> Result<()> {
        let init = self.server.client_initialize().await?;

        let mut guard = self.inner.lock().await;
        guard.state.set(init.array, self.block_count);
        guard.version = init.version as i64;
        guard.awaiting_response = false;

        let (tx, rx) = mpsc::unbounded_channel();
        let conn = self.server.connect(tx).await;
        guard.conn = Some(conn);

        let listener_owner = self.arc();
        guard.listener = Some(tokio::spawn(async move {
            listener_owner.listen(rx).await;
        }));

        info!(version = guard.version, "client initialized");

        let offline = std::mem::take(&mut guard.offline_ops);
        if !offline.is_empty() {
            let batch = Operation::batch(offline);
            self.modify_locked(&mut guard, batch).await?;
        }
        Ok(())
    }

    async fn listen(&self, mut rx: mpsc::UnboundedReceiver<ServerDiff>) {
        while let Some(msg) = rx.recv().await {
            self.handle_server_diff(msg).await;
        }
    }

    /// Disconnect, reset session state, and initialize again from a
    /// fresh snapshot.
    pub async fn reinitialize(&self) -> Result<()> {
        {
            let mut guard = self.inner.lock().await;
            if let Some(conn) = guard.conn.take() {
                self.server.disconnect(conn).await;
            }
            if let Some(listener) = guard.listener.take() {
                listener.abort();
            }
            guard.version = 0;
            guard.awaiting_response = false;
        }
        self.initialize().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::server::Server;
    use crate::transport::InProcess;

    fn session(server: Arc<Server>) -> Arc<ClientSession<InProcess>> {
        ClientSession::new(Arc::new(InProcess::new(server)), 4)
    }

    #[tokio::test]
    async fn test_initialize_fetches_snapshot() {
        let server = Server::new(ServerConfig::default(), vec![10, 20, 30]);
        let client = session(server);
        client.initialize().await.unwrap();
        assert_eq!(client.snapshot().await, vec![10, 20, 30]);
        assert_eq!(client.version().await, 0);
        assert!(client.is_connected().await);
    }

    #[tokio::test]
    async fn test_modify_while_offline_buffers_ops() {
        let server = Server::new(ServerConfig::default(), vec![1, 2, 3]);
        let client = session(server);
        client.modify(Operation::Insert { pos: 0, value: 99 }).await.unwrap();
        assert_eq!(client.snapshot().await, vec![99, 1, 2, 3]);
        assert_eq!(client.offline_op_count().await, 1);
        assert!(!client.is_connected().await);
    }

    #[tokio::test]
    async fn test_offline_replay_on_initialize() {
        let server = Server::new(ServerConfig::default(), vec![1, 2, 3]);
        let client = session(server.clone());
        client.modify(Operation::Insert { pos: 0, value: 99 }).await.unwrap();
        client.initialize().await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(client.offline_op_count().await, 0);
        assert_eq!(server.client_initialize().await.unwrap().array, vec![99, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_modify_online_updates_version_on_completion() {
        let server = Server::new(ServerConfig::default(), vec![1, 2, 3]);
        let client = session(server);
        client.initialize().await.unwrap();
        client.modify(Operation::Update { pos: 0, value: 77, prev: 1 }).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(client.version().await, 1);
        assert_eq!(client.snapshot().await, vec![77, 2, 3]);
    }

    #[tokio::test]
    async fn test_reinitialize_resets_version_and_reconnects() {
        let server = Server::new(ServerConfig::default(), vec![1, 2, 3]);
        let client = session(server);
        client.initialize().await.unwrap();
        client.reinitialize().await.unwrap();
        assert_eq!(client.version().await, 0);
        assert!(client.is_connected().await);
    }

    #[tokio::test]
    async fn test_handle_server_diff_closes_gap_via_ask_for_diff() {
        let server = Server::new(ServerConfig::default(), vec![1, 2, 3]);
        let client = session(server.clone());
        client.initialize().await.unwrap();

        // 17 ops committed directly against the server, simulating other
        // clients while this session's listener task sat idle.
        for i in 0..17 {
            server
                .client_operation(i, Operation::Update { pos: 0, value: i as i32, prev: 1 })
                .await
                .unwrap();
        }
        assert_eq!(client.version().await, 0);

        // A broadcast arrives covering only [13..17); base (13) is ahead
        // of this client's known version (0), so it must splice in the
        // missing [0..13) via ask_for_diff before applying anything.
        let tail = server.ask_for_diff(13).await.unwrap().diff;
        client
            .handle_server_diff(ServerDiff {
                version: 13,
                diff: tail,
            })
            .await;

        assert_eq!(client.version().await, 17);
        assert_eq!(
            client.snapshot().await,
            server.client_initialize().await.unwrap().array
        );
    }
}
