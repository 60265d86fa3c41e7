//! Server-side session layer (§4.5): connection registry, periodic
//! broadcaster, and the request dispatch table.

pub mod broadcaster;
pub mod registry;
pub mod versioner;

pub use broadcaster::Broadcaster;
pub use registry::{ConnectionHandle, ConnectionRegistry};
pub use versioner::{ProcessResult, Versioner};

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::operation::Operation;
use crate::protocol::{ServerDiff, ServerDiffResponse, ServerInitializationResponse, ServerOperationResponse};
use crate::state::State;

/// The authoritative server: owns the canonical `State` (via `Versioner`),
/// the connection registry, and the broadcaster task.
pub struct Server {
    versioner: Arc<Versioner>,
    registry: Arc<ConnectionRegistry>,
    broadcaster: Broadcaster,
}

impl Server {
    /// Build a server seeded with `initial_array`, start its broadcaster,
    /// and return it ready to accept connections. Seeding the initial
    /// array is the caller's responsibility — initial seed generation is
    /// explicitly out of scope (§1).
    pub fn new(config: ServerConfig, initial_array: Vec<i32>) -> Arc<Self> {
        let state = Arc::new(State::new(initial_array, config.container_block_count));
        let versioner = Arc::new(Versioner::new(state, config.max_history_size));
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Broadcaster::spawn(
            versioner.clone(),
            registry.clone(),
            config.broadcast_interval(),
        );

        Arc::new(Self {
            versioner,
            registry,
            broadcaster,
        })
    }

    /// `ClientInitialize` → `ServerInitializationResponse`.
    pub async fn client_initialize(&self) -> Result<ServerInitializationResponse> {
        let (version, array) = self.versioner.get_current_state().await;
        Ok(ServerInitializationResponse { version, array })
    }

    /// `ClientAskForDiff{v}` → `ServerDiffResponse`.
    pub async fn ask_for_diff(&self, version: i64) -> Result<ServerDiffResponse> {
        let diff = self.versioner.get_operations_since(version).await?;
        Ok(ServerDiffResponse { diff })
    }

    /// `ClientOperation{v, op}` → `ServerOperationResponse`.
    ///
    /// `op` is deep-copied by `Versioner::process_operation` before being
    /// transformed (§4.2's critical deep-copy rule), so the caller's own
    /// copy remains untouched for its own rollback bookkeeping.
    pub async fn client_operation(
        &self,
        version: i64,
        op: Operation,
    ) -> Result<ServerOperationResponse> {
        debug!(client_version = version, "processing client operation");
        let result = self.versioner.process_operation(version, op).await?;
        Ok(ServerOperationResponse {
            rollback: result.rollback,
            diff: result.diff,
        })
    }

    /// Register a connection's push channel.
    pub async fn connect(&self, push: mpsc::UnboundedSender<ServerDiff>) -> ConnectionHandle {
        self.registry.on_connect(push)
    }

    /// Unregister a connection.
    pub async fn disconnect(&self, handle: ConnectionHandle) {
        self.registry.on_disconnect(handle);
    }

    /// Number of currently registered connections.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Signal the broadcaster to stop at its next tick boundary. Every
    /// `ClientSession` connected through `transport::InProcess` holds its
    /// own `Arc<Server>`, so this takes `&self` rather than requiring
    /// unique ownership of the `Arc` — it only fires the broadcaster's
    /// `CancellationToken`, which every clone of that `Arc` can reach.
    pub fn shutdown(&self) {
        self.broadcaster.signal_shutdown();
    }
}
