//! The transport boundary.
//!
//! A real deployment needs only a bidirectional message channel with
//! request/response correlation for C→S messages and one-way push for
//! S→C broadcasts. [`ServerHandle`] is that seam as a Rust trait: a real
//! deployment implements it over a WebSocket or gRPC stream using
//! `protocol::codec` to (de)serialize [`Envelope`](crate::protocol::Envelope)
//! frames. This module's [`InProcess`] implements it with direct async
//! calls — a call shim with zero network hop, standing in for an out of
//! process transport so the rest of the engine can be exercised
//! end-to-end.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::operation::Operation;
use crate::protocol::{ServerDiff, ServerDiffResponse, ServerInitializationResponse, ServerOperationResponse};
use crate::server::{ConnectionHandle, Server};

/// Everything a client needs from the server, independent of how the
/// bytes actually travel.
#[async_trait]
pub trait ServerHandle: Send + Sync {
    /// `ClientInitialize` → `ServerInitializationResponse`.
    async fn client_initialize(&self) -> Result<ServerInitializationResponse>;

    /// `ClientAskForDiff{v}` → `ServerDiffResponse`.
    async fn ask_for_diff(&self, version: i64) -> Result<ServerDiffResponse>;

    /// `ClientOperation{v, op}` → `ServerOperationResponse`.
    async fn client_operation(&self, version: i64, op: Operation) -> Result<ServerOperationResponse>;

    /// Register a push channel and obtain a connection handle.
    async fn connect(&self, push: mpsc::UnboundedSender<ServerDiff>) -> ConnectionHandle;

    /// Unregister a previously obtained connection handle.
    async fn disconnect(&self, handle: ConnectionHandle);
}

/// In-process call shim: a `ServerHandle` backed directly by an
/// [`Arc<Server>`] with no intervening (de)serialization or network I/O.
#[derive(Clone)]
pub struct InProcess {
    server: Arc<Server>,
}

impl InProcess {
    pub fn new(server: Arc<Server>) -> Self {
        Self { server }
    }
}

#[async_trait]
impl ServerHandle for InProcess {
    async fn client_initialize(&self) -> Result<ServerInitializationResponse> {
        self.server.client_initialize().await
    }

    async fn ask_for_diff(&self, version: i64) -> Result<ServerDiffResponse> {
        self.server.ask_for_diff(version).await
    }

    async fn client_operation(&self, version: i64, op: Operation) -> Result<ServerOperationResponse> {
        self.server.client_operation(version, op).await
    }

    async fn connect(&self, push: mpsc::UnboundedSender<ServerDiff>) -> ConnectionHandle {
        self.server.connect(push).await
    }

    async fn disconnect(&self, handle: ConnectionHandle) {
        self.server.disconnect(handle).await
    }
}
