//! # otsync
//!
//! Real-time collaborative editing engine for a shared ordered sequence of
//! `i32`. A single authoritative server holds the canonical sequence; many
//! concurrent clients each maintain a local replica that they mutate
//! optimistically. Concurrent conflicting edits are reconciled by
//! operational transformation (OT) against a version history, so replicas
//! converge without any client needing to block before issuing local edits.
//!
//! ## Components
//!
//! - [`container`] — the blocked array backing the sequence.
//! - [`operation`] — the Insert/Update/Delete/Batch operation model.
//! - [`state`] — the locked container plus apply/invert.
//! - [`server::versioner`] — the OT core: history, transform, reconciliation.
//! - [`server::registry`] / [`server::broadcaster`] — server session layer.
//! - [`client::session`] — client-side optimistic apply/rollback/catch-up.
//! - [`protocol`] — wire message shapes and codecs.
//! - [`transport`] — the seam a real transport implements.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use otsync::{ClientSession, InProcess, Operation, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> otsync::Result<()> {
//!     let server = Server::new(ServerConfig::default(), vec![1, 2, 3]);
//!     let client = ClientSession::new(
//!         std::sync::Arc::new(InProcess::new(server)),
//!         ServerConfig::default().container_block_count,
//!     );
//!     client.initialize().await?;
//!     client.modify(Operation::Update { pos: 0, value: 99, prev: 1 }).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub mod client;
pub mod config;
pub mod container;
pub mod error;
pub mod operation;
pub mod protocol;
pub mod server;
pub mod state;
pub mod transport;

pub use client::ClientSession;
pub use config::{ClientConfig, ServerConfig};
pub use container::BlockedArray;
pub use error::{Error, Result};
pub use operation::Operation;
pub use server::Server;
pub use state::State;
pub use transport::{InProcess, ServerHandle};

/// Convenient single-import surface for applications embedding otsync.
pub mod prelude {
    pub use crate::client::ClientSession;
    pub use crate::config::{ClientConfig, ServerConfig};
    pub use crate::container::BlockedArray;
    pub use crate::error::{Error, Result};
    pub use crate::operation::Operation;
    pub use crate::protocol::{Envelope, ServerDiff};
    pub use crate::server::Server;
    pub use crate::state::State;
    pub use crate::transport::{InProcess, ServerHandle};
}

/// Crate version, re-exported for diagnostics and protocol handshakes.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
