//! Wire message types for the client/server protocol (§6).
//!
//! `Envelope` is the single tagged union actually carried over `transport`
//! and exercised by `protocol::codec`; the individual per-direction structs
//! exist so each message's fields are named rather than tupled.

use serde::{Deserialize, Serialize};

use crate::operation::Operation;

/// C→S: request the current snapshot and version. No fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ClientInitialize;

/// S→C: reply to `ClientInitialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInitializationResponse {
    pub version: u64,
    pub array: Vec<i32>,
}

/// C→S: ask for everything committed since `version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAskForDiff {
    pub version: i64,
}

/// S→C: reply to `ClientAskForDiff`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDiffResponse {
    pub diff: Vec<Operation>,
}

/// C→S: submit a locally-applied operation at a known base version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientOperation {
    pub version: i64,
    pub operation: Operation,
}

/// S→C: reply to `ClientOperation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerOperationResponse {
    pub rollback: bool,
    pub diff: Option<Vec<Operation>>,
}

/// S→C: unsolicited periodic push of newly committed operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDiff {
    pub version: u64,
    pub diff: Vec<Operation>,
}

/// Every message shape the protocol defines, for codecs and transports
/// that need a single wire type to frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Envelope {
    ClientInitialize(ClientInitialize),
    ServerInitializationResponse(ServerInitializationResponse),
    ClientAskForDiff(ClientAskForDiff),
    ServerDiffResponse(ServerDiffResponse),
    ClientOperation(ClientOperation),
    ServerOperationResponse(ServerOperationResponse),
    ServerDiff(ServerDiff),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_variants_are_distinguishable_by_tag() {
        let a = Envelope::ClientInitialize(ClientInitialize);
        let b = Envelope::ClientAskForDiff(ClientAskForDiff { version: 3 });
        assert_ne!(
            serde_json::to_value(&a).unwrap()["kind"],
            serde_json::to_value(&b).unwrap()["kind"]
        );
    }
}
