//! Wire encoding for [`Envelope`](super::message::Envelope): JSON for the
//! demo CLI/logs, MessagePack for a compact on-the-wire form, mirroring the
//! teacher's `protocol::binary` split between human-readable and binary
//! encodings.

use crate::error::Result;
use crate::protocol::message::Envelope;

/// Protocol version. Bump when `Envelope`'s shape changes incompatibly.
pub const PROTOCOL_VERSION: u16 = 1;

/// Encode an envelope as JSON.
pub fn encode_json(envelope: &Envelope) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(envelope)?)
}

/// Decode an envelope from JSON.
pub fn decode_json(data: &[u8]) -> Result<Envelope> {
    Ok(serde_json::from_slice(data)?)
}

/// Encode an envelope as MessagePack.
pub fn encode_binary(envelope: &Envelope) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec(envelope)?)
}

/// Decode an envelope from MessagePack.
pub fn decode_binary(data: &[u8]) -> Result<Envelope> {
    Ok(rmp_serde::from_slice(data)?)
}
