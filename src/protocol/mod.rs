//! Wire protocol: message shapes (§6) and their JSON/MessagePack encodings.

pub mod codec;
pub mod message;

pub use codec::{decode_binary, decode_json, encode_binary, encode_json, PROTOCOL_VERSION};
pub use message::{
    ClientAskForDiff, ClientInitialize, ClientOperation, Envelope, ServerDiff, ServerDiffResponse,
    ServerInitializationResponse, ServerOperationResponse,
};
