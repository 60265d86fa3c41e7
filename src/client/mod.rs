//! Client-side session layer (§4.6).

pub mod session;

pub use session::ClientSession;
