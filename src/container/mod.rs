//! Positional sequence containers
//!
//! [`BlockedArray`] is the only container implementation: a square-root
//! decomposition that keeps positional insert/delete close to O(sqrt(N))
//! at the multi-million-element scale the synchronization engine targets.

mod blocked_array;

pub use blocked_array::BlockedArray;
