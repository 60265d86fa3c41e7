//! The operation model: `Insert` / `Update` / `Delete` / `Batch` over an
//! ordered sequence of `i32`, each variant carrying enough data to invert
//! itself without consulting external state.

use serde::{Deserialize, Serialize};

use crate::container::BlockedArray;
use crate::error::Result;
use crate::state::State;

/// A single edit to the shared sequence, or an ordered batch of edits.
///
/// `Update` and `Delete` carry `prev`, the value that occupied `pos`
/// immediately before the op was first applied locally. That makes every
/// operation self-inverting without the receiver needing to re-query the
/// sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Insert `value` so it lands at `pos`.
    Insert {
        /// Target position, in `[0, size]`.
        pos: usize,
        /// Value to insert.
        value: i32,
    },
    /// Overwrite the element at `pos` with `value`.
    Update {
        /// Target position, in `[0, size)`.
        pos: usize,
        /// New value.
        value: i32,
        /// Value that occupied `pos` immediately before this op was applied.
        prev: i32,
    },
    /// Remove the element at `pos`.
    Delete {
        /// Target position, in `[0, size)`.
        pos: usize,
        /// Value that occupied `pos` immediately before this op was applied.
        prev: i32,
    },
    /// An ordered composite of child operations.
    Batch {
        /// Child operations, applied (or inverted) in order (or reverse order).
        ops: Vec<Operation>,
    },
}

impl Operation {
    /// Apply this operation to `state` under a single exclusive acquisition
    /// (`State::perform`), regardless of whether `self` is a leaf op or a
    /// `Batch`.
    pub async fn apply(&self, state: &State) -> Result<()> {
        state.perform(self).await
    }

    /// Apply this operation directly to a raw container, recursing through
    /// `Batch` in order. Used by `State` while it already holds the
    /// container's write lock; never acquires a lock itself.
    pub(crate) fn apply_to_container(&self, container: &mut BlockedArray<i32>) -> Result<()> {
        match self {
            Operation::Insert { pos, value } => container.insert(*pos, *value),
            Operation::Update { pos, value, .. } => container.update(*pos, *value),
            Operation::Delete { pos, .. } => container.delete(*pos).map(|_| ()),
            Operation::Batch { ops } => {
                for op in ops {
                    op.apply_to_container(container)?;
                }
                Ok(())
            }
        }
    }

    /// Build the operation that undoes this one, given the state is in
    /// the post-application state (i.e. as if `self` was just applied).
    pub fn invert(&self) -> Operation {
        match self {
            Operation::Insert { pos, value } => Operation::Delete {
                pos: *pos,
                prev: *value,
            },
            Operation::Update { pos, value, prev } => Operation::Update {
                pos: *pos,
                value: *prev,
                prev: *value,
            },
            Operation::Delete { pos, prev } => Operation::Insert {
                pos: *pos,
                value: *prev,
            },
            Operation::Batch { ops } => Operation::Batch {
                ops: ops.iter().rev().map(Operation::invert).collect(),
            },
        }
    }

    /// Apply `invert()` of this operation to `state`.
    pub async fn apply_inverse(&self, state: &State) -> Result<()> {
        state.perform(&self.invert()).await
    }

    /// Wrap a flat list of operations into a `Batch`, used when replaying
    /// buffered offline edits as a single op (`§4.6` reinitialize/offline
    /// replay).
    pub fn batch(ops: Vec<Operation>) -> Operation {
        Operation::Batch { ops }
    }

    /// Deep copy. `Operation` owns all of its data (no shared references),
    /// so an ordinary `Clone` already satisfies the server's "deep-copy
    /// before transforming" rule from the OT core in `server::versioner`.
    pub fn deep_copy(&self) -> Operation {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::State;

    #[tokio::test]
    async fn test_insert_invert_restores_state() {
        let state = State::new(vec![1, 2, 3], 4);
        let op = Operation::Insert { pos: 1, value: 99 };

        op.apply(&state).await.unwrap();
        assert_eq!(state.copy().await, vec![1, 99, 2, 3]);

        op.apply_inverse(&state).await.unwrap();
        assert_eq!(state.copy().await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_update_invert_restores_state() {
        let state = State::new(vec![1, 2, 3], 4);
        let op = Operation::Update {
            pos: 1,
            value: 77,
            prev: 2,
        };

        op.apply(&state).await.unwrap();
        assert_eq!(state.copy().await, vec![1, 77, 3]);

        op.apply_inverse(&state).await.unwrap();
        assert_eq!(state.copy().await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_delete_invert_restores_state() {
        let state = State::new(vec![1, 2, 3], 4);
        let op = Operation::Delete { pos: 1, prev: 2 };

        op.apply(&state).await.unwrap();
        assert_eq!(state.copy().await, vec![1, 3]);

        op.apply_inverse(&state).await.unwrap();
        assert_eq!(state.copy().await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_batch_invert_is_reverse_order() {
        let state = State::new(vec![1, 2, 3], 4);
        let batch = Operation::batch(vec![
            Operation::Insert { pos: 0, value: 100 },
            Operation::Delete { pos: 3, prev: 2 },
        ]);

        batch.apply(&state).await.unwrap();
        assert_eq!(state.copy().await, vec![100, 1, 3]);

        batch.apply_inverse(&state).await.unwrap();
        assert_eq!(state.copy().await, vec![1, 2, 3]);
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let op = Operation::Insert { pos: 0, value: 1 };
        let mut copy = op.deep_copy();
        if let Operation::Insert { pos, .. } = &mut copy {
            *pos = 5;
        }
        assert_eq!(op, Operation::Insert { pos: 0, value: 1 });
    }
}
