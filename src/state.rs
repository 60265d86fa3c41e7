//! State: a [`BlockedArray<i32>`] behind a single reader/writer lock.
//!
//! Every mutating public method acquires the write guard exactly once,
//! which is what lets `perform_many` and `rollback_and_perform_many` give
//! readers an all-or-nothing view of a multi-step mutation.

use tokio::sync::RwLock;

use crate::container::BlockedArray;
use crate::error::Result;
use crate::operation::Operation;

/// Sequence state shared between the Versioner (server) and a client's
/// local replica.
pub struct State {
    inner: RwLock<Inner>,
}

struct Inner {
    container: BlockedArray<i32>,
    last_op: Option<Operation>,
}

impl State {
    /// Build state from an initial array, using `block_count` blocks.
    pub fn new(array: Vec<i32>, block_count: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                container: BlockedArray::new(array, block_count),
                last_op: None,
            }),
        }
    }

    /// Apply `op` under exclusive access, recording it as the last op.
    pub async fn perform(&self, op: &Operation) -> Result<()> {
        let mut guard = self.inner.write().await;
        op.apply_to_container(&mut guard.container)?;
        guard.last_op = Some(op.deep_copy());
        Ok(())
    }

    /// Apply `ops[offset..]` under a single exclusive acquisition. Returns
    /// the first error encountered, leaving prior ops in that call applied.
    pub async fn perform_many(&self, ops: &[Operation], offset: usize) -> Result<()> {
        let mut guard = self.inner.write().await;
        for op in &ops[offset..] {
            op.apply_to_container(&mut guard.container)?;
            guard.last_op = Some(op.deep_copy());
        }
        Ok(())
    }

    /// Invert `rollback_op`, then apply each of `ops` in order, all under
    /// one exclusive acquisition — so readers observe either the
    /// pre-rollback or the fully-applied post state, never in between.
    pub async fn rollback_and_perform_many(
        &self,
        rollback_op: &Operation,
        ops: &[Operation],
    ) -> Result<()> {
        let mut guard = self.inner.write().await;
        let inverse = rollback_op.invert();
        inverse.apply_to_container(&mut guard.container)?;
        for op in ops {
            op.apply_to_container(&mut guard.container)?;
        }
        guard.last_op = ops.last().cloned().or(Some(inverse));
        Ok(())
    }

    /// Shared-access read of the element at `pos`.
    pub async fn get(&self, pos: usize) -> Result<i32> {
        self.inner.read().await.container.get(pos)
    }

    /// Shared-access size. O(1).
    pub async fn size(&self) -> usize {
        self.inner.read().await.container.size()
    }

    /// Shared-access detached snapshot of the whole sequence.
    pub async fn copy(&self) -> Vec<i32> {
        self.inner.read().await.container.get_all()
    }

    /// Exclusive re-initialization of the container.
    pub async fn set(&self, array: Vec<i32>, block_count: usize) {
        let mut guard = self.inner.write().await;
        guard.container.set(array, block_count);
        guard.last_op = None;
    }

    /// The most recently applied (or rolled-back-to) operation, if any.
    pub async fn last_op(&self) -> Option<Operation> {
        self.inner.read().await.last_op.clone()
    }

    /// Convenience single-element insert, going through `perform` so it
    /// participates in the same locking discipline as everything else.
    pub async fn insert(&self, pos: usize, value: i32) -> Result<()> {
        self.perform(&Operation::Insert { pos, value }).await
    }

    /// Convenience single-element update.
    pub async fn update(&self, pos: usize, value: i32) -> Result<()> {
        let prev = self.get(pos).await?;
        self.perform(&Operation::Update { pos, value, prev }).await
    }

    /// Convenience single-element delete, returning the removed value.
    pub async fn delete(&self, pos: usize) -> Result<i32> {
        let prev = self.get(pos).await?;
        self.perform(&Operation::Delete { pos, prev }).await?;
        Ok(prev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_perform_many_applies_in_order() {
        let state = State::new(vec![1, 2, 3], 4);
        let ops = vec![
            Operation::Insert { pos: 0, value: 100 },
            Operation::Delete { pos: 3, prev: 2 },
        ];
        state.perform_many(&ops, 0).await.unwrap();
        assert_eq!(state.copy().await, vec![100, 1, 3]);
    }

    #[tokio::test]
    async fn test_perform_many_respects_offset() {
        let state = State::new(vec![1, 2, 3], 4);
        let ops = vec![
            Operation::Insert { pos: 0, value: 999 },
            Operation::Insert { pos: 0, value: 100 },
        ];
        state.perform_many(&ops, 1).await.unwrap();
        assert_eq!(state.copy().await, vec![100, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_rollback_and_perform_many() {
        let state = State::new(vec![1, 2, 3], 4);
        // Client optimistically inserted 99 at pos 1.
        state.insert(1, 99).await.unwrap();
        assert_eq!(state.copy().await, vec![1, 99, 2, 3]);

        let rollback_op = Operation::Insert { pos: 1, value: 99 };
        let diff = vec![
            Operation::Insert { pos: 2, value: 99 }, // transformed
        ];
        state
            .rollback_and_perform_many(&rollback_op, &diff)
            .await
            .unwrap();
        assert_eq!(state.copy().await, vec![1, 2, 99, 3]);
    }

    #[tokio::test]
    async fn test_get_size_copy() {
        let state = State::new(vec![1, 2, 3], 4);
        assert_eq!(state.size().await, 3);
        assert_eq!(state.get(1).await.unwrap(), 2);
        assert!(state.get(3).await.is_err());
        assert_eq!(state.copy().await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_set_reinitializes() {
        let state = State::new(vec![1, 2, 3], 4);
        state.set(vec![9, 8, 7], 2).await;
        assert_eq!(state.copy().await, vec![9, 8, 7]);
    }
}
