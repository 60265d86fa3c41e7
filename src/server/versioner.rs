//! The server's OT core: version counter, bounded history, the transform
//! table, and the `ProcessOperation` reconciliation protocol.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::operation::Operation;
use crate::state::State;

/// Result of reconciling a client's optimistic operation against history.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// Whether the client must revert its local optimistic application.
    pub rollback: bool,
    /// When `rollback` is true, the ordered ops the client must apply in
    /// its place (including the transformed op itself).
    pub diff: Option<Vec<Operation>>,
}

struct Inner {
    history: VecDeque<Operation>,
    min_version: u64,
}

impl Inner {
    fn current_version(&self) -> u64 {
        self.min_version + self.history.len() as u64
    }
}

/// Owns the authoritative [`State`], the bounded operation history, and
/// the monotonic version counter. Lock order is Versioner → State: this
/// type's internal lock is always acquired before any `State` lock it
/// goes on to take.
pub struct Versioner {
    state: Arc<State>,
    inner: RwLock<Inner>,
    max_history_size: usize,
}

impl Versioner {
    /// Create a new Versioner over `state`, retaining at most
    /// `max_history_size` history entries.
    pub fn new(state: Arc<State>, max_history_size: usize) -> Self {
        Self {
            state,
            inner: RwLock::new(Inner {
                history: VecDeque::new(),
                min_version: 0,
            }),
            max_history_size,
        }
    }

    /// Current version and a fresh snapshot of the sequence.
    pub async fn get_current_state(&self) -> (u64, Vec<i32>) {
        let version = { self.inner.read().await.current_version() };
        let snapshot = self.state.copy().await;
        (version, snapshot)
    }

    /// Operations committed since `v` (exclusive), i.e. `H[v - min_version..]`.
    pub async fn get_operations_since(&self, v: i64) -> Result<Vec<Operation>> {
        let guard = self.inner.read().await;
        Self::operations_since_locked(&guard, v)
    }

    fn operations_since_locked(guard: &Inner, v: i64) -> Result<Vec<Operation>> {
        if v < 0 {
            return Err(Error::InvalidVersion(v));
        }
        let v = v as u64;
        if v < guard.min_version {
            return Err(Error::StaleVersion {
                requested: v,
                min_version: guard.min_version,
            });
        }
        let current = guard.current_version();
        if v > current {
            return Err(Error::InvalidVersion(v as i64));
        }
        if v == current {
            return Ok(Vec::new());
        }
        let start = (v - guard.min_version) as usize;
        Ok(guard.history.iter().skip(start).cloned().collect())
    }

    /// Reconcile a client's `(clientVersion, op)` against history, apply
    /// the transformed op, and report whether the client must roll back.
    pub async fn process_operation(
        &self,
        client_version: i64,
        op: Operation,
    ) -> Result<ProcessResult> {
        let mut guard = self.inner.write().await;

        let since = Self::operations_since_locked(&guard, client_version)?;

        // Deep-copy before mutating: the caller may still hold its own
        // reference to `op` for rollback bookkeeping.
        let mut transformed = op.deep_copy();
        let size = self.state.size().await;
        let mut mutated = false;
        for committed in &since {
            mutated |= transform(&mut transformed, committed, size);
        }
        if mutated {
            debug!("client op transformed against {} committed ops", since.len());
        }

        self.state.perform(&transformed).await?;

        guard.history.push_back(transformed.clone());
        if guard.history.len() > self.max_history_size {
            guard.history.pop_front();
            guard.min_version += 1;
        }

        if since.is_empty() {
            Ok(ProcessResult {
                rollback: false,
                diff: None,
            })
        } else {
            let mut diff = since;
            diff.push(transformed);
            warn!(
                "rollback required: client was {} ops behind",
                diff.len() - 1
            );
            Ok(ProcessResult {
                rollback: true,
                diff: Some(diff),
            })
        }
    }

    /// Oldest version still retained in history.
    pub async fn min_version(&self) -> u64 {
        self.inner.read().await.min_version
    }

    /// Current version (`min_version + history length`).
    pub async fn current_version(&self) -> u64 {
        self.inner.read().await.current_version()
    }
}

/// Transform `transformable` in place against `committed`, recursing
/// through `Batch` on either side. Returns whether anything changed.
fn transform(transformable: &mut Operation, committed: &Operation, size: usize) -> bool {
    match committed {
        Operation::Batch { ops } => {
            let mut mutated = false;
            for c in ops {
                mutated |= transform(transformable, c, size);
            }
            mutated
        }
        Operation::Update { .. } => false,
        Operation::Insert { pos: q, .. } => shift(transformable, *q, true, size),
        Operation::Delete { pos: q, .. } => shift(transformable, *q, false, size),
    }
}

/// Shift `transformable`'s position if it is at or after `q`, in the
/// direction `forward` dictates, clamped to the valid range for its kind.
fn shift(transformable: &mut Operation, q: usize, forward: bool, size: usize) -> bool {
    match transformable {
        Operation::Batch { ops } => {
            let mut mutated = false;
            for t in ops.iter_mut() {
                mutated |= shift(t, q, forward, size);
            }
            mutated
        }
        Operation::Insert { pos, .. } => apply_shift(pos, q, forward, size),
        Operation::Update { pos, .. } | Operation::Delete { pos, .. } => {
            apply_shift(pos, q, forward, size.saturating_sub(1))
        }
    }
}

fn apply_shift(pos: &mut usize, q: usize, forward: bool, max_valid: usize) -> bool {
    if *pos < q {
        return false;
    }
    let shifted = if forward {
        pos.saturating_add(1)
    } else {
        pos.saturating_sub(1)
    };
    let new_pos = shifted.min(max_valid);
    if new_pos == *pos {
        false
    } else {
        *pos = new_pos;
        true
    }
}
