//! At-most-one computation per cache key.

use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::behavior::Value;

/// A cache cell that is filled by exactly one successful computation.
///
/// Concurrent callers that find the cell empty collapse onto a single
/// computation and are all served its value. A failed or cancelled
/// computation leaves the cell empty, so the next caller retries.
pub(crate) struct ComputeSlot {
    cell: OnceCell<Value>,
    /// Serializes synchronous computations; async callers use the cell's
    /// own cancel-safe initialization.
    gate: Mutex<()>,
}

impl ComputeSlot {
    pub(crate) fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            gate: Mutex::new(()),
        }
    }

    pub(crate) fn get(&self) -> Option<Value> {
        self.cell.get().cloned()
    }

    /// Returns the stored value, computing it if needed.
    ///
    /// The boolean is `true` when this call performed the computation.
    pub(crate) fn get_or_compute<E>(
        &self,
        compute: impl FnOnce() -> Result<Value, E>,
    ) -> Result<(Value, bool), E> {
        if let Some(value) = self.get() {
            return Ok((value, false));
        }

        let _gate = self.gate.lock();
        if let Some(value) = self.get() {
            return Ok((value, false));
        }

        let value = compute()?;
        match self.cell.set(value.clone()) {
            Ok(()) => Ok((value, true)),
            // An async caller filled the cell first; its value wins.
            Err(_) => Ok((self.get().unwrap_or(value), false)),
        }
    }

    /// Async counterpart of [`ComputeSlot::get_or_compute`].
    ///
    /// Dropping the returned future mid-computation releases the cell for
    /// the next caller.
    pub(crate) async fn get_or_compute_async<E, F, Fut>(
        &self,
        compute: F,
    ) -> Result<(Value, bool), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        let mut computed = false;
        let value = self
            .cell
            .get_or_try_init(|| {
                computed = true;
                compute()
            })
            .await?
            .clone();
        Ok((value, computed))
    }
}
