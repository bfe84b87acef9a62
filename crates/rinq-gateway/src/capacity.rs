//! Capacity governor: per-connection and global counting semaphores
//! acquired global-then-local, released together, cancellable by a
//! per-call deadline or by the connection's own teardown.
//!
//! Grounded on `examples/original_source/src/websock/options.go`
//! (`golang.org/x/sync/semaphore.Weighted`), realized with
//! `tokio::sync::Semaphore`; the cancellation-racing idiom follows
//! `turbomcp-server::timeout::ToolTimeoutManager::execute_with_timeout_and_cancellation`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Holds both permits for the duration of a call; dropping it releases both
/// (local first, then global — order doesn't matter for correctness, only
/// that both release exactly once).
pub struct CapacityPermit {
    _local: OwnedSemaphorePermit,
    _global: OwnedSemaphorePermit,
}

/// Returned when the deadline elapses, or the connection is cancelled,
/// before both permits are acquired. No response is emitted for the call in
/// this case.
#[derive(Debug)]
pub struct CapacityTimedOut;

/// The per-connection half of the governor; holds a clone of the global
/// semaphore shared by every connection the same handler instance serves.
pub struct CapacityGovernor {
    local: Arc<Semaphore>,
    global: Arc<Semaphore>,
}

impl CapacityGovernor {
    pub fn new(per_connection: usize, global: Arc<Semaphore>) -> Self {
        CapacityGovernor {
            local: Arc::new(Semaphore::new(per_connection)),
            global,
        }
    }

    /// Acquire global, then local; release global if local acquisition
    /// fails. Races the combined acquisition against `deadline` and against
    /// `cancel`, so a connection torn down while a call is still queued on
    /// capacity doesn't hold its semaphore wait open until the deadline.
    pub async fn reserve(
        &self,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<CapacityPermit, CapacityTimedOut> {
        tokio::select! {
            result = tokio::time::timeout(deadline, self.reserve_uncancellable()) => {
                result.map_err(|_| CapacityTimedOut)
            }
            () = cancel.cancelled() => Err(CapacityTimedOut),
        }
    }

    async fn reserve_uncancellable(&self) -> CapacityPermit {
        let global = self
            .global
            .clone()
            .acquire_owned()
            .await
            .expect("capacity semaphore is never closed");

        let local = match self.local.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => unreachable!("capacity semaphore is never closed"),
        };

        CapacityPermit {
            _local: local,
            _global: global,
        }
    }
}
