//! One cancellable handle over both host task representations.

use std::sync::Arc;
use tracing::trace;

use crate::host::{ExecutionState, LegacyTask, RegionTask};

/// Handle returned by delayed and repeating scheduling calls.
///
/// Dropping a handle never cancels the task.
#[derive(Clone)]
pub enum ScheduledTaskHandle {
    /// Task owned by the legacy single-thread scheduler.
    Legacy(Arc<dyn LegacyTask>),
    /// Task owned by a region-aware scheduler.
    Region(Arc<dyn RegionTask>),
    /// No underlying task, e.g. the target entity was already retired.
    Inert,
}

impl ScheduledTaskHandle {
    /// Cancels the task.
    ///
    /// Idempotent. A no-op on completed, cancelled or inert handles.
    pub fn cancel(&self) {
        match self {
            ScheduledTaskHandle::Legacy(task) => {
                if !task.is_cancelled() {
                    task.cancel();
                }
            }
            ScheduledTaskHandle::Region(task) => match task.cancel() {
                Ok(outcome) => trace!(?outcome, "region task cancel"),
                Err(e) => trace!("region task cancel failed: {}", e),
            },
            ScheduledTaskHandle::Inert => {}
        }
    }

    /// Whether the task has been cancelled. Inert handles count as cancelled.
    pub fn is_cancelled(&self) -> bool {
        match self {
            ScheduledTaskHandle::Legacy(task) => task.is_cancelled(),
            ScheduledTaskHandle::Region(task) => matches!(
                task.execution_state(),
                Ok(ExecutionState::Cancelled | ExecutionState::CancelledRunning)
            ),
            ScheduledTaskHandle::Inert => true,
        }
    }

    /// Whether there is an underlying task at all.
    pub fn is_valid(&self) -> bool {
        !matches!(self, ScheduledTaskHandle::Inert)
    }
}

impl std::fmt::Debug for ScheduledTaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduledTaskHandle::Legacy(task) => f
                .debug_struct("Legacy")
                .field("task_id", &task.task_id())
                .field("cancelled", &task.is_cancelled())
                .finish(),
            ScheduledTaskHandle::Region(task) => f
                .debug_struct("Region")
                .field("state", &task.execution_state())
                .field("repeating", &task.is_repeating())
                .finish(),
            ScheduledTaskHandle::Inert => f.write_str("Inert"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{CancelOutcome, HostError};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingLegacy {
        cancelled: AtomicBool,
        cancel_calls: AtomicUsize,
    }

    impl LegacyTask for CountingLegacy {
        fn task_id(&self) -> u64 {
            7
        }

        fn cancel(&self) {
            self.cancel_calls.fetch_add(1, Ordering::SeqCst);
            self.cancelled.store(true, Ordering::SeqCst);
        }

        fn is_cancelled(&self) -> bool {
            self.cancelled.load(Ordering::SeqCst)
        }
    }

    struct BrokenRegion;

    impl RegionTask for BrokenRegion {
        fn cancel(&self) -> Result<CancelOutcome, HostError> {
            Err(HostError::Internal("gone".into()))
        }

        fn execution_state(&self) -> Result<ExecutionState, HostError> {
            Err(HostError::Internal("gone".into()))
        }

        fn is_repeating(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_inert_handle() {
        let handle = ScheduledTaskHandle::Inert;
        assert!(!handle.is_valid());
        assert!(handle.is_cancelled());
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_legacy_cancel_is_idempotent() {
        let task = Arc::new(CountingLegacy::default());
        let handle = ScheduledTaskHandle::Legacy(task.clone());
        assert!(handle.is_valid());
        assert!(!handle.is_cancelled());

        handle.cancel();
        handle.cancel();

        assert!(handle.is_cancelled());
        assert_eq!(task.cancel_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_region_errors_are_swallowed() {
        let handle = ScheduledTaskHandle::Region(Arc::new(BrokenRegion));
        handle.cancel();
        assert!(handle.is_valid());
        assert!(!handle.is_cancelled());
    }
}
