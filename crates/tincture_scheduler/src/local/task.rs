//! Task lifecycle shared by every local scheduler.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::host::{CancelOutcome, ExecutionState, HostError, LegacyTask, RegionTask};

// Transitions: IDLE -> RUNNING -> (IDLE | FINISHED), and any non-finished
// state -> CANCELLED. A repeating task cancelled mid-run passes through
// CANCELLED_RUNNING until the run ends.
const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const FINISHED: u8 = 2;
const CANCELLED: u8 = 3;
const CANCELLED_RUNNING: u8 = 4;

/// Atomic lifecycle of one scheduled task.
#[derive(Debug)]
pub(crate) struct TaskState {
    id: u64,
    repeating: bool,
    state: AtomicU8,
}

impl TaskState {
    /// A fresh task that has not run yet.
    pub(crate) fn new(id: u64, repeating: bool) -> Arc<Self> {
        Arc::new(Self {
            id,
            repeating,
            state: AtomicU8::new(IDLE),
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Claims the next run. False if the task was cancelled.
    pub(crate) fn begin(&self) -> bool {
        self.state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Ends the current run; true if a repeating task should run again.
    pub(crate) fn finish(&self) -> bool {
        let next = if self.repeating { IDLE } else { FINISHED };
        match self
            .state
            .compare_exchange(RUNNING, next, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => self.repeating,
            Err(_) => {
                self.state.store(CANCELLED, Ordering::Release);
                false
            }
        }
    }

    /// Cancels unless the task already finished or was cancelled.
    ///
    /// # Returns
    ///
    /// What the cancel achieved. A running one-shot task cannot be stopped
    /// and reports [`CancelOutcome::Running`].
    pub(crate) fn cancel(&self) -> CancelOutcome {
        loop {
            let current = self.state.load(Ordering::Acquire);
            let (next, outcome) = match current {
                IDLE => (CANCELLED, CancelOutcome::CancelledByCaller),
                RUNNING if self.repeating => (CANCELLED_RUNNING, CancelOutcome::NextRunsCancelled),
                RUNNING => return CancelOutcome::Running,
                FINISHED => return CancelOutcome::AlreadyExecuted,
                _ => return CancelOutcome::AlreadyCancelled,
            };
            if self
                .state
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return outcome;
            }
        }
    }

    /// Marks a task that will never run because its entity or host went away.
    pub(crate) fn abandon(&self) {
        let _ = self
            .state
            .compare_exchange(IDLE, CANCELLED, Ordering::AcqRel, Ordering::Acquire);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        matches!(self.state.load(Ordering::Acquire), CANCELLED | CANCELLED_RUNNING)
    }

    /// Snapshot of the lifecycle for [`RegionTask::execution_state`].
    pub(crate) fn execution_state(&self) -> ExecutionState {
        match self.state.load(Ordering::Acquire) {
            IDLE => ExecutionState::Idle,
            RUNNING => ExecutionState::Running,
            FINISHED => ExecutionState::Finished,
            CANCELLED => ExecutionState::Cancelled,
            _ => ExecutionState::CancelledRunning,
        }
    }
}

/// Legacy view of a local task.
pub(crate) struct LocalLegacyTask(pub(crate) Arc<TaskState>);

impl LegacyTask for LocalLegacyTask {
    fn task_id(&self) -> u64 {
        self.0.id()
    }

    fn cancel(&self) {
        self.0.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Region-aware view of a local task.
pub(crate) struct LocalRegionTask(pub(crate) Arc<TaskState>);

impl RegionTask for LocalRegionTask {
    fn cancel(&self) -> Result<CancelOutcome, HostError> {
        Ok(self.0.cancel())
    }

    fn execution_state(&self) -> Result<ExecutionState, HostError> {
        Ok(self.0.execution_state())
    }

    fn is_repeating(&self) -> bool {
        self.0.repeating
    }
}
