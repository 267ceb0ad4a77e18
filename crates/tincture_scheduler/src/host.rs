//! Host capability interface.
//!
//! A host always provides the legacy single-thread scheduler. Region-aware
//! hosts additionally provide three entry points: an async scheduler, a
//! global-region scheduler and per-entity schedulers. Each region-aware entry
//! point is a failable call so that capability detection can treat any
//! failure as "absent".
//!
//! Calls that take ownership of a callable hand it back inside [`Rejected`]
//! when the host refuses it, so the caller can re-dispatch it elsewhere.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::context::EntityId;

/// A one-shot callable.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A callable that may run many times.
pub type RepeatingTask = Arc<dyn Fn() + Send + Sync + 'static>;

/// Failures reported by host scheduling calls.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    /// The host does not expose this capability.
    #[error("host capability unavailable: {0}")]
    Unsupported(&'static str),
    /// The host is stopping and no longer accepts work.
    #[error("host is shutting down")]
    ShuttingDown,
    /// The host rejected the schedule parameters.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
    /// Any other host-internal failure.
    #[error("host call failed: {0}")]
    Internal(String),
}

/// A callable the host refused, returned together with the reason.
pub struct Rejected<T> {
    /// The callable, handed back so the caller can run or drop it.
    pub task: T,
    pub error: HostError,
}

impl<T> Rejected<T> {
    /// Pairs a refused callable with the reason.
    pub fn new(task: T, error: HostError) -> Self {
        Self { task, error }
    }

    /// Recovers the callable so it can be dispatched elsewhere.
    pub fn into_task(self) -> T {
        self.task
    }
}

impl<T> std::fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rejected").field("error", &self.error).finish_non_exhaustive()
    }
}

impl<T> std::fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task rejected: {}", self.error)
    }
}

impl<T> std::error::Error for Rejected<T> {}

/// Result of a host call that consumed a callable of type `T`.
pub type HostResult<H, T = Task> = Result<H, Rejected<T>>;

// ============================================================================
// Legacy (single global thread) model
// ============================================================================

/// Handle for a task scheduled through the legacy scheduler.
pub trait LegacyTask: Send + Sync {
    /// Host-assigned task number.
    fn task_id(&self) -> u64;
    /// Stops the task from running (again). Never fails.
    fn cancel(&self);
    fn is_cancelled(&self) -> bool;
}

/// The scheduler every host provides: one main thread plus an async pool.
pub trait LegacyScheduler: Send + Sync {
    /// Runs on the main thread on the next tick.
    fn run_task(&self, task: Task) -> HostResult<Arc<dyn LegacyTask>>;
    /// Runs on the async pool as soon as possible.
    fn run_task_async(&self, task: Task) -> HostResult<Arc<dyn LegacyTask>>;
    /// Runs on the main thread after `delay_ticks`.
    fn run_task_later(&self, task: Task, delay_ticks: u64) -> HostResult<Arc<dyn LegacyTask>>;
    /// Runs on the async pool after `delay_ticks`.
    fn run_task_later_async(
        &self,
        task: Task,
        delay_ticks: u64,
    ) -> HostResult<Arc<dyn LegacyTask>>;
    /// Runs on the main thread every `period_ticks`, starting after `delay_ticks`.
    fn run_task_timer(
        &self,
        task: RepeatingTask,
        delay_ticks: u64,
        period_ticks: u64,
    ) -> HostResult<Arc<dyn LegacyTask>, RepeatingTask>;
    /// Runs on the async pool every `period_ticks`, starting after `delay_ticks`.
    fn run_task_timer_async(
        &self,
        task: RepeatingTask,
        delay_ticks: u64,
        period_ticks: u64,
    ) -> HostResult<Arc<dyn LegacyTask>, RepeatingTask>;
}

// ============================================================================
// Region-aware model
// ============================================================================

/// What a cancellation request achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The task had not started and will never run.
    CancelledByCaller,
    /// Someone already cancelled it.
    AlreadyCancelled,
    /// A one-shot task is executing right now and will complete.
    Running,
    /// A one-shot task already ran.
    AlreadyExecuted,
    /// A repeating task is executing; no further runs will happen.
    NextRunsCancelled,
}

/// Lifecycle state of a region-aware task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    Running,
    Finished,
    Cancelled,
    CancelledRunning,
}

/// Handle for a task scheduled through any region-aware scheduler.
pub trait RegionTask: Send + Sync {
    fn cancel(&self) -> Result<CancelOutcome, HostError>;
    fn execution_state(&self) -> Result<ExecutionState, HostError>;
    fn is_repeating(&self) -> bool;
}

/// Off-thread scheduler measured in wall-clock time.
pub trait AsyncScheduler: Send + Sync {
    fn run_now(&self, task: Task) -> HostResult<Arc<dyn RegionTask>>;
    fn run_delayed(&self, task: Task, delay: Duration) -> HostResult<Arc<dyn RegionTask>>;
    fn run_at_fixed_rate(
        &self,
        task: RepeatingTask,
        initial_delay: Duration,
        period: Duration,
    ) -> HostResult<Arc<dyn RegionTask>, RepeatingTask>;
}

/// Scheduler for the global region (world-wide, not tied to an entity).
pub trait GlobalRegionScheduler: Send + Sync {
    /// Runs on the global region on the next tick.
    fn execute(&self, task: Task) -> Result<(), Rejected<Task>>;
    /// `delay_ticks` must be at least 1.
    fn run_delayed(&self, task: Task, delay_ticks: u64) -> HostResult<Arc<dyn RegionTask>>;
    /// Both `initial_delay_ticks` and `period_ticks` must be at least 1.
    fn run_at_fixed_rate(
        &self,
        task: RepeatingTask,
        initial_delay_ticks: u64,
        period_ticks: u64,
    ) -> HostResult<Arc<dyn RegionTask>, RepeatingTask>;
}

/// Scheduler bound to one entity; tasks follow the entity across regions.
pub trait EntityScheduler: Send + Sync {
    /// Schedules `task` on the entity's owning region after `delay_ticks`.
    ///
    /// Returns `Ok(false)` if the entity is already retired, in which case
    /// neither callable runs. If the entity retires later, `retired` runs
    /// instead of `task`.
    fn execute(
        &self,
        task: Task,
        retired: Option<Task>,
        delay_ticks: u64,
    ) -> Result<bool, Rejected<Task>>;

    /// Like [`EntityScheduler::execute`] but returns a cancellable handle,
    /// or `None` if the entity is already retired.
    fn run_delayed(
        &self,
        task: Task,
        retired: Option<Task>,
        delay_ticks: u64,
    ) -> Result<Option<Arc<dyn RegionTask>>, Rejected<Task>>;
}

/// A game host.
///
/// Only [`Host::legacy_scheduler`] is mandatory. The region-aware entry points
/// default to [`HostError::Unsupported`].
pub trait Host: Send + Sync {
    /// Human readable host name, used in logs.
    fn name(&self) -> &str;

    fn legacy_scheduler(&self) -> Arc<dyn LegacyScheduler>;

    fn async_scheduler(&self) -> Result<Arc<dyn AsyncScheduler>, HostError> {
        Err(HostError::Unsupported("async scheduler"))
    }

    fn global_region_scheduler(&self) -> Result<Arc<dyn GlobalRegionScheduler>, HostError> {
        Err(HostError::Unsupported("global region scheduler"))
    }

    /// Whether per-entity schedulers exist at all.
    fn supports_entity_schedulers(&self) -> Result<bool, HostError> {
        Ok(false)
    }

    /// The scheduler for `entity`, or `None` if the entity is unknown or
    /// retired.
    fn entity_scheduler(
        &self,
        entity: EntityId,
    ) -> Result<Option<Arc<dyn EntityScheduler>>, HostError> {
        let _ = entity;
        Err(HostError::Unsupported("entity scheduler"))
    }
}
