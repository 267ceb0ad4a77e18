//! Scheduler entry points handed out by [`super::LocalHost`].

use std::sync::Arc;
use std::time::Duration;

use super::task::{LocalLegacyTask, LocalRegionTask, TaskState};
use super::{enter_context, run_guarded, Job, Shared, ThreadContext};
use crate::context::EntityId;
use crate::host::{
    AsyncScheduler, EntityScheduler, GlobalRegionScheduler, HostError, HostResult,
    LegacyScheduler, LegacyTask, RegionTask, Rejected, RepeatingTask, Task,
};
use crate::ticks::ticks_to_duration;

/// Floor for async fixed-rate periods; a zero period would spin.
const MIN_ASYNC_PERIOD: Duration = Duration::from_millis(1);

fn legacy(state: Arc<TaskState>) -> Arc<dyn LegacyTask> {
    Arc::new(LocalLegacyTask(state))
}

fn region(state: Arc<TaskState>) -> Arc<dyn RegionTask> {
    Arc::new(LocalRegionTask(state))
}

/// Runs a one-shot task on a blocking-pool thread marked as async.
fn run_async_once(state: &TaskState, task: Task) {
    if state.begin() {
        let _context = enter_context(ThreadContext::Async);
        run_guarded(ThreadContext::Async, task);
        state.finish();
    }
}

// ============================================================================
// Async pool
// ============================================================================

/// Hands `task` to the blocking pool right away.
fn spawn_now(shared: &Arc<Shared>, state: Arc<TaskState>, task: Task) -> HostResult<()> {
    if let Err(e) = shared.ensure_accepting() {
        return Err(Rejected::new(task, e));
    }
    shared
        .runtime()
        .spawn_blocking(move || run_async_once(&state, task));
    Ok(())
}

/// Sleeps on the runtime, then runs `task` on the blocking pool. Abandoned if
/// the host starts shutting down during the delay.
fn spawn_delayed(
    shared: &Arc<Shared>,
    state: Arc<TaskState>,
    task: Task,
    delay: Duration,
) -> HostResult<()> {
    if let Err(e) = shared.ensure_accepting() {
        return Err(Rejected::new(task, e));
    }
    let host = shared.clone();
    shared.runtime().spawn(async move {
        tokio::time::sleep(delay).await;
        if host.is_shutting_down() {
            state.abandon();
            return;
        }
        let _ = tokio::task::spawn_blocking(move || run_async_once(&state, task)).await;
    });
    Ok(())
}

/// Repeats `task` every `period` until it is cancelled or the host stops.
///
/// Each run waits for the previous one, so runs never overlap; a slow run
/// delays the next tick instead of stacking up.
fn spawn_fixed_rate(
    shared: &Arc<Shared>,
    state: Arc<TaskState>,
    task: RepeatingTask,
    initial_delay: Duration,
    period: Duration,
) -> HostResult<(), RepeatingTask> {
    if let Err(e) = shared.ensure_accepting() {
        return Err(Rejected::new(task, e));
    }
    let host = shared.clone();
    let period = period.max(MIN_ASYNC_PERIOD);
    shared.runtime().spawn(async move {
        tokio::time::sleep(initial_delay).await;
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if host.is_shutting_down() {
                state.abandon();
                break;
            }
            let (run_state, run) = (state.clone(), task.clone());
            let again = tokio::task::spawn_blocking(move || {
                if !run_state.begin() {
                    return false;
                }
                let _context = enter_context(ThreadContext::Async);
                run_guarded(ThreadContext::Async, move || run());
                run_state.finish()
            })
            .await
            .unwrap_or(false);
            if !again {
                break;
            }
        }
    });
    Ok(())
}

// ============================================================================
// Legacy scheduler
// ============================================================================

/// The single-thread API: sync work on the global loop, async work on the
/// blocking pool. Present in both threading modes.
pub(crate) struct LocalLegacyScheduler {
    shared: Arc<Shared>,
}

impl LocalLegacyScheduler {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }
}

impl LegacyScheduler for LocalLegacyScheduler {
    fn run_task(&self, task: Task) -> HostResult<Arc<dyn LegacyTask>> {
        self.run_task_later(task, 0)
    }

    fn run_task_async(&self, task: Task) -> HostResult<Arc<dyn LegacyTask>> {
        let state = self.shared.new_state(false);
        spawn_now(&self.shared, state.clone(), task)?;
        Ok(legacy(state))
    }

    fn run_task_later(&self, task: Task, delay_ticks: u64) -> HostResult<Arc<dyn LegacyTask>> {
        let state = self.shared.new_state(false);
        self.shared
            .submit(ThreadContext::Global, delay_ticks, Job::Once(task), state.clone())
            .map_err(|(job, e)| Rejected::new(job.into_task(), e))?;
        Ok(legacy(state))
    }

    fn run_task_later_async(
        &self,
        task: Task,
        delay_ticks: u64,
    ) -> HostResult<Arc<dyn LegacyTask>> {
        let state = self.shared.new_state(false);
        spawn_delayed(&self.shared, state.clone(), task, ticks_to_duration(delay_ticks))?;
        Ok(legacy(state))
    }

    fn run_task_timer(
        &self,
        task: RepeatingTask,
        delay_ticks: u64,
        period_ticks: u64,
    ) -> HostResult<Arc<dyn LegacyTask>, RepeatingTask> {
        let state = self.shared.new_state(true);
        let retained = task.clone();
        let job = Job::Repeating {
            task,
            period: period_ticks.max(1),
        };
        self.shared
            .submit(ThreadContext::Global, delay_ticks, job, state.clone())
            .map_err(|(_, e)| Rejected::new(retained, e))?;
        Ok(legacy(state))
    }

    fn run_task_timer_async(
        &self,
        task: RepeatingTask,
        delay_ticks: u64,
        period_ticks: u64,
    ) -> HostResult<Arc<dyn LegacyTask>, RepeatingTask> {
        let state = self.shared.new_state(true);
        spawn_fixed_rate(
            &self.shared,
            state.clone(),
            task,
            ticks_to_duration(delay_ticks),
            ticks_to_duration(period_ticks.max(1)),
        )?;
        Ok(legacy(state))
    }
}

// ============================================================================
// Region-aware schedulers
// ============================================================================

/// Off-thread work in regionized mode. Delays are wall-clock durations.
pub(crate) struct LocalAsyncScheduler {
    shared: Arc<Shared>,
}

impl LocalAsyncScheduler {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }
}

impl AsyncScheduler for LocalAsyncScheduler {
    fn run_now(&self, task: Task) -> HostResult<Arc<dyn RegionTask>> {
        let state = self.shared.new_state(false);
        spawn_now(&self.shared, state.clone(), task)?;
        Ok(region(state))
    }

    fn run_delayed(&self, task: Task, delay: Duration) -> HostResult<Arc<dyn RegionTask>> {
        let state = self.shared.new_state(false);
        spawn_delayed(&self.shared, state.clone(), task, delay)?;
        Ok(region(state))
    }

    fn run_at_fixed_rate(
        &self,
        task: RepeatingTask,
        initial_delay: Duration,
        period: Duration,
    ) -> HostResult<Arc<dyn RegionTask>, RepeatingTask> {
        let state = self.shared.new_state(true);
        spawn_fixed_rate(&self.shared, state.clone(), task, initial_delay, period)?;
        Ok(region(state))
    }
}

/// Work for the global region, measured in ticks of at least one.
pub(crate) struct LocalGlobalRegionScheduler {
    shared: Arc<Shared>,
}

impl LocalGlobalRegionScheduler {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    fn submit_once(&self, task: Task, delay_ticks: u64) -> HostResult<Arc<TaskState>> {
        let state = self.shared.new_state(false);
        self.shared
            .submit(ThreadContext::Global, delay_ticks, Job::Once(task), state.clone())
            .map_err(|(job, e)| Rejected::new(job.into_task(), e))?;
        Ok(state)
    }
}

/// Region schedulers reject zero-tick schedules rather than round them up.
fn below_one_tick(what: &str) -> HostError {
    HostError::InvalidSchedule(format!("{} must be at least one tick", what))
}

impl GlobalRegionScheduler for LocalGlobalRegionScheduler {
    fn execute(&self, task: Task) -> Result<(), Rejected<Task>> {
        self.submit_once(task, 1).map(|_| ())
    }

    fn run_delayed(&self, task: Task, delay_ticks: u64) -> HostResult<Arc<dyn RegionTask>> {
        if delay_ticks == 0 {
            return Err(Rejected::new(task, below_one_tick("delay")));
        }
        self.submit_once(task, delay_ticks).map(region)
    }

    fn run_at_fixed_rate(
        &self,
        task: RepeatingTask,
        initial_delay_ticks: u64,
        period_ticks: u64,
    ) -> HostResult<Arc<dyn RegionTask>, RepeatingTask> {
        if initial_delay_ticks == 0 {
            return Err(Rejected::new(task, below_one_tick("initial delay")));
        }
        if period_ticks == 0 {
            return Err(Rejected::new(task, below_one_tick("period")));
        }

        let state = self.shared.new_state(true);
        let retained = task.clone();
        let job = Job::Repeating {
            task,
            period: period_ticks,
        };
        self.shared
            .submit(ThreadContext::Global, initial_delay_ticks, job, state.clone())
            .map_err(|(_, e)| Rejected::new(retained, e))?;
        Ok(region(state))
    }
}

/// Scheduler bound to one entity. Ownership is looked up again when the task
/// comes due, so a task queued before a migration runs on the new owner.
pub(crate) struct LocalEntityScheduler {
    shared: Arc<Shared>,
    entity: EntityId,
}

impl LocalEntityScheduler {
    pub(crate) fn new(shared: Arc<Shared>, entity: EntityId) -> Self {
        Self { shared, entity }
    }

    fn schedule(
        &self,
        task: Task,
        retired: Option<Task>,
        delay_ticks: u64,
    ) -> Result<Option<Arc<TaskState>>, Rejected<Task>> {
        if delay_ticks == 0 {
            return Err(Rejected::new(task, below_one_tick("delay")));
        }
        let Some(owner) = self.shared.owner_of(self.entity) else {
            return Ok(None);
        };

        let state = self.shared.new_state(false);
        let job = Job::Entity {
            entity: self.entity,
            task,
            retired,
        };
        self.shared
            .submit(owner, delay_ticks, job, state.clone())
            .map_err(|(job, e)| Rejected::new(job.into_task(), e))?;
        Ok(Some(state))
    }
}

impl EntityScheduler for LocalEntityScheduler {
    fn execute(
        &self,
        task: Task,
        retired: Option<Task>,
        delay_ticks: u64,
    ) -> Result<bool, Rejected<Task>> {
        Ok(self.schedule(task, retired, delay_ticks)?.is_some())
    }

    fn run_delayed(
        &self,
        task: Task,
        retired: Option<Task>,
        delay_ticks: u64,
    ) -> Result<Option<Arc<dyn RegionTask>>, Rejected<Task>> {
        Ok(self.schedule(task, retired, delay_ticks)?.map(region))
    }
}
