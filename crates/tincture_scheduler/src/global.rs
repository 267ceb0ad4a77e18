//! Scheduler for hosts with a single global execution thread.

use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::capability::CapabilityProfile;
use crate::context::EntityId;
use crate::handle::ScheduledTaskHandle;
use crate::host::{LegacyScheduler, RepeatingTask, Task};
use crate::scheduler::TaskScheduler;

/// [`TaskScheduler`] backed by the host's legacy scheduler.
///
/// Every tick-thread operation lands on the main thread, so entity-scoped
/// calls behave exactly like their global counterparts. This is also the
/// fallback target for [`crate::RegionAwareScheduler`].
#[derive(Clone)]
pub struct GlobalScheduler {
    legacy: Arc<dyn LegacyScheduler>,
}

impl GlobalScheduler {
    /// Wraps the host's legacy scheduler, which every host provides.
    pub fn new(legacy: Arc<dyn LegacyScheduler>) -> Self {
        Self { legacy }
    }
}

impl TaskScheduler for GlobalScheduler {
    fn profile(&self) -> CapabilityProfile {
        CapabilityProfile::GlobalOnly
    }

    fn run_async(&self, task: Task) {
        if let Err(rejected) = self.legacy.run_task_async(task) {
            // No lesser capability left; a plain thread keeps the work alive.
            warn!("Legacy async dispatch refused ({}), using a detached thread", rejected.error);
            let task = rejected.into_task();
            if let Err(e) = std::thread::Builder::new()
                .name("tincture-async-fallback".into())
                .spawn(task)
            {
                error!("Failed to spawn fallback thread, task dropped: {}", e);
            }
        }
    }

    fn run_global(&self, task: Task) {
        // Nothing below the legacy scheduler to fall back to.
        if let Err(rejected) = self.legacy.run_task(task) {
            error!("Global dispatch refused, task dropped: {}", rejected.error);
        }
    }

    fn run_for_entity(&self, entity: EntityId, task: Task) {
        debug!("Entity {} has no region on this host, running globally", entity);
        self.run_global(task);
    }

    fn run_async_after(&self, delay_ticks: u64, task: Task) -> ScheduledTaskHandle {
        match self.legacy.run_task_later_async(task, delay_ticks) {
            Ok(task) => ScheduledTaskHandle::Legacy(task),
            Err(rejected) => {
                error!("Delayed async dispatch refused, task dropped: {}", rejected.error);
                ScheduledTaskHandle::Inert
            }
        }
    }

    fn run_global_after(&self, delay_ticks: u64, task: Task) -> ScheduledTaskHandle {
        match self.legacy.run_task_later(task, delay_ticks) {
            Ok(task) => ScheduledTaskHandle::Legacy(task),
            Err(rejected) => {
                error!("Delayed global dispatch refused, task dropped: {}", rejected.error);
                ScheduledTaskHandle::Inert
            }
        }
    }

    fn run_for_entity_after(
        &self,
        _entity: EntityId,
        delay_ticks: u64,
        task: Task,
    ) -> ScheduledTaskHandle {
        self.run_global_after(delay_ticks, task)
    }

    fn run_async_every(
        &self,
        delay_ticks: u64,
        period_ticks: u64,
        task: RepeatingTask,
    ) -> ScheduledTaskHandle {
        match self.legacy.run_task_timer_async(task, delay_ticks, period_ticks) {
            Ok(task) => ScheduledTaskHandle::Legacy(task),
            Err(rejected) => {
                error!("Repeating async dispatch refused: {}", rejected.error);
                ScheduledTaskHandle::Inert
            }
        }
    }

    fn run_global_every(
        &self,
        delay_ticks: u64,
        period_ticks: u64,
        task: RepeatingTask,
    ) -> ScheduledTaskHandle {
        match self.legacy.run_task_timer(task, delay_ticks, period_ticks) {
            Ok(task) => ScheduledTaskHandle::Legacy(task),
            Err(rejected) => {
                error!("Repeating global dispatch refused: {}", rejected.error);
                ScheduledTaskHandle::Inert
            }
        }
    }
}
