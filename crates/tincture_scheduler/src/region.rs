//! Scheduler for hosts that partition work across region threads.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::capability::CapabilityProfile;
use crate::context::EntityId;
use crate::global::GlobalScheduler;
use crate::handle::ScheduledTaskHandle;
use crate::host::{AsyncScheduler, GlobalRegionScheduler, Host, HostError, RepeatingTask, Task};
use crate::scheduler::TaskScheduler;
use crate::ticks::ticks_to_duration;

/// Region schedulers treat anything below one tick as one tick.
const MIN_REGION_TICKS: u64 = 1;

/// [`TaskScheduler`] for region-threaded hosts.
///
/// Entity-scoped calls resolve the entity's scheduler at call time and the
/// host routes the task to whichever region owns the entity when it runs.
/// Any refused host call is re-dispatched through the [`GlobalScheduler`].
pub struct RegionAwareScheduler {
    host: Arc<dyn Host>,
    async_scheduler: Arc<dyn AsyncScheduler>,
    global_region: Arc<dyn GlobalRegionScheduler>,
    fallback: GlobalScheduler,
}

impl RegionAwareScheduler {
    /// Resolves the region-aware entry points of `host`.
    ///
    /// # Returns
    ///
    /// The scheduler, or the error of the first entry point that is missing.
    /// [`create_scheduler`](crate::create_scheduler) turns that error into a
    /// [`GlobalScheduler`].
    pub fn new(host: Arc<dyn Host>) -> Result<Self, HostError> {
        let async_scheduler = host.async_scheduler()?;
        let global_region = host.global_region_scheduler()?;
        if !host.supports_entity_schedulers()? {
            return Err(HostError::Unsupported("entity scheduler"));
        }
        let fallback = GlobalScheduler::new(host.legacy_scheduler());

        Ok(Self {
            host,
            async_scheduler,
            global_region,
            fallback,
        })
    }

    /// Callback for tasks whose entity retires before they run.
    fn retired_notice(entity: EntityId) -> Option<Task> {
        Some(Box::new(move || {
            trace!("Entity {} retired before its task ran, task dropped", entity);
        }))
    }
}

impl TaskScheduler for RegionAwareScheduler {
    fn profile(&self) -> CapabilityProfile {
        CapabilityProfile::RegionAware
    }

    fn run_async(&self, task: Task) {
        if let Err(rejected) = self.async_scheduler.run_now(task) {
            warn!("Async scheduler refused task ({}), falling back", rejected.error);
            self.fallback.run_async(rejected.into_task());
        }
    }

    fn run_global(&self, task: Task) {
        if let Err(rejected) = self.global_region.execute(task) {
            warn!("Global region refused task ({}), falling back", rejected.error);
            self.fallback.run_global(rejected.into_task());
        }
    }

    fn run_for_entity(&self, entity: EntityId, task: Task) {
        let scheduler = match self.host.entity_scheduler(entity) {
            Ok(Some(scheduler)) => scheduler,
            Ok(None) => {
                debug!("Entity {} is not live, task dropped", entity);
                return;
            }
            Err(e) => {
                warn!("Entity scheduler lookup failed for {} ({}), falling back", entity, e);
                self.fallback.run_for_entity(entity, task);
                return;
            }
        };

        match scheduler.execute(task, Self::retired_notice(entity), MIN_REGION_TICKS) {
            Ok(true) => {}
            Ok(false) => debug!("Entity {} retired, task dropped", entity),
            Err(rejected) => {
                warn!("Entity scheduler refused task ({}), falling back", rejected.error);
                self.fallback.run_for_entity(entity, rejected.into_task());
            }
        }
    }

    fn run_async_after(&self, delay_ticks: u64, task: Task) -> ScheduledTaskHandle {
        match self
            .async_scheduler
            .run_delayed(task, ticks_to_duration(delay_ticks))
        {
            Ok(task) => ScheduledTaskHandle::Region(task),
            Err(rejected) => {
                warn!("Async scheduler refused delayed task ({}), falling back", rejected.error);
                self.fallback.run_async_after(delay_ticks, rejected.into_task())
            }
        }
    }

    fn run_global_after(&self, delay_ticks: u64, task: Task) -> ScheduledTaskHandle {
        match self
            .global_region
            .run_delayed(task, delay_ticks.max(MIN_REGION_TICKS))
        {
            Ok(task) => ScheduledTaskHandle::Region(task),
            Err(rejected) => {
                warn!("Global region refused delayed task ({}), falling back", rejected.error);
                self.fallback.run_global_after(delay_ticks, rejected.into_task())
            }
        }
    }

    fn run_for_entity_after(
        &self,
        entity: EntityId,
        delay_ticks: u64,
        task: Task,
    ) -> ScheduledTaskHandle {
        let scheduler = match self.host.entity_scheduler(entity) {
            Ok(Some(scheduler)) => scheduler,
            Ok(None) => {
                debug!("Entity {} is not live, delayed task dropped", entity);
                return ScheduledTaskHandle::Inert;
            }
            Err(e) => {
                warn!("Entity scheduler lookup failed for {} ({}), falling back", entity, e);
                return self.fallback.run_for_entity_after(entity, delay_ticks, task);
            }
        };

        match scheduler.run_delayed(
            task,
            Self::retired_notice(entity),
            delay_ticks.max(MIN_REGION_TICKS),
        ) {
            Ok(Some(task)) => ScheduledTaskHandle::Region(task),
            Ok(None) => {
                debug!("Entity {} retired, delayed task dropped", entity);
                ScheduledTaskHandle::Inert
            }
            Err(rejected) => {
                warn!("Entity scheduler refused delayed task ({}), falling back", rejected.error);
                self.fallback
                    .run_for_entity_after(entity, delay_ticks, rejected.into_task())
            }
        }
    }

    fn run_async_every(
        &self,
        delay_ticks: u64,
        period_ticks: u64,
        task: RepeatingTask,
    ) -> ScheduledTaskHandle {
        // The async scheduler works in wall-clock time and rejects a zero
        // initial delay.
        let initial = ticks_to_duration(delay_ticks).max(Duration::from_millis(1));
        let period = ticks_to_duration(period_ticks.max(MIN_REGION_TICKS));
        match self.async_scheduler.run_at_fixed_rate(task, initial, period) {
            Ok(task) => ScheduledTaskHandle::Region(task),
            Err(rejected) => {
                warn!("Async scheduler refused repeating task ({}), falling back", rejected.error);
                self.fallback
                    .run_async_every(delay_ticks, period_ticks, rejected.into_task())
            }
        }
    }

    fn run_global_every(
        &self,
        delay_ticks: u64,
        period_ticks: u64,
        task: RepeatingTask,
    ) -> ScheduledTaskHandle {
        match self.global_region.run_at_fixed_rate(
            task,
            delay_ticks.max(MIN_REGION_TICKS),
            period_ticks.max(MIN_REGION_TICKS),
        ) {
            Ok(task) => ScheduledTaskHandle::Region(task),
            Err(rejected) => {
                warn!("Global region refused repeating task ({}), falling back", rejected.error);
                self.fallback
                    .run_global_every(delay_ticks, period_ticks, rejected.into_task())
            }
        }
    }
}
