//! The scheduling contract shared by both scheduler variants.

use crate::capability::CapabilityProfile;
use crate::context::{EntityId, ExecutionContext};
use crate::handle::ScheduledTaskHandle;
use crate::host::{RepeatingTask, Task};

/// Runs callables on the correct thread or region for the active host.
///
/// Immediate operations are fire-and-forget. Delayed and repeating operations
/// return a [`ScheduledTaskHandle`]. Delays and periods are in ticks (see
/// [`crate::ticks`]).
///
/// Implementations never propagate host failures to the caller: a refused
/// call falls back to a lesser capability so the callable still runs.
pub trait TaskScheduler: Send + Sync {
    /// Which variant is active.
    fn profile(&self) -> CapabilityProfile;

    /// Runs `task` off the tick threads.
    fn run_async(&self, task: Task);

    /// Runs `task` on the global context.
    fn run_global(&self, task: Task);

    /// Runs `task` on whichever context owns `entity` when it executes.
    ///
    /// Dropped silently if the entity is retired first.
    fn run_for_entity(&self, entity: EntityId, task: Task);

    fn run_async_after(&self, delay_ticks: u64, task: Task) -> ScheduledTaskHandle;

    fn run_global_after(&self, delay_ticks: u64, task: Task) -> ScheduledTaskHandle;

    /// Returns an inert handle if the entity is already retired.
    fn run_for_entity_after(
        &self,
        entity: EntityId,
        delay_ticks: u64,
        task: Task,
    ) -> ScheduledTaskHandle;

    fn run_async_every(
        &self,
        delay_ticks: u64,
        period_ticks: u64,
        task: RepeatingTask,
    ) -> ScheduledTaskHandle;

    fn run_global_every(
        &self,
        delay_ticks: u64,
        period_ticks: u64,
        task: RepeatingTask,
    ) -> ScheduledTaskHandle;

    /// Dispatches `task` to an explicit execution context.
    fn run_in(&self, context: ExecutionContext, task: Task) {
        match context {
            ExecutionContext::Global => self.run_global(task),
            ExecutionContext::EntityScoped(entity) => self.run_for_entity(entity, task),
        }
    }
}
