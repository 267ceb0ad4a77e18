//! In-process [`Host`] with real tick threads.
//!
//! [`LocalHost`] runs one global tick loop and, when regionized, one tick loop
//! per region. Entities are assigned to a region and may be moved or retired at
//! any time; entity-scoped tasks follow the entity to whichever loop owns it
//! when they come due. Off-thread work runs on the tokio blocking pool.
//!
//! In [`Threading::Single`] mode only the legacy scheduler is exposed, so
//! capability detection selects the global scheduler.

mod schedulers;
mod task;
mod tick_loop;

use std::cell::Cell;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, SendError, Sender};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::context::EntityId;
use crate::host::{
    AsyncScheduler, EntityScheduler, GlobalRegionScheduler, Host, HostError, LegacyScheduler,
    RepeatingTask, Task,
};
use schedulers::{
    LocalAsyncScheduler, LocalEntityScheduler, LocalGlobalRegionScheduler, LocalLegacyScheduler,
};
use task::TaskState;
use tick_loop::Command;

/// The execution context a thread belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadContext {
    /// The global tick loop (the main thread in single mode).
    Global,
    /// The tick loop of one region.
    Region(usize),
    /// The async pool.
    Async,
}

impl fmt::Display for ThreadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadContext::Global => f.write_str("global"),
            ThreadContext::Region(index) => write!(f, "region-{}", index),
            ThreadContext::Async => f.write_str("async"),
        }
    }
}

thread_local! {
    static CURRENT: Cell<Option<ThreadContext>> = const { Cell::new(None) };
}

/// The context of the calling thread, or `None` outside any [`LocalHost`] thread.
pub fn current_context() -> Option<ThreadContext> {
    CURRENT.with(Cell::get)
}

/// Restores the previous thread context on drop.
pub(crate) struct ContextGuard(Option<ThreadContext>);

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT.with(|current| current.set(self.0));
    }
}

/// Marks the calling thread as `context` until the guard drops.
pub(crate) fn enter_context(context: ThreadContext) -> ContextGuard {
    ContextGuard(CURRENT.with(|current| current.replace(Some(context))))
}

/// Runs `task`, logging instead of unwinding if it panics.
pub(crate) fn run_guarded<F: FnOnce()>(context: ThreadContext, task: F) {
    if catch_unwind(AssertUnwindSafe(task)).is_err() {
        error!("💥 Task panicked on {} context", context);
    }
}

/// How the local host partitions its simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Threading {
    /// One global tick thread.
    #[default]
    Single,
    /// A global tick thread plus `regions` region threads.
    Regionized { regions: usize },
}

/// A unit of work queued on a tick loop.
pub(crate) enum Job {
    Once(Task),
    Repeating {
        task: RepeatingTask,
        period: u64,
    },
    Entity {
        entity: EntityId,
        task: Task,
        retired: Option<Task>,
    },
}

impl Job {
    /// Recovers the primary callable of a job the host could not accept.
    pub(crate) fn into_task(self) -> Task {
        match self {
            Job::Once(task) | Job::Entity { task, .. } => task,
            Job::Repeating { task, .. } => Box::new(move || task()),
        }
    }
}

/// State shared by the host handle, its schedulers and its tick loops.
pub(crate) struct Shared {
    threading: Threading,
    global: Sender<Command>,
    /// One command channel per region, indexed by region number.
    regions: Vec<Sender<Command>>,
    /// Live entities and the context that currently owns each.
    entities: DashMap<EntityId, ThreadContext>,
    runtime: Handle,
    next_task_id: AtomicU64,
    shutting_down: AtomicBool,
}

impl Shared {
    pub(crate) fn new_state(&self, repeating: bool) -> Arc<TaskState> {
        TaskState::new(self.next_task_id.fetch_add(1, Ordering::Relaxed), repeating)
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_accepting(&self) -> Result<(), HostError> {
        if self.is_shutting_down() {
            Err(HostError::ShuttingDown)
        } else {
            Ok(())
        }
    }

    /// Owner right now. Tasks consult this when they run, not when queued.
    pub(crate) fn owner_of(&self, entity: EntityId) -> Option<ThreadContext> {
        self.entities.get(&entity).map(|owner| *owner)
    }

    /// Region numbers wrap; single mode maps everything to the global loop.
    fn context_for_region(&self, region: usize) -> ThreadContext {
        if self.regions.is_empty() {
            ThreadContext::Global
        } else {
            ThreadContext::Region(region % self.regions.len())
        }
    }

    /// Queues `job` on the loop for `target`, to run after `delay_ticks`.
    ///
    /// # Returns
    ///
    /// `Err` with the job handed back when the host is stopping or `target`
    /// has no tick loop, so the caller can fall back instead of losing it.
    pub(crate) fn submit(
        &self,
        target: ThreadContext,
        delay_ticks: u64,
        job: Job,
        state: Arc<TaskState>,
    ) -> Result<(), (Job, HostError)> {
        if let Err(e) = self.ensure_accepting() {
            return Err((job, e));
        }
        let sender = match target {
            ThreadContext::Global => &self.global,
            ThreadContext::Region(index) => match self.regions.get(index) {
                Some(sender) => sender,
                None => return Err((job, HostError::Internal(format!("no {} loop", target)))),
            },
            ThreadContext::Async => {
                return Err((job, HostError::Internal("async pool has no tick loop".into())))
            }
        };

        match sender.send(Command::Schedule {
            delay_ticks,
            job,
            state,
        }) {
            Ok(()) => Ok(()),
            Err(SendError(Command::Schedule { job, .. })) => Err((job, HostError::ShuttingDown)),
            Err(SendError(Command::Stop)) => Ok(()),
        }
    }

    /// Signals every loop to stop. Returns false if already stopping.
    fn stop_loops(&self) -> bool {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return false;
        }
        let _ = self.global.send(Command::Stop);
        for region in &self.regions {
            let _ = region.send(Command::Stop);
        }
        true
    }
}

/// Builder for [`LocalHost`].
#[derive(Debug, Default)]
pub struct LocalHostBuilder {
    threading: Threading,
    runtime: Option<Handle>,
}

impl LocalHostBuilder {
    /// Single global thread (the default) or one thread per region.
    pub fn threading(mut self, threading: Threading) -> Self {
        self.threading = threading;
        self
    }

    /// Runtime used for async work. Defaults to the ambient runtime.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Starts the tick threads.
    ///
    /// A region count of zero is raised to one.
    ///
    /// # Returns
    ///
    /// The running host, or [`HostError::Internal`] when no tokio runtime is
    /// available or a tick thread cannot be spawned. Threads already started
    /// are stopped again in that case.
    pub fn build(self) -> Result<LocalHost, HostError> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current()
                .map_err(|e| HostError::Internal(format!("no tokio runtime available: {}", e)))?,
        };

        let threading = match self.threading {
            Threading::Single => Threading::Single,
            Threading::Regionized { regions } => Threading::Regionized {
                regions: regions.max(1),
            },
        };
        let region_count = match threading {
            Threading::Single => 0,
            Threading::Regionized { regions } => regions,
        };

        let (global_tx, global_rx) = unbounded();
        let (region_txs, region_rxs): (Vec<_>, Vec<_>) =
            (0..region_count).map(|_| unbounded()).unzip();

        let shared = Arc::new(Shared {
            threading,
            global: global_tx,
            regions: region_txs,
            entities: DashMap::new(),
            runtime,
            next_task_id: AtomicU64::new(1),
            shutting_down: AtomicBool::new(false),
        });

        let mut threads = Vec::with_capacity(region_count + 1);
        let loops = std::iter::once((ThreadContext::Global, global_rx)).chain(
            region_rxs
                .into_iter()
                .enumerate()
                .map(|(index, rx)| (ThreadContext::Region(index), rx)),
        );
        for (context, receiver) in loops {
            match tick_loop::spawn(context, receiver, shared.clone()) {
                Ok(handle) => threads.push(handle),
                Err(e) => {
                    shared.stop_loops();
                    return Err(HostError::Internal(format!(
                        "failed to start {} tick loop: {}",
                        context, e
                    )));
                }
            }
        }

        let name = match threading {
            Threading::Single => "local (single)".to_string(),
            Threading::Regionized { regions } => format!("local ({} regions)", regions),
        };
        info!("🏗️ Started {} host", name);

        Ok(LocalHost {
            inner: Arc::new(HostInner {
                name,
                shared,
                threads: Mutex::new(threads),
            }),
        })
    }
}

/// Stops the loops when the last [`LocalHost`] clone goes away.
struct HostInner {
    name: String,
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for HostInner {
    fn drop(&mut self) {
        self.shared.stop_loops();
    }
}

/// A self-contained game host. Cloning shares the same threads.
#[derive(Clone)]
pub struct LocalHost {
    inner: Arc<HostInner>,
}

impl LocalHost {
    /// Starts configuring a host.
    pub fn builder() -> LocalHostBuilder {
        LocalHostBuilder::default()
    }

    fn shared(&self) -> &Arc<Shared> {
        &self.inner.shared
    }

    pub fn threading(&self) -> Threading {
        self.shared().threading
    }

    /// Whether region schedulers are exposed.
    pub fn is_regionized(&self) -> bool {
        matches!(self.threading(), Threading::Regionized { .. })
    }

    /// Zero in single mode.
    pub fn region_count(&self) -> usize {
        self.shared().regions.len()
    }

    /// Registers `entity` in `region` (wrapped to the region count).
    ///
    /// In single mode every entity lives on the global context.
    pub fn add_entity(&self, entity: EntityId, region: usize) -> ThreadContext {
        let owner = self.shared().context_for_region(region);
        self.shared().entities.insert(entity, owner);
        debug!("Entity {} joined on {}", entity, owner);
        owner
    }

    /// Creates a fresh entity in `region`.
    pub fn spawn_entity(&self, region: usize) -> EntityId {
        let entity = EntityId::new();
        self.add_entity(entity, region);
        entity
    }

    /// Moves a live entity to `region`. Returns the new owner, or `None` if
    /// the entity is not live.
    pub fn move_entity(&self, entity: EntityId, region: usize) -> Option<ThreadContext> {
        let owner = self.shared().context_for_region(region);
        let mut current = self.shared().entities.get_mut(&entity)?;
        *current = owner;
        debug!("Entity {} migrated to {}", entity, owner);
        Some(owner)
    }

    /// Retires an entity. Tasks still queued for it run their retired
    /// callback instead.
    pub fn retire_entity(&self, entity: EntityId) -> bool {
        let removed = self.shared().entities.remove(&entity).is_some();
        if removed {
            debug!("Entity {} retired", entity);
        }
        removed
    }

    /// The context that owns `entity`, or `None` once it is retired.
    pub fn owner_of(&self, entity: EntityId) -> Option<ThreadContext> {
        self.shared().owner_of(entity)
    }

    /// Whether `entity` was added and not yet retired.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.shared().entities.contains_key(&entity)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.shared().entities.len()
    }

    /// True from the first [`LocalHost::shutdown`] call on.
    pub fn is_shutting_down(&self) -> bool {
        self.shared().is_shutting_down()
    }

    /// Stops every tick loop and waits for them to exit.
    ///
    /// Pending tasks are discarded. Further scheduling calls are rejected with
    /// [`HostError::ShuttingDown`].
    pub fn shutdown(&self) {
        if self.shared().stop_loops() {
            info!("🛑 Stopping {} host", self.inner.name);
        }

        let me = thread::current().id();
        let handles: Vec<JoinHandle<()>> = self.inner.threads.lock().drain(..).collect();
        for handle in handles {
            if handle.thread().id() == me {
                continue;
            }
            if handle.join().is_err() {
                warn!("A tick loop exited abnormally during shutdown");
            }
        }
    }

    /// Region entry points exist only in regionized mode.
    fn require_regions(&self, capability: &'static str) -> Result<(), HostError> {
        if self.is_regionized() {
            Ok(())
        } else {
            Err(HostError::Unsupported(capability))
        }
    }
}

impl fmt::Debug for LocalHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalHost")
            .field("name", &self.inner.name)
            .field("entities", &self.entity_count())
            .finish()
    }
}

impl Host for LocalHost {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn legacy_scheduler(&self) -> Arc<dyn LegacyScheduler> {
        Arc::new(LocalLegacyScheduler::new(self.shared().clone()))
    }

    fn async_scheduler(&self) -> Result<Arc<dyn AsyncScheduler>, HostError> {
        self.require_regions("async scheduler")?;
        Ok(Arc::new(LocalAsyncScheduler::new(self.shared().clone())))
    }

    fn global_region_scheduler(&self) -> Result<Arc<dyn GlobalRegionScheduler>, HostError> {
        self.require_regions("global region scheduler")?;
        Ok(Arc::new(LocalGlobalRegionScheduler::new(self.shared().clone())))
    }

    fn supports_entity_schedulers(&self) -> Result<bool, HostError> {
        Ok(self.is_regionized())
    }

    fn entity_scheduler(
        &self,
        entity: EntityId,
    ) -> Result<Option<Arc<dyn EntityScheduler>>, HostError> {
        self.require_regions("entity scheduler")?;
        if !self.is_alive(entity) {
            return Ok(None);
        }
        Ok(Some(Arc::new(LocalEntityScheduler::new(
            self.shared().clone(),
            entity,
        ))))
    }
}
