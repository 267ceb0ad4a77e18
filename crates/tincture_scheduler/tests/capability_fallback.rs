//! Capability detection and fallback against misbehaving hosts.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{next_sighting, recorder};
use tincture_scheduler::{
    create_scheduler, AsyncScheduler, CapabilityProfile, EntityId, EntityScheduler,
    GlobalRegionScheduler, Host, HostError, LegacyScheduler, LocalHost, RegionTask, Rejected,
    RepeatingTask, Task, ThreadContext, Threading,
};

/// Which region-aware entry point misbehaves, and how.
#[derive(Clone, Copy)]
enum Fault {
    AsyncLookupPanics,
    NoEntitySchedulers,
    EntityLookupFails,
    GlobalRegionRefuses,
}

/// Wraps a regionized [`LocalHost`] and injects one fault.
struct FaultyHost {
    inner: LocalHost,
    fault: Fault,
    refusals: Arc<AtomicUsize>,
}

impl FaultyHost {
    fn new(fault: Fault) -> Self {
        let inner = LocalHost::builder()
            .threading(Threading::Regionized { regions: 2 })
            .build()
            .expect("host should start");
        Self {
            inner,
            fault,
            refusals: Arc::new(AtomicUsize::new(0)),
        }
    }
}

struct RefusingGlobalRegion {
    refusals: Arc<AtomicUsize>,
}

impl RefusingGlobalRegion {
    fn refuse<T>(&self, task: T) -> Rejected<T> {
        self.refusals.fetch_add(1, Ordering::SeqCst);
        Rejected::new(task, HostError::Internal("region overloaded".into()))
    }
}

impl GlobalRegionScheduler for RefusingGlobalRegion {
    fn execute(&self, task: Task) -> Result<(), Rejected<Task>> {
        Err(self.refuse(task))
    }

    fn run_delayed(
        &self,
        task: Task,
        _delay_ticks: u64,
    ) -> Result<Arc<dyn RegionTask>, Rejected<Task>> {
        Err(self.refuse(task))
    }

    fn run_at_fixed_rate(
        &self,
        task: RepeatingTask,
        _initial_delay_ticks: u64,
        _period_ticks: u64,
    ) -> Result<Arc<dyn RegionTask>, Rejected<RepeatingTask>> {
        Err(self.refuse(task))
    }
}

impl Host for FaultyHost {
    fn name(&self) -> &str {
        "faulty"
    }

    fn legacy_scheduler(&self) -> Arc<dyn LegacyScheduler> {
        self.inner.legacy_scheduler()
    }

    fn async_scheduler(&self) -> Result<Arc<dyn AsyncScheduler>, HostError> {
        if let Fault::AsyncLookupPanics = self.fault {
            panic!("async scheduler lookup exploded");
        }
        self.inner.async_scheduler()
    }

    fn global_region_scheduler(&self) -> Result<Arc<dyn GlobalRegionScheduler>, HostError> {
        if let Fault::GlobalRegionRefuses = self.fault {
            return Ok(Arc::new(RefusingGlobalRegion {
                refusals: self.refusals.clone(),
            }));
        }
        self.inner.global_region_scheduler()
    }

    fn supports_entity_schedulers(&self) -> Result<bool, HostError> {
        match self.fault {
            Fault::NoEntitySchedulers => Ok(false),
            _ => self.inner.supports_entity_schedulers(),
        }
    }

    fn entity_scheduler(
        &self,
        entity: EntityId,
    ) -> Result<Option<Arc<dyn EntityScheduler>>, HostError> {
        match self.fault {
            Fault::EntityLookupFails => Err(HostError::Internal("entity table locked".into())),
            _ => self.inner.entity_scheduler(entity),
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_panicking_async_lookup_selects_global_scheduler() {
    let host = FaultyHost::new(Fault::AsyncLookupPanics);
    assert_eq!(CapabilityProfile::detect(&host), CapabilityProfile::GlobalOnly);

    let inner = host.inner.clone();
    let scheduler = create_scheduler(Arc::new(host));
    assert_eq!(scheduler.profile(), CapabilityProfile::GlobalOnly);

    let (rec, mut rx) = recorder();
    scheduler.run_global(rec.task("global"));
    assert_eq!(next_sighting(&mut rx).await.1, Some(ThreadContext::Global));
    inner.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_entity_schedulers_selects_global_scheduler() {
    let host = FaultyHost::new(Fault::NoEntitySchedulers);
    assert_eq!(CapabilityProfile::detect(&host), CapabilityProfile::GlobalOnly);
    host.inner.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_entity_lookup_falls_back_to_global_context() {
    let host = FaultyHost::new(Fault::EntityLookupFails);
    let inner = host.inner.clone();
    let player = inner.spawn_entity(1);

    let scheduler = create_scheduler(Arc::new(host));
    assert_eq!(scheduler.profile(), CapabilityProfile::RegionAware);

    let (rec, mut rx) = recorder();
    scheduler.run_for_entity(player, rec.task("entity"));
    assert_eq!(next_sighting(&mut rx).await, ("entity".into(), Some(ThreadContext::Global)));

    let handle = scheduler.run_for_entity_after(player, 1, rec.task("entity-later"));
    assert!(handle.is_valid());
    assert_eq!(
        next_sighting(&mut rx).await,
        ("entity-later".into(), Some(ThreadContext::Global))
    );
    inner.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_refused_global_region_call_still_runs_task() {
    let host = FaultyHost::new(Fault::GlobalRegionRefuses);
    let inner = host.inner.clone();
    let refusals = host.refusals.clone();

    let scheduler = create_scheduler(Arc::new(host));
    assert_eq!(scheduler.profile(), CapabilityProfile::RegionAware);

    let (rec, mut rx) = recorder();
    scheduler.run_global(rec.task("now"));
    assert_eq!(next_sighting(&mut rx).await, ("now".into(), Some(ThreadContext::Global)));

    let handle = scheduler.run_global_after(2, rec.task("later"));
    assert!(handle.is_valid());
    assert_eq!(next_sighting(&mut rx).await, ("later".into(), Some(ThreadContext::Global)));

    let repeating = scheduler.run_global_every(1, 1, rec.repeating("every"));
    assert_eq!(next_sighting(&mut rx).await.0, "every");
    repeating.cancel();

    assert_eq!(refusals.load(Ordering::SeqCst), 3);
    tokio::time::sleep(Duration::from_millis(60)).await;
    inner.shutdown();
}
