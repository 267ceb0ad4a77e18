//! # Tincture Scheduler
//!
//! Runs callables on the correct execution context of a game host, whichever
//! concurrency model that host currently exposes.
//!
//! Two models are supported:
//!
//! * **Global** - one main tick thread owns the whole simulation, plus an
//!   async pool for off-thread work.
//! * **Region-aware** - the simulation is partitioned into regions, each with
//!   its own tick thread. Entities are owned by exactly one region at a time
//!   and may migrate between regions.
//!
//! ## Selecting a scheduler
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tincture_scheduler::{create_scheduler, LocalHost, Threading};
//!
//! # fn demo(runtime: tokio::runtime::Handle) -> Result<(), tincture_scheduler::HostError> {
//! let host = LocalHost::builder()
//!     .threading(Threading::Regionized { regions: 4 })
//!     .runtime(runtime)
//!     .build()?;
//!
//! let scheduler = create_scheduler(Arc::new(host.clone()));
//! scheduler.run_async(Box::new(|| println!("off-thread")));
//! scheduler.run_global(Box::new(|| println!("global context")));
//! # Ok(())
//! # }
//! ```
//!
//! The capability probe ([`CapabilityProfile::detect`]) never fails: any
//! missing or misbehaving host entry point simply selects the
//! [`GlobalScheduler`].

pub mod capability;
pub mod context;
pub mod global;
pub mod handle;
pub mod host;
pub mod local;
pub mod region;
pub mod scheduler;
pub mod ticks;

pub use capability::{create_scheduler, CapabilityProfile};
pub use context::{EntityId, ExecutionContext};
pub use global::GlobalScheduler;
pub use handle::ScheduledTaskHandle;
pub use host::{
    AsyncScheduler, CancelOutcome, EntityScheduler, ExecutionState, GlobalRegionScheduler, Host,
    HostError, LegacyScheduler, LegacyTask, RegionTask, Rejected, RepeatingTask, Task,
};
pub use local::{current_context, LocalHost, LocalHostBuilder, ThreadContext, Threading};
pub use region::RegionAwareScheduler;
pub use scheduler::TaskScheduler;
pub use ticks::{duration_to_ticks, ticks_to_duration, MILLIS_PER_TICK, TICKS_PER_SECOND};
