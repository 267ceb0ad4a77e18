//! Startup capability detection and scheduler selection.

use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::global::GlobalScheduler;
use crate::host::{Host, HostError};
use crate::region::RegionAwareScheduler;
use crate::scheduler::TaskScheduler;

/// Which scheduler variant the host supports.
///
/// Detected once at startup and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityProfile {
    /// Only the legacy single global thread is available.
    GlobalOnly,
    /// Async, global-region and entity schedulers are all available.
    RegionAware,
}

impl CapabilityProfile {
    /// Probes `host` for the region-aware entry points.
    ///
    /// All three must be present. A step that errors or panics counts as
    /// absent; this function itself never fails.
    pub fn detect(host: &dyn Host) -> Self {
        let async_ok = probe_step("async scheduler", || host.async_scheduler().map(|_| ()));
        let global_ok = probe_step("global region scheduler", || {
            host.global_region_scheduler().map(|_| ())
        });
        let entity_ok = probe_step("entity scheduler", || {
            host.supports_entity_schedulers().and_then(|supported| {
                if supported {
                    Ok(())
                } else {
                    Err(HostError::Unsupported("entity scheduler"))
                }
            })
        });

        if async_ok && global_ok && entity_ok {
            CapabilityProfile::RegionAware
        } else {
            CapabilityProfile::GlobalOnly
        }
    }

    /// Whether entity-scoped work can run on region threads.
    pub fn is_region_aware(&self) -> bool {
        matches!(self, CapabilityProfile::RegionAware)
    }
}

impl std::fmt::Display for CapabilityProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityProfile::GlobalOnly => f.write_str("global-only"),
            CapabilityProfile::RegionAware => f.write_str("region-aware"),
        }
    }
}

/// Runs one probe step, turning errors and panics into `false`.
fn probe_step<F>(name: &str, step: F) -> bool
where
    F: FnOnce() -> Result<(), HostError>,
{
    match catch_unwind(AssertUnwindSafe(step)) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!("Capability probe '{}' absent: {}", name, e);
            false
        }
        Err(_) => {
            warn!("Capability probe '{}' panicked, treating as absent", name);
            false
        }
    }
}

/// Detects the host's capabilities and builds the matching scheduler.
///
/// A region-aware scheduler that fails to construct after a positive probe
/// falls back to the [`GlobalScheduler`].
///
/// # Arguments
///
/// * `host` - The host to probe. It is kept by the returned scheduler.
///
/// # Returns
///
/// A scheduler whose [`profile`](TaskScheduler::profile) reports the variant
/// actually in use, which may be `GlobalOnly` even on a region-aware host.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tincture_scheduler::{create_scheduler, LocalHost, Threading};
///
/// # fn demo() -> Result<(), tincture_scheduler::HostError> {
/// let host = LocalHost::builder()
///     .threading(Threading::Regionized { regions: 4 })
///     .build()?;
/// let scheduler = create_scheduler(Arc::new(host));
/// scheduler.run_global(Box::new(|| println!("tick")));
/// # Ok(())
/// # }
/// ```
pub fn create_scheduler(host: Arc<dyn Host>) -> Arc<dyn TaskScheduler> {
    let profile = CapabilityProfile::detect(host.as_ref());
    info!("🧭 Host '{}' capability profile: {}", host.name(), profile);

    if profile.is_region_aware() {
        match RegionAwareScheduler::new(host.clone()) {
            Ok(scheduler) => return Arc::new(scheduler),
            Err(e) => warn!("Region-aware scheduler unavailable ({}), using global scheduler", e),
        }
    }

    Arc::new(GlobalScheduler::new(host.legacy_scheduler()))
}
