//! Tick <-> wall-clock conversion.
//!
//! Every delay and period in this crate is expressed in host ticks. All
//! conversions go through [`MILLIS_PER_TICK`]; nothing else may assume a tick
//! length.

use std::time::Duration;

/// Length of one host tick in milliseconds (20 ticks per second).
pub const MILLIS_PER_TICK: u64 = 50;

/// Number of ticks in one second.
pub const TICKS_PER_SECOND: u64 = 1000 / MILLIS_PER_TICK;

/// Wall-clock length of one tick.
pub const TICK: Duration = Duration::from_millis(MILLIS_PER_TICK);

/// Converts a tick count to wall-clock time.
pub fn ticks_to_duration(ticks: u64) -> Duration {
    Duration::from_millis(ticks.saturating_mul(MILLIS_PER_TICK))
}

/// Converts wall-clock time to ticks, rounding up to the next whole tick.
pub fn duration_to_ticks(duration: Duration) -> u64 {
    let millis = duration.as_millis();
    let ticks = millis.div_ceil(u128::from(MILLIS_PER_TICK));
    u64::try_from(ticks).unwrap_or(u64::MAX)
}
