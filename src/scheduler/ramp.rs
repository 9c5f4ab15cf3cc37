use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior, interval};

use crate::args::PositiveU64;

const NANOS_PER_SEC: u64 = 1_000_000_000;
const MIN_SPAWN_PERIOD: Duration = Duration::from_micros(1);

/// Spacing between session starts for the given rate.
///
/// Rounds up so that `rate` consecutive starts always span at least one
/// second.
#[must_use]
pub fn spawn_period(rate: PositiveU64) -> Duration {
    let rate = rate.get();
    let whole = NANOS_PER_SEC.checked_div(rate).unwrap_or(0);
    let nanos = if NANOS_PER_SEC.checked_rem(rate).unwrap_or(0) == 0 {
        whole
    } else {
        whole.saturating_add(1)
    };
    Duration::from_nanos(nanos).max(MIN_SPAWN_PERIOD)
}

/// First tick fires immediately. Late ticks are pushed back rather than
/// bursted.
pub(super) fn spawn_ticker(rate: PositiveU64) -> Interval {
    let mut ticker = interval(spawn_period(rate));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
