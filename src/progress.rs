use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::metrics::{AggregateStats, EventKind, EventSink};
use crate::scheduler::ActiveSessions;
use crate::shutdown::ShutdownSender;

/// Logs a one-line snapshot every `every` until the stop signal fires.
pub fn setup_progress_reporter(
    sink: Arc<EventSink>,
    active: Arc<ActiveSessions>,
    every: Duration,
    shutdown_tx: &ShutdownSender,
) -> JoinHandle<()> {
    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::spawn(async move {
        let start = Instant::now();
        let first_tick = start.checked_add(every).unwrap_or(start);
        let mut ticker = interval_at(first_tick, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => {
                    let line = progress_line(
                        active.get(),
                        &sink.snapshot(),
                        start.elapsed(),
                    );
                    tracing::info!("{}", line);
                }
            }
        }
    })
}

pub(crate) fn progress_line(active: u64, stats: &AggregateStats, elapsed: Duration) -> String {
    let (echo_ok, echo_failed, p50_us) = stats.kind_total(EventKind::Echo).map_or(
        (0, 0, 0),
        |echo| {
            let p50 = echo
                .histogram
                .as_ref()
                .map_or(0, |histogram| histogram.percentiles().0);
            (echo.successes, echo.failures, p50)
        },
    );
    let connect_failed = stats
        .kind_total(EventKind::Connect)
        .map_or(0, |connect| connect.failures);
    format!(
        "[{}s] active sessions: {} | echoes: {} ok / {} failed | connect failures: {} | echo p50: {}ms",
        elapsed.as_secs(),
        active,
        echo_ok,
        echo_failed,
        connect_failed,
        p50_us.checked_div(1_000).unwrap_or(0)
    )
}
