//! Wires the CLI settings to the scheduler and prints the end-of-run report.
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::args::EchoArgs;
use crate::error::{AppResult, ValidationError};
use crate::metrics::{AggregateStats, EventSink};
use crate::progress::setup_progress_reporter;
use crate::scheduler::{PopulationPlan, SchedulerReport, SessionScheduler};
use crate::session::{Endpoint, SessionContext, SessionLimits};
use crate::shutdown::{
    ShutdownSender, setup_run_timer, setup_signal_shutdown_handler, shutdown_channel,
};
use crate::summary::{self, Selections};
use crate::transport::{Transport, WebSocketTransport};
use crate::wait::WaitTimeStrategy;

/// Validated, transport-independent settings for one run.
#[derive(Debug, Clone)]
pub(crate) struct RunSettings {
    pub(crate) endpoint: Endpoint,
    pub(crate) plan: PopulationPlan,
    pub(crate) wait: WaitTimeStrategy,
    pub(crate) limits: SessionLimits,
    pub(crate) seed: Option<u64>,
    pub(crate) run_time: Option<Duration>,
    pub(crate) progress_interval: Option<Duration>,
}

impl RunSettings {
    pub(crate) fn from_args(args: &EchoArgs) -> AppResult<Self> {
        let endpoint = Endpoint::from_host(&args.host, &args.path, args.connect_timeout)?;
        Ok(Self {
            endpoint,
            plan: PopulationPlan {
                target_sessions: args.users,
                spawn_rate: args.spawn_rate,
            },
            wait: wait_strategy(args)?,
            limits: SessionLimits {
                iterations: args.iterations.map(u64::from),
            },
            seed: args.seed,
            run_time: args.run_time,
            progress_interval: (!args.no_progress).then_some(args.progress_interval),
        })
    }
}

pub(crate) struct RunOutcome {
    pub(crate) stats: AggregateStats,
    pub(crate) report: SchedulerReport,
    pub(crate) elapsed: Duration,
}

fn wait_strategy(args: &EchoArgs) -> Result<WaitTimeStrategy, ValidationError> {
    match args.wait_constant {
        Some(delay) => Ok(WaitTimeStrategy::constant(delay)),
        None => WaitTimeStrategy::between(args.wait_min, args.wait_max),
    }
}

fn selections(args: &EchoArgs, settings: &RunSettings) -> Selections {
    let wait = match settings.wait {
        WaitTimeStrategy::Constant(delay) => format!("constant {:?}", delay),
        WaitTimeStrategy::Between(range) => {
            format!("between {:?} and {:?}", range.low(), range.high())
        }
    };
    Selections {
        url: settings.endpoint.url.to_string(),
        users: settings.plan.target_sessions.get(),
        spawn_rate: settings.plan.spawn_rate.get(),
        wait,
        connect_timeout: settings.endpoint.connect_timeout,
        receive_timeout: args.receive_timeout,
        run_time: settings.run_time,
        iterations: settings.limits.iterations,
        seed: settings.seed,
    }
}

/// Runs the swarm against the configured WebSocket endpoint and prints the
/// report.
///
/// # Errors
///
/// Returns an error when the settings are invalid or a background task
/// panics.
pub(crate) async fn run_local(args: &EchoArgs) -> AppResult<()> {
    let settings = RunSettings::from_args(args)?;
    let transport = Arc::new(WebSocketTransport::new(args.receive_timeout));
    let (shutdown_tx, _) = shutdown_channel();
    let signal_handle = setup_signal_shutdown_handler(&shutdown_tx);

    info!(
        "Swarming {} with {} sessions",
        settings.endpoint.url,
        settings.plan.target_sessions.get()
    );
    let outcome = run_with_transport(&settings, transport, &shutdown_tx).await?;
    signal_handle.await?;

    summary::print_lines(&summary::selection_lines(&selections(args, &settings)));
    println!();
    summary::print_lines(&summary::session_lines(&outcome.report, outcome.elapsed));
    println!();
    summary::print_lines(&summary::summary_lines(&outcome.stats, outcome.elapsed));
    Ok(())
}

/// Drives one run to completion on the given transport. Returns once every
/// session has closed, after a stop from the run timer, from `shutdown_tx`,
/// or from every session finishing on its own.
///
/// # Errors
///
/// Returns an error when the scheduler task panics.
pub(crate) async fn run_with_transport<T: Transport>(
    settings: &RunSettings,
    transport: Arc<T>,
    shutdown_tx: &ShutdownSender,
) -> AppResult<RunOutcome> {
    let sink = Arc::new(EventSink::new());
    let context = SessionContext {
        transport,
        endpoint: Arc::new(settings.endpoint.clone()),
        wait: settings.wait,
        seed: settings.seed,
        sink: Arc::clone(&sink),
        limits: settings.limits,
    };

    let start = Instant::now();
    let running = SessionScheduler::new(settings.plan, shutdown_tx).start(context);
    let timer = settings
        .run_time
        .map(|run_time| setup_run_timer(shutdown_tx, run_time));
    let progress = settings.progress_interval.map(|every| {
        setup_progress_reporter(
            Arc::clone(&sink),
            running.active_counter(),
            every,
            shutdown_tx,
        )
    });

    let report = running.join().await?;
    let elapsed = start.elapsed();
    // Release the timer and progress tasks when sessions ended on their own.
    drop(shutdown_tx.send(()));
    for handle in [timer, progress].into_iter().flatten() {
        if let Err(err) = handle.await {
            warn!("Background task failed: {}", err);
        }
    }

    info!(
        "Run finished after {}s with {} sessions",
        elapsed.as_secs(),
        report.spawned
    );
    Ok(RunOutcome {
        stats: sink.snapshot(),
        report,
        elapsed,
    })
}
