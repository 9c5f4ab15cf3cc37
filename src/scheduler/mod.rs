//! Population ramp-up, stop propagation, and session teardown.
mod ramp;


use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::args::{PositiveU64, PositiveUsize};
use crate::session::{Session, SessionContext, SessionReport};
use crate::shutdown::{ShutdownReceiver, ShutdownSender, stop_requested};
use crate::transport::Transport;

pub use ramp::spawn_period;

/// Desired population, fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopulationPlan {
    pub target_sessions: PositiveUsize,
    /// New sessions per second.
    pub spawn_rate: PositiveU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub spawned: usize,
    /// Final session reports in spawn order.
    pub sessions: Vec<SessionReport>,
}

pub struct SessionScheduler {
    plan: PopulationPlan,
    shutdown_tx: ShutdownSender,
    active: Arc<ActiveSessions>,
}

impl SessionScheduler {
    #[must_use]
    pub fn new(plan: PopulationPlan, shutdown_tx: &ShutdownSender) -> Self {
        Self {
            plan,
            shutdown_tx: shutdown_tx.clone(),
            active: Arc::new(ActiveSessions::default()),
        }
    }

    /// Starts ramping sessions up in the background.
    #[must_use]
    pub fn start<T: Transport>(self, context: SessionContext<T>) -> RunningScheduler {
        let shutdown_tx = self.shutdown_tx.clone();
        let active = Arc::clone(&self.active);
        // Subscribe before spawning so a stop sent right after `start` is seen.
        let shutdown_rx = shutdown_tx.subscribe();
        let task = tokio::spawn(self.drive(context, shutdown_rx));
        RunningScheduler {
            shutdown_tx,
            active,
            task,
        }
    }

    /// Runs until every session has exited, either after a broadcast stop or
    /// on its own.
    ///
    /// # Errors
    ///
    /// Returns an error when the scheduler task panics.
    pub async fn run<T: Transport>(
        self,
        context: SessionContext<T>,
    ) -> Result<SchedulerReport, tokio::task::JoinError> {
        self.start(context).join().await
    }

    async fn drive<T: Transport>(
        self,
        context: SessionContext<T>,
        mut shutdown_rx: ShutdownReceiver,
    ) -> SchedulerReport {
        let target = self.plan.target_sessions.get();
        let mut ticker = ramp::spawn_ticker(self.plan.spawn_rate);
        let mut handles: Vec<JoinHandle<SessionReport>> = Vec::with_capacity(target);

        info!(
            "Ramping up to {} sessions at {}/s",
            target,
            self.plan.spawn_rate.get()
        );

        while handles.len() < target {
            let stopped = tokio::select! {
                _ = shutdown_rx.recv() => true,
                _ = ticker.tick() => false,
            };
            // The session subscribes before the re-check, so a stop racing
            // this tick reaches either the scheduler or the new session.
            let session_rx = self.shutdown_tx.subscribe();
            if stopped || stop_requested(&mut shutdown_rx) {
                info!(
                    "Stop received during ramp-up after {} of {} sessions",
                    handles.len(),
                    target
                );
                return self.teardown(handles).await;
            }

            let id = u64::try_from(handles.len())
                .unwrap_or(u64::MAX)
                .saturating_add(1);
            let session = Session::new(id, &context, session_rx);
            let guard = ActiveSessionGuard::acquire(&self.active);
            handles.push(tokio::spawn(async move {
                let report = session.run().await;
                drop(guard);
                report
            }));
        }

        info!("All {} sessions spawned", target);
        self.wait_for_stop_or_idle(&mut shutdown_rx).await;
        self.teardown(handles).await
    }

    async fn wait_for_stop_or_idle(&self, shutdown_rx: &mut ShutdownReceiver) {
        loop {
            let idle = self.active.idle.notified();
            tokio::pin!(idle);
            // Register before reading the count so a final drop is not missed.
            idle.as_mut().enable();
            if self.active.get() == 0 {
                info!("Every session has finished");
                return;
            }
            tokio::select! {
                // A closed channel also means the run is over.
                _ = shutdown_rx.recv() => return,
                () = &mut idle => {}
            }
        }
    }

    async fn teardown(&self, handles: Vec<JoinHandle<SessionReport>>) -> SchedulerReport {
        debug!(
            "Waiting for {} sessions to close ({} still active)",
            handles.len(),
            self.active.get()
        );
        let spawned = handles.len();
        let mut sessions = Vec::with_capacity(spawned);
        for handle in handles {
            match handle.await {
                Ok(report) => sessions.push(report),
                Err(err) => warn!("Session task failed: {}", err),
            }
        }
        SchedulerReport { spawned, sessions }
    }
}

/// Handle to a scheduler whose ramp-up is in progress or complete.
pub struct RunningScheduler {
    shutdown_tx: ShutdownSender,
    active: Arc<ActiveSessions>,
    task: JoinHandle<SchedulerReport>,
}

impl RunningScheduler {
    /// Sessions spawned and not yet exited.
    #[must_use]
    pub fn active_sessions(&self) -> u64 {
        self.active.get()
    }

    #[must_use]
    pub fn active_counter(&self) -> Arc<ActiveSessions> {
        Arc::clone(&self.active)
    }

    /// Broadcasts the stop signal, halting ramp-up, and waits until every
    /// session has reached `Closed`.
    ///
    /// # Errors
    ///
    /// Returns an error when the scheduler task panics.
    pub async fn stop(self) -> Result<SchedulerReport, tokio::task::JoinError> {
        drop(self.shutdown_tx.send(()));
        self.task.await
    }

    /// Waits for a stop signal sent elsewhere, or for every session to end
    /// on its own, then joins them all.
    ///
    /// # Errors
    ///
    /// Returns an error when the scheduler task panics.
    pub async fn join(self) -> Result<SchedulerReport, tokio::task::JoinError> {
        self.task.await
    }
}

/// Gauge of sessions spawned and not yet exited.
#[derive(Debug, Default)]
pub struct ActiveSessions {
    count: AtomicU64,
    idle: Notify,
}

impl ActiveSessions {
    #[must_use]
    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }
}

struct ActiveSessionGuard {
    sessions: Arc<ActiveSessions>,
}

impl ActiveSessionGuard {
    fn acquire(sessions: &Arc<ActiveSessions>) -> Self {
        sessions.count.fetch_add(1, Ordering::AcqRel);
        Self {
            sessions: Arc::clone(sessions),
        }
    }
}

impl Drop for ActiveSessionGuard {
    fn drop(&mut self) {
        if self.sessions.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.sessions.idle.notify_waiters();
        }
    }
}
