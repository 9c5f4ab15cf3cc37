//! One simulated client: connect, echo loop with reconnect-on-error, and
//! orderly disconnect.
mod endpoint;
mod state;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use chrono::Utc;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace};

use crate::error::TransportError;
use crate::metrics::{EventKind, EventSink, RequestEvent};
use crate::shutdown::{ShutdownReceiver, stop_requested};
use crate::transport::Transport;
use crate::wait::{WaitSampler, WaitTimeStrategy};

pub use endpoint::Endpoint;
pub use state::SessionState;

/// Per-session caps. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionLimits {
    pub iterations: Option<u64>,
}

/// Everything a session shares with its siblings.
pub struct SessionContext<T: Transport> {
    pub transport: Arc<T>,
    pub endpoint: Arc<Endpoint>,
    pub wait: WaitTimeStrategy,
    pub seed: Option<u64>,
    pub sink: Arc<EventSink>,
    pub limits: SessionLimits,
}

impl<T: Transport> Clone for SessionContext<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            endpoint: Arc::clone(&self.endpoint),
            wait: self.wait,
            seed: self.seed,
            sink: Arc::clone(&self.sink),
            limits: self.limits,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub id: u64,
    /// Echo iterations attempted, failed ones included.
    pub iterations: u64,
    pub reconnects: u64,
    pub state: SessionState,
}

pub struct Session<T: Transport> {
    id: u64,
    state: SessionState,
    transport: Arc<T>,
    connection: Option<T::Connection>,
    endpoint: Arc<Endpoint>,
    wait: WaitSampler,
    sink: Arc<EventSink>,
    limits: SessionLimits,
    iterations: u64,
    reconnects: u64,
    shutdown_rx: ShutdownReceiver,
    stopping: bool,
}

impl<T: Transport> Session<T> {
    #[must_use]
    pub fn new(id: u64, context: &SessionContext<T>, shutdown_rx: ShutdownReceiver) -> Self {
        Self {
            id,
            state: SessionState::Disconnected,
            transport: Arc::clone(&context.transport),
            connection: None,
            endpoint: Arc::clone(&context.endpoint),
            wait: context.wait.sampler(context.seed, id),
            sink: Arc::clone(&context.sink),
            limits: context.limits,
            iterations: 0,
            reconnects: 0,
            shutdown_rx,
            stopping: false,
        }
    }

    /// Drives the session until it is stopped, hits its iteration limit,
    /// fails its initial connect, or meets an echo failure that reconnecting
    /// cannot fix. Always returns in `Closed`.
    pub async fn run(mut self) -> SessionReport {
        if !self.connect().await {
            // Initial connect failures are fatal to the session.
            self.transition(SessionState::Closed);
            return self.report();
        }

        loop {
            if self.should_finish() {
                break;
            }

            if let Err(err) = self.echo().await {
                debug!(
                    session_id = self.id,
                    stage = err.stage().as_str(),
                    "Echo failed: {}",
                    err
                );
                if !err.is_recoverable() {
                    debug!(session_id = self.id, "Unrecoverable echo failure, closing");
                    break;
                }
                // A failed final iteration closes without reopening.
                if self.limit_reached() {
                    break;
                }
                if !self.reconnect().await {
                    break;
                }
            }

            if !self.pause().await {
                break;
            }
        }

        self.disconnect().await;
        self.report()
    }

    async fn connect(&mut self) -> bool {
        self.transition(SessionState::Connecting);
        let started_at = Utc::now();
        let start = Instant::now();
        let result = self
            .transport
            .open(&self.endpoint.url, self.endpoint.connect_timeout)
            .await;
        let duration = start.elapsed();

        match result {
            Ok(connection) => {
                self.connection = Some(connection);
                self.emit(RequestEvent::success(
                    EventKind::Connect,
                    &self.endpoint.name,
                    self.id,
                    started_at,
                    duration,
                    0,
                ));
                self.transition(SessionState::Connected);
                true
            }
            Err(err) => {
                debug!(session_id = self.id, "Connect failed: {}", err);
                self.emit(RequestEvent::failure(
                    EventKind::Connect,
                    &self.endpoint.name,
                    self.id,
                    started_at,
                    duration,
                    err.to_string(),
                ));
                false
            }
        }
    }

    async fn echo(&mut self) -> Result<(), TransportError> {
        self.iterations = self.iterations.saturating_add(1);
        let message = echo_message(self.id, self.iterations);
        let started_at = Utc::now();
        let start = Instant::now();

        let result = match self.connection.as_mut() {
            Some(connection) => {
                match self.transport.send(connection, message.as_bytes()).await {
                    Ok(()) => self.transport.receive(connection).await,
                    Err(err) => Err(err),
                }
            }
            None => Err(TransportError::ConnectionClosed),
        };
        let duration = start.elapsed();

        match result {
            Ok(reply) => {
                let payload_size = u64::try_from(reply.len()).unwrap_or(u64::MAX);
                self.emit(
                    RequestEvent::success(
                        EventKind::Echo,
                        &self.endpoint.name,
                        self.id,
                        started_at,
                        duration,
                        payload_size,
                    )
                    .with_context("message", message),
                );
                Ok(())
            }
            Err(err) => {
                // The connection is unusable after a send/receive failure.
                self.connection = None;
                self.emit(RequestEvent::failure(
                    EventKind::Echo,
                    &self.endpoint.name,
                    self.id,
                    started_at,
                    duration,
                    err.to_string(),
                ));
                Err(err)
            }
        }
    }

    /// Reconnects until a connect succeeds or a stop is observed between
    /// attempts. No backoff and no retry ceiling; attempts are paced by the
    /// wait strategy only.
    async fn reconnect(&mut self) -> bool {
        self.transition(SessionState::Reconnecting);
        self.reconnects = self.reconnects.saturating_add(1);
        loop {
            if self.observe_stop() {
                return false;
            }
            if self.connect().await {
                return true;
            }
            if !self.pause().await {
                return false;
            }
        }
    }

    /// Sleeps one wait-strategy delay. Returns `false` when the stop signal
    /// arrived instead.
    async fn pause(&mut self) -> bool {
        let delay = self.wait.next_delay();
        if delay.is_zero() {
            return !self.observe_stop();
        }
        let stopped = tokio::select! {
            _ = self.shutdown_rx.recv() => true,
            () = sleep(delay) => false,
        };
        if stopped {
            self.stopping = true;
        }
        !self.stopping
    }

    async fn disconnect(&mut self) {
        self.transition(SessionState::Closing);
        if let Some(connection) = self.connection.take() {
            let started_at = Utc::now();
            let start = Instant::now();
            let result = self.transport.close(connection).await;
            let duration = start.elapsed();
            let event = match result {
                Ok(()) => RequestEvent::success(
                    EventKind::Disconnect,
                    &self.endpoint.name,
                    self.id,
                    started_at,
                    duration,
                    0,
                ),
                Err(err) => {
                    debug!(session_id = self.id, "Disconnect failed: {}", err);
                    RequestEvent::failure(
                        EventKind::Disconnect,
                        &self.endpoint.name,
                        self.id,
                        started_at,
                        duration,
                        err.to_string(),
                    )
                }
            };
            self.emit(event);
        }
        self.transition(SessionState::Closed);
    }

    fn should_finish(&mut self) -> bool {
        self.limit_reached() || self.observe_stop()
    }

    fn limit_reached(&self) -> bool {
        self.limits
            .iterations
            .is_some_and(|limit| self.iterations >= limit)
    }

    fn observe_stop(&mut self) -> bool {
        if !self.stopping && stop_requested(&mut self.shutdown_rx) {
            self.stopping = true;
        }
        self.stopping
    }

    fn transition(&mut self, next: SessionState) {
        trace!(
            session_id = self.id,
            from = self.state.as_str(),
            to = next.as_str(),
            "Session state change"
        );
        self.state = next;
    }

    fn emit(&self, event: RequestEvent) {
        self.sink.record(event);
    }

    const fn report(&self) -> SessionReport {
        SessionReport {
            id: self.id,
            iterations: self.iterations,
            reconnects: self.reconnects,
            state: self.state,
        }
    }
}

fn echo_message(session_id: u64, iteration: u64) -> String {
    format!(
        "echo from session {} iteration {} at {}",
        session_id,
        iteration,
        Utc::now().timestamp_millis()
    )
}
