//! In-memory transport that replays a failure script; used by session and
//! scheduler tests.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use url::Url;

use crate::error::TransportError;

use super::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EchoStep {
    Reply,
    FailSend,
    FailReceive,
    /// Send reports the stream as already shut down.
    FailClosedStream,
}

#[derive(Debug)]
pub(crate) struct ScriptedConnection {
    pending: Option<Vec<u8>>,
    fail_receive: bool,
}

#[derive(Debug, Default)]
struct Script {
    open_failures: VecDeque<bool>,
    echo_steps: VecDeque<EchoStep>,
    fail_close: bool,
    echo_latency: Duration,
    slow_opens: bool,
}

#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<Script>,
    open_instants: Mutex<Vec<Instant>>,
    closes: AtomicU64,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Upcoming `open` outcomes in order; `true` fails. Later opens succeed.
    pub(crate) fn with_open_failures(self, failures: &[bool]) -> Self {
        self.with_script(|script| script.open_failures.extend(failures.iter().copied()));
        self
    }

    /// Upcoming echo outcomes in order. Later echoes reply normally.
    pub(crate) fn with_echo_steps(self, steps: &[EchoStep]) -> Self {
        self.with_script(|script| script.echo_steps.extend(steps.iter().copied()));
        self
    }

    pub(crate) fn with_failing_close(self) -> Self {
        self.with_script(|script| script.fail_close = true);
        self
    }

    pub(crate) fn with_echo_latency(self, latency: Duration) -> Self {
        self.with_script(|script| script.echo_latency = latency);
        self
    }

    /// Every open takes [`SLOW_OPEN`] before resolving.
    pub(crate) fn with_slow_opens(self) -> Self {
        self.with_script(|script| script.slow_opens = true);
        self
    }

    pub(crate) fn open_instants(&self) -> Vec<Instant> {
        self.open_instants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn close_count(&self) -> u64 {
        self.closes.load(Ordering::SeqCst)
    }

    fn with_script<R>(&self, read: impl FnOnce(&mut Script) -> R) -> R {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        read(&mut script)
    }
}

pub(crate) const SLOW_OPEN: Duration = Duration::from_millis(400);

#[async_trait]
impl Transport for ScriptedTransport {
    type Connection = ScriptedConnection;

    async fn open(
        &self,
        url: &Url,
        _timeout: Duration,
    ) -> Result<Self::Connection, TransportError> {
        self.open_instants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Instant::now());
        let (fail, slow) = self.with_script(|script| {
            (
                script.open_failures.pop_front().unwrap_or(false),
                script.slow_opens,
            )
        });
        if slow {
            tokio::time::sleep(SLOW_OPEN).await;
        }
        if fail {
            return Err(TransportError::Connect {
                url: url.to_string(),
                reason: "connection refused".to_owned(),
            });
        }
        Ok(ScriptedConnection {
            pending: None,
            fail_receive: false,
        })
    }

    async fn send(
        &self,
        connection: &mut Self::Connection,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let step = self.with_script(|script| {
            script.echo_steps.pop_front().unwrap_or(EchoStep::Reply)
        });
        match step {
            EchoStep::FailSend => Err(TransportError::Send {
                reason: "broken pipe".to_owned(),
            }),
            EchoStep::FailClosedStream => Err(TransportError::Close {
                reason: "stream already shut down".to_owned(),
            }),
            EchoStep::FailReceive => {
                connection.fail_receive = true;
                Ok(())
            }
            EchoStep::Reply => {
                connection.pending = Some(payload.to_vec());
                Ok(())
            }
        }
    }

    async fn receive(&self, connection: &mut Self::Connection) -> Result<Vec<u8>, TransportError> {
        let latency = self.with_script(|script| script.echo_latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if connection.fail_receive {
            connection.fail_receive = false;
            return Err(TransportError::ConnectionClosed);
        }
        connection
            .pending
            .take()
            .ok_or_else(|| TransportError::Receive {
                reason: "nothing was sent".to_owned(),
            })
    }

    async fn close(&self, _connection: Self::Connection) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.with_script(|script| script.fail_close) {
            return Err(TransportError::Close {
                reason: "close frame rejected".to_owned(),
            });
        }
        Ok(())
    }
}
