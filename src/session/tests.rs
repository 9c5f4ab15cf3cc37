use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;

use super::*;
use crate::error::{AppError, AppResult};
use crate::shutdown::{ShutdownSender, shutdown_channel};
use crate::transport::scripted::{EchoStep, ScriptedTransport};

const ECHO_OK: (EventKind, bool) = (EventKind::Echo, true);
const ECHO_ERR: (EventKind, bool) = (EventKind::Echo, false);
const CONNECT_OK: (EventKind, bool) = (EventKind::Connect, true);
const CONNECT_ERR: (EventKind, bool) = (EventKind::Connect, false);
const DISCONNECT_OK: (EventKind, bool) = (EventKind::Disconnect, true);
const DISCONNECT_ERR: (EventKind, bool) = (EventKind::Disconnect, false);

struct Harness {
    context: SessionContext<ScriptedTransport>,
    events_rx: mpsc::UnboundedReceiver<RequestEvent>,
    shutdown_tx: ShutdownSender,
}

impl Harness {
    fn new(
        transport: ScriptedTransport,
        wait: WaitTimeStrategy,
        iterations: Option<u64>,
    ) -> AppResult<Self> {
        let url = Url::parse("ws://localhost:4001/echo")
            .map_err(|err| AppError::validation(format!("Bad test url: {}", err)))?;
        let (sink, events_rx) = EventSink::with_forwarder();
        let (shutdown_tx, _) = shutdown_channel();
        Ok(Self {
            context: SessionContext {
                transport: Arc::new(transport),
                endpoint: Arc::new(Endpoint::new(url, Duration::from_secs(10))),
                wait,
                seed: Some(1),
                sink: Arc::new(sink),
                limits: SessionLimits { iterations },
            },
            events_rx,
            shutdown_tx,
        })
    }

    fn session(&self, id: u64) -> Session<ScriptedTransport> {
        Session::new(id, &self.context, self.shutdown_tx.subscribe())
    }

    fn stop(&self) -> AppResult<()> {
        self.shutdown_tx
            .send(())
            .map(drop)
            .map_err(|err| AppError::validation(format!("Failed to send stop: {}", err)))
    }

    async fn next_event(&mut self) -> AppResult<RequestEvent> {
        timeout(Duration::from_secs(600), self.events_rx.recv())
            .await
            .map_err(|err| AppError::validation(format!("No event arrived: {}", err)))?
            .ok_or_else(|| AppError::validation("Event channel closed"))
    }

    fn drain(&mut self) -> Vec<RequestEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            events.push(event);
        }
        events
    }
}

fn no_wait() -> WaitTimeStrategy {
    WaitTimeStrategy::constant(Duration::ZERO)
}

fn signature(events: &[RequestEvent]) -> Vec<(EventKind, bool)> {
    events
        .iter()
        .map(|event| (event.kind, event.is_success()))
        .collect()
}

fn expect_signature(events: &[RequestEvent], expected: &[(EventKind, bool)]) -> AppResult<()> {
    let actual = signature(events);
    if actual != expected {
        return Err(AppError::validation(format!(
            "Expected events {:?}, got {:?}",
            expected, actual
        )));
    }
    Ok(())
}

fn expect_closed(report: &SessionReport) -> AppResult<()> {
    if report.state != SessionState::Closed {
        return Err(AppError::validation(format!(
            "Session {} ended in {}",
            report.id, report.state
        )));
    }
    Ok(())
}

#[tokio::test]
async fn three_iterations_emit_connect_echoes_disconnect_in_order() -> AppResult<()> {
    let mut harness = Harness::new(ScriptedTransport::new(), no_wait(), Some(3))?;
    let report = harness.session(1).run().await;

    expect_closed(&report)?;
    if report.iterations != 3 || report.reconnects != 0 {
        return Err(AppError::validation(format!("Unexpected report {:?}", report)));
    }
    let events = harness.drain();
    expect_signature(
        &events,
        &[CONNECT_OK, ECHO_OK, ECHO_OK, ECHO_OK, DISCONNECT_OK],
    )?;

    let messages: Vec<&String> = events
        .iter()
        .filter(|event| event.kind == EventKind::Echo)
        .filter_map(|event| event.context.get("message"))
        .collect();
    if messages.len() != 3 || messages.iter().any(|message| message.is_empty()) {
        return Err(AppError::validation("Every echo should carry its message"));
    }
    if messages.windows(2).any(|pair| pair.first() == pair.get(1)) {
        return Err(AppError::validation("Echo messages should differ per call"));
    }
    for event in events.iter().filter(|event| event.kind == EventKind::Echo) {
        let sent = event.context.get("message").map_or(0, String::len);
        if event.payload_size != u64::try_from(sent).unwrap_or(0) {
            return Err(AppError::validation("Echo payload size should match reply"));
        }
    }
    if events.iter().any(|event| event.name != "/echo" || event.session_id != 1) {
        return Err(AppError::validation("Events should carry endpoint name and id"));
    }
    if harness.context.transport.close_count() != 1 {
        return Err(AppError::validation("Connection should be closed once"));
    }
    Ok(())
}

#[tokio::test]
async fn initial_connect_failure_ends_session() -> AppResult<()> {
    let transport = ScriptedTransport::new().with_open_failures(&[true]);
    let mut harness = Harness::new(transport, no_wait(), Some(3))?;
    let report = harness.session(9).run().await;

    expect_closed(&report)?;
    if report.iterations != 0 {
        return Err(AppError::validation("No echo may follow a failed start"));
    }
    let events = harness.drain();
    expect_signature(&events, &[CONNECT_ERR])?;
    let error_present = events
        .first()
        .and_then(|event| event.error.as_deref())
        .is_some_and(|error| error.contains("connection refused"));
    if !error_present {
        return Err(AppError::validation("Connect failure should describe the error"));
    }
    if harness.context.transport.close_count() != 0 {
        return Err(AppError::validation("Nothing to close after failed start"));
    }
    Ok(())
}

#[tokio::test]
async fn echo_failures_each_trigger_one_reconnect() -> AppResult<()> {
    let transport = ScriptedTransport::new().with_echo_steps(&[
        EchoStep::Reply,
        EchoStep::FailSend,
        EchoStep::FailReceive,
        EchoStep::Reply,
    ]);
    let mut harness = Harness::new(transport, no_wait(), Some(4))?;
    let report = harness.session(2).run().await;

    expect_closed(&report)?;
    if report.iterations != 4 || report.reconnects != 2 {
        return Err(AppError::validation(format!("Unexpected report {:?}", report)));
    }
    let events = harness.drain();
    expect_signature(
        &events,
        &[
            CONNECT_OK,
            ECHO_OK,
            ECHO_ERR,
            CONNECT_OK,
            ECHO_ERR,
            CONNECT_OK,
            ECHO_OK,
            DISCONNECT_OK,
        ],
    )?;
    let failed_payloads = events
        .iter()
        .filter(|event| !event.is_success())
        .any(|event| event.payload_size != 0);
    if failed_payloads {
        return Err(AppError::validation("Failed events must report 0 bytes"));
    }
    Ok(())
}

#[tokio::test]
async fn reconnect_open_fails_once_then_succeeds() -> AppResult<()> {
    let transport = ScriptedTransport::new()
        .with_open_failures(&[false, true])
        .with_echo_steps(&[EchoStep::FailSend]);
    let mut harness = Harness::new(transport, no_wait(), Some(2))?;
    let report = harness.session(3).run().await;

    expect_closed(&report)?;
    expect_signature(
        &harness.drain(),
        &[
            CONNECT_OK,
            ECHO_ERR,
            CONNECT_ERR,
            CONNECT_OK,
            ECHO_OK,
            DISCONNECT_OK,
        ],
    )
}

#[tokio::test]
async fn any_failure_sequence_reconnects_exactly_once_before_next_echo() -> AppResult<()> {
    const ITERATIONS: u32 = 6;

    for mask in 0_u32..(1 << ITERATIONS) {
        let steps: Vec<EchoStep> = (0..ITERATIONS)
            .map(|bit| match (mask >> bit) & 1 {
                0 => EchoStep::Reply,
                _ if bit % 2 == 0 => EchoStep::FailSend,
                _ => EchoStep::FailReceive,
            })
            .collect();
        let transport = ScriptedTransport::new().with_echo_steps(&steps);
        let mut harness = Harness::new(transport, no_wait(), Some(u64::from(ITERATIONS)))?;
        let report = harness.session(1).run().await;
        expect_closed(&report)?;

        let events = signature(&harness.drain());
        // A failed last iteration drops the connection, so nothing is closed.
        let last_failed = (mask >> (ITERATIONS - 1)) & 1 == 1;
        let expected_last = if last_failed { ECHO_ERR } else { DISCONNECT_OK };
        if events.first() != Some(&CONNECT_OK) || events.last() != Some(&expected_last) {
            return Err(AppError::validation(format!(
                "Mask {:#b}: bad framing {:?}",
                mask, events
            )));
        }
        let mut iter = events.iter().peekable();
        let mut echo_failures = 0_u32;
        while let Some(event) = iter.next() {
            if *event != ECHO_ERR {
                continue;
            }
            echo_failures = echo_failures.saturating_add(1);
            if iter.peek().is_none() {
                break;
            }
            if iter.next() != Some(&CONNECT_OK) {
                return Err(AppError::validation(format!(
                    "Mask {:#b}: echo failure not followed by one connect: {:?}",
                    mask, events
                )));
            }
            if iter.peek() == Some(&&CONNECT_OK) {
                return Err(AppError::validation(format!(
                    "Mask {:#b}: duplicate reconnect: {:?}",
                    mask, events
                )));
            }
        }
        if echo_failures != mask.count_ones() {
            return Err(AppError::validation(format!(
                "Mask {:#b}: expected {} echo failures, saw {}",
                mask,
                mask.count_ones(),
                echo_failures
            )));
        }
    }
    Ok(())
}

#[tokio::test]
async fn failed_last_iteration_closes_without_reconnecting() -> AppResult<()> {
    let transport = ScriptedTransport::new().with_echo_steps(&[EchoStep::FailSend]);
    let mut harness = Harness::new(transport, no_wait(), Some(1))?;
    let report = harness.session(10).run().await;

    expect_closed(&report)?;
    if report.iterations != 1 || report.reconnects != 0 {
        return Err(AppError::validation(format!("Unexpected report {:?}", report)));
    }
    expect_signature(&harness.drain(), &[CONNECT_OK, ECHO_ERR])?;
    if harness.context.transport.open_instants().len() != 1 {
        return Err(AppError::validation("No reconnect after the last iteration"));
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_last_iteration_ends_even_when_endpoint_is_down() -> AppResult<()> {
    let mut open_failures = vec![false];
    open_failures.extend([true; 200]);
    let transport = ScriptedTransport::new()
        .with_open_failures(&open_failures)
        .with_echo_steps(&[EchoStep::FailSend]);
    let mut harness = Harness::new(
        transport,
        WaitTimeStrategy::constant(Duration::from_secs(1)),
        Some(1),
    )?;
    let report = timeout(Duration::from_secs(100), harness.session(11).run())
        .await
        .map_err(|err| AppError::validation(format!("Session never finished: {}", err)))?;

    expect_closed(&report)?;
    expect_signature(&harness.drain(), &[CONNECT_OK, ECHO_ERR])
}

#[tokio::test]
async fn unrecoverable_echo_failure_closes_the_session() -> AppResult<()> {
    let transport = ScriptedTransport::new().with_echo_steps(&[EchoStep::FailClosedStream]);
    let mut harness = Harness::new(transport, no_wait(), None)?;
    let report = timeout(Duration::from_secs(5), harness.session(12).run())
        .await
        .map_err(|err| AppError::validation(format!("Session never finished: {}", err)))?;

    expect_closed(&report)?;
    if report.reconnects != 0 {
        return Err(AppError::validation("Unrecoverable failures must not reconnect"));
    }
    let events = harness.drain();
    expect_signature(&events, &[CONNECT_OK, ECHO_ERR])?;
    let described = events
        .get(1)
        .and_then(|event| event.error.as_deref())
        .is_some_and(|error| error.contains("stream already shut down"));
    if !described {
        return Err(AppError::validation("Echo failure should carry the close error"));
    }
    Ok(())
}

#[tokio::test]
async fn failing_close_records_disconnect_failure() -> AppResult<()> {
    let transport = ScriptedTransport::new().with_failing_close();
    let mut harness = Harness::new(transport, no_wait(), Some(1))?;
    let report = harness.session(4).run().await;

    expect_closed(&report)?;
    expect_signature(&harness.drain(), &[CONNECT_OK, ECHO_OK, DISCONNECT_ERR])
}

#[tokio::test(start_paused = true)]
async fn stop_during_wait_closes_without_new_echo() -> AppResult<()> {
    let mut harness = Harness::new(
        ScriptedTransport::new(),
        WaitTimeStrategy::constant(Duration::from_secs(60)),
        None,
    )?;
    let handle = tokio::spawn(harness.session(5).run());

    let first = harness.next_event().await?;
    let second = harness.next_event().await?;
    expect_signature(&[first, second], &[CONNECT_OK, ECHO_OK])?;
    harness.stop()?;

    let report = handle.await?;
    expect_closed(&report)?;
    if report.iterations != 1 {
        return Err(AppError::validation("No echo may start after stop"));
    }
    expect_signature(&harness.drain(), &[DISCONNECT_OK])
}

#[tokio::test(start_paused = true)]
async fn stop_mid_echo_lets_in_flight_echo_finish() -> AppResult<()> {
    let transport = ScriptedTransport::new().with_echo_latency(Duration::from_secs(1));
    let mut harness = Harness::new(transport, no_wait(), None)?;
    let handle = tokio::spawn(harness.session(6).run());

    let connected = harness.next_event().await?;
    expect_signature(&[connected], &[CONNECT_OK])?;
    // The session is now blocked inside its first receive.
    tokio::task::yield_now().await;
    harness.stop()?;

    let report = handle.await?;
    expect_closed(&report)?;
    let events = harness.drain();
    expect_signature(&events, &[ECHO_OK, DISCONNECT_OK])?;
    let echo_latency = events.first().map(|event| event.duration);
    if echo_latency < Some(Duration::from_secs(1)) {
        return Err(AppError::validation("In-flight echo should complete"));
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_while_reconnecting_ends_without_disconnect() -> AppResult<()> {
    let mut open_failures = vec![false];
    open_failures.extend([true; 50]);
    let transport = ScriptedTransport::new()
        .with_open_failures(&open_failures)
        .with_echo_steps(&[EchoStep::FailReceive]);
    let mut harness = Harness::new(
        transport,
        WaitTimeStrategy::constant(Duration::from_secs(1)),
        None,
    )?;
    let handle = tokio::spawn(harness.session(7).run());

    let mut seen = Vec::new();
    for _ in 0..5 {
        seen.push(harness.next_event().await?);
    }
    expect_signature(
        &seen,
        &[CONNECT_OK, ECHO_ERR, CONNECT_ERR, CONNECT_ERR, CONNECT_ERR],
    )?;
    harness.stop()?;

    let report = handle.await?;
    expect_closed(&report)?;
    if report.reconnects != 1 {
        return Err(AppError::validation("One reconnect cycle expected"));
    }
    let trailing = signature(&harness.drain());
    if trailing.iter().any(|event| *event != CONNECT_ERR) {
        return Err(AppError::validation(format!(
            "Only connect failures may trail the stop, got {:?}",
            trailing
        )));
    }
    if harness.context.transport.close_count() != 0 {
        return Err(AppError::validation("No connection was held to close"));
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_during_connect_finishes_connect_then_closes() -> AppResult<()> {
    let transport = ScriptedTransport::new().with_slow_opens();
    let mut harness = Harness::new(transport, no_wait(), None)?;
    let handle = tokio::spawn(harness.session(8).run());

    tokio::task::yield_now().await;
    harness.stop()?;

    let report = handle.await?;
    expect_closed(&report)?;
    if report.iterations != 0 {
        return Err(AppError::validation("No echo may start after stop"));
    }
    expect_signature(&harness.drain(), &[CONNECT_OK, DISCONNECT_OK])
}
