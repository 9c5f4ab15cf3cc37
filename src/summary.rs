//! Plain-text end-of-run report.
use std::time::Duration;

use crate::metrics::{AggregateStats, OperationStats};
use crate::scheduler::SchedulerReport;
use crate::session::SessionState;

const AGGREGATED_LABEL: &str = "Aggregated";

/// Effective run settings echoed before the table.
#[derive(Debug, Clone)]
pub struct Selections {
    pub url: String,
    pub users: usize,
    pub spawn_rate: u64,
    pub wait: String,
    pub connect_timeout: Duration,
    pub receive_timeout: Option<Duration>,
    pub run_time: Option<Duration>,
    pub iterations: Option<u64>,
    pub seed: Option<u64>,
}

#[must_use]
pub fn selection_lines(selections: &Selections) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push("Selections:".to_owned());
    lines.push(format!("url: {}", selections.url));
    lines.push(format!("users: {}", selections.users));
    lines.push(format!("spawn_rate: {}/s", selections.spawn_rate));
    lines.push(format!("wait: {}", selections.wait));
    lines.push(format!(
        "connect_timeout_ms: {}",
        selections.connect_timeout.as_millis()
    ));
    lines.push(format!(
        "receive_timeout_ms: {}",
        format_opt_millis(selections.receive_timeout)
    ));
    lines.push(format!(
        "run_time: {}",
        selections
            .run_time
            .map_or_else(|| "until stopped".to_owned(), |value| format!("{:?}", value))
    ));
    lines.push(format!(
        "iterations: {}",
        format_opt_u64(selections.iterations)
    ));
    lines.push(format!("seed: {}", format_opt_u64(selections.seed)));
    lines
}

/// Per-(kind, name) table followed by an aggregated row and an error report.
#[must_use]
pub fn summary_lines(stats: &AggregateStats, elapsed: Duration) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(header_line());
    for (key, operation) in stats.iter() {
        lines.push(row_line(key.kind.as_str(), &key.name, operation, elapsed));
    }
    lines.push("-".repeat(header_line().len()));
    match stats.overall() {
        Some(total) => lines.push(row_line("", AGGREGATED_LABEL, &total, elapsed)),
        None => lines.push(format!("{:<12} {:<24} (no events recorded)", "", AGGREGATED_LABEL)),
    }

    let mut error_lines = Vec::new();
    for (key, operation) in stats.iter() {
        for (error, count) in &operation.errors {
            error_lines.push(format!(
                "{:>10}  {} {}: {}",
                count,
                key.kind.as_str(),
                key.name,
                error
            ));
        }
    }
    if !error_lines.is_empty() {
        lines.push(String::new());
        lines.push("Error report:".to_owned());
        lines.push(format!("{:>10}  {}", "# occurr.", "Error"));
        lines.extend(error_lines);
    }
    lines
}

#[must_use]
pub fn session_lines(report: &SchedulerReport, elapsed: Duration) -> Vec<String> {
    let closed = report
        .sessions
        .iter()
        .filter(|session| session.state == SessionState::Closed)
        .count();
    let never_connected = report
        .sessions
        .iter()
        .filter(|session| session.iterations == 0)
        .count();
    let reconnects = report
        .sessions
        .iter()
        .fold(0_u64, |acc, session| acc.saturating_add(session.reconnects));
    vec![
        format!("Duration: {}s", elapsed.as_secs()),
        format!("Sessions spawned: {}", report.spawned),
        format!("Sessions closed: {}", closed),
        format!("Sessions without an echo: {}", never_connected),
        format!("Reconnects: {}", reconnects),
    ]
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

fn header_line() -> String {
    format!(
        "{:<12} {:<24} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>10} {:>10}",
        "Type",
        "Name",
        "# reqs",
        "# fails",
        "Avg",
        "Min",
        "Max",
        "p50",
        "p90",
        "p99",
        "Avg bytes",
        "req/s"
    )
}

fn row_line(kind: &str, name: &str, stats: &OperationStats, elapsed: Duration) -> String {
    let (p50, p90, p99) = stats
        .histogram
        .as_ref()
        .map_or((0, 0, 0), |histogram| histogram.percentiles());
    format!(
        "{:<12} {:<24} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>10} {:>10}",
        kind,
        truncate(name, 24),
        stats.count(),
        format!("{}({})", stats.failures, failure_percent(stats)),
        stats.mean_latency().as_millis(),
        stats.min_latency().as_millis(),
        stats.max_latency.as_millis(),
        micros_to_millis(p50),
        micros_to_millis(p90),
        micros_to_millis(p99),
        average_bytes(stats),
        format_rate_x100(rate_x100(stats.count(), elapsed)),
    )
}

fn failure_percent(stats: &OperationStats) -> String {
    let total = stats.count();
    if total == 0 {
        return "0%".to_owned();
    }
    let percent = u128::from(stats.failures)
        .saturating_mul(100)
        .checked_div(u128::from(total))
        .unwrap_or(0);
    format!("{}%", percent)
}

fn average_bytes(stats: &OperationStats) -> u128 {
    stats
        .received_bytes
        .checked_div(u128::from(stats.successes))
        .unwrap_or(0)
}

fn micros_to_millis(micros: u64) -> u64 {
    micros.checked_div(1_000).unwrap_or(0)
}

/// Events per second scaled by 100.
fn rate_x100(count: u64, elapsed: Duration) -> u64 {
    let elapsed_ms = elapsed.as_millis().max(1);
    let scaled = u128::from(count)
        .saturating_mul(100_000)
        .checked_div(elapsed_ms)
        .unwrap_or(0);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

fn format_rate_x100(value: u64) -> String {
    format!(
        "{}.{:02}",
        value.checked_div(100).unwrap_or(0),
        value.checked_rem(100).unwrap_or(0)
    )
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_owned();
    }
    let mut shortened: String = value.chars().take(width.saturating_sub(1)).collect();
    shortened.push('~');
    shortened
}

fn format_opt_u64(value: Option<u64>) -> String {
    value.map_or_else(|| "none".to_owned(), |value| value.to_string())
}

fn format_opt_millis(value: Option<Duration>) -> String {
    value.map_or_else(|| "none".to_owned(), |value| value.as_millis().to_string())
}
