use clap::Parser;
use std::time::Duration;

use super::parsers::{
    parse_duration_arg, parse_positive_u64, parse_positive_usize, parse_wait_arg,
};
use super::types::{PositiveU64, PositiveUsize};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Swarm a WebSocket echo endpoint with concurrent sessions and report connect and round-trip latency."
)]
pub struct EchoArgs {
    /// Target base URL (ws:// or wss://)
    #[arg(long, default_value = "ws://localhost:4001")]
    pub host: String,

    /// Path of the echo endpoint, appended to --host
    #[arg(long, default_value = "/echo")]
    pub path: String,

    /// Number of concurrent sessions to ramp up to
    #[arg(
        long = "users",
        short = 'c',
        default_value = "10",
        value_parser = parse_positive_usize
    )]
    pub users: PositiveUsize,

    /// Sessions started per second during ramp-up
    #[arg(
        long = "spawn-rate",
        short = 'r',
        default_value = "1",
        value_parser = parse_positive_u64
    )]
    pub spawn_rate: PositiveU64,

    /// Minimum wait between echo iterations (supports ms/s/m/h)
    #[arg(long = "wait-min", default_value = "500ms", value_parser = parse_wait_arg)]
    pub wait_min: Duration,

    /// Maximum wait between echo iterations (supports ms/s/m/h)
    #[arg(long = "wait-max", default_value = "2s", value_parser = parse_wait_arg)]
    pub wait_max: Duration,

    /// Fixed wait between echo iterations instead of a random one (supports ms/s/m/h)
    #[arg(
        long = "wait-constant",
        value_parser = parse_wait_arg,
        conflicts_with_all = ["wait_min", "wait_max"]
    )]
    pub wait_constant: Option<Duration>,

    /// Timeout for the WebSocket handshake (supports ms/s/m/h)
    #[arg(
        long = "connect-timeout",
        default_value = "10s",
        value_parser = parse_duration_arg
    )]
    pub connect_timeout: Duration,

    /// Fail an echo when no reply arrives within this time (supports ms/s/m/h)
    #[arg(long = "receive-timeout", value_parser = parse_duration_arg)]
    pub receive_timeout: Option<Duration>,

    /// Stop after this long; runs until Ctrl+C otherwise (supports ms/s/m/h)
    #[arg(long = "run-time", short = 't', value_parser = parse_duration_arg)]
    pub run_time: Option<Duration>,

    /// Close each session after N echo iterations
    #[arg(long = "iterations", value_parser = parse_positive_u64)]
    pub iterations: Option<PositiveU64>,

    /// Seed for reproducible wait times
    #[arg(long)]
    pub seed: Option<u64>,

    /// Interval between progress log lines (supports ms/s/m/h)
    #[arg(
        long = "progress-interval",
        default_value = "5s",
        value_parser = parse_duration_arg
    )]
    pub progress_interval: Duration,

    /// Disable periodic progress log lines
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Enable verbose logging (sets log level to debug unless overridden by ECHOSWARM_LOG/RUST_LOG)
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Disable ANSI colors in log output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Path to config file (TOML/JSON). Defaults to ./echoswarm.toml or ./echoswarm.json if present.
    #[arg(long)]
    pub config: Option<String>,
}
