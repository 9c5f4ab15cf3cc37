use std::time::Duration;

use clap::{ArgMatches, CommandFactory, FromArgMatches};

use crate::args::parsers::{parse_duration_arg, parse_duration_value};
use crate::args::{EchoArgs, PositiveU64, PositiveUsize};
use crate::config::apply_config;
use crate::config::types::ConfigFile;
use crate::error::{AppError, AppResult};
use crate::session::Endpoint;

thread_local! {
    static BASE_MATCHES: ArgMatches = EchoArgs::command().get_matches_from(["echoswarm"]);
}

/// Parses a CLI duration argument (e.g. `10s`, `500ms`).
///
/// # Errors
///
/// Returns an error when the duration is invalid.
pub fn parse_duration_arg_input(input: &str) -> AppResult<Duration> {
    parse_duration_arg(input)
}

/// Parses a duration value, allowing zero.
///
/// # Errors
///
/// Returns an error when the duration is invalid.
pub fn parse_duration_value_input(input: &str) -> AppResult<Duration> {
    parse_duration_value(input).map_err(AppError::from)
}

/// Parses a positive u64 value.
///
/// # Errors
///
/// Returns an error when the value is zero or not a number.
pub fn parse_positive_u64_input(input: &str) -> AppResult<u64> {
    input
        .parse::<PositiveU64>()
        .map(PositiveU64::get)
        .map_err(AppError::from)
}

/// Parses a positive usize value.
///
/// # Errors
///
/// Returns an error when the value is zero or not a number.
pub fn parse_positive_usize_input(input: &str) -> AppResult<usize> {
    input
        .parse::<PositiveUsize>()
        .map(PositiveUsize::get)
        .map_err(AppError::from)
}

/// Builds an endpoint from a host and path pair.
///
/// # Errors
///
/// Returns an error when the joined URL is not a valid `ws`/`wss` URL.
pub fn endpoint_input(host: &str, path: &str) -> AppResult<Endpoint> {
    Endpoint::from_host(host, path, Duration::from_secs(10)).map_err(AppError::from)
}

/// Parses TOML config and applies it to defaults.
///
/// # Errors
///
/// Returns an error when parsing or validation fails.
pub fn apply_config_from_toml(input: &str) -> AppResult<()> {
    let config: ConfigFile = toml::from_str(input)?;
    apply_to_defaults(&config)
}

/// Parses JSON config and applies it to defaults.
///
/// # Errors
///
/// Returns an error when parsing or validation fails.
pub fn apply_config_from_json(input: &[u8]) -> AppResult<()> {
    let config: ConfigFile = serde_json::from_slice(input)?;
    apply_to_defaults(&config)
}

fn apply_to_defaults(config: &ConfigFile) -> AppResult<()> {
    BASE_MATCHES.with(|matches| {
        let mut args = EchoArgs::from_arg_matches(matches)?;
        apply_config(&mut args, matches, config)
    })
}
