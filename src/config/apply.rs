use std::time::Duration;

use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::{EchoArgs, PositiveU64, PositiveUsize};
use crate::error::{AppError, AppResult, ConfigError};

use super::types::{ConfigFile, DurationValue, WaitConfig};

/// Applies configuration values to CLI arguments. Values given explicitly
/// on the command line win.
///
/// # Errors
///
/// Returns an error when config values are invalid or conflict with each other.
pub fn apply_config(
    args: &mut EchoArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> AppResult<()> {
    if !is_cli(matches, "host")
        && let Some(host) = config.host.clone()
    {
        args.host = host;
    }

    if !is_cli(matches, "path")
        && let Some(path) = config.path.clone()
    {
        args.path = path;
    }

    if !is_cli(matches, "users")
        && let Some(users) = config.users
    {
        args.users = ensure_positive_usize(users, "users")?;
    }

    if !is_cli(matches, "spawn_rate")
        && let Some(rate) = config.spawn_rate
    {
        args.spawn_rate = ensure_positive_u64(rate, "spawn_rate")?;
    }

    if let Some(wait) = config.wait.as_ref() {
        apply_wait(args, matches, wait)?;
    }

    if !is_cli(matches, "connect_timeout")
        && let Some(timeout) = config.connect_timeout.as_ref()
    {
        args.connect_timeout = duration(timeout, "connect_timeout")?;
    }

    if !is_cli(matches, "receive_timeout")
        && let Some(timeout) = config.receive_timeout.as_ref()
    {
        args.receive_timeout = Some(duration(timeout, "receive_timeout")?);
    }

    if !is_cli(matches, "run_time")
        && let Some(run_time) = config.run_time.as_ref()
    {
        args.run_time = Some(duration(run_time, "run_time")?);
    }

    if !is_cli(matches, "iterations")
        && let Some(iterations) = config.iterations
    {
        args.iterations = Some(ensure_positive_u64(iterations, "iterations")?);
    }

    if !is_cli(matches, "seed")
        && let Some(seed) = config.seed
    {
        args.seed = Some(seed);
    }

    if !is_cli(matches, "progress_interval")
        && let Some(interval) = config.progress_interval.as_ref()
    {
        args.progress_interval = duration(interval, "progress_interval")?;
    }

    if !is_cli(matches, "no_progress")
        && let Some(no_progress) = config.no_progress
    {
        args.no_progress = no_progress;
    }

    if !is_cli(matches, "verbose")
        && let Some(verbose) = config.verbose
    {
        args.verbose = verbose;
    }

    if !is_cli(matches, "no_color")
        && let Some(no_color) = config.no_color
    {
        args.no_color = no_color;
    }

    Ok(())
}

fn apply_wait(args: &mut EchoArgs, matches: &ArgMatches, wait: &WaitConfig) -> AppResult<()> {
    if wait.constant.is_some() && (wait.min.is_some() || wait.max.is_some()) {
        return Err(AppError::config(ConfigError::Conflict {
            left: "wait.constant",
            right: "wait.min/wait.max",
        }));
    }

    // Any explicit wait flag on the command line overrides the whole section.
    let cli_wait = ["wait_min", "wait_max", "wait_constant"]
        .iter()
        .any(|name| is_cli(matches, name));
    if cli_wait {
        return Ok(());
    }

    if let Some(constant) = wait.constant.as_ref() {
        args.wait_constant = Some(wait_duration(constant, "wait.constant")?);
        return Ok(());
    }
    if let Some(min) = wait.min.as_ref() {
        args.wait_min = wait_duration(min, "wait.min")?;
    }
    if let Some(max) = wait.max.as_ref() {
        args.wait_max = wait_duration(max, "wait.max")?;
    }
    Ok(())
}

fn is_cli(matches: &ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(ValueSource::CommandLine)
}

fn ensure_positive_u64(value: u64, field: &str) -> AppResult<PositiveU64> {
    PositiveU64::try_from(value).map_err(|err| {
        AppError::config(ConfigError::FieldMustBePositive {
            field: field.to_owned(),
            source: err,
        })
    })
}

fn ensure_positive_usize(value: usize, field: &str) -> AppResult<PositiveUsize> {
    PositiveUsize::try_from(value).map_err(|err| {
        AppError::config(ConfigError::FieldMustBePositive {
            field: field.to_owned(),
            source: err,
        })
    })
}

fn duration(value: &DurationValue, field: &'static str) -> AppResult<Duration> {
    value
        .to_duration()
        .map_err(|err| AppError::config(ConfigError::InvalidDuration { field, source: err }))
}

fn wait_duration(value: &DurationValue, field: &'static str) -> AppResult<Duration> {
    value
        .to_wait()
        .map_err(|err| AppError::config(ConfigError::InvalidDuration { field, source: err }))
}
