use std::ffi::OsString;

use clap::{ArgMatches, CommandFactory, FromArgMatches};

use crate::app::run_local;
use crate::args::EchoArgs;
use crate::error::AppResult;

/// Parses the command line, merges the config file, and runs the swarm on a
/// multi-threaded runtime.
///
/// # Errors
///
/// Returns an error when arguments or config are invalid, or the run fails.
pub fn run() -> AppResult<()> {
    let args = parse_args(std::env::args_os())?;

    crate::logger::init_logging(args.verbose, args.no_color);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_local(&args))
}

fn parse_args<I>(raw_args: I) -> AppResult<EchoArgs>
where
    I: IntoIterator<Item = OsString>,
{
    let matches = EchoArgs::command().get_matches_from(raw_args);
    let mut args = EchoArgs::from_arg_matches(&matches)?;
    apply_config(&mut args, &matches)?;
    Ok(args)
}

fn apply_config(args: &mut EchoArgs, matches: &ArgMatches) -> AppResult<()> {
    let loaded_config = crate::config::load_config(args.config.as_deref())?;
    if let Some(config) = loaded_config.as_ref() {
        crate::config::apply_config(args, matches, config)?;
    }
    Ok(())
}
