use clap::Parser;

use crate::error::{AppError, AppResult};

use super::EchoArgs;

pub(crate) fn parse_test_args<I, T>(args: I) -> AppResult<EchoArgs>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    EchoArgs::try_parse_from(args).map_err(AppError::from)
}
