use std::time::Duration;

use serde::Deserialize;

use crate::args::parsers::parse_duration_value;
use crate::error::ValidationError;

/// Mirrors the CLI flags. Every field is optional; unset fields leave the
/// CLI value (or its default) untouched.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub host: Option<String>,
    pub path: Option<String>,
    pub users: Option<usize>,
    pub spawn_rate: Option<u64>,
    pub wait: Option<WaitConfig>,
    pub connect_timeout: Option<DurationValue>,
    pub receive_timeout: Option<DurationValue>,
    pub run_time: Option<DurationValue>,
    pub iterations: Option<u64>,
    pub seed: Option<u64>,
    pub progress_interval: Option<DurationValue>,
    pub no_progress: Option<bool>,
    pub verbose: Option<bool>,
    pub no_color: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WaitConfig {
    pub min: Option<DurationValue>,
    pub max: Option<DurationValue>,
    pub constant: Option<DurationValue>,
}

/// Either whole seconds (`30`) or a suffixed string (`"500ms"`).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> Result<Duration, ValidationError> {
        let duration = self.to_wait()?;
        if duration.as_millis() == 0 {
            return Err(ValidationError::DurationZero);
        }
        Ok(duration)
    }

    /// Zero is allowed.
    pub(crate) fn to_wait(&self) -> Result<Duration, ValidationError> {
        match self {
            DurationValue::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            DurationValue::Text(text) => parse_duration_value(text),
        }
    }
}
