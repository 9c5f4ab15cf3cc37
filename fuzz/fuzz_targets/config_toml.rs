#![no_main]

use echoswarm::config::types::ConfigFile;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let parsed: Option<ConfigFile> = toml::from_str(input).ok();
        let applied = echoswarm::fuzzing::apply_config_from_toml(input);
        if applied.is_ok() {
            if let Some(config) = parsed {
                debug_assert!(config.users != Some(0));
                debug_assert!(config.spawn_rate != Some(0));
                if let Some(wait) = config.wait.as_ref() {
                    debug_assert!(wait.constant.is_none() || (wait.min.is_none() && wait.max.is_none()));
                }
            }
        }
    }
});
