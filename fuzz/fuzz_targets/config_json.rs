#![no_main]

use echoswarm::config::types::ConfigFile;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let parsed: Option<ConfigFile> = serde_json::from_slice(data).ok();
    let applied = echoswarm::fuzzing::apply_config_from_json(data);
    if applied.is_ok() {
        if let Some(config) = parsed {
            debug_assert!(config.users != Some(0));
            debug_assert!(config.iterations != Some(0));
        }
    }
});
