#![no_main]

use clap::Parser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let mut args = Vec::new();
        args.push("echoswarm".to_owned());
        for token in input.split_whitespace().take(64) {
            args.push(token.to_owned());
        }
        let arg_refs: Vec<&str> = args.iter().map(|value| value.as_str()).collect();
        if let Ok(parsed) = echoswarm::args::EchoArgs::try_parse_from(arg_refs) {
            debug_assert!(parsed.users.get() >= 1);
            debug_assert!(parsed.spawn_rate.get() >= 1);
            debug_assert!(parsed.connect_timeout.as_millis() > 0);
        }
    }
});
