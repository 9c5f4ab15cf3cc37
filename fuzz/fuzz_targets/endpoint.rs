#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let (host, path) = input.split_once('\n').unwrap_or((input, "/echo"));
        if let Ok(endpoint) = echoswarm::fuzzing::endpoint_input(host, path) {
            debug_assert!(matches!(endpoint.url.scheme(), "ws" | "wss"));
            debug_assert_eq!(endpoint.name, endpoint.url.path());
        }
    }
});
