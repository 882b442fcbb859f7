#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = belegfluss::engine::EngineConfig::from_json(s) {
            assert!(config.number_padding >= 1);
        }
    }
});
