#![no_main]

use lobgate_core::config::GateConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = GateConfig::from_toml_str(text) {
        // Anything that parses and validates must survive a round trip.
        let rendered = config.to_toml().expect("valid config serializes");
        let reparsed = GateConfig::from_toml_str(&rendered).expect("rendered config parses");
        assert_eq!(reparsed.thresholds, config.thresholds);
        assert_eq!(reparsed.input, config.input);
    }
});
