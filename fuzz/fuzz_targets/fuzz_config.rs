#![no_main]

use libfuzzer_sys::fuzz_target;
use pbsnbd::ConfigBuilder;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut builder = ConfigBuilder::new();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once('=') {
            let _ = builder.set(key, value);
        }
    }
    if let Ok(config) = builder.complete() {
        assert!(!config.image.is_empty());
        assert!(!config.vmid.is_empty());
    }
});
