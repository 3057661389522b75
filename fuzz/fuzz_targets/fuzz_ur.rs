#![no_main]

use hammer_core::{ur, urtypes};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    // One UR part per line
    let mut d = ur::Decoder::new();
    for part in s.lines() {
        if d.add(part).is_err() {
            return;
        }
        let p = d.progress();
        assert!((0.0..=1.0).contains(&p));
    }
    if let Ok(Some((typ, enc))) = d.result() {
        let _ = urtypes::parse(&typ, &enc);
    }
});
