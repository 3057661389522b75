#![no_main]

use hammer_core::Codex32;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(share) = Codex32::parse(s) {
        // Valid shares survive a round trip unchanged
        let again = Codex32::parse(share.as_str()).unwrap();
        assert_eq!(share, again);
        let _ = share.seed();
        let _ = share.parts();

        // Interpolating a lone share must not panic
        let _ = Codex32::interpolate(std::slice::from_ref(&share), 's');
    }
});
