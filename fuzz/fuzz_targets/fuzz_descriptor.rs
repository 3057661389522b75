#![no_main]

use hammer_core::{descriptor, urtypes, UR_CRYPTO_OUTPUT};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // CBOR payloads
    if let Ok(urtypes::UrValue::Output(desc)) = urtypes::parse(UR_CRYPTO_OUTPUT, data) {
        if let Ok(enc) = desc.encode() {
            let _ = urtypes::parse(UR_CRYPTO_OUTPUT, &enc);
        }
    }

    // Text descriptors and UR strings
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = descriptor::parse(s);
    }
});
