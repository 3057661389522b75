#![no_main]

use hammer_picobin::{Image, FLASH_BASE, PUBKEY_LEN, SIGNATURE_LEN};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(img) = Image::parse(data) else {
        return;
    };
    let _ = img.hash_data(FLASH_BASE);
    let _ = img.hash();
    let _ = img.signature();

    let Ok(signed) = img.sign(&[0xaa; PUBKEY_LEN], &[0xbb; SIGNATURE_LEN]) else {
        return;
    };
    if let Ok(img) = Image::parse(&signed) {
        let _ = img.hash_data(FLASH_BASE);
        let _ = img.signature();
    }
});
