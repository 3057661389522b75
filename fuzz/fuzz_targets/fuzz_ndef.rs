#![no_main]

use hammer_nfc::{MessageReader, RecordReader};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Tag memory image: TLVs wrapping an NDEF message
    let mut records = RecordReader::new(MessageReader::new(data));
    // Every record consumes at least one byte
    for _ in 0..=data.len() {
        match records.next_record() {
            Ok(Some(r)) => {
                let _ = r.as_str();
            }
            Ok(None) | Err(_) => return,
        }
    }
    panic!("reader did not terminate");
});
