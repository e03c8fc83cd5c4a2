#![no_main]

use libfuzzer_sys::fuzz_target;
use strata_link::ChunkedStreamLink;

fuzz_target!(|data: &[u8]| {
    // Dechunking arbitrary wire reads must never panic or surface an
    // empty payload.
    let framer = ChunkedStreamLink::new();
    let handle = framer.handle();
    for piece in data.chunks(3) {
        handle.to_read(piece);
    }
    for event in handle.receive_all() {
        if let Some(data) = event.as_data() {
            assert!(!data.data().is_empty());
        }
    }
});
