#![no_main]

use libfuzzer_sys::fuzz_target;
use strata_link::{ChunkedStreamLink, StreamLink, TopLoopbackLink};
use strata_pipe::{AutomaticPipeline, Layer};

fuzz_target!(|data: &[u8]| {
    // Arbitrary wire traffic through an echo stack must never panic,
    // including the reflected writes re-entering the hook chain.
    let wire = StreamLink::new();
    let framer = ChunkedStreamLink::new();
    let echo = TopLoopbackLink::new();
    let stack = AutomaticPipeline::new(vec![
        Layer::from(wire.handle()),
        Layer::from(framer.handle()),
        Layer::from(echo.handle()),
    ])
    .unwrap();

    for piece in data.chunks(5) {
        stack.to_read(piece);
    }
    let _ = stack.to_write();
});
