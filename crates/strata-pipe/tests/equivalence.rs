//! Property tests: the two pipeline disciplines are observably
//! equivalent.
//!
//! The same traffic fed to a manual stack (with syncs) and an automatic
//! stack must produce identical boundary output, regardless of how the
//! wire bytes are split into reads.

use proptest::prelude::*;

use strata_link::{ChunkedStreamLink, EventLink, LinkEvent, StreamLink, TopLoopbackLink};
use strata_pipe::{AutomaticPipeline, Layer, ManualPipeline};

fn payloads_of(events: Vec<LinkEvent>) -> Vec<Vec<u8>> {
    events
        .into_iter()
        .filter_map(|event| event.into_data().map(|data| data.into_data()))
        .collect()
}

fn framed_layers() -> Vec<Layer> {
    let wire = StreamLink::named("wire");
    let framer = ChunkedStreamLink::new();
    let app = EventLink::named("app");
    vec![
        Layer::from(wire.handle()),
        Layer::from(framer.handle()),
        Layer::from(app.handle()),
    ]
}

fn echo_layers() -> Vec<Layer> {
    let wire = StreamLink::named("wire");
    let framer = ChunkedStreamLink::new();
    let echo = TopLoopbackLink::new();
    vec![
        Layer::from(wire.handle()),
        Layer::from(framer.handle()),
        Layer::from(echo.handle()),
    ]
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut framed = vec![0u8];
    framed.extend_from_slice(payload);
    framed.push(0);
    framed
}

proptest! {
    /// Wire bytes fed in arbitrary pieces deliver the same payload
    /// sequence through both disciplines.
    #[test]
    fn test_disciplines_deliver_identical_upward_payloads(
        payloads in prop::collection::vec(prop::collection::vec(1u8..=255, 1..24), 0..8),
        piece_len in 1usize..16,
    ) {
        let wire_bytes: Vec<u8> = payloads.iter().flat_map(|payload| frame(payload)).collect();

        let manual = ManualPipeline::new(framed_layers()).unwrap();
        let automatic = AutomaticPipeline::new(framed_layers()).unwrap();

        for piece in wire_bytes.chunks(piece_len) {
            manual.to_read(piece);
            manual.sync();
            automatic.to_read(piece);
        }

        let from_manual = payloads_of(manual.receive_all());
        let from_automatic = payloads_of(automatic.receive_all());
        prop_assert_eq!(&from_manual, &payloads);
        prop_assert_eq!(&from_automatic, &payloads);
    }

    /// Sent payload sequences emit identical wire bytes through both
    /// disciplines.
    #[test]
    fn test_disciplines_emit_identical_wire_bytes(
        payloads in prop::collection::vec(prop::collection::vec(1u8..=255, 1..24), 0..8),
    ) {
        let manual = ManualPipeline::new(framed_layers()).unwrap();
        let automatic = AutomaticPipeline::new(framed_layers()).unwrap();

        for payload in &payloads {
            manual.send_data(payload.clone());
            automatic.send_data(payload.clone());
        }
        manual.sync();

        prop_assert_eq!(manual.to_write(), automatic.to_write());
    }

    /// A loopback above the framer reflects the same bytes back out of
    /// both disciplines.
    #[test]
    fn test_disciplines_reflect_identically(
        payloads in prop::collection::vec(prop::collection::vec(1u8..=255, 1..24), 0..6),
        piece_len in 1usize..16,
    ) {
        let wire_bytes: Vec<u8> = payloads.iter().flat_map(|payload| frame(payload)).collect();

        let manual = ManualPipeline::new(echo_layers()).unwrap();
        let automatic = AutomaticPipeline::new(echo_layers()).unwrap();

        for piece in wire_bytes.chunks(piece_len) {
            manual.to_read(piece);
            manual.sync();
            automatic.to_read(piece);
        }
        manual.sync();

        prop_assert_eq!(manual.to_write(), automatic.to_write());
    }
}
