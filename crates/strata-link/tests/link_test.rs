//! Hand-wired stacks driven through handles and hooks alone.
//!
//! Each test couples links the way a composition layer would, by
//! installing boundary hooks that feed the neighboring link, and checks
//! the traffic that crosses the far boundary.

use std::rc::Rc;

use strata_link::{
    BottomLoopbackLink, ChunkedStreamLink, ChunkedStreamLinkConfig, DelayedEventLink, Direction,
    EventLink, LinkEvent, LinkException, Result, TopLoopbackLink,
};

fn payload(event: LinkEvent) -> Option<Vec<u8>> {
    event.into_data().map(|data| data.into_data())
}

fn requested(event: &LinkEvent) -> f64 {
    match event {
        LinkEvent::ClockRequest(request) => request.requested_time(),
        other => panic!("expected a clock request, got {other}"),
    }
}

/// Application events sent into the top layer come out the bottom framed.
#[test]
fn test_sent_events_cross_into_framed_bytes() {
    let framer = ChunkedStreamLink::new();
    let app = EventLink::named("app");
    let below = framer.handle();
    app.set_after_send(Rc::new(move |event| {
        below.send(event);
    }));

    app.send_data(b"hello".to_vec());
    assert_eq!(framer.to_write(), Some(b"\0hello\0".to_vec()));

    app.send_data(b"again".to_vec());
    assert_eq!(framer.to_write(), Some(b"\0again\0".to_vec()));
}

/// Wire bytes fed into the bottom layer surface at the top re-stamped by
/// every layer they crossed, even when chunks span reads.
#[test]
fn test_read_bytes_climb_to_the_top_layer() {
    let framer = ChunkedStreamLink::new();
    let app = EventLink::named("app");
    let above = app.handle();
    framer.set_after_receive(Rc::new(move |event| {
        above.to_receive(event);
    }));

    framer.to_read(b"\0wor");
    assert!(!app.has_receive());

    framer.to_read(b"ld\0");
    let event = app.receive().unwrap();
    let data = event.as_data().unwrap();
    assert_eq!(data.data(), b"world");
    assert_eq!(data.direction(), Direction::Up);
    assert_eq!(&**data.origin(), "app");
    assert!(data.previous().is_some());
}

/// A loopback cap turns the stack into an echo: bytes fed below come back
/// below, re-framed, without anything being pumped by hand.
#[test]
fn test_loopback_cap_reflects_through_the_framer() {
    let framer = ChunkedStreamLink::new();
    let top = TopLoopbackLink::new();
    let above = top.handle();
    framer.set_after_receive(Rc::new(move |event| {
        above.to_receive(event);
    }));
    let below = framer.handle();
    top.set_after_send(Rc::new(move |event| {
        below.send(event);
    }));

    framer.to_read(b"\0ping\0\0pong\0");
    assert_eq!(framer.to_write(), Some(b"\0ping\0\0pong\0".to_vec()));
}

/// Sent traffic reflected by a bottom cap arrives back above, derived
/// upward by the layer that sent it.
#[test]
fn test_bottom_cap_reflects_sent_events() {
    let app = EventLink::named("app");
    let bottom = BottomLoopbackLink::new();
    let below = bottom.handle();
    app.set_after_send(Rc::new(move |event| {
        below.send(event);
    }));
    let above = app.handle();
    bottom.set_after_receive(Rc::new(move |event| {
        above.to_receive(event);
    }));

    app.send_data(b"ping".to_vec());

    let event = app.receive().unwrap();
    let data = event.as_data().unwrap();
    assert_eq!(data.data(), b"ping");
    assert_eq!(data.direction(), Direction::Up);
}

/// Custom separators frame and deframe symmetrically.
#[test]
fn test_comma_framing_round_trip() -> Result<()> {
    let framer = ChunkedStreamLink::with_config(ChunkedStreamLinkConfig {
        separator: b",".to_vec(),
        begin_chunk_separator: false,
        ..ChunkedStreamLinkConfig::default()
    })?;

    framer.send_data(b"foo".to_vec());
    assert_eq!(framer.to_write(), Some(b"foo,".to_vec()));

    framer.to_read(b"bar,baz,");
    let received: Vec<_> = framer.receive_all().into_iter().filter_map(payload).collect();
    assert_eq!(received, vec![b"bar".to_vec(), b"baz".to_vec()]);
    Ok(())
}

/// A delayed link's wake-up request climbs through the layer above it, and
/// the held event follows once the clock is pushed to its deadline.
#[test]
fn test_wake_up_request_climbs_the_stack() {
    let radio = DelayedEventLink::new();
    let app = EventLink::named("app");
    let above = app.handle();
    radio.set_after_receive(Rc::new(move |event| {
        above.to_receive(event);
    }));

    radio.to_receive_data(b"held".to_vec());
    let events = app.receive_all();
    assert_eq!(events.len(), 1);
    assert_eq!(requested(&events[0]), 1.0);

    let pending = radio.update_clock(0.5);
    assert_eq!(pending.map(|request| request.requested_time()), Some(1.0));
    assert!(!app.has_receive());

    assert!(radio.update_clock(1.0).is_none());
    let event = app.receive().unwrap();
    assert_eq!(event.as_data().unwrap().data(), b"held");
    assert_eq!(&**event.as_data().unwrap().origin(), "app");
}

/// Failures travel the stack as ordinary events, identity intact.
#[test]
fn test_failures_cross_layers_as_events() {
    let inner = EventLink::named("inner");
    let outer = EventLink::named("outer");
    let above = outer.handle();
    inner.set_after_receive(Rc::new(move |event| {
        above.to_receive(event);
    }));

    let exception = LinkException::new(anyhow::anyhow!("checksum mismatch"), Direction::Up);
    let exception_id = exception.id();

    inner.to_receive(exception);
    assert_eq!(outer.receive().unwrap().id(), exception_id);
}
