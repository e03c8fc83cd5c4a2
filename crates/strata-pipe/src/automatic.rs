//! Hook-driven pipe: traffic crosses the gap the moment it is produced.
//!
//! An [`AutomaticPipe`] installs itself as the output disposition of every
//! member facing the gap, so upward output of the bottom layer is fanned
//! into the top layer (and vice versa) as a side effect of processing,
//! with no sync step. Clock updates are still delivered explicitly, in
//! two phases: downward-moving traffic is released first, then the
//! upward-moving backlog, so a wake-up settles the whole stack in one
//! tick.

use std::rc::Rc;

use tracing::{debug, trace};

use strata_link::{EventHook, LinkClockRequest, LinkEvent, StreamHook};

use crate::pipe::{Composite, Layer, PipeCore, PipeMember, PipeShared, Span};

/// A pipe whose transfers run from hooks as traffic appears.
///
/// Cloning shares the pipe; all methods take `&self` and may be called
/// re-entrantly from hooks.
#[derive(Clone)]
pub struct AutomaticPipe {
    core: Rc<PipeCore>,
}

impl AutomaticPipe {
    /// Stand a pipe between a bottom and a top layer and splice the two
    /// together through their output dispositions.
    pub fn new(bottom: impl Into<Layer>, top: impl Into<Layer>) -> Self {
        let pipe = Self {
            core: Rc::new(PipeCore::new(Span::Layered {
                bottom: bottom.into(),
                top: top.into(),
            })),
        };
        pipe.install_hooks();
        pipe
    }

    /// Wrap a single layer in a pipe that installs no hooks but still
    /// presents the layer's boundary surface.
    pub fn solo(members: impl Into<Layer>) -> Self {
        Self {
            core: Rc::new(PipeCore::new(Span::Solo(members.into()))),
        }
    }

    /// Splice the layers together. Hook closures capture only member
    /// handles and the shared state cell, never the pipe itself, so
    /// echoed traffic can re-enter the pipe mid-delivery.
    fn install_hooks(&self) {
        if self.core.is_solo() {
            return;
        }

        let shared = Rc::clone(self.core.shared());
        let tops: Vec<PipeMember> = self.core.top().to_vec();
        let up_events: EventHook = Rc::new(move |event| {
            if let LinkEvent::ClockRequest(request) = event {
                PipeShared::capture_into(&shared, request);
                return;
            }
            if !PipeShared::connected_up(&shared) {
                return;
            }
            for top in &tops {
                top.to_receive(event.clone());
            }
        });

        let shared = Rc::clone(self.core.shared());
        let tops: Vec<PipeMember> = self.core.top().to_vec();
        let up_bytes: StreamHook = Rc::new(move |buffer| {
            if !PipeShared::connected_up(&shared) {
                return;
            }
            for top in &tops {
                top.to_read(&buffer);
            }
        });

        let shared = Rc::clone(self.core.shared());
        let bottoms: Vec<PipeMember> = self.core.bottom().to_vec();
        let down_events: EventHook = Rc::new(move |event| {
            if let LinkEvent::ClockRequest(request) = event {
                PipeShared::capture_into(&shared, request);
                return;
            }
            if !PipeShared::connected_down(&shared) {
                return;
            }
            for bottom in &bottoms {
                bottom.send(event.clone());
            }
        });

        let shared = Rc::clone(self.core.shared());
        let bottoms: Vec<PipeMember> = self.core.bottom().to_vec();
        let down_bytes: StreamHook = Rc::new(move |buffer| {
            if !PipeShared::connected_down(&shared) {
                return;
            }
            for bottom in &bottoms {
                bottom.write(&buffer);
            }
        });

        for bottom in self.core.bottom() {
            bottom.set_after_receive(up_events.clone());
            bottom.set_after_read(up_bytes.clone());
        }
        for top in self.core.top() {
            top.set_after_send(down_events.clone());
            top.set_after_write(down_bytes.clone());
        }
        debug!(pipe = %self.core.describe(), "installed transfer hooks");
    }

    // === Connectivity ===

    /// Gate upward forwarding across the gap. Clock requests are captured
    /// regardless.
    pub fn set_connected_up(&self, connected: bool) {
        self.core.set_connected_up(connected);
    }

    /// Gate downward forwarding across the gap.
    pub fn set_connected_down(&self, connected: bool) {
        self.core.set_connected_down(connected);
    }

    /// Whether upward forwarding is currently on.
    pub fn connected_up(&self) -> bool {
        self.core.connected_up()
    }

    /// Whether downward forwarding is currently on.
    pub fn connected_down(&self) -> bool {
        self.core.connected_down()
    }

    // === Clocking ===

    /// Deliver a phased clock update, send phase first, and return the
    /// earliest wake-up still pending afterwards.
    pub fn update_clock(&self, time: f64) -> Option<LinkClockRequest> {
        trace!(time, "updating automatic pipe clock");
        self.core.set_last_clock_update(time);
        self.update_clock_send(time);
        self.update_clock_receive(time);
        self.core.next_clock_request()
    }

    /// Release downward-moving backlog: bottom members first, then top.
    pub fn update_clock_send(&self, time: f64) {
        if !self.core.is_clocked() {
            return;
        }
        self.core.clear_due_requests(time);
        for member in self.core.bottom_clocked() {
            member.update_clock_send(time);
        }
        for member in self.core.top_clocked() {
            member.update_clock_send(time);
        }
    }

    /// Release upward-moving backlog: top members first, then bottom.
    pub fn update_clock_receive(&self, time: f64) {
        if !self.core.is_clocked() {
            return;
        }
        self.core.clear_due_requests(time);
        for member in self.core.top_clocked() {
            member.update_clock_receive(time);
        }
        for member in self.core.bottom_clocked() {
            member.update_clock_receive(time);
        }
    }

    /// The earliest wake-up needed anywhere in the pipe, if any.
    pub fn next_clock_request(&self) -> Option<LinkClockRequest> {
        self.core.next_clock_request()
    }

    /// Whether any member observes clock updates.
    pub fn is_clocked(&self) -> bool {
        self.core.is_clocked()
    }

    /// Time of the most recent clock update, if one has been delivered.
    pub fn last_clock_update(&self) -> Option<f64> {
        self.core.last_clock_update()
    }

    // === Boundary surface ===

    /// Feed an event into every bottom member's below face.
    pub fn to_receive(&self, event: impl Into<LinkEvent>) -> bool {
        self.core.to_receive(event.into())
    }

    /// Wrap a raw payload and feed it into the below face.
    pub fn to_receive_data(&self, data: Vec<u8>) -> bool {
        self.to_receive(LinkEvent::from(data))
    }

    /// Feed an event into every top member's above face.
    pub fn send(&self, event: impl Into<LinkEvent>) -> bool {
        self.core.send(event.into())
    }

    /// Wrap a raw payload and feed it into the above face.
    pub fn send_data(&self, data: Vec<u8>) -> bool {
        self.send(LinkEvent::from(data))
    }

    /// Take the next upward event from the top layer.
    pub fn receive(&self) -> Option<LinkEvent> {
        self.core.receive()
    }

    /// Take every upward event the top layer has ready.
    pub fn receive_all(&self) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.receive() {
            events.push(event);
        }
        events
    }

    /// Whether the top layer has an upward event ready.
    pub fn has_receive(&self) -> bool {
        self.core.has_receive()
    }

    /// Take the next downward event from the bottom layer.
    pub fn to_send(&self) -> Option<LinkEvent> {
        self.core.to_send()
    }

    /// Take every downward event the bottom layer has ready.
    pub fn to_send_all(&self) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.to_send() {
            events.push(event);
        }
        events
    }

    /// Whether the bottom layer has a downward event ready.
    pub fn has_to_send(&self) -> bool {
        self.core.has_to_send()
    }

    /// Feed bytes into every bottom member's below face.
    pub fn to_read(&self, buffer: &[u8]) -> bool {
        self.core.to_read(buffer)
    }

    /// Feed bytes into every top member's above face.
    pub fn write(&self, buffer: &[u8]) -> bool {
        self.core.write(buffer)
    }

    /// Take all upward bytes the top layer has ready, concatenated.
    pub fn read(&self) -> Option<Vec<u8>> {
        self.core.read()
    }

    /// Take all downward bytes the bottom layer has ready, concatenated.
    pub fn to_write(&self) -> Option<Vec<u8>> {
        self.core.to_write()
    }

    /// Replace the upward event disposition of every top member.
    pub fn set_after_receive(&self, hook: EventHook) -> bool {
        self.core.set_after_receive(hook)
    }

    /// Replace the downward event disposition of every bottom member.
    pub fn set_after_send(&self, hook: EventHook) -> bool {
        self.core.set_after_send(hook)
    }

    /// Replace the upward stream disposition of every top member.
    pub fn set_after_read(&self, hook: StreamHook) -> bool {
        self.core.set_after_read(hook)
    }

    /// Replace the downward stream disposition of every bottom member.
    pub fn set_after_write(&self, hook: StreamHook) -> bool {
        self.core.set_after_write(hook)
    }
}

impl Composite for AutomaticPipe {
    fn describe(&self) -> String {
        self.core.describe()
    }

    fn to_receive(&self, event: LinkEvent) -> bool {
        AutomaticPipe::to_receive(self, event)
    }

    fn send(&self, event: LinkEvent) -> bool {
        AutomaticPipe::send(self, event)
    }

    fn receive(&self) -> Option<LinkEvent> {
        AutomaticPipe::receive(self)
    }

    fn has_receive(&self) -> bool {
        AutomaticPipe::has_receive(self)
    }

    fn to_send(&self) -> Option<LinkEvent> {
        AutomaticPipe::to_send(self)
    }

    fn has_to_send(&self) -> bool {
        AutomaticPipe::has_to_send(self)
    }

    fn to_read(&self, buffer: &[u8]) -> bool {
        AutomaticPipe::to_read(self, buffer)
    }

    fn write(&self, buffer: &[u8]) -> bool {
        AutomaticPipe::write(self, buffer)
    }

    fn read(&self) -> Option<Vec<u8>> {
        AutomaticPipe::read(self)
    }

    fn to_write(&self) -> Option<Vec<u8>> {
        AutomaticPipe::to_write(self)
    }

    fn set_after_receive(&self, hook: EventHook) -> bool {
        AutomaticPipe::set_after_receive(self, hook)
    }

    fn set_after_send(&self, hook: EventHook) -> bool {
        AutomaticPipe::set_after_send(self, hook)
    }

    fn set_after_read(&self, hook: StreamHook) -> bool {
        AutomaticPipe::set_after_read(self, hook)
    }

    fn set_after_write(&self, hook: StreamHook) -> bool {
        AutomaticPipe::set_after_write(self, hook)
    }

    fn is_clocked(&self) -> bool {
        AutomaticPipe::is_clocked(self)
    }

    fn update_clock(&self, time: f64) -> Option<LinkClockRequest> {
        AutomaticPipe::update_clock(self, time)
    }

    fn update_clock_send(&self, time: f64) {
        AutomaticPipe::update_clock_send(self, time)
    }

    fn update_clock_receive(&self, time: f64) {
        AutomaticPipe::update_clock_receive(self, time)
    }

    fn next_clock_request(&self) -> Option<LinkClockRequest> {
        AutomaticPipe::next_clock_request(self)
    }
}

impl From<AutomaticPipe> for PipeMember {
    fn from(pipe: AutomaticPipe) -> Self {
        PipeMember::Composite(Rc::new(pipe))
    }
}

impl From<AutomaticPipe> for Layer {
    fn from(pipe: AutomaticPipe) -> Self {
        Layer::from(PipeMember::from(pipe))
    }
}

impl std::fmt::Debug for AutomaticPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AutomaticPipe({})", self.core.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use strata_link::{
        ChunkedStreamLink, DelayedEventLink, EventLink, StreamLink, TopLoopbackLink,
    };

    fn payload(event: LinkEvent) -> Option<Vec<u8>> {
        event.into_data().map(|data| data.into_data())
    }

    #[test]
    fn test_events_cross_the_gap_immediately() {
        let bottom = EventLink::named("bottom");
        let top = EventLink::named("top");
        let pipe = AutomaticPipe::new(bottom.handle(), top.handle());

        pipe.to_receive_data(b"up".to_vec());
        assert_eq!(pipe.receive().and_then(payload), Some(b"up".to_vec()));

        pipe.send_data(b"down".to_vec());
        assert_eq!(pipe.to_send().and_then(payload), Some(b"down".to_vec()));
    }

    #[test]
    fn test_streams_cross_the_gap_immediately() {
        let wire = StreamLink::named("wire");
        let framer = ChunkedStreamLink::new();
        let pipe = AutomaticPipe::new(wire.handle(), framer.handle());

        pipe.to_read(b"\0hi\0");
        assert_eq!(pipe.receive().and_then(payload), Some(b"hi".to_vec()));

        pipe.send_data(b"out".to_vec());
        assert_eq!(pipe.to_write(), Some(b"\0out\0".to_vec()));
    }

    #[test]
    fn test_clock_requests_are_captured_from_hooks() {
        let delayed = DelayedEventLink::new();
        let top = EventLink::named("top");
        let pipe = AutomaticPipe::new(delayed.handle(), top.handle());

        pipe.to_receive_data(b"held".to_vec());

        assert!(!top.has_receive());
        let next = pipe.next_clock_request();
        assert_eq!(next.map(|request| request.requested_time()), Some(1.0));
    }

    #[test]
    fn test_update_clock_releases_due_traffic() {
        let delayed = DelayedEventLink::new();
        let top = EventLink::named("top");
        let pipe = AutomaticPipe::new(delayed.handle(), top.handle());

        pipe.to_receive_data(b"held".to_vec());
        assert!(pipe.update_clock(0.5).is_some());
        assert!(!top.has_receive());

        let remaining = pipe.update_clock(1.0);
        assert!(remaining.is_none());
        assert_eq!(pipe.receive().and_then(payload), Some(b"held".to_vec()));
    }

    #[test]
    fn test_disconnecting_up_drops_traffic_but_keeps_requests() {
        let delayed = DelayedEventLink::new();
        let top = EventLink::named("top");
        let pipe = AutomaticPipe::new(delayed.handle(), top.handle());

        pipe.set_connected_up(false);
        pipe.to_receive_data(b"held".to_vec());

        let next = pipe.next_clock_request();
        assert_eq!(next.map(|request| request.requested_time()), Some(1.0));

        pipe.update_clock(1.0);
        assert!(!top.has_receive());
        assert!(pipe.next_clock_request().is_none());

        pipe.set_connected_up(true);
        pipe.to_receive_data(b"flows".to_vec());
        pipe.update_clock(2.0);
        assert_eq!(pipe.receive().and_then(payload), Some(b"flows".to_vec()));
    }

    #[test]
    fn test_solo_pipe_installs_no_hooks() {
        let link = EventLink::named("only");
        let pipe = AutomaticPipe::solo(link.handle());

        pipe.to_receive_data(b"pass".to_vec());
        assert_eq!(pipe.receive().and_then(payload), Some(b"pass".to_vec()));
    }

    #[test]
    fn test_loopback_above_echoes_back_down_through_the_web() {
        let bottom = EventLink::named("bottom");
        let echo = TopLoopbackLink::new();
        let pipe = AutomaticPipe::new(bottom.handle(), echo.handle());

        pipe.to_receive_data(b"ping".to_vec());

        assert_eq!(pipe.to_send().and_then(payload), Some(b"ping".to_vec()));
    }

    #[test]
    fn test_nested_automatic_pipes_forward_transitively() {
        let wire = StreamLink::named("wire");
        let framer = ChunkedStreamLink::new();
        let inner = AutomaticPipe::new(wire.handle(), framer.handle());
        let app = EventLink::named("app");
        let outer = AutomaticPipe::new(inner.clone(), app.handle());

        outer.to_read(b"\0msg\0");
        assert_eq!(outer.receive().and_then(payload), Some(b"msg".to_vec()));

        outer.send_data(b"reply".to_vec());
        assert_eq!(outer.to_write(), Some(b"\0reply\0".to_vec()));
    }
}
