//! Pull-based pipe: traffic crosses the gap only when told to.
//!
//! A [`ManualPipe`] leaves its members' queues alone until [`sync`]
//! (or one of its halves) runs, then drains each side's output into the
//! other side's input. Syncing recurses into nested compositions on both
//! sides, so one call settles an arbitrarily deep stack.
//!
//! [`sync`]: ManualPipe::sync

use std::rc::Rc;

use tracing::trace;

use strata_link::{EventHook, LinkClockRequest, LinkEvent, StreamHook};

use crate::pipe::{Composite, Layer, PipeCore, PipeMember, Span};

/// A pipe whose transfers run on demand.
///
/// Cloning shares the pipe; all methods take `&self` and may be called
/// re-entrantly from hooks.
#[derive(Clone)]
pub struct ManualPipe {
    core: Rc<PipeCore>,
}

impl ManualPipe {
    /// Stand a pipe between a bottom and a top layer.
    pub fn new(bottom: impl Into<Layer>, top: impl Into<Layer>) -> Self {
        Self {
            core: Rc::new(PipeCore::new(Span::Layered {
                bottom: bottom.into(),
                top: top.into(),
            })),
        }
    }

    /// Wrap a single layer in a pipe that performs no transfers but still
    /// presents the layer's boundary surface.
    pub fn solo(members: impl Into<Layer>) -> Self {
        Self {
            core: Rc::new(PipeCore::new(Span::Solo(members.into()))),
        }
    }

    // === Syncing ===

    /// Carry upward traffic from every bottom member into the top layer.
    /// Returns the earliest wake-up still pending afterwards.
    pub fn sync_up(&self) -> Option<LinkClockRequest> {
        for bottom in self.core.bottom() {
            self.transfer_up(bottom);
        }
        self.core.next_clock_request()
    }

    /// Carry downward traffic from every top member into the bottom layer.
    /// Returns the earliest wake-up still pending afterwards.
    pub fn sync_down(&self) -> Option<LinkClockRequest> {
        for top in self.core.top() {
            self.transfer_down(top);
        }
        self.core.next_clock_request()
    }

    /// Carry traffic both ways, upward first.
    pub fn sync(&self) -> Option<LinkClockRequest> {
        self.sync_up();
        self.sync_down();
        self.core.next_clock_request()
    }

    fn transfer_up(&self, bottom: &PipeMember) {
        self.sync_bottom_members();
        if self.core.is_solo() {
            return;
        }
        for event in bottom.receive_all() {
            match event {
                LinkEvent::ClockRequest(request) => self.core.capture_request(request),
                other => self.core.receive_up(other),
            }
        }
        if let Some(buffer) = bottom.read() {
            self.core.read_up(&buffer);
        }
        self.sync_top_members();
    }

    fn transfer_down(&self, top: &PipeMember) {
        self.sync_top_members();
        if self.core.is_solo() {
            return;
        }
        for event in top.to_send_all() {
            match event {
                LinkEvent::ClockRequest(request) => self.core.capture_request(request),
                other => self.core.send_down(other),
            }
        }
        if let Some(buffer) = top.to_write() {
            self.core.write_down(&buffer);
        }
        self.sync_bottom_members();
    }

    fn sync_bottom_members(&self) {
        for member in self.core.bottom() {
            member.sync();
        }
    }

    fn sync_top_members(&self) {
        for member in self.core.top() {
            member.sync();
        }
    }

    // === Clocking ===

    /// Deliver a clock update to every member, then sync. Returns the
    /// earliest wake-up still pending afterwards.
    pub fn update_clock(&self, time: f64) -> Option<LinkClockRequest> {
        trace!(time, "updating manual pipe clock");
        self.core.clear_due_requests(time);
        self.core.set_last_clock_update(time);
        self.core.update_members_clock(time);
        self.sync()
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

impl Composite for ManualPipe {
    fn describe(&self) -> String {
        self.core.describe()
    }

    fn to_receive(&self, event: LinkEvent) -> bool {
        ManualPipe::to_receive(self, event)
    }

    fn send(&self, event: LinkEvent) -> bool {
        ManualPipe::send(self, event)
    }

    fn receive(&self) -> Option<LinkEvent> {
        ManualPipe::receive(self)
    }

    fn has_receive(&self) -> bool {
        ManualPipe::has_receive(self)
    }

    fn to_send(&self) -> Option<LinkEvent> {
        ManualPipe::to_send(self)
    }

    fn has_to_send(&self) -> bool {
        ManualPipe::has_to_send(self)
    }

    fn to_read(&self, buffer: &[u8]) -> bool {
        ManualPipe::to_read(self, buffer)
    }

    fn write(&self, buffer: &[u8]) -> bool {
        ManualPipe::write(self, buffer)
    }

    fn read(&self) -> Option<Vec<u8>> {
        ManualPipe::read(self)
    }

    fn to_write(&self) -> Option<Vec<u8>> {
        ManualPipe::to_write(self)
    }

    fn set_after_receive(&self, hook: EventHook) -> bool {
        ManualPipe::set_after_receive(self, hook)
    }

    fn set_after_send(&self, hook: EventHook) -> bool {
        ManualPipe::set_after_send(self, hook)
    }

    fn set_after_read(&self, hook: StreamHook) -> bool {
        ManualPipe::set_after_read(self, hook)
    }

    fn set_after_write(&self, hook: StreamHook) -> bool {
        ManualPipe::set_after_write(self, hook)
    }

    fn is_clocked(&self) -> bool {
        ManualPipe::is_clocked(self)
    }

    fn update_clock(&self, time: f64) -> Option<LinkClockRequest> {
        ManualPipe::update_clock(self, time)
    }

    fn next_clock_request(&self) -> Option<LinkClockRequest> {
        ManualPipe::next_clock_request(self)
    }

    fn sync(&self) -> Option<LinkClockRequest> {
        ManualPipe::sync(self)
    }
}

impl From<ManualPipe> for PipeMember {
    fn from(pipe: ManualPipe) -> Self {
        PipeMember::Composite(Rc::new(pipe))
    }
}

impl From<ManualPipe> for Layer {
    fn from(pipe: ManualPipe) -> Self {
        Layer::from(PipeMember::from(pipe))
    }
}

impl std::fmt::Debug for ManualPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ManualPipe({})", self.core.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use strata_link::{ChunkedStreamLink, DelayedEventLink, EventLink, StreamLink};

    fn payload(event: LinkEvent) -> Option<Vec<u8>> {
        event.into_data().map(|data| data.into_data())
    }

    #[test]
    fn test_events_cross_only_on_sync() {
        let bottom = EventLink::named("bottom");
        let top = EventLink::named("top");
        let pipe = ManualPipe::new(bottom.handle(), top.handle());

        pipe.to_receive_data(b"up".to_vec());
        assert!(!top.has_receive());

        pipe.sync();
        assert_eq!(pipe.receive().and_then(payload), Some(b"up".to_vec()));
    }

    #[test]
    fn test_sync_down_carries_framed_writes_to_the_bottom() {
        let wire = StreamLink::named("wire");
        let framer = ChunkedStreamLink::new();
        let pipe = ManualPipe::new(wire.handle(), framer.handle());

        pipe.send_data(b"payload".to_vec());
        assert!(pipe.to_write().is_none());

        pipe.sync();
        assert_eq!(pipe.to_write(), Some(b"\0payload\0".to_vec()));
    }

    #[test]
    fn test_sync_up_carries_bottom_reads_into_the_top() {
        let wire = StreamLink::named("wire");
        let framer = ChunkedStreamLink::new();
        let pipe = ManualPipe::new(wire.handle(), framer.handle());

        pipe.to_read(b"\0in two\0parts\0");
        pipe.sync_up();

        let events = pipe.receive_all();
        let payloads: Vec<Vec<u8>> = events.into_iter().filter_map(payload).collect();
        assert_eq!(payloads, vec![b"in two".to_vec(), b"parts".to_vec()]);
    }

    #[test]
    fn test_solo_pipe_skips_transfers_but_serves_the_boundary() {
        let link = EventLink::named("only");
        let pipe = ManualPipe::solo(link.handle());

        pipe.to_receive_data(b"pass".to_vec());
        pipe.sync();

        assert_eq!(pipe.receive().and_then(payload), Some(b"pass".to_vec()));
        assert!(pipe.receive().is_none());
    }

    #[test]
    fn test_clock_requests_are_captured_not_forwarded() {
        let delayed = DelayedEventLink::new();
        let top = EventLink::named("top");
        let pipe = ManualPipe::new(delayed.handle(), top.handle());

        pipe.to_receive_data(b"held".to_vec());
        pipe.sync();

        assert!(!top.has_receive());
        let next = pipe.next_clock_request();
        assert_eq!(next.map(|request| request.requested_time()), Some(1.0));
    }

    #[test]
    fn test_update_clock_delivers_due_traffic_and_clears_the_request() {
        let delayed = DelayedEventLink::new();
        let top = EventLink::named("top");
        let pipe = ManualPipe::new(delayed.handle(), top.handle());

        pipe.to_receive_data(b"held".to_vec());
        pipe.sync();

        let early = pipe.update_clock(0.5);
        assert_eq!(early.map(|request| request.requested_time()), Some(1.0));
        assert!(!top.has_receive());

        let due = pipe.update_clock(1.0);
        assert!(due.is_none());
        assert_eq!(pipe.receive().and_then(payload), Some(b"held".to_vec()));
    }

    #[test]
    fn test_nested_pipes_sync_transitively() {
        let wire = StreamLink::named("wire");
        let framer = ChunkedStreamLink::new();
        let inner = ManualPipe::new(wire.handle(), framer.handle());
        let top = EventLink::named("app");
        let outer = ManualPipe::new(inner.clone(), top.handle());

        outer.to_read(b"\0msg\0");
        outer.sync();

        assert_eq!(outer.receive().and_then(payload), Some(b"msg".to_vec()));
    }

    #[test]
    fn test_nested_pipes_sync_downward_transitively() {
        let wire = StreamLink::named("wire");
        let framer = ChunkedStreamLink::new();
        let inner = ManualPipe::new(wire.handle(), framer.handle());
        let top = EventLink::named("app");
        let outer = ManualPipe::new(inner.clone(), top.handle());

        outer.send_data(b"out".to_vec());
        outer.sync();

        assert_eq!(outer.to_write(), Some(b"\0out\0".to_vec()));
    }

    #[test]
    fn test_fanned_out_events_reach_every_top() {
        let bottom = EventLink::named("bottom");
        let left = EventLink::named("left");
        let right = EventLink::named("right");
        let mut top = Layer::from(left.handle());
        top.push(right.handle());
        let pipe = ManualPipe::new(bottom.handle(), top);

        pipe.to_receive_data(b"both".to_vec());
        pipe.sync();

        assert_eq!(left.receive().and_then(payload), Some(b"both".to_vec()));
        assert_eq!(right.receive().and_then(payload), Some(b"both".to_vec()));
    }
}
