//! Links: paired processors with a shared boundary surface.
//!
//! A link couples two [processors](crate::processor): a receiver carrying
//! traffic from below to above, and a sender carrying traffic from above to
//! below. All link kinds share one boundary surface, split into four faces:
//!
//! ```text
//!                 receive() / send()          (event, above)
//!                 read()    / write()         (stream, above)
//!            ┌─────────────────────────┐
//!            │   receiver ▲  sender ▼  │
//!            └─────────────────────────┘
//!                 to_receive() / to_send()    (event, below)
//!                 to_read()    / to_write()   (stream, below)
//! ```
//!
//! Concrete link kinds implement the faces they have; calling a face a link
//! does not have is a no-op, which is what lets composition layers fan data
//! over heterogeneous link sets and simply skip the links that lack a
//! capability.
//!
//! Links are shared through [`LinkHandle`]: a cheaply clonable handle over a
//! single-threaded `Rc<RefCell<_>>` cell. Handles drive processing
//! synchronously: by the time `send` or `to_read` returns, everything
//! downstream of that feed has settled.
//!
//! ## Output dispositions and hooks
//!
//! Each processed item leaves its processor through a disposition: by
//! default it stays in the link's local output queue for the boundary
//! accessors to pick up, but an installed hook ([`EventHook`] /
//! [`StreamHook`]) replaces the queue and receives each item as it is
//! produced. Hooks are how pipes splice links together; they are installed
//! once and consulted at every disposition.
//!
//! The handle's pump releases the link's cell borrow before firing any
//! hook, so a hook is always free to feed other links, or this same one,
//! re-entrantly.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::event::{LinkClockRequest, LinkEvent, Origin};
use crate::processor::{EventProcessor, StreamProcessor};

pub mod chunked;
pub mod clocked;
pub mod event;
pub mod loopback;
pub mod stream;

/// Sink for events leaving a link through a hooked disposition.
pub type EventHook = Rc<dyn Fn(LinkEvent)>;

/// Sink for buffers leaving a link through a hooked disposition.
pub type StreamHook = Rc<dyn Fn(Vec<u8>)>;

/// A delivery resolved during a service pass, fired only after the link's
/// cell borrow is released.
pub enum Emission {
    /// An event bound for an event hook.
    Event(EventHook, LinkEvent),
    /// A buffer bound for a stream hook.
    Bytes(StreamHook, Vec<u8>),
}

impl Emission {
    fn fire(self) {
        match self {
            Emission::Event(hook, event) => {
                trace!(kind = event.kind(), "dispatching event emission");
                hook(event);
            }
            Emission::Bytes(hook, buffer) => {
                trace!(len = buffer.len(), "dispatching stream emission");
                hook(buffer);
            }
        }
    }
}

/// Drain a hooked event processor's staged output into an emission batch.
/// With no hook installed the output stays queued for the boundary surface.
pub(crate) fn drain_events<I>(
    processor: &mut EventProcessor<I, LinkEvent>,
    hook: &Option<EventHook>,
    batch: &mut Vec<Emission>,
) {
    if let Some(hook) = hook {
        while let Some(event) = processor.take_output() {
            batch.push(Emission::Event(hook.clone(), event));
        }
    }
}

/// Drain a hooked stream processor's staged buffers into an emission batch,
/// dropping empty buffers.
pub(crate) fn drain_buffers(
    processor: &mut StreamProcessor,
    hook: &Option<StreamHook>,
    batch: &mut Vec<Emission>,
) {
    if let Some(hook) = hook {
        while let Some(buffer) = processor.take_output() {
            if !buffer.is_empty() {
                batch.push(Emission::Bytes(hook.clone(), buffer));
            }
        }
    }
}

/// The body of a link, driven through a [`LinkHandle`].
///
/// Every method has a skip-by-default implementation so a body only
/// implements the faces it has: feeds (`accept_*`) report whether the face
/// exists, drains (`take_*`) yield nothing, probes report `false`/`None`.
///
/// Implementations must not call out to other handles from `accept_*`,
/// `take_*`, or `service` in a way that can cycle back into their own cell;
/// the handle holds the cell borrow during those calls. Deliveries that may
/// re-enter belong in the [`Emission`] batch returned from `service`, which
/// the handle fires after releasing the borrow.
pub trait Link {
    /// Display name of this link, stamped as the origin of derived events.
    fn origin(&self) -> Origin;

    /// Advance the link's processors by one scheduling round under the cell
    /// borrow. Returns deliveries to fire outside the borrow; an empty batch
    /// means the link has settled.
    fn service(&mut self) -> Vec<Emission> {
        Vec::new()
    }

    // === Event faces ===

    /// Feed an event into the receiver (below face).
    fn accept_to_receive(&mut self, _event: LinkEvent) -> bool {
        false
    }

    /// Feed an event into the sender (above face).
    fn accept_send(&mut self, _event: LinkEvent) -> bool {
        false
    }

    /// Take the next processed upward event (above face).
    fn take_receive(&mut self) -> Option<LinkEvent> {
        None
    }

    /// Whether a processed upward event is ready.
    fn has_receive(&self) -> bool {
        false
    }

    /// Take the next processed downward event (below face).
    fn take_to_send(&mut self) -> Option<LinkEvent> {
        None
    }

    /// Whether a processed downward event is ready.
    fn has_to_send(&self) -> bool {
        false
    }

    /// Deliver an event straight to the receiver's output disposition,
    /// bypassing its routine.
    fn accept_inject_receive(&mut self, _event: LinkEvent) -> bool {
        false
    }

    /// Deliver an event straight to the sender's output disposition,
    /// bypassing its routine.
    fn accept_inject_to_send(&mut self, _event: LinkEvent) -> bool {
        false
    }

    // === Stream faces ===

    /// Feed bytes into the reader (below face).
    fn accept_to_read(&mut self, _buffer: &[u8]) -> bool {
        false
    }

    /// Feed bytes into the writer (above face).
    fn accept_write(&mut self, _buffer: &[u8]) -> bool {
        false
    }

    /// Take all processed upward bytes, concatenated (above face).
    fn take_read(&mut self) -> Option<Vec<u8>> {
        None
    }

    /// Take all processed downward bytes, concatenated (below face).
    fn take_to_write(&mut self) -> Option<Vec<u8>> {
        None
    }

    // === Hook installation ===

    /// Replace the receiver's output disposition.
    fn install_after_receive(&mut self, _hook: EventHook) -> bool {
        false
    }

    /// Replace the sender's output disposition.
    fn install_after_send(&mut self, _hook: EventHook) -> bool {
        false
    }

    /// Replace the reader's output disposition.
    fn install_after_read(&mut self, _hook: StreamHook) -> bool {
        false
    }

    /// Replace the writer's output disposition.
    fn install_after_write(&mut self, _hook: StreamHook) -> bool {
        false
    }

    // === Clocking ===

    /// Whether this link observes clock updates.
    fn is_clocked(&self) -> bool {
        false
    }

    /// Deliver a clock update. Returns `false` when the link is not clocked.
    fn update_clock(&mut self, _time: f64) -> bool {
        false
    }

    /// Clock update for the send phase of a phased tick. Composites with an
    /// internal ordering split this; plain clocked links take the whole
    /// update (applying it twice per tick is idempotent).
    fn update_clock_send(&mut self, time: f64) -> bool {
        self.update_clock(time)
    }

    /// Clock update for the receive phase of a phased tick.
    fn update_clock_receive(&mut self, time: f64) -> bool {
        self.update_clock(time)
    }

    /// The earliest wake-up this link currently needs, if any.
    fn next_clock_request(&self) -> Option<LinkClockRequest> {
        None
    }

    /// Synchronize pull-based internals, returning the earliest wake-up
    /// still pending. No-op for links without pull-based composition.
    fn sync(&mut self) -> Option<LinkClockRequest> {
        None
    }
}

/// Shared handle to a link, cloned freely within one thread.
///
/// All feeds drive processing to quiescence before returning. Calls to a
/// face the underlying link does not have are no-ops (`false`/`None`).
#[derive(Clone)]
pub struct LinkHandle {
    cell: Rc<RefCell<dyn Link>>,
}

impl LinkHandle {
    /// Wrap a link body in a shared handle.
    pub fn new(cell: Rc<RefCell<dyn Link>>) -> Self {
        Self { cell }
    }

    /// Display name of the underlying link.
    pub fn origin(&self) -> Origin {
        self.cell.borrow().origin()
    }

    /// Drive the link until it settles, firing each emission batch with the
    /// cell borrow released so deliveries can re-enter freely.
    fn pump(&self) {
        loop {
            let batch = self.cell.borrow_mut().service();
            if batch.is_empty() {
                break;
            }
            for emission in batch {
                emission.fire();
            }
        }
    }

    // === Event faces ===

    /// Feed an event (or raw payload) into the below face for upward
    /// processing.
    pub fn to_receive(&self, event: impl Into<LinkEvent>) -> bool {
        let accepted = self.cell.borrow_mut().accept_to_receive(event.into());
        if accepted {
            self.pump();
        }
        accepted
    }

    /// Wrap a raw payload and feed it into the below face.
    pub fn to_receive_data(&self, data: Vec<u8>) -> bool {
        self.to_receive(LinkEvent::from(data))
    }

    /// Feed an event (or raw payload) into the above face for downward
    /// processing.
    pub fn send(&self, event: impl Into<LinkEvent>) -> bool {
        let accepted = self.cell.borrow_mut().accept_send(event.into());
        if accepted {
            self.pump();
        }
        accepted
    }

    /// Wrap a raw payload and feed it into the above face.
    pub fn send_data(&self, data: Vec<u8>) -> bool {
        self.send(LinkEvent::from(data))
    }

    /// Take the next upward event, if one is ready.
    pub fn receive(&self) -> Option<LinkEvent> {
        self.cell.borrow_mut().take_receive()
    }

    /// Take every upward event currently ready.
    pub fn receive_all(&self) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.receive() {
            events.push(event);
        }
        events
    }

    /// Whether an upward event is ready.
    pub fn has_receive(&self) -> bool {
        self.cell.borrow().has_receive()
    }

    /// Take the next downward event, if one is ready.
    pub fn to_send(&self) -> Option<LinkEvent> {
        self.cell.borrow_mut().take_to_send()
    }

    /// Take every downward event currently ready.
    pub fn to_send_all(&self) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.to_send() {
            events.push(event);
        }
        events
    }

    /// Whether a downward event is ready.
    pub fn has_to_send(&self) -> bool {
        self.cell.borrow().has_to_send()
    }

    /// Deliver an event straight to the receiver's output disposition.
    pub fn inject_receive(&self, event: impl Into<LinkEvent>) -> bool {
        let accepted = self.cell.borrow_mut().accept_inject_receive(event.into());
        if accepted {
            self.pump();
        }
        accepted
    }

    /// Deliver an event straight to the sender's output disposition.
    pub fn inject_to_send(&self, event: impl Into<LinkEvent>) -> bool {
        let accepted = self
            .cell
            .borrow_mut()
            .accept_inject_to_send(event.into());
        if accepted {
            self.pump();
        }
        accepted
    }

    // === Stream faces ===

    /// Feed bytes into the below face for upward processing.
    pub fn to_read(&self, buffer: &[u8]) -> bool {
        let accepted = self.cell.borrow_mut().accept_to_read(buffer);
        if accepted {
            self.pump();
        }
        accepted
    }

    /// Feed bytes into the above face for downward processing.
    pub fn write(&self, buffer: &[u8]) -> bool {
        let accepted = self.cell.borrow_mut().accept_write(buffer);
        if accepted {
            self.pump();
        }
        accepted
    }

    /// Take all upward bytes currently ready, concatenated. Never returns
    /// an empty buffer.
    pub fn read(&self) -> Option<Vec<u8>> {
        self.cell.borrow_mut().take_read()
    }

    /// Take all downward bytes currently ready, concatenated. Never
    /// returns an empty buffer.
    pub fn to_write(&self) -> Option<Vec<u8>> {
        self.cell.borrow_mut().take_to_write()
    }

    // === Hook installation ===

    /// Replace the receiver's output disposition.
    pub fn set_after_receive(&self, hook: EventHook) -> bool {
        self.cell.borrow_mut().install_after_receive(hook)
    }

    /// Replace the sender's output disposition.
    pub fn set_after_send(&self, hook: EventHook) -> bool {
        self.cell.borrow_mut().install_after_send(hook)
    }

    /// Replace the reader's output disposition.
    pub fn set_after_read(&self, hook: StreamHook) -> bool {
        self.cell.borrow_mut().install_after_read(hook)
    }

    /// Replace the writer's output disposition.
    pub fn set_after_write(&self, hook: StreamHook) -> bool {
        self.cell.borrow_mut().install_after_write(hook)
    }

    // === Clocking ===

    /// Whether the underlying link observes clock updates.
    pub fn is_clocked(&self) -> bool {
        self.cell.borrow().is_clocked()
    }

    /// Deliver a clock update and settle everything it releases, returning
    /// the link's next wake-up request. `None` for unclocked links.
    pub fn update_clock(&self, time: f64) -> Option<LinkClockRequest> {
        let clocked = self.cell.borrow_mut().update_clock(time);
        if !clocked {
            return None;
        }
        self.pump();
        self.next_clock_request()
    }

    /// Send-phase clock update of a phased tick.
    pub fn update_clock_send(&self, time: f64) {
        if self.cell.borrow_mut().update_clock_send(time) {
            self.pump();
        }
    }

    /// Receive-phase clock update of a phased tick.
    pub fn update_clock_receive(&self, time: f64) {
        if self.cell.borrow_mut().update_clock_receive(time) {
            self.pump();
        }
    }

    /// The earliest wake-up the underlying link currently needs, if any.
    pub fn next_clock_request(&self) -> Option<LinkClockRequest> {
        self.cell.borrow().next_clock_request()
    }

    /// Synchronize pull-based internals transitively, returning the
    /// earliest wake-up still pending.
    pub fn sync(&self) -> Option<LinkClockRequest> {
        let pending = self.cell.borrow_mut().sync();
        self.pump();
        pending
    }
}

impl std::fmt::Debug for LinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LinkHandle({})", self.origin())
    }
}
