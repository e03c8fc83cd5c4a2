//! Loopback links: echo endpoints for exercising a stack from one end.
//!
//! A loopback link caps one end of a stack and reflects whatever reaches it
//! back the other way: [`TopLoopbackLink`] has only below faces and echoes
//! upward traffic back down, [`BottomLoopbackLink`] has only above faces and
//! echoes downward traffic back up. Data events are echoed as derived
//! events; failures and clock events are consumed, not reflected.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::event::{Direction, LinkEvent, Origin};
use crate::processor::{EventIo, EventProcessor, EventRoutine, Step, StreamProcessor};

use super::stream::RelayRoutine;
use super::{drain_buffers, drain_events, Emission, EventHook, Link, LinkHandle, StreamHook};

/// Reflects data events in the echo direction, consuming everything else.
struct EchoRoutine {
    direction: Direction,
    origin: Origin,
}

impl EventRoutine<LinkEvent, LinkEvent> for EchoRoutine {
    fn step(&mut self, io: &mut EventIo<'_, LinkEvent, LinkEvent>) -> Step {
        let Some(event) = io.receive() else {
            return Step::Wait;
        };
        match event {
            LinkEvent::Data(data) => {
                io.send(data.redirect(self.direction, self.origin.clone()).into());
            }
            LinkEvent::Exception(exception) => {
                debug!(%exception, "ignoring failure at loopback");
            }
            LinkEvent::ClockTime(_) | LinkEvent::ClockRequest(_) => {}
        }
        Step::Proceed
    }
}

struct TopLoopbackLinkBody {
    origin: Origin,
    echo_events: EventProcessor<LinkEvent, LinkEvent>,
    echo_stream: StreamProcessor,
    after_send: Option<EventHook>,
    after_write: Option<StreamHook>,
}

impl Link for TopLoopbackLinkBody {
    fn origin(&self) -> Origin {
        self.origin.clone()
    }

    fn service(&mut self) -> Vec<Emission> {
        let mut batch = Vec::new();
        loop {
            let stepped =
                self.echo_events.step_once().is_some() | self.echo_stream.step_once().is_some();
            drain_events(&mut self.echo_events, &self.after_send, &mut batch);
            drain_buffers(&mut self.echo_stream, &self.after_write, &mut batch);
            if !batch.is_empty() || !stepped {
                return batch;
            }
        }
    }

    fn accept_to_receive(&mut self, event: LinkEvent) -> bool {
        self.echo_events.push(event);
        true
    }

    fn take_to_send(&mut self) -> Option<LinkEvent> {
        self.echo_events.take_output()
    }

    fn has_to_send(&self) -> bool {
        self.echo_events.has_output()
    }

    fn accept_inject_to_send(&mut self, event: LinkEvent) -> bool {
        self.echo_events.inject(event);
        true
    }

    fn accept_to_read(&mut self, buffer: &[u8]) -> bool {
        self.echo_stream.push(buffer);
        true
    }

    fn take_to_write(&mut self) -> Option<Vec<u8>> {
        self.echo_stream.take_output_concat()
    }

    fn install_after_send(&mut self, hook: EventHook) -> bool {
        self.after_send = Some(hook);
        true
    }

    fn install_after_write(&mut self, hook: StreamHook) -> bool {
        self.after_write = Some(hook);
        true
    }
}

/// An echo endpoint with below faces only, reflecting upward traffic back
/// down.
pub struct TopLoopbackLink {
    handle: LinkHandle,
}

impl TopLoopbackLink {
    /// A top loopback link with the default display name.
    pub fn new() -> Self {
        Self::named("TopLoopbackLink")
    }

    /// A top loopback link with the given display name.
    pub fn named(name: impl Into<String>) -> Self {
        let origin = Origin::from(name.into().as_str());
        let body = TopLoopbackLinkBody {
            echo_events: EventProcessor::new(Box::new(EchoRoutine {
                direction: Direction::Down,
                origin: origin.clone(),
            })),
            echo_stream: StreamProcessor::new(Box::new(RelayRoutine)),
            after_send: None,
            after_write: None,
            origin,
        };
        let cell: Rc<RefCell<dyn Link>> = Rc::new(RefCell::new(body));
        Self {
            handle: LinkHandle::new(cell),
        }
    }

    /// A clone of this link's shared handle.
    pub fn handle(&self) -> LinkHandle {
        self.handle.clone()
    }
}

impl Default for TopLoopbackLink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TopLoopbackLink {
    type Target = LinkHandle;

    fn deref(&self) -> &LinkHandle {
        &self.handle
    }
}

impl From<&TopLoopbackLink> for LinkHandle {
    fn from(link: &TopLoopbackLink) -> LinkHandle {
        link.handle()
    }
}

struct BottomLoopbackLinkBody {
    origin: Origin,
    echo_events: EventProcessor<LinkEvent, LinkEvent>,
    echo_stream: StreamProcessor,
    after_receive: Option<EventHook>,
    after_read: Option<StreamHook>,
}

impl Link for BottomLoopbackLinkBody {
    fn origin(&self) -> Origin {
        self.origin.clone()
    }

    fn service(&mut self) -> Vec<Emission> {
        let mut batch = Vec::new();
        loop {
            let stepped =
                self.echo_events.step_once().is_some() | self.echo_stream.step_once().is_some();
            drain_events(&mut self.echo_events, &self.after_receive, &mut batch);
            drain_buffers(&mut self.echo_stream, &self.after_read, &mut batch);
            if !batch.is_empty() || !stepped {
                return batch;
            }
        }
    }

    fn accept_send(&mut self, event: LinkEvent) -> bool {
        self.echo_events.push(event);
        true
    }

    fn take_receive(&mut self) -> Option<LinkEvent> {
        self.echo_events.take_output()
    }

    fn has_receive(&self) -> bool {
        self.echo_events.has_output()
    }

    fn accept_inject_receive(&mut self, event: LinkEvent) -> bool {
        self.echo_events.inject(event);
        true
    }

    fn accept_write(&mut self, buffer: &[u8]) -> bool {
        self.echo_stream.push(buffer);
        true
    }

    fn take_read(&mut self) -> Option<Vec<u8>> {
        self.echo_stream.take_output_concat()
    }

    fn install_after_receive(&mut self, hook: EventHook) -> bool {
        self.after_receive = Some(hook);
        true
    }

    fn install_after_read(&mut self, hook: StreamHook) -> bool {
        self.after_read = Some(hook);
        true
    }
}

/// An echo endpoint with above faces only, reflecting downward traffic back
/// up.
pub struct BottomLoopbackLink {
    handle: LinkHandle,
}

impl BottomLoopbackLink {
    /// A bottom loopback link with the default display name.
    pub fn new() -> Self {
        Self::named("BottomLoopbackLink")
    }

    /// A bottom loopback link with the given display name.
    pub fn named(name: impl Into<String>) -> Self {
        let origin = Origin::from(name.into().as_str());
        let body = BottomLoopbackLinkBody {
            echo_events: EventProcessor::new(Box::new(EchoRoutine {
                direction: Direction::Up,
                origin: origin.clone(),
            })),
            echo_stream: StreamProcessor::new(Box::new(RelayRoutine)),
            after_receive: None,
            after_read: None,
            origin,
        };
        let cell: Rc<RefCell<dyn Link>> = Rc::new(RefCell::new(body));
        Self {
            handle: LinkHandle::new(cell),
        }
    }

    /// A clone of this link's shared handle.
    pub fn handle(&self) -> LinkHandle {
        self.handle.clone()
    }
}

impl Default for BottomLoopbackLink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for BottomLoopbackLink {
    type Target = LinkHandle;

    fn deref(&self) -> &LinkHandle {
        &self.handle
    }
}

impl From<&BottomLoopbackLink> for LinkHandle {
    fn from(link: &BottomLoopbackLink) -> LinkHandle {
        link.handle()
    }
}

// === Tests ===
