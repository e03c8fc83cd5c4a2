//! Event links: the basic payload-deriving layer.
//!
//! An event link re-tags payloads as they change hands between layers: a
//! data event crossing the link comes out as a fresh event derived from the
//! original, stamped with this link's origin and the direction of travel.
//! Exceptions and clock events pass through untouched in both directions.
//! Either side can be switched to passthrough, which forwards every event
//! unmodified.

use std::cell::RefCell;
use std::rc::Rc;

use crate::event::{Direction, LinkEvent, Origin};
use crate::processor::{EventIo, EventProcessor, EventRoutine, Step};

use super::{drain_events, Emission, EventHook, Link, LinkHandle};

/// Configuration for an [`EventLink`].
#[derive(Debug, Clone)]
pub struct EventLinkConfig {
    /// Display name, stamped as the origin of derived events.
    pub name: String,
    /// Forward upward events unmodified instead of deriving them.
    pub receiver_passthrough: bool,
    /// Forward downward events unmodified instead of deriving them.
    pub sender_passthrough: bool,
}

impl Default for EventLinkConfig {
    fn default() -> Self {
        Self {
            name: "EventLink".into(),
            receiver_passthrough: false,
            sender_passthrough: false,
        }
    }
}

/// Routine for one side of an event link: derive data events in the side's
/// direction of travel, pass everything else along.
pub(crate) struct RedirectRoutine {
    direction: Direction,
    passthrough: bool,
    origin: Origin,
}

impl RedirectRoutine {
    pub(crate) fn new(direction: Direction, passthrough: bool, origin: Origin) -> Self {
        Self {
            direction,
            passthrough,
            origin,
        }
    }
}

impl EventRoutine<LinkEvent, LinkEvent> for RedirectRoutine {
    fn step(&mut self, io: &mut EventIo<'_, LinkEvent, LinkEvent>) -> Step {
        let Some(event) = io.receive() else {
            return Step::Wait;
        };
        let event = if self.passthrough {
            event
        } else {
            match event {
                LinkEvent::Data(data) => {
                    LinkEvent::Data(data.redirect(self.direction, self.origin.clone()))
                }
                other => other,
            }
        };
        io.send(event);
        Step::Proceed
    }
}

struct EventLinkBody {
    origin: Origin,
    receiver: EventProcessor<LinkEvent, LinkEvent>,
    sender: EventProcessor<LinkEvent, LinkEvent>,
    after_receive: Option<EventHook>,
    after_send: Option<EventHook>,
}

impl EventLinkBody {
    fn new(config: EventLinkConfig) -> Self {
        let origin = Origin::from(config.name.as_str());
        Self {
            receiver: EventProcessor::new(Box::new(RedirectRoutine::new(
                Direction::Up,
                config.receiver_passthrough,
                origin.clone(),
            ))),
            sender: EventProcessor::new(Box::new(RedirectRoutine::new(
                Direction::Down,
                config.sender_passthrough,
                origin.clone(),
            ))),
            after_receive: None,
            after_send: None,
            origin,
        }
    }
}

impl Link for EventLinkBody {
    fn origin(&self) -> Origin {
        self.origin.clone()
    }

    fn service(&mut self) -> Vec<Emission> {
        let mut batch = Vec::new();
        loop {
            let stepped =
                self.receiver.step_once().is_some() | self.sender.step_once().is_some();
            drain_events(&mut self.receiver, &self.after_receive, &mut batch);
            drain_events(&mut self.sender, &self.after_send, &mut batch);
            if !batch.is_empty() || !stepped {
                return batch;
            }
        }
    }

    fn accept_to_receive(&mut self, event: LinkEvent) -> bool {
        self.receiver.push(event);
        true
    }

    fn accept_send(&mut self, event: LinkEvent) -> bool {
        self.sender.push(event);
        true
    }

    fn take_receive(&mut self) -> Option<LinkEvent> {
        self.receiver.take_output()
    }

    fn has_receive(&self) -> bool {
        self.receiver.has_output()
    }

    fn take_to_send(&mut self) -> Option<LinkEvent> {
        self.sender.take_output()
    }

    fn has_to_send(&self) -> bool {
        self.sender.has_output()
    }

    fn accept_inject_receive(&mut self, event: LinkEvent) -> bool {
        self.receiver.inject(event);
        true
    }

    fn accept_inject_to_send(&mut self, event: LinkEvent) -> bool {
        self.sender.inject(event);
        true
    }

    fn install_after_receive(&mut self, hook: EventHook) -> bool {
        self.after_receive = Some(hook);
        true
    }

    fn install_after_send(&mut self, hook: EventHook) -> bool {
        self.after_send = Some(hook);
        true
    }
}

/// A link that derives payload events between adjacent layers.
pub struct EventLink {
    handle: LinkHandle,
}

impl EventLink {
    /// An event link with default configuration.
    pub fn new() -> Self {
        Self::with_config(EventLinkConfig::default())
    }

    /// An event link with the given display name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::with_config(EventLinkConfig {
            name: name.into(),
            ..EventLinkConfig::default()
        })
    }

    /// An event link with explicit configuration.
    pub fn with_config(config: EventLinkConfig) -> Self {
        let cell: Rc<RefCell<dyn Link>> = Rc::new(RefCell::new(EventLinkBody::new(config)));
        Self {
            handle: LinkHandle::new(cell),
        }
    }

    /// A clone of this link's shared handle.
    pub fn handle(&self) -> LinkHandle {
        self.handle.clone()
    }
}

impl Default for EventLink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for EventLink {
    type Target = LinkHandle;

    fn deref(&self) -> &LinkHandle {
        &self.handle
    }
}

impl From<&EventLink> for LinkHandle {
    fn from(link: &EventLink) -> LinkHandle {
        link.handle()
    }
}

// === Tests ===

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{LinkClockTime, LinkException};

    #[test]
    fn test_sent_payloads_derive_downward() {
        let link = EventLink::named("radio");
        link.send_data(b"hello".to_vec());

        let event = link.to_send().unwrap();
        let data = event.as_data().unwrap();
        assert_eq!(data.data(), b"hello");
        assert_eq!(data.direction(), Direction::Down);
        assert_eq!(&**data.origin(), "radio");
        assert!(data.previous().is_some());
        assert!(link.to_send().is_none());
    }

    #[test]
    fn test_received_payloads_derive_upward() {
        let link = EventLink::new();
        link.to_receive_data(b"hello".to_vec());

        let event = link.receive().unwrap();
        let data = event.as_data().unwrap();
        assert_eq!(data.data(), b"hello");
        assert_eq!(data.direction(), Direction::Up);
        assert_eq!(&**data.origin(), "EventLink");
    }

    #[test]
    fn test_exceptions_pass_through_unmodified() {
        let link = EventLink::new();
        let exception = LinkException::new(anyhow::anyhow!("checksum mismatch"), Direction::Up);
        let exception_id = exception.id();

        link.to_receive(exception);
        let received = link.receive().unwrap();
        assert_eq!(received.id(), exception_id);

        let exception = LinkException::new(anyhow::anyhow!("remote closed"), Direction::Down);
        let exception_id = exception.id();

        link.send(exception);
        assert_eq!(link.to_send().unwrap().id(), exception_id);
    }

    #[test]
    fn test_clock_events_pass_through_unmodified() {
        let link = EventLink::new();
        let tick = LinkClockTime::new(3.0);
        let tick_id = tick.id();

        link.to_receive(tick);
        assert_eq!(link.receive().unwrap().id(), tick_id);
    }

    #[test]
    fn test_passthrough_skips_derivation() {
        let link = EventLink::with_config(EventLinkConfig {
            receiver_passthrough: true,
            ..EventLinkConfig::default()
        });
        let original = LinkEvent::from(b"raw".as_slice());
        let original_id = original.id();

        link.to_receive(original);
        assert_eq!(link.receive().unwrap().id(), original_id);
    }

    #[test]
    fn test_receive_all_drains_in_order() {
        let link = EventLink::new();
        link.to_receive_data(b"one".to_vec());
        link.to_receive_data(b"two".to_vec());

        let events = link.receive_all();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_data().unwrap().data(), b"one");
        assert_eq!(events[1].as_data().unwrap().data(), b"two");
        assert!(!link.has_receive());
    }

    #[test]
    fn test_hook_replaces_receive_queue() {
        let link = EventLink::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        link.set_after_receive(Rc::new(move |event| sink.borrow_mut().push(event)));

        link.to_receive_data(b"hooked".to_vec());

        assert!(!link.has_receive());
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].as_data().unwrap().data(), b"hooked");
    }

    #[test]
    fn test_inject_bypasses_derivation() {
        let link = EventLink::new();
        let original = LinkEvent::from(b"verbatim".as_slice());
        let original_id = original.id();

        link.inject_receive(original);
        assert_eq!(link.receive().unwrap().id(), original_id);
    }

    /// A hook may feed the link it is installed on without deadlocking.
    #[test]
    fn test_hook_may_reenter_its_own_link() {
        let link = EventLink::named("echo");
        let back = link.handle();
        link.set_after_send(Rc::new(move |event| {
            if let Some(data) = event.into_data() {
                back.to_receive_data(data.into_data());
            }
        }));

        link.send_data(b"ping".to_vec());

        let event = link.receive().unwrap();
        assert_eq!(event.as_data().unwrap().data(), b"ping");
        assert_eq!(event.as_data().unwrap().direction(), Direction::Up);
    }
}
