//! Clocked links: time-dependent processing without any real timers.
//!
//! A clocked link owns a [`Clock`] that only moves when told to: callers
//! push the current time in through `update_clock`, and the link answers
//! with the next time it needs to be woken ([`LinkClockRequest`]). Inside
//! the link, clock updates travel through the ordinary event routines as
//! [`LinkClockTime`] events, so time-dependent logic lives in the same
//! suspension discipline as everything else. Wake-up requests are
//! deduplicated through a shared timer so repeated processing of the same
//! deadline does not spam the layers above.
//!
//! [`DelayedEventLink`] is the concrete clocked link here: it holds data
//! events in flight for a configured delay per direction, delivering each
//! once the clock reaches its deadline. Failures are not delayed; they pass
//! through immediately.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::event::{
    ContextValue, Direction, EventId, LinkClockRequest, LinkClockTime, LinkData, LinkEvent, Origin,
};
use crate::processor::{EventIo, EventProcessor, EventRoutine, Step};
use crate::timing::{is_close, Clock, TimeoutTimer};

use super::{drain_events, Emission, EventHook, Link, LinkHandle};

/// Clock plus wake-up request bookkeeping, shared by the routines of one
/// clocked link.
///
/// The single request timer serves both directions: it remembers the last
/// deadline a wake-up was issued for, so each deadline produces exactly one
/// request no matter how many routines observe it.
pub struct ClockState {
    clock: Clock,
    request_timer: TimeoutTimer,
}

impl ClockState {
    /// Clock state over the given clock, with no wake-up outstanding.
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            request_timer: TimeoutTimer::new(None),
        }
    }

    /// The underlying clock.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Current time on the underlying clock, in seconds.
    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    /// Advance the clock, retiring the outstanding wake-up request if the
    /// new time satisfies it.
    pub fn advance(&mut self, time: f64) {
        self.clock.update(time);
        if self.request_timer.timed_out(&self.clock) {
            self.request_timer.stop();
        }
    }

    /// Issue a wake-up request for the deadline `at`, unless one for the
    /// same deadline is already outstanding.
    pub fn request(
        &mut self,
        at: f64,
        previous: Option<EventId>,
        origin: Origin,
    ) -> Option<LinkClockRequest> {
        if self.request_timer.running(&self.clock) {
            if let Some(current) = self.request_timer.timeout_time() {
                if is_close(current, at) {
                    return None;
                }
            }
        }
        self.request_timer.restart(at - self.clock.time(), &self.clock);
        let mut request = LinkClockRequest::derived(at, previous, origin);
        request
            .context_mut()
            .insert("time".into(), ContextValue::Time(self.clock.time()));
        Some(request)
    }

    /// The outstanding wake-up request, if any.
    pub fn pending_request(&self, origin: Origin) -> Option<LinkClockRequest> {
        if !self.request_timer.running(&self.clock) {
            return None;
        }
        let at = self.request_timer.timeout_time()?;
        let mut request = LinkClockRequest::derived(at, None, origin);
        request
            .context_mut()
            .insert("time".into(), ContextValue::Time(self.clock.time()));
        Some(request)
    }
}

/// Configuration for a [`DelayedEventLink`].
#[derive(Debug, Clone)]
pub struct DelayedEventLinkConfig {
    /// Display name, stamped as the origin of delayed events.
    pub name: String,
    /// Starting time of the link's clock, in seconds.
    pub clock_start: f64,
    /// Delay applied to upward data events, in seconds.
    pub receive_delay: f64,
    /// Delay applied to downward data events, in seconds.
    pub send_delay: f64,
}

impl Default for DelayedEventLinkConfig {
    fn default() -> Self {
        Self {
            name: "DelayedEventLink".into(),
            clock_start: 0.0,
            receive_delay: 1.0,
            send_delay: 1.0,
        }
    }
}

/// Context keys stamped onto delayed events, named for the side that
/// delivers them.
struct DelayKeys {
    queued: &'static str,
    intended: &'static str,
    delivered: &'static str,
}

const RECEIVE_KEYS: DelayKeys = DelayKeys {
    queued: "to_receive_time",
    intended: "intended_receive_time",
    delivered: "actual_receive_time",
};

const SEND_KEYS: DelayKeys = DelayKeys {
    queued: "to_send_time",
    intended: "intended_send_time",
    delivered: "actual_send_time",
};

struct InFlight {
    event: LinkData,
    timer: TimeoutTimer,
}

/// Routine for one side of a delayed event link: hold data events until
/// their deadline, let failures through at once, consume clock updates.
struct DelayRoutine {
    shared: Rc<RefCell<ClockState>>,
    direction: Direction,
    delay: f64,
    origin: Origin,
    keys: DelayKeys,
    in_flight: VecDeque<InFlight>,
}

impl DelayRoutine {
    fn new(
        shared: Rc<RefCell<ClockState>>,
        direction: Direction,
        delay: f64,
        origin: Origin,
    ) -> Self {
        let keys = match direction {
            Direction::Up => RECEIVE_KEYS,
            Direction::Down => SEND_KEYS,
        };
        Self {
            shared,
            direction,
            delay,
            origin,
            keys,
            in_flight: VecDeque::new(),
        }
    }

    fn enqueue(&mut self, data: LinkData) {
        let state = self.shared.borrow();
        let mut data = data.redirect(self.direction, self.origin.clone());
        data.context_mut()
            .insert(self.keys.queued.into(), ContextValue::Time(state.time()));
        let mut timer = TimeoutTimer::new(Some(self.delay));
        timer.start(state.clock());
        if let Some(at) = timer.timeout_time() {
            data.context_mut()
                .insert(self.keys.intended.into(), ContextValue::Time(at));
        }
        self.in_flight.push_back(InFlight { event: data, timer });
    }

    fn flush(&mut self, io: &mut EventIo<'_, LinkEvent, LinkEvent>) {
        let state = self.shared.borrow();
        while self
            .in_flight
            .front()
            .is_some_and(|front| front.timer.timed_out(state.clock()))
        {
            if let Some(mut entry) = self.in_flight.pop_front() {
                entry
                    .event
                    .context_mut()
                    .insert(self.keys.delivered.into(), ContextValue::Time(state.time()));
                io.send(entry.event.into());
            }
        }
    }

    fn issue_request(&mut self, io: &mut EventIo<'_, LinkEvent, LinkEvent>) {
        let Some(front) = self.in_flight.front() else {
            return;
        };
        let Some(at) = front.timer.timeout_time() else {
            return;
        };
        let previous = Some(front.event.id());
        let request = self
            .shared
            .borrow_mut()
            .request(at, previous, self.origin.clone());
        if let Some(request) = request {
            io.send(request.into());
        }
    }
}

impl EventRoutine<LinkEvent, LinkEvent> for DelayRoutine {
    fn step(&mut self, io: &mut EventIo<'_, LinkEvent, LinkEvent>) -> Step {
        let Some(event) = io.receive() else {
            return Step::Wait;
        };
        if let LinkEvent::ClockTime(tick) = &event {
            self.shared.borrow_mut().advance(tick.time());
        }
        match event {
            LinkEvent::Data(data) => self.enqueue(data),
            LinkEvent::Exception(exception) => io.send(exception.into()),
            LinkEvent::ClockTime(_) | LinkEvent::ClockRequest(_) => {}
        }
        self.flush(io);
        self.issue_request(io);
        Step::Proceed
    }
}

struct DelayedEventLinkBody {
    origin: Origin,
    shared: Rc<RefCell<ClockState>>,
    receiver: EventProcessor<LinkEvent, LinkEvent>,
    sender: EventProcessor<LinkEvent, LinkEvent>,
    after_receive: Option<EventHook>,
    after_send: Option<EventHook>,
}

impl DelayedEventLinkBody {
    fn new(config: DelayedEventLinkConfig) -> Self {
        let origin = Origin::from(config.name.as_str());
        let shared = Rc::new(RefCell::new(ClockState::new(Clock::external(
            config.clock_start,
        ))));
        Self {
            receiver: EventProcessor::new(Box::new(DelayRoutine::new(
                shared.clone(),
                Direction::Up,
                config.receive_delay,
                origin.clone(),
            ))),
            sender: EventProcessor::new(Box::new(DelayRoutine::new(
                shared.clone(),
                Direction::Down,
                config.send_delay,
                origin.clone(),
            ))),
            after_receive: None,
            after_send: None,
            shared,
            origin,
        }
    }
}

impl Link for DelayedEventLinkBody {
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

    fn is_clocked(&self) -> bool {
        true
    }

    fn update_clock(&mut self, time: f64) -> bool {
        self.receiver.push(LinkClockTime::new(time).into());
        self.sender.push(LinkClockTime::new(time).into());
        true
    }

    fn next_clock_request(&self) -> Option<LinkClockRequest> {
        self.shared.borrow().pending_request(self.origin.clone())
    }
}

/// A link that delivers data events only after a per-direction delay on an
/// externally driven clock.
pub struct DelayedEventLink {
    handle: LinkHandle,
}

impl DelayedEventLink {
    /// A delayed event link with default configuration: clock starting at
    /// zero, one second of delay in each direction.
    pub fn new() -> Self {
        Self::build(DelayedEventLinkConfig::default())
    }

    /// A delayed event link with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDelay`] when a delay is negative or not
    /// finite, and [`Error::InvalidClockStart`] when the clock start is not
    /// finite.
    pub fn with_config(config: DelayedEventLinkConfig) -> Result<Self> {
        for delay in [config.receive_delay, config.send_delay] {
            if !delay.is_finite() || delay < 0.0 {
                return Err(Error::InvalidDelay(delay));
            }
        }
        if !config.clock_start.is_finite() {
            return Err(Error::InvalidClockStart(config.clock_start));
        }
        Ok(Self::build(config))
    }

    fn build(config: DelayedEventLinkConfig) -> Self {
        let cell: Rc<RefCell<dyn Link>> =
            Rc::new(RefCell::new(DelayedEventLinkBody::new(config)));
        Self {
            handle: LinkHandle::new(cell),
        }
    }

    /// A clone of this link's shared handle.
    pub fn handle(&self) -> LinkHandle {
        self.handle.clone()
    }
}

impl Default for DelayedEventLink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for DelayedEventLink {
    type Target = LinkHandle;

    fn deref(&self) -> &LinkHandle {
        &self.handle
    }
}

impl From<&DelayedEventLink> for LinkHandle {
    fn from(link: &DelayedEventLink) -> LinkHandle {
        link.handle()
    }
}

// === Tests ===
