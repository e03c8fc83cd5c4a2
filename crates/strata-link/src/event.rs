//! Events exchanged between layered links.
//!
//! Everything that moves through an event link is one of the variants of
//! [`LinkEvent`]:
//!
//! - [`LinkData`]: a payload travelling up or down the stack;
//! - [`LinkException`]: a captured failure travelling as data;
//! - [`LinkClockTime`]: a clock update injected into clocked links;
//! - [`LinkClockRequest`]: a request to be woken at a future time.
//!
//! Every event carries an opaque [`EventId`], the id of the event it was
//! derived from (`previous`), a textual `origin` naming the link that
//! produced it, and an open `context` map of metadata. The `previous` id is
//! a debug breadcrumb only: it owns nothing and resolving it is not
//! supported, so chains of derived events never keep their ancestors alive.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic process-wide counter backing [`EventId`].
static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(u64);

impl EventId {
    pub(crate) fn fresh() -> Self {
        Self(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which way an event is travelling through the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the bottom of the stack toward the application.
    Up,
    /// From the application toward the bottom of the stack.
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// A value stored in an event's context map.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    /// A point in time or duration, in seconds.
    Time(f64),
    /// Free-form text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

/// Open metadata attached to an event, copied when events are derived.
pub type Context = BTreeMap<String, ContextValue>;

/// Textual identity of the link that produced an event.
pub type Origin = Arc<str>;

/// A payload travelling through the stack.
#[derive(Debug, Clone)]
pub struct LinkData {
    data: Vec<u8>,
    direction: Direction,
    id: EventId,
    previous: Option<EventId>,
    origin: Origin,
    context: Context,
}

impl LinkData {
    /// Wrap a raw payload as a fresh event with no ancestry.
    pub fn new(data: Vec<u8>, direction: Direction) -> Self {
        Self::with_origin(data, direction, Origin::from(""))
    }

    /// Wrap a raw payload as a fresh event attributed to `origin`.
    pub fn with_origin(data: Vec<u8>, direction: Direction, origin: Origin) -> Self {
        Self {
            data,
            direction,
            id: EventId::fresh(),
            previous: None,
            origin,
            context: Context::new(),
        }
    }

    /// The payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the event, returning the payload.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Which way the event is travelling.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// This event's identity.
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Identity of the event this one was derived from, if any.
    pub fn previous(&self) -> Option<EventId> {
        self.previous
    }

    /// Name of the link that produced this event.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Metadata attached to this event.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Mutable access to the metadata map.
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Derive a new data event from this one: same payload and context,
    /// re-tagged direction and origin, `previous` pointing at this event.
    ///
    /// This is the only way payloads change hands between layers, which is
    /// what keeps an already-wrapped payload from being wrapped again.
    pub fn redirect(self, direction: Direction, origin: Origin) -> Self {
        Self {
            data: self.data,
            direction,
            id: EventId::fresh(),
            previous: Some(self.id),
            origin,
            context: self.context,
        }
    }
}

impl fmt::Display for LinkData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "data {} ({} bytes) from [{}]",
            self.direction,
            self.data.len(),
            self.origin
        )
    }
}

/// A captured failure travelling through the stack as data.
///
/// Failures on the data path are events, not `Err` returns: a link that does
/// not specifically handle a failure kind must pass the event along
/// unmodified so a layer above (or the application) can deal with it.
#[derive(Debug, Clone)]
pub struct LinkException {
    cause: Arc<anyhow::Error>,
    direction: Direction,
    id: EventId,
    previous: Option<EventId>,
    origin: Origin,
    context: Context,
}

impl LinkException {
    /// Capture a failure travelling in `direction`.
    pub fn new(cause: impl Into<anyhow::Error>, direction: Direction) -> Self {
        Self {
            cause: Arc::new(cause.into()),
            direction,
            id: EventId::fresh(),
            previous: None,
            origin: Origin::from(""),
            context: Context::new(),
        }
    }

    /// The captured failure.
    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }

    /// Which way the failure is travelling.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// This event's identity.
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Identity of the event this one was derived from, if any.
    pub fn previous(&self) -> Option<EventId> {
        self.previous
    }

    /// Name of the link that produced this event.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Metadata attached to this event.
    pub fn context(&self) -> &Context {
        &self.context
    }
}

impl fmt::Display for LinkException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "exception {} from [{}]: {}",
            self.direction, self.origin, self.cause
        )
    }
}

/// A clock update delivered into a clocked link's processors.
#[derive(Debug, Clone)]
pub struct LinkClockTime {
    time: f64,
    id: EventId,
    origin: Origin,
}

impl LinkClockTime {
    /// A clock update carrying the current time.
    pub fn new(time: f64) -> Self {
        Self {
            time,
            id: EventId::fresh(),
            origin: Origin::from(""),
        }
    }

    /// The time being announced, in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// This event's identity.
    pub fn id(&self) -> EventId {
        self.id
    }
}

impl fmt::Display for LinkClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clock time {}", self.time)
    }
}

/// A request to be woken once the clock reaches a given time.
///
/// Requests are ordered by requested time, and a concrete request always
/// precedes the absence of one, so aggregating "the earliest wake-up anyone
/// needs" is a plain minimum fold over optionals via
/// [`LinkClockRequest::earliest`].
#[derive(Debug, Clone)]
pub struct LinkClockRequest {
    requested_time: f64,
    id: EventId,
    previous: Option<EventId>,
    origin: Origin,
    context: Context,
}

impl LinkClockRequest {
    /// Request a wake-up at `requested_time`.
    pub fn new(requested_time: f64) -> Self {
        Self::derived(requested_time, None, Origin::from(""))
    }

    /// Request a wake-up at `requested_time`, attributed to `origin` and
    /// derived from the event `previous`.
    pub fn derived(requested_time: f64, previous: Option<EventId>, origin: Origin) -> Self {
        Self {
            requested_time,
            id: EventId::fresh(),
            previous,
            origin,
            context: Context::new(),
        }
    }

    /// The requested wake-up time, in seconds.
    pub fn requested_time(&self) -> f64 {
        self.requested_time
    }

    /// This event's identity.
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Identity of the event this one was derived from, if any.
    pub fn previous(&self) -> Option<EventId> {
        self.previous
    }

    /// Name of the link that produced this event.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Metadata attached to this event.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Mutable access to the metadata map.
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Whether a clock that has reached `time` satisfies this request.
    pub fn is_due(&self, time: f64) -> bool {
        time >= self.requested_time
    }

    /// The earlier of two optional requests. Any concrete request precedes
    /// "no request", so folding a sequence with this yields the earliest
    /// wake-up anyone asked for, or `None` if nobody did.
    pub fn earliest(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (Some(a), Some(b)) => {
                if b.requested_time < a.requested_time {
                    Some(b)
                } else {
                    Some(a)
                }
            }
            (Some(a), None) => Some(a),
            (None, b) => b,
        }
    }
}

impl PartialEq for LinkClockRequest {
    fn eq(&self, other: &Self) -> bool {
        self.requested_time == other.requested_time
    }
}

impl PartialOrd for LinkClockRequest {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.requested_time.partial_cmp(&other.requested_time)
    }
}

impl fmt::Display for LinkClockRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clock request for {}", self.requested_time)
    }
}

/// Any event a link can carry.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// A payload travelling through the stack.
    Data(LinkData),
    /// A captured failure travelling as data.
    Exception(LinkException),
    /// A clock update.
    ClockTime(LinkClockTime),
    /// A wake-up request.
    ClockRequest(LinkClockRequest),
}

impl LinkEvent {
    /// Short name of the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            LinkEvent::Data(_) => "data",
            LinkEvent::Exception(_) => "exception",
            LinkEvent::ClockTime(_) => "clock-time",
            LinkEvent::ClockRequest(_) => "clock-request",
        }
    }

    /// This event's identity.
    pub fn id(&self) -> EventId {
        match self {
            LinkEvent::Data(event) => event.id(),
            LinkEvent::Exception(event) => event.id(),
            LinkEvent::ClockTime(event) => event.id(),
            LinkEvent::ClockRequest(event) => event.id(),
        }
    }

    /// The payload, if this is a data event.
    pub fn as_data(&self) -> Option<&LinkData> {
        match self {
            LinkEvent::Data(event) => Some(event),
            _ => None,
        }
    }

    /// Consume the event, keeping it only if it is a data event.
    pub fn into_data(self) -> Option<LinkData> {
        match self {
            LinkEvent::Data(event) => Some(event),
            _ => None,
        }
    }

    /// Derive a re-tagged data event, if this is a data event. Exceptions
    /// and clock events have no data derivation and yield `None`.
    pub fn redirect_data(self, direction: Direction, origin: Origin) -> Option<LinkData> {
        self.into_data().map(|data| data.redirect(direction, origin))
    }
}

impl fmt::Display for LinkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkEvent::Data(event) => event.fmt(f),
            LinkEvent::Exception(event) => event.fmt(f),
            LinkEvent::ClockTime(event) => event.fmt(f),
            LinkEvent::ClockRequest(event) => event.fmt(f),
        }
    }
}

impl From<LinkData> for LinkEvent {
    fn from(event: LinkData) -> Self {
        LinkEvent::Data(event)
    }
}

impl From<LinkException> for LinkEvent {
    fn from(event: LinkException) -> Self {
        LinkEvent::Exception(event)
    }
}

impl From<LinkClockTime> for LinkEvent {
    fn from(event: LinkClockTime) -> Self {
        LinkEvent::ClockTime(event)
    }
}

impl From<LinkClockRequest> for LinkEvent {
    fn from(event: LinkClockRequest) -> Self {
        LinkEvent::ClockRequest(event)
    }
}

impl From<Vec<u8>> for LinkEvent {
    fn from(data: Vec<u8>) -> Self {
        LinkEvent::Data(LinkData::new(data, Direction::Up))
    }
}

impl From<&[u8]> for LinkEvent {
    fn from(data: &[u8]) -> Self {
        LinkEvent::Data(LinkData::new(data.to_vec(), Direction::Up))
    }
}

// === Tests ===

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_preserves_payload_and_links_ancestry() {
        let mut original = LinkData::new(b"payload".to_vec(), Direction::Up);
        original
            .context_mut()
            .insert("time".into(), ContextValue::Time(1.5));
        let original_id = original.id();

        let derived = original.redirect(Direction::Down, Origin::from("relay"));

        assert_eq!(derived.data(), b"payload");
        assert_eq!(derived.direction(), Direction::Down);
        assert_eq!(derived.previous(), Some(original_id));
        assert_ne!(derived.id(), original_id);
        assert_eq!(&**derived.origin(), "relay");
        assert_eq!(
            derived.context().get("time"),
            Some(&ContextValue::Time(1.5))
        );
    }

    #[test]
    fn test_redirect_data_ignores_non_data_events() {
        let event = LinkEvent::from(LinkClockTime::new(2.0));
        assert!(event
            .redirect_data(Direction::Up, Origin::from("x"))
            .is_none());

        let event = LinkEvent::from(LinkException::new(
            anyhow::anyhow!("checksum mismatch"),
            Direction::Up,
        ));
        assert!(event
            .redirect_data(Direction::Up, Origin::from("x"))
            .is_none());
    }

    #[test]
    fn test_raw_payload_wraps_as_upward_data() {
        let event = LinkEvent::from(b"raw".as_slice());
        let data = event.as_data().unwrap();
        assert_eq!(data.data(), b"raw");
        assert_eq!(data.direction(), Direction::Up);
        assert_eq!(data.previous(), None);
    }

    #[test]
    fn test_earliest_prefers_any_request_over_none() {
        let early = LinkClockRequest::new(1.0);
        let late = LinkClockRequest::new(2.0);

        let folded = LinkClockRequest::earliest(Some(late.clone()), Some(early.clone()));
        assert_eq!(folded.unwrap().requested_time(), 1.0);

        let folded = LinkClockRequest::earliest(None, Some(late.clone()));
        assert_eq!(folded.unwrap().requested_time(), 2.0);

        let folded = LinkClockRequest::earliest(Some(early), None);
        assert_eq!(folded.unwrap().requested_time(), 1.0);

        assert!(LinkClockRequest::earliest(None, None).is_none());
    }

    #[test]
    fn test_request_due_at_or_after_requested_time() {
        let request = LinkClockRequest::new(1.0);
        assert!(!request.is_due(0.5));
        assert!(request.is_due(1.0));
        assert!(request.is_due(1.5));
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = LinkData::new(vec![], Direction::Up);
        let b = LinkData::new(vec![], Direction::Up);
        assert_ne!(a.id(), b.id());
    }
}
