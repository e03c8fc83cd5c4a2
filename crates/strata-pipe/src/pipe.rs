//! Members, layers, and the plumbing shared by both pipe disciplines.
//!
//! A pipe stands between two [`Layer`]s of members and carries traffic
//! across the gap: upward output of the bottom layer is fanned into the
//! below faces of every top member, downward output of the top layer is
//! fanned into the above faces of every bottom member. Fan-out duplicates
//! events (each recipient gets its own copy); fanned streams are fed as-is.
//! Members lacking a face simply do not take the traffic.
//!
//! Clock requests are the one event kind a pipe never carries across:
//! whenever a transfer encounters one, the pipe captures it into a local
//! fold that keeps only the earliest, and surfaces the fold through
//! [`next_clock_request`](PipeCore::next_clock_request) alongside the
//! pending requests of its clocked members.
//!
//! A member is either a single link or a whole composition standing in for
//! one ([`Composite`]), which is how pipes and pipelines nest.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use strata_link::{EventHook, LinkClockRequest, LinkEvent, LinkHandle, StreamHook};

// === Composites ===

/// Boundary surface of a composition of links, matching the surface of a
/// single link closely enough for one to stand wherever the other can.
///
/// Pipes and pipelines implement this; it is what lets a pipeline serve as
/// one layer of a larger pipeline. All methods take `&self`: compositions
/// keep their mutable state behind interior cells so that traffic echoed
/// back through a hook can re-enter the composition mid-operation.
pub trait Composite {
    /// Short human-readable description, used in `Debug` output.
    fn describe(&self) -> String;

    // === Event faces ===

    /// Feed an event into the below face for upward processing.
    fn to_receive(&self, event: LinkEvent) -> bool;

    /// Feed an event into the above face for downward processing.
    fn send(&self, event: LinkEvent) -> bool;

    /// Take the next upward event, if one is ready.
    fn receive(&self) -> Option<LinkEvent>;

    /// Take every upward event currently ready.
    fn receive_all(&self) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.receive() {
            events.push(event);
        }
        events
    }

    /// Whether an upward event is ready.
    fn has_receive(&self) -> bool;

    /// Take the next downward event, if one is ready.
    fn to_send(&self) -> Option<LinkEvent>;

    /// Take every downward event currently ready.
    fn to_send_all(&self) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.to_send() {
            events.push(event);
        }
        events
    }

    /// Whether a downward event is ready.
    fn has_to_send(&self) -> bool;

    // === Stream faces ===

    /// Feed bytes into the below face for upward processing.
    fn to_read(&self, buffer: &[u8]) -> bool;

    /// Feed bytes into the above face for downward processing.
    fn write(&self, buffer: &[u8]) -> bool;

    /// Take all upward bytes currently ready, concatenated.
    fn read(&self) -> Option<Vec<u8>>;

    /// Take all downward bytes currently ready, concatenated.
    fn to_write(&self) -> Option<Vec<u8>>;

    // === Hook installation ===

    /// Replace the upward event disposition at the above boundary.
    fn set_after_receive(&self, hook: EventHook) -> bool;

    /// Replace the downward event disposition at the below boundary.
    fn set_after_send(&self, hook: EventHook) -> bool;

    /// Replace the upward stream disposition at the above boundary.
    fn set_after_read(&self, hook: StreamHook) -> bool;

    /// Replace the downward stream disposition at the below boundary.
    fn set_after_write(&self, hook: StreamHook) -> bool;

    // === Clocking ===

    /// Whether any member observes clock updates.
    fn is_clocked(&self) -> bool;

    /// Deliver a clock update throughout, returning the earliest wake-up
    /// still pending afterwards.
    fn update_clock(&self, time: f64) -> Option<LinkClockRequest>;

    /// Send-phase clock update of a phased tick. Compositions without an
    /// internal phase ordering take the whole update.
    fn update_clock_send(&self, time: f64) {
        self.update_clock(time);
    }

    /// Receive-phase clock update of a phased tick.
    fn update_clock_receive(&self, time: f64) {
        self.update_clock(time);
    }

    /// The earliest wake-up needed anywhere in the composition, if any.
    fn next_clock_request(&self) -> Option<LinkClockRequest>;

    /// Move queued traffic across pull-based seams, returning the earliest
    /// wake-up still pending. No-op for hook-driven compositions.
    fn sync(&self) -> Option<LinkClockRequest> {
        None
    }
}

// === Members ===

/// One member of a pipe layer: a single link, or a nested composition.
#[derive(Clone)]
pub enum PipeMember {
    /// A single link.
    Link(LinkHandle),
    /// A nested pipe or pipeline standing in for a link.
    Composite(Rc<dyn Composite>),
}

impl PipeMember {
    /// Short human-readable description of the member.
    pub fn describe(&self) -> String {
        match self {
            PipeMember::Link(handle) => handle.origin().to_string(),
            PipeMember::Composite(composite) => composite.describe(),
        }
    }

    /// Feed an event into the member's below face.
    pub fn to_receive(&self, event: LinkEvent) -> bool {
        match self {
            PipeMember::Link(handle) => handle.to_receive(event),
            PipeMember::Composite(composite) => composite.to_receive(event),
        }
    }

    /// Feed an event into the member's above face.
    pub fn send(&self, event: LinkEvent) -> bool {
        match self {
            PipeMember::Link(handle) => handle.send(event),
            PipeMember::Composite(composite) => composite.send(event),
        }
    }

    /// Take the member's next upward event.
    pub fn receive(&self) -> Option<LinkEvent> {
        match self {
            PipeMember::Link(handle) => handle.receive(),
            PipeMember::Composite(composite) => composite.receive(),
        }
    }

    /// Take every upward event the member has ready.
    pub fn receive_all(&self) -> Vec<LinkEvent> {
        match self {
            PipeMember::Link(handle) => handle.receive_all(),
            PipeMember::Composite(composite) => composite.receive_all(),
        }
    }

    /// Whether the member has an upward event ready.
    pub fn has_receive(&self) -> bool {
        match self {
            PipeMember::Link(handle) => handle.has_receive(),
            PipeMember::Composite(composite) => composite.has_receive(),
        }
    }

    /// Take the member's next downward event.
    pub fn to_send(&self) -> Option<LinkEvent> {
        match self {
            PipeMember::Link(handle) => handle.to_send(),
            PipeMember::Composite(composite) => composite.to_send(),
        }
    }

    /// Take every downward event the member has ready.
    pub fn to_send_all(&self) -> Vec<LinkEvent> {
        match self {
            PipeMember::Link(handle) => handle.to_send_all(),
            PipeMember::Composite(composite) => composite.to_send_all(),
        }
    }

    /// Whether the member has a downward event ready.
    pub fn has_to_send(&self) -> bool {
        match self {
            PipeMember::Link(handle) => handle.has_to_send(),
            PipeMember::Composite(composite) => composite.has_to_send(),
        }
    }

    /// Feed bytes into the member's below face.
    pub fn to_read(&self, buffer: &[u8]) -> bool {
        match self {
            PipeMember::Link(handle) => handle.to_read(buffer),
            PipeMember::Composite(composite) => composite.to_read(buffer),
        }
    }

    /// Feed bytes into the member's above face.
    pub fn write(&self, buffer: &[u8]) -> bool {
        match self {
            PipeMember::Link(handle) => handle.write(buffer),
            PipeMember::Composite(composite) => composite.write(buffer),
        }
    }

    /// Take all upward bytes the member has ready.
    pub fn read(&self) -> Option<Vec<u8>> {
        match self {
            PipeMember::Link(handle) => handle.read(),
            PipeMember::Composite(composite) => composite.read(),
        }
    }

    /// Take all downward bytes the member has ready.
    pub fn to_write(&self) -> Option<Vec<u8>> {
        match self {
            PipeMember::Link(handle) => handle.to_write(),
            PipeMember::Composite(composite) => composite.to_write(),
        }
    }

    /// Replace the member's upward event disposition.
    pub fn set_after_receive(&self, hook: EventHook) -> bool {
        match self {
            PipeMember::Link(handle) => handle.set_after_receive(hook),
            PipeMember::Composite(composite) => composite.set_after_receive(hook),
        }
    }

    /// Replace the member's downward event disposition.
    pub fn set_after_send(&self, hook: EventHook) -> bool {
        match self {
            PipeMember::Link(handle) => handle.set_after_send(hook),
            PipeMember::Composite(composite) => composite.set_after_send(hook),
        }
    }

    /// Replace the member's upward stream disposition.
    pub fn set_after_read(&self, hook: StreamHook) -> bool {
        match self {
            PipeMember::Link(handle) => handle.set_after_read(hook),
            PipeMember::Composite(composite) => composite.set_after_read(hook),
        }
    }

    /// Replace the member's downward stream disposition.
    pub fn set_after_write(&self, hook: StreamHook) -> bool {
        match self {
            PipeMember::Link(handle) => handle.set_after_write(hook),
            PipeMember::Composite(composite) => composite.set_after_write(hook),
        }
    }

    /// Whether the member observes clock updates.
    pub fn is_clocked(&self) -> bool {
        match self {
            PipeMember::Link(handle) => handle.is_clocked(),
            PipeMember::Composite(composite) => composite.is_clocked(),
        }
    }

    /// Deliver a clock update to the member.
    pub fn update_clock(&self, time: f64) -> Option<LinkClockRequest> {
        match self {
            PipeMember::Link(handle) => handle.update_clock(time),
            PipeMember::Composite(composite) => composite.update_clock(time),
        }
    }

    /// Send-phase clock update of a phased tick.
    pub fn update_clock_send(&self, time: f64) {
        match self {
            PipeMember::Link(handle) => handle.update_clock_send(time),
            PipeMember::Composite(composite) => composite.update_clock_send(time),
        }
    }

    /// Receive-phase clock update of a phased tick.
    pub fn update_clock_receive(&self, time: f64) {
        match self {
            PipeMember::Link(handle) => handle.update_clock_receive(time),
            PipeMember::Composite(composite) => composite.update_clock_receive(time),
        }
    }

    /// The earliest wake-up the member currently needs, if any.
    pub fn next_clock_request(&self) -> Option<LinkClockRequest> {
        match self {
            PipeMember::Link(handle) => handle.next_clock_request(),
            PipeMember::Composite(composite) => composite.next_clock_request(),
        }
    }

    /// Synchronize the member's pull-based internals, transitively.
    pub fn sync(&self) -> Option<LinkClockRequest> {
        match self {
            PipeMember::Link(handle) => handle.sync(),
            PipeMember::Composite(composite) => composite.sync(),
        }
    }
}

impl From<LinkHandle> for PipeMember {
    fn from(handle: LinkHandle) -> Self {
        PipeMember::Link(handle)
    }
}

impl std::fmt::Debug for PipeMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.describe())
    }
}

// === Layers ===

/// An ordered set of members standing side by side at one level of a
/// stack.
#[derive(Clone, Default)]
pub struct Layer {
    members: Vec<PipeMember>,
}

impl Layer {
    /// An empty layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a member to the layer.
    pub fn push(&mut self, member: impl Into<PipeMember>) {
        self.members.push(member.into());
    }

    /// The layer's members, in order.
    pub fn members(&self) -> &[PipeMember] {
        &self.members
    }

    /// Number of members in the layer.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the layer has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl From<LinkHandle> for Layer {
    fn from(handle: LinkHandle) -> Self {
        Self {
            members: vec![PipeMember::Link(handle)],
        }
    }
}

impl From<PipeMember> for Layer {
    fn from(member: PipeMember) -> Self {
        Self {
            members: vec![member],
        }
    }
}

impl From<Vec<PipeMember>> for Layer {
    fn from(members: Vec<PipeMember>) -> Self {
        Self { members }
    }
}

impl FromIterator<PipeMember> for Layer {
    fn from_iter<I: IntoIterator<Item = PipeMember>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.members.iter().map(PipeMember::describe).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

// === Span ===

/// The layers a pipe stands between. A solo pipe wraps a single layer and
/// performs no transfers; its boundary surface still delegates to the
/// members.
#[derive(Clone)]
pub(crate) enum Span {
    Solo(Layer),
    Layered { bottom: Layer, top: Layer },
}

impl Span {
    pub(crate) fn bottom(&self) -> &[PipeMember] {
        match self {
            Span::Solo(layer) => layer.members(),
            Span::Layered { bottom, .. } => bottom.members(),
        }
    }

    pub(crate) fn top(&self) -> &[PipeMember] {
        match self {
            Span::Solo(layer) => layer.members(),
            Span::Layered { top, .. } => top.members(),
        }
    }

    pub(crate) fn is_solo(&self) -> bool {
        matches!(self, Span::Solo(_))
    }
}

// === Shared state ===

/// Mutable pipe state shared with installed hooks. Borrows are always
/// transient; nothing is held across a call into a member.
#[derive(Debug)]
pub(crate) struct PipeShared {
    next_clock_request: Option<LinkClockRequest>,
    last_clock_update: Option<f64>,
    connected_up: bool,
    connected_down: bool,
}

impl Default for PipeShared {
    fn default() -> Self {
        Self {
            next_clock_request: None,
            last_clock_update: None,
            connected_up: true,
            connected_down: true,
        }
    }
}

impl PipeShared {
    /// Fold a clock request into the shared capture, keeping the earliest.
    pub(crate) fn capture_into(shared: &Rc<RefCell<PipeShared>>, request: LinkClockRequest) {
        trace!(
            time = request.requested_time(),
            "capturing clock request at pipe"
        );
        let mut state = shared.borrow_mut();
        let captured = state.next_clock_request.take();
        state.next_clock_request = LinkClockRequest::earliest(captured, Some(request));
    }

    pub(crate) fn connected_up(shared: &Rc<RefCell<PipeShared>>) -> bool {
        shared.borrow().connected_up
    }

    pub(crate) fn connected_down(shared: &Rc<RefCell<PipeShared>>) -> bool {
        shared.borrow().connected_down
    }
}

// === Core ===

/// Plumbing shared by both pipe disciplines: the span, the clocked-member
/// lists, the captured-request fold, and the fan and boundary operations.
pub(crate) struct PipeCore {
    span: Span,
    bottom_clocked: Vec<PipeMember>,
    top_clocked: Vec<PipeMember>,
    shared: Rc<RefCell<PipeShared>>,
}

impl PipeCore {
    pub(crate) fn new(span: Span) -> Self {
        let clocked = |members: &[PipeMember]| -> Vec<PipeMember> {
            members
                .iter()
                .filter(|member| member.is_clocked())
                .cloned()
                .collect()
        };
        let bottom_clocked = clocked(span.bottom());
        let top_clocked = clocked(span.top());
        Self {
            span,
            bottom_clocked,
            top_clocked,
            shared: Rc::new(RefCell::new(PipeShared::default())),
        }
    }

    pub(crate) fn bottom(&self) -> &[PipeMember] {
        self.span.bottom()
    }

    pub(crate) fn top(&self) -> &[PipeMember] {
        self.span.top()
    }

    pub(crate) fn is_solo(&self) -> bool {
        self.span.is_solo()
    }

    pub(crate) fn bottom_clocked(&self) -> &[PipeMember] {
        &self.bottom_clocked
    }

    pub(crate) fn top_clocked(&self) -> &[PipeMember] {
        &self.top_clocked
    }

    pub(crate) fn shared(&self) -> &Rc<RefCell<PipeShared>> {
        &self.shared
    }

    pub(crate) fn describe(&self) -> String {
        let names = |members: &[PipeMember]| -> String {
            members
                .iter()
                .map(PipeMember::describe)
                .collect::<Vec<_>>()
                .join(", ")
        };
        if self.is_solo() {
            format!("[{}]", names(self.bottom()))
        } else {
            format!("[{} | {}]", names(self.bottom()), names(self.top()))
        }
    }

    // === Fan operations ===

    /// Fan an upward event into every top member that takes events from
    /// below, each getting its own copy.
    pub(crate) fn receive_up(&self, event: LinkEvent) {
        for member in self.top() {
            member.to_receive(event.clone());
        }
    }

    /// Fan a downward event into every bottom member that takes events
    /// from above.
    pub(crate) fn send_down(&self, event: LinkEvent) {
        for member in self.bottom() {
            member.send(event.clone());
        }
    }

    /// Fan upward bytes into every top member that reads from below.
    pub(crate) fn read_up(&self, buffer: &[u8]) {
        for member in self.top() {
            member.to_read(buffer);
        }
    }

    /// Fan downward bytes into every bottom member that writes from above.
    pub(crate) fn write_down(&self, buffer: &[u8]) {
        for member in self.bottom() {
            member.write(buffer);
        }
    }

    // === Clock requests ===

    /// Fold a clock request into the local capture, keeping the earliest.
    pub(crate) fn capture_request(&self, request: LinkClockRequest) {
        PipeShared::capture_into(&self.shared, request);
    }

    /// The earliest wake-up needed by the capture fold or any clocked
    /// member.
    pub(crate) fn next_clock_request(&self) -> Option<LinkClockRequest> {
        let mut next = self.shared.borrow().next_clock_request.clone();
        for member in self.bottom_clocked.iter().chain(&self.top_clocked) {
            next = LinkClockRequest::earliest(next, member.next_clock_request());
        }
        next
    }

    /// Drop the captured fold once the overall earliest wake-up has come
    /// due. Members clear their own requests as they handle the update.
    pub(crate) fn clear_due_requests(&self, time: f64) {
        let due = self
            .next_clock_request()
            .is_some_and(|request| request.is_due(time));
        if due {
            self.shared.borrow_mut().next_clock_request = None;
        }
    }

    pub(crate) fn is_clocked(&self) -> bool {
        !self.bottom_clocked.is_empty() || !self.top_clocked.is_empty()
    }

    pub(crate) fn set_last_clock_update(&self, time: f64) {
        self.shared.borrow_mut().last_clock_update = Some(time);
    }

    pub(crate) fn last_clock_update(&self) -> Option<f64> {
        self.shared.borrow().last_clock_update
    }

    /// Deliver a clock update to every member. A solo pipe's members sit
    /// on both sides of the span and take the update twice, which clocked
    /// links treat as idempotent.
    pub(crate) fn update_members_clock(&self, time: f64) {
        for member in self.bottom().iter().chain(self.top()) {
            member.update_clock(time);
        }
    }

    pub(crate) fn set_connected_up(&self, connected: bool) {
        self.shared.borrow_mut().connected_up = connected;
    }

    pub(crate) fn set_connected_down(&self, connected: bool) {
        self.shared.borrow_mut().connected_down = connected;
    }

    pub(crate) fn connected_up(&self) -> bool {
        self.shared.borrow().connected_up
    }

    pub(crate) fn connected_down(&self) -> bool {
        self.shared.borrow().connected_down
    }

    // === Boundary surface ===

    pub(crate) fn to_receive(&self, event: LinkEvent) -> bool {
        let mut accepted = false;
        for member in self.bottom() {
            accepted |= member.to_receive(event.clone());
        }
        accepted
    }

    pub(crate) fn send(&self, event: LinkEvent) -> bool {
        let mut accepted = false;
        for member in self.top() {
            accepted |= member.send(event.clone());
        }
        accepted
    }

    pub(crate) fn receive(&self) -> Option<LinkEvent> {
        self.top()
            .iter()
            .find(|member| member.has_receive())
            .and_then(PipeMember::receive)
    }

    pub(crate) fn has_receive(&self) -> bool {
        self.top().iter().any(PipeMember::has_receive)
    }

    pub(crate) fn to_send(&self) -> Option<LinkEvent> {
        self.bottom()
            .iter()
            .find(|member| member.has_to_send())
            .and_then(PipeMember::to_send)
    }

    pub(crate) fn has_to_send(&self) -> bool {
        self.bottom().iter().any(PipeMember::has_to_send)
    }

    pub(crate) fn to_read(&self, buffer: &[u8]) -> bool {
        let mut accepted = false;
        for member in self.bottom() {
            accepted |= member.to_read(buffer);
        }
        accepted
    }

    pub(crate) fn write(&self, buffer: &[u8]) -> bool {
        let mut accepted = false;
        for member in self.top() {
            accepted |= member.write(buffer);
        }
        accepted
    }

    pub(crate) fn read(&self) -> Option<Vec<u8>> {
        concat_buffers(self.top().iter().filter_map(PipeMember::read))
    }

    pub(crate) fn to_write(&self) -> Option<Vec<u8>> {
        concat_buffers(self.bottom().iter().filter_map(PipeMember::to_write))
    }

    pub(crate) fn set_after_receive(&self, hook: EventHook) -> bool {
        let mut installed = false;
        for member in self.top() {
            installed |= member.set_after_receive(hook.clone());
        }
        installed
    }

    pub(crate) fn set_after_send(&self, hook: EventHook) -> bool {
        let mut installed = false;
        for member in self.bottom() {
            installed |= member.set_after_send(hook.clone());
        }
        installed
    }

    pub(crate) fn set_after_read(&self, hook: StreamHook) -> bool {
        let mut installed = false;
        for member in self.top() {
            installed |= member.set_after_read(hook.clone());
        }
        installed
    }

    pub(crate) fn set_after_write(&self, hook: StreamHook) -> bool {
        let mut installed = false;
        for member in self.bottom() {
            installed |= member.set_after_write(hook.clone());
        }
        installed
    }
}

fn concat_buffers(buffers: impl Iterator<Item = Vec<u8>>) -> Option<Vec<u8>> {
    let mut merged = Vec::new();
    for buffer in buffers {
        merged.extend_from_slice(&buffer);
    }
    if merged.is_empty() {
        None
    } else {
        Some(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use strata_link::{DelayedEventLink, EventLink, LinkClockRequest, StreamLink};

    fn layered(bottom: &EventLink, top: &EventLink) -> PipeCore {
        PipeCore::new(Span::Layered {
            bottom: Layer::from(bottom.handle()),
            top: Layer::from(top.handle()),
        })
    }

    #[test]
    fn test_layer_collects_members() {
        let a = EventLink::named("a");
        let b = EventLink::named("b");
        let mut layer = Layer::from(a.handle());
        layer.push(b.handle());
        assert_eq!(layer.len(), 2);
        assert!(!layer.is_empty());
        assert_eq!(format!("{layer:?}"), "[a, b]");
    }

    #[test]
    fn test_solo_span_exposes_the_same_members_on_both_sides() {
        let link = EventLink::named("only");
        let core = PipeCore::new(Span::Solo(Layer::from(link.handle())));
        assert!(core.is_solo());
        assert_eq!(core.bottom().len(), 1);
        assert_eq!(core.top().len(), 1);
        assert_eq!(core.describe(), "[only]");
    }

    #[test]
    fn test_fan_out_duplicates_events_across_tops() {
        let bottom = EventLink::named("bottom");
        let left = EventLink::named("left");
        let right = EventLink::named("right");
        let mut top = Layer::from(left.handle());
        top.push(right.handle());
        let core = PipeCore::new(Span::Layered {
            bottom: Layer::from(bottom.handle()),
            top,
        });

        core.receive_up(LinkEvent::from(b"shared".as_slice()));

        let from_left = left.receive().and_then(LinkEvent::into_data);
        let from_right = right.receive().and_then(LinkEvent::into_data);
        assert_eq!(from_left.as_ref().map(|data| data.data()), Some(b"shared".as_slice()));
        assert_eq!(from_right.as_ref().map(|data| data.data()), Some(b"shared".as_slice()));
    }

    #[test]
    fn test_fan_skips_members_without_the_face() {
        let bottom = EventLink::named("bottom");
        let framed = StreamLink::named("framed");
        let evented = EventLink::named("evented");
        let mut top = Layer::from(framed.handle());
        top.push(evented.handle());
        let core = PipeCore::new(Span::Layered {
            bottom: Layer::from(bottom.handle()),
            top,
        });

        core.receive_up(LinkEvent::from(b"only for events".as_slice()));

        assert!(framed.read().is_none());
        assert!(evented.has_receive());
    }

    #[test]
    fn test_boundary_read_concatenates_across_tops() {
        let bottom = StreamLink::named("bottom");
        let left = StreamLink::named("left");
        let right = StreamLink::named("right");
        let mut top = Layer::from(left.handle());
        top.push(right.handle());
        let core = PipeCore::new(Span::Layered {
            bottom: Layer::from(bottom.handle()),
            top,
        });

        left.to_read(b"one");
        right.to_read(b"two");

        assert_eq!(core.read(), Some(b"onetwo".to_vec()));
        assert_eq!(core.read(), None);
    }

    #[test]
    fn test_boundary_to_send_takes_from_the_first_ready_bottom() {
        let first = EventLink::named("first");
        let second = EventLink::named("second");
        let top = EventLink::named("top");
        let mut bottom = Layer::from(first.handle());
        bottom.push(second.handle());
        let core = PipeCore::new(Span::Layered {
            bottom,
            top: Layer::from(top.handle()),
        });

        second.send_data(b"late".to_vec());
        first.send_data(b"early".to_vec());

        let taken = core.to_send().and_then(LinkEvent::into_data);
        assert_eq!(taken.as_ref().map(|data| data.data()), Some(b"early".as_slice()));
    }

    #[test]
    fn test_capture_folds_to_the_earliest_request() {
        let bottom = EventLink::named("bottom");
        let top = EventLink::named("top");
        let core = layered(&bottom, &top);

        core.capture_request(LinkClockRequest::new(5.0));
        core.capture_request(LinkClockRequest::new(2.0));
        core.capture_request(LinkClockRequest::new(9.0));

        let next = core.next_clock_request();
        assert_eq!(next.map(|request| request.requested_time()), Some(2.0));
    }

    #[test]
    fn test_next_clock_request_consults_clocked_members() {
        let delayed = DelayedEventLink::new();
        let top = EventLink::named("top");
        let core = PipeCore::new(Span::Layered {
            bottom: Layer::from(delayed.handle()),
            top: Layer::from(top.handle()),
        });
        assert!(core.is_clocked());

        delayed.to_receive_data(b"held".to_vec());

        let next = core.next_clock_request();
        assert_eq!(next.map(|request| request.requested_time()), Some(1.0));
    }

    #[test]
    fn test_clear_due_requests_only_clears_the_captured_fold() {
        let delayed = DelayedEventLink::new();
        let top = EventLink::named("top");
        let core = PipeCore::new(Span::Layered {
            bottom: Layer::from(delayed.handle()),
            top: Layer::from(top.handle()),
        });

        delayed.to_receive_data(b"held".to_vec());
        core.capture_request(LinkClockRequest::new(0.5));

        core.clear_due_requests(0.5);

        let next = core.next_clock_request();
        assert_eq!(next.map(|request| request.requested_time()), Some(1.0));
    }

    #[test]
    fn test_clear_due_requests_keeps_a_future_fold() {
        let bottom = EventLink::named("bottom");
        let top = EventLink::named("top");
        let core = layered(&bottom, &top);

        core.capture_request(LinkClockRequest::new(3.0));
        core.clear_due_requests(1.0);

        let next = core.next_clock_request();
        assert_eq!(next.map(|request| request.requested_time()), Some(3.0));
    }
}
