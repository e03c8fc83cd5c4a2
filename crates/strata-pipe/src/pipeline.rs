//! Pipelines: a stack of layers joined by pairwise pipes.
//!
//! A pipeline takes an ordered list of [`Layer`]s, bottom first, and
//! stands a pipe in every gap, so layer `i` is the top of pipe `i - 1`
//! and the bottom of pipe `i`. The pipeline's own boundary surface is the
//! below face of the lowest pipe and the above face of the highest one; a
//! single-layer pipeline wraps its layer in a solo pipe that serves both.
//!
//! The two pipeline kinds mirror the two pipe disciplines. A
//! [`ManualPipeline`] moves traffic on [`sync`](ManualPipeline::sync),
//! sweeping upward through the pipes in order and then downward in
//! reverse, so one call carries traffic end to end. An
//! [`AutomaticPipeline`] moves traffic from hooks and only needs explicit
//! calls for clock updates, which it runs as a send phase up the stack
//! and a receive phase back down.

use std::cell::Cell;
use std::rc::Rc;

use tracing::{debug, trace};

use strata_link::{EventHook, LinkClockRequest, LinkEvent, StreamHook};

use crate::automatic::AutomaticPipe;
use crate::error::{Error, Result};
use crate::manual::ManualPipe;
use crate::pipe::{Composite, Layer, PipeMember};

struct PipelineInner<P> {
    // Both vecs are non-empty, checked at construction.
    layers: Vec<Layer>,
    pipes: Vec<P>,
    clocked: Vec<P>,
    name: Option<String>,
    last_clock_update: Cell<Option<f64>>,
}

fn build_pipes<P: Clone>(
    layers: &[Layer],
    layered: impl Fn(Layer, Layer) -> P,
    solo: impl Fn(Layer) -> P,
) -> Result<Vec<P>> {
    match layers {
        [] => Err(Error::EmptyPipeline),
        [only] => Ok(vec![solo(only.clone())]),
        _ => Ok(layers
            .windows(2)
            .map(|pair| layered(pair[0].clone(), pair[1].clone()))
            .collect()),
    }
}

fn describe_layers(layers: &[Layer]) -> String {
    layers
        .iter()
        .map(|layer| format!("{layer:?}"))
        .collect::<Vec<_>>()
        .join(" | ")
}

// === Manual pipelines ===

/// A stack of layers joined by [`ManualPipe`]s.
///
/// Cloning shares the pipeline; all methods take `&self` and may be
/// called re-entrantly from hooks.
#[derive(Clone)]
pub struct ManualPipeline {
    inner: Rc<PipelineInner<ManualPipe>>,
}

impl ManualPipeline {
    /// Stand manual pipes between the given layers, bottom first.
    pub fn new(layers: Vec<Layer>) -> Result<Self> {
        Self::build(layers, None)
    }

    /// Like [`new`](Self::new), with a name for diagnostics.
    pub fn named(name: impl Into<String>, layers: Vec<Layer>) -> Result<Self> {
        Self::build(layers, Some(name.into()))
    }

    fn build(layers: Vec<Layer>, name: Option<String>) -> Result<Self> {
        let pipes = build_pipes(
            &layers,
            |bottom, top| ManualPipe::new(bottom, top),
            ManualPipe::solo,
        )?;
        let clocked = pipes.iter().filter(|pipe| pipe.is_clocked()).cloned().collect();
        let pipeline = Self {
            inner: Rc::new(PipelineInner {
                layers,
                pipes,
                clocked,
                name,
                last_clock_update: Cell::new(None),
            }),
        };
        debug!(pipeline = %pipeline.describe(), "built manual pipeline");
        Ok(pipeline)
    }

    fn below_pipe(&self) -> &ManualPipe {
        &self.inner.pipes[0]
    }

    fn above_pipe(&self) -> &ManualPipe {
        &self.inner.pipes[self.inner.pipes.len() - 1]
    }

    /// The pipeline's name, if one was given.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// The lowest layer.
    pub fn bottom(&self) -> &Layer {
        &self.inner.layers[0]
    }

    /// The highest layer.
    pub fn top(&self) -> &Layer {
        &self.inner.layers[self.inner.layers.len() - 1]
    }

    // === Syncing ===

    /// Carry traffic end to end: upward through the pipes in order, then
    /// downward in reverse. Returns the earliest wake-up still pending.
    pub fn sync(&self) -> Option<LinkClockRequest> {
        for pipe in &self.inner.pipes {
            pipe.sync_up();
        }
        for pipe in self.inner.pipes.iter().rev() {
            pipe.sync_down();
        }
        self.next_clock_request()
    }

    // === Clocking ===

    /// Deliver a clock update to every pipe, then sync. Returns the
    /// earliest wake-up still pending afterwards.
    pub fn update_clock(&self, time: f64) -> Option<LinkClockRequest> {
        trace!(time, name = self.inner.name.as_deref(), "updating manual pipeline clock");
        self.inner.last_clock_update.set(Some(time));
        for pipe in &self.inner.pipes {
            pipe.update_clock(time);
        }
        self.sync()
    }

    /// The earliest wake-up needed anywhere in the pipeline, if any.
    pub fn next_clock_request(&self) -> Option<LinkClockRequest> {
        let mut next = None;
        for pipe in &self.inner.clocked {
            next = LinkClockRequest::earliest(next, pipe.next_clock_request());
        }
        next
    }

    /// Whether any pipe observes clock updates.
    pub fn is_clocked(&self) -> bool {
        !self.inner.clocked.is_empty()
    }

    /// Time of the most recent clock update, if one has been delivered.
    pub fn last_clock_update(&self) -> Option<f64> {
        self.inner.last_clock_update.get()
    }

    // === Boundary surface ===

    /// Feed an event into the bottom layer's below face.
    pub fn to_receive(&self, event: impl Into<LinkEvent>) -> bool {
        self.below_pipe().to_receive(event.into())
    }

    /// Wrap a raw payload and feed it into the below face.
    pub fn to_receive_data(&self, data: Vec<u8>) -> bool {
        self.to_receive(LinkEvent::from(data))
    }

    /// Feed an event into the top layer's above face.
    pub fn send(&self, event: impl Into<LinkEvent>) -> bool {
        self.above_pipe().send(event.into())
    }

    /// Wrap a raw payload and feed it into the above face.
    pub fn send_data(&self, data: Vec<u8>) -> bool {
        self.send(LinkEvent::from(data))
    }

    /// Take the next upward event from the top layer.
    pub fn receive(&self) -> Option<LinkEvent> {
        self.above_pipe().receive()
    }

    /// Take every upward event the top layer has ready.
    pub fn receive_all(&self) -> Vec<LinkEvent> {
        self.above_pipe().receive_all()
    }

    /// Whether the top layer has an upward event ready.
    pub fn has_receive(&self) -> bool {
        self.above_pipe().has_receive()
    }

    /// Take the next downward event from the bottom layer.
    pub fn to_send(&self) -> Option<LinkEvent> {
        self.below_pipe().to_send()
    }

    /// Take every downward event the bottom layer has ready.
    pub fn to_send_all(&self) -> Vec<LinkEvent> {
        self.below_pipe().to_send_all()
    }

    /// Whether the bottom layer has a downward event ready.
    pub fn has_to_send(&self) -> bool {
        self.below_pipe().has_to_send()
    }

    /// Feed bytes into the bottom layer's below face.
    pub fn to_read(&self, buffer: &[u8]) -> bool {
        self.below_pipe().to_read(buffer)
    }

    /// Feed bytes into the top layer's above face.
    pub fn write(&self, buffer: &[u8]) -> bool {
        self.above_pipe().write(buffer)
    }

    /// Take all upward bytes the top layer has ready, concatenated.
    pub fn read(&self) -> Option<Vec<u8>> {
        self.above_pipe().read()
    }

    /// Take all downward bytes the bottom layer has ready, concatenated.
    pub fn to_write(&self) -> Option<Vec<u8>> {
        self.below_pipe().to_write()
    }

    /// Replace the upward event disposition at the top boundary.
    pub fn set_after_receive(&self, hook: EventHook) -> bool {
        self.above_pipe().set_after_receive(hook)
    }

    /// Replace the downward event disposition at the bottom boundary.
    pub fn set_after_send(&self, hook: EventHook) -> bool {
        self.below_pipe().set_after_send(hook)
    }

    /// Replace the upward stream disposition at the top boundary.
    pub fn set_after_read(&self, hook: StreamHook) -> bool {
        self.above_pipe().set_after_read(hook)
    }

    /// Replace the downward stream disposition at the bottom boundary.
    pub fn set_after_write(&self, hook: StreamHook) -> bool {
        self.below_pipe().set_after_write(hook)
    }
}

impl Composite for ManualPipeline {
    fn describe(&self) -> String {
        match &self.inner.name {
            Some(name) => name.clone(),
            None => format!("[{}]", describe_layers(&self.inner.layers)),
        }
    }

    fn to_receive(&self, event: LinkEvent) -> bool {
        ManualPipeline::to_receive(self, event)
    }

    fn send(&self, event: LinkEvent) -> bool {
        ManualPipeline::send(self, event)
    }

    fn receive(&self) -> Option<LinkEvent> {
        ManualPipeline::receive(self)
    }

    fn has_receive(&self) -> bool {
        ManualPipeline::has_receive(self)
    }

    fn to_send(&self) -> Option<LinkEvent> {
        ManualPipeline::to_send(self)
    }

    fn has_to_send(&self) -> bool {
        ManualPipeline::has_to_send(self)
    }

    fn to_read(&self, buffer: &[u8]) -> bool {
        ManualPipeline::to_read(self, buffer)
    }

    fn write(&self, buffer: &[u8]) -> bool {
        ManualPipeline::write(self, buffer)
    }

    fn read(&self) -> Option<Vec<u8>> {
        ManualPipeline::read(self)
    }

    fn to_write(&self) -> Option<Vec<u8>> {
        ManualPipeline::to_write(self)
    }

    fn set_after_receive(&self, hook: EventHook) -> bool {
        ManualPipeline::set_after_receive(self, hook)
    }

    fn set_after_send(&self, hook: EventHook) -> bool {
        ManualPipeline::set_after_send(self, hook)
    }

    fn set_after_read(&self, hook: StreamHook) -> bool {
        ManualPipeline::set_after_read(self, hook)
    }

    fn set_after_write(&self, hook: StreamHook) -> bool {
        ManualPipeline::set_after_write(self, hook)
    }

    fn is_clocked(&self) -> bool {
        ManualPipeline::is_clocked(self)
    }

    fn update_clock(&self, time: f64) -> Option<LinkClockRequest> {
        ManualPipeline::update_clock(self, time)
    }

    fn next_clock_request(&self) -> Option<LinkClockRequest> {
        ManualPipeline::next_clock_request(self)
    }

    fn sync(&self) -> Option<LinkClockRequest> {
        ManualPipeline::sync(self)
    }
}

impl From<ManualPipeline> for PipeMember {
    fn from(pipeline: ManualPipeline) -> Self {
        PipeMember::Composite(Rc::new(pipeline))
    }
}

impl From<ManualPipeline> for Layer {
    fn from(pipeline: ManualPipeline) -> Self {
        Layer::from(PipeMember::from(pipeline))
    }
}

impl std::fmt::Debug for ManualPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ManualPipeline({})", self.describe())
    }
}

// === Automatic pipelines ===

/// A stack of layers joined by [`AutomaticPipe`]s.
///
/// Cloning shares the pipeline; all methods take `&self` and may be
/// called re-entrantly from hooks.
#[derive(Clone)]
pub struct AutomaticPipeline {
    inner: Rc<PipelineInner<AutomaticPipe>>,
}

impl AutomaticPipeline {
    /// Stand automatic pipes between the given layers, bottom first.
    pub fn new(layers: Vec<Layer>) -> Result<Self> {
        Self::build(layers, None)
    }

    /// Like [`new`](Self::new), with a name for diagnostics.
    pub fn named(name: impl Into<String>, layers: Vec<Layer>) -> Result<Self> {
        Self::build(layers, Some(name.into()))
    }

    fn build(layers: Vec<Layer>, name: Option<String>) -> Result<Self> {
        let pipes = build_pipes(
            &layers,
            |bottom, top| AutomaticPipe::new(bottom, top),
            AutomaticPipe::solo,
        )?;
        let clocked = pipes.iter().filter(|pipe| pipe.is_clocked()).cloned().collect();
        let pipeline = Self {
            inner: Rc::new(PipelineInner {
                layers,
                pipes,
                clocked,
                name,
                last_clock_update: Cell::new(None),
            }),
        };
        debug!(pipeline = %pipeline.describe(), "built automatic pipeline");
        Ok(pipeline)
    }

    fn below_pipe(&self) -> &AutomaticPipe {
        &self.inner.pipes[0]
    }

    fn above_pipe(&self) -> &AutomaticPipe {
        &self.inner.pipes[self.inner.pipes.len() - 1]
    }

    /// The pipeline's name, if one was given.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// The lowest layer.
    pub fn bottom(&self) -> &Layer {
        &self.inner.layers[0]
    }

    /// The highest layer.
    pub fn top(&self) -> &Layer {
        &self.inner.layers[self.inner.layers.len() - 1]
    }

    // === Clocking ===

    /// Deliver a phased clock update: the send phase sweeps the clocked
    /// pipes bottom-up, the receive phase sweeps them back top-down.
    /// Returns the earliest wake-up still pending afterwards.
    pub fn update_clock(&self, time: f64) -> Option<LinkClockRequest> {
        trace!(time, name = self.inner.name.as_deref(), "updating automatic pipeline clock");
        self.inner.last_clock_update.set(Some(time));
        for pipe in &self.inner.clocked {
            pipe.update_clock_send(time);
        }
        for pipe in self.inner.clocked.iter().rev() {
            pipe.update_clock_receive(time);
        }
        self.next_clock_request()
    }

    /// The earliest wake-up needed anywhere in the pipeline, if any.
    pub fn next_clock_request(&self) -> Option<LinkClockRequest> {
        let mut next = None;
        for pipe in &self.inner.clocked {
            next = LinkClockRequest::earliest(next, pipe.next_clock_request());
        }
        next
    }

    /// Whether any pipe observes clock updates.
    pub fn is_clocked(&self) -> bool {
        !self.inner.clocked.is_empty()
    }

    /// Time of the most recent clock update, if one has been delivered.
    pub fn last_clock_update(&self) -> Option<f64> {
        self.inner.last_clock_update.get()
    }

    // === Boundary surface ===

    /// Feed an event into the bottom layer's below face.
    pub fn to_receive(&self, event: impl Into<LinkEvent>) -> bool {
        self.below_pipe().to_receive(event.into())
    }

    /// Wrap a raw payload and feed it into the below face.
    pub fn to_receive_data(&self, data: Vec<u8>) -> bool {
        self.to_receive(LinkEvent::from(data))
    }

    /// Feed an event into the top layer's above face.
    pub fn send(&self, event: impl Into<LinkEvent>) -> bool {
        self.above_pipe().send(event.into())
    }

    /// Wrap a raw payload and feed it into the above face.
    pub fn send_data(&self, data: Vec<u8>) -> bool {
        self.send(LinkEvent::from(data))
    }

    /// Take the next upward event from the top layer.
    pub fn receive(&self) -> Option<LinkEvent> {
        self.above_pipe().receive()
    }

    /// Take every upward event the top layer has ready.
    pub fn receive_all(&self) -> Vec<LinkEvent> {
        self.above_pipe().receive_all()
    }

    /// Whether the top layer has an upward event ready.
    pub fn has_receive(&self) -> bool {
        self.above_pipe().has_receive()
    }

    /// Take the next downward event from the bottom layer.
    pub fn to_send(&self) -> Option<LinkEvent> {
        self.below_pipe().to_send()
    }

    /// Take every downward event the bottom layer has ready.
    pub fn to_send_all(&self) -> Vec<LinkEvent> {
        self.below_pipe().to_send_all()
    }

    /// Whether the bottom layer has a downward event ready.
    pub fn has_to_send(&self) -> bool {
        self.below_pipe().has_to_send()
    }

    /// Feed bytes into the bottom layer's below face.
    pub fn to_read(&self, buffer: &[u8]) -> bool {
        self.below_pipe().to_read(buffer)
    }

    /// Feed bytes into the top layer's above face.
    pub fn write(&self, buffer: &[u8]) -> bool {
        self.above_pipe().write(buffer)
    }

    /// Take all upward bytes the top layer has ready, concatenated.
    pub fn read(&self) -> Option<Vec<u8>> {
        self.above_pipe().read()
    }

    /// Take all downward bytes the bottom layer has ready, concatenated.
    pub fn to_write(&self) -> Option<Vec<u8>> {
        self.below_pipe().to_write()
    }

    /// Replace the upward event disposition at the top boundary.
    pub fn set_after_receive(&self, hook: EventHook) -> bool {
        self.above_pipe().set_after_receive(hook)
    }

    /// Replace the downward event disposition at the bottom boundary.
    pub fn set_after_send(&self, hook: EventHook) -> bool {
        self.below_pipe().set_after_send(hook)
    }

    /// Replace the upward stream disposition at the top boundary.
    pub fn set_after_read(&self, hook: StreamHook) -> bool {
        self.above_pipe().set_after_read(hook)
    }

    /// Replace the downward stream disposition at the bottom boundary.
    pub fn set_after_write(&self, hook: StreamHook) -> bool {
        self.below_pipe().set_after_write(hook)
    }
}

impl Composite for AutomaticPipeline {
    fn describe(&self) -> String {
        match &self.inner.name {
            Some(name) => name.clone(),
            None => format!("[{}]", describe_layers(&self.inner.layers)),
        }
    }

    fn to_receive(&self, event: LinkEvent) -> bool {
        AutomaticPipeline::to_receive(self, event)
    }

    fn send(&self, event: LinkEvent) -> bool {
        AutomaticPipeline::send(self, event)
    }

    fn receive(&self) -> Option<LinkEvent> {
        AutomaticPipeline::receive(self)
    }

    fn has_receive(&self) -> bool {
        AutomaticPipeline::has_receive(self)
    }

    fn to_send(&self) -> Option<LinkEvent> {
        AutomaticPipeline::to_send(self)
    }

    fn has_to_send(&self) -> bool {
        AutomaticPipeline::has_to_send(self)
    }

    fn to_read(&self, buffer: &[u8]) -> bool {
        AutomaticPipeline::to_read(self, buffer)
    }

    fn write(&self, buffer: &[u8]) -> bool {
        AutomaticPipeline::write(self, buffer)
    }

    fn read(&self) -> Option<Vec<u8>> {
        AutomaticPipeline::read(self)
    }

    fn to_write(&self) -> Option<Vec<u8>> {
        AutomaticPipeline::to_write(self)
    }

    fn set_after_receive(&self, hook: EventHook) -> bool {
        AutomaticPipeline::set_after_receive(self, hook)
    }

    fn set_after_send(&self, hook: EventHook) -> bool {
        AutomaticPipeline::set_after_send(self, hook)
    }

    fn set_after_read(&self, hook: StreamHook) -> bool {
        AutomaticPipeline::set_after_read(self, hook)
    }

    fn set_after_write(&self, hook: StreamHook) -> bool {
        AutomaticPipeline::set_after_write(self, hook)
    }

    fn is_clocked(&self) -> bool {
        AutomaticPipeline::is_clocked(self)
    }

    fn update_clock(&self, time: f64) -> Option<LinkClockRequest> {
        AutomaticPipeline::update_clock(self, time)
    }

    fn next_clock_request(&self) -> Option<LinkClockRequest> {
        AutomaticPipeline::next_clock_request(self)
    }
}

impl From<AutomaticPipeline> for PipeMember {
    fn from(pipeline: AutomaticPipeline) -> Self {
        PipeMember::Composite(Rc::new(pipeline))
    }
}

impl From<AutomaticPipeline> for Layer {
    fn from(pipeline: AutomaticPipeline) -> Self {
        Layer::from(PipeMember::from(pipeline))
    }
}

impl std::fmt::Debug for AutomaticPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AutomaticPipeline({})", self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use strata_link::{ChunkedStreamLink, DelayedEventLink, EventLink, LinkEvent, StreamLink};

    fn payload(event: LinkEvent) -> Option<Vec<u8>> {
        event.into_data().map(|data| data.into_data())
    }

    fn framed_stack() -> Vec<Layer> {
        let wire = StreamLink::named("wire");
        let framer = ChunkedStreamLink::new();
        let app = EventLink::named("app");
        vec![
            Layer::from(wire.handle()),
            Layer::from(framer.handle()),
            Layer::from(app.handle()),
        ]
    }

    #[test]
    fn test_empty_pipeline_is_rejected() {
        assert!(matches!(
            ManualPipeline::new(Vec::new()),
            Err(Error::EmptyPipeline)
        ));
        assert!(matches!(
            AutomaticPipeline::new(Vec::new()),
            Err(Error::EmptyPipeline)
        ));
    }

    #[test]
    fn test_single_layer_pipeline_serves_both_boundaries() -> Result<()> {
        let link = EventLink::named("only");
        let pipeline = ManualPipeline::new(vec![Layer::from(link.handle())])?;

        pipeline.to_receive_data(b"up".to_vec());
        assert_eq!(pipeline.receive().and_then(payload), Some(b"up".to_vec()));

        pipeline.send_data(b"down".to_vec());
        assert_eq!(pipeline.to_send().and_then(payload), Some(b"down".to_vec()));
        Ok(())
    }

    #[test]
    fn test_manual_pipeline_carries_traffic_end_to_end_in_one_sync() -> Result<()> {
        let pipeline = ManualPipeline::new(framed_stack())?;

        pipeline.to_read(b"\0inbound\0");
        pipeline.sync();
        assert_eq!(
            pipeline.receive().and_then(payload),
            Some(b"inbound".to_vec())
        );

        pipeline.send_data(b"outbound".to_vec());
        pipeline.sync();
        assert_eq!(pipeline.to_write(), Some(b"\0outbound\0".to_vec()));
        Ok(())
    }

    #[test]
    fn test_automatic_pipeline_carries_traffic_immediately() -> Result<()> {
        let pipeline = AutomaticPipeline::new(framed_stack())?;

        pipeline.to_read(b"\0inbound\0");
        assert_eq!(
            pipeline.receive().and_then(payload),
            Some(b"inbound".to_vec())
        );

        pipeline.send_data(b"outbound".to_vec());
        assert_eq!(pipeline.to_write(), Some(b"\0outbound\0".to_vec()));
        Ok(())
    }

    #[test]
    fn test_manual_pipeline_holds_delayed_traffic_until_update_clock() -> Result<()> {
        let bottom = EventLink::named("bottom");
        let delayed = DelayedEventLink::new();
        let app = EventLink::named("app");
        let pipeline = ManualPipeline::new(vec![
            Layer::from(bottom.handle()),
            Layer::from(delayed.handle()),
            Layer::from(app.handle()),
        ])?;

        pipeline.to_receive_data(b"held".to_vec());
        let pending = pipeline.sync();
        assert_eq!(pending.map(|request| request.requested_time()), Some(1.0));
        assert!(!pipeline.has_receive());

        let remaining = pipeline.update_clock(1.0);
        assert!(remaining.is_none());
        assert_eq!(pipeline.receive().and_then(payload), Some(b"held".to_vec()));
        Ok(())
    }

    #[test]
    fn test_automatic_pipeline_releases_delayed_traffic_on_update_clock() -> Result<()> {
        let bottom = EventLink::named("bottom");
        let delayed = DelayedEventLink::new();
        let app = EventLink::named("app");
        let pipeline = AutomaticPipeline::new(vec![
            Layer::from(bottom.handle()),
            Layer::from(delayed.handle()),
            Layer::from(app.handle()),
        ])?;

        pipeline.to_receive_data(b"held".to_vec());
        assert!(!pipeline.has_receive());
        let pending = pipeline.next_clock_request();
        assert_eq!(pending.map(|request| request.requested_time()), Some(1.0));

        pipeline.update_clock(1.0);
        assert_eq!(pipeline.receive().and_then(payload), Some(b"held".to_vec()));
        Ok(())
    }

    #[test]
    fn test_pipeline_nests_as_a_layer_of_another() -> Result<()> {
        let wire = StreamLink::named("wire");
        let framer = ChunkedStreamLink::new();
        let inner = ManualPipeline::named(
            "framing",
            vec![Layer::from(wire.handle()), Layer::from(framer.handle())],
        )?;
        let app = EventLink::named("app");
        let outer = ManualPipeline::new(vec![
            Layer::from(inner.clone()),
            Layer::from(app.handle()),
        ])?;

        outer.to_read(b"\0nested\0");
        outer.sync();
        assert_eq!(outer.receive().and_then(payload), Some(b"nested".to_vec()));

        outer.send_data(b"reply".to_vec());
        outer.sync();
        assert_eq!(outer.to_write(), Some(b"\0reply\0".to_vec()));
        Ok(())
    }

    #[test]
    fn test_pipeline_debug_shows_name_or_layers() -> Result<()> {
        let link = EventLink::named("only");
        let named = ManualPipeline::named("radio", vec![Layer::from(link.handle())])?;
        assert_eq!(format!("{named:?}"), "ManualPipeline(radio)");

        let link = EventLink::named("only");
        let anonymous = ManualPipeline::new(vec![Layer::from(link.handle())])?;
        assert_eq!(format!("{anonymous:?}"), "ManualPipeline([[only]])");
        Ok(())
    }
}
