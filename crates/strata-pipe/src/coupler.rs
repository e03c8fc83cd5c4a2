//! Couples two pipelines bottom-to-bottom, standing in for a wire.
//!
//! Whatever leaves one pipeline's bottom boundary is fed into the other
//! pipeline's below face: written bytes become reads, sent events become
//! receives. Both directions are installed as bottom-boundary output
//! dispositions at construction, so traffic crosses as soon as a
//! pipeline's own discipline brings it to the bottom. Manual pipelines
//! additionally get their bottom queues pulled across on every
//! [`update_clock`](PipelineBottomCoupler::update_clock) tick, which
//! also drains traffic that was queued before the coupling existed.

use std::rc::Rc;

use tracing::{debug, trace};

use strata_link::{EventHook, LinkClockRequest, LinkEvent, StreamHook};

use crate::pipeline::{AutomaticPipeline, ManualPipeline};

/// One side of a coupling: either pipeline kind.
#[derive(Clone, Debug)]
pub enum PipelineEnd {
    /// A pull-based pipeline, drained by the coupler on clock ticks.
    Manual(ManualPipeline),
    /// A hook-driven pipeline, crossing through dispositions alone.
    Automatic(AutomaticPipeline),
}

impl PipelineEnd {
    fn is_manual(&self) -> bool {
        matches!(self, PipelineEnd::Manual(_))
    }

    /// Feed an event into the pipeline's below face.
    pub fn to_receive(&self, event: LinkEvent) -> bool {
        match self {
            PipelineEnd::Manual(pipeline) => pipeline.to_receive(event),
            PipelineEnd::Automatic(pipeline) => pipeline.to_receive(event),
        }
    }

    /// Feed bytes into the pipeline's below face.
    pub fn to_read(&self, buffer: &[u8]) -> bool {
        match self {
            PipelineEnd::Manual(pipeline) => pipeline.to_read(buffer),
            PipelineEnd::Automatic(pipeline) => pipeline.to_read(buffer),
        }
    }

    /// Take every downward event queued at the pipeline's bottom.
    pub fn to_send_all(&self) -> Vec<LinkEvent> {
        match self {
            PipelineEnd::Manual(pipeline) => pipeline.to_send_all(),
            PipelineEnd::Automatic(pipeline) => pipeline.to_send_all(),
        }
    }

    /// Take all downward bytes queued at the pipeline's bottom.
    pub fn to_write(&self) -> Option<Vec<u8>> {
        match self {
            PipelineEnd::Manual(pipeline) => pipeline.to_write(),
            PipelineEnd::Automatic(pipeline) => pipeline.to_write(),
        }
    }

    /// Deliver a clock update throughout the pipeline.
    pub fn update_clock(&self, time: f64) -> Option<LinkClockRequest> {
        match self {
            PipelineEnd::Manual(pipeline) => pipeline.update_clock(time),
            PipelineEnd::Automatic(pipeline) => pipeline.update_clock(time),
        }
    }

    /// The earliest wake-up the pipeline currently needs, if any.
    pub fn next_clock_request(&self) -> Option<LinkClockRequest> {
        match self {
            PipelineEnd::Manual(pipeline) => pipeline.next_clock_request(),
            PipelineEnd::Automatic(pipeline) => pipeline.next_clock_request(),
        }
    }

    fn install_bottom_dispositions(&self, peer: &PipelineEnd) {
        let into_events = peer.clone();
        let send_hook: EventHook = Rc::new(move |event| {
            into_events.to_receive(event);
        });
        let into_bytes = peer.clone();
        let write_hook: StreamHook = Rc::new(move |buffer| {
            into_bytes.to_read(&buffer);
        });
        match self {
            PipelineEnd::Manual(pipeline) => {
                pipeline.set_after_send(send_hook);
                pipeline.set_after_write(write_hook);
            }
            PipelineEnd::Automatic(pipeline) => {
                pipeline.set_after_send(send_hook);
                pipeline.set_after_write(write_hook);
            }
        }
    }
}

impl From<ManualPipeline> for PipelineEnd {
    fn from(pipeline: ManualPipeline) -> Self {
        PipelineEnd::Manual(pipeline)
    }
}

impl From<AutomaticPipeline> for PipelineEnd {
    fn from(pipeline: AutomaticPipeline) -> Self {
        PipelineEnd::Automatic(pipeline)
    }
}

/// Joins two pipelines at their bottom boundaries.
///
/// The coupler itself is a plain value; hook closures capture pipeline
/// clones, so dropping the coupler leaves an already-coupled pair
/// coupled.
pub struct PipelineBottomCoupler {
    one: PipelineEnd,
    two: PipelineEnd,
}

impl PipelineBottomCoupler {
    /// Couple two pipelines, installing each one's bottom output
    /// dispositions to feed the other.
    pub fn new(one: impl Into<PipelineEnd>, two: impl Into<PipelineEnd>) -> Self {
        let one = one.into();
        let two = two.into();
        one.install_bottom_dispositions(&two);
        two.install_bottom_dispositions(&one);
        debug!(?one, ?two, "coupled pipeline bottoms");
        Self { one, two }
    }

    /// The first coupled pipeline.
    pub fn pipeline_one(&self) -> &PipelineEnd {
        &self.one
    }

    /// The second coupled pipeline.
    pub fn pipeline_two(&self) -> &PipelineEnd {
        &self.two
    }

    /// Deliver a clock update to both pipelines, pull any queued bottom
    /// traffic across the manual sides, and return the earliest wake-up
    /// either side still needs.
    pub fn update_clock(&self, time: f64) -> Option<LinkClockRequest> {
        trace!(time, "updating coupled pipelines");
        self.one.update_clock(time);
        self.two.update_clock(time);
        pull_across(&self.one, &self.two);
        pull_across(&self.two, &self.one);
        LinkClockRequest::earliest(
            self.one.next_clock_request(),
            self.two.next_clock_request(),
        )
    }
}

/// Drain a manual pipeline's bottom queues into the peer. Hook-driven
/// pipelines cross through their dispositions and have nothing queued.
fn pull_across(from: &PipelineEnd, into: &PipelineEnd) {
    if !from.is_manual() {
        return;
    }
    if let Some(buffer) = from.to_write() {
        into.to_read(&buffer);
    }
    for event in from.to_send_all() {
        into.to_receive(event);
    }
}

impl std::fmt::Debug for PipelineBottomCoupler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PipelineBottomCoupler({:?} <-> {:?})", self.one, self.two)
    }
}
