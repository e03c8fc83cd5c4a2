//! Composition layers for [`strata_link`] stacks, without any I/O.
//!
//! A [`Layer`] groups links (or nested compositions) standing at one
//! level of a protocol stack. A pipe carries traffic across the gap
//! between two layers, in one of two disciplines: [`ManualPipe`] moves
//! traffic when synced, [`AutomaticPipe`] moves it from output-disposition
//! hooks the moment it appears. A pipeline ([`ManualPipeline`] /
//! [`AutomaticPipeline`]) stands pipes in every gap of a multi-layer
//! stack, and a [`PipelineBottomCoupler`] joins two pipelines bottom to
//! bottom in place of a wire.
//!
//! Everything here is single-threaded and push/pull driven; time only
//! advances when a clock update is delivered, and pending wake-ups
//! surface as [`LinkClockRequest`](strata_link::LinkClockRequest)s
//! folded to the earliest.
//!
//! ```
//! use strata_link::{ChunkedStreamLink, EventLink, StreamLink};
//! use strata_pipe::{AutomaticPipeline, Layer};
//!
//! # fn main() -> strata_pipe::Result<()> {
//! let wire = StreamLink::new();
//! let framer = ChunkedStreamLink::new();
//! let app = EventLink::new();
//! let stack = AutomaticPipeline::new(vec![
//!     Layer::from(wire.handle()),
//!     Layer::from(framer.handle()),
//!     Layer::from(app.handle()),
//! ])?;
//!
//! stack.to_read(b"\0hello\0");
//! let event = stack.receive().expect("frame delivered");
//! assert_eq!(event.as_data().map(|data| data.data()), Some(b"hello".as_ref()));
//!
//! stack.send_data(b"hi".to_vec());
//! assert_eq!(stack.to_write(), Some(b"\0hi\0".to_vec()));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod automatic;
pub mod coupler;
pub mod error;
pub mod manual;
pub mod pipe;
pub mod pipeline;

pub use automatic::AutomaticPipe;
pub use coupler::{PipelineBottomCoupler, PipelineEnd};
pub use error::{Error, Result};
pub use manual::ManualPipe;
pub use pipe::{Composite, Layer, PipeMember};
pub use pipeline::{AutomaticPipeline, ManualPipeline};
