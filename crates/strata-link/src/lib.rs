//! Sans-I/O building blocks for layered communication protocols.
//!
//! Nothing in this crate performs I/O or reads a wall clock. A protocol
//! stack built from these links is driven entirely from outside: the caller
//! feeds bytes or events into one side, collects what comes out the other,
//! and pushes the current time in whenever it has one. That makes the same
//! protocol logic runnable under threads, async executors, simulation, or
//! an embedded main loop, and makes every behavior reproducible in tests.
//!
//! The pieces, bottom up:
//!
//! - [`processor`]: cooperative routines with explicit suspension, the
//!   unit of protocol logic;
//! - [`event`]: the closed set of events links exchange (data, captured
//!   failures, clock updates, wake-up requests);
//! - [`timing`]: externally driven clocks and timeout timers;
//! - [`link`]: pairs of processors behind a shared boundary surface:
//!   plain event and stream links, the chunk-framing adapter, the delayed
//!   (clocked) link, and loopback endpoints.
//!
//! ```
//! use strata_link::ChunkedStreamLink;
//!
//! let link = ChunkedStreamLink::new();
//! link.to_read(b"\0hello\0wor");
//!
//! let event = link.receive().unwrap();
//! assert_eq!(event.as_data().unwrap().data(), b"hello");
//! // "wor" stays buffered until its separator arrives.
//! assert!(link.receive().is_none());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod event;
pub mod link;
pub mod processor;
pub mod timing;

pub use error::{Error, Result};
pub use event::{
    Context, ContextValue, Direction, EventId, LinkClockRequest, LinkClockTime, LinkData,
    LinkEvent, LinkException, Origin,
};
pub use link::chunked::{ChunkedStreamLink, ChunkedStreamLinkConfig};
pub use link::clocked::{ClockState, DelayedEventLink, DelayedEventLinkConfig};
pub use link::event::{EventLink, EventLinkConfig};
pub use link::loopback::{BottomLoopbackLink, TopLoopbackLink};
pub use link::stream::StreamLink;
pub use link::{Emission, EventHook, Link, LinkHandle, StreamHook};
pub use timing::{Clock, TimeoutTimer};
