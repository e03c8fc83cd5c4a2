//! Cooperative processors: the unit of protocol logic.
//!
//! A processor owns one input queue, one output queue, and a driving
//! [routine](EventRoutine) that moves items from one to the other. Routines
//! are explicit state machines: each call to `step` runs one
//! suspension-to-suspension segment of the protocol logic and reports how it
//! suspended via [`Step`]. The processor drives the routine synchronously
//! whenever it is fed, so by the time a feeding call returns, everything
//! that could be processed has been.
//!
//! ## Flow control
//!
//! Inside a step, a routine consumes input with [`EventIo::receive`] (or the
//! stream reads) and emits output with [`EventIo::send`] / [`StreamIo::write`],
//! neither of which ever blocks. Blocking is expressed by the step's return
//! value instead:
//!
//! - [`Step::Wait`]: suspend until new input is fed;
//! - [`Step::Proceed`]: yield to the driver but run again in the same
//!   drain, with or without new input;
//! - [`Step::Done`]: the routine finished. Link routines are expected to
//!   loop forever, so finishing is a protocol violation: during priming it
//!   panics, afterwards it halts the processor.
//!
//! ```
//! use strata_link::processor::{EventIo, EventProcessor, EventRoutine, Step};
//!
//! struct Incrementer;
//!
//! impl EventRoutine<i64, i64> for Incrementer {
//!     fn step(&mut self, io: &mut EventIo<'_, i64, i64>) -> Step {
//!         match io.receive() {
//!             Some(n) => {
//!                 io.send(n + 1);
//!                 Step::Proceed
//!             }
//!             None => Step::Wait,
//!         }
//!     }
//! }
//!
//! let mut processor = EventProcessor::new(Box::new(Incrementer));
//! processor.feed(1);
//! assert_eq!(processor.take_output(), Some(2));
//! ```

use std::collections::VecDeque;

use tracing::error;

/// How a routine suspended at the end of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Suspend until the processor is fed again.
    Wait,
    /// Yield to the driver, but run again within the current drain.
    Proceed,
    /// The routine finished. Link routines must not finish.
    Done,
}

/// Queue access handed to an event routine for one step.
pub struct EventIo<'a, I, O> {
    input: &'a mut VecDeque<I>,
    output: &'a mut VecDeque<O>,
}

impl<I, O> EventIo<'_, I, O> {
    /// Take the next input item, if one is queued. A routine that needs an
    /// item and gets `None` should return [`Step::Wait`].
    pub fn receive(&mut self) -> Option<I> {
        self.input.pop_front()
    }

    /// Whether any input is queued.
    pub fn has_input(&self) -> bool {
        !self.input.is_empty()
    }

    /// Emit an output item. Never blocks.
    pub fn send(&mut self, item: O) {
        self.output.push_back(item);
    }
}

/// A driving routine for an [`EventProcessor`].
///
/// Implementations hold whatever state must survive across suspensions;
/// `step` runs the routine from one suspension point to the next.
pub trait EventRoutine<I, O> {
    /// Run one suspension-to-suspension segment.
    fn step(&mut self, io: &mut EventIo<'_, I, O>) -> Step;
}

/// A processor over discrete items: FIFO input queue in, FIFO output queue
/// out, with the routine run to quiescence on every feed.
pub struct EventProcessor<I, O> {
    routine: Box<dyn EventRoutine<I, O>>,
    input: VecDeque<I>,
    output: VecDeque<O>,
    runnable: bool,
    halted: bool,
}

impl<I, O> EventProcessor<I, O> {
    /// Create a processor and prime its routine with one step against empty
    /// queues, so a routine that misuses the suspension protocol fails now
    /// rather than when data is flowing.
    ///
    /// # Panics
    ///
    /// Panics if the routine finishes ([`Step::Done`]) during priming.
    pub fn new(routine: Box<dyn EventRoutine<I, O>>) -> Self {
        let mut processor = Self {
            routine,
            input: VecDeque::new(),
            output: VecDeque::new(),
            runnable: true,
            halted: false,
        };
        match processor.step_once() {
            Some(Step::Done) => {
                panic!("driving routine completed during priming; routines must loop")
            }
            _ => processor,
        }
    }

    /// Queue an item without driving the routine.
    pub fn push(&mut self, item: I) {
        self.input.push_back(item);
        self.runnable = true;
    }

    /// Queue an item and drive the routine to quiescence.
    pub fn feed(&mut self, item: I) {
        self.push(item);
        self.run();
    }

    /// Run one routine step if the routine is runnable. Returns `None` when
    /// the routine is waiting for input or has halted.
    pub fn step_once(&mut self) -> Option<Step> {
        if !self.runnable || self.halted {
            return None;
        }
        let mut io = EventIo {
            input: &mut self.input,
            output: &mut self.output,
        };
        let step = self.routine.step(&mut io);
        match step {
            Step::Wait => self.runnable = false,
            Step::Proceed => self.runnable = true,
            Step::Done => {
                self.halted = true;
                error!("processor routine completed; halting (routines must loop)");
            }
        }
        Some(step)
    }

    /// Drive the routine until it waits or halts.
    pub fn run(&mut self) {
        while let Some(step) = self.step_once() {
            if step != Step::Proceed {
                break;
            }
        }
    }

    /// Push an item straight to the output queue, bypassing the routine.
    pub fn inject(&mut self, item: O) {
        self.output.push_back(item);
    }

    /// Whether any output is ready.
    pub fn has_output(&self) -> bool {
        !self.output.is_empty()
    }

    /// Take the next output item, if any.
    pub fn take_output(&mut self) -> Option<O> {
        self.output.pop_front()
    }

    /// Take everything currently in the output queue.
    pub fn take_all_output(&mut self) -> Vec<O> {
        self.output.drain(..).collect()
    }

    /// Whether the routine finished and the processor stopped driving it.
    pub fn halted(&self) -> bool {
        self.halted
    }
}

/// Buffer access handed to a stream routine for one step.
///
/// Stream input is a contiguous byte buffer rather than an item queue;
/// reads consume from the front and never return an empty buffer.
pub struct StreamIo<'a> {
    input: &'a mut Vec<u8>,
    output: &'a mut VecDeque<Vec<u8>>,
}

impl StreamIo<'_> {
    /// Whether at least `count` bytes are buffered.
    pub fn can_read(&self, count: usize) -> bool {
        self.input.len() >= count
    }

    /// Consume up to `max` buffered bytes (all of them when `max` is
    /// `None`). Returns `None` instead of an empty buffer when nothing is
    /// buffered; a routine that gets `None` should return [`Step::Wait`].
    pub fn read(&mut self, max: Option<usize>) -> Option<Vec<u8>> {
        if self.input.is_empty() {
            return None;
        }
        let take = match max {
            Some(max) => max.min(self.input.len()),
            None => self.input.len(),
        };
        if take == 0 {
            return None;
        }
        Some(self.input.drain(..take).collect())
    }

    /// Accumulate bytes into `partial` until `separator` appears, then
    /// return everything before the separator and discard the separator
    /// itself. Bytes after the separator stay in `partial` for the next
    /// call. Returns `None` until a full separator has arrived.
    pub fn read_until(&mut self, separator: &[u8], partial: &mut Vec<u8>) -> Option<Vec<u8>> {
        if let Some(at) = find(partial, separator, 0) {
            return Some(split_chunk(partial, at, separator.len()));
        }
        if self.input.is_empty() {
            return None;
        }
        // Resume the search where a partial separator suffix could start.
        let resume_at = partial
            .len()
            .saturating_sub(separator.len().saturating_sub(1));
        partial.append(self.input);
        find(partial, separator, resume_at).map(|at| split_chunk(partial, at, separator.len()))
    }

    /// Emit a buffer. Never blocks.
    pub fn write(&mut self, buffer: Vec<u8>) {
        self.output.push_back(buffer);
    }
}

/// First occurrence of `needle` in `haystack` at or after `from`.
fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack[from.min(haystack.len())..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|at| at + from.min(haystack.len()))
}

/// Remove and return `partial[..at]`, also discarding the separator after it.
fn split_chunk(partial: &mut Vec<u8>, at: usize, separator_len: usize) -> Vec<u8> {
    let chunk = partial[..at].to_vec();
    partial.drain(..at + separator_len);
    chunk
}

/// A driving routine for a [`StreamProcessor`].
pub trait StreamRoutine {
    /// Run one suspension-to-suspension segment.
    fn step(&mut self, io: &mut StreamIo<'_>) -> Step;
}

/// A processor over a byte stream: contiguous input buffer in, emitted
/// buffers out. Emissions are kept as separate buffers so downstream
/// dispositions can see write boundaries; readers that do not care simply
/// concatenate.
pub struct StreamProcessor {
    routine: Box<dyn StreamRoutine>,
    input: Vec<u8>,
    output: VecDeque<Vec<u8>>,
    runnable: bool,
    halted: bool,
}

impl StreamProcessor {
    /// Create a processor and prime its routine with one step against an
    /// empty buffer.
    ///
    /// # Panics
    ///
    /// Panics if the routine finishes ([`Step::Done`]) during priming.
    pub fn new(routine: Box<dyn StreamRoutine>) -> Self {
        let mut processor = Self {
            routine,
            input: Vec::new(),
            output: VecDeque::new(),
            runnable: true,
            halted: false,
        };
        match processor.step_once() {
            Some(Step::Done) => {
                panic!("driving routine completed during priming; routines must loop")
            }
            _ => processor,
        }
    }

    /// Append bytes without driving the routine.
    pub fn push(&mut self, buffer: &[u8]) {
        self.input.extend_from_slice(buffer);
        self.runnable = true;
    }

    /// Append bytes and drive the routine to quiescence.
    pub fn feed(&mut self, buffer: &[u8]) {
        self.push(buffer);
        self.run();
    }

    /// Run one routine step if the routine is runnable. Returns `None` when
    /// the routine is waiting for input or has halted.
    pub fn step_once(&mut self) -> Option<Step> {
        if !self.runnable || self.halted {
            return None;
        }
        let mut io = StreamIo {
            input: &mut self.input,
            output: &mut self.output,
        };
        let step = self.routine.step(&mut io);
        match step {
            Step::Wait => self.runnable = false,
            Step::Proceed => self.runnable = true,
            Step::Done => {
                self.halted = true;
                error!("processor routine completed; halting (routines must loop)");
            }
        }
        Some(step)
    }

    /// Drive the routine until it waits or halts.
    pub fn run(&mut self) {
        while let Some(step) = self.step_once() {
            if step != Step::Proceed {
                break;
            }
        }
    }

    /// Push a buffer straight to the output queue, bypassing the routine.
    pub fn inject(&mut self, buffer: Vec<u8>) {
        self.output.push_back(buffer);
    }

    /// Whether any output is ready.
    pub fn has_output(&self) -> bool {
        self.output.iter().any(|buffer| !buffer.is_empty())
    }

    /// Take the next emitted buffer, if any.
    pub fn take_output(&mut self) -> Option<Vec<u8>> {
        self.output.pop_front()
    }

    /// Take all emitted buffers.
    pub fn take_all_output(&mut self) -> Vec<Vec<u8>> {
        self.output.drain(..).collect()
    }

    /// Take all emitted buffers concatenated into one, or `None` when
    /// nothing (or only empty buffers) was emitted.
    pub fn take_output_concat(&mut self) -> Option<Vec<u8>> {
        let mut all = Vec::new();
        for buffer in self.output.drain(..) {
            all.extend_from_slice(&buffer);
        }
        if all.is_empty() {
            None
        } else {
            Some(all)
        }
    }

    /// Whether the routine finished and the processor stopped driving it.
    pub fn halted(&self) -> bool {
        self.halted
    }
}

// === Tests ===
