//! Chunked stream links: discrete events over a continuous byte stream.
//!
//! A chunked stream link has an event face above and a stream face below,
//! bridged by a separator-delimited wire format:
//!
//! ```text
//!     [separator?] payload [separator]
//! ```
//!
//! Reading from below, bytes accumulate until a separator arrives; each
//! complete chunk surfaces above as a data event. Sending from above, each
//! payload is framed with a trailing separator (and a leading one when
//! configured) and queued below as bytes. Empty chunks are neither framed
//! nor surfaced, which is what makes a leading separator and back-to-back
//! separators on the wire harmless.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::warn;

use crate::error::{Error, Result};
use crate::event::{Direction, LinkData, LinkEvent, Origin};
use crate::processor::{
    EventIo, EventProcessor, EventRoutine, Step, StreamIo, StreamProcessor, StreamRoutine,
};

use super::event::RedirectRoutine;
use super::stream::RelayRoutine;
use super::{drain_buffers, drain_events, Emission, EventHook, Link, LinkHandle, StreamHook};

/// Configuration for a [`ChunkedStreamLink`].
#[derive(Debug, Clone)]
pub struct ChunkedStreamLinkConfig {
    /// Display name, stamped as the origin of received chunk events.
    pub name: String,
    /// Byte sequence delimiting chunks on the wire. Must not be empty.
    pub separator: Vec<u8>,
    /// Whether sent chunks also get a leading separator.
    pub begin_chunk_separator: bool,
}

impl Default for ChunkedStreamLinkConfig {
    fn default() -> Self {
        Self {
            name: "ChunkedStreamLink".into(),
            separator: b"\0".to_vec(),
            begin_chunk_separator: true,
        }
    }
}

/// Splits the incoming byte stream on the separator, discarding empty
/// chunks.
struct DechunkRoutine {
    separator: Vec<u8>,
    partial: Vec<u8>,
}

impl StreamRoutine for DechunkRoutine {
    fn step(&mut self, io: &mut StreamIo<'_>) -> Step {
        match io.read_until(&self.separator, &mut self.partial) {
            Some(chunk) if chunk.is_empty() => Step::Proceed,
            Some(chunk) => {
                io.write(chunk);
                Step::Proceed
            }
            None => Step::Wait,
        }
    }
}

/// Frames outgoing payloads with the separator. Events without a framed
/// representation are dropped.
struct FrameRoutine {
    separator: Vec<u8>,
    begin_chunk_separator: bool,
}

impl EventRoutine<LinkEvent, Vec<u8>> for FrameRoutine {
    fn step(&mut self, io: &mut EventIo<'_, LinkEvent, Vec<u8>>) -> Step {
        let Some(event) = io.receive() else {
            return Step::Wait;
        };
        match event {
            LinkEvent::Data(data) => {
                let payload = data.into_data();
                if !payload.is_empty() {
                    let mut framed =
                        Vec::with_capacity(payload.len() + 2 * self.separator.len());
                    if self.begin_chunk_separator {
                        framed.extend_from_slice(&self.separator);
                    }
                    framed.extend_from_slice(&payload);
                    framed.extend_from_slice(&self.separator);
                    io.send(framed);
                }
            }
            other => {
                warn!(
                    kind = other.kind(),
                    "dropping event with no framed representation"
                );
            }
        }
        Step::Proceed
    }
}

struct ChunkedStreamLinkBody {
    origin: Origin,
    reader: StreamProcessor,
    receiver: EventProcessor<LinkEvent, LinkEvent>,
    sender: EventProcessor<LinkEvent, Vec<u8>>,
    writer: StreamProcessor,
    after_receive: Option<EventHook>,
    after_write: Option<StreamHook>,
}

impl ChunkedStreamLinkBody {
    fn new(config: ChunkedStreamLinkConfig) -> Self {
        let origin = Origin::from(config.name.as_str());
        Self {
            reader: StreamProcessor::new(Box::new(DechunkRoutine {
                separator: config.separator.clone(),
                partial: Vec::new(),
            })),
            receiver: EventProcessor::new(Box::new(RedirectRoutine::new(
                Direction::Up,
                true,
                origin.clone(),
            ))),
            sender: EventProcessor::new(Box::new(FrameRoutine {
                separator: config.separator,
                begin_chunk_separator: config.begin_chunk_separator,
            })),
            writer: StreamProcessor::new(Box::new(RelayRoutine)),
            after_receive: None,
            after_write: None,
            origin,
        }
    }
}

impl Link for ChunkedStreamLinkBody {
    fn origin(&self) -> Origin {
        self.origin.clone()
    }

    fn service(&mut self) -> Vec<Emission> {
        let mut batch = Vec::new();
        loop {
            let mut progressed = self.reader.step_once().is_some();
            while let Some(chunk) = self.reader.take_output() {
                progressed = true;
                let event = LinkData::with_origin(chunk, Direction::Up, self.origin.clone());
                self.receiver.push(event.into());
            }
            progressed |= self.receiver.step_once().is_some();
            drain_events(&mut self.receiver, &self.after_receive, &mut batch);
            progressed |= self.sender.step_once().is_some();
            while let Some(framed) = self.sender.take_output() {
                progressed = true;
                self.writer.push(&framed);
            }
            progressed |= self.writer.step_once().is_some();
            drain_buffers(&mut self.writer, &self.after_write, &mut batch);
            if !batch.is_empty() || !progressed {
                return batch;
            }
        }
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

    fn accept_inject_receive(&mut self, event: LinkEvent) -> bool {
        self.receiver.inject(event);
        true
    }

    fn accept_to_read(&mut self, buffer: &[u8]) -> bool {
        self.reader.push(buffer);
        true
    }

    fn take_to_write(&mut self) -> Option<Vec<u8>> {
        self.writer.take_output_concat()
    }

    fn install_after_receive(&mut self, hook: EventHook) -> bool {
        self.after_receive = Some(hook);
        true
    }

    fn install_after_write(&mut self, hook: StreamHook) -> bool {
        self.after_write = Some(hook);
        true
    }
}

/// A link bridging a stream face below to an event face above by framing
/// payloads with a chunk separator.
pub struct ChunkedStreamLink {
    handle: LinkHandle,
}

impl ChunkedStreamLink {
    /// A chunked stream link with default configuration: single null byte
    /// separator, leading separator enabled.
    pub fn new() -> Self {
        Self::build(ChunkedStreamLinkConfig::default())
    }

    /// A chunked stream link with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySeparator`] when the configured separator is
    /// empty.
    pub fn with_config(config: ChunkedStreamLinkConfig) -> Result<Self> {
        if config.separator.is_empty() {
            return Err(Error::EmptySeparator);
        }
        Ok(Self::build(config))
    }

    fn build(config: ChunkedStreamLinkConfig) -> Self {
        let cell: Rc<RefCell<dyn Link>> =
            Rc::new(RefCell::new(ChunkedStreamLinkBody::new(config)));
        Self {
            handle: LinkHandle::new(cell),
        }
    }

    /// A clone of this link's shared handle.
    pub fn handle(&self) -> LinkHandle {
        self.handle.clone()
    }
}

impl Default for ChunkedStreamLink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for ChunkedStreamLink {
    type Target = LinkHandle;

    fn deref(&self) -> &LinkHandle {
        &self.handle
    }
}

impl From<&ChunkedStreamLink> for LinkHandle {
    fn from(link: &ChunkedStreamLink) -> LinkHandle {
        link.handle()
    }
}

// === Tests ===

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::event::LinkClockTime;

    #[test]
    fn test_sent_payloads_are_framed() {
        let link = ChunkedStreamLink::new();
        link.send_data(b"hi".to_vec());
        assert_eq!(link.to_write(), Some(b"\0hi\0".to_vec()));
    }

    #[test]
    fn test_leading_separator_is_configurable() {
        let link = ChunkedStreamLink::with_config(ChunkedStreamLinkConfig {
            begin_chunk_separator: false,
            ..ChunkedStreamLinkConfig::default()
        })
        .unwrap();
        link.send_data(b"hi".to_vec());
        assert_eq!(link.to_write(), Some(b"hi\0".to_vec()));
    }

    #[test]
    fn test_read_bytes_surface_as_chunk_events() {
        let link = ChunkedStreamLink::new();
        link.to_read(b"\0foo,\0");
        link.to_read(b"\0bar,\0");
        link.to_read(b"\0foobar!\0");

        let events = link.receive_all();
        let chunks: Vec<&[u8]> = events
            .iter()
            .map(|event| event.as_data().unwrap().data())
            .collect();
        assert_eq!(chunks, vec![&b"foo,"[..], b"bar,", b"foobar!"]);
        for event in &events {
            let data = event.as_data().unwrap();
            assert_eq!(data.direction(), Direction::Up);
            assert_eq!(&**data.origin(), "ChunkedStreamLink");
        }
    }

    #[test]
    fn test_chunks_reassemble_across_reads() {
        let link = ChunkedStreamLink::new();
        link.to_read(b"par");
        assert!(!link.has_receive());
        link.to_read(b"tial\0");
        let event = link.receive().unwrap();
        assert_eq!(event.as_data().unwrap().data(), b"partial");
    }

    #[test]
    fn test_empty_chunks_never_surface() {
        let link = ChunkedStreamLink::new();
        link.to_read(b"\0\0\0a\0\0");
        let events = link.receive_all();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_data().unwrap().data(), b"a");

        link.send_data(Vec::new());
        assert_eq!(link.to_write(), None);
    }

    #[test]
    fn test_multibyte_separator() {
        let link = ChunkedStreamLink::with_config(ChunkedStreamLinkConfig {
            separator: b"\r\n".to_vec(),
            begin_chunk_separator: false,
            ..ChunkedStreamLinkConfig::default()
        })
        .unwrap();

        link.send_data(b"GET /".to_vec());
        assert_eq!(link.to_write(), Some(b"GET /\r\n".to_vec()));

        link.to_read(b"200 OK\r");
        assert!(!link.has_receive());
        link.to_read(b"\n");
        assert_eq!(link.receive().unwrap().as_data().unwrap().data(), b"200 OK");
    }

    #[test]
    fn test_empty_separator_is_rejected() {
        let result = ChunkedStreamLink::with_config(ChunkedStreamLinkConfig {
            separator: Vec::new(),
            ..ChunkedStreamLinkConfig::default()
        });
        assert!(matches!(result, Err(Error::EmptySeparator)));
    }

    #[test]
    fn test_unframeable_events_are_dropped() {
        let link = ChunkedStreamLink::new();
        assert!(link.send(LinkClockTime::new(1.0)));
        assert_eq!(link.to_write(), None);
    }

    #[test]
    fn test_event_face_below_is_absent() {
        let link = ChunkedStreamLink::new();
        assert!(!link.to_receive_data(b"nope".to_vec()));
        assert!(link.to_send().is_none());
    }

    proptest! {
        /// Framing a sequence of separator-free payloads on one link and
        /// feeding the wire bytes to another reproduces the sequence.
        #[test]
        fn test_framed_payload_sequences_round_trip(
            payloads in prop::collection::vec(prop::collection::vec(1u8..=255, 1..32), 0..8),
            begin_chunk_separator: bool,
        ) {
            let framer = ChunkedStreamLink::with_config(ChunkedStreamLinkConfig {
                begin_chunk_separator,
                ..ChunkedStreamLinkConfig::default()
            }).unwrap();
            let dechunker = ChunkedStreamLink::new();

            for payload in &payloads {
                framer.send_data(payload.clone());
            }
            if let Some(wire) = framer.to_write() {
                dechunker.to_read(&wire);
            }

            let received: Vec<Vec<u8>> = dechunker
                .receive_all()
                .into_iter()
                .map(|event| event.into_data().unwrap().into_data())
                .collect();
            prop_assert_eq!(received, payloads);
        }
    }
}
