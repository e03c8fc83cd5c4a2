//! Stream links: byte passthrough with stream faces on both sides.
//!
//! A stream link relays bytes verbatim in both directions. On its own it is
//! a buffer seam between a byte transport and the layer above; its value is
//! the boundary surface, which gives composition layers a place to install
//! hooks and lets tests drive a transport end of a stack by hand.

use std::cell::RefCell;
use std::rc::Rc;

use crate::event::Origin;
use crate::processor::{Step, StreamIo, StreamProcessor, StreamRoutine};

use super::{drain_buffers, Emission, Link, LinkHandle, StreamHook};

/// Routine that relays whatever bytes are buffered.
pub(crate) struct RelayRoutine;

impl StreamRoutine for RelayRoutine {
    fn step(&mut self, io: &mut StreamIo<'_>) -> Step {
        match io.read(None) {
            Some(buffer) => {
                io.write(buffer);
                Step::Proceed
            }
            None => Step::Wait,
        }
    }
}

struct StreamLinkBody {
    origin: Origin,
    reader: StreamProcessor,
    writer: StreamProcessor,
    after_read: Option<StreamHook>,
    after_write: Option<StreamHook>,
}

impl StreamLinkBody {
    fn new(name: &str) -> Self {
        Self {
            origin: Origin::from(name),
            reader: StreamProcessor::new(Box::new(RelayRoutine)),
            writer: StreamProcessor::new(Box::new(RelayRoutine)),
            after_read: None,
            after_write: None,
        }
    }
}

impl Link for StreamLinkBody {
    fn origin(&self) -> Origin {
        self.origin.clone()
    }

    fn service(&mut self) -> Vec<Emission> {
        let mut batch = Vec::new();
        loop {
            let stepped = self.reader.step_once().is_some() | self.writer.step_once().is_some();
            drain_buffers(&mut self.reader, &self.after_read, &mut batch);
            drain_buffers(&mut self.writer, &self.after_write, &mut batch);
            if !batch.is_empty() || !stepped {
                return batch;
            }
        }
    }

    fn accept_to_read(&mut self, buffer: &[u8]) -> bool {
        self.reader.push(buffer);
        true
    }

    fn accept_write(&mut self, buffer: &[u8]) -> bool {
        self.writer.push(buffer);
        true
    }

    fn take_read(&mut self) -> Option<Vec<u8>> {
        self.reader.take_output_concat()
    }

    fn take_to_write(&mut self) -> Option<Vec<u8>> {
        self.writer.take_output_concat()
    }

    fn install_after_read(&mut self, hook: StreamHook) -> bool {
        self.after_read = Some(hook);
        true
    }

    fn install_after_write(&mut self, hook: StreamHook) -> bool {
        self.after_write = Some(hook);
        true
    }
}

/// A link that relays bytes verbatim, with stream faces above and below.
pub struct StreamLink {
    handle: LinkHandle,
}

impl StreamLink {
    /// A stream link with the default display name.
    pub fn new() -> Self {
        Self::named("StreamLink")
    }

    /// A stream link with the given display name.
    pub fn named(name: impl Into<String>) -> Self {
        let cell: Rc<RefCell<dyn Link>> =
            Rc::new(RefCell::new(StreamLinkBody::new(&name.into())));
        Self {
            handle: LinkHandle::new(cell),
        }
    }

    /// A clone of this link's shared handle.
    pub fn handle(&self) -> LinkHandle {
        self.handle.clone()
    }
}

impl Default for StreamLink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for StreamLink {
    type Target = LinkHandle;

    fn deref(&self) -> &LinkHandle {
        &self.handle
    }
}

impl From<&StreamLink> for LinkHandle {
    fn from(link: &StreamLink) -> LinkHandle {
        link.handle()
    }
}

// === Tests ===

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_bytes_come_out_below() {
        let link = StreamLink::new();
        link.write(b"hello ");
        link.write(b"world");
        assert_eq!(link.to_write(), Some(b"hello world".to_vec()));
        assert_eq!(link.to_write(), None);
    }

    #[test]
    fn test_read_bytes_come_out_above() {
        let link = StreamLink::new();
        link.to_read(b"upward");
        assert_eq!(link.read(), Some(b"upward".to_vec()));
    }

    #[test]
    fn test_event_faces_are_absent() {
        let link = StreamLink::new();
        assert!(!link.send_data(b"nope".to_vec()));
        assert!(!link.to_receive_data(b"nope".to_vec()));
        assert!(link.receive().is_none());
        assert!(link.to_send().is_none());
    }

    #[test]
    fn test_write_hook_sees_each_buffer() {
        let link = StreamLink::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        link.set_after_write(Rc::new(move |buffer| sink.borrow_mut().push(buffer)));

        link.write(b"one");
        link.write(b"two");

        assert_eq!(link.to_write(), None);
        assert_eq!(*seen.borrow(), vec![b"one".to_vec(), b"two".to_vec()]);
    }

    /// A hook may feed the link it is installed on without deadlocking.
    #[test]
    fn test_hook_may_reenter_its_own_link() {
        let link = StreamLink::new();
        let back = link.handle();
        link.set_after_write(Rc::new(move |buffer| {
            back.to_read(&buffer);
        }));

        link.write(b"ping");
        assert_eq!(link.read(), Some(b"ping".to_vec()));
    }

    #[test]
    fn test_empty_feeds_produce_nothing() {
        let link = StreamLink::new();
        link.write(b"");
        link.to_read(b"");
        assert_eq!(link.to_write(), None);
        assert_eq!(link.read(), None);
    }
}
