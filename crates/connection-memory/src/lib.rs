//! In-memory connection sink for local development and tests.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use switchyard_connection::{ConnectionSink, Token};
use tracing::trace;

/// One frame handed to the sink.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SentFrame {
    /// Connection the frame was sent on.
    pub token: Token,
    /// The concatenated frame bytes.
    pub data: Bytes,
}

/// Records every frame instead of writing it to a socket.
///
/// Clones share the same frame log, so a test can keep one handle while the
/// router owns another.
#[derive(Clone, Debug, Default)]
pub struct MemoryConnections {
    frames: Arc<Mutex<Vec<SentFrame>>>,
}

impl MemoryConnections {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All frames sent so far, oldest first.
    #[must_use]
    pub fn frames(&self) -> Vec<SentFrame> {
        self.frames.lock().clone()
    }

    /// Frames sent on a single connection, oldest first.
    #[must_use]
    pub fn frames_for(&self, token: Token) -> Vec<SentFrame> {
        self.frames
            .lock()
            .iter()
            .filter(|frame| frame.token == token)
            .cloned()
            .collect()
    }

    /// Removes and returns every recorded frame.
    #[must_use]
    pub fn take_frames(&self) -> Vec<SentFrame> {
        std::mem::take(&mut *self.frames.lock())
    }

    /// Number of frames sent so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    /// Whether nothing has been sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    /// Forgets every recorded frame.
    pub fn clear(&self) {
        self.frames.lock().clear();
    }
}

impl ConnectionSink for MemoryConnections {
    fn sendv(&self, token: Token, items: &[&[u8]]) {
        let mut data = BytesMut::with_capacity(items.iter().map(|item| item.len()).sum());
        for item in items {
            data.extend_from_slice(item);
        }

        trace!("memory sendv token={} bytes={}", token, data.len());

        self.frames.lock().push(SentFrame {
            token,
            data: data.freeze(),
        });
    }
}
