//! Per-stream state tracking.

use bytes::{Bytes, BytesMut};

use super::window::SendWindow;
use crate::frame::StreamId;
use crate::hpack::HeaderField;

/// State for one stream, tracked in the session's stream table.
///
/// Each direction completes independently: `end_headers`/`end_stream`
/// track what the peer has finished sending, `self_end_headers`/
/// `self_end_stream` track what we have finished sending.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    id: StreamId,
    /// Flow control credit for DATA we send on this stream.
    pub(super) send_window: SendWindow,
    /// Peer finished its header block.
    pub(super) end_headers: bool,
    /// Peer sent END_STREAM.
    pub(super) end_stream: bool,
    /// We finished sending our header block.
    pub(super) self_end_headers: bool,
    /// We sent END_STREAM.
    pub(super) self_end_stream: bool,
    /// Stream was reset, by either side.
    pub(super) reset: bool,
    /// Received body bytes, in arrival order.
    pub(super) body: BytesMut,
    /// Compressed header block, accumulated until end_headers.
    pub(super) fragments: BytesMut,
    /// Decoded headers, ordered, duplicates preserved.
    pub(super) headers: Vec<HeaderField>,
}

impl StreamEntry {
    pub(super) fn new(id: StreamId, initial_window: u32) -> Self {
        Self {
            id,
            send_window: SendWindow::new(initial_window),
            end_headers: false,
            end_stream: false,
            self_end_headers: false,
            self_end_stream: false,
            reset: false,
            body: BytesMut::new(),
            fragments: BytesMut::new(),
            headers: Vec::new(),
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Headers decoded from the peer so far.
    pub fn headers(&self) -> &[HeaderField] {
        &self.headers
    }

    /// Body bytes received from the peer so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Take the accumulated body, leaving the entry empty.
    pub fn take_body(&mut self) -> Bytes {
        self.body.split().freeze()
    }

    /// Peer finished its header block.
    pub fn headers_complete(&self) -> bool {
        self.end_headers
    }

    /// Peer sent END_STREAM.
    pub fn peer_done(&self) -> bool {
        self.end_stream
    }

    /// We sent END_STREAM.
    pub fn self_done(&self) -> bool {
        self.self_end_stream
    }

    pub fn is_reset(&self) -> bool {
        self.reset
    }

    /// Both directions finished, or the stream was torn down.
    pub fn is_complete(&self) -> bool {
        self.reset || (self.end_stream && self.self_end_stream)
    }

    pub fn send_window(&self) -> u32 {
        self.send_window.available()
    }
}
