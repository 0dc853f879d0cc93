//! Session engine: the per-connection state machine.
//!
//! One `Session` multiplexes many logical streams over one transport.
//! Independent caller threads share the session: some send headers and
//! data, one typically pumps `read_frame`/`handle` to dispatch inbound
//! frames. Coordination splits into independent lock domains:
//!
//! - stream table (map, connection window, terminal GOAWAY record),
//!   paired with the window condvar
//! - send lock, serializing multi-frame send bodies
//! - dispatch lock, serializing `handle`
//! - HPACK encoder and decoder, one lock each
//! - read path (transport reads and the pushed-back frame queue)
//! - write path (frame encoder and transport writes)
//!
//! Nesting is limited to dispatch -> stream table -> decoder -> write
//! and send -> stream table -> write; all other acquisitions are
//! disjoint. A sender blocked on flow control waits on the window
//! condvar with the stream-table lock released (and the send lock
//! dropped unless it asked for send priority), so inbound dispatch can
//! always replenish windows, fail the sender on RST_STREAM/GOAWAY, or
//! both.

mod settings;
mod stream;
mod window;

pub use settings::Settings;
pub use stream::StreamEntry;
pub use window::SendWindow;

use std::collections::{HashMap, VecDeque, hash_map::Entry};
use std::io;

use bytes::{Bytes, BytesMut};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::frame::{
    self, ContinuationFrame, DataFrame, ErrorCode, Frame, FrameDecoder, FrameEncoder, FrameError,
    GoAwayFrame, HeadersFrame, PingFrame, RstStreamFrame, SettingsFrame, StreamId,
    WindowUpdateFrame,
};
use crate::hpack::{HeaderEntry, HpackDecoder, HpackEncoder, HpackError};
use crate::transport::Transport;

/// Session-level error. All variants are fatal to the stream or the
/// connection; nothing is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("connection closed")]
    ConnectionClosed,
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] FrameError),
    #[error("stream {0} does not exist")]
    StreamDoesntExist(u32),
    #[error("stream {0} is closed")]
    StreamClosed(u32),
    #[error("headers not sent on stream {0}")]
    HeadersNotSent(u32),
    #[error("headers already sent on stream {0}")]
    HeadersSent(u32),
    #[error("invalid connection preface")]
    InvalidMagicSequence,
    #[error("protocol error: {0}")]
    ProtocolError(String),
    #[error("header compression error: {0}")]
    Hpack(#[from] HpackError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// State guarded by the stream-table lock.
struct Shared {
    streams: HashMap<u32, StreamEntry>,
    /// Connection-level send credit.
    connection_window: SendWindow,
    /// What the peer has advertised so far.
    remote_settings: Settings,
    /// Terminal state, once a GOAWAY arrives.
    goaway: Option<GoAwayFrame>,
    goaway_sent: bool,
    /// Highest peer-initiated stream id seen, for GOAWAY emission.
    last_peer_stream: u32,
}

/// State guarded by the read lock.
struct Reader {
    decoder: FrameDecoder,
    /// Frames pushed back by `unread_frame`, returned before fresh
    /// transport reads.
    deferred: VecDeque<Frame>,
}

/// State guarded by the write lock.
struct Writer {
    encoder: FrameEncoder,
    buf: BytesMut,
}

/// One protocol connection shared by many caller threads.
pub struct Session<T: Transport> {
    transport: T,
    local_settings: Settings,
    shared: Mutex<Shared>,
    /// Signaled whenever window credit arrives or the stream table
    /// reaches a terminal state a blocked sender must observe.
    window_cv: Condvar,
    send_lock: Mutex<()>,
    dispatch_lock: Mutex<()>,
    hpack_encoder: Mutex<HpackEncoder>,
    hpack_decoder: Mutex<HpackDecoder>,
    reader: Mutex<Reader>,
    writer: Mutex<Writer>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, local_settings: Settings) -> Self {
        let mut decoder = FrameDecoder::new();
        decoder.set_max_frame_size(local_settings.effective_max_frame_size());

        Self {
            transport,
            local_settings,
            shared: Mutex::new(Shared {
                streams: HashMap::new(),
                connection_window: SendWindow::new(frame::DEFAULT_INITIAL_WINDOW_SIZE),
                remote_settings: Settings::default(),
                goaway: None,
                goaway_sent: false,
                last_peer_stream: 0,
            }),
            window_cv: Condvar::new(),
            send_lock: Mutex::new(()),
            dispatch_lock: Mutex::new(()),
            hpack_encoder: Mutex::new(HpackEncoder::new()),
            hpack_decoder: Mutex::new(HpackDecoder::with_table_size(
                local_settings.effective_header_table_size() as usize,
            )),
            reader: Mutex::new(Reader {
                decoder,
                deferred: VecDeque::new(),
            }),
            writer: Mutex::new(Writer {
                encoder: FrameEncoder::new(),
                buf: BytesMut::with_capacity(16384),
            }),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn local_settings(&self) -> Settings {
        self.local_settings
    }

    /// The peer's settings as merged so far.
    pub fn remote_settings(&self) -> Settings {
        self.shared.lock().remote_settings
    }

    /// The GOAWAY frame that terminated the connection, if any.
    pub fn goaway(&self) -> Option<GoAwayFrame> {
        self.shared.lock().goaway.clone()
    }

    // Preface and handshake

    /// Read and verify the 24-byte connection preface (server role).
    pub fn expect_preface(&self) -> Result<(), SessionError> {
        let _reader = self.reader.lock();
        let mut buf = [0u8; frame::CONNECTION_PREFACE.len()];
        self.transport
            .read_exact(&mut buf)
            .map_err(map_read_error)?;
        if buf != *frame::CONNECTION_PREFACE {
            return Err(SessionError::InvalidMagicSequence);
        }
        trace!("connection preface verified");
        Ok(())
    }

    /// Write the 24-byte connection preface (client role).
    pub fn send_preface(&self) -> Result<(), SessionError> {
        let mut writer = self.writer.lock();
        let Writer { encoder, buf } = &mut *writer;
        buf.clear();
        encoder.encode_connection_preface(buf);
        self.transport.write_all(buf)?;
        Ok(())
    }

    /// Server-side connection setup: verify the peer's preface, then
    /// advertise our settings.
    pub fn handshake(&self) -> Result<(), SessionError> {
        self.expect_preface()?;
        self.send_settings()
    }

    // Frame pump

    /// Read one frame: a pushed-back frame if queued, else a fresh one
    /// from the transport.
    pub fn read_frame(&self) -> Result<Frame, SessionError> {
        let mut reader = self.reader.lock();
        if let Some(deferred) = reader.deferred.pop_front() {
            return Ok(deferred);
        }

        let mut head = [0u8; frame::FRAME_HEADER_SIZE];
        self.transport
            .read_exact(&mut head)
            .map_err(map_read_error)?;

        let length = u32::from_be_bytes([0, head[0], head[1], head[2]]);
        let max = self.local_settings.effective_max_frame_size();
        if length > max {
            return Err(FrameError::FrameTooLarge { size: length, max }.into());
        }

        let mut buf = BytesMut::with_capacity(frame::FRAME_HEADER_SIZE + length as usize);
        buf.extend_from_slice(&head);
        buf.resize(frame::FRAME_HEADER_SIZE + length as usize, 0);
        self.transport
            .read_exact(&mut buf[frame::FRAME_HEADER_SIZE..])
            .map_err(map_read_error)?;

        match reader.decoder.decode(&mut buf)? {
            Some(decoded) => Ok(decoded),
            None => Err(FrameError::Incomplete.into()),
        }
    }

    /// Push a frame back; the next `read_frame` returns it before
    /// touching the transport. Lets a caller waiting for a specific
    /// frame hand an unrelated one back to the ordinary read path.
    pub fn unread_frame(&self, frame: Frame) {
        self.reader.lock().deferred.push_back(frame);
    }

    // Dispatch

    /// Dispatch one inbound frame. Returns the stream id when a
    /// HEADERS frame opened a new peer-initiated stream.
    pub fn handle(&self, frame: Frame) -> Result<Option<StreamId>, SessionError> {
        let _dispatch = self.dispatch_lock.lock();
        match frame {
            Frame::Ping(f) => {
                if !f.ack {
                    trace!("ping, echoing pong");
                    self.write_pong(f.data)?;
                }
                Ok(None)
            }
            Frame::Settings(f) => self.handle_settings(f).map(|_| None),
            Frame::Data(f) => self.handle_data(f).map(|_| None),
            Frame::Headers(f) => self.handle_headers(f),
            Frame::Continuation(f) => self.handle_continuation(f).map(|_| None),
            Frame::WindowUpdate(f) => self.handle_window_update(f).map(|_| None),
            Frame::RstStream(f) => self.handle_rst_stream(f).map(|_| None),
            Frame::GoAway(f) => {
                debug!(
                    last_stream = f.last_stream_id.value(),
                    code = %ErrorCode::from_u32(f.error_code),
                    "goaway received"
                );
                let mut shared = self.shared.lock();
                shared.goaway = Some(f);
                self.window_cv.notify_all();
                Ok(None)
            }
            // Priority scheduling is out of scope, unknown frame types
            // are ignored, and push is never enabled by this side.
            Frame::Priority(_) | Frame::PushPromise(_) | Frame::Unknown(_) => Ok(None),
        }
    }

    /// Dispatch a burst of frames, collecting newly opened stream ids.
    pub fn handle_all(
        &self,
        frames: impl IntoIterator<Item = Frame>,
    ) -> Result<Vec<StreamId>, SessionError> {
        let mut opened = Vec::new();
        for frame in frames {
            if let Some(id) = self.handle(frame)? {
                opened.push(id);
            }
        }
        Ok(opened)
    }

    fn handle_settings(&self, frame: SettingsFrame) -> Result<(), SessionError> {
        if frame.ack {
            trace!("settings ack");
            return Ok(());
        }

        let (table_size, max_frame) = {
            let mut shared = self.shared.lock();
            let old_initial = shared.remote_settings.effective_initial_window_size();
            shared.remote_settings.apply(&frame);
            let new_initial = shared.remote_settings.effective_initial_window_size();

            // A changed initial window shifts every stream window by
            // the same delta, possibly below zero.
            let delta = new_initial as i64 - old_initial as i64;
            if delta != 0 {
                for entry in shared.streams.values_mut() {
                    entry.send_window.adjust(delta as i32);
                }
                self.window_cv.notify_all();
            }

            (
                shared.remote_settings.effective_header_table_size(),
                shared.remote_settings.effective_max_frame_size(),
            )
        };

        self.hpack_encoder
            .lock()
            .set_max_table_size(table_size as usize);

        debug!(?frame.settings, "peer settings applied");

        let mut writer = self.writer.lock();
        writer.encoder.set_max_frame_size(max_frame);
        let Writer { encoder, buf } = &mut *writer;
        buf.clear();
        encoder.encode_settings_ack(buf);
        self.transport.write_all(buf)?;
        Ok(())
    }

    fn handle_data(&self, frame: DataFrame) -> Result<(), SessionError> {
        let id = frame.stream_id.value();
        let mut shared = self.shared.lock();
        let entry = shared.streams.get_mut(&id).ok_or_else(|| {
            SessionError::ProtocolError(format!("DATA for unknown stream {id}"))
        })?;
        if entry.end_stream {
            return Err(SessionError::ProtocolError(format!(
                "DATA after end of stream {id}"
            )));
        }

        entry.body.extend_from_slice(&frame.data);
        if frame.end_stream {
            entry.end_stream = true;
        }

        // Replenish the peer immediately, at both levels.
        let len = frame.data.len() as u32;
        if len > 0 {
            let mut writer = self.writer.lock();
            let Writer { encoder, buf } = &mut *writer;
            buf.clear();
            encoder.write_window_update(StreamId::CONNECTION, len, buf);
            encoder.write_window_update(frame.stream_id, len, buf);
            self.transport.write_all(buf)?;
        }
        Ok(())
    }

    fn handle_headers(&self, frame: HeadersFrame) -> Result<Option<StreamId>, SessionError> {
        let id = frame.stream_id.value();
        let mut shared = self.shared.lock();
        let shared = &mut *shared;

        let initial = shared.remote_settings.effective_initial_window_size();
        let created = !shared.streams.contains_key(&id);
        let entry = shared
            .streams
            .entry(id)
            .or_insert_with(|| StreamEntry::new(frame.stream_id, initial));

        entry.fragments.extend_from_slice(&frame.header_block);
        if frame.end_stream {
            entry.end_stream = true;
        }
        if frame.end_headers {
            entry.end_headers = true;
            let block = entry.fragments.split().freeze();
            // Decode failures desynchronize the compression state and
            // are fatal to the whole connection.
            let fields = self.hpack_decoder.lock().decode(&block)?;
            entry.headers.extend(fields);
        }

        if created {
            shared.last_peer_stream = shared.last_peer_stream.max(id);
            debug!(stream = id, "stream opened by peer");
            Ok(Some(frame.stream_id))
        } else {
            Ok(None)
        }
    }

    fn handle_continuation(&self, frame: ContinuationFrame) -> Result<(), SessionError> {
        let id = frame.stream_id.value();
        let mut shared = self.shared.lock();
        let entry = shared.streams.get_mut(&id).ok_or_else(|| {
            SessionError::ProtocolError(format!("CONTINUATION for unknown stream {id}"))
        })?;
        if entry.end_headers {
            return Err(SessionError::ProtocolError(format!(
                "CONTINUATION after END_HEADERS on stream {id}"
            )));
        }
        if entry.end_stream {
            return Err(SessionError::ProtocolError(format!(
                "CONTINUATION after end of stream {id}"
            )));
        }

        entry.fragments.extend_from_slice(&frame.header_block);
        if frame.end_headers {
            entry.end_headers = true;
            let block = entry.fragments.split().freeze();
            let fields = self.hpack_decoder.lock().decode(&block)?;
            entry.headers.extend(fields);
        }
        Ok(())
    }

    fn handle_window_update(&self, frame: WindowUpdateFrame) -> Result<(), SessionError> {
        let mut shared = self.shared.lock();
        if frame.stream_id.is_connection_level() {
            shared.connection_window.grant(frame.increment);
        } else {
            let id = frame.stream_id.value();
            let entry = shared.streams.get_mut(&id).ok_or_else(|| {
                SessionError::ProtocolError(format!("WINDOW_UPDATE for unknown stream {id}"))
            })?;
            entry.send_window.grant(frame.increment);
        }
        self.window_cv.notify_all();
        Ok(())
    }

    fn handle_rst_stream(&self, frame: RstStreamFrame) -> Result<(), SessionError> {
        let id = frame.stream_id.value();
        let mut shared = self.shared.lock();
        let entry = shared.streams.get_mut(&id).ok_or_else(|| {
            SessionError::ProtocolError(format!("RST_STREAM for unknown stream {id}"))
        })?;
        entry.reset = true;
        self.window_cv.notify_all();
        warn!(
            stream = id,
            code = %ErrorCode::from_u32(frame.error_code),
            "stream reset by peer"
        );
        Ok(())
    }

    // Outbound

    /// Create the entry for a locally initiated stream. Must precede
    /// `send_headers` on that id.
    pub fn open_stream(&self, id: u32) -> Result<(), SessionError> {
        let mut shared = self.shared.lock();
        if shared.goaway.is_some() {
            return Err(SessionError::ConnectionClosed);
        }
        let initial = shared.remote_settings.effective_initial_window_size();
        match shared.streams.entry(id) {
            Entry::Occupied(_) => Err(SessionError::ProtocolError(format!(
                "stream {id} already open"
            ))),
            Entry::Vacant(slot) => {
                slot.insert(StreamEntry::new(StreamId::new(id), initial));
                Ok(())
            }
        }
    }

    /// Send a header list on a stream, fragmenting the encoded block
    /// into HEADERS plus CONTINUATION frames as the peer's frame size
    /// limit requires. Only the last fragment carries END_HEADERS.
    pub fn send_headers(
        &self,
        id: u32,
        end_stream: bool,
        headers: &[HeaderEntry],
    ) -> Result<(), SessionError> {
        let _send = self.send_lock.lock();

        let max_frame = {
            let mut shared = self.shared.lock();
            if shared.goaway.is_some() {
                return Err(SessionError::ConnectionClosed);
            }
            let max_frame = shared.remote_settings.effective_max_frame_size() as usize;
            let entry = shared
                .streams
                .get_mut(&id)
                .ok_or(SessionError::StreamDoesntExist(id))?;
            if entry.reset || entry.self_end_stream {
                return Err(SessionError::StreamClosed(id));
            }
            if entry.self_end_headers {
                return Err(SessionError::HeadersSent(id));
            }
            entry.self_end_headers = true;
            if end_stream {
                entry.self_end_stream = true;
            }
            max_frame
        };

        let mut block = Vec::new();
        self.hpack_encoder.lock().encode(headers, &mut block);

        let stream_id = StreamId::new(id);
        let first_len = block.len().min(max_frame);
        let mut writer = self.writer.lock();
        let Writer { encoder, buf } = &mut *writer;
        buf.clear();
        encoder.encode(
            &Frame::Headers(HeadersFrame {
                stream_id,
                end_stream,
                end_headers: first_len == block.len(),
                pad_len: 0,
                priority: None,
                header_block: Bytes::copy_from_slice(&block[..first_len]),
            }),
            buf,
        );

        let mut offset = first_len;
        while offset < block.len() {
            let chunk = (block.len() - offset).min(max_frame);
            encoder.encode(
                &Frame::Continuation(ContinuationFrame {
                    stream_id,
                    end_headers: offset + chunk == block.len(),
                    header_block: Bytes::copy_from_slice(&block[offset..offset + chunk]),
                }),
                buf,
            );
            offset += chunk;
        }

        self.transport.write_all(buf)?;
        trace!(stream = id, bytes = block.len(), "headers sent");
        Ok(())
    }

    /// Send a payload on a stream, chunked to the flow-control credit
    /// available. Blocks while both windows are exhausted; a reset or
    /// GOAWAY arriving meanwhile fails the send.
    pub fn send_data(&self, id: u32, end_stream: bool, payload: &[u8]) -> Result<(), SessionError> {
        self.send_data_inner(id, end_stream, payload, false)
    }

    /// Like `send_data`, but keeps the send lock across flow-control
    /// stalls so no other sender can interleave frames mid-payload.
    pub fn send_data_prioritized(
        &self,
        id: u32,
        end_stream: bool,
        payload: &[u8],
    ) -> Result<(), SessionError> {
        self.send_data_inner(id, end_stream, payload, true)
    }

    fn send_data_inner(
        &self,
        id: u32,
        end_stream: bool,
        payload: &[u8],
        prioritized: bool,
    ) -> Result<(), SessionError> {
        let mut send_guard = Some(self.send_lock.lock());
        let mut shared = self.shared.lock();

        {
            let entry = shared
                .streams
                .get_mut(&id)
                .ok_or(SessionError::StreamDoesntExist(id))?;
            if entry.reset || entry.self_end_stream {
                return Err(SessionError::StreamClosed(id));
            }
            if !entry.self_end_headers {
                return Err(SessionError::HeadersNotSent(id));
            }
        }
        if shared.goaway.is_some() {
            return Err(SessionError::ConnectionClosed);
        }

        let stream_id = StreamId::new(id);
        if payload.is_empty() {
            if end_stream {
                if let Some(entry) = shared.streams.get_mut(&id) {
                    entry.self_end_stream = true;
                }
                self.write_data(stream_id, true, &[])?;
            }
            return Ok(());
        }

        let mut offset = 0;
        loop {
            // Re-validate on every pass; the state may have changed
            // while this sender was parked.
            let step = {
                let shared = &mut *shared;
                if shared.goaway.is_some() {
                    return Err(SessionError::ConnectionClosed);
                }
                let max_frame = shared.remote_settings.effective_max_frame_size();
                let connection_credit = shared.connection_window.available();
                let entry = shared
                    .streams
                    .get_mut(&id)
                    .ok_or(SessionError::StreamClosed(id))?;
                if entry.reset {
                    return Err(SessionError::StreamClosed(id));
                }

                let credit = max_frame
                    .min(connection_credit)
                    .min(entry.send_window.available()) as usize;
                if credit == 0 {
                    None
                } else {
                    let remaining = payload.len() - offset;
                    let chunk = remaining.min(credit);
                    let last = chunk == remaining;
                    entry.send_window.consume(chunk as u32);
                    if last && end_stream {
                        entry.self_end_stream = true;
                    }
                    shared.connection_window.consume(chunk as u32);
                    Some((chunk, last))
                }
            };

            match step {
                None => {
                    // Yield the send lock so other senders (and the
                    // dispatcher's writes) proceed while we wait.
                    if !prioritized && send_guard.is_some() {
                        send_guard = None;
                    }
                    self.window_cv.wait(&mut shared);
                }
                Some((chunk, last)) => {
                    // Written under the stream-table lock so the wire
                    // never runs ahead of the window debits.
                    self.write_data(
                        stream_id,
                        last && end_stream,
                        &payload[offset..offset + chunk],
                    )?;
                    offset += chunk;
                    if last {
                        return Ok(());
                    }
                }
            }
        }
    }

    // Control emitters

    /// Encode and write one frame. Frames from concurrent callers
    /// appear on the wire exactly in invocation order.
    pub fn send_frame(&self, frame: &Frame) -> Result<(), SessionError> {
        let mut writer = self.writer.lock();
        let Writer { encoder, buf } = &mut *writer;
        buf.clear();
        encoder.encode(frame, buf);
        self.transport.write_all(buf)?;
        Ok(())
    }

    /// Advertise the full local settings.
    pub fn send_settings(&self) -> Result<(), SessionError> {
        let records = self.local_settings.to_settings();
        let mut writer = self.writer.lock();
        let Writer { encoder, buf } = &mut *writer;
        buf.clear();
        encoder.write_settings(&records, buf);
        self.transport.write_all(buf)?;
        Ok(())
    }

    pub fn send_settings_ack(&self) -> Result<(), SessionError> {
        let mut writer = self.writer.lock();
        let Writer { encoder, buf } = &mut *writer;
        buf.clear();
        encoder.encode_settings_ack(buf);
        self.transport.write_all(buf)?;
        Ok(())
    }

    pub fn send_ping(&self, data: [u8; 8]) -> Result<(), SessionError> {
        self.send_frame(&Frame::Ping(PingFrame { ack: false, data }))
    }

    pub fn send_pong(&self, data: [u8; 8]) -> Result<(), SessionError> {
        self.write_pong(data)
    }

    /// Reset a stream: mark it closed locally and tell the peer.
    pub fn send_rst_stream(&self, id: u32, error_code: ErrorCode) -> Result<(), SessionError> {
        let mut shared = self.shared.lock();
        if let Some(entry) = shared.streams.get_mut(&id) {
            entry.reset = true;
            self.window_cv.notify_all();
        }
        let mut writer = self.writer.lock();
        let Writer { encoder, buf } = &mut *writer;
        buf.clear();
        encoder.write_rst_stream(StreamId::new(id), error_code.to_u32(), buf);
        self.transport.write_all(buf)?;
        Ok(())
    }

    pub fn send_window_update(&self, id: u32, increment: u32) -> Result<(), SessionError> {
        let mut writer = self.writer.lock();
        let Writer { encoder, buf } = &mut *writer;
        buf.clear();
        encoder.write_window_update(StreamId::new(id), increment, buf);
        self.transport.write_all(buf)?;
        Ok(())
    }

    pub fn send_goaway(&self, error_code: ErrorCode) -> Result<(), SessionError> {
        let last_peer_stream = {
            let mut shared = self.shared.lock();
            shared.goaway_sent = true;
            shared.last_peer_stream
        };
        let mut writer = self.writer.lock();
        let Writer { encoder, buf } = &mut *writer;
        buf.clear();
        encoder.write_goaway(
            StreamId::new(last_peer_stream),
            error_code.to_u32(),
            &[],
            buf,
        );
        self.transport.write_all(buf)?;
        Ok(())
    }

    fn write_pong(&self, data: [u8; 8]) -> Result<(), SessionError> {
        let mut writer = self.writer.lock();
        let Writer { encoder, buf } = &mut *writer;
        buf.clear();
        encoder.encode_ping_ack(data, buf);
        self.transport.write_all(buf)?;
        Ok(())
    }

    fn write_data(
        &self,
        stream_id: StreamId,
        end_stream: bool,
        data: &[u8],
    ) -> Result<(), SessionError> {
        self.send_frame(&Frame::Data(DataFrame {
            stream_id,
            end_stream,
            pad_len: 0,
            data: Bytes::copy_from_slice(data),
        }))
    }

    // Stream access

    /// Snapshot of a stream's current state.
    pub fn stream(&self, id: u32) -> Option<StreamEntry> {
        self.shared.lock().streams.get(&id).cloned()
    }

    /// Remove a stream and hand its final state to the caller.
    pub fn take_stream(&self, id: u32) -> Option<StreamEntry> {
        self.shared.lock().streams.remove(&id)
    }

    /// Remove the stream if both directions have finished (or it was
    /// reset), keeping the table bounded. Returns whether it was
    /// removed.
    pub fn reap(&self, id: u32) -> bool {
        let mut shared = self.shared.lock();
        if shared.streams.get(&id).is_some_and(StreamEntry::is_complete) {
            shared.streams.remove(&id);
            true
        } else {
            false
        }
    }

    /// Shut the connection down: best-effort GOAWAY if none has been
    /// exchanged yet, then close the transport.
    pub fn close(&self) -> Result<(), SessionError> {
        let needs_goaway = {
            let shared = self.shared.lock();
            shared.goaway.is_none() && !shared.goaway_sent
        };
        if needs_goaway
            && let Err(e) = self.send_goaway(ErrorCode::NoError)
        {
            debug!("goaway on close failed: {e}");
        }
        self.transport.close()?;
        Ok(())
    }
}

/// Transport EOF mid-read means the peer hung up.
fn map_read_error(e: io::Error) -> SessionError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        SessionError::ConnectionClosed
    } else {
        SessionError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hpack::HeaderField;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct MockTransport {
        input: Mutex<io::Cursor<Vec<u8>>>,
        output: Mutex<Vec<u8>>,
        closed: AtomicBool,
    }

    impl MockTransport {
        fn new() -> Self {
            Self::with_input(Vec::new())
        }

        fn with_input(input: Vec<u8>) -> Self {
            Self {
                input: Mutex::new(io::Cursor::new(input)),
                output: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }
        }
    }

    impl Transport for MockTransport {
        fn read_exact(&self, buf: &mut [u8]) -> io::Result<()> {
            io::Read::read_exact(&mut *self.input.lock(), buf)
        }

        fn write_all(&self, buf: &[u8]) -> io::Result<()> {
            self.output.lock().extend_from_slice(buf);
            Ok(())
        }

        fn close(&self) -> io::Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn written_frames(session: &Session<MockTransport>) -> Vec<Frame> {
        let out = session.transport.output.lock().clone();
        let mut buf = BytesMut::from(&out[..]);
        let decoder = FrameDecoder::new();
        decoder.decode_all(&mut buf).unwrap()
    }

    fn clear_output(session: &Session<MockTransport>) {
        session.transport.output.lock().clear();
    }

    fn header_block(headers: &[(&str, &str)]) -> Bytes {
        let mut encoder = HpackEncoder::new();
        let entries: Vec<HeaderEntry> = headers
            .iter()
            .map(|(n, v)| HeaderEntry::new(*n, *v))
            .collect();
        let mut block = Vec::new();
        encoder.encode(&entries, &mut block);
        Bytes::from(block)
    }

    fn headers_frame(stream_id: u32, end_stream: bool, end_headers: bool) -> Frame {
        Frame::Headers(HeadersFrame {
            stream_id: StreamId::new(stream_id),
            end_stream,
            end_headers,
            pad_len: 0,
            priority: None,
            header_block: header_block(&[(":method", "POST"), (":path", "/")]),
        })
    }

    fn data_frame(stream_id: u32, data: &'static [u8], end_stream: bool) -> Frame {
        Frame::Data(DataFrame {
            stream_id: StreamId::new(stream_id),
            end_stream,
            pad_len: 0,
            data: Bytes::from_static(data),
        })
    }

    fn window_update_frame(stream_id: u32, increment: u32) -> Frame {
        Frame::WindowUpdate(WindowUpdateFrame {
            stream_id: StreamId::new(stream_id),
            increment,
        })
    }

    /// Session whose peer has already opened stream `id`, with our
    /// headers marked sent so DATA can flow.
    fn session_with_open_stream(id: u32) -> Session<MockTransport> {
        let session = Session::new(MockTransport::new(), Settings::default());
        session.open_stream(id).unwrap();
        session
            .shared
            .lock()
            .streams
            .get_mut(&id)
            .unwrap()
            .self_end_headers = true;
        session
    }

    // Preface

    #[test]
    fn test_expect_preface_accepts_magic() {
        let transport = MockTransport::with_input(frame::CONNECTION_PREFACE.to_vec());
        let session = Session::new(transport, Settings::default());
        session.expect_preface().unwrap();
    }

    #[test]
    fn test_expect_preface_rejects_garbage() {
        let transport = MockTransport::with_input(b"GET / HTTP/1.1\r\nHost: x\r\n".to_vec());
        let session = Session::new(transport, Settings::default());
        assert!(matches!(
            session.expect_preface(),
            Err(SessionError::InvalidMagicSequence)
        ));
    }

    #[test]
    fn test_handshake_sends_local_settings() {
        let transport = MockTransport::with_input(frame::CONNECTION_PREFACE.to_vec());
        let settings = Settings::new().max_frame_size(32768).enable_push(false);
        let session = Session::new(transport, settings);

        session.handshake().unwrap();

        let frames = written_frames(&session);
        assert_eq!(frames.len(), 1);
        match &frames[0] {
            Frame::Settings(f) => {
                assert!(!f.ack);
                assert_eq!(f.settings, settings.to_settings());
            }
            other => panic!("expected SETTINGS, got {other:?}"),
        }
    }

    // Frame pump

    #[test]
    fn test_read_frame_from_transport() {
        let encoder = FrameEncoder::new();
        let mut buf = BytesMut::new();
        encoder.encode(
            &Frame::Ping(PingFrame {
                ack: false,
                data: [9; 8],
            }),
            &mut buf,
        );

        let session = Session::new(MockTransport::with_input(buf.to_vec()), Settings::default());
        match session.read_frame().unwrap() {
            Frame::Ping(f) => assert_eq!(f.data, [9; 8]),
            other => panic!("expected PING, got {other:?}"),
        }

        // Transport drained: next read reports the closed connection
        assert!(matches!(
            session.read_frame(),
            Err(SessionError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_unread_frame_returned_first() {
        let session = Session::new(MockTransport::new(), Settings::default());
        session.unread_frame(data_frame(7, b"queued", false));

        match session.read_frame().unwrap() {
            Frame::Data(f) => assert_eq!(f.stream_id.value(), 7),
            other => panic!("expected DATA, got {other:?}"),
        }
    }

    // Dispatch

    #[test]
    fn test_settings_acked_exactly_once() {
        let session = Session::new(MockTransport::new(), Settings::default());

        let update = Frame::Settings(SettingsFrame {
            ack: false,
            settings: Settings::new()
                .max_concurrent_streams(50)
                .initial_window_size(32768)
                .to_settings(),
        });
        session.handle(update).unwrap();

        let frames = written_frames(&session);
        assert_eq!(frames.len(), 1);
        match &frames[0] {
            Frame::Settings(f) => {
                assert!(f.ack);
                assert!(f.settings.is_empty());
            }
            other => panic!("expected SETTINGS ack, got {other:?}"),
        }

        assert_eq!(session.remote_settings().max_concurrent_streams, Some(50));

        // An inbound ack produces nothing
        clear_output(&session);
        session
            .handle(Frame::Settings(SettingsFrame {
                ack: true,
                settings: Vec::new(),
            }))
            .unwrap();
        assert!(written_frames(&session).is_empty());
    }

    #[test]
    fn test_settings_merge_preserves_absent_fields() {
        let session = Session::new(MockTransport::new(), Settings::default());

        session
            .handle(Frame::Settings(SettingsFrame {
                ack: false,
                settings: Settings::new().max_frame_size(32768).to_settings(),
            }))
            .unwrap();
        session
            .handle(Frame::Settings(SettingsFrame {
                ack: false,
                settings: Settings::new().max_concurrent_streams(10).to_settings(),
            }))
            .unwrap();

        let remote = session.remote_settings();
        assert_eq!(remote.max_frame_size, Some(32768));
        assert_eq!(remote.max_concurrent_streams, Some(10));
    }

    #[test]
    fn test_initial_window_change_shifts_stream_windows() {
        let session = Session::new(MockTransport::new(), Settings::default());
        session.open_stream(1).unwrap();
        assert_eq!(session.stream(1).unwrap().send_window(), 65535);

        session
            .handle(Frame::Settings(SettingsFrame {
                ack: false,
                settings: Settings::new().initial_window_size(100_000).to_settings(),
            }))
            .unwrap();

        assert_eq!(session.stream(1).unwrap().send_window(), 100_000);
    }

    #[test]
    fn test_ping_echoed_as_pong() {
        let session = Session::new(MockTransport::new(), Settings::default());
        session
            .handle(Frame::Ping(PingFrame {
                ack: false,
                data: [1, 2, 3, 4, 5, 6, 7, 8],
            }))
            .unwrap();

        let frames = written_frames(&session);
        assert_eq!(frames.len(), 1);
        match &frames[0] {
            Frame::Ping(f) => {
                assert!(f.ack);
                assert_eq!(f.data, [1, 2, 3, 4, 5, 6, 7, 8]);
            }
            other => panic!("expected PING ack, got {other:?}"),
        }

        // A pong is not echoed back
        clear_output(&session);
        session
            .handle(Frame::Ping(PingFrame {
                ack: true,
                data: [0; 8],
            }))
            .unwrap();
        assert!(written_frames(&session).is_empty());
    }

    #[test]
    fn test_data_accumulates_and_replenishes_windows() {
        let session = Session::new(MockTransport::new(), Settings::default());
        session.handle(headers_frame(1, false, true)).unwrap();
        clear_output(&session);

        session.handle(data_frame(1, b"hello ", false)).unwrap();
        session.handle(data_frame(1, b"world", true)).unwrap();

        let entry = session.stream(1).unwrap();
        assert_eq!(entry.body(), b"hello world");
        assert!(entry.peer_done());

        // Each DATA is acked with connection- and stream-level credit
        let frames = written_frames(&session);
        let updates: Vec<(u32, u32)> = frames
            .iter()
            .map(|f| match f {
                Frame::WindowUpdate(wu) => (wu.stream_id.value(), wu.increment),
                other => panic!("expected WINDOW_UPDATE, got {other:?}"),
            })
            .collect();
        assert_eq!(updates, vec![(0, 6), (1, 6), (0, 5), (1, 5)]);
    }

    #[test]
    fn test_data_for_unknown_stream_rejected() {
        let session = Session::new(MockTransport::new(), Settings::default());
        assert!(matches!(
            session.handle(data_frame(3, b"x", false)),
            Err(SessionError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_data_after_end_stream_rejected() {
        let session = Session::new(MockTransport::new(), Settings::default());
        session.handle(headers_frame(1, true, true)).unwrap();
        assert!(matches!(
            session.handle(data_frame(1, b"x", false)),
            Err(SessionError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_headers_open_stream_and_decode() {
        let session = Session::new(MockTransport::new(), Settings::default());

        let opened = session.handle(headers_frame(1, false, true)).unwrap();
        assert_eq!(opened, Some(StreamId::new(1)));

        let entry = session.stream(1).unwrap();
        assert!(entry.headers_complete());
        assert_eq!(
            entry.headers()[0],
            HeaderField::new(b":method".to_vec(), b"POST".to_vec())
        );

        // Trailers on the same stream do not count as a new open
        let again = session
            .handle(Frame::Headers(HeadersFrame {
                stream_id: StreamId::new(1),
                end_stream: true,
                end_headers: true,
                pad_len: 0,
                priority: None,
                header_block: header_block(&[("grpc-status", "0")]),
            }))
            .unwrap();
        assert_eq!(again, None);
    }

    #[test]
    fn test_header_fragments_decode_when_complete() {
        let session = Session::new(MockTransport::new(), Settings::default());
        let block = header_block(&[(":method", "GET"), (":path", "/x")]);
        let split = block.len() / 2;

        session
            .handle(Frame::Headers(HeadersFrame {
                stream_id: StreamId::new(1),
                end_stream: false,
                end_headers: false,
                pad_len: 0,
                priority: None,
                header_block: block.slice(..split),
            }))
            .unwrap();
        assert!(!session.stream(1).unwrap().headers_complete());
        assert!(session.stream(1).unwrap().headers().is_empty());

        session
            .handle(Frame::Continuation(ContinuationFrame {
                stream_id: StreamId::new(1),
                end_headers: true,
                header_block: block.slice(split..),
            }))
            .unwrap();

        let entry = session.stream(1).unwrap();
        assert!(entry.headers_complete());
        assert_eq!(entry.headers().len(), 2);
    }

    #[test]
    fn test_corrupt_header_block_is_fatal() {
        let session = Session::new(MockTransport::new(), Settings::default());

        // Indexed reference past both tables: decompression state is
        // now desynchronized, so dispatch must surface the error.
        let result = session.handle(Frame::Headers(HeadersFrame {
            stream_id: StreamId::new(1),
            end_stream: false,
            end_headers: true,
            pad_len: 0,
            priority: None,
            header_block: Bytes::from_static(&[0xc6]),
        }));
        assert!(matches!(result, Err(SessionError::Hpack(_))));
    }

    #[test]
    fn test_continuation_guards() {
        let session = Session::new(MockTransport::new(), Settings::default());

        let continuation = |id: u32| {
            Frame::Continuation(ContinuationFrame {
                stream_id: StreamId::new(id),
                end_headers: true,
                header_block: Bytes::from_static(&[0x82]),
            })
        };

        // Unknown stream
        assert!(matches!(
            session.handle(continuation(9)),
            Err(SessionError::ProtocolError(_))
        ));

        // Already header-complete
        session.handle(headers_frame(1, false, true)).unwrap();
        assert!(matches!(
            session.handle(continuation(1)),
            Err(SessionError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_rst_stream_marks_reset() {
        let session = Session::new(MockTransport::new(), Settings::default());
        session.handle(headers_frame(1, false, true)).unwrap();

        session
            .handle(Frame::RstStream(RstStreamFrame {
                stream_id: StreamId::new(1),
                error_code: ErrorCode::Cancel.to_u32(),
            }))
            .unwrap();
        assert!(session.stream(1).unwrap().is_reset());

        // Unknown stream is a protocol error
        assert!(matches!(
            session.handle(Frame::RstStream(RstStreamFrame {
                stream_id: StreamId::new(9),
                error_code: 0,
            })),
            Err(SessionError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_window_update_credits_stream_and_connection() {
        let session = session_with_open_stream(1);

        session.handle(window_update_frame(1, 1000)).unwrap();
        assert_eq!(session.stream(1).unwrap().send_window(), 66535);

        // Connection-level update is always valid
        session.handle(window_update_frame(0, 1000)).unwrap();

        assert!(matches!(
            session.handle(window_update_frame(9, 1)),
            Err(SessionError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_goaway_fails_future_sends() {
        let session = session_with_open_stream(1);

        session
            .handle(Frame::GoAway(GoAwayFrame {
                last_stream_id: StreamId::new(1),
                error_code: ErrorCode::NoError.to_u32(),
                debug_data: Bytes::from_static(b"shutting down"),
            }))
            .unwrap();

        assert_eq!(
            session.goaway().unwrap().debug_data,
            Bytes::from_static(b"shutting down")
        );
        assert!(matches!(
            session.send_data(1, false, b"late"),
            Err(SessionError::ConnectionClosed)
        ));
        assert!(matches!(
            session.open_stream(3),
            Err(SessionError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_handle_all_collects_opened_streams() {
        let session = Session::new(MockTransport::new(), Settings::default());

        let opened = session
            .handle_all(vec![
                Frame::Ping(PingFrame {
                    ack: false,
                    data: [0; 8],
                }),
                headers_frame(1, false, true),
                data_frame(1, b"x", false),
                headers_frame(3, true, true),
            ])
            .unwrap();

        assert_eq!(opened, vec![StreamId::new(1), StreamId::new(3)]);
    }

    // Outbound

    #[test]
    fn test_send_headers_requires_open_stream() {
        let session = Session::new(MockTransport::new(), Settings::default());
        assert!(matches!(
            session.send_headers(1, false, &[HeaderEntry::new(":method", "GET")]),
            Err(SessionError::StreamDoesntExist(1))
        ));
    }

    #[test]
    fn test_send_headers_twice_rejected() {
        let session = Session::new(MockTransport::new(), Settings::default());
        session.open_stream(1).unwrap();

        let headers = [HeaderEntry::new(":method", "GET")];
        session.send_headers(1, false, &headers).unwrap();
        assert!(matches!(
            session.send_headers(1, false, &headers),
            Err(SessionError::HeadersSent(1))
        ));
    }

    #[test]
    fn test_send_headers_fragments_large_blocks() {
        let session = Session::new(MockTransport::new(), Settings::default());
        session.open_stream(1).unwrap();
        // Tiny frame limit to force CONTINUATION fragmentation
        session.shared.lock().remote_settings.max_frame_size = Some(10);

        let headers = [HeaderEntry::new(
            "x-long-header",
            "a value long enough to span several fragments",
        )];
        session.send_headers(1, true, &headers).unwrap();

        let frames = written_frames(&session);
        assert!(frames.len() > 1);

        match &frames[0] {
            Frame::Headers(f) => {
                assert!(f.end_stream);
                assert!(!f.end_headers);
                assert!(f.header_block.len() <= 10);
            }
            other => panic!("expected HEADERS, got {other:?}"),
        }
        for (i, cont) in frames[1..].iter().enumerate() {
            match cont {
                Frame::Continuation(f) => {
                    assert!(f.header_block.len() <= 10);
                    let last = i == frames.len() - 2;
                    assert_eq!(f.end_headers, last);
                }
                other => panic!("expected CONTINUATION, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_send_data_requires_headers_first() {
        let session = Session::new(MockTransport::new(), Settings::default());
        session.open_stream(1).unwrap();
        assert!(matches!(
            session.send_data(1, false, b"body"),
            Err(SessionError::HeadersNotSent(1))
        ));
        assert!(matches!(
            session.send_data(9, false, b"body"),
            Err(SessionError::StreamDoesntExist(9))
        ));
    }

    #[test]
    fn test_send_data_after_end_stream_rejected() {
        let session = session_with_open_stream(1);
        session.send_data(1, true, b"done").unwrap();
        assert!(matches!(
            session.send_data(1, false, b"more"),
            Err(SessionError::StreamClosed(1))
        ));
    }

    #[test]
    fn test_empty_payload_end_stream_sends_empty_frame() {
        let session = session_with_open_stream(1);
        session.send_data(1, true, &[]).unwrap();

        let frames = written_frames(&session);
        assert_eq!(frames.len(), 1);
        match &frames[0] {
            Frame::Data(f) => {
                assert!(f.end_stream);
                assert!(f.data.is_empty());
            }
            other => panic!("expected DATA, got {other:?}"),
        }
        assert!(session.stream(1).unwrap().self_done());

        // Empty payload without end-of-stream is a no-op
        let session2 = session_with_open_stream(3);
        session2.send_data(3, false, &[]).unwrap();
        assert!(written_frames(&session2).is_empty());
    }

    #[test]
    fn test_send_data_chunks_to_frame_limit() {
        let session = session_with_open_stream(1);
        session.shared.lock().remote_settings.max_frame_size = Some(4);

        session.send_data(1, true, b"0123456789").unwrap();

        let frames = written_frames(&session);
        let chunks: Vec<(usize, bool)> = frames
            .iter()
            .map(|f| match f {
                Frame::Data(d) => (d.data.len(), d.end_stream),
                other => panic!("expected DATA, got {other:?}"),
            })
            .collect();
        assert_eq!(chunks, vec![(4, false), (4, false), (2, true)]);
    }

    #[test]
    fn test_send_data_blocks_until_window_replenished() {
        let session = Arc::new(session_with_open_stream(1));
        // Stream window of 5; connection window stays large
        session
            .shared
            .lock()
            .streams
            .get_mut(&1)
            .unwrap()
            .send_window = SendWindow::new(5);

        let sender = {
            let session = Arc::clone(&session);
            std::thread::spawn(move || session.send_data(1, true, b"0123456789ab"))
        };

        // Let the sender exhaust the window and park; in-flight bytes
        // never exceed the advertised credit.
        std::thread::sleep(Duration::from_millis(100));
        {
            let frames = written_frames(&session);
            let sent: usize = frames
                .iter()
                .map(|f| match f {
                    Frame::Data(d) => d.data.len(),
                    other => panic!("expected DATA, got {other:?}"),
                })
                .sum();
            assert_eq!(sent, 5);
        }

        session.handle(window_update_frame(1, 5)).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        session.handle(window_update_frame(1, 5)).unwrap();

        sender.join().unwrap().unwrap();

        let frames = written_frames(&session);
        let chunks: Vec<(usize, bool)> = frames
            .iter()
            .filter_map(|f| match f {
                Frame::Data(d) => Some((d.data.len(), d.end_stream)),
                _ => None,
            })
            .collect();
        assert_eq!(chunks, vec![(5, false), (5, false), (2, true)]);
    }

    #[test]
    fn test_blocked_send_fails_on_reset() {
        let session = Arc::new(session_with_open_stream(1));
        session
            .shared
            .lock()
            .streams
            .get_mut(&1)
            .unwrap()
            .send_window = SendWindow::new(0);

        let sender = {
            let session = Arc::clone(&session);
            std::thread::spawn(move || session.send_data(1, true, b"stuck"))
        };

        std::thread::sleep(Duration::from_millis(100));
        session
            .handle(Frame::RstStream(RstStreamFrame {
                stream_id: StreamId::new(1),
                error_code: ErrorCode::Cancel.to_u32(),
            }))
            .unwrap();

        assert!(matches!(
            sender.join().unwrap(),
            Err(SessionError::StreamClosed(1))
        ));
    }

    #[test]
    fn test_blocked_send_fails_on_goaway() {
        let session = Arc::new(session_with_open_stream(1));
        session
            .shared
            .lock()
            .streams
            .get_mut(&1)
            .unwrap()
            .send_window = SendWindow::new(0);

        let sender = {
            let session = Arc::clone(&session);
            std::thread::spawn(move || session.send_data(1, true, b"stuck"))
        };

        std::thread::sleep(Duration::from_millis(100));
        session
            .handle(Frame::GoAway(GoAwayFrame {
                last_stream_id: StreamId::new(0),
                error_code: ErrorCode::NoError.to_u32(),
                debug_data: Bytes::new(),
            }))
            .unwrap();

        assert!(matches!(
            sender.join().unwrap(),
            Err(SessionError::ConnectionClosed)
        ));
    }

    // Control emitters

    #[test]
    fn test_rst_stream_wire_format() {
        let session = session_with_open_stream(1);
        session.send_rst_stream(1, ErrorCode::Cancel).unwrap();

        assert!(session.stream(1).unwrap().is_reset());
        let out = session.transport.output.lock().clone();
        // Type byte of the frame header
        assert_eq!(out[3], 0x03);
    }

    #[test]
    fn test_ping_and_pong_emitters() {
        let session = Session::new(MockTransport::new(), Settings::default());
        session.send_ping([7; 8]).unwrap();
        session.send_pong([8; 8]).unwrap();

        let frames = written_frames(&session);
        match (&frames[0], &frames[1]) {
            (Frame::Ping(ping), Frame::Ping(pong)) => {
                assert!(!ping.ack);
                assert_eq!(ping.data, [7; 8]);
                assert!(pong.ack);
                assert_eq!(pong.data, [8; 8]);
            }
            other => panic!("expected two PINGs, got {other:?}"),
        }
    }

    // Stream access and disposal

    #[test]
    fn test_take_stream_removes_entry() {
        let session = Session::new(MockTransport::new(), Settings::default());
        session.handle(headers_frame(1, true, true)).unwrap();

        let entry = session.take_stream(1).unwrap();
        assert!(entry.peer_done());
        assert!(session.stream(1).is_none());
    }

    #[test]
    fn test_reap_only_removes_complete_streams() {
        let session = session_with_open_stream(1);
        assert!(!session.reap(1));

        session.send_data(1, true, b"done").unwrap();
        assert!(!session.reap(1)); // peer direction still open

        session.handle(data_frame(1, b"reply", true)).unwrap();
        assert!(session.reap(1));
        assert!(session.stream(1).is_none());
    }

    #[test]
    fn test_close_sends_goaway_and_shuts_transport() {
        let session = Session::new(MockTransport::new(), Settings::default());
        session.handle(headers_frame(5, true, true)).unwrap();
        session.close().unwrap();

        let frames = written_frames(&session);
        let goaway = frames
            .iter()
            .find_map(|f| match f {
                Frame::GoAway(g) => Some(g),
                _ => None,
            })
            .expect("close should emit GOAWAY");
        assert_eq!(goaway.error_code, ErrorCode::NoError.to_u32());
        assert_eq!(goaway.last_stream_id.value(), 5);
        assert!(session.transport.closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_close_skips_goaway_after_peer_goaway() {
        let session = Session::new(MockTransport::new(), Settings::default());
        session
            .handle(Frame::GoAway(GoAwayFrame {
                last_stream_id: StreamId::new(0),
                error_code: 0,
                debug_data: Bytes::new(),
            }))
            .unwrap();
        session.close().unwrap();

        assert!(written_frames(&session).is_empty());
        assert!(session.transport.closed.load(Ordering::SeqCst));
    }
}
