//! Frame encoding: typed frames to wire bytes.

use bytes::{BufMut, BytesMut};

use super::types::*;
use super::{FRAME_HEADER_SIZE, flags};

/// Frame encoder that writes typed frames into a byte buffer.
pub struct FrameEncoder {
    max_frame_size: u32,
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self {
            max_frame_size: super::DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Set the maximum frame size the peer will accept. Capped at what
    /// the 24-bit length field can express.
    pub fn set_max_frame_size(&mut self, size: u32) {
        self.max_frame_size = size.min(super::MAX_FRAME_SIZE);
    }

    pub fn max_frame_size(&self) -> u32 {
        self.max_frame_size
    }

    /// Encode a frame to the buffer.
    pub fn encode(&self, frame: &Frame, buf: &mut BytesMut) {
        match frame {
            Frame::Data(f) => self.encode_data(f, buf),
            Frame::Headers(f) => self.encode_headers(f, buf),
            Frame::Priority(f) => self.encode_priority(f, buf),
            Frame::RstStream(f) => self.encode_rst_stream(f, buf),
            Frame::Settings(f) => self.encode_settings(f, buf),
            Frame::PushPromise(f) => self.encode_push_promise(f, buf),
            Frame::Ping(f) => self.encode_ping(f, buf),
            Frame::GoAway(f) => self.encode_goaway(f, buf),
            Frame::WindowUpdate(f) => self.encode_window_update(f, buf),
            Frame::Continuation(f) => self.encode_continuation(f, buf),
            Frame::Unknown(f) => self.encode_unknown(f, buf),
        }
    }

    /// Write a 9-byte frame header.
    #[inline]
    fn write_header(
        &self,
        buf: &mut BytesMut,
        length: u32,
        frame_type: FrameType,
        flags: u8,
        stream_id: StreamId,
    ) {
        // 24-bit length, big-endian
        buf.put_u8((length >> 16) as u8);
        buf.put_u8((length >> 8) as u8);
        buf.put_u8(length as u8);

        buf.put_u8(frame_type as u8);
        buf.put_u8(flags);

        // 31-bit stream id, high bit reserved
        buf.put_u32(stream_id.value() & 0x7FFF_FFFF);
    }

    fn encode_data(&self, frame: &DataFrame, buf: &mut BytesMut) {
        let mut frame_flags = 0u8;
        if frame.end_stream {
            frame_flags |= flags::END_STREAM;
        }

        let mut length = frame.data.len() as u32;
        if frame.pad_len > 0 {
            frame_flags |= flags::PADDED;
            length += 1 + frame.pad_len as u32;
        }

        buf.reserve(FRAME_HEADER_SIZE + length as usize);
        self.write_header(buf, length, FrameType::Data, frame_flags, frame.stream_id);

        if frame.pad_len > 0 {
            buf.put_u8(frame.pad_len);
        }
        buf.extend_from_slice(&frame.data);
        buf.put_bytes(0, frame.pad_len as usize);
    }

    fn encode_headers(&self, frame: &HeadersFrame, buf: &mut BytesMut) {
        let mut frame_flags = 0u8;
        if frame.end_stream {
            frame_flags |= flags::END_STREAM;
        }
        if frame.end_headers {
            frame_flags |= flags::END_HEADERS;
        }
        if frame.priority.is_some() {
            frame_flags |= flags::PRIORITY;
        }

        let priority_len: u32 = if frame.priority.is_some() { 5 } else { 0 };
        let mut length = priority_len + frame.header_block.len() as u32;
        if frame.pad_len > 0 {
            frame_flags |= flags::PADDED;
            length += 1 + frame.pad_len as u32;
        }

        buf.reserve(FRAME_HEADER_SIZE + length as usize);
        self.write_header(
            buf,
            length,
            FrameType::Headers,
            frame_flags,
            frame.stream_id,
        );

        // Pad length precedes the priority block and the fragment.
        if frame.pad_len > 0 {
            buf.put_u8(frame.pad_len);
        }

        if let Some(priority) = &frame.priority {
            write_priority(buf, priority);
        }

        buf.extend_from_slice(&frame.header_block);
        buf.put_bytes(0, frame.pad_len as usize);
    }

    fn encode_priority(&self, frame: &PriorityFrame, buf: &mut BytesMut) {
        buf.reserve(FRAME_HEADER_SIZE + 5);
        self.write_header(buf, 5, FrameType::Priority, 0, frame.stream_id);
        write_priority(buf, &frame.priority);
    }

    fn encode_rst_stream(&self, frame: &RstStreamFrame, buf: &mut BytesMut) {
        buf.reserve(FRAME_HEADER_SIZE + 4);
        self.write_header(buf, 4, FrameType::RstStream, 0, frame.stream_id);
        buf.put_u32(frame.error_code);
    }

    fn encode_settings(&self, frame: &SettingsFrame, buf: &mut BytesMut) {
        let frame_flags = if frame.ack { flags::ACK } else { 0 };
        let length = if frame.ack {
            0
        } else {
            (frame.settings.len() * 6) as u32
        };

        buf.reserve(FRAME_HEADER_SIZE + length as usize);
        self.write_header(
            buf,
            length,
            FrameType::Settings,
            frame_flags,
            StreamId::CONNECTION,
        );

        if !frame.ack {
            for setting in &frame.settings {
                buf.put_u16(setting.id.to_u16());
                buf.put_u32(setting.value);
            }
        }
    }

    fn encode_push_promise(&self, frame: &PushPromiseFrame, buf: &mut BytesMut) {
        let mut frame_flags = 0u8;
        if frame.end_headers {
            frame_flags |= flags::END_HEADERS;
        }

        let length = 4 + frame.header_block.len() as u32;

        buf.reserve(FRAME_HEADER_SIZE + length as usize);
        self.write_header(
            buf,
            length,
            FrameType::PushPromise,
            frame_flags,
            frame.stream_id,
        );

        buf.put_u32(frame.promised_stream_id.value() & 0x7FFF_FFFF);
        buf.extend_from_slice(&frame.header_block);
    }

    fn encode_ping(&self, frame: &PingFrame, buf: &mut BytesMut) {
        let frame_flags = if frame.ack { flags::ACK } else { 0 };

        buf.reserve(FRAME_HEADER_SIZE + 8);
        self.write_header(buf, 8, FrameType::Ping, frame_flags, StreamId::CONNECTION);
        buf.extend_from_slice(&frame.data);
    }

    fn encode_goaway(&self, frame: &GoAwayFrame, buf: &mut BytesMut) {
        let length = 8 + frame.debug_data.len() as u32;

        buf.reserve(FRAME_HEADER_SIZE + length as usize);
        self.write_header(buf, length, FrameType::GoAway, 0, StreamId::CONNECTION);

        buf.put_u32(frame.last_stream_id.value() & 0x7FFF_FFFF);
        buf.put_u32(frame.error_code);
        buf.extend_from_slice(&frame.debug_data);
    }

    fn encode_window_update(&self, frame: &WindowUpdateFrame, buf: &mut BytesMut) {
        buf.reserve(FRAME_HEADER_SIZE + 4);
        self.write_header(buf, 4, FrameType::WindowUpdate, 0, frame.stream_id);
        buf.put_u32(frame.increment & 0x7FFF_FFFF);
    }

    fn encode_continuation(&self, frame: &ContinuationFrame, buf: &mut BytesMut) {
        let mut frame_flags = 0u8;
        if frame.end_headers {
            frame_flags |= flags::END_HEADERS;
        }

        let length = frame.header_block.len() as u32;

        buf.reserve(FRAME_HEADER_SIZE + length as usize);
        self.write_header(
            buf,
            length,
            FrameType::Continuation,
            frame_flags,
            frame.stream_id,
        );

        buf.extend_from_slice(&frame.header_block);
    }

    fn encode_unknown(&self, frame: &UnknownFrame, buf: &mut BytesMut) {
        let length = frame.payload.len() as u32;

        buf.reserve(FRAME_HEADER_SIZE + length as usize);

        // The type byte is raw here, so the header is written by hand.
        buf.put_u8((length >> 16) as u8);
        buf.put_u8((length >> 8) as u8);
        buf.put_u8(length as u8);
        buf.put_u8(frame.frame_type);
        buf.put_u8(frame.flags);
        buf.put_u32(frame.stream_id.value() & 0x7FFF_FFFF);

        buf.extend_from_slice(&frame.payload);
    }
}

fn write_priority(buf: &mut BytesMut, priority: &Priority) {
    let mut dep = priority.dependency.value();
    if priority.exclusive {
        dep |= 0x8000_0000;
    }
    buf.put_u32(dep);
    buf.put_u8(priority.weight);
}

/// Shorthand emitters for the control frames the session sends often.
impl FrameEncoder {
    /// Write the 24-byte connection preface.
    pub fn encode_connection_preface(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(super::CONNECTION_PREFACE);
    }

    /// Write a SETTINGS frame advertising the given parameters.
    pub fn write_settings(&self, settings: &[Setting], buf: &mut BytesMut) {
        let frame = SettingsFrame {
            ack: false,
            settings: settings.to_vec(),
        };
        self.encode(&Frame::Settings(frame), buf);
    }

    /// Write an empty SETTINGS acknowledgment.
    pub fn encode_settings_ack(&self, buf: &mut BytesMut) {
        let frame = SettingsFrame {
            ack: true,
            settings: Vec::new(),
        };
        self.encode(&Frame::Settings(frame), buf);
    }

    /// Write a PING acknowledgment echoing `data`.
    pub fn encode_ping_ack(&self, data: [u8; 8], buf: &mut BytesMut) {
        let frame = PingFrame { ack: true, data };
        self.encode(&Frame::Ping(frame), buf);
    }

    pub fn write_window_update(&self, stream_id: StreamId, increment: u32, buf: &mut BytesMut) {
        let frame = WindowUpdateFrame {
            stream_id,
            increment,
        };
        self.encode(&Frame::WindowUpdate(frame), buf);
    }

    pub fn write_rst_stream(&self, stream_id: StreamId, error_code: u32, buf: &mut BytesMut) {
        let frame = RstStreamFrame {
            stream_id,
            error_code,
        };
        self.encode(&Frame::RstStream(frame), buf);
    }

    pub fn write_goaway(
        &self,
        last_stream_id: StreamId,
        error_code: u32,
        debug_data: &[u8],
        buf: &mut BytesMut,
    ) {
        let frame = GoAwayFrame {
            last_stream_id,
            error_code,
            debug_data: bytes::Bytes::copy_from_slice(debug_data),
        };
        self.encode(&Frame::GoAway(frame), buf);
    }
}
