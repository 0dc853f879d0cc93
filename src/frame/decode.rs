//! Frame decoding: wire bytes to typed frames.

use bytes::{Buf, Bytes, BytesMut};

use super::error::FrameError;
use super::types::*;
use super::{DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE, flags};

/// Incremental frame decoder.
///
/// Feed it a buffer of received bytes; it peels off one complete frame
/// at a time and leaves any trailing partial frame in place.
pub struct FrameDecoder {
    max_frame_size: u32,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Raise or lower the frame size limit, normally after a SETTINGS
    /// exchange changes the advertised MAX_FRAME_SIZE. Capped at what
    /// the 24-bit length field can express.
    pub fn set_max_frame_size(&mut self, size: u32) {
        self.max_frame_size = size.min(super::MAX_FRAME_SIZE);
    }

    /// Decode one frame from the front of `buf`.
    ///
    /// Returns `Ok(Some(frame))` when a complete frame was consumed,
    /// `Ok(None)` when more bytes are needed, and `Err` on a malformed
    /// or oversized frame. On `Ok(None)` the buffer is untouched.
    pub fn decode(&self, buf: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let header = peek_header(buf);

        if header.length > self.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size: header.length,
                max: self.max_frame_size,
            });
        }

        let total_len = FRAME_HEADER_SIZE + header.length as usize;
        if buf.len() < total_len {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(header.length as usize).freeze();

        parse_frame(header, payload).map(Some)
    }

    /// Decode every complete frame in `buf`.
    ///
    /// A single read from the peer may carry several frames back to
    /// back, or end mid-frame; this walks the buffer and returns the
    /// complete prefix as typed frames, leaving the remainder for the
    /// next read. Errors abandon the walk at the offending frame.
    pub fn decode_all(&self, buf: &mut BytesMut) -> Result<Vec<Frame>, FrameError> {
        let mut frames = Vec::new();
        while let Some(frame) = self.decode(buf)? {
            frames.push(frame);
        }
        Ok(frames)
    }
}

/// Read the 9-byte header at the front of `buf` without consuming it.
fn peek_header(buf: &[u8]) -> FrameHeader {
    debug_assert!(buf.len() >= FRAME_HEADER_SIZE);

    // 24-bit length, 8-bit type, 8-bit flags, 31-bit stream id (high
    // bit reserved), all big-endian.
    let length = ((buf[0] as u32) << 16) | ((buf[1] as u32) << 8) | (buf[2] as u32);
    let frame_type = buf[3];
    let flags = buf[4];
    let stream_id = StreamId::new(
        ((buf[5] as u32) << 24)
            | ((buf[6] as u32) << 16)
            | ((buf[7] as u32) << 8)
            | (buf[8] as u32),
    );

    FrameHeader {
        length,
        frame_type,
        flags,
        stream_id,
    }
}

fn parse_frame(header: FrameHeader, payload: Bytes) -> Result<Frame, FrameError> {
    match FrameType::from_u8(header.frame_type) {
        Some(FrameType::Data) => parse_data(header, payload),
        Some(FrameType::Headers) => parse_headers(header, payload),
        Some(FrameType::Priority) => parse_priority(header, payload),
        Some(FrameType::RstStream) => parse_rst_stream(header, payload),
        Some(FrameType::Settings) => parse_settings(header, payload),
        Some(FrameType::PushPromise) => parse_push_promise(header, payload),
        Some(FrameType::Ping) => parse_ping(header, payload),
        Some(FrameType::GoAway) => parse_goaway(header, payload),
        Some(FrameType::WindowUpdate) => parse_window_update(header, payload),
        Some(FrameType::Continuation) => parse_continuation(header, payload),
        // Unknown types are surfaced rather than dropped so the
        // session can decide what to do with them.
        None => Ok(Frame::Unknown(UnknownFrame {
            frame_type: header.frame_type,
            flags: header.flags,
            stream_id: header.stream_id,
            payload,
        })),
    }
}

fn parse_data(header: FrameHeader, payload: Bytes) -> Result<Frame, FrameError> {
    if header.stream_id.is_connection_level() {
        return Err(FrameError::StreamIdRequired {
            frame_type: header.frame_type,
        });
    }

    let end_stream = header.has_flag(flags::END_STREAM);

    let (pad_len, data) = if header.has_flag(flags::PADDED) {
        strip_padding(payload)?
    } else {
        (0, payload)
    };

    Ok(Frame::Data(DataFrame {
        stream_id: header.stream_id,
        end_stream,
        pad_len,
        data,
    }))
}

fn parse_headers(header: FrameHeader, payload: Bytes) -> Result<Frame, FrameError> {
    if header.stream_id.is_connection_level() {
        return Err(FrameError::StreamIdRequired {
            frame_type: header.frame_type,
        });
    }

    let end_stream = header.has_flag(flags::END_STREAM);
    let end_headers = header.has_flag(flags::END_HEADERS);

    let (pad_len, mut payload) = if header.has_flag(flags::PADDED) {
        strip_padding(payload)?
    } else {
        (0, payload)
    };

    let priority = if header.has_flag(flags::PRIORITY) {
        if payload.len() < 5 {
            return Err(FrameError::InvalidPayloadLength {
                frame_type: header.frame_type,
                expected: 5,
                actual: payload.len(),
            });
        }
        Some(read_priority(&mut payload))
    } else {
        None
    };

    Ok(Frame::Headers(HeadersFrame {
        stream_id: header.stream_id,
        end_stream,
        end_headers,
        pad_len,
        priority,
        header_block: payload,
    }))
}

fn read_priority(payload: &mut Bytes) -> Priority {
    let first = payload.get_u32();
    Priority {
        exclusive: (first & 0x8000_0000) != 0,
        dependency: StreamId::new(first & 0x7FFF_FFFF),
        weight: payload.get_u8(),
    }
}

fn parse_priority(header: FrameHeader, mut payload: Bytes) -> Result<Frame, FrameError> {
    if header.stream_id.is_connection_level() {
        return Err(FrameError::StreamIdRequired {
            frame_type: header.frame_type,
        });
    }

    if payload.len() != 5 {
        return Err(FrameError::InvalidPayloadLength {
            frame_type: header.frame_type,
            expected: 5,
            actual: payload.len(),
        });
    }

    Ok(Frame::Priority(PriorityFrame {
        stream_id: header.stream_id,
        priority: read_priority(&mut payload),
    }))
}

fn parse_rst_stream(header: FrameHeader, mut payload: Bytes) -> Result<Frame, FrameError> {
    if header.stream_id.is_connection_level() {
        return Err(FrameError::StreamIdRequired {
            frame_type: header.frame_type,
        });
    }

    if payload.len() != 4 {
        return Err(FrameError::InvalidPayloadLength {
            frame_type: header.frame_type,
            expected: 4,
            actual: payload.len(),
        });
    }

    Ok(Frame::RstStream(RstStreamFrame {
        stream_id: header.stream_id,
        error_code: payload.get_u32(),
    }))
}

fn parse_settings(header: FrameHeader, mut payload: Bytes) -> Result<Frame, FrameError> {
    if !header.stream_id.is_connection_level() {
        return Err(FrameError::InvalidStreamZero {
            frame_type: header.frame_type,
        });
    }

    let ack = header.has_flag(flags::ACK);

    // An acknowledgment carries no parameters.
    if ack && !payload.is_empty() {
        return Err(FrameError::InvalidPayloadLength {
            frame_type: header.frame_type,
            expected: 0,
            actual: payload.len(),
        });
    }

    if !payload.len().is_multiple_of(6) {
        return Err(FrameError::InvalidPayloadLength {
            frame_type: header.frame_type,
            expected: (payload.len() / 6) * 6,
            actual: payload.len(),
        });
    }

    let mut settings = Vec::with_capacity(payload.len() / 6);
    while payload.has_remaining() {
        let id = SettingId::from_u16(payload.get_u16());
        let value = payload.get_u32();
        validate_setting(id, value)?;
        settings.push(Setting { id, value });
    }

    Ok(Frame::Settings(SettingsFrame { ack, settings }))
}

fn validate_setting(id: SettingId, value: u32) -> Result<(), FrameError> {
    let ok = match id {
        SettingId::EnablePush => value <= 1,
        SettingId::InitialWindowSize => value <= 0x7FFF_FFFF,
        SettingId::MaxFrameSize => (16_384..=16_777_215).contains(&value),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(FrameError::InvalidSettingValue {
            id: id.to_u16(),
            value,
        })
    }
}

fn parse_push_promise(header: FrameHeader, payload: Bytes) -> Result<Frame, FrameError> {
    if header.stream_id.is_connection_level() {
        return Err(FrameError::StreamIdRequired {
            frame_type: header.frame_type,
        });
    }

    let end_headers = header.has_flag(flags::END_HEADERS);

    let (_, mut payload) = if header.has_flag(flags::PADDED) {
        strip_padding(payload)?
    } else {
        (0, payload)
    };

    if payload.len() < 4 {
        return Err(FrameError::InvalidPayloadLength {
            frame_type: header.frame_type,
            expected: 4,
            actual: payload.len(),
        });
    }

    let promised_stream_id = StreamId::new(payload.get_u32() & 0x7FFF_FFFF);

    Ok(Frame::PushPromise(PushPromiseFrame {
        stream_id: header.stream_id,
        end_headers,
        promised_stream_id,
        header_block: payload,
    }))
}

fn parse_ping(header: FrameHeader, payload: Bytes) -> Result<Frame, FrameError> {
    if !header.stream_id.is_connection_level() {
        return Err(FrameError::InvalidStreamZero {
            frame_type: header.frame_type,
        });
    }

    if payload.len() != 8 {
        return Err(FrameError::InvalidPayloadLength {
            frame_type: header.frame_type,
            expected: 8,
            actual: payload.len(),
        });
    }

    let mut data = [0u8; 8];
    data.copy_from_slice(&payload[..8]);

    Ok(Frame::Ping(PingFrame {
        ack: header.has_flag(flags::ACK),
        data,
    }))
}

fn parse_goaway(header: FrameHeader, mut payload: Bytes) -> Result<Frame, FrameError> {
    if !header.stream_id.is_connection_level() {
        return Err(FrameError::InvalidStreamZero {
            frame_type: header.frame_type,
        });
    }

    if payload.len() < 8 {
        return Err(FrameError::InvalidPayloadLength {
            frame_type: header.frame_type,
            expected: 8,
            actual: payload.len(),
        });
    }

    let last_stream_id = StreamId::new(payload.get_u32() & 0x7FFF_FFFF);
    let error_code = payload.get_u32();

    Ok(Frame::GoAway(GoAwayFrame {
        last_stream_id,
        error_code,
        debug_data: payload,
    }))
}

fn parse_window_update(header: FrameHeader, mut payload: Bytes) -> Result<Frame, FrameError> {
    if payload.len() != 4 {
        return Err(FrameError::InvalidPayloadLength {
            frame_type: header.frame_type,
            expected: 4,
            actual: payload.len(),
        });
    }

    let increment = payload.get_u32() & 0x7FFF_FFFF;

    if increment == 0 {
        return Err(FrameError::InvalidWindowIncrement { increment });
    }

    Ok(Frame::WindowUpdate(WindowUpdateFrame {
        stream_id: header.stream_id,
        increment,
    }))
}

fn parse_continuation(header: FrameHeader, payload: Bytes) -> Result<Frame, FrameError> {
    if header.stream_id.is_connection_level() {
        return Err(FrameError::StreamIdRequired {
            frame_type: header.frame_type,
        });
    }

    Ok(Frame::Continuation(ContinuationFrame {
        stream_id: header.stream_id,
        end_headers: header.has_flag(flags::END_HEADERS),
        header_block: payload,
    }))
}

/// Strip the pad-length prefix and trailing pad bytes from a PADDED
/// payload, returning the recorded pad length and the useful bytes.
fn strip_padding(mut payload: Bytes) -> Result<(u8, Bytes), FrameError> {
    if payload.is_empty() {
        return Err(FrameError::InvalidPadding {
            pad_length: 0,
            payload_length: 0,
        });
    }

    let pad_length = payload.get_u8();

    // The pad bytes must fit in what remains after the length byte.
    if pad_length as usize >= payload.len() {
        return Err(FrameError::InvalidPadding {
            pad_length,
            payload_length: payload.len() + 1,
        });
    }

    let data_len = payload.len() - pad_length as usize;
    Ok((pad_length, payload.slice(..data_len)))
}
