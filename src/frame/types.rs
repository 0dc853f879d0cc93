//! Frame type definitions for the HTTP/2 wire protocol.

use bytes::Bytes;

/// Frame types (RFC 7540 Section 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Data = 0x0,
    Headers = 0x1,
    Priority = 0x2,
    RstStream = 0x3,
    Settings = 0x4,
    PushPromise = 0x5,
    Ping = 0x6,
    GoAway = 0x7,
    WindowUpdate = 0x8,
    Continuation = 0x9,
}

impl FrameType {
    /// Classify a wire type byte. Types above 0x9 are unknown and
    /// must be ignored by receivers.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x0 => Some(FrameType::Data),
            0x1 => Some(FrameType::Headers),
            0x2 => Some(FrameType::Priority),
            0x3 => Some(FrameType::RstStream),
            0x4 => Some(FrameType::Settings),
            0x5 => Some(FrameType::PushPromise),
            0x6 => Some(FrameType::Ping),
            0x7 => Some(FrameType::GoAway),
            0x8 => Some(FrameType::WindowUpdate),
            0x9 => Some(FrameType::Continuation),
            _ => None,
        }
    }
}

/// Frame flag bits.
pub mod flags {
    /// DATA/HEADERS: last frame the sender will send on this stream.
    pub const END_STREAM: u8 = 0x1;
    /// SETTINGS/PING: this frame acknowledges a previous one.
    pub const ACK: u8 = 0x1;
    /// HEADERS/CONTINUATION: last fragment of the header block.
    pub const END_HEADERS: u8 = 0x4;
    /// DATA/HEADERS: payload is followed by padding, length-prefixed.
    pub const PADDED: u8 = 0x8;
    /// HEADERS: a 5-byte priority block precedes the header fragment.
    pub const PRIORITY: u8 = 0x20;
}

/// Stream identifier: 31 bits, the high bit is reserved on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StreamId(pub u32);

impl StreamId {
    /// Stream 0, addressing the connection itself.
    pub const CONNECTION: StreamId = StreamId(0);

    /// Create a stream ID, masking off the reserved bit.
    #[inline]
    pub fn new(id: u32) -> Self {
        StreamId(id & 0x7FFF_FFFF)
    }

    #[inline]
    pub fn value(self) -> u32 {
        self.0
    }

    /// Whether this addresses the connection rather than a stream.
    #[inline]
    pub fn is_connection_level(self) -> bool {
        self.0 == 0
    }

    /// Client-initiated streams are odd-numbered.
    #[inline]
    pub fn is_client_initiated(self) -> bool {
        self.0 % 2 == 1
    }

    /// Server-initiated streams are even-numbered and non-zero.
    #[inline]
    pub fn is_server_initiated(self) -> bool {
        self.0 != 0 && self.0 % 2 == 0
    }
}

impl From<u32> for StreamId {
    fn from(id: u32) -> Self {
        StreamId::new(id)
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed 9-byte header preceding every frame payload.
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    /// Payload length (24 bits on the wire).
    pub length: u32,
    /// Raw frame type byte.
    pub frame_type: u8,
    /// Flag bits.
    pub flags: u8,
    /// Addressed stream.
    pub stream_id: StreamId,
}

impl FrameHeader {
    pub fn new(frame_type: FrameType, flags: u8, stream_id: StreamId, length: u32) -> Self {
        Self {
            length,
            frame_type: frame_type as u8,
            flags,
            stream_id,
        }
    }

    /// The frame type, if it is one we know.
    pub fn get_type(&self) -> Option<FrameType> {
        FrameType::from_u8(self.frame_type)
    }

    #[inline]
    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

/// A fully parsed frame.
#[derive(Debug, Clone)]
pub enum Frame {
    Data(DataFrame),
    Headers(HeadersFrame),
    Priority(PriorityFrame),
    RstStream(RstStreamFrame),
    Settings(SettingsFrame),
    PushPromise(PushPromiseFrame),
    Ping(PingFrame),
    GoAway(GoAwayFrame),
    WindowUpdate(WindowUpdateFrame),
    Continuation(ContinuationFrame),
    /// Unrecognized frame type, carried opaquely.
    Unknown(UnknownFrame),
}

impl Frame {
    /// The stream this frame addresses (0 for connection-level frames).
    pub fn stream_id(&self) -> StreamId {
        match self {
            Frame::Data(f) => f.stream_id,
            Frame::Headers(f) => f.stream_id,
            Frame::Priority(f) => f.stream_id,
            Frame::RstStream(f) => f.stream_id,
            Frame::Settings(_) => StreamId::CONNECTION,
            Frame::PushPromise(f) => f.stream_id,
            Frame::Ping(_) => StreamId::CONNECTION,
            Frame::GoAway(_) => StreamId::CONNECTION,
            Frame::WindowUpdate(f) => f.stream_id,
            Frame::Continuation(f) => f.stream_id,
            Frame::Unknown(f) => f.stream_id,
        }
    }
}

/// DATA frame (type=0x0).
///
/// `pad_len` records how many padding bytes followed the payload on the
/// wire; the padding itself is validated and discarded on decode, and
/// re-emitted as zeros on encode.
#[derive(Debug, Clone)]
pub struct DataFrame {
    pub stream_id: StreamId,
    pub end_stream: bool,
    pub pad_len: u8,
    pub data: Bytes,
}

/// HEADERS frame (type=0x1).
#[derive(Debug, Clone)]
pub struct HeadersFrame {
    pub stream_id: StreamId,
    pub end_stream: bool,
    pub end_headers: bool,
    pub pad_len: u8,
    pub priority: Option<Priority>,
    /// Compressed header block fragment.
    pub header_block: Bytes,
}

/// The 5-byte priority block carried by PRIORITY frames and
/// priority-flagged HEADERS frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority {
    /// Exclusive dependency bit.
    pub exclusive: bool,
    /// Stream this one depends on.
    pub dependency: StreamId,
    /// Weight minus one (wire value 0-255 means weight 1-256).
    pub weight: u8,
}

/// PRIORITY frame (type=0x2).
#[derive(Debug, Clone, Copy)]
pub struct PriorityFrame {
    pub stream_id: StreamId,
    pub priority: Priority,
}

/// RST_STREAM frame (type=0x3).
#[derive(Debug, Clone, Copy)]
pub struct RstStreamFrame {
    pub stream_id: StreamId,
    pub error_code: u32,
}

/// SETTINGS frame (type=0x4).
#[derive(Debug, Clone)]
pub struct SettingsFrame {
    pub ack: bool,
    pub settings: Vec<Setting>,
}

/// One id/value record in a SETTINGS payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    pub id: SettingId,
    pub value: u32,
}

/// Setting parameter identifiers (RFC 7540 Section 6.5.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingId {
    HeaderTableSize,
    EnablePush,
    MaxConcurrentStreams,
    InitialWindowSize,
    MaxFrameSize,
    MaxHeaderListSize,
    /// Identifier we do not recognize; ignored but preserved.
    Unknown(u16),
}

impl SettingId {
    pub fn from_u16(id: u16) -> Self {
        match id {
            0x1 => SettingId::HeaderTableSize,
            0x2 => SettingId::EnablePush,
            0x3 => SettingId::MaxConcurrentStreams,
            0x4 => SettingId::InitialWindowSize,
            0x5 => SettingId::MaxFrameSize,
            0x6 => SettingId::MaxHeaderListSize,
            _ => SettingId::Unknown(id),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            SettingId::HeaderTableSize => 0x1,
            SettingId::EnablePush => 0x2,
            SettingId::MaxConcurrentStreams => 0x3,
            SettingId::InitialWindowSize => 0x4,
            SettingId::MaxFrameSize => 0x5,
            SettingId::MaxHeaderListSize => 0x6,
            SettingId::Unknown(id) => id,
        }
    }
}

/// PUSH_PROMISE frame (type=0x5).
#[derive(Debug, Clone)]
pub struct PushPromiseFrame {
    pub stream_id: StreamId,
    pub end_headers: bool,
    pub promised_stream_id: StreamId,
    /// Compressed header block fragment.
    pub header_block: Bytes,
}

/// PING frame (type=0x6). The 8 data bytes are opaque and echoed
/// verbatim in the acknowledgment.
#[derive(Debug, Clone, Copy)]
pub struct PingFrame {
    pub ack: bool,
    pub data: [u8; 8],
}

/// GOAWAY frame (type=0x7).
#[derive(Debug, Clone)]
pub struct GoAwayFrame {
    pub last_stream_id: StreamId,
    pub error_code: u32,
    /// Opaque diagnostic bytes trailing the fixed fields.
    pub debug_data: Bytes,
}

/// WINDOW_UPDATE frame (type=0x8).
#[derive(Debug, Clone, Copy)]
pub struct WindowUpdateFrame {
    pub stream_id: StreamId,
    pub increment: u32,
}

/// CONTINUATION frame (type=0x9).
#[derive(Debug, Clone)]
pub struct ContinuationFrame {
    pub stream_id: StreamId,
    pub end_headers: bool,
    /// Compressed header block fragment.
    pub header_block: Bytes,
}

/// Frame of a type we do not implement.
#[derive(Debug, Clone)]
pub struct UnknownFrame {
    pub frame_type: u8,
    pub flags: u8,
    pub stream_id: StreamId,
    pub payload: Bytes,
}
