//! Frame codec: parsing and serialization of wire frames.
//!
//! Every frame starts with the same 9-byte header:
//! ```text
//! +-----------------------------------------------+
//! |                 Length (24)                   |
//! +---------------+---------------+---------------+
//! |   Type (8)    |   Flags (8)   |
//! +-+-------------+---------------+-------------------------------+
//! |R|                 Stream Identifier (31)                      |
//! +=+=============================================================+
//! |                   Frame Payload (0...)                      ...
//! +---------------------------------------------------------------+
//! ```
//! Length, stream id, and all multi-byte fields are big-endian.

mod decode;
mod encode;
mod error;
mod types;

pub use decode::FrameDecoder;
pub use encode::FrameEncoder;
pub use error::{ErrorCode, FrameError};
pub use types::*;

/// Largest payload length the 24-bit field can express (2^24 - 1).
pub const MAX_FRAME_SIZE: u32 = 16_777_215;

/// Default maximum frame size before negotiation (16 KiB).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16_384;

/// Size of the fixed frame header.
pub const FRAME_HEADER_SIZE: usize = 9;

/// The 24-byte magic a client must send before its first frame.
pub const CONNECTION_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Default flow-control window for new streams and the connection.
pub const DEFAULT_INITIAL_WINDOW_SIZE: u32 = 65_535;

/// Default HPACK dynamic table size.
pub const DEFAULT_HEADER_TABLE_SIZE: u32 = 4_096;
