//! h2wire - a blocking, thread-per-caller HTTP/2 session layer.
//!
//! This crate implements the wire level of the protocol without an
//! async runtime: callers drive a shared [`Session`] from ordinary
//! threads, one typically reading and dispatching inbound frames while
//! others send headers and data on their streams. Flow control is
//! enforced by blocking the sender until the peer grants credit.
//!
//! # Architecture
//!
//! - `frame`: frame types, encoding, and decoding
//! - `hpack`: header compression (RFC 7541)
//! - `session`: the per-connection engine (settings, streams, flow
//!   control, dispatch)
//! - `transport`: the byte-transport trait the session runs over
//!
//! # Example
//!
//! ```no_run
//! use h2wire::{HeaderEntry, Session, Settings};
//! use std::net::TcpStream;
//!
//! # fn main() -> Result<(), h2wire::SessionError> {
//! let stream = TcpStream::connect("127.0.0.1:8080")?;
//! let session = Session::new(stream, Settings::new().enable_push(false));
//!
//! session.send_preface()?;
//! session.send_settings()?;
//!
//! session.open_stream(1)?;
//! session.send_headers(
//!     1,
//!     false,
//!     &[
//!         HeaderEntry::new(":method", "POST"),
//!         HeaderEntry::new(":scheme", "http"),
//!         HeaderEntry::new(":path", "/upload"),
//!         HeaderEntry::new(":authority", "example.com"),
//!     ],
//! )?;
//! session.send_data(1, true, b"hello")?;
//!
//! loop {
//!     let frame = session.read_frame()?;
//!     session.handle(frame)?;
//!     if session.stream(1).is_some_and(|s| s.peer_done()) {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod frame;
pub mod hpack;
pub mod session;
pub mod transport;

pub use frame::{
    CONNECTION_PREFACE, ContinuationFrame, DEFAULT_HEADER_TABLE_SIZE, DEFAULT_INITIAL_WINDOW_SIZE,
    DEFAULT_MAX_FRAME_SIZE, DataFrame, ErrorCode, FRAME_HEADER_SIZE, Frame, FrameDecoder,
    FrameEncoder, FrameError, GoAwayFrame, HeadersFrame, PingFrame, Priority, RstStreamFrame,
    Setting, SettingId, SettingsFrame, StreamId, WindowUpdateFrame,
};

pub use hpack::{HeaderEntry, HeaderField, HpackDecoder, HpackEncoder, HpackError};

pub use session::{SendWindow, Session, SessionError, Settings, StreamEntry};

pub use transport::Transport;
