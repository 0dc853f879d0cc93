//! Transport abstraction.
//!
//! A session owns one transport and drives it from multiple threads,
//! so the trait takes `&self` everywhere; implementations carry their
//! own interior synchronization. The session serializes reads behind
//! its read lock and writes behind its write lock, so an
//! implementation never sees overlapping calls on the same direction.

use std::io;
use std::net::{Shutdown, TcpStream};

/// Blocking byte transport under a session.
pub trait Transport: Send + Sync {
    /// Fill `buf` completely, blocking as needed. An EOF before the
    /// buffer is full is `UnexpectedEof`.
    fn read_exact(&self, buf: &mut [u8]) -> io::Result<()>;

    /// Write all of `buf`, blocking as needed.
    fn write_all(&self, buf: &[u8]) -> io::Result<()>;

    /// Tear the transport down. Subsequent reads and writes fail.
    fn close(&self) -> io::Result<()>;
}

// `&TcpStream` implements `Read` and `Write`, so both directions work
// through a shared reference without extra locking.
impl Transport for TcpStream {
    fn read_exact(&self, buf: &mut [u8]) -> io::Result<()> {
        io::Read::read_exact(&mut &*self, buf)
    }

    fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        io::Write::write_all(&mut &*self, buf)
    }

    fn close(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}
