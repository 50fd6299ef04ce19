//! Buffered output sink, per spec §2/§6.2.
//!
//! Wraps an in-memory buffer (the driver writes the whole file in one pass
//! before any disk I/O, since pass 1 requires seeking back to position 0)
//! and exposes the `tell`/`seek`/`write`/`padto` primitives the two-pass
//! driver needs for byte-exact offset patching.

use crate::config::DEFAULT_SINK_BUFFER_SIZE;
use crate::error::Result;
use std::io::Write;

/// An append/seek-capable byte sink with the small set of operations the
/// writer core needs: positional writes, `tell`, and `padto` for byte-exact
/// repositioning between linearization passes.
#[derive(Debug, Default)]
pub struct OutputSink {
    buf: Vec<u8>,
    pos: usize,
}

impl OutputSink {
    /// A sink with the ambient default buffer capacity pre-reserved.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SINK_BUFFER_SIZE)
    }

    /// A sink with `capacity` bytes pre-reserved.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            pos: 0,
        }
    }

    /// Current write position.
    pub fn tell(&self) -> u64 {
        self.pos as u64
    }

    /// Total bytes written so far (may exceed `tell()` after a `seek`).
    pub fn len(&self) -> u64 {
        self.buf.len() as u64
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Move the write cursor to `offset`, extending the buffer with zero
    /// bytes if it seeks past the current end.
    pub fn seek(&mut self, offset: u64) {
        let offset = offset as usize;
        if offset > self.buf.len() {
            self.buf.resize(offset, 0);
        }
        self.pos = offset;
    }

    /// Write `bytes` at the current cursor, overwriting or extending the
    /// buffer as needed, then advancing the cursor.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    /// Write newline bytes until the cursor reaches `target`, per spec
    /// §4.9's `padto` primitive used to guarantee byte-exact object
    /// positions during pass 1.
    pub fn padto(&mut self, target: u64) -> Result<()> {
        while (self.pos as u64) < target {
            self.write_bytes(b"\n")?;
        }
        Ok(())
    }

    /// Consume the sink, returning the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Borrow the written bytes without consuming the sink.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Reset the sink to empty, ready for a second pass.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.pos = 0;
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.write_bytes(buf).map_err(std::io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
