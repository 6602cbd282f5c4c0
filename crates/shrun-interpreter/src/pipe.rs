//! Bounded in-memory byte pipe connecting the two sides of `|` and `|&`.
//!
//! ```text
//!   PipeWriter ──▶ [VecDeque<u8>] ──▶ PipeReader
//!                  ├── writer blocks when full
//!                  ├── reader blocks when empty
//!                  ├── writer close → EOF (reader returns 0)
//!                  └── reader close → broken pipe (writer returns error)
//! ```
//!
//! Both ends are cheap to clone and must be closed explicitly: a stream
//! handle built on top of an end may outlive the pipeline that created it.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;

/// Default pipe buffer capacity (matches the Linux kernel pipe default)
pub const PIPE_BUFFER_SIZE: usize = 64 * 1024;

struct PipeBuffer {
    buffer: VecDeque<u8>,
    capacity: usize,
    writer_closed: bool,
    reader_closed: bool,
}

struct PipeShared {
    buf: Mutex<PipeBuffer>,
    readable: Condvar,
    writable: Condvar,
}

/// Writing end of a pipe
#[derive(Clone)]
pub struct PipeWriter {
    shared: Arc<PipeShared>,
}

/// Reading end of a pipe
#[derive(Clone)]
pub struct PipeReader {
    shared: Arc<PipeShared>,
}

/// Create a pipe with the default capacity
#[must_use]
pub fn pipe() -> (PipeReader, PipeWriter) {
    pipe_with_capacity(PIPE_BUFFER_SIZE)
}

/// Create a pipe that holds at most `capacity` unread bytes
#[must_use]
pub fn pipe_with_capacity(capacity: usize) -> (PipeReader, PipeWriter) {
    let shared = Arc::new(PipeShared {
        buf: Mutex::new(PipeBuffer {
            buffer: VecDeque::with_capacity(capacity.min(8192)),
            capacity: capacity.max(1),
            writer_closed: false,
            reader_closed: false,
        }),
        readable: Condvar::new(),
        writable: Condvar::new(),
    });
    (
        PipeReader {
            shared: shared.clone(),
        },
        PipeWriter { shared },
    )
}

fn broken_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader closed")
}

impl PipeWriter {
    /// Signal end of input to the reader
    pub fn close(&self) {
        let mut inner = self.shared.buf.lock();
        inner.writer_closed = true;
        self.shared.readable.notify_all();
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut inner = self.shared.buf.lock();
        loop {
            if inner.reader_closed || inner.writer_closed {
                return Err(broken_pipe());
            }
            let available = inner.capacity.saturating_sub(inner.buffer.len());
            if available > 0 {
                let n = buf.len().min(available);
                inner.buffer.extend(&buf[..n]);
                self.shared.readable.notify_all();
                return Ok(n);
            }
            self.shared.writable.wait(&mut inner);
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl PipeReader {
    /// Stop reading; pending and future writes fail with `BrokenPipe`
    pub fn close(&self) {
        let mut inner = self.shared.buf.lock();
        inner.reader_closed = true;
        inner.buffer.clear();
        self.shared.writable.notify_all();
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut inner = self.shared.buf.lock();
        loop {
            if !inner.buffer.is_empty() {
                let n = buf.len().min(inner.buffer.len());
                for (slot, byte) in buf.iter_mut().zip(inner.buffer.drain(..n)) {
                    *slot = byte;
                }
                self.shared.writable.notify_all();
                return Ok(n);
            }
            if inner.writer_closed || inner.reader_closed {
                return Ok(0);
            }
            self.shared.readable.wait(&mut inner);
        }
    }
}
