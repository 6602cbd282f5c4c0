//! Shared input and output stream handles.
//!
//! Cloning a stream copies the reference, not the underlying data: a
//! duplicated `2>&1` and the stream it was copied from write to the same
//! place, and a fork writes to the same place as its parent.

use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Read, Write};
use std::process::Stdio;
use std::sync::Arc;

/// Anything an open hook can hand back
pub trait Handle: Read + Write + Send {}

impl<T: Read + Write + Send> Handle for T {}

/// A handle returned by an open hook, closable independently of its clones.
///
/// Statements close every handle they opened once they finish, even if a
/// stream built on the handle is still referenced somewhere else; later
/// reads and writes then fail.
#[derive(Clone)]
pub struct SharedHandle(Arc<Mutex<Option<Box<dyn Handle>>>>);

impl SharedHandle {
    #[must_use]
    pub fn new(handle: Box<dyn Handle>) -> Self {
        Self(Arc::new(Mutex::new(Some(handle))))
    }

    pub fn close(&self) {
        if let Some(mut handle) = self.0.lock().take() {
            let _ = handle.flush();
        }
    }
}

impl fmt::Debug for SharedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.0.lock().is_some() { "open" } else { "closed" };
        f.debug_tuple("SharedHandle").field(&state).finish()
    }
}

fn closed_handle() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "file already closed")
}

struct HandleIo(SharedHandle);

impl Read for HandleIo {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.0.lock().as_mut() {
            Some(handle) => handle.read(buf),
            None => Err(closed_handle()),
        }
    }
}

impl Write for HandleIo {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.0.0.lock().as_mut() {
            Some(handle) => handle.write(buf),
            None => Err(closed_handle()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.0.0.lock().as_mut() {
            Some(handle) => handle.flush(),
            None => Ok(()),
        }
    }
}

#[derive(Clone)]
enum Source {
    Null,
    Stdin,
    Shared(Arc<Mutex<Box<dyn Read + Send>>>),
}

/// Where a command reads its standard input from
#[derive(Clone)]
pub struct InStream {
    source: Source,
}

impl InStream {
    /// Always at end of input
    #[must_use]
    pub const fn null() -> Self {
        Self {
            source: Source::Null,
        }
    }

    /// The process's own standard input
    #[must_use]
    pub const fn stdin() -> Self {
        Self {
            source: Source::Stdin,
        }
    }

    #[must_use]
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            source: Source::Shared(Arc::new(Mutex::new(Box::new(reader)))),
        }
    }

    /// Input that yields `text` and then ends
    #[must_use]
    pub fn from_string(text: impl Into<String>) -> Self {
        Self::from_reader(io::Cursor::new(text.into().into_bytes()))
    }

    #[must_use]
    pub fn from_handle(handle: &SharedHandle) -> Self {
        Self::from_reader(HandleIo(handle.clone()))
    }

    /// How a child process can use this stream directly, if it can
    pub(crate) fn as_stdio(&self) -> Option<Stdio> {
        match self.source {
            Source::Null => Some(Stdio::null()),
            Source::Stdin => Some(Stdio::inherit()),
            Source::Shared(_) => None,
        }
    }
}

impl Read for InStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &self.source {
            Source::Null => Ok(0),
            Source::Stdin => io::stdin().read(buf),
            Source::Shared(reader) => reader.lock().read(buf),
        }
    }
}

impl fmt::Debug for InStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            Source::Null => "null",
            Source::Stdin => "stdin",
            Source::Shared(_) => "shared",
        };
        f.debug_tuple("InStream").field(&kind).finish()
    }
}

#[derive(Clone)]
enum Sink {
    Stdout,
    Stderr,
    Shared(Arc<Mutex<Box<dyn Write + Send>>>),
    Buffer(Arc<Mutex<Vec<u8>>>),
}

/// Where a command writes its standard output or error
#[derive(Clone)]
pub struct OutStream {
    sink: Sink,
}

impl OutStream {
    /// Discards everything written to it
    #[must_use]
    pub fn null() -> Self {
        Self::from_writer(io::sink())
    }

    #[must_use]
    pub const fn stdout() -> Self {
        Self { sink: Sink::Stdout }
    }

    #[must_use]
    pub const fn stderr() -> Self {
        Self { sink: Sink::Stderr }
    }

    #[must_use]
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            sink: Sink::Shared(Arc::new(Mutex::new(Box::new(writer)))),
        }
    }

    /// In-memory capture, read back with [`OutStream::contents`]
    #[must_use]
    pub fn buffer() -> Self {
        Self {
            sink: Sink::Buffer(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    #[must_use]
    pub fn from_handle(handle: &SharedHandle) -> Self {
        Self::from_writer(HandleIo(handle.clone()))
    }

    /// Everything written so far, if this is a buffer; empty otherwise
    #[must_use]
    pub fn contents(&self) -> String {
        match &self.sink {
            Sink::Buffer(buf) => String::from_utf8_lossy(&buf.lock()).into_owned(),
            _ => String::new(),
        }
    }

    pub(crate) fn as_stdio(&self) -> Option<Stdio> {
        match self.sink {
            Sink::Stdout => Some(Stdio::inherit()),
            Sink::Stderr => Some(Stdio::from(io::stderr())),
            Sink::Shared(_) | Sink::Buffer(_) => None,
        }
    }
}

impl Write for OutStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &self.sink {
            Sink::Stdout => io::stdout().write(buf),
            Sink::Stderr => io::stderr().write(buf),
            Sink::Shared(writer) => writer.lock().write(buf),
            Sink::Buffer(data) => {
                data.lock().extend_from_slice(buf);
                Ok(buf.len())
            }
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match &self.sink {
            Sink::Stdout => io::stdout().lock().write_all(buf),
            Sink::Stderr => io::stderr().lock().write_all(buf),
            Sink::Shared(writer) => writer.lock().write_all(buf),
            Sink::Buffer(data) => {
                data.lock().extend_from_slice(buf);
                Ok(())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &self.sink {
            Sink::Stdout => io::stdout().flush(),
            Sink::Stderr => io::stderr().flush(),
            Sink::Shared(writer) => writer.lock().flush(),
            Sink::Buffer(_) => Ok(()),
        }
    }
}

impl fmt::Debug for OutStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.sink {
            Sink::Stdout => "stdout",
            Sink::Stderr => "stderr",
            Sink::Shared(_) => "shared",
            Sink::Buffer(_) => "buffer",
        };
        f.debug_tuple("OutStream").field(&kind).finish()
    }
}
