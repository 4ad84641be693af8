//! Append-only byte buffer shared between the ingestion stage and the scanner.
//!
//! Like a `BufReader` but filled by another thread: readers address bytes by
//! absolute offset and are told to wait when they run ahead of the writer.

use std::io;
use std::time::Duration;

use log::trace;
use memchr::memchr;
use parking_lot::{Condvar, Mutex, RwLock};

use crate::lexer::sql::Error;

/// Outcome of a read against a [`SharedBuffer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fetch<T> {
    /// Requested data is available.
    Ready(T),
    /// Requested data has not been written yet; retry later.
    Wait,
    /// Buffer is closed and the requested data will never exist.
    End,
}

#[derive(Default)]
struct Inner {
    data: Vec<u8>,
    closed: bool,
    failure: Option<(io::ErrorKind, String)>,
}

impl Inner {
    /// What a reader gets once it is past the written data.
    fn past_end<T>(&self) -> Result<Fetch<T>, Error> {
        if let Some((kind, msg)) = &self.failure {
            return Err(Error::Io(io::Error::new(*kind, msg.clone())));
        }
        Ok(if self.closed { Fetch::End } else { Fetch::Wait })
    }
}

/// Growable buffer that can be read while it is still being written.
#[derive(Default)]
pub struct SharedBuffer {
    inner: RwLock<Inner>,
    // bumped on every write/close so that waiters do not miss a wakeup
    generation: Mutex<u64>,
    grown: Condvar,
}

impl SharedBuffer {
    /// Empty, open buffer.
    pub fn new() -> SharedBuffer {
        SharedBuffer::default()
    }

    /// Empty, open buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> SharedBuffer {
        SharedBuffer {
            inner: RwLock::new(Inner {
                data: Vec::with_capacity(capacity),
                ..Inner::default()
            }),
            ..SharedBuffer::default()
        }
    }

    /// Closed buffer holding exactly `text`.
    pub fn from_text(text: &str) -> SharedBuffer {
        let buffer = SharedBuffer::with_capacity(text.len());
        {
            let mut inner = buffer.inner.write();
            inner.data.extend_from_slice(text.as_bytes());
            inner.closed = true;
        }
        buffer
    }

    /// Append `text`.
    pub fn write(&self, text: &str) -> Result<(), Error> {
        {
            let mut inner = self.inner.write();
            if inner.closed {
                return Err(Error::BufferClosed);
            }
            inner.data.extend_from_slice(text.as_bytes());
        }
        self.notify();
        Ok(())
    }

    /// No more data will be written. Idempotent.
    pub fn close(&self) {
        self.inner.write().closed = true;
        self.notify();
    }

    /// Close the buffer because the writer failed.
    /// Readers see `err` once they have consumed everything written before.
    pub fn fail(&self, err: &io::Error) {
        {
            let mut inner = self.inner.write();
            inner.closed = true;
            inner.failure = Some((err.kind(), err.to_string()));
        }
        self.notify();
    }

    /// Whether the writer is done (or failed).
    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.inner.read().data.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte at offset `i`.
    pub fn byte_at(&self, i: usize) -> Result<Fetch<u8>, Error> {
        let inner = self.inner.read();
        match inner.data.get(i) {
            Some(b) => Ok(Fetch::Ready(*b)),
            None => inner.past_end(),
        }
    }

    /// Bytes in `start..end`.
    pub fn range(&self, start: usize, end: usize) -> Result<Fetch<Vec<u8>>, Error> {
        if start >= end {
            return Err(Error::InvalidRange(start, end));
        }
        let inner = self.inner.read();
        match inner.data.get(start..end) {
            Some(bytes) => Ok(Fetch::Ready(bytes.to_vec())),
            None => inner.past_end(),
        }
    }

    /// Line starting at `start`, without its `\n`, and the offset of the
    /// next line. The last line may lack a terminator once the buffer is
    /// closed.
    pub fn line_at(&self, start: usize) -> Result<Fetch<(Vec<u8>, usize)>, Error> {
        let inner = self.inner.read();
        let rest = match inner.data.get(start..) {
            Some(rest) if !rest.is_empty() => rest,
            _ => return inner.past_end(),
        };
        match memchr(b'\n', rest) {
            Some(i) => Ok(Fetch::Ready((rest[..i].to_vec(), start + i + 1))),
            None if inner.closed => {
                if let Some((kind, msg)) = &inner.failure {
                    return Err(Error::Io(io::Error::new(*kind, msg.clone())));
                }
                Ok(Fetch::Ready((rest.to_vec(), start + rest.len())))
            }
            None => Ok(Fetch::Wait),
        }
    }

    /// Block until more than `seen` bytes are available, the buffer is
    /// closed, or `timeout` elapses.
    pub fn wait_for(&self, seen: usize, timeout: Duration) {
        let mut generation = self.generation.lock();
        {
            let inner = self.inner.read();
            if inner.closed || inner.data.len() > seen {
                return;
            }
        }
        trace!(target: "buffer", "wait_for(seen: {}, timeout: {:?})", seen, timeout);
        let before = *generation;
        let result = self.grown.wait_for(&mut generation, timeout);
        if result.timed_out() && *generation == before {
            trace!(target: "buffer", "no data after {:?}", timeout);
        }
    }

    fn notify(&self) {
        let mut generation = self.generation.lock();
        *generation = generation.wrapping_add(1);
        self.grown.notify_all();
    }
}
