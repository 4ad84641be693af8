//! Cursor over a [`SharedBuffer`] that is still being filled.

use log::{debug, trace};

use std::error::Error;
use std::fmt;
use std::io;
use std::time::Duration;

use crate::buffer::{Fetch, SharedBuffer};
use crate::dialect::is_whitespace;
use crate::lexer::sql;

/// Error with position
pub trait ScanError: Error + From<io::Error> + Sized {
    /// Update the position where the error occurs
    fn position(&mut self, line: u64, column: usize);
}

/// Successive calls step through the bytes of the shared buffer.
///
/// When the requested bytes have not been written yet, the scanner blocks
/// for at most `wait` and asks again, until the data shows up or the buffer
/// is closed.
/// There is no timeout: a writer that never closes the buffer keeps the
/// scanner waiting.
pub struct Scanner<'input> {
    /// The buffer provided by the client.
    input: &'input SharedBuffer,
    /// absolute offset of the next unconsumed byte
    offset: usize,
    /// upper bound of a single wait for more data
    wait: Duration,
    /// current line number
    line: u64,
    /// current column number (byte offset, not char offset)
    column: usize,
}

impl<'input> Scanner<'input> {
    /// Constructor
    pub fn new(input: &'input SharedBuffer, wait: Duration) -> Scanner<'input> {
        Scanner {
            input,
            offset: 0,
            wait,
            line: 1,
            column: 1,
        }
    }

    /// Current line number
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Current column number (byte offset, not char offset)
    pub fn column(&self) -> usize {
        self.column
    }

    /// Absolute offset of the cursor
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Retry `fetch` until it yields data or the end of the input.
    fn fetch<T, F>(&self, fetch: F) -> Result<Option<T>, sql::Error>
    where
        F: Fn(&SharedBuffer) -> Result<Fetch<T>, sql::Error>,
    {
        loop {
            let seen = self.input.len();
            match fetch(self.input) {
                Ok(Fetch::Ready(t)) => return Ok(Some(t)),
                Ok(Fetch::End) => return Ok(None),
                Ok(Fetch::Wait) => {
                    trace!(target: "scanner", "wait(offset: {}, seen: {})", self.offset, seen);
                    self.input.wait_for(seen, self.wait);
                }
                Err(mut e) => {
                    e.position(self.line, self.column);
                    return Err(e);
                }
            }
        }
    }

    /// Byte `ahead` positions after the cursor, `None` at the end of input.
    pub fn peek_byte(&self, ahead: usize) -> Result<Option<u8>, sql::Error> {
        let i = self.offset + ahead;
        self.fetch(|input| input.byte_at(i))
    }

    /// The next `len` bytes, `None` if the input ends before.
    pub fn peek(&self, len: usize) -> Result<Option<Vec<u8>>, sql::Error> {
        let (start, end) = (self.offset, self.offset + len);
        self.fetch(|input| input.range(start, end))
    }

    /// Whether the cursor is at the start of the input or right after
    /// whitespace.
    pub fn after_whitespace(&self) -> Result<bool, sql::Error> {
        if self.offset == 0 {
            return Ok(true);
        }
        let i = self.offset - 1;
        Ok(self.fetch(|input| input.byte_at(i))?.map_or(true, is_whitespace))
    }

    /// Consume `bytes`, which must be the bytes at the cursor.
    pub fn consume(&mut self, bytes: &[u8]) {
        for byte in bytes {
            if *byte == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.offset += bytes.len();
    }

    /// Skip whitespace, including line breaks.
    pub fn skip_whitespace(&mut self) -> Result<(), sql::Error> {
        while let Some(b) = self.peek_byte(0)? {
            if !is_whitespace(b) {
                break;
            }
            self.consume(&[b]);
        }
        Ok(())
    }

    /// Skip trailing blanks up to and including the end of the current line.
    pub fn skip_line_end(&mut self) -> Result<(), sql::Error> {
        while let Some(b) = self.peek_byte(0)? {
            match b {
                b'\n' => {
                    self.consume(&[b]);
                    break;
                }
                b' ' | b'\t' | b'\r' => self.consume(&[b]),
                _ => break,
            }
        }
        Ok(())
    }

    /// Skip whole lines made of whitespace only.
    /// Stop at the start of the first other line, which is left untouched.
    pub fn skip_blank_lines(&mut self) -> Result<(), sql::Error> {
        loop {
            let start = self.offset;
            match self.fetch(|input| input.line_at(start))? {
                Some((line, next)) if line.iter().copied().all(is_whitespace) => {
                    self.offset = next;
                    self.line += 1;
                    self.column = 1;
                }
                _ => return Ok(()),
            }
        }
    }

    /// Consume bytes up to the next whitespace.
    pub fn word(&mut self) -> Result<Vec<u8>, sql::Error> {
        let mut word = Vec::new();
        while let Some(b) = self.peek_byte(0)? {
            if is_whitespace(b) {
                break;
            }
            word.push(b);
            self.consume(&[b]);
        }
        Ok(word)
    }

    /// Consume the current line and its terminator.
    /// Return the line without `\n`, or `None` at the end of input.
    pub fn line_bytes(&mut self) -> Result<Option<Vec<u8>>, sql::Error> {
        let start = self.offset;
        match self.fetch(|input| input.line_at(start))? {
            Some((line, next)) => {
                debug!(target: "scanner", "line(line: {}, len: {})", self.line, line.len());
                self.offset = next;
                self.line += 1;
                self.column = 1;
                Ok(Some(line))
            }
            None => Ok(None),
        }
    }
}

impl<'input> fmt::Debug for Scanner<'input> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("offset", &self.offset)
            .field("wait", &self.wait)
            .field("line", &self.line)
            .field("column", &self.column)
            .finish()
    }
}
