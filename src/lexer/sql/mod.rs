//! Statement splitter for PostgreSQL migration scripts.
//!
//! The splitter walks the shared buffer byte by byte and decides where a
//! statement ends, skipping semicolons inside string literals and inside
//! procedural blocks (`DO $tag$ ... $tag$`, `CREATE FUNCTION ... AS $$ ... $$`).
pub use fallible_iterator::FallibleIterator;
use log::{debug, warn};
use std::result::Result;
use std::sync::mpsc::Sender;
use std::time::Duration;

use crate::buffer::SharedBuffer;
use crate::copy::{read_row, skip_to_data, CopyTarget, RowLine};
use crate::dialect::{block_opener, is_block_end, is_whitespace};
use crate::lexer::block::BlockStack;
use crate::lexer::scan::ScanError;
use crate::lexer::Scanner;

mod error;
#[cfg(test)]
mod test;

pub use error::{BoxError, Error, Pos};

/// Completed statement
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statement {
    /// trimmed text, including the final `;` when there was one
    pub text: String,
    /// line where the statement starts
    pub line: u64,
}

impl Statement {
    /// Target of a `COPY ... FROM stdin;` statement.
    pub fn copy_target(&self) -> Result<Option<CopyTarget>, Error> {
        CopyTarget::parse(&self.text).map_err(|mut e| {
            e.position(self.line, 1);
            e
        })
    }
}

/// Statement accumulator.
///
/// Holds the text of the statement being scanned, the quote depth and the
/// delimiters of the procedural blocks currently open.
#[derive(Debug, Default)]
pub struct Splitter {
    stmt: Vec<u8>,
    quotes: usize,
    blocks: BlockStack,
    line: u64,
    eof: bool,
}

impl Splitter {
    /// Constructor
    pub fn new() -> Splitter {
        Splitter::default()
    }

    /// Scan up to the end of the next statement.
    ///
    /// Return `None` once the input is exhausted. A trailing statement
    /// without `;` is returned as is.
    pub fn next_statement(
        &mut self,
        scanner: &mut Scanner<'_>,
    ) -> Result<Option<Statement>, Error> {
        if self.eof {
            return Ok(None);
        }
        loop {
            let b = match scanner.peek_byte(0)? {
                Some(b) => b,
                None => return self.finish(),
            };
            if self.stmt.is_empty() {
                // leading whitespace and empty statements are never significant
                if is_whitespace(b) || b == b';' {
                    scanner.consume(&[b]);
                    continue;
                }
                self.line = scanner.line();
            }
            if self.quotes > 0 {
                self.quoted(scanner, b)?;
                continue;
            }
            match b {
                b';' if self.blocks.is_empty() => {
                    self.stmt.push(b);
                    scanner.consume(&[b]);
                    return self.complete().map(Some);
                }
                b'\'' => {
                    if scanner.peek(2)?.as_deref() == Some(b"''") {
                        // empty literal
                        self.stmt.extend_from_slice(b"''");
                        scanner.consume(b"''");
                    } else {
                        self.stmt.push(b);
                        self.quotes += 1;
                        scanner.consume(&[b]);
                    }
                    continue;
                }
                _ => {}
            }
            if self.open_block(scanner)? || self.close_block(scanner)? {
                continue;
            }
            self.stmt.push(b);
            scanner.consume(&[b]);
        }
    }

    /// Inside a string literal, only a lone quote matters.
    fn quoted(&mut self, scanner: &mut Scanner<'_>, b: u8) -> Result<(), Error> {
        self.stmt.push(b);
        if b == b'\'' {
            if scanner.peek_byte(1)? == Some(b'\'') {
                // escaped quote
                self.stmt.push(b'\'');
                scanner.consume(b"''");
                return Ok(());
            }
            self.quotes -= 1;
        }
        scanner.consume(&[b]);
        Ok(())
    }

    /// `DO <tag>` or `AS <tag>` in a function definition.
    fn open_block(&mut self, scanner: &mut Scanner<'_>) -> Result<bool, Error> {
        if !scanner.after_whitespace()? {
            return Ok(false);
        }
        let Some(head) = scanner.peek(3)? else {
            return Ok(false);
        };
        if !is_whitespace(head[2]) {
            return Ok(false);
        }
        let keyword = &head[..2];
        let Some(opener) = block_opener(keyword, &self.stmt) else {
            return Ok(false);
        };
        self.stmt.extend_from_slice(keyword);
        scanner.consume(keyword);
        scanner.skip_whitespace()?;
        self.stmt.push(b' ');
        let token = scanner.word()?;
        self.stmt.extend_from_slice(&token);
        self.stmt.push(b'\n');
        // the line break above replaces the delimiter; keeping both would
        // add a blank line on every re-split
        if let Some(b) = scanner.peek_byte(0)? {
            scanner.consume(&[b]);
        }
        if token.is_empty() {
            return Ok(true);
        }
        let token = String::from_utf8(token).map_err(|e| {
            let mut e = Error::from(e);
            e.position(scanner.line(), scanner.column());
            e
        })?;
        debug!(target: "splitter", "open {:?} block {} at line {}", opener, token, scanner.line());
        self.blocks.push(token);
        Ok(true)
    }

    /// Delimiter of the innermost open block.
    fn close_block(&mut self, scanner: &mut Scanner<'_>) -> Result<bool, Error> {
        let Some(token) = self.blocks.peek_last() else {
            return Ok(false);
        };
        match scanner.peek(token.len())? {
            Some(data) if is_block_end(token, &data) => {
                let token = self.blocks.pop();
                debug!(target: "splitter", "close block {} at line {}", token, scanner.line());
                self.stmt.extend_from_slice(token.as_bytes());
                scanner.consume(&data);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn complete(&mut self) -> Result<Statement, Error> {
        let stmt = std::mem::take(&mut self.stmt);
        let text = String::from_utf8(stmt).map_err(|e| Error::Utf8(e, Some((self.line, 1))))?;
        Ok(Statement {
            text: text.trim().to_owned(),
            line: self.line,
        })
    }

    /// End of input: flush what is left.
    fn finish(&mut self) -> Result<Option<Statement>, Error> {
        self.eof = true;
        if self.quotes > 0 {
            warn!(target: "splitter", "unterminated literal in statement at line {}", self.line);
        }
        if !self.blocks.is_empty() {
            warn!(
                target: "splitter",
                "{} unterminated block(s) in statement at line {}",
                self.blocks.len(),
                self.line
            );
        }
        self.quotes = 0;
        self.blocks.clear();
        if self.stmt.is_empty() {
            return Ok(None);
        }
        let stmt = self.complete()?;
        Ok(if stmt.text.is_empty() { None } else { Some(stmt) })
    }
}

/// Statements and `COPY` data rows, in input order.
///
/// A `COPY ... FROM stdin;` statement is followed by its data rows, one item
/// per row, verbatim; the `\.` line is consumed but not yielded.
#[derive(Debug)]
pub struct Statements<'input> {
    scanner: Scanner<'input>,
    splitter: Splitter,
    in_copy: bool,
}

impl<'input> Statements<'input> {
    /// `wait` bounds each wait for the writer of `input`.
    pub fn new(input: &'input SharedBuffer, wait: Duration) -> Statements<'input> {
        Statements {
            scanner: Scanner::new(input, wait),
            splitter: Splitter::new(),
            in_copy: false,
        }
    }
}

impl<'input> FallibleIterator for Statements<'input> {
    type Item = String;
    type Error = Error;

    fn next(&mut self) -> Result<Option<String>, Error> {
        if self.in_copy {
            match read_row(&mut self.scanner)? {
                RowLine::Row(row) => return Ok(Some(row)),
                RowLine::EndOfData | RowLine::EndOfInput => self.in_copy = false,
            }
        }
        let Some(stmt) = self.splitter.next_statement(&mut self.scanner)? else {
            return Ok(None);
        };
        if CopyTarget::matches(&stmt.text) {
            debug!(target: "splitter", "COPY data follows line {}", stmt.line);
            skip_to_data(&mut self.scanner)?;
            self.in_copy = true;
        }
        Ok(Some(stmt.text))
    }
}

/// Send every statement of `input` to `sender`, in order.
///
/// The sender is dropped, closing the queue, when this function returns,
/// whatever the outcome. Return the number of items sent.
pub fn split_statements(
    input: &SharedBuffer,
    sender: Sender<String>,
    wait: Duration,
) -> Result<usize, Error> {
    let mut statements = Statements::new(input, wait);
    let mut count = 0;
    while let Some(stmt) = statements.next()? {
        sender.send(stmt).map_err(|_| Error::Disconnected)?;
        count += 1;
    }
    debug!(target: "splitter", "{} items split", count);
    Ok(count)
}
