//! Ingestion stage: copy the raw migration into the shared buffer, line by line.

use std::borrow::Cow;
use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bitflags::bitflags;
use log::{debug, warn};

use crate::buffer::SharedBuffer;
use crate::lexer::sql::Error;

/// Noisy directive emitted by `pg_dump`.
const SEARCH_PATH: &str = "pg_catalog.set_config('search_path'";
/// Line comment marker.
const LINE_COMMENT: &str = "--";

bitflags! {
    /// Transformations applied to each input line.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct IngestOptions: u8 {
        /// Truncate lines at the first `--`.
        const DROP_COMMENTS = 0x01;
        /// Drop lines resetting `search_path`.
        const DROP_SEARCH_PATH = 0x02;
        /// Drop empty or whitespace-only lines.
        const DROP_BLANK_LINES = 0x04;
    }
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions::DROP_COMMENTS | IngestOptions::DROP_SEARCH_PATH
    }
}

/// Apply `options` to one input line (without its terminator).
/// Return `None` when the line must be dropped.
pub fn read_in_sql_line(line: &str, options: IngestOptions) -> Option<Cow<'_, str>> {
    let mut line = Cow::Borrowed(line);
    if options.contains(IngestOptions::DROP_COMMENTS) {
        if let Some(i) = line.find(LINE_COMMENT) {
            line = Cow::Owned(line[..i].to_owned());
        }
    }
    if options.contains(IngestOptions::DROP_SEARCH_PATH) && line.contains(SEARCH_PATH) {
        return None;
    }
    if options.contains(IngestOptions::DROP_BLANK_LINES) && line.trim().is_empty() {
        return None;
    }
    Some(line)
}

/// Copy `input` into `buffer`, then close it.
///
/// Stop with a `BrokenPipe` error as soon as the buffer is closed by the
/// reading side.
///
/// On a read error (including invalid UTF-8) the buffer is closed with the
/// error, so the scanner fails too, and the error is returned.
/// Return the number of lines appended.
pub fn ingest<R: BufRead>(
    input: R,
    buffer: &SharedBuffer,
    options: IngestOptions,
) -> io::Result<u64> {
    let mut count = 0;
    for line in input.lines() {
        if buffer.is_closed() {
            debug!(target: "ingest", "buffer closed by the reader after {} lines", count);
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, Error::BufferClosed.to_string()));
        }
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!(target: "ingest", "read failed after {} lines: {}", count, err);
                buffer.fail(&err);
                return Err(err);
            }
        };
        let Some(line) = read_in_sql_line(&line, options) else {
            continue;
        };
        let mut text = line.into_owned();
        text.push('\n');
        if let Err(err) = buffer.write(&text) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, err.to_string()));
        }
        count += 1;
    }
    buffer.close();
    debug!(target: "ingest", "{} lines ingested", count);
    Ok(count)
}

/// Run [`ingest`] on its own thread.
pub fn spawn_ingest<R>(
    input: R,
    buffer: Arc<SharedBuffer>,
    options: IngestOptions,
) -> JoinHandle<io::Result<u64>>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || ingest(input, &buffer, options))
}

#[cfg(test)]
mod test {
    use super::{ingest, read_in_sql_line, spawn_ingest, IngestOptions};
    use crate::buffer::{Fetch, SharedBuffer};
    use std::io::{self, BufReader, Read};
    use std::sync::Arc;

    #[test]
    fn comments() {
        let options = IngestOptions::DROP_COMMENTS;
        assert_eq!(
            Some("SELECT 1; ".into()),
            read_in_sql_line("SELECT 1; -- one", options)
        );
        assert_eq!(Some("".into()), read_in_sql_line("-- header", options));
        assert_eq!(
            Some("SELECT 1; -- one".into()),
            read_in_sql_line("SELECT 1; -- one", IngestOptions::empty())
        );
    }

    #[test]
    fn search_path() {
        let line = "SELECT pg_catalog.set_config('search_path', '', false);";
        assert_eq!(None, read_in_sql_line(line, IngestOptions::DROP_SEARCH_PATH));
        assert_eq!(
            Some(line.into()),
            read_in_sql_line(line, IngestOptions::DROP_COMMENTS)
        );
    }

    #[test]
    fn blank_lines() {
        let options = IngestOptions::DROP_COMMENTS | IngestOptions::DROP_BLANK_LINES;
        assert_eq!(None, read_in_sql_line("  \t", options));
        assert_eq!(None, read_in_sql_line("   -- only a comment", options));
        assert_eq!(Some("\t".into()), read_in_sql_line("\t", IngestOptions::default()));
    }

    #[test]
    fn ingest_lines() {
        let input = "-- header\r\nSET x = 1;\n\nSELECT 2; -- two";
        let buffer = SharedBuffer::new();
        let options = IngestOptions::default() | IngestOptions::DROP_BLANK_LINES;
        assert_eq!(2, ingest(input.as_bytes(), &buffer, options).unwrap());
        assert!(buffer.is_closed());
        assert_eq!(
            Fetch::Ready(b"SET x = 1;\nSELECT 2; \n".to_vec()),
            buffer.range(0, buffer.len()).unwrap()
        );
    }

    #[test]
    fn ingest_stops_when_closed() {
        let buffer = SharedBuffer::new();
        buffer.close();
        let err = ingest("SELECT 1;\n".as_bytes(), &buffer, IngestOptions::default()).unwrap_err();
        assert_eq!(io::ErrorKind::BrokenPipe, err.kind());
        assert!(buffer.is_empty());
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn ingest_failure_poisons_buffer() {
        let buffer = Arc::new(SharedBuffer::new());
        let handle = spawn_ingest(
            BufReader::new(Broken),
            Arc::clone(&buffer),
            IngestOptions::default(),
        );
        let err = handle.join().unwrap().unwrap_err();
        assert_eq!(io::ErrorKind::ConnectionReset, err.kind());
        assert!(buffer.is_closed());
        assert!(buffer.byte_at(0).is_err());
    }
}
