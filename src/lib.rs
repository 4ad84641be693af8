//! Streaming PostgreSQL migration splitter and executor
//!
//! A migration is read line by line into a [`SharedBuffer`] by an ingestion
//! thread while a single scanner walks it and cuts it into statements,
//! honouring string literals, procedural blocks and `COPY ... FROM stdin`
//! payloads. Statements are either handed back as strings
//! ([`split_statements`]) or applied to a caller-owned transaction
//! ([`execute`]).
#![warn(missing_docs)]
#![warn(clippy::large_stack_frames)]

pub mod buffer;
pub mod copy;
pub mod dialect;
pub mod exec;
pub mod ingest;
pub mod lexer;
pub mod location;

use std::io::{self, BufRead};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use fallible_iterator::FallibleIterator;

pub use buffer::{Fetch, SharedBuffer};
pub use exec::{execute, CopyIn, ExecSummary, Transaction};
pub use ingest::IngestOptions;
pub use lexer::sql::{split_statements, Error, Statement, Statements};

/// Tuning shared by both sinks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Upper bound of a single wait for the ingestion stage; tens of
    /// milliseconds for files, longer for slow streamed input.
    pub wait: Duration,
    /// Line filters of the ingestion stage.
    pub ingest: IngestOptions,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            wait: Duration::from_millis(10),
            ingest: IngestOptions::default(),
        }
    }
}

impl Config {
    /// Set the wait interval.
    pub fn wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Set the ingestion filters.
    pub fn ingest(mut self, ingest: IngestOptions) -> Self {
        self.ingest = ingest;
        self
    }
}

/// Run ingestion of `input` and `scan` concurrently.
///
/// A scanning error closes the buffer, which stops the ingestion at its next
/// line, and takes precedence over the ingestion error it may stem from.
fn with_ingest<R, T, F>(input: R, config: &Config, scan: F) -> Result<T, Error>
where
    R: BufRead + Send,
    F: FnOnce(&SharedBuffer) -> Result<T, Error>,
{
    let buffer = SharedBuffer::new();
    let (scanned, ingested) = thread::scope(|s| {
        let ingester = s.spawn(|| ingest::ingest(input, &buffer, config.ingest));
        let scanned = scan(&buffer);
        if scanned.is_err() && !buffer.is_closed() {
            log::debug!(target: "ingest", "scanner stopped before the end of input");
            buffer.close();
        }
        let ingested = ingester
            .join()
            .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "ingestion panicked")));
        (scanned, ingested)
    });
    let value = scanned?;
    ingested?;
    Ok(value)
}

/// Split `input` and send every statement and COPY row to `sender`.
pub fn split_reader<R: BufRead + Send>(
    input: R,
    sender: Sender<String>,
    config: &Config,
) -> Result<usize, Error> {
    with_ingest(input, config, |buffer| {
        split_statements(buffer, sender, config.wait)
    })
}

/// Split `input` into a vector.
pub fn split_all<R: BufRead + Send>(input: R, config: &Config) -> Result<Vec<String>, Error> {
    with_ingest(input, config, |buffer| {
        Statements::new(buffer, config.wait).collect()
    })
}

/// Apply the migration read from `input` to `tx`.
pub fn execute_reader<R, T>(input: R, tx: &mut T, config: &Config) -> Result<ExecSummary, Error>
where
    R: BufRead + Send,
    T: Transaction,
{
    with_ingest(input, config, |buffer| execute(buffer, tx, config.wait))
}
