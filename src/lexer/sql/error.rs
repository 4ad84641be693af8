use std::error;
use std::fmt;
use std::io;
use std::string::FromUtf8Error;

use crate::lexer::scan::ScanError;

/// Boxed error coming from the caller's database driver.
pub type BoxError = Box<dyn error::Error + Send + Sync + 'static>;

/// Position of the scanner when an error was detected: (line, column).
pub type Pos = Option<(u64, usize)>;

/// Scanning and execution errors
#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    /// I/O Error (also reported when the ingestion stage failed)
    Io(io::Error),
    /// Empty or reversed range requested from the shared buffer
    InvalidRange(usize, usize),
    /// Write to a closed shared buffer
    BufferClosed,
    /// Statement or data row is not valid UTF-8
    Utf8(FromUtf8Error, Pos),
    /// `COPY ... FROM stdin` statement whose target cannot be used
    MalformedCopy(String, Pos),
    /// Statement rejected by the transaction
    Execute {
        /// failing statement
        statement: String,
        /// line where the statement starts
        line: u64,
        /// driver error
        source: BoxError,
    },
    /// Bulk insert of a `COPY ... FROM stdin` payload failed
    Copy {
        /// qualified target table
        target: String,
        /// line of the row being copied (or of the COPY statement)
        line: u64,
        /// driver error
        source: BoxError,
    },
    /// Receiving end of the statement queue hung up
    Disconnected,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(ref err) => err.fmt(f),
            Self::InvalidRange(start, end) => {
                write!(f, "invalid range {start}..{end}: start must be before end")
            }
            Self::BufferClosed => f.write_str("write to a closed buffer"),
            Self::Utf8(ref err, Some((line, column))) => {
                write!(f, "{err} at line: {line}, column: {column}")
            }
            Self::Utf8(ref err, None) => err.fmt(f),
            Self::MalformedCopy(ref stmt, Some((line, _))) => {
                write!(f, "malformed COPY statement at line {line}: {stmt}")
            }
            Self::MalformedCopy(ref stmt, None) => write!(f, "malformed COPY statement: {stmt}"),
            Self::Execute {
                ref statement,
                line,
                ref source,
            } => write!(
                f,
                "error executing statement at line {line}: {source}\n{statement}"
            ),
            Self::Copy {
                ref target,
                line,
                ref source,
            } => write!(f, "error copying into {target} at line {line}: {source}"),
            Self::Disconnected => f.write_str("statement receiver disconnected"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Io(ref err) => Some(err),
            Self::Utf8(ref err, _) => Some(err),
            Self::Execute { ref source, .. } | Self::Copy { ref source, .. } => Some(&**source),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<FromUtf8Error> for Error {
    fn from(err: FromUtf8Error) -> Self {
        Self::Utf8(err, None)
    }
}

impl ScanError for Error {
    fn position(&mut self, line: u64, column: usize) {
        match *self {
            Self::Utf8(_, ref mut pos) => *pos = Some((line, column)),
            Self::MalformedCopy(_, ref mut pos) => *pos = Some((line, column)),
            _ => {}
        }
    }
}
