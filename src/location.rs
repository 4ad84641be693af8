//! Where a migration lives and how it must be run.
//!
//! Only plain SQL migrations going up on PostgreSQL can be fed to the
//! splitter; everything else is rejected with a named error.

use std::error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use uncased::UncasedStr;

const FILE_SCHEME: &str = "file://";
const S3_SCHEME: &str = "s3://";

/// Migration metadata errors
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Neither `sql` nor `fizz`
    InvalidFormat(String),
    /// Not `up`
    InvalidDirection(String),
    /// Unknown URI scheme or empty location
    InvalidPath(String),
    /// Not PostgreSQL
    UnsupportedDialect(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFormat(s) => write!(f, "invalid migration format {s:?}, expected sql or fizz"),
            Self::InvalidDirection(s) => write!(f, "invalid migration direction {s:?}, expected up"),
            Self::InvalidPath(s) => {
                write!(f, "invalid migration path {s:?}, expected {FILE_SCHEME} or {S3_SCHEME}")
            }
            Self::UnsupportedDialect(s) => write!(f, "unsupported dialect {s:?}"),
        }
    }
}

impl error::Error for Error {}

/// Storage of a migration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Location {
    /// `file://<path>`
    File(PathBuf),
    /// `s3://<bucket>/<key>`
    #[allow(missing_docs)]
    S3 { bucket: String, key: String },
}

impl Location {
    /// Local path, for `file://` locations.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Location::File(path) => Some(path.as_path()),
            Location::S3 { .. } => None,
        }
    }
}

impl FromStr for Location {
    type Err = Error;

    fn from_str(uri: &str) -> Result<Self, Error> {
        if let Some(path) = uri.strip_prefix(FILE_SCHEME) {
            if path.is_empty() {
                return Err(Error::InvalidPath(uri.to_owned()));
            }
            return Ok(Location::File(PathBuf::from(path)));
        }
        if let Some(rest) = uri.strip_prefix(S3_SCHEME) {
            return match rest.split_once('/') {
                Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok(Location::S3 {
                    bucket: bucket.to_owned(),
                    key: key.to_owned(),
                }),
                _ => Err(Error::InvalidPath(uri.to_owned())),
            };
        }
        Err(Error::InvalidPath(uri.to_owned()))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::File(path) => write!(f, "{FILE_SCHEME}{}", path.display()),
            Location::S3 { bucket, key } => write!(f, "{S3_SCHEME}{bucket}/{key}"),
        }
    }
}

/// Migration language
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// Plain SQL
    Sql,
    /// Translated to SQL elsewhere
    Fizz,
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let format = UncasedStr::new(s);
        if format == "sql" {
            Ok(Format::Sql)
        } else if format == "fizz" {
            Ok(Format::Fizz)
        } else {
            Err(Error::InvalidFormat(s.to_owned()))
        }
    }
}

/// Migration direction; only `up` migrations exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// `up`
    Up,
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        if UncasedStr::new(s) == "up" {
            Ok(Direction::Up)
        } else {
            Err(Error::InvalidDirection(s.to_owned()))
        }
    }
}

/// Target database
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    /// `postgres` or `postgresql`
    Postgres,
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let dialect = UncasedStr::new(s);
        if dialect == "postgres" || dialect == "postgresql" {
            Ok(Dialect::Postgres)
        } else {
            Err(Error::UnsupportedDialect(s.to_owned()))
        }
    }
}

/// A migration the splitter can run.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Migration {
    pub location: Location,
    pub format: Format,
    pub direction: Direction,
    pub dialect: Dialect,
}

impl Migration {
    /// Validate raw migration metadata.
    pub fn new(location: &str, format: &str, direction: &str, dialect: &str) -> Result<Self, Error> {
        Ok(Migration {
            location: location.parse()?,
            format: format.parse()?,
            direction: direction.parse()?,
            dialect: dialect.parse()?,
        })
    }

    /// Whether the migration can be split as is (no fizz translation).
    pub fn is_sql(&self) -> bool {
        self.format == Format::Sql
    }
}
