//! `COPY <table> (<columns>) FROM stdin;` statements and their payload.
//!
//! The payload follows the statement in the input: one row per line, fields
//! separated by tabs, `\N` for NULL, and a line holding only `\.` to end it.

use std::fmt;

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexer::Scanner;
use crate::lexer::sql::Error;

static COPY_FROM_STDIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*COPY\s+([A-Za-z0-9._]+)\s*\(\s*(.+)\)\s*FROM\s+stdin\s*;\s*$").unwrap()
});

/// Line ending a payload.
pub const END_OF_DATA: &[u8] = b"\\.";
/// Field value standing for NULL.
pub const NULL: &str = "\\N";

/// Table and columns a payload is loaded into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyTarget {
    /// `None` when the table is resolved through the search path
    pub schema: Option<String>,
    /// table name
    pub table: String,
    /// column names, in payload order
    pub columns: Vec<String>,
}

impl CopyTarget {
    /// Match `stmt` against the COPY-from-stdin form.
    /// Return `Ok(None)` for any other statement.
    pub fn parse(stmt: &str) -> Result<Option<CopyTarget>, Error> {
        let Some(caps) = COPY_FROM_STDIN.captures(stmt) else {
            return Ok(None);
        };
        let name = &caps[1];
        let (schema, table) = match name.split_once('.') {
            Some((schema, table)) => (Some(schema), table),
            None => (None, name),
        };
        let columns: Vec<String> = caps[2].split(',').map(|c| c.trim().to_owned()).collect();
        if table.is_empty()
            || table.contains('.')
            || schema.map_or(false, str::is_empty)
            || columns.iter().any(String::is_empty)
        {
            return Err(Error::MalformedCopy(stmt.to_owned(), None));
        }
        Ok(Some(CopyTarget {
            schema: schema.map(str::to_owned),
            table: table.to_owned(),
            columns,
        }))
    }

    /// Whether `stmt` is a COPY-from-stdin statement.
    pub fn matches(stmt: &str) -> bool {
        COPY_FROM_STDIN.is_match(stmt)
    }
}

impl fmt::Display for CopyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref schema) = self.schema {
            write!(f, "{schema}.")?;
        }
        f.write_str(&self.table)
    }
}

/// Split a payload line into fields, mapping `\N` to `None`.
/// Fields are otherwise passed through verbatim.
pub fn parse_row(line: &str) -> Vec<Option<&str>> {
    line.split('\t')
        .map(|field| if field == NULL { None } else { Some(field) })
        .collect()
}

/// One line read from a payload.
#[derive(Debug, PartialEq, Eq)]
pub enum RowLine {
    /// Data row, verbatim
    Row(String),
    /// `\.`
    EndOfData,
    /// Input ended before `\.`
    EndOfInput,
}

/// Move the scanner from the end of a COPY statement to its first data row:
/// the rest of the statement line, then any blank line.
pub fn skip_to_data(scanner: &mut Scanner<'_>) -> Result<(), Error> {
    scanner.skip_line_end()?;
    scanner.skip_blank_lines()
}

/// Read the next payload line straight from the scanner.
pub fn read_row(scanner: &mut Scanner<'_>) -> Result<RowLine, Error> {
    match scanner.line_bytes()? {
        Some(line) if line == END_OF_DATA => Ok(RowLine::EndOfData),
        Some(line) => Ok(RowLine::Row(String::from_utf8(line).map_err(|e| {
            Error::Utf8(e, Some((scanner.line() - 1, 1)))
        })?)),
        None => {
            warn!(target: "copy", "input ended before the end of COPY data");
            Ok(RowLine::EndOfInput)
        }
    }
}
