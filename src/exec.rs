//! Execution sink: apply a migration to a caller-owned transaction.
//!
//! Statements run one by one as soon as they are complete. A
//! `COPY ... FROM stdin;` statement is not sent as is: its payload is read
//! straight from the input and streamed row by row into a bulk insert.

use std::error;
use std::time::Duration;

use log::{debug, info, warn};

use crate::buffer::SharedBuffer;
use crate::copy::{parse_row, read_row, skip_to_data, CopyTarget, RowLine};
use crate::lexer::sql::{Error, Splitter, Statement};
use crate::lexer::Scanner;

/// Bulk insert opened by [`Transaction::copy_in`].
pub trait CopyIn {
    /// Database error
    type Error: error::Error + Send + Sync + 'static;

    /// Insert one row; `None` is NULL. Values are sent as text and cast by
    /// the database.
    fn send_row(&mut self, row: &[Option<&str>]) -> Result<(), Self::Error>;

    /// Flush pending rows and close the bulk insert.
    fn finish(self) -> Result<(), Self::Error>;
}

/// Active transaction a migration is applied to.
///
/// The caller owns it and decides to commit or roll back depending on the
/// outcome of [`execute`].
pub trait Transaction {
    /// Database error
    type Error: error::Error + Send + Sync + 'static;
    /// Bulk insert bound to this transaction
    type CopyIn<'a>: CopyIn<Error = Self::Error>
    where
        Self: 'a;

    /// Run a single statement.
    fn execute(&mut self, sql: &str) -> Result<(), Self::Error>;

    /// Prepare a bulk insert into `target`. Schema-qualified targets must be
    /// resolved in their schema, others through the search path.
    fn copy_in(&mut self, target: &CopyTarget) -> Result<Self::CopyIn<'_>, Self::Error>;
}

/// What a successful run applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecSummary {
    /// statements executed, COPY statements excluded
    pub statements: usize,
    /// COPY payloads loaded
    pub copies: usize,
    /// rows loaded by all COPY payloads
    pub rows: u64,
}

/// Apply every statement of `input` to `tx`.
///
/// Stop at the first failure; the transaction must then be rolled back.
pub fn execute<T: Transaction>(
    input: &SharedBuffer,
    tx: &mut T,
    wait: Duration,
) -> Result<ExecSummary, Error> {
    let mut scanner = Scanner::new(input, wait);
    let mut splitter = Splitter::new();
    let mut summary = ExecSummary::default();
    while let Some(stmt) = splitter.next_statement(&mut scanner)? {
        match stmt.copy_target()? {
            Some(target) => {
                skip_to_data(&mut scanner)?;
                summary.rows += copy_from_stdin(&mut scanner, tx, &target, &stmt)?;
                summary.copies += 1;
            }
            None => {
                debug!(target: "exec", "execute statement at line {}", stmt.line);
                tx.execute(&stmt.text).map_err(|e| Error::Execute {
                    statement: stmt.text.clone(),
                    line: stmt.line,
                    source: Box::new(e),
                })?;
                summary.statements += 1;
            }
        }
    }
    info!(
        target: "exec",
        "{} statements executed, {} rows copied",
        summary.statements, summary.rows
    );
    Ok(summary)
}

/// Stream the payload following `stmt` into a bulk insert.
fn copy_from_stdin<T: Transaction>(
    scanner: &mut Scanner<'_>,
    tx: &mut T,
    target: &CopyTarget,
    stmt: &Statement,
) -> Result<u64, Error> {
    let copy_err = |line: u64| {
        let target = target.to_string();
        move |e: T::Error| Error::Copy {
            target,
            line,
            source: Box::new(e),
        }
    };
    debug!(target: "exec", "copy into {} ({} columns)", target, target.columns.len());
    let mut copy = tx.copy_in(target).map_err(copy_err(stmt.line))?;
    let mut rows = 0;
    loop {
        let line = scanner.line();
        match read_row(scanner)? {
            RowLine::Row(row) => {
                copy.send_row(&parse_row(&row)).map_err(copy_err(line))?;
                rows += 1;
            }
            RowLine::EndOfData => break,
            RowLine::EndOfInput => {
                warn!(target: "exec", "COPY into {} at line {} not terminated", target, stmt.line);
                break;
            }
        }
    }
    copy.finish().map_err(copy_err(scanner.line()))?;
    debug!(target: "exec", "{} rows copied into {}", rows, target);
    Ok(rows)
}
