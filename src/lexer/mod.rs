//! Streaming PostgreSQL statement splitter

pub mod block;
mod scan;
pub mod sql;

pub use scan::{ScanError, Scanner};
