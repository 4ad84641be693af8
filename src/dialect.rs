//! PostgreSQL lexical conventions used by the splitter.

use uncased::UncasedStr;

/// Statement prefixes after which `AS <tag>` opens a function body.
const FUNCTION_HEADERS: [&str; 2] = ["CREATE FUNCTION", "CREATE OR REPLACE FUNCTION"];

/// Keyword introducing a procedural block whose delimiter follows it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockOpener {
    /// `DO <tag> ... <tag>`
    Do,
    /// `CREATE [OR REPLACE] FUNCTION ... AS <tag> ... <tag>`
    As,
}

/// ASCII whitespace, line breaks included.
pub fn is_whitespace(b: u8) -> bool {
    b.is_ascii_whitespace()
}

/// Whether `stmt` (the text accumulated so far) is a function definition.
pub fn is_function_header(stmt: &[u8]) -> bool {
    match std::str::from_utf8(stmt) {
        Ok(stmt) => {
            let stmt = UncasedStr::new(stmt);
            FUNCTION_HEADERS.iter().any(|h| stmt.starts_with(h))
        }
        Err(_) => false,
    }
}

/// Classify a two-byte `keyword` found on a word boundary.
pub fn block_opener(keyword: &[u8], stmt: &[u8]) -> Option<BlockOpener> {
    let keyword = UncasedStr::new(std::str::from_utf8(keyword).ok()?);
    if keyword == "DO" {
        Some(BlockOpener::Do)
    } else if keyword == "AS" && is_function_header(stmt) {
        Some(BlockOpener::As)
    } else {
        None
    }
}

/// Case-insensitive match of a block delimiter against input bytes.
pub fn is_block_end(token: &str, data: &[u8]) -> bool {
    std::str::from_utf8(data).map_or(false, |data| UncasedStr::new(token) == data)
}
