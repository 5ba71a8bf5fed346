//! Input ID parsing
//!
//! ID files are hand-edited and frequently pasted from earlier validator
//! output, so parsing is a best-effort scrape. Each trimmed, non-blank,
//! non-comment line is matched against these grammars, in order:
//!
//! 1. `old → new` (Unicode arrow): the text after the last `→` must be all digits
//! 2. `old -> new` (ASCII arrow): the text after the last `->` must be all digits
//! 3. `digits`: the whole line is all digits
//!
//! A line that matches a separator grammar but fails its digit check is
//! dropped; it does not fall through to the next grammar. Lines that match
//! nothing are dropped silently. Duplicates are preserved in input order.

use crate::Result;
use std::path::Path;

/// Numeric node identifier as read from an input file
pub type InputId = u64;

const UNICODE_ARROW: char = '\u{2192}';
const ASCII_ARROW: &str = "->";

/// Parse a single input line
///
/// Returns `None` for blank lines, `#` comments, and anything that does not
/// match one of the module-level grammars.
pub fn parse_line(line: &str) -> Option<InputId> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let candidate = if let Some((_, tail)) = line.rsplit_once(UNICODE_ARROW) {
        tail.trim()
    } else if let Some((_, tail)) = line.rsplit_once(ASCII_ARROW) {
        tail.trim()
    } else {
        line
    };

    parse_digits(candidate)
}

/// Digit-only text to an ID; overflow is treated like any other malformed line
fn parse_digits(text: &str) -> Option<InputId> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Lazily yield the recognized IDs from a sequence of lines
pub fn parse_id_lines<'a, I>(lines: I) -> impl Iterator<Item = InputId> + 'a
where
    I: IntoIterator<Item = &'a str>,
    I::IntoIter: 'a,
{
    lines.into_iter().filter_map(parse_line)
}

/// Parse all recognized IDs from file contents
pub fn parse_ids(text: &str) -> Vec<InputId> {
    parse_id_lines(text.lines()).collect()
}

/// Read and parse an ID file
pub fn read_id_file(path: &Path) -> Result<Vec<InputId>> {
    let text = std::fs::read_to_string(path)?;
    let ids = parse_ids(&text);
    tracing::debug!(path = %path.display(), count = ids.len(), "Parsed ID file");
    Ok(ids)
}
