//! PostgreSQL COPY text format: one row per line, tab-separated columns.
//!
//! Only the escapes the loader itself produces are written. Decoding also
//! accepts the control-character escapes PostgreSQL emits so that dumps from
//! a real server load unchanged.

use thiserror::Error;

/// Column value standing for SQL `NULL`.
pub const NULL_MARKER: &str = "\\N";

/// Column separator.
pub const COLUMN_SEPARATOR: u8 = b'\t';

/// Row terminator.
pub const ROW_TERMINATOR: u8 = b'\n';

/// Errors raised while decoding a COPY text line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CopyTextError {
    /// The line is not valid UTF-8.
    #[error("copy line is not valid UTF-8")]
    InvalidUtf8,
    /// A backslash was followed by a character with no defined meaning.
    #[error("unknown escape sequence \\{escape}")]
    UnknownEscape {
        /// Character following the backslash.
        escape: char,
    },
    /// The line ended in the middle of an escape sequence.
    #[error("copy line ends with a lone backslash")]
    TrailingBackslash,
}

/// Append `value` to `buf`, escaping characters that would break the
/// column or row structure.
pub fn escape_into(buf: &mut Vec<u8>, value: &str) {
    for byte in value.bytes() {
        match byte {
            b'\\' => buf.extend_from_slice(b"\\\\"),
            b'\n' => buf.extend_from_slice(b"\\n"),
            b'\r' => buf.extend_from_slice(b"\\r"),
            b'\t' => buf.extend_from_slice(b"\\t"),
            other => buf.push(other),
        }
    }
}

/// Split one line (without its terminator) into column values.
///
/// `\N` decodes to `None`; every other column decodes to its unescaped text.
///
/// # Errors
/// Returns [`CopyTextError`] for invalid UTF-8, unknown escapes and a
/// trailing lone backslash.
///
/// # Examples
///
/// ```
/// use featureload_core::copy_text::decode_line;
///
/// let fields = decode_line(b"7\tMain\\tStreet\t\\N").expect("valid line");
/// assert_eq!(
///     fields,
///     [Some("7".to_owned()), Some("Main\tStreet".to_owned()), None]
/// );
/// ```
pub fn decode_line(line: &[u8]) -> Result<Vec<Option<String>>, CopyTextError> {
    let line = std::str::from_utf8(line).map_err(|_| CopyTextError::InvalidUtf8)?;
    line.split('\t').map(decode_field).collect()
}

fn decode_field(raw: &str) -> Result<Option<String>, CopyTextError> {
    if raw == NULL_MARKER {
        return Ok(None);
    }
    let mut value = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }
        let escaped = match chars.next().ok_or(CopyTextError::TrailingBackslash)? {
            '\\' => '\\',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            escape => return Err(CopyTextError::UnknownEscape { escape }),
        };
        value.push(escaped);
    }
    Ok(Some(value))
}
