//! `name:value` parameter tokenizer.
//!
//! Sub-fields of a structured payload hold runs of `name:value` pairs
//! separated by `,` or `;` and optionally ended by a `0x00` terminator.
//! Values may be quoted with `'` or `"` so they can carry separators and
//! exact whitespace; unquoted values are trimmed of trailing whitespace,
//! quoted values are returned byte for byte. Names are upper-cased and
//! trailing-trimmed. The field bytes are peer-controlled, so every scan step
//! checks the remaining window before indexing.

use crate::{ParseError, ParseResult};

/// Bounds-checked scan window over a context's buffer.
///
/// Selecting a field resets the window; each extracted pair moves it
/// forward. It never yields bytes outside the buffer it is handed.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Cursor {
    start: usize,
    len: usize,
}

impl Cursor {
    pub(crate) fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    pub(crate) fn empty() -> Self {
        Self::default()
    }

    /// The bytes still ahead of the cursor, clamped to the buffer.
    pub(crate) fn remaining<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        let start = self.start.min(buf.len());
        let end = self.start.saturating_add(self.len).min(buf.len());
        &buf[start..end]
    }

    /// Move past `n` consumed bytes.
    pub(crate) fn advance(&mut self, n: usize) {
        let n = n.min(self.len);
        self.start += n;
        self.len -= n;
    }
}

/// One `name:value` pair extracted from a parameter field.
///
/// Both buffers are owned by the caller. The name comes back upper-cased
/// with trailing whitespace removed; the value holds exactly the bytes the
/// grammar selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamPair {
    pub name: Vec<u8>,
    pub value: Vec<u8>,
}

impl ParamPair {
    /// Name as text, when it is valid UTF-8.
    pub fn name_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.name).ok()
    }

    /// Value as text, when it is valid UTF-8.
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}

/// Whitespace class of the wire grammar.
///
/// Locale-free `isspace`: unlike `u8::is_ascii_whitespace` this includes
/// vertical tab.
fn is_param_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r')
}

fn trim_trailing_space(s: &[u8]) -> &[u8] {
    let mut end = s.len();
    while end > 0 && is_param_space(s[end - 1]) {
        end -= 1;
    }
    &s[..end]
}

/// Extract the next pair from `cursor`'s window into `buf`.
///
/// Returns `Ok(None)` at normal end of data: window exhausted, terminator
/// byte reached, or nothing but whitespace left. The cursor is committed
/// only when a pair is returned; `None` and error paths leave it untouched,
/// so an exhausted field keeps answering `None`.
pub(crate) fn next_pair(
    buf: &[u8],
    cursor: &mut Cursor,
    name_cap: usize,
) -> ParseResult<Option<ParamPair>> {
    let s = cursor.remaining(buf);
    if s.is_empty() || s[0] == 0 {
        return Ok(None);
    }

    let mut i = 0;
    while i < s.len() && is_param_space(s[i]) {
        i += 1;
    }
    if i == s.len() {
        // Nothing left but whitespace
        return Ok(None);
    }

    let mut name = Vec::new();
    while s[i] != b':' {
        if name.len() >= name_cap {
            return Err(ParseError::NameTooLong { cap: name_cap });
        }
        name.push(s[i].to_ascii_uppercase());
        i += 1;
        if i == s.len() {
            return Err(ParseError::UnexpectedEnd);
        }
    }
    let trimmed = trim_trailing_space(&name).len();
    name.truncate(trimmed);

    // Past the ':', then whitespace up to the value
    i += 1;
    if i == s.len() {
        return Err(ParseError::UnexpectedEnd);
    }
    while i < s.len() && is_param_space(s[i]) {
        i += 1;
    }
    if i == s.len() {
        return Err(ParseError::UnexpectedEnd);
    }

    let quote = match s[i] {
        q @ (b'\'' | b'"') => {
            i += 1;
            if i == s.len() {
                return Err(ParseError::UnterminatedQuote { quote: q as char });
            }
            Some(q)
        }
        _ => None,
    };

    let value_start = i;
    let raw_len;
    let value;
    match quote {
        Some(q) => {
            let mut close = None;
            for (j, &b) in s[value_start..].iter().enumerate() {
                if b == 0 {
                    return Err(ParseError::UnterminatedQuote { quote: q as char });
                }
                if b == q {
                    close = Some(j);
                    break;
                }
            }
            raw_len = match close {
                Some(end) => end,
                None => return Err(ParseError::UnterminatedQuote { quote: q as char }),
            };
            value = s[value_start..value_start + raw_len].to_vec();
        }
        None => {
            raw_len = s[value_start..]
                .iter()
                .position(|&b| matches!(b, b',' | b';' | 0))
                .unwrap_or(s.len() - value_start);
            value = trim_trailing_space(&s[value_start..value_start + raw_len]).to_vec();
        }
    }

    i = value_start + raw_len;
    // One byte past the value: the closing quote when quoted, a separator
    // when unquoted. The terminator is never consumed.
    if i < s.len() && s[i] != 0 {
        i += 1;
    }

    if quote.is_some() {
        while i < s.len() && is_param_space(s[i]) {
            i += 1;
        }
        if i < s.len() {
            match s[i] {
                b',' | b';' => i += 1,
                0 => {}
                _ => return Err(ParseError::MissingSeparator),
            }
        }
    }

    cursor.advance(i);
    Ok(Some(ParamPair { name, value }))
}
