//! The character source a [`Regex`](crate::Regex) searches.
//!
//! Positions are byte offsets into UTF-8 text. Implementations decode
//! characters around a position and copy raw byte ranges; the line helpers
//! have linear-time defaults that indexed sources (ropes, piece tables)
//! should override.

use std::ops::Range;

/// Random-access UTF-8 character source.
///
/// Bytes that do not form valid UTF-8 decode as `U+FFFD` with a length of one
/// byte, so every position in `0..=len()` is reachable.
pub trait Haystack {
    /// Total length in bytes.
    fn len(&self) -> usize;

    /// Returns `true` if the haystack is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The character starting at `pos` and its encoded length, or `None` at the end.
    fn char_at(&self, pos: usize) -> Option<(char, usize)>;

    /// The character ending at `pos` and its encoded length, or `None` at the start.
    fn char_before(&self, pos: usize) -> Option<(char, usize)>;

    /// Zero-based line index of `pos`.
    fn line_of(&self, pos: usize) -> usize {
        let mut line = 0;
        let mut cursor = pos.min(self.len());
        while let Some((ch, len)) = self.char_before(cursor) {
            if ch == '\n' {
                line += 1;
            }
            cursor -= len;
        }
        line
    }

    /// Byte offset of the start of the line containing `pos`.
    fn line_start(&self, pos: usize) -> usize {
        let mut cursor = pos.min(self.len());
        while let Some((ch, len)) = self.char_before(cursor) {
            if ch == '\n' {
                break;
            }
            cursor -= len;
        }
        cursor
    }

    /// Zero-based character column of `pos` within its line.
    fn column_of(&self, pos: usize) -> usize {
        let mut cursor = self.line_start(pos);
        let mut column = 0;
        while cursor < pos {
            match self.char_at(cursor) {
                Some((_, len)) => cursor += len,
                None => break,
            }
            column += 1;
        }
        column
    }

    /// Copy `range` verbatim, invalid bytes included.
    fn raw_bytes(&self, range: Range<usize>) -> Vec<u8>;

    /// Collect `range` into a `String`, replacing invalid bytes.
    fn text(&self, range: Range<usize>) -> String {
        let mut out = String::with_capacity(range.len());
        let mut pos = range.start;
        while pos < range.end {
            let Some((ch, len)) = self.char_at(pos) else {
                break;
            };
            out.push(ch);
            pos += len;
        }
        out
    }
}

/// Decode the first character of `bytes`.
pub fn decode_utf8(bytes: &[u8]) -> Option<(char, usize)> {
    let lead = *bytes.first()?;
    if lead < 0x80 {
        return Some((lead as char, 1));
    }
    let width = match lead {
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return Some((char::REPLACEMENT_CHARACTER, 1)),
    };
    match bytes.get(..width).map(std::str::from_utf8) {
        Some(Ok(s)) => s.chars().next().map(|ch| (ch, width)),
        _ => Some((char::REPLACEMENT_CHARACTER, 1)),
    }
}

/// Decode the last character of `bytes`.
pub fn decode_last_utf8(bytes: &[u8]) -> Option<(char, usize)> {
    let end = bytes.len();
    if end == 0 {
        return None;
    }
    if bytes[end - 1] < 0x80 {
        return Some((bytes[end - 1] as char, 1));
    }
    let floor = end.saturating_sub(4);
    let mut start = end - 1;
    while start > floor && bytes[start] & 0xC0 == 0x80 {
        start -= 1;
    }
    match decode_utf8(&bytes[start..end]) {
        Some((ch, len)) if start + len == end => Some((ch, len)),
        _ => Some((char::REPLACEMENT_CHARACTER, 1)),
    }
}

impl Haystack for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn char_at(&self, pos: usize) -> Option<(char, usize)> {
        decode_utf8(self.get(pos..)?)
    }

    fn char_before(&self, pos: usize) -> Option<(char, usize)> {
        decode_last_utf8(self.get(..pos)?)
    }

    fn raw_bytes(&self, range: Range<usize>) -> Vec<u8> {
        self.get(range).unwrap_or_default().to_vec()
    }

    fn line_of(&self, pos: usize) -> usize {
        let pos = pos.min(<[u8]>::len(self));
        memchr::memchr_iter(b'\n', &self[..pos]).count()
    }

    fn line_start(&self, pos: usize) -> usize {
        let pos = pos.min(<[u8]>::len(self));
        memchr::memrchr(b'\n', &self[..pos]).map_or(0, |i| i + 1)
    }
}

impl Haystack for str {
    fn len(&self) -> usize {
        str::len(self)
    }

    fn char_at(&self, pos: usize) -> Option<(char, usize)> {
        self.as_bytes().char_at(pos)
    }

    fn char_before(&self, pos: usize) -> Option<(char, usize)> {
        self.as_bytes().char_before(pos)
    }

    fn raw_bytes(&self, range: Range<usize>) -> Vec<u8> {
        self.as_bytes().raw_bytes(range)
    }

    fn line_of(&self, pos: usize) -> usize {
        self.as_bytes().line_of(pos)
    }

    fn line_start(&self, pos: usize) -> usize {
        self.as_bytes().line_start(pos)
    }

    fn text(&self, range: Range<usize>) -> String {
        match self.get(range.clone()) {
            Some(s) => s.to_string(),
            None => String::from_utf8_lossy(&self.as_bytes()[range]).into_owned(),
        }
    }
}

impl Haystack for String {
    fn len(&self) -> usize {
        self.as_str().len()
    }

    fn char_at(&self, pos: usize) -> Option<(char, usize)> {
        self.as_str().char_at(pos)
    }

    fn char_before(&self, pos: usize) -> Option<(char, usize)> {
        self.as_str().char_before(pos)
    }

    fn raw_bytes(&self, range: Range<usize>) -> Vec<u8> {
        self.as_str().raw_bytes(range)
    }

    fn line_of(&self, pos: usize) -> usize {
        self.as_str().line_of(pos)
    }

    fn line_start(&self, pos: usize) -> usize {
        self.as_str().line_start(pos)
    }

    fn text(&self, range: Range<usize>) -> String {
        self.as_str().text(range)
    }
}
